//! The host side of a turtle-graphics scripting session.
//!
//! A [`Host`] owns one script runtime (anything implementing [`ScriptRuntime`]) and speaks a
//! small JSON protocol with a UI: it takes [`Inbound`] messages (`init`, `run`,
//! `input_response`) and posts [`Outbound`] ones (status, output, input requests, drawing
//! commands, and completion) to an [`EventSink`].

pub mod bindings;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod output;
pub mod protocol;
pub mod rewrite;
pub mod runtime;

pub use bridge::{InputBridge, InputPolicy};
pub use config::{Config, ConfigError, StatusText};
pub use controller::{Host, Lifecycle, RuntimeFactory};
pub use output::LineBuffer;
pub use protocol::{coerce_text, EventSink, Inbound, Mailbox, Outbound};
pub use rewrite::InputRewrite;
pub use runtime::{
    Arity, Callable, HostFn, HostResult, OutputHook, RunFuture, ScriptRuntime, Stream, Value,
};

pub use turtlebox;
