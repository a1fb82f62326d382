//! What the host needs from a script runtime.

use std::{fmt, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::InputRewrite;

/// A value passed between scripts and host functions.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(x) => Some(*x),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// The result of calling a host function: maybe a value, or a message explaining what went wrong.
pub type HostResult = Result<Option<Value>, String>;

pub type HostFn = Rc<dyn Fn(Vec<Value>) -> LocalBoxFuture<'static, HostResult>>;

/// How many arguments a host function takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
}

impl Arity {
    pub const fn exactly(n: usize) -> Arity {
        Arity { min: n, max: n }
    }

    pub const fn between(min: usize, max: usize) -> Arity {
        Arity { min, max }
    }

    pub fn accepts(&self, n: usize) -> bool {
        self.min <= n && n <= self.max
    }
}

/// A host function, as exposed to scripts under some global name.
#[derive(Clone)]
pub struct Callable {
    pub name: String,
    pub arity: Arity,
    pub f: HostFn,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Receives a script's raw output, in whatever chunks the runtime produces it.
pub type OutputHook = Rc<dyn Fn(&str)>;

/// A whole script, running. Errors are already rendered for display.
pub type RunFuture = LocalBoxFuture<'static, Result<(), String>>;

/// An isolated execution context for user scripts.
///
/// Runtimes are single-threaded; a script only ever suspends while it's waiting on a host
/// function's future.
pub trait ScriptRuntime {
    /// Makes `callable` available to scripts as a global.
    fn register(&mut self, callable: Callable);

    /// Replaces the runtime's blocking "read a line" builtin. The function is called with the
    /// prompt (if any) and resolves to the line as text.
    fn replace_input(&mut self, read: HostFn);

    fn set_output(&mut self, stream: Stream, hook: OutputHook);

    /// If the runtime can't suspend inside its own input builtin, the rewrite that turns input
    /// calls into suspension points.
    fn input_rewrite(&self) -> Option<InputRewrite> {
        None
    }

    /// Prepares `source` to run. The script only makes progress while the future is polled.
    fn run(&mut self, source: &str) -> RunFuture;
}
