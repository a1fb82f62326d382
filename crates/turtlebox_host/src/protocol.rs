//! The messages exchanged with the UI.
//!
//! Both directions are JSON objects tagged by a snake_case `type` field.

use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};
use turtlebox::Command;

/// A message from the UI.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Init,
    Run {
        #[serde(default)]
        code: Option<String>,
    },
    InputResponse {
        #[serde(default)]
        text: serde_json::Value,
    },
}

impl Inbound {
    pub fn parse(line: &str) -> serde_json::Result<Inbound> {
        serde_json::from_str(line)
    }
}

/// Renders whatever the UI sent back as an input response as text.
///
/// Strings are used as-is, `null` becomes empty, and anything else gets its JSON rendering.
pub fn coerce_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A message to the UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Status { text: String },
    Stdout { text: String },
    Stderr { text: String },
    InputRequest { prompt: String },
    CanvasCmd { cmd: Command },
    Ready,
    Done,
    Error { text: String },
}

impl Outbound {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Somewhere to post outbound messages.
///
/// Posting takes `&self` because several parts of a session (output capture, the input bridge,
/// the canvas) all post to the same place.
pub trait EventSink {
    fn post(&self, msg: Outbound);
}

/// An [`EventSink`] that keeps everything in memory, in order.
#[derive(Clone, Debug, Default)]
pub struct Mailbox(Rc<RefCell<Vec<Outbound>>>);

impl Mailbox {
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl EventSink for Mailbox {
    fn post(&self, msg: Outbound) {
        log::trace!("posting {msg:?}");
        self.0.borrow_mut().push(msg);
    }
}
