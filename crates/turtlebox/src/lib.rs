//! Turtle-graphics emulation for a scripted canvas.
//!
//! Scripts mutate [`Turtle`] poses through a [`Screen`]; every mutation turns into one or more
//! [`Command`]s, which the [`Batcher`] either hands straight to the rendering surface or holds
//! back until the script asks for an update (the classic `tracer(0)` / `update()` dance).

use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

pub mod batch;
pub mod color;
pub mod screen;
pub mod turtle;

pub use batch::{Batcher, CommandQueue, Mode, TracerState};
pub use color::{normalize_color, Arg};
pub use screen::{Screen, DEFAULT_TURTLE};
pub use turtle::{normalize_heading, Pose, Turtle, TurtleRef};

/// The `speed` value that tells the rendering surface to skip any per-segment animation.
pub const INSTANT: u8 = 0;

/// The fastest animated speed a turtle accepts.
pub const MAX_SPEED: u8 = 10;

/// One drawing (or drawing-control) instruction for the rendering surface.
///
/// The wire shape is a JSON object whose `type` field names the variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
        width: f64,
        speed: u8,
    },
    TurtlePose {
        x: f64,
        y: f64,
        heading: f64,
        visible: bool,
        color: String,
    },
    Clear,
    Background {
        color: String,
    },
    Tracer {
        n: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<f64>,
    },
    Update,
}

/// Something that consumes drawing commands, in order, exactly once each.
pub trait CommandSink {
    fn send(&mut self, cmd: Command);
}

/// A [`CommandSink`] that just remembers everything it was sent.
///
/// Clones share the same underlying buffer, so one copy can be handed to a [`Batcher`] while
/// another is kept around for inspection.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    cmds: Rc<RefCell<Vec<Command>>>,
}

impl Recorder {
    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.cmds.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.cmds.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.borrow().is_empty()
    }
}

impl CommandSink for Recorder {
    fn send(&mut self, cmd: Command) {
        self.cmds.borrow_mut().push(cmd);
    }
}

/// The initial state of every freshly constructed turtle, and the canvas background.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub pen_color: String,
    pub pen_size: f64,
    pub speed: u8,
    pub background: String,
}

impl Default for Defaults {
    fn default() -> Defaults {
        Defaults {
            pen_color: String::from("#00ff66"),
            pen_size: 2.0,
            speed: INSTANT,
            background: String::from("#111111"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TurtleError {
    #[error("{op}: {detail}")]
    InvalidArgument { op: &'static str, detail: String },
    #[error("there's no turtle named {0}")]
    UnknownTurtle(String),
}

impl TurtleError {
    pub(crate) fn invalid(op: &'static str, detail: impl Into<String>) -> TurtleError {
        TurtleError::InvalidArgument {
            op,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags() {
        let line = Command::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 2.0,
            color: "red".into(),
            width: 2.0,
            speed: 3,
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "line");
        assert_eq!(json["x2"], 1.0);

        let pose = Command::TurtlePose {
            x: 0.0,
            y: 0.0,
            heading: 90.0,
            visible: true,
            color: "red".into(),
        };
        assert_eq!(serde_json::to_value(&pose).unwrap()["type"], "turtlePose");
        assert_eq!(
            serde_json::to_string(&Command::Clear).unwrap(),
            r#"{"type":"clear"}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::Tracer { n: 0, delay: None }).unwrap(),
            r#"{"type":"tracer","n":0}"#
        );
    }

    #[test]
    fn recorder_clones_share_a_buffer() {
        let recorder = Recorder::default();
        let mut sink = recorder.clone();
        sink.send(Command::Update);
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.take(), vec![Command::Update]);
        assert!(recorder.is_empty());
    }
}
