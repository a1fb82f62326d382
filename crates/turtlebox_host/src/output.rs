use std::{cell::RefCell, rc::Rc};

use crate::{EventSink, Outbound, Stream};

/// Turns a script's raw output into one event per line.
pub struct LineBuffer {
    stream: Stream,
    events: Rc<dyn EventSink>,
    pending: RefCell<String>,
}

impl LineBuffer {
    pub fn new(stream: Stream, events: Rc<dyn EventSink>) -> LineBuffer {
        LineBuffer {
            stream,
            events,
            pending: RefCell::new(String::new()),
        }
    }

    fn event(&self, text: String) -> Outbound {
        match self.stream {
            Stream::Stdout => Outbound::Stdout { text },
            Stream::Stderr => Outbound::Stderr { text },
        }
    }

    /// Posts every line that `text` completes. A trailing partial line waits for more text
    /// (or a [`flush`](LineBuffer::flush)).
    pub fn write(&self, text: &str) {
        let lines = {
            let mut pending = self.pending.borrow_mut();
            pending.push_str(text);
            let Some(end) = pending.rfind('\n') else {
                return;
            };
            let rest = pending.split_off(end + 1);
            let done = std::mem::replace(&mut *pending, rest);
            done.lines().map(str::to_owned).collect::<Vec<_>>()
        };
        // The sink might well write back into us, so don't hold the borrow while posting.
        for line in lines {
            self.events.post(self.event(line));
        }
    }

    /// Posts whatever partial line is left over.
    pub fn flush(&self) {
        let rest = std::mem::take(&mut *self.pending.borrow_mut());
        if !rest.is_empty() {
            self.events.post(self.event(rest));
        }
    }
}
