use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use futures::{
    channel::oneshot,
    future::{self, LocalBoxFuture},
    FutureExt,
};
use serde::{Deserialize, Serialize};

use crate::{EventSink, Outbound};

/// What to do when a script asks for input while an earlier request is still unanswered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPolicy {
    /// Forget the earlier request; only the newest one can be answered. Whoever was waiting on
    /// the earlier one waits forever.
    #[default]
    Replace,
    /// Answer requests in the order they were made.
    Queue,
}

/// Connects a script's blocking "read a line" call to the UI's asynchronous answer.
///
/// Clones share the pending requests.
#[derive(Clone)]
pub struct InputBridge {
    policy: InputPolicy,
    pending: Rc<RefCell<VecDeque<oneshot::Sender<String>>>>,
    events: Rc<dyn EventSink>,
}

impl InputBridge {
    pub fn new(policy: InputPolicy, events: Rc<dyn EventSink>) -> InputBridge {
        InputBridge {
            policy,
            pending: Rc::default(),
            events,
        }
    }

    pub fn policy(&self) -> InputPolicy {
        self.policy
    }

    /// Asks the UI for a line of text.
    ///
    /// The request is posted immediately; the returned future resolves when the UI responds.
    pub fn request(&self, prompt: &str) -> LocalBoxFuture<'static, String> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.borrow_mut();
            if self.policy == InputPolicy::Replace && !pending.is_empty() {
                log::warn!(
                    "new input request while {} still pending; the old one will never be answered",
                    pending.len()
                );
                pending.clear();
            }
            pending.push_back(tx);
        }
        self.events.post(Outbound::InputRequest {
            prompt: prompt.to_owned(),
        });

        async move {
            match rx.await {
                Ok(text) => text,
                // Our sender was thrown away, so nobody will ever answer.
                Err(oneshot::Canceled) => future::pending().await,
            }
        }
        .boxed_local()
    }

    /// Answers the oldest outstanding request. Returns `false` if there wasn't one.
    pub fn respond(&self, mut text: String) -> bool {
        loop {
            let Some(tx) = self.pending.borrow_mut().pop_front() else {
                log::debug!("ignoring input response with nothing pending");
                return false;
            };
            match tx.send(text) {
                Ok(()) => return true,
                // The requesting future was dropped; try the next one in line.
                Err(returned) => {
                    log::debug!("input requester went away");
                    text = returned;
                }
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}
