use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{error, warn};

use super::participant::ParticipantError;

pub type HandlerResult = Result<(), ParticipantError>;

type SharedHandler<E> = Rc<RefCell<dyn FnMut(&E) -> HandlerResult>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<E> {
    id: SubscriptionId,
    label: String,
    handler: SharedHandler<E>,
}

struct ChannelState<E> {
    next_id: u64,
    subscribers: Vec<Subscriber<E>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failures: Vec<HandlerFailure>,
}

/// Observer list for one event type. Main-thread only.
///
/// Publishing iterates a copy of the subscriber list, so handlers may
/// subscribe or unsubscribe (themselves or others) while being called; the
/// change takes effect on the next publish.
pub struct EventChannel<E> {
    name: &'static str,
    state: Rc<RefCell<ChannelState<E>>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Rc::clone(&self.state),
        }
    }
}

impl<E> EventChannel<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Rc::new(RefCell::new(ChannelState {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers `handler` under a participant label used in diagnostics.
    pub fn subscribe<F>(&self, label: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) -> HandlerResult + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        let handler: SharedHandler<E> = Rc::new(RefCell::new(handler));
        state.subscribers.push(Subscriber {
            id,
            label: label.into(),
            handler,
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id != id);
        state.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    pub fn subscriber_labels(&self) -> Vec<String> {
        self.state
            .borrow()
            .subscribers
            .iter()
            .map(|subscriber| subscriber.label.clone())
            .collect()
    }

    /// Calls every current subscriber once. A handler that errors or panics
    /// is logged and does not stop delivery to the rest.
    pub fn publish(&self, event: &E) -> PublishReport {
        let snapshot: Vec<(String, SharedHandler<E>)> = self
            .state
            .borrow()
            .subscribers
            .iter()
            .map(|subscriber| (subscriber.label.clone(), Rc::clone(&subscriber.handler)))
            .collect();

        let mut report = PublishReport::default();
        for (label, handler) in snapshot {
            let Ok(mut handler) = handler.try_borrow_mut() else {
                warn!(
                    channel = self.name,
                    participant = %label,
                    "reentrant_publish_skipped"
                );
                report.skipped += 1;
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (&mut *handler)(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(failure)) => {
                    error!(
                        channel = self.name,
                        participant = %label,
                        error = %failure,
                        "participant_failed"
                    );
                    report.failures.push(HandlerFailure {
                        label,
                        message: failure.to_string(),
                    });
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        channel = self.name,
                        participant = %label,
                        panic = %message,
                        "participant_panicked"
                    );
                    report.failures.push(HandlerFailure { label, message });
                }
            }
        }
        report
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
