mod channel;
mod counter;
mod participant;
mod sink;

pub(crate) use channel::panic_message;
pub use channel::{EventChannel, HandlerFailure, HandlerResult, PublishReport, SubscriptionId};
pub use counter::{ConvergenceCounter, ConvergenceSnapshot, ProgressReporter};
pub use participant::{
    Attachment, LoadCompleted, Participant, ParticipantError, ParticipantRegistry, SaveRequested,
};
pub use sink::RowSink;
