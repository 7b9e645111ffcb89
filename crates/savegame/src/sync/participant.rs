use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::channel::{EventChannel, SubscriptionId};
use super::counter::ProgressReporter;
use super::sink::RowSink;
use crate::coordinator::OperationReport;
use crate::store::{find_row, SaveRecordRow};

#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("participant '{character_name}' has no state to save: {detail}")]
    MissingState {
        character_name: String,
        detail: String,
    },
    #[error("invalid payload in field {field}: {source}")]
    InvalidPayload {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{message}")]
    Rejected { message: String },
}

/// "Serialize yourself now and append your row through `sink`."
#[derive(Debug, Clone)]
pub struct SaveRequested {
    pub save_name: String,
    pub scene_name: String,
    pub sink: RowSink,
}

/// The full row set of the save that just finished loading.
#[derive(Debug, Clone)]
pub struct LoadCompleted {
    pub save_name: String,
    pub rows: Arc<[SaveRecordRow]>,
    header_name: String,
    progress: ProgressReporter,
}

impl LoadCompleted {
    pub(crate) fn new(
        save_name: impl Into<String>,
        rows: Arc<[SaveRecordRow]>,
        header_name: impl Into<String>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            save_name: save_name.into(),
            rows,
            header_name: header_name.into(),
            progress,
        }
    }

    pub fn header(&self) -> Option<&SaveRecordRow> {
        self.rows.first()
    }

    pub fn row_for(&self, character_name: &str) -> Option<&SaveRecordRow> {
        find_row(&self.rows, character_name, &self.header_name)
    }

    /// Counts `character_name` as done applying its row.
    pub fn report_applied(&self, character_name: &str) -> bool {
        self.progress.report(character_name)
    }
}

/// A live object whose state takes part in save and load.
pub trait Participant {
    /// Stable identity; unique among live participants.
    fn character_name(&self) -> String;

    fn capture(&self, save_name: &str, scene_name: &str)
        -> Result<SaveRecordRow, ParticipantError>;

    fn restore(&mut self, row: &SaveRecordRow) -> Result<(), ParticipantError>;
}

/// Subscriptions created by [`ParticipantRegistry::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    save: SubscriptionId,
    load: SubscriptionId,
}

#[derive(Clone)]
pub struct ParticipantRegistry {
    pub on_save_requested: EventChannel<SaveRequested>,
    pub on_load_completed: EventChannel<LoadCompleted>,
    pub on_operation_finished: EventChannel<OperationReport>,
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self {
            on_save_requested: EventChannel::new("save_requested"),
            on_load_completed: EventChannel::new("load_completed"),
            on_operation_finished: EventChannel::new("operation_finished"),
        }
    }
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `participant` to both save and load. Call from the
    /// participant's enable hook and pair with [`Self::detach`] on disable.
    pub fn attach<P>(&self, participant: &Rc<RefCell<P>>) -> Attachment
    where
        P: Participant + 'static,
    {
        let label = participant.borrow().character_name();

        let saver = Rc::clone(participant);
        let save = self
            .on_save_requested
            .subscribe(label.clone(), move |request: &SaveRequested| {
                let row = saver
                    .borrow()
                    .capture(&request.save_name, &request.scene_name)?;
                request.sink.append(row);
                Ok(())
            });

        let loader = Rc::clone(participant);
        let load = self
            .on_load_completed
            .subscribe(label, move |loaded: &LoadCompleted| {
                let character_name = loader.borrow().character_name();
                let Some(row) = loaded.row_for(&character_name) else {
                    debug!(participant = %character_name, "no_saved_row_for_participant");
                    return Ok(());
                };
                loader.borrow_mut().restore(row)?;
                loaded.report_applied(&character_name);
                Ok(())
            });

        Attachment { save, load }
    }

    pub fn detach(&self, attachment: Attachment) -> bool {
        let save = self.on_save_requested.unsubscribe(attachment.save);
        let load = self.on_load_completed.unsubscribe(attachment.load);
        save && load
    }
}
