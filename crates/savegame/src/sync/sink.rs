use crossbeam_channel::Sender;
use tracing::warn;

use crate::store::SaveRecordRow;

/// Write side of one save's row queue. Cloneable and `Send`, so a participant
/// may hand it to its own worker and append later.
#[derive(Debug, Clone)]
pub struct RowSink {
    save_name: String,
    sender: Sender<SaveRecordRow>,
}

impl RowSink {
    pub(crate) fn new(save_name: impl Into<String>, sender: Sender<SaveRecordRow>) -> Self {
        Self {
            save_name: save_name.into(),
            sender,
        }
    }

    pub fn save_name(&self) -> &str {
        &self.save_name
    }

    /// Queues `row` for the writer. Rows tagged for another save are dropped.
    pub fn append(&self, row: SaveRecordRow) -> bool {
        if row.save_name != self.save_name {
            warn!(
                expected = %self.save_name,
                actual = %row.save_name,
                participant = %row.character_name,
                "stale_row_dropped"
            );
            return false;
        }
        let character_name = row.character_name.clone();
        if self.sender.send(row).is_err() {
            warn!(
                save_name = %self.save_name,
                participant = %character_name,
                "row_writer_closed"
            );
            return false;
        }
        true
    }
}
