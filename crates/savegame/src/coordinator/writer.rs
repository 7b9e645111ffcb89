use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, error};

use crate::store::{RecordStore, SaveHandle, SaveRecordRow};
use crate::sync::ProgressReporter;

pub(crate) const ROW_WRITER_THREAD_NAME: &str = "save-row-writer";

/// Owns the open save and appends rows in arrival order until every sink is
/// dropped. Each durable append counts one participant as done.
pub(crate) fn spawn_row_writer(
    store: RecordStore,
    mut handle: SaveHandle,
    rows: Receiver<SaveRecordRow>,
    progress: ProgressReporter,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(ROW_WRITER_THREAD_NAME.to_string())
        .spawn(move || {
            for row in rows.iter() {
                let character_name = row.character_name.clone();
                match store.append_row(&mut handle, row) {
                    Ok(id) => {
                        debug!(
                            save_name = handle.save_name(),
                            participant = %character_name,
                            row_id = id,
                            "row_appended"
                        );
                        progress.report(&character_name);
                    }
                    Err(error) => error!(
                        save_name = handle.save_name(),
                        participant = %character_name,
                        error = %error,
                        "row_append_failed"
                    ),
                }
            }
            debug!(
                save_name = handle.save_name(),
                rows_written = handle.rows_written(),
                "row_writer_finished"
            );
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::sync::ConvergenceCounter;

    #[test]
    fn writer_appends_rows_and_reports_each_one() {
        let temp = TempDir::new().expect("tempdir");
        let store = RecordStore::new(temp.path(), "db", "InitialRow");
        let handle = store.create_save("save", "Forest").expect("create");
        let counter = ConvergenceCounter::default();
        let progress = counter.reset(vec!["Player".to_string(), "Okto".to_string()]);
        let (sender, receiver) = crossbeam_channel::unbounded();

        let writer = spawn_row_writer(store.clone(), handle, receiver, progress).expect("spawn");
        sender
            .send(SaveRecordRow::new("save", "Player"))
            .expect("send");
        sender.send(SaveRecordRow::new("save", "Okto")).expect("send");
        drop(sender);
        writer.join().expect("writer thread");

        assert!(counter.snapshot().is_converged());
        assert_eq!(store.read_all_rows("save").expect("rows").len(), 3);
    }

    #[test]
    fn rejected_rows_are_not_counted() {
        let temp = TempDir::new().expect("tempdir");
        let store = RecordStore::new(temp.path(), "db", "InitialRow");
        let handle = store.create_save("save", "Forest").expect("create");
        let counter = ConvergenceCounter::default();
        let progress = counter.reset(vec!["Player".to_string(), "Twin".to_string()]);
        let (sender, receiver) = crossbeam_channel::unbounded();

        let writer = spawn_row_writer(store.clone(), handle, receiver, progress).expect("spawn");
        sender
            .send(SaveRecordRow::new("save", "Player"))
            .expect("send");
        sender
            .send(SaveRecordRow::new("save", "Player"))
            .expect("send");
        drop(sender);
        writer.join().expect("writer thread");

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.managed, 1);
        assert_eq!(snapshot.missing(), vec!["Twin".to_string()]);
    }
}
