mod atomic_io;
mod record_store;
mod row;
mod types;

pub use record_store::{save_name_for, RecordStore, SAVE_NAME_FORMAT};
pub use row::{find_row, Position3, Rotation4, SaveRecordRow};
pub use types::{SaveEntry, SaveHandle, StoreError};
