mod load;
mod report;
mod save;
mod system;
mod wait;
mod writer;


pub use load::LoadState;
pub use report::{LoadError, OperationKind, OperationOutcome, OperationReport, SaveError};
pub use save::SaveState;
pub use system::{OperationProgress, SaveSystem};
