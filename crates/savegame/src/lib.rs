pub mod app;
pub mod config;
pub mod coordinator;
pub mod store;
pub mod sync;
pub mod variables;

pub use app::{
    run_headless, DrainReport, FixedStepper, LoopConfig, LoopSummary, MainThreadDispatcher,
    SceneError, SceneLoadHandle, SceneLoadMode, SceneLoader, SimulatedSceneLoader, Simulation,
    SimulationClock,
};
pub use config::{
    SaveConfig, StartupError, MAX_SAVES_ENV_VAR, SAVE_DIR_ENV_VAR, SAVE_TIMEOUT_ENV_VAR,
};
pub use coordinator::{
    LoadError, LoadState, OperationKind, OperationOutcome, OperationProgress, OperationReport,
    SaveError, SaveState, SaveSystem,
};
pub use store::{
    find_row, save_name_for, Position3, RecordStore, Rotation4, SaveEntry, SaveHandle,
    SaveRecordRow, StoreError, SAVE_NAME_FORMAT,
};
pub use sync::{
    Attachment, ConvergenceCounter, ConvergenceSnapshot, EventChannel, HandlerFailure,
    HandlerResult, LoadCompleted, Participant, ParticipantError, ParticipantRegistry,
    ProgressReporter, PublishReport, RowSink, SaveRequested, SubscriptionId,
};
pub use variables::{
    DialogStateParticipant, VariableConsumerTable, VariableMap, VariableStorage,
    VariableStorageConsumer, DIALOG_STATE_CHARACTER_NAME,
};
