mod clock;
mod dispatcher;
mod loop_runner;
mod scene;

pub use clock::SimulationClock;
pub use dispatcher::{DrainReport, MainThreadDispatcher};
pub use loop_runner::{run_headless, FixedStepper, LoopConfig, LoopSummary, Simulation};
pub use scene::{SceneError, SceneLoadHandle, SceneLoadMode, SceneLoader, SimulatedSceneLoader};
