use std::process::ExitCode;

use savegame::{run_headless, SaveSystem, SimulatedSceneLoader, SimulationClock};
use tracing::{error, info};

use super::bootstrap::{frame_budget, AppWiring};
use super::gameplay::{DemoSession, DEMO_SCENES, MEADOW_SCENE};

const SCENE_LOAD_UPDATES: u32 = 3;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let save_config = match app.save_config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let clock = SimulationClock::new();
    let scenes = SimulatedSceneLoader::new(DEMO_SCENES, MEADOW_SCENE, SCENE_LOAD_UPDATES);
    let system = match SaveSystem::new(save_config, Box::new(scenes), clock.clone()) {
        Ok(system) => system,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    info!(
        budget_ms = frame_budget(&app.loop_config).map(|budget| budget.as_millis() as u64),
        "demo_session_starting"
    );
    let mut session = DemoSession::new(system, app.script);
    let summary = run_headless(&app.loop_config, &clock, &mut session);
    let saves = session.system().list_saves().map(|saves| saves.len()).unwrap_or(0);
    let outcome = session.finish();

    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        saves_on_disk = saves,
        success = outcome.is_success(),
        "demo_session_finished"
    );
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        error!(error = ?outcome.error, "demo_session_failed");
        ExitCode::FAILURE
    }
}
