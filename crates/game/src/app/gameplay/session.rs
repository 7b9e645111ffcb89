use std::time::Duration;

use savegame::{OperationKind, OperationReport, SaveSystem, Simulation};
use tracing::{debug, error, info, warn};

use super::{World, WorldSnapshot};

#[derive(Debug, Clone)]
pub(crate) struct SessionScript {
    /// Frames to run before the save is requested.
    pub(crate) warmup_frames: u32,
    /// Rough the world up between save and load.
    pub(crate) scramble_before_load: bool,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            warmup_frames: 30,
            scramble_before_load: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Warmup { remaining: u32 },
    Saving,
    Loading,
    Done,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SessionOutcome {
    pub(crate) save: Option<OperationReport>,
    pub(crate) load: Option<OperationReport>,
    pub(crate) restored_matches: bool,
    pub(crate) error: Option<String>,
}

impl SessionOutcome {
    pub(crate) fn is_success(&self) -> bool {
        self.error.is_none()
            && self.restored_matches
            && self.save.as_ref().is_some_and(OperationReport::is_converged)
            && self.load.as_ref().is_some_and(OperationReport::is_converged)
    }
}

/// Scripted run: walk for a while, save, scramble the world, load the save
/// back and check that everything was restored.
pub(crate) struct DemoSession {
    system: SaveSystem,
    world: World,
    step: Step,
    scramble_before_load: bool,
    saved_snapshot: Option<WorldSnapshot>,
    outcome: SessionOutcome,
}

impl DemoSession {
    pub(crate) fn new(system: SaveSystem, script: SessionScript) -> Self {
        let world = World::spawn(system.registry());
        Self {
            system,
            world,
            step: Step::Warmup {
                remaining: script.warmup_frames,
            },
            scramble_before_load: script.scramble_before_load,
            saved_snapshot: None,
            outcome: SessionOutcome::default(),
        }
    }

    pub(crate) fn system(&self) -> &SaveSystem {
        &self.system
    }

    #[cfg(test)]
    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Detaches the world and hands back what happened.
    pub(crate) fn finish(mut self) -> SessionOutcome {
        self.world.disable(self.system.registry());
        self.outcome
    }

    fn begin_save(&mut self) {
        self.saved_snapshot = Some(self.world.snapshot());
        match self.system.request_save() {
            Ok(save_name) => {
                info!(save_name = %save_name, "demo_save_requested");
                self.step = Step::Saving;
            }
            Err(err) => self.abort(format!("save request failed: {err}")),
        }
    }

    fn begin_load(&mut self) {
        if self.scramble_before_load {
            self.world.scramble();
        }
        match self.system.request_load() {
            Ok(save_name) => {
                info!(save_name = %save_name, "demo_load_requested");
                self.step = Step::Loading;
            }
            Err(err) => self.abort(format!("load request failed: {err}")),
        }
    }

    fn on_report(&mut self, report: OperationReport) {
        match (self.step, report.kind) {
            (Step::Saving, OperationKind::Save) => {
                if !report.is_converged() {
                    warn!(missing = ?report.missing, "demo_save_incomplete");
                }
                self.outcome.save = Some(report);
                self.begin_load();
            }
            (Step::Loading, OperationKind::Load) => {
                let restored = self.world.snapshot();
                let matches = self.saved_snapshot.as_ref() == Some(&restored);
                if matches {
                    info!(
                        save_name = %report.save_name,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "demo_state_restored"
                    );
                } else {
                    error!(save_name = %report.save_name, "demo_state_mismatch");
                }
                self.outcome.restored_matches = matches;
                self.outcome.load = Some(report);
                self.step = Step::Done;
            }
            (step, kind) => debug!(?step, kind = %kind, "demo_report_ignored"),
        }
    }

    fn abort(&mut self, reason: String) {
        error!(reason = %reason, "demo_aborted");
        self.outcome.error = Some(reason);
        self.step = Step::Done;
    }
}

impl Simulation for DemoSession {
    fn frame(&mut self, real_dt: Duration) {
        for report in self.system.tick(real_dt) {
            self.on_report(report);
        }
        if let Step::Warmup { remaining } = self.step {
            if remaining > 0 {
                self.step = Step::Warmup {
                    remaining: remaining - 1,
                };
            } else {
                self.begin_save();
            }
        }
    }

    fn fixed_update(&mut self, sim_dt: Duration) {
        self.world.fixed_update(sim_dt);
    }

    fn should_exit(&self) -> bool {
        self.step == Step::Done
    }
}
