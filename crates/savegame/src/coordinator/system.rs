use std::cell::Cell;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use super::load::{LoadCoordinator, LoadState};
use super::report::{LoadError, OperationKind, OperationReport, SaveError};
use super::save::{local_now, SaveCoordinator, SaveState};
use crate::app::{MainThreadDispatcher, SceneLoader, SimulationClock};
use crate::config::{SaveConfig, StartupError};
use crate::store::{RecordStore, StoreError};
use crate::sync::{ConvergenceCounter, ConvergenceSnapshot, ParticipantRegistry};

/// Everything the coordinators share.
pub(crate) struct Services {
    pub(crate) config: SaveConfig,
    pub(crate) store: RecordStore,
    pub(crate) registry: ParticipantRegistry,
    pub(crate) counter: ConvergenceCounter,
    pub(crate) clock: SimulationClock,
    pub(crate) scenes: Box<dyn SceneLoader>,
    pub(crate) loading: Cell<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationProgress {
    pub kind: OperationKind,
    pub save_name: String,
    pub phase: &'static str,
    pub convergence: ConvergenceSnapshot,
    pub scene_progress: Option<f32>,
}

/// Application context for save and load. Owned by the main thread and
/// ticked once per frame.
pub struct SaveSystem {
    services: Services,
    save: SaveCoordinator,
    load: LoadCoordinator,
    dispatcher: MainThreadDispatcher<LoadCoordinator>,
}

impl SaveSystem {
    /// Ensures the save directory exists and wires up the coordinators.
    pub fn new(
        config: SaveConfig,
        scenes: Box<dyn SceneLoader>,
        clock: SimulationClock,
    ) -> Result<Self, StartupError> {
        config.prepare_save_dir()?;
        let store = RecordStore::new(
            config.save_dir.clone(),
            config.file_extension.clone(),
            config.header_character_name.clone(),
        );
        info!(
            save_dir = %config.save_dir.display(),
            max_save_count = config.max_save_count,
            convergence_timeout_ms = config.convergence_timeout.as_millis() as u64,
            "save_system_ready"
        );
        Ok(Self {
            services: Services {
                config,
                store,
                registry: ParticipantRegistry::new(),
                counter: ConvergenceCounter::default(),
                clock,
                scenes,
                loading: Cell::new(false),
            },
            save: SaveCoordinator::new(Box::new(local_now)),
            load: LoadCoordinator::default(),
            dispatcher: MainThreadDispatcher::new(),
        })
    }

    /// Replaces the wall clock used to name saves.
    pub fn with_name_source<F>(mut self, name_source: F) -> Self
    where
        F: FnMut() -> NaiveDateTime + 'static,
    {
        self.save.set_name_source(Box::new(name_source));
        self
    }

    pub fn config(&self) -> &SaveConfig {
        &self.services.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.services.store
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.services.registry
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.services.clock
    }

    pub fn scenes(&self) -> &dyn SceneLoader {
        self.services.scenes.as_ref()
    }

    pub fn scenes_mut(&mut self) -> &mut dyn SceneLoader {
        self.services.scenes.as_mut()
    }

    pub fn save_state(&self) -> SaveState {
        self.save.state()
    }

    pub fn load_state(&self) -> LoadState {
        self.load.state()
    }

    /// Starts a save and returns its name. Rejected while another save or
    /// load is running; failures are logged before being returned.
    pub fn request_save(&mut self) -> Result<String, SaveError> {
        if let Some(active) = self.active_kind() {
            warn!(active = %active, "save_request_ignored_busy");
            return Err(SaveError::Busy { active });
        }
        self.save.begin(&mut self.services).map_err(|error| {
            error!(error = %error, "save_failed");
            error
        })
    }

    /// Starts loading the newest save and returns its name.
    pub fn request_load(&mut self) -> Result<String, LoadError> {
        if let Some(active) = self.active_kind() {
            warn!(active = %active, "load_request_ignored_busy");
            return Err(LoadError::Busy { active });
        }
        self.load
            .begin(&mut self.services, &self.dispatcher)
            .map_err(|error| {
                error!(error = %error, "load_failed");
                error
            })
    }

    pub fn is_save_available(&self) -> bool {
        self.services.store.is_save_available()
    }

    pub fn list_saves(&self) -> Result<Vec<String>, StoreError> {
        self.services.store.list_saves()
    }

    pub fn is_loading(&self) -> bool {
        self.services.loading.get()
    }

    pub fn is_busy(&self) -> bool {
        self.active_kind().is_some()
    }

    pub fn progress(&self) -> Option<OperationProgress> {
        if let Some(save_name) = self.save.active_save_name() {
            let phase = if self.save.is_settling() {
                "settling"
            } else {
                "awaiting_participants"
            };
            return Some(OperationProgress {
                kind: OperationKind::Save,
                save_name: save_name.to_string(),
                phase,
                convergence: self.services.counter.snapshot(),
                scene_progress: None,
            });
        }
        let save_name = self.load.active_save_name()?;
        let phase = match self.load.state() {
            LoadState::Idle => "idle",
            LoadState::LocatingFile => "locating_file",
            LoadState::LoadingScene => "loading_scene",
            LoadState::AwaitingParticipants => "awaiting_participants",
        };
        Some(OperationProgress {
            kind: OperationKind::Load,
            save_name: save_name.to_string(),
            phase,
            convergence: self.services.counter.snapshot(),
            scene_progress: self.load.scene_progress(),
        })
    }

    /// Advances scene loads, runs main-thread continuations and both
    /// coordinators by `real_dt` of wall-clock time. Returns the operations
    /// that finished during this tick.
    pub fn tick(&mut self, real_dt: Duration) -> Vec<OperationReport> {
        self.services.scenes.update();
        self.dispatcher.drain(&mut self.load);

        let mut finished = Vec::new();
        if let Some(report) = self.save.advance(&mut self.services, real_dt) {
            finished.push(report);
        }
        if let Some(report) = self.load.advance(&mut self.services, real_dt) {
            finished.push(report);
        }
        for report in &finished {
            self.services.registry.on_operation_finished.publish(report);
        }
        finished
    }

    fn active_kind(&self) -> Option<OperationKind> {
        if self.save.state() != SaveState::Idle {
            Some(OperationKind::Save)
        } else if self.load.state() != LoadState::Idle {
            Some(OperationKind::Load)
        } else {
            None
        }
    }
}
