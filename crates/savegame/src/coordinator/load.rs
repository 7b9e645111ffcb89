use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::report::{LoadError, OperationKind, OperationOutcome, OperationReport};
use super::system::Services;
use super::wait::{ConvergenceWait, WaitOutcome};
use crate::app::{MainThreadDispatcher, SceneLoadHandle, SceneLoadMode};
use crate::store::{SaveRecordRow, StoreError};
use crate::sync::LoadCompleted;

pub(crate) const ROW_READER_THREAD_NAME: &str = "save-row-reader";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    LocatingFile,
    LoadingScene,
    AwaitingParticipants,
}

enum Phase {
    Idle,
    LocatingFile {
        delivered: Option<Result<Vec<SaveRecordRow>, StoreError>>,
    },
    LoadingScene {
        rows: Arc<[SaveRecordRow]>,
        target: Option<SceneLoadHandle>,
    },
    AwaitingParticipants {
        wait: ConvergenceWait,
    },
}

struct ActiveLoad {
    token: u64,
    save_name: String,
    previous_scene: String,
    loading_screen: Option<SceneLoadHandle>,
    elapsed: Duration,
}

/// `Idle -> LocatingFile -> LoadingScene -> AwaitingParticipants ->
/// (Converged | TimedOut) -> Idle`.
pub(crate) struct LoadCoordinator {
    phase: Phase,
    active: Option<ActiveLoad>,
    next_token: u64,
}

impl Default for LoadCoordinator {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            active: None,
            next_token: 1,
        }
    }
}

impl LoadCoordinator {
    pub(crate) fn state(&self) -> LoadState {
        match self.phase {
            Phase::Idle => LoadState::Idle,
            Phase::LocatingFile { .. } => LoadState::LocatingFile,
            Phase::LoadingScene { .. } => LoadState::LoadingScene,
            Phase::AwaitingParticipants { .. } => LoadState::AwaitingParticipants,
        }
    }

    pub(crate) fn active_save_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.save_name.as_str())
    }

    pub(crate) fn scene_progress(&self) -> Option<f32> {
        match &self.phase {
            Phase::LoadingScene {
                target: Some(handle),
                ..
            } => Some(handle.progress()),
            _ => None,
        }
    }

    /// Picks the newest save, shows the loading screen and starts reading
    /// rows off the main thread.
    pub(crate) fn begin(
        &mut self,
        services: &mut Services,
        dispatcher: &MainThreadDispatcher<LoadCoordinator>,
    ) -> Result<String, LoadError> {
        let save_name = services.store.latest_save()?.ok_or(LoadError::NoSave)?;
        let previous_scene = services.scenes.active_scene_name();
        let loading_screen = services.scenes.load_scene_async(
            &services.config.loading_scene_name,
            services.config.loading_scene_mode,
        )?;

        let token = self.next_token;
        self.next_token += 1;
        let store = services.store.clone();
        let reply = dispatcher.clone();
        let reader_save_name = save_name.clone();
        let spawned = thread::Builder::new()
            .name(ROW_READER_THREAD_NAME.to_string())
            .spawn(move || {
                let result = store.read_all_rows(&reader_save_name);
                reply.enqueue(move |load: &mut LoadCoordinator| load.rows_ready(token, result));
            });
        if let Err(source) = spawned {
            let loading_scene = services.config.loading_scene_name.clone();
            unload_or_warn(services, &loading_scene);
            return Err(LoadError::WorkerSpawn(source));
        }

        services.loading.set(true);
        services.clock.pause();
        info!(save_name = %save_name, previous_scene = %previous_scene, "load_started");

        self.active = Some(ActiveLoad {
            token,
            save_name: save_name.clone(),
            previous_scene,
            loading_screen: Some(loading_screen),
            elapsed: Duration::ZERO,
        });
        self.phase = Phase::LocatingFile { delivered: None };
        Ok(save_name)
    }

    /// Main-thread continuation of the background read.
    pub(crate) fn rows_ready(&mut self, token: u64, result: Result<Vec<SaveRecordRow>, StoreError>) {
        let current = self.active.as_ref().map(|active| active.token);
        match (&mut self.phase, current) {
            (Phase::LocatingFile { delivered }, Some(active)) if active == token => {
                *delivered = Some(result);
            }
            _ => debug!(token, "stale_load_rows_ignored"),
        }
    }

    pub(crate) fn advance(
        &mut self,
        services: &mut Services,
        real_dt: Duration,
    ) -> Option<OperationReport> {
        let active = self.active.as_mut()?;
        active.elapsed += real_dt;

        let screen_done = active
            .loading_screen
            .as_ref()
            .map_or(true, SceneLoadHandle::is_done);

        if let Phase::LocatingFile { delivered } = &mut self.phase {
            if !screen_done {
                return None;
            }
            match delivered.take()? {
                Ok(rows) => {
                    info!(save_name = %active.save_name, rows = rows.len(), "load_rows_ready");
                    match start_target_scene(services, rows) {
                        Ok(phase) => self.phase = phase,
                        Err(reason) => return self.fail(services, reason),
                    }
                }
                Err(error) => return self.fail(services, error.to_string()),
            }
        }

        if let Phase::LoadingScene { rows, target } = &self.phase {
            let target_done = target.as_ref().map_or(true, SceneLoadHandle::is_done);
            if !target_done {
                return None;
            }
            let rows = Arc::clone(rows);
            let target = target.as_ref().map(|handle| handle.scene_name().to_string());
            let wait = apply_rows(services, active, rows, target);
            self.phase = Phase::AwaitingParticipants { wait };
        }

        if let Phase::AwaitingParticipants { wait } = &mut self.phase {
            let counter = &services.counter;
            let outcome = wait.poll(real_dt, || counter.snapshot().is_converged())?;
            return self.finish(services, outcome);
        }
        None
    }

    fn fail(&mut self, services: &mut Services, reason: String) -> Option<OperationReport> {
        let active = self.active.take()?;
        self.phase = Phase::Idle;
        error!(save_name = %active.save_name, reason = %reason, "load_failed");
        if active.loading_screen.is_some() {
            let loading_scene = services.config.loading_scene_name.clone();
            unload_or_warn(services, &loading_scene);
        }
        services.loading.set(false);
        services.clock.resume();
        Some(OperationReport {
            kind: OperationKind::Load,
            save_name: active.save_name,
            outcome: OperationOutcome::Failed { reason },
            managed: 0,
            expected: 0,
            missing: Vec::new(),
            elapsed: active.elapsed,
        })
    }

    fn finish(&mut self, services: &mut Services, outcome: WaitOutcome) -> Option<OperationReport> {
        let active = self.active.take()?;
        self.phase = Phase::Idle;
        let snapshot = services.counter.snapshot();
        let missing = snapshot.missing();
        let outcome = match outcome {
            WaitOutcome::Converged => {
                info!(
                    save_name = %active.save_name,
                    managed = snapshot.managed,
                    elapsed_ms = active.elapsed.as_millis() as u64,
                    "load_converged"
                );
                OperationOutcome::Converged
            }
            WaitOutcome::TimedOut => {
                warn!(
                    save_name = %active.save_name,
                    managed = snapshot.managed,
                    expected = snapshot.to_manage,
                    missing = ?missing,
                    "load_timed_out"
                );
                OperationOutcome::TimedOut
            }
        };
        services.loading.set(false);
        services.clock.resume();
        Some(OperationReport {
            kind: OperationKind::Load,
            save_name: active.save_name,
            outcome,
            managed: snapshot.managed,
            expected: snapshot.to_manage,
            missing,
            elapsed: active.elapsed,
        })
    }
}

fn start_target_scene(services: &mut Services, rows: Vec<SaveRecordRow>) -> Result<Phase, String> {
    let scene_name = rows
        .first()
        .map(|header| header.scene_name.clone())
        .unwrap_or_default();
    let target = if scene_name.is_empty() {
        warn!("save_header_without_scene");
        None
    } else {
        let handle = services
            .scenes
            .load_scene_async(&scene_name, SceneLoadMode::Additive)
            .map_err(|error| error.to_string())?;
        Some(handle)
    };
    Ok(Phase::LoadingScene {
        rows: rows.into(),
        target,
    })
}

/// Swaps the loaded scene in, then fans the rows out to participants.
fn apply_rows(
    services: &mut Services,
    active: &ActiveLoad,
    rows: Arc<[SaveRecordRow]>,
    target: Option<String>,
) -> ConvergenceWait {
    let loading_scene = services.config.loading_scene_name.clone();
    if let Some(target) = &target {
        if let Err(error) = services.scenes.set_active_scene(target) {
            warn!(scene = %target, error = %error, "set_active_scene_failed");
        }
    }
    if active.loading_screen.is_some() {
        unload_or_warn(services, &loading_scene);
    }
    let replaced_previous = services.config.loading_scene_mode == SceneLoadMode::Single;
    if let Some(target) = &target {
        if !replaced_previous
            && !active.previous_scene.is_empty()
            && active.previous_scene != *target
            && active.previous_scene != loading_scene
        {
            unload_or_warn(services, &active.previous_scene);
        }
    }

    let header_name = services.store.header_name().to_string();
    let expected: Vec<String> = rows
        .iter()
        .skip(1)
        .map(|row| row.character_name.clone())
        .collect();
    if expected.is_empty() {
        warn!(save_name = %active.save_name, "load_without_participant_rows");
    }
    let settle_delay = if expected.is_empty() {
        Duration::ZERO
    } else {
        services.config.settle_delay
    };
    let progress = services.counter.reset(expected);

    let event = LoadCompleted::new(active.save_name.clone(), rows, header_name, progress);
    let report = services.registry.on_load_completed.publish(&event);
    info!(
        save_name = %active.save_name,
        delivered = report.delivered,
        failed = report.failures.len(),
        "load_rows_dispatched"
    );
    ConvergenceWait::new(settle_delay, services.config.convergence_timeout)
}

fn unload_or_warn(services: &mut Services, scene: &str) {
    if let Err(error) = services.scenes.unload_scene(scene) {
        warn!(scene, error = %error, "scene_unload_failed");
    }
}
