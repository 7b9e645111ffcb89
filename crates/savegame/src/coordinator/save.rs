use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use super::report::{OperationKind, OperationOutcome, OperationReport, SaveError};
use super::system::Services;
use super::wait::{ConvergenceWait, WaitOutcome};
use super::writer::spawn_row_writer;
use crate::store::save_name_for;
use crate::sync::{RowSink, SaveRequested};

pub(crate) type NameSource = Box<dyn FnMut() -> NaiveDateTime>;

pub(crate) fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Saving,
}

struct ActiveSave {
    save_name: String,
    wait: ConvergenceWait,
    elapsed: Duration,
}

/// `Idle -> Saving -> (Converged | TimedOut) -> Idle`.
pub(crate) struct SaveCoordinator {
    active: Option<ActiveSave>,
    name_source: NameSource,
}

impl SaveCoordinator {
    pub(crate) fn new(name_source: NameSource) -> Self {
        Self {
            active: None,
            name_source,
        }
    }

    pub(crate) fn set_name_source(&mut self, name_source: NameSource) {
        self.name_source = name_source;
    }

    pub(crate) fn state(&self) -> SaveState {
        if self.active.is_some() {
            SaveState::Saving
        } else {
            SaveState::Idle
        }
    }

    pub(crate) fn active_save_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.save_name.as_str())
    }

    pub(crate) fn is_settling(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.wait.is_settling())
    }

    /// Creates the save file, fans the request out and freezes simulated time.
    pub(crate) fn begin(&mut self, services: &mut Services) -> Result<String, SaveError> {
        let expected = services.registry.on_save_requested.subscriber_labels();
        let save_name = save_name_for((self.name_source)());
        let scene_name = services.scenes.active_scene_name();

        let handle = services.store.create_save(&save_name, &scene_name)?;
        let progress = services.counter.reset(expected.clone());
        let (sender, receiver) = crossbeam_channel::unbounded();
        spawn_row_writer(services.store.clone(), handle, receiver, progress)
            .map_err(SaveError::WorkerSpawn)?;

        if expected.is_empty() {
            warn!(save_name = %save_name, "save_without_participants");
        }
        info!(
            save_name = %save_name,
            scene = %scene_name,
            participants = expected.len(),
            "save_started"
        );

        let report = services.registry.on_save_requested.publish(&SaveRequested {
            save_name: save_name.clone(),
            scene_name,
            sink: RowSink::new(save_name.clone(), sender),
        });
        if !report.failures.is_empty() {
            warn!(
                save_name = %save_name,
                failed = report.failures.len(),
                "save_participants_failed"
            );
        }
        services.clock.pause();

        let settle_delay = if expected.is_empty() {
            Duration::ZERO
        } else {
            services.config.settle_delay
        };
        self.active = Some(ActiveSave {
            save_name: save_name.clone(),
            wait: ConvergenceWait::new(settle_delay, services.config.convergence_timeout),
            elapsed: Duration::ZERO,
        });
        Ok(save_name)
    }

    pub(crate) fn advance(
        &mut self,
        services: &mut Services,
        real_dt: Duration,
    ) -> Option<OperationReport> {
        let active = self.active.as_mut()?;
        active.elapsed += real_dt;
        let counter = &services.counter;
        let outcome = active
            .wait
            .poll(real_dt, || counter.snapshot().is_converged())?;

        let active = self.active.take()?;
        Some(finish(services, active, outcome))
    }
}

fn finish(services: &mut Services, active: ActiveSave, outcome: WaitOutcome) -> OperationReport {
    let snapshot = services.counter.snapshot();
    let missing = snapshot.missing();
    let outcome = match outcome {
        WaitOutcome::Converged => {
            info!(
                save_name = %active.save_name,
                managed = snapshot.managed,
                elapsed_ms = active.elapsed.as_millis() as u64,
                "save_converged"
            );
            OperationOutcome::Converged
        }
        WaitOutcome::TimedOut => {
            warn!(
                save_name = %active.save_name,
                managed = snapshot.managed,
                expected = snapshot.to_manage,
                missing = ?missing,
                "save_timed_out"
            );
            OperationOutcome::TimedOut
        }
    };

    match services.store.prune_oldest(services.config.max_save_count) {
        Ok(removed) if !removed.is_empty() => {
            info!(removed = ?removed, keep = services.config.max_save_count, "saves_pruned");
        }
        Ok(_) => {}
        Err(error) => warn!(error = %error, "save_prune_failed"),
    }
    services.clock.resume();

    OperationReport {
        kind: OperationKind::Save,
        save_name: active.save_name,
        outcome,
        managed: snapshot.managed,
        expected: snapshot.to_manage,
        missing,
        elapsed: active.elapsed,
    }
}
