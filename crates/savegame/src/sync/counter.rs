use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

static COUNTER_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_counter_lock_poison_once() {
    if COUNTER_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!("convergence counter lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceSnapshot {
    pub managed: usize,
    pub to_manage: usize,
    pub expected: Vec<String>,
    pub reported: Vec<String>,
}

impl ConvergenceSnapshot {
    pub fn is_converged(&self) -> bool {
        self.managed >= self.to_manage
    }

    /// Expected participants that have not reported yet.
    pub fn missing(&self) -> Vec<String> {
        let mut reported = self.reported.clone();
        let mut missing = Vec::new();
        for name in &self.expected {
            match reported.iter().position(|entry| entry == name) {
                Some(index) => {
                    reported.swap_remove(index);
                }
                None => missing.push(name.clone()),
            }
        }
        missing
    }
}

#[derive(Debug, Default)]
struct ConvergenceState {
    generation: u64,
    managed: usize,
    to_manage: usize,
    expected: Vec<String>,
    reported: Vec<String>,
}

/// Process-wide `(objects_managed, objects_to_manage)` pair shared by the
/// save and load paths. Increments may come from the writer thread and from
/// main-thread handlers alike.
#[derive(Clone, Debug, Default)]
pub struct ConvergenceCounter {
    state: Arc<Mutex<ConvergenceState>>,
}

impl ConvergenceCounter {
    /// Starts a new operation expecting one report per entry in `expected`.
    /// Reporters handed out for earlier operations become inert.
    pub fn reset(&self, expected: Vec<String>) -> ProgressReporter {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.managed = 0;
        state.to_manage = expected.len();
        state.expected = expected;
        state.reported.clear();
        ProgressReporter {
            counter: self.clone(),
            generation: state.generation,
        }
    }

    pub fn snapshot(&self) -> ConvergenceSnapshot {
        let state = self.lock();
        ConvergenceSnapshot {
            managed: state.managed,
            to_manage: state.to_manage,
            expected: state.expected.clone(),
            reported: state.reported.clone(),
        }
    }

    fn report(&self, generation: u64, name: &str) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(participant = name, "stale_progress_report_ignored");
            return false;
        }
        state.managed += 1;
        state.reported.push(name.to_string());
        true
    }

    fn lock(&self) -> MutexGuard<'_, ConvergenceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_counter_lock_poison_once();
                poisoned.into_inner()
            }
        }
    }
}

/// Handle a participant (or the writer thread) uses to say "done" for the
/// operation it was created for.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    counter: ConvergenceCounter,
    generation: u64,
}

impl ProgressReporter {
    /// Returns `false` when the operation this reporter belongs to is over.
    pub fn report(&self, name: &str) -> bool {
        self.counter.report(self.generation, name)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn converges_once_every_expected_participant_reports() {
        let counter = ConvergenceCounter::default();
        let reporter = counter.reset(names(&["Player", "Okto"]));
        assert!(!counter.snapshot().is_converged());

        reporter.report("Okto");
        let partial = counter.snapshot();
        assert_eq!(partial.managed, 1);
        assert_eq!(partial.missing(), names(&["Player"]));

        reporter.report("Player");
        let done = counter.snapshot();
        assert!(done.is_converged());
        assert!(done.missing().is_empty());
    }

    #[test]
    fn empty_operation_is_converged_immediately() {
        let counter = ConvergenceCounter::default();
        counter.reset(Vec::new());
        assert!(counter.snapshot().is_converged());
    }

    #[test]
    fn reset_discards_previous_progress_and_stale_reporters() {
        let counter = ConvergenceCounter::default();
        let old = counter.reset(names(&["Player"]));
        old.report("Player");

        let fresh = counter.reset(names(&["Player", "Okto"]));
        assert_eq!(counter.snapshot().managed, 0);
        assert!(!old.report("Player"));
        assert!(fresh.report("Player"));
        assert_eq!(counter.snapshot().managed, 1);
    }

    #[test]
    fn concurrent_reports_are_all_counted() {
        let counter = ConvergenceCounter::default();
        let expected: Vec<String> = (0..32).map(|index| format!("p{index}")).collect();
        let reporter = counter.reset(expected.clone());

        thread::scope(|scope| {
            for name in &expected {
                let reporter = reporter.clone();
                scope.spawn(move || {
                    reporter.report(name);
                });
            }
        });

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.managed, 32);
        assert!(snapshot.is_converged());
    }

    #[test]
    fn counter_recovers_after_poison_without_panic() {
        let counter = ConvergenceCounter::default();
        let reporter = counter.reset(names(&["Player"]));
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = counter.state.lock().expect("lock");
                    panic!("poison counter lock");
                })
                .join();
        });

        assert!(reporter.report("Player"));
        assert!(counter.snapshot().is_converged());
    }
}
