use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Converged,
    TimedOut,
}

/// Tick-driven replacement for "sleep a moment, then poll until everyone
/// reported or the ceiling elapses". All durations are real time.
#[derive(Debug, Clone)]
pub(crate) struct ConvergenceWait {
    settle_delay: Duration,
    settled: Duration,
    waited: Duration,
    timeout: Duration,
}

impl ConvergenceWait {
    pub(crate) fn new(settle_delay: Duration, timeout: Duration) -> Self {
        Self {
            settle_delay,
            settled: Duration::ZERO,
            waited: Duration::ZERO,
            timeout,
        }
    }

    pub(crate) fn is_settling(&self) -> bool {
        self.settled < self.settle_delay
    }

    /// Advances by `real_dt`. `converged` is read after settling, so reports
    /// that land during the settle delay still count.
    pub(crate) fn poll(
        &mut self,
        real_dt: Duration,
        converged: impl FnOnce() -> bool,
    ) -> Option<WaitOutcome> {
        let mut remaining = real_dt;
        if self.is_settling() {
            let needed = self.settle_delay - self.settled;
            if remaining < needed {
                self.settled += remaining;
                return None;
            }
            self.settled = self.settle_delay;
            remaining -= needed;
        }

        if converged() {
            return Some(WaitOutcome::Converged);
        }
        self.waited += remaining;
        if self.waited >= self.timeout {
            Some(WaitOutcome::TimedOut)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_millis(100);
    const TIMEOUT: Duration = Duration::from_secs(15);

    #[test]
    fn does_not_poll_before_settle_delay() {
        let mut wait = ConvergenceWait::new(SETTLE, TIMEOUT);
        let mut polled = false;
        assert_eq!(
            wait.poll(Duration::from_millis(50), || {
                polled = true;
                true
            }),
            None
        );
        assert!(!polled);
        assert_eq!(
            wait.poll(Duration::from_millis(50), || true),
            Some(WaitOutcome::Converged)
        );
    }

    #[test]
    fn converges_before_ceiling() {
        let mut wait = ConvergenceWait::new(Duration::ZERO, TIMEOUT);
        assert_eq!(wait.poll(Duration::from_secs(14), || false), None);
        assert_eq!(
            wait.poll(Duration::from_millis(500), || true),
            Some(WaitOutcome::Converged)
        );
    }

    #[test]
    fn times_out_exactly_at_ceiling() {
        let mut wait = ConvergenceWait::new(SETTLE, TIMEOUT);
        assert_eq!(wait.poll(SETTLE, || false), None);
        assert_eq!(wait.poll(Duration::from_millis(14_999), || false), None);
        assert_eq!(
            wait.poll(Duration::from_millis(1), || false),
            Some(WaitOutcome::TimedOut)
        );
    }

    #[test]
    fn settle_excess_counts_toward_ceiling() {
        let mut wait = ConvergenceWait::new(SETTLE, Duration::from_secs(1));
        assert_eq!(
            wait.poll(Duration::from_millis(1_100), || false),
            Some(WaitOutcome::TimedOut)
        );
    }
}
