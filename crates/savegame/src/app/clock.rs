use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ClockState {
    paused: bool,
    time_scale: f32,
}

/// Shared simulation time scale. Pausing freezes simulated time only; real
/// time keeps flowing for timeouts and UI.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    state: Rc<Cell<ClockState>>,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            state: Rc::new(Cell::new(ClockState {
                paused: false,
                time_scale: 1.0,
            })),
        }
    }
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.update(|state| state.paused = true);
    }

    pub fn resume(&self) {
        self.update(|state| state.paused = false);
    }

    pub fn is_paused(&self) -> bool {
        self.state.get().paused
    }

    /// Negative and non-finite scales are treated as zero.
    pub fn set_time_scale(&self, scale: f32) {
        let scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
        self.update(|state| state.time_scale = scale);
    }

    pub fn time_scale(&self) -> f32 {
        let state = self.state.get();
        if state.paused {
            0.0
        } else {
            state.time_scale
        }
    }

    /// Converts a real-time step into simulated time.
    pub fn scale(&self, real_dt: Duration) -> Duration {
        let scale = self.time_scale();
        if scale == 0.0 {
            Duration::ZERO
        } else if scale == 1.0 {
            real_dt
        } else {
            real_dt.mul_f64(f64::from(scale))
        }
    }

    fn update(&self, apply: impl FnOnce(&mut ClockState)) {
        let mut state = self.state.get();
        apply(&mut state);
        self.state.set(state);
    }
}
