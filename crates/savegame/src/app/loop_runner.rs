use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::clock::SimulationClock;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub max_fps: Option<u32>,
    /// Stop after this many frames even if the simulation keeps going.
    pub max_frames: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            max_fps: Some(120),
            max_frames: None,
        }
    }
}

/// Something driven by the headless loop.
pub trait Simulation {
    /// Once per frame with real (unscaled) time.
    fn frame(&mut self, real_dt: Duration);

    /// Once per fixed tick with simulated time; zero while the clock is paused.
    fn fixed_update(&mut self, sim_dt: Duration);

    fn should_exit(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub ticks: u64,
    pub dropped_backlog: Duration,
}

#[derive(Debug)]
pub struct FixedStepper {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    summary: LoopSummary,
}

impl FixedStepper {
    pub fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            summary: LoopSummary::default(),
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn summary(&self) -> LoopSummary {
        self.summary
    }

    /// Runs one frame: `frame` with the clamped real delta, then as many
    /// fixed ticks as the accumulator allows.
    pub fn step<S: Simulation>(
        &mut self,
        raw_frame_dt: Duration,
        clock: &SimulationClock,
        simulation: &mut S,
    ) -> u32 {
        let frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        simulation.frame(frame_dt);

        self.accumulator = self.accumulator.saturating_add(frame_dt);
        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            simulation.fixed_update(clock.scale(self.fixed_dt));
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
            self.summary.dropped_backlog += step_plan.dropped_backlog;
        }
        self.summary.frames += 1;
        self.summary.ticks += u64::from(step_plan.ticks_to_run);
        step_plan.ticks_to_run
    }
}

/// Drives `simulation` in real time until it asks to exit.
pub fn run_headless<S: Simulation>(
    config: &LoopConfig,
    clock: &SimulationClock,
    simulation: &mut S,
) -> LoopSummary {
    let mut stepper = FixedStepper::new(config);
    let frame_target = target_frame_duration(normalize_fps_cap(config.max_fps));
    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = config.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = config.max_ticks_per_frame.max(1),
        fps_cap = %format_fps_cap(normalize_fps_cap(config.max_fps)),
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    while !simulation.should_exit() {
        if config
            .max_frames
            .is_some_and(|limit| stepper.summary().frames >= limit)
        {
            warn!(frames = stepper.summary().frames, "frame_limit_reached");
            break;
        }

        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;
        stepper.step(raw_frame_dt, clock, simulation);

        let elapsed = Instant::now().saturating_duration_since(now);
        let cap_sleep = compute_cap_sleep(elapsed, frame_target);
        if cap_sleep > Duration::ZERO {
            thread::sleep(cap_sleep);
        }
    }

    let summary = stepper.summary();
    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        dropped_backlog_ms = summary.dropped_backlog.as_millis() as u64,
        "shutdown"
    );
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_fps: Option<u32>) -> Option<Duration> {
    max_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_fps_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Duration>,
        ticks: Vec<Duration>,
        exit_after_frames: usize,
    }

    impl Simulation for Recorder {
        fn frame(&mut self, real_dt: Duration) {
            self.frames.push(real_dt);
        }

        fn fixed_update(&mut self, sim_dt: Duration) {
            self.ticks.push(sim_dt);
        }

        fn should_exit(&self) -> bool {
            self.frames.len() >= self.exit_after_frames
        }
    }

    fn config_50tps() -> LoopConfig {
        LoopConfig {
            target_tps: 50,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn stepper_passes_scaled_time_to_fixed_updates() {
        let mut stepper = FixedStepper::new(&config_50tps());
        let clock = SimulationClock::new();
        let mut recorder = Recorder::default();

        let ticks = stepper.step(Duration::from_millis(40), &clock, &mut recorder);
        assert_eq!(ticks, 2);
        assert_eq!(recorder.ticks, vec![Duration::from_millis(20); 2]);

        clock.pause();
        stepper.step(Duration::from_millis(20), &clock, &mut recorder);
        assert_eq!(recorder.ticks.last(), Some(&Duration::ZERO));
        assert_eq!(recorder.frames, vec![Duration::from_millis(40), Duration::from_millis(20)]);
    }

    #[test]
    fn stepper_clamps_long_frames_before_simulating() {
        let mut stepper = FixedStepper::new(&config_50tps());
        let clock = SimulationClock::new();
        let mut recorder = Recorder::default();

        stepper.step(Duration::from_secs(2), &clock, &mut recorder);
        assert_eq!(recorder.frames, vec![Duration::from_millis(250)]);
        assert_eq!(recorder.ticks.len(), 5);
        assert_eq!(stepper.summary().dropped_backlog, Duration::from_millis(150));
    }

    #[test]
    fn run_headless_stops_when_simulation_exits() {
        let clock = SimulationClock::new();
        let mut recorder = Recorder {
            exit_after_frames: 3,
            ..Recorder::default()
        };
        let config = LoopConfig {
            max_fps: None,
            ..LoopConfig::default()
        };

        let summary = run_headless(&config, &clock, &mut recorder);
        assert_eq!(summary.frames, 3);
    }

    #[test]
    fn run_headless_honours_frame_limit() {
        let clock = SimulationClock::new();
        let mut recorder = Recorder {
            exit_after_frames: usize::MAX,
            ..Recorder::default()
        };
        let config = LoopConfig {
            max_fps: None,
            max_frames: Some(4),
            ..LoopConfig::default()
        };

        let summary = run_headless(&config, &clock, &mut recorder);
        assert_eq!(summary.frames, 4);
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(normalize_fps_cap(Some(0))), None);
    }

    #[test]
    fn compute_cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60)));
        assert_eq!(sleep, Duration::ZERO);
    }
}
