use std::time::Duration;

use savegame::{LoopConfig, SaveConfig, StartupError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::SessionScript;

const WARMUP_FRAMES_ENV_VAR: &str = "KAYZIE_WARMUP_FRAMES";
const DEFAULT_WARMUP_FRAMES: u32 = 30;
const MAX_FRAMES: u64 = 20_000;

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) save_config: Result<SaveConfig, StartupError>,
    pub(crate) script: SessionScript,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Kayzie Save Demo Startup ===");

    let loop_config = LoopConfig {
        max_frames: Some(MAX_FRAMES),
        ..LoopConfig::default()
    };
    let script = SessionScript {
        warmup_frames: parse_warmup_frames_from_env(),
        ..SessionScript::default()
    };

    AppWiring {
        loop_config,
        save_config: SaveConfig::from_env(),
        script,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_warmup_frames_from_env() -> u32 {
    parse_warmup_frames(std::env::var(WARMUP_FRAMES_ENV_VAR).ok().as_deref())
}

fn parse_warmup_frames(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_WARMUP_FRAMES;
    };
    match raw.trim().parse::<u32>() {
        Ok(frames) => frames,
        Err(_) => {
            warn!(
                var = WARMUP_FRAMES_ENV_VAR,
                value = raw,
                default = DEFAULT_WARMUP_FRAMES,
                "invalid_warmup_frames_using_default"
            );
            DEFAULT_WARMUP_FRAMES
        }
    }
}

/// Wall-clock budget implied by the frame cap, for log context.
pub(crate) fn frame_budget(config: &LoopConfig) -> Option<Duration> {
    let fps = config.max_fps?.max(1);
    let frames = config.max_frames?;
    Some(Duration::from_secs_f64(frames as f64 / f64::from(fps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_frames_fall_back_on_missing_or_invalid_values() {
        assert_eq!(parse_warmup_frames(None), DEFAULT_WARMUP_FRAMES);
        assert_eq!(parse_warmup_frames(Some("abc")), DEFAULT_WARMUP_FRAMES);
        assert_eq!(parse_warmup_frames(Some(" 12 ")), 12);
        assert_eq!(parse_warmup_frames(Some("0")), 0);
    }

    #[test]
    fn frame_budget_needs_both_caps() {
        let config = LoopConfig {
            max_fps: Some(100),
            max_frames: Some(500),
            ..LoopConfig::default()
        };
        assert_eq!(frame_budget(&config), Some(Duration::from_secs(5)));
        let uncapped = LoopConfig {
            max_fps: None,
            ..config
        };
        assert_eq!(frame_budget(&uncapped), None);
    }
}
