use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::app::SceneLoadMode;

pub const SAVE_DIR_ENV_VAR: &str = "KAYZIE_SAVE_DIR";
pub const MAX_SAVES_ENV_VAR: &str = "KAYZIE_MAX_SAVES";
pub const SAVE_TIMEOUT_ENV_VAR: &str = "KAYZIE_SAVE_TIMEOUT_MS";

const APP_DIR_NAME: &str = "kayzie";

#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub save_dir: PathBuf,
    pub max_save_count: usize,
    /// Real-time ceiling on waiting for participants to report.
    pub convergence_timeout: Duration,
    /// Real-time pause between freezing the simulation and polling.
    pub settle_delay: Duration,
    pub header_character_name: String,
    pub file_extension: String,
    pub loading_scene_name: String,
    pub loading_scene_mode: SceneLoadMode,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            max_save_count: 5,
            convergence_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(100),
            header_character_name: "InitialRow".to_string(),
            file_extension: "db".to_string(),
            loading_scene_name: "LoadingScene".to_string(),
            loading_scene_mode: SceneLoadMode::Additive,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{var} is set but empty")]
    EmptyEnvPath { var: &'static str },
}

impl SaveConfig {
    /// Defaults with the `KAYZIE_*` overrides applied and the per-user save
    /// directory resolved.
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| env::var(key))
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();
        let save_dir = resolve_save_dir(&lookup)?;
        let max_save_count = parse_override(
            &lookup,
            MAX_SAVES_ENV_VAR,
            defaults.max_save_count,
            |value| value.parse::<usize>().ok().filter(|count| *count > 0),
        );
        let convergence_timeout = parse_override(
            &lookup,
            SAVE_TIMEOUT_ENV_VAR,
            defaults.convergence_timeout,
            |value| value.parse::<u64>().ok().map(Duration::from_millis),
        );
        Ok(Self {
            save_dir,
            max_save_count,
            convergence_timeout,
            ..defaults
        })
    }

    /// Creates the save directory if needed.
    pub fn prepare_save_dir(&self) -> Result<&Path, StartupError> {
        fs::create_dir_all(&self.save_dir).map_err(|source| StartupError::CreateSaveDir {
            path: self.save_dir.clone(),
            source,
        })?;
        Ok(&self.save_dir)
    }
}

fn parse_override<T, F, P>(lookup: &F, var: &'static str, fallback: T, parse: P) -> T
where
    F: Fn(&str) -> Result<String, env::VarError>,
    P: Fn(&str) -> Option<T>,
{
    match lookup(var) {
        Ok(value) => match parse(value.trim()) {
            Some(parsed) => parsed,
            None => {
                warn!(
                    env_var = var,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            fallback
        }
    }
}

fn resolve_save_dir<F>(lookup: &F) -> Result<PathBuf, StartupError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(SAVE_DIR_ENV_VAR) {
        Ok(value) if value.trim().is_empty() => Err(StartupError::EmptyEnvPath {
            var: SAVE_DIR_ENV_VAR,
        }),
        Ok(value) => Ok(PathBuf::from(value)),
        Err(env::VarError::NotPresent) => {
            Ok(user_data_dir(lookup)?.join(APP_DIR_NAME).join("saves"))
        }
        Err(source) => Err(StartupError::EnvVar {
            var: SAVE_DIR_ENV_VAR,
            source,
        }),
    }
}

fn user_data_dir<F>(lookup: &F) -> Result<PathBuf, StartupError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let present = |var: &str| lookup(var).ok().filter(|value| !value.trim().is_empty());

    if let Some(dir) = present("XDG_DATA_HOME") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(home) = present("HOME") {
        return Ok(PathBuf::from(home).join(".local").join("share"));
    }
    if let Some(app_data) = present("APPDATA") {
        return Ok(PathBuf::from(app_data));
    }
    env::current_dir().map_err(StartupError::CurrentDir)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = SaveConfig::default();
        assert_eq!(config.max_save_count, 5);
        assert_eq!(config.convergence_timeout, Duration::from_secs(15));
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert_eq!(config.header_character_name, "InitialRow");
        assert_eq!(config.file_extension, "db");
        assert_eq!(config.loading_scene_name, "LoadingScene");
    }

    #[test]
    fn explicit_save_dir_wins() {
        let config = SaveConfig::from_lookup(lookup_from(&[
            (SAVE_DIR_ENV_VAR, "/tmp/kayzie-saves"),
            ("XDG_DATA_HOME", "/data"),
        ]))
        .expect("config");
        assert_eq!(config.save_dir, PathBuf::from("/tmp/kayzie-saves"));
    }

    #[test]
    fn xdg_data_home_preferred_over_home() {
        let config = SaveConfig::from_lookup(lookup_from(&[
            ("XDG_DATA_HOME", "/data"),
            ("HOME", "/home/player"),
        ]))
        .expect("config");
        assert_eq!(config.save_dir, PathBuf::from("/data/kayzie/saves"));
    }

    #[test]
    fn home_fallback_uses_local_share() {
        let config =
            SaveConfig::from_lookup(lookup_from(&[("HOME", "/home/player")])).expect("config");
        assert_eq!(
            config.save_dir,
            PathBuf::from("/home/player/.local/share/kayzie/saves")
        );
    }

    #[test]
    fn empty_save_dir_override_is_rejected() {
        let result = SaveConfig::from_lookup(lookup_from(&[(SAVE_DIR_ENV_VAR, "  ")]));
        assert!(matches!(result, Err(StartupError::EmptyEnvPath { .. })));
    }

    #[test]
    fn numeric_overrides_apply() {
        let config = SaveConfig::from_lookup(lookup_from(&[
            (SAVE_DIR_ENV_VAR, "/tmp/s"),
            (MAX_SAVES_ENV_VAR, "2"),
            (SAVE_TIMEOUT_ENV_VAR, "250"),
        ]))
        .expect("config");
        assert_eq!(config.max_save_count, 2);
        assert_eq!(config.convergence_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_numeric_overrides_fall_back_to_defaults() {
        let config = SaveConfig::from_lookup(lookup_from(&[
            (SAVE_DIR_ENV_VAR, "/tmp/s"),
            (MAX_SAVES_ENV_VAR, "0"),
            (SAVE_TIMEOUT_ENV_VAR, "soon"),
        ]))
        .expect("config");
        assert_eq!(config.max_save_count, 5);
        assert_eq!(config.convergence_timeout, Duration::from_secs(15));
    }

    #[test]
    fn prepare_save_dir_creates_nested_directory() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let config = SaveConfig {
            save_dir: temp.path().join("a").join("b"),
            ..SaveConfig::default()
        };
        let dir = config.prepare_save_dir().expect("prepare");
        assert!(dir.is_dir());
    }
}
