use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/attendance/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/attendance/config.toml";
pub const DEFAULT_DIRECTORY_DIR: &str = "/var/lib/attendance/directory";
pub const DEFAULT_JITTERS: u32 = 1;
pub const DEFAULT_LOCK_TIMEOUT_MILLIS: u64 = 5_000;
pub const DEFAULT_RESET_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub store_dir: Option<PathBuf>,
    pub directory_dir: Option<PathBuf>,
    pub match_tolerance: Option<f64>,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: Option<u32>,
    pub lock_timeout_millis: Option<u64>,
    pub reset_token_ttl_secs: Option<u64>,
    pub min_password_length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// `None` leaves the choice to `$ATTENDANCE_STORE_DIR` and the built-in
    /// default.
    pub store_dir: Option<PathBuf>,
    pub directory_dir: PathBuf,
    /// `None` keeps the face core's pinned tolerance. Values that are not
    /// finite and positive are dropped.
    pub match_tolerance: Option<f64>,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: u32,
    pub lock_timeout: Duration,
    pub reset_token_ttl: Duration,
    pub min_password_length: usize,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            store_dir: raw.store_dir,
            directory_dir: raw
                .directory_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY_DIR)),
            match_tolerance: raw
                .match_tolerance
                .filter(|value| value.is_finite() && *value > 0.0),
            landmark_model: raw.landmark_model,
            encoder_model: raw.encoder_model,
            jitters: raw.jitters.unwrap_or(DEFAULT_JITTERS).max(1),
            lock_timeout: Duration::from_millis(
                raw.lock_timeout_millis
                    .unwrap_or(DEFAULT_LOCK_TIMEOUT_MILLIS),
            ),
            reset_token_ttl: Duration::from_secs(
                raw.reset_token_ttl_secs
                    .unwrap_or(DEFAULT_RESET_TOKEN_TTL_SECS)
                    .max(1),
            ),
            min_password_length: raw
                .min_password_length
                .unwrap_or(DEFAULT_MIN_PASSWORD_LENGTH)
                .max(1),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn default_sources() -> [PathBuf; 2] {
    [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_sources())
}

/// Returns the first config file that exists, in priority order. Missing
/// files are skipped; unreadable or malformed ones stop the search.
pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => {
            let path = entry.source.clone();
            Ok(ResolvedConfigWithSource {
                resolved: ResolvedConfig::from_raw(entry.contents),
                source: Some(path),
            })
        }
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
