use std::path::{Path, PathBuf};

use attendance_config::{default_sources, load_resolved_from_paths, ConfigError, ResolvedConfig};
use attendance_face_core::faces::{
    EnvStoreDirResolver, FaceModelConfig, StoreDirResolver, DEFAULT_MATCH_TOLERANCE,
};
use tracing::debug;

use crate::cli::ModelArgs;
use crate::errors::{AppError, AppResult};

pub fn load_config() -> AppResult<ResolvedConfig> {
    load_config_from(&default_sources())
}

pub fn load_config_from(sources: &[PathBuf]) -> AppResult<ResolvedConfig> {
    let loaded = load_resolved_from_paths(sources).map_err(config_error)?;
    match &loaded.source {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => debug!("no configuration file found; using defaults"),
    }
    Ok(loaded.resolved)
}

pub fn config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
    }
}

/// `--store-dir`, then the config file, then `$ATTENDANCE_STORE_DIR`, then
/// the built-in default.
pub fn resolve_store_dir(cli_value: Option<&Path>, config: &ResolvedConfig) -> PathBuf {
    resolve_store_dir_with(&EnvStoreDirResolver, cli_value, config)
}

fn resolve_store_dir_with<R: StoreDirResolver>(
    resolver: &R,
    cli_value: Option<&Path>,
    config: &ResolvedConfig,
) -> PathBuf {
    resolver.resolve(cli_value.or(config.store_dir.as_deref()))
}

pub fn match_tolerance(config: &ResolvedConfig) -> f64 {
    config.match_tolerance.unwrap_or(DEFAULT_MATCH_TOLERANCE)
}

pub fn model_config(args: &ModelArgs, config: &ResolvedConfig) -> FaceModelConfig {
    FaceModelConfig {
        landmark_model: args
            .landmark_model
            .clone()
            .or_else(|| config.landmark_model.clone()),
        encoder_model: args
            .encoder_model
            .clone()
            .or_else(|| config.encoder_model.clone()),
        jitters: args.jitters.unwrap_or(config.jitters).max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FixedResolver;

    impl StoreDirResolver for FixedResolver {
        fn resolve(&self, override_dir: Option<&Path>) -> PathBuf {
            override_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/fallback"))
        }
    }

    #[test]
    fn cli_value_wins_over_config() {
        let config = ResolvedConfig {
            store_dir: Some(PathBuf::from("/srv/config")),
            ..ResolvedConfig::default()
        };
        let resolved =
            resolve_store_dir_with(&FixedResolver, Some(Path::new("/tmp/custom")), &config);
        assert_eq!(resolved, PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn config_value_is_used_without_flag() {
        let config = ResolvedConfig {
            store_dir: Some(PathBuf::from("/srv/config")),
            ..ResolvedConfig::default()
        };
        assert_eq!(
            resolve_store_dir_with(&FixedResolver, None, &config),
            PathBuf::from("/srv/config")
        );
        assert_eq!(
            resolve_store_dir_with(&FixedResolver, None, &ResolvedConfig::default()),
            PathBuf::from("/fallback")
        );
    }

    #[test]
    fn tolerance_defaults_to_the_pinned_value() {
        assert_eq!(match_tolerance(&ResolvedConfig::default()), DEFAULT_MATCH_TOLERANCE);
        let config = ResolvedConfig {
            match_tolerance: Some(0.45),
            ..ResolvedConfig::default()
        };
        assert_eq!(match_tolerance(&config), 0.45);
    }

    #[test]
    fn parse_error_is_reported() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("broken.toml");
        fs::write(&config_path, "jitters = { not = 'a number' }").unwrap();

        let err = load_config_from(&[config_path.clone()]).unwrap_err();
        match err {
            AppError::ConfigParse { path, .. } => assert_eq!(path, config_path),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn io_error_is_reported() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::create_dir_all(&config_path).unwrap();

        let err = load_config_from(&[config_path.clone()]).unwrap_err();
        match err {
            AppError::ConfigRead { path, .. } => assert_eq!(path, config_path),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn model_flags_override_config() {
        let config = ResolvedConfig {
            landmark_model: Some(PathBuf::from("/etc/models/landmarks.dat")),
            encoder_model: Some(PathBuf::from("/etc/models/encoder.dat")),
            jitters: 3,
            ..ResolvedConfig::default()
        };
        let args = ModelArgs {
            encoder_model: Some(PathBuf::from("/tmp/encoder.dat")),
            ..ModelArgs::default()
        };

        let models = model_config(&args, &config);
        assert_eq!(
            models.landmark_model,
            Some(PathBuf::from("/etc/models/landmarks.dat"))
        );
        assert_eq!(models.encoder_model, Some(PathBuf::from("/tmp/encoder.dat")));
        assert_eq!(models.jitters, 3);
    }
}
