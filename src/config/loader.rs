//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::{AppConfig, EngineSettings, OracleConfig};
use crate::common::errors::{PreviewError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP, `__` between sections,
///    e.g. `APP__ENGINE__DEBOUNCE_MS`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| PreviewError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| PreviewError::Configuration(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let oracle = OracleConfig {
        rest_url: std::env::var("ORACLE_REST_URL").unwrap_or_else(|_| OracleConfig::default().rest_url),
        request_timeout_seconds: parse_env("ORACLE_REQUEST_TIMEOUT_SECONDS")?
            .unwrap_or_else(|| OracleConfig::default().request_timeout_seconds),
    };

    let defaults = EngineSettings::default();
    let engine = EngineSettings {
        debounce_ms: parse_env("PREVIEW_DEBOUNCE_MS")?.unwrap_or(defaults.debounce_ms),
        preview_timeout_ms: parse_env("PREVIEW_TIMEOUT_MS")?.unwrap_or(defaults.preview_timeout_ms),
        ..defaults
    };

    Ok(AppConfig {
        oracle,
        engine,
        settings: Default::default(),
    })
}

fn parse_env(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PreviewError::Configuration(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("does-not-exist.toml")).expect("defaults load");
        assert_eq!(config.engine, EngineSettings::default());
    }

    #[test]
    fn test_loads_toml_file() {
        let dir = std::env::temp_dir().join(format!("preview-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("preview.toml");
        std::fs::write(
            &path,
            "[engine]\ndebounce_ms = 300\nmax_usd_buffer_ratio = \"0.02\"\n\n[oracle]\nrest_url = \"http://oracle.test\"\n",
        )
        .expect("write config");

        let config = load_config(path.to_str()).expect("config loads");
        assert_eq!(config.engine.debounce_ms, 300);
        assert_eq!(config.engine.max_usd_buffer_ratio.to_string(), "0.02");
        assert_eq!(config.oracle.rest_url, "http://oracle.test");

        std::fs::remove_dir_all(&dir).ok();
    }
}
