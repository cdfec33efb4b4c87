use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ExposureError;

/// Application configuration. Secrets and tool locations come from the
/// environment (optionally via `.env`); tuning comes from an optional TOML
/// file named by `EXPOSURE_CONFIG`.
///
/// Passed explicitly to adapters. A missing key is not an error here: the
/// matching source reports `auth_missing` when queried.
#[derive(Debug, Clone)]
pub struct Config {
    // Breach providers
    pub hibp_api_key: Option<String>,
    pub breachdirectory_api_key: Option<String>,

    // Domain intelligence
    pub hunter_api_key: Option<String>,
    pub shodan_api_key: Option<String>,
    pub virustotal_api_key: Option<String>,

    // External CLI tools
    pub sherlock_bin: String,
    pub maigret_bin: String,
    pub holehe_bin: String,
    pub theharvester_bin: String,

    pub tuning: TuningConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hibp_api_key: None,
            breachdirectory_api_key: None,
            hunter_api_key: None,
            shodan_api_key: None,
            virustotal_api_key: None,
            sherlock_bin: "sherlock".to_string(),
            maigret_bin: "maigret".to_string(),
            holehe_bin: "holehe".to_string(),
            theharvester_bin: "theHarvester".to_string(),
            tuning: TuningConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ExposureError> {
        dotenvy::dotenv().ok();

        let tuning = match optional_env("EXPOSURE_CONFIG") {
            Some(path) => TuningConfig::load(Path::new(&path))?,
            None => TuningConfig::default(),
        };

        let defaults = Config::default();
        let config = Self {
            hibp_api_key: optional_env("HIBP_API_KEY"),
            breachdirectory_api_key: optional_env("BREACHDIRECTORY_API_KEY"),
            hunter_api_key: optional_env("HUNTER_API_KEY"),
            shodan_api_key: optional_env("SHODAN_API_KEY"),
            virustotal_api_key: optional_env("VT_API_KEY"),
            sherlock_bin: optional_env("SHERLOCK_BIN").unwrap_or(defaults.sherlock_bin),
            maigret_bin: optional_env("MAIGRET_BIN").unwrap_or(defaults.maigret_bin),
            holehe_bin: optional_env("HOLEHE_BIN").unwrap_or(defaults.holehe_bin),
            theharvester_bin: optional_env("THEHARVESTER_BIN")
                .unwrap_or(defaults.theharvester_bin),
            tuning,
        };

        config.log_keys();
        Ok(config)
    }

    pub fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(4).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  HIBP_API_KEY: {}", preview_opt(&self.hibp_api_key));
        tracing::info!(
            "  BREACHDIRECTORY_API_KEY: {}",
            preview_opt(&self.breachdirectory_api_key)
        );
        tracing::info!("  HUNTER_API_KEY: {}", preview_opt(&self.hunter_api_key));
        tracing::info!("  SHODAN_API_KEY: {}", preview_opt(&self.shodan_api_key));
        tracing::info!("  VT_API_KEY: {}", preview_opt(&self.virustotal_api_key));
        tracing::info!(
            per_source_timeout_secs = self.tuning.per_source_timeout_secs,
            run_deadline_secs = self.tuning.run_deadline_secs,
            max_in_flight = self.tuning.max_in_flight,
            "  Tuning"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// TOML-backed tuning knobs. Every field has a default, so an empty file is
/// valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningConfig {
    pub per_source_timeout_secs: u64,
    /// Hard deadline for the whole fan-out; outstanding sources are abandoned.
    pub run_deadline_secs: u64,
    pub max_in_flight: usize,
    pub recommendations_per_assessment: usize,
    pub recommendation_seed: Option<u64>,
    /// `rank,domain` popularity list (Tranco format).
    pub rank_list_path: Option<PathBuf>,
    /// TOML recommendation catalog replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
    pub wayback_limit: u32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            per_source_timeout_secs: 120,
            run_deadline_secs: 180,
            max_in_flight: 4,
            recommendations_per_assessment: 2,
            recommendation_seed: None,
            rank_list_path: None,
            catalog_path: None,
            wayback_limit: 500,
        }
    }
}

impl TuningConfig {
    pub fn load(path: &Path) -> Result<Self, ExposureError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExposureError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| ExposureError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ExposureError> {
        let tuning: TuningConfig =
            toml::from_str(content).map_err(|e| ExposureError::Config(e.to_string()))?;
        tuning.validate()?;
        Ok(tuning)
    }

    fn validate(&self) -> Result<(), ExposureError> {
        if self.max_in_flight == 0 {
            return Err(ExposureError::Config("max_in_flight must be at least 1".into()));
        }
        if self.per_source_timeout_secs == 0 || self.run_deadline_secs == 0 {
            return Err(ExposureError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_secs(self.per_source_timeout_secs)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}
