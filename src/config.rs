//! Engine configuration.
//!
//! Loaded from an optional JSON file; every field has a default so an
//! empty object (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::types::AlternateTarget;

/// Absolute cap on any radius search, regardless of configuration.
pub const MAX_RADIUS_MILES: f64 = 100.0;

/// Verification retries are bounded to a single retry.
pub const MAX_VERIFY_RETRIES: u32 = 1;

/// Default ceiling on alternates any single lane may request.
pub const DEFAULT_MAX_ALTERNATES: usize = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub radius_miles: f64,
    /// Quota used when a lane sets `prefer_fill_target`.
    pub fill_alternates: usize,
    /// Quota used when a lane names neither a count nor fill mode.
    pub default_alternates: usize,
    /// Largest `K` a lane may ask for; larger requests are rejected.
    pub max_alternates: usize,
    /// One export row per label per pair.
    pub contact_methods: Vec<String>,
    pub directory_timeout_ms: u64,
    pub verify_timeout_ms: u64,
    pub verify_retries: u32,
    /// Pause between uncached verifier calls (Nominatim allows ~1 req/s).
    pub verify_min_interval_ms: u64,
    pub verify_cache_ttl_days: i64,
    pub verify_cache_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            radius_miles: 75.0,
            fill_alternates: 5,
            default_alternates: 5,
            max_alternates: DEFAULT_MAX_ALTERNATES,
            contact_methods: vec!["email".into(), "phone".into()],
            directory_timeout_ms: 2000,
            verify_timeout_ms: 3000,
            verify_retries: MAX_VERIFY_RETRIES,
            verify_min_interval_ms: 1000,
            verify_cache_ttl_days: 30,
            verify_cache_path: None,
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius_miles.is_finite() || self.radius_miles < 0.0 {
            return Err(ConfigError::Invalid {
                field: "radius_miles",
                reason: format!("must be a non-negative number, got {}", self.radius_miles),
            });
        }
        for (field, value) in [
            ("fill_alternates", self.fill_alternates),
            ("default_alternates", self.default_alternates),
        ] {
            if value > self.max_alternates {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} exceeds max_alternates ({})", value, self.max_alternates),
                });
            }
        }
        if self.contact_methods.is_empty() {
            return Err(ConfigError::Invalid {
                field: "contact_methods",
                reason: "at least one contact method is required".into(),
            });
        }
        if self.contact_methods.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "contact_methods",
                reason: "contact method labels must not be blank".into(),
            });
        }
        if self.verify_cache_ttl_days < 0 {
            return Err(ConfigError::Invalid {
                field: "verify_cache_ttl_days",
                reason: "must not be negative".into(),
            });
        }
        Ok(())
    }

    /// Configured radius clamped to `[0, MAX_RADIUS_MILES]`.
    pub fn effective_radius(&self) -> f64 {
        clamp_radius(self.radius_miles)
    }

    /// The `K` a lane target resolves to.
    pub fn alternates_for(&self, target: AlternateTarget) -> usize {
        match target {
            AlternateTarget::Fill => self.fill_alternates,
            AlternateTarget::Default => self.default_alternates,
            AlternateTarget::Count(k) => k,
        }
    }

    pub fn contacts_per_posting(&self) -> usize {
        self.contact_methods.len()
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn verify_min_interval(&self) -> Duration {
        Duration::from_millis(self.verify_min_interval_ms)
    }

    pub fn verify_retries(&self) -> u32 {
        self.verify_retries.min(MAX_VERIFY_RETRIES)
    }

    /// Explicit path, else `~/.lanes/verify-cache.json`.
    pub fn verify_cache_path(&self) -> PathBuf {
        self.verify_cache_path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".lanes")
                .join("verify-cache.json")
        })
    }
}

/// Clamp a requested radius into `[0, MAX_RADIUS_MILES]`. NaN becomes 0.
pub fn clamp_radius(radius: f64) -> f64 {
    if radius.is_nan() {
        return 0.0;
    }
    radius.clamp(0.0, MAX_RADIUS_MILES)
}
