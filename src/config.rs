//! Resolver configuration with layered resolution.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables (`BPRESOLVE_*`)
//! 3. TOML config file
//! 4. Compiled defaults

use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::prediction::{EstimatePair, DIASTOLIC_PRIOR_MMHG, SYSTOLIC_PRIOR_MMHG};
use crate::resolver::{ResolverSettings, DEFAULT_ROUNDS, MAX_ROUNDS};

/// Where the two predictors live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Root URL shared by both endpoints.
    pub base_url: String,
    /// Path of the systolic endpoint, relative to `base_url`.
    pub systolic_path: String,
    /// Path of the diastolic endpoint, relative to `base_url`.
    pub diastolic_path: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            systolic_path: "/knn/predict/systolic".to_string(),
            diastolic_path: "/knn/predict/diastolic".to_string(),
            timeout_secs: 30,
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

impl EndpointConfig {
    /// Full URL of the systolic endpoint.
    #[must_use]
    pub fn systolic_url(&self) -> String {
        join_url(&self.base_url, &self.systolic_path)
    }

    /// Full URL of the diastolic endpoint.
    #[must_use]
    pub fn diastolic_url(&self) -> String {
        join_url(&self.base_url, &self.diastolic_path)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Iteration budget and bootstrap priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    /// Rounds per iterative run.
    pub rounds: u32,
    /// Systolic bootstrap value in mmHg.
    pub systolic_prior: f64,
    /// Diastolic bootstrap value in mmHg; feeds the first systolic call.
    pub diastolic_prior: f64,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            systolic_prior: SYSTOLIC_PRIOR_MMHG,
            diastolic_prior: DIASTOLIC_PRIOR_MMHG,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResolverConfig {
    /// Predictor endpoints.
    pub endpoints: EndpointConfig,
    /// Iteration budget and priors.
    pub iteration: IterationConfig,
}

impl ResolverConfig {
    /// Loads defaults, then `path` (if given), then the process environment,
    /// and validates the result.
    ///
    /// # Errors
    ///
    /// Any file, environment or validation failure.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// `FileNotFound` if `path` does not exist, `ReadFailed` for any other
    /// I/O failure, `ParseError` if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            },
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parses a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Serializes to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Applies `BPRESOLVE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BPRESOLVE_BASE_URL") {
            self.endpoints.base_url = v;
        }
        if let Some(v) = lookup("BPRESOLVE_SYSTOLIC_PATH") {
            self.endpoints.systolic_path = v;
        }
        if let Some(v) = lookup("BPRESOLVE_DIASTOLIC_PATH") {
            self.endpoints.diastolic_path = v;
        }
        if let Some(v) = lookup("BPRESOLVE_TIMEOUT_SECS") {
            self.endpoints.timeout_secs = parse_env("BPRESOLVE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("BPRESOLVE_ROUNDS") {
            self.iteration.rounds = parse_env("BPRESOLVE_ROUNDS", &v)?;
        }
        Ok(())
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.endpoints.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed {
                field: "endpoints.base_url".to_string(),
                message: format!("must be an http(s) URL, got '{base}'"),
            });
        }
        for (field, path) in [
            ("endpoints.systolic_path", &self.endpoints.systolic_path),
            ("endpoints.diastolic_path", &self.endpoints.diastolic_path),
        ] {
            if path.trim().is_empty() {
                return Err(ConfigError::ValidationFailed {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        if self.endpoints.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "endpoints.timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.iteration.rounds == 0 || self.iteration.rounds > MAX_ROUNDS {
            return Err(ConfigError::ValidationFailed {
                field: "iteration.rounds".to_string(),
                message: format!("must be between 1 and {MAX_ROUNDS}"),
            });
        }
        for (field, prior) in [
            ("iteration.systolic_prior", self.iteration.systolic_prior),
            ("iteration.diastolic_prior", self.iteration.diastolic_prior),
        ] {
            if !prior.is_finite() {
                return Err(ConfigError::ValidationFailed {
                    field: field.to_string(),
                    message: "must be a finite number".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolver settings described by this config.
    pub fn settings(&self) -> Result<ResolverSettings, ConfigError> {
        let priors = EstimatePair::new(self.iteration.systolic_prior, self.iteration.diastolic_prior);
        ResolverSettings::new(self.iteration.rounds)
            .map(|s| s.with_priors(priors))
            .map_err(|e| ConfigError::ValidationFailed {
                field: "iteration.rounds".to_string(),
                message: e.to_string(),
            })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::ValidationFailed {
        field: key.to_string(),
        message: format!("invalid value '{value}': {e}"),
    })
}
