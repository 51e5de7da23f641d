//! HTTP predictor over `reqwest::blocking`.
//!
//! Each call is a single POST with a JSON body. There is no retry here;
//! a failed call fails the whole resolution run. Decoded values are
//! range-checked by the resolver, which does so for every predictor.

use std::time::Duration;

use tracing::debug;

use super::{PredictionRequest, Predictor};
use crate::config::EndpointConfig;
use crate::error::PredictorError;
use crate::prediction::{PredictionResult, Target};

/// Longest error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// A remote predictor for one target.
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    target: Target,
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpPredictor {
    /// Creates a predictor posting to `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// `Transport` if the HTTP client cannot be built.
    pub fn new(target: Target, url: impl Into<String>, timeout: Duration) -> Result<Self, PredictorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictorError::transport(e.to_string()))?;
        Ok(Self {
            target,
            url: url.into(),
            client,
        })
    }

    /// The systolic endpoint described by `config`.
    pub fn systolic(config: &EndpointConfig) -> Result<Self, PredictorError> {
        Self::new(Target::Systolic, config.systolic_url(), config.timeout())
    }

    /// The diastolic endpoint described by `config`.
    pub fn diastolic(config: &EndpointConfig) -> Result<Self, PredictorError> {
        Self::new(Target::Diastolic, config.diastolic_url(), config.timeout())
    }

    /// Target this endpoint predicts.
    #[must_use]
    pub const fn target(&self) -> Target {
        self.target
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl Predictor for HttpPredictor {
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> {
        if request.target() != self.target {
            return Err(PredictorError::Encode {
                message: format!(
                    "{} request sent to the {} endpoint",
                    request.target(),
                    self.target
                ),
            });
        }
        let payload = request.payload()?;

        debug!(endpoint = %self.target, url = %self.url, "posting prediction request");
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| PredictorError::transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| PredictorError::transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(PredictorError::Status {
                status: status.as_u16(),
                message: truncate(body.trim()),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| PredictorError::malformed(format!("deserialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let cut = truncate(&long);
        assert_eq!(cut.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_endpoint_urls_from_config() {
        let config = EndpointConfig::default();
        let sys = HttpPredictor::systolic(&config).unwrap();
        let dia = HttpPredictor::diastolic(&config).unwrap();
        assert_eq!(sys.url(), "http://localhost:8000/api/v1/knn/predict/systolic");
        assert_eq!(dia.url(), "http://localhost:8000/api/v1/knn/predict/diastolic");
        assert_eq!(sys.target(), Target::Systolic);
    }
}
