//! Predictor collaborators.
//!
//! A [`Predictor`] is an opaque remote procedure: it receives the feature
//! vector plus the current estimate of the peer target and answers with a
//! [`PredictionResult`]. The resolver never looks inside one.

pub mod adapters;
#[cfg(feature = "http")]
pub mod http;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::PredictorError;
use crate::features::FeatureVector;
use crate::prediction::{PredictionResult, Target};

pub use adapters::{FnPredictor, RecordedCall, RecordingPredictor};
#[cfg(feature = "http")]
pub use http::HttpPredictor;

/// The peer value attached to a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Counterpart {
    /// Diastolic estimate; the request asks for systolic.
    Diastolic(f64),
    /// Systolic estimate; the request asks for diastolic.
    Systolic(f64),
}

impl Counterpart {
    /// Which value carries this counterpart.
    #[must_use]
    pub const fn kind(self) -> Target {
        match self {
            Self::Diastolic(_) => Target::Diastolic,
            Self::Systolic(_) => Target::Systolic,
        }
    }

    /// The carried value.
    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::Diastolic(v) | Self::Systolic(v) => v,
        }
    }
}

/// One predictor call: features plus the peer estimate.
#[derive(Debug, Clone, Copy)]
pub struct PredictionRequest<'a> {
    features: &'a FeatureVector,
    counterpart: Counterpart,
}

impl<'a> PredictionRequest<'a> {
    /// Request for the systolic predictor.
    #[must_use]
    pub const fn systolic(features: &'a FeatureVector, diastolic: f64) -> Self {
        Self {
            features,
            counterpart: Counterpart::Diastolic(diastolic),
        }
    }

    /// Request for the diastolic predictor.
    #[must_use]
    pub const fn diastolic(features: &'a FeatureVector, systolic: f64) -> Self {
        Self {
            features,
            counterpart: Counterpart::Systolic(systolic),
        }
    }

    /// The value this request asks for.
    #[must_use]
    pub const fn target(&self) -> Target {
        self.counterpart.kind().peer()
    }

    /// Feature vector for this call.
    #[must_use]
    pub const fn features(&self) -> &'a FeatureVector {
        self.features
    }

    /// Peer value for this call.
    #[must_use]
    pub const fn counterpart(&self) -> Counterpart {
        self.counterpart
    }

    /// JSON body: every feature field, `is_raw`, and the counterpart key.
    pub fn payload(&self) -> Result<Map<String, Value>, PredictorError> {
        let mut map = self.features.to_wire().map_err(|e| PredictorError::Encode {
            message: e.to_string(),
        })?;
        map.insert(
            self.counterpart.kind().wire_key().to_string(),
            Value::from(self.counterpart.value()),
        );
        Ok(map)
    }
}

/// A remote (or stubbed) estimator of one target.
pub trait Predictor: Send + Sync {
    /// Performs one prediction call.
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError>;
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> {
        (**self).predict(request)
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> {
        (**self).predict(request)
    }
}

impl<P: Predictor + ?Sized> Predictor for Arc<P> {
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> {
        (**self).predict(request)
    }
}
