//! In-process predictor adapters.
//!
//! [`FnPredictor`] turns a closure into a predictor, which is how stubs are
//! substituted for the remote endpoints. [`RecordingPredictor`] wraps any
//! predictor and keeps an ordered log of what it was asked.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use super::{Counterpart, PredictionRequest, Predictor};
use crate::error::PredictorError;
use crate::prediction::PredictionResult;

/// Predictor backed by a closure.
pub struct FnPredictor<F> {
    f: F,
}

impl<F> FnPredictor<F>
where
    F: Fn(&PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> + Send + Sync,
{
    /// Wraps `f`; every prediction calls it once.
    #[must_use]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnPredictor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredictor").finish_non_exhaustive()
    }
}

impl<F> Predictor for FnPredictor<F>
where
    F: Fn(&PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> + Send + Sync,
{
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> {
        (self.f)(request)
    }
}

/// One observed call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Peer value the request carried.
    pub counterpart: Counterpart,
    /// The JSON body the call would put on the wire, if it encoded.
    pub payload: Option<Map<String, Value>>,
    /// Whether the wrapped predictor returned a result.
    pub succeeded: bool,
}

/// Wraps a predictor and records every call in order.
#[derive(Debug)]
pub struct RecordingPredictor<P> {
    inner: P,
    calls: Mutex<Vec<RecordedCall>>,
}

impl<P: Predictor> RecordingPredictor<P> {
    /// Wraps `inner` with an empty call log.
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls seen so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Counterpart values received, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<f64> {
        self.calls().iter().map(|c| c.counterpart.value()).collect()
    }

    /// Unwraps the inner predictor, discarding the log.
    #[must_use]
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Predictor> Predictor for RecordingPredictor<P> {
    fn predict(&self, request: &PredictionRequest<'_>) -> Result<PredictionResult, PredictorError> {
        let result = self.inner.predict(request);
        let call = RecordedCall {
            counterpart: request.counterpart(),
            payload: request.payload().ok(),
            succeeded: result.is_ok(),
        };
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        result
    }
}
