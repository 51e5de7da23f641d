//! One round of the iterative mode as a two-stage pipeline.
//!
//! `Round<AwaitingSystolic>` holds the diastolic input for the round. Its
//! systolic stage yields `Round<AwaitingDiastolic>`, which holds this
//! round's systolic result and is the only way to build the diastolic
//! request. The diastolic call therefore cannot see a stale systolic value.

use tracing::debug;

use super::call;
use crate::error::ResolveResult;
use crate::features::FeatureVector;
use crate::predictor::{PredictionRequest, Predictor};
use crate::prediction::{EstimatePair, PredictionResult};

/// A round in progress (or ready to start), in stage `S`.
#[derive(Debug, Clone)]
pub struct Round<S> {
    index: u32,
    stage: S,
}

/// Waiting for the systolic call; holds the diastolic input.
#[derive(Debug, Clone, Copy)]
pub struct AwaitingSystolic {
    diastolic: f64,
}

/// Systolic call done; holds its result.
#[derive(Debug, Clone)]
pub struct AwaitingDiastolic {
    systolic: PredictionResult,
}

/// Both calls of a round done.
#[derive(Debug, Clone)]
pub struct CompletedRound {
    index: u32,
    systolic: PredictionResult,
    diastolic: PredictionResult,
}

impl<S> Round<S> {
    /// 1-indexed round number.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl Round<AwaitingSystolic> {
    /// Round 1, bootstrapped from the priors.
    #[must_use]
    pub const fn first(priors: EstimatePair) -> Self {
        Self {
            index: 1,
            stage: AwaitingSystolic {
                diastolic: priors.diastolic,
            },
        }
    }

    /// Diastolic value the systolic call will receive.
    #[must_use]
    pub const fn diastolic_input(&self) -> f64 {
        self.stage.diastolic
    }

    /// Calls the systolic predictor with this round's diastolic input.
    ///
    /// # Errors
    ///
    /// Returns the call's failure, attributed to the systolic endpoint and this round.
    pub fn predict_systolic<P>(self, features: &FeatureVector, predictor: &P) -> ResolveResult<Round<AwaitingDiastolic>>
    where
        P: Predictor + ?Sized,
    {
        let request = PredictionRequest::systolic(features, self.stage.diastolic);
        let systolic = call(predictor, &request, Some(self.index))?;
        debug!(
            round = self.index,
            diastolic_in = self.stage.diastolic,
            systolic_out = systolic.predicted_value,
            "systolic stage complete"
        );
        Ok(Round {
            index: self.index,
            stage: AwaitingDiastolic { systolic },
        })
    }

    /// Runs both stages in order.
    ///
    /// # Errors
    ///
    /// Returns the first failed call; the diastolic stage is skipped if the
    /// systolic one fails.
    pub fn run<S, D>(self, features: &FeatureVector, systolic: &S, diastolic: &D) -> ResolveResult<CompletedRound>
    where
        S: Predictor + ?Sized,
        D: Predictor + ?Sized,
    {
        self.predict_systolic(features, systolic)?
            .predict_diastolic(features, diastolic)
    }
}

impl Round<AwaitingDiastolic> {
    /// This round's systolic result.
    #[must_use]
    pub const fn systolic(&self) -> &PredictionResult {
        &self.stage.systolic
    }

    /// Calls the diastolic predictor with this round's systolic result.
    ///
    /// # Errors
    ///
    /// Returns the call's failure, attributed to the diastolic endpoint and this round.
    pub fn predict_diastolic<P>(self, features: &FeatureVector, predictor: &P) -> ResolveResult<CompletedRound>
    where
        P: Predictor + ?Sized,
    {
        let systolic_in = self.stage.systolic.predicted_value;
        let request = PredictionRequest::diastolic(features, systolic_in);
        let diastolic = call(predictor, &request, Some(self.index))?;
        debug!(
            round = self.index,
            systolic_in,
            diastolic_out = diastolic.predicted_value,
            "diastolic stage complete"
        );
        Ok(CompletedRound {
            index: self.index,
            systolic: self.stage.systolic,
            diastolic,
        })
    }
}

impl CompletedRound {
    /// 1-indexed round number.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// This round's systolic result.
    #[must_use]
    pub const fn systolic(&self) -> &PredictionResult {
        &self.systolic
    }

    /// This round's diastolic result.
    #[must_use]
    pub const fn diastolic(&self) -> &PredictionResult {
        &self.diastolic
    }

    /// Scalar estimates at the end of this round.
    #[must_use]
    pub fn estimates(&self) -> EstimatePair {
        EstimatePair::new(self.systolic.predicted_value, self.diastolic.predicted_value)
    }

    /// The following round, fed with this round's diastolic estimate.
    #[must_use]
    pub fn next(&self) -> Round<AwaitingSystolic> {
        Round {
            index: self.index + 1,
            stage: AwaitingSystolic {
                diastolic: self.diastolic.predicted_value,
            },
        }
    }

    /// Splits into `(systolic, diastolic)` results.
    #[must_use]
    pub fn into_results(self) -> (PredictionResult, PredictionResult) {
        (self.systolic, self.diastolic)
    }
}
