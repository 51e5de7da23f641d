//! Cross-prediction resolver.
//!
//! The systolic predictor needs a diastolic input and the diastolic
//! predictor needs a systolic input. In iterative mode the resolver starts
//! from population priors and alternates the two calls for a fixed number
//! of rounds, each call consuming the latest output of the other. There is
//! no convergence-based early exit: a run always makes exactly `2 × rounds`
//! calls or fails.
//!
//! In one-shot mode the caller already has both values; the two calls are
//! issued once, concurrently, and joined.

mod one_shot;
pub mod round;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PredictorError, ResolveError, ResolveResult, ValidationError};
use crate::features::FeatureVector;
use crate::predictor::{PredictionRequest, Predictor};
use crate::prediction::{EstimatePair, PredictionResult, RunId, Target};

pub use round::{AwaitingDiastolic, AwaitingSystolic, CompletedRound, Round};

/// Default iteration budget.
pub const DEFAULT_ROUNDS: u32 = 3;

/// Largest accepted iteration budget.
pub const MAX_ROUNDS: u32 = 1_000;

/// Performs one predictor call and checks the answer.
pub(crate) fn call<P>(predictor: &P, request: &PredictionRequest<'_>, round: Option<u32>) -> ResolveResult<PredictionResult>
where
    P: Predictor + ?Sized,
{
    let target = request.target();
    predictor
        .predict(request)
        .and_then(|result| {
            result.check().map_err(PredictorError::malformed)?;
            Ok(result)
        })
        .map_err(|e| ResolveError::from_predictor(target, round, e))
}

/// Immutable per-resolver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverSettings {
    rounds: u32,
    priors: EstimatePair,
}

impl ResolverSettings {
    /// Settings with `rounds` iterations and the population priors.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRounds` unless `1 <= rounds <= MAX_ROUNDS`.
    pub fn new(rounds: u32) -> Result<Self, ValidationError> {
        if rounds == 0 || rounds > MAX_ROUNDS {
            return Err(ValidationError::InvalidRounds { rounds });
        }
        Ok(Self {
            rounds,
            priors: EstimatePair::PRIOR,
        })
    }

    /// Replaces the bootstrap priors.
    #[must_use]
    pub const fn with_priors(mut self, priors: EstimatePair) -> Self {
        self.priors = priors;
        self
    }

    /// Rounds per iterative run.
    #[must_use]
    pub const fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Values the first round starts from.
    #[must_use]
    pub const fn priors(&self) -> EstimatePair {
        self.priors
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            priors: EstimatePair::PRIOR,
        }
    }
}

/// How a run obtains the peer inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveMode {
    /// Bootstrap from priors and alternate for the configured rounds.
    Iterative,
    /// Use caller-supplied measurements; one concurrent call pair.
    OneShot {
        /// Measured systolic value, sent to the diastolic predictor.
        systolic: f64,
        /// Measured diastolic value, sent to the systolic predictor.
        diastolic: f64,
    },
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iterative => write!(f, "iterative"),
            Self::OneShot { .. } => write!(f, "one_shot"),
        }
    }
}

/// Successful outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Identifier of this run, also carried by its log events.
    pub run_id: RunId,
    /// Mode the run used, with the supplied values for one-shot.
    pub mode: ResolveMode,
    /// Final-round systolic result.
    pub systolic: PredictionResult,
    /// Final-round diastolic result.
    pub diastolic: PredictionResult,
    /// Estimates at the end of each round, in order.
    pub trajectory: Vec<EstimatePair>,
    /// Predictor calls made.
    pub calls: u32,
    /// When the last call returned.
    pub completed_at: DateTime<Utc>,
}

impl Resolution {
    /// Final scalar estimates.
    #[must_use]
    pub fn estimates(&self) -> EstimatePair {
        EstimatePair::new(self.systolic.predicted_value, self.diastolic.predicted_value)
    }

    /// Number of rounds the run performed.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.trajectory.len()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Systolic")?;
        writeln!(f, "{}", self.systolic)?;
        writeln!(f)?;
        writeln!(f, "Diastolic")?;
        write!(f, "{}", self.diastolic)
    }
}

/// Resolves a mutually consistent systolic/diastolic pair from two
/// coupled predictors.
///
/// The resolver holds no per-run state; concurrent runs on one resolver
/// are isolated.
///
/// # Example
/// ```rust,ignore
/// let resolver = CrossPredictionResolver::new(systolic, diastolic)
///     .with_settings(ResolverSettings::new(3)?);
/// let resolution = resolver.resolve(&features, ResolveMode::Iterative)?;
/// println!("{}", resolution);
/// ```
#[derive(Debug, Clone)]
pub struct CrossPredictionResolver<S, D> {
    systolic: S,
    diastolic: D,
    settings: ResolverSettings,
}

impl<S: Predictor, D: Predictor> CrossPredictionResolver<S, D> {
    /// Creates a resolver with default settings (3 rounds, 120/80 priors).
    #[must_use]
    pub fn new(systolic: S, diastolic: D) -> Self {
        Self {
            systolic,
            diastolic,
            settings: ResolverSettings::default(),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// The systolic predictor.
    #[must_use]
    pub fn systolic_predictor(&self) -> &S {
        &self.systolic
    }

    /// The diastolic predictor.
    #[must_use]
    pub fn diastolic_predictor(&self) -> &D {
        &self.diastolic
    }

    /// Resolves both values for `features` in the given mode.
    ///
    /// Input is validated before any predictor is called.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, otherwise the first failed call. A failed
    /// run never returns estimates from completed rounds.
    pub fn resolve(&self, features: &FeatureVector, mode: ResolveMode) -> ResolveResult<Resolution> {
        match mode {
            ResolveMode::Iterative => self.resolve_iterative(features),
            ResolveMode::OneShot {
                systolic,
                diastolic,
            } => self.resolve_one_shot(features, EstimatePair::new(systolic, diastolic)),
        }
    }

    /// Iterative mode.
    ///
    /// # Errors
    ///
    /// `Validation` before any call, or the first failed call with its
    /// endpoint and round.
    pub fn resolve_iterative(&self, features: &FeatureVector) -> ResolveResult<Resolution> {
        features.validate()?;

        let run_id = RunId::new();
        let rounds = self.settings.rounds;
        debug!(%run_id, rounds, "starting iterative resolution");

        let (last, trajectory) = match self.iterate(features) {
            Ok(out) => out,
            Err(err) => {
                warn!(%run_id, error = %err, "iterative resolution failed");
                return Err(err);
            }
        };

        let (systolic, diastolic) = last.into_results();
        info!(
            %run_id,
            rounds,
            systolic = systolic.predicted_value,
            diastolic = diastolic.predicted_value,
            "iterative resolution complete"
        );
        Ok(Resolution {
            run_id,
            mode: ResolveMode::Iterative,
            systolic,
            diastolic,
            trajectory,
            calls: 2 * rounds,
            completed_at: Utc::now(),
        })
    }

    fn iterate(&self, features: &FeatureVector) -> ResolveResult<(CompletedRound, Vec<EstimatePair>)> {
        let mut trajectory = Vec::new();

        let mut done = Round::first(self.settings.priors).run(features, &self.systolic, &self.diastolic)?;
        trajectory.push(done.estimates());
        while done.index() < self.settings.rounds {
            done = done.next().run(features, &self.systolic, &self.diastolic)?;
            trajectory.push(done.estimates());
        }
        Ok((done, trajectory))
    }

    /// One-shot mode with caller-supplied measurements.
    ///
    /// # Errors
    ///
    /// `Validation` before any call, the single failed call, or `BothFailed`.
    pub fn resolve_one_shot(&self, features: &FeatureVector, measured: EstimatePair) -> ResolveResult<Resolution> {
        features.validate()?;
        features.validate_measurement(Target::Systolic, measured.systolic)?;
        features.validate_measurement(Target::Diastolic, measured.diastolic)?;

        let run_id = RunId::new();
        debug!(
            %run_id,
            systolic_in = measured.systolic,
            diastolic_in = measured.diastolic,
            "starting one-shot resolution"
        );

        let (sys, dia) = one_shot::fan_out(features, measured, &self.systolic, &self.diastolic);
        let (systolic, diastolic) = match one_shot::join(sys, dia) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%run_id, error = %err, "one-shot resolution failed");
                return Err(err);
            }
        };

        info!(
            %run_id,
            systolic = systolic.predicted_value,
            diastolic = diastolic.predicted_value,
            "one-shot resolution complete"
        );
        let trajectory = vec![EstimatePair::new(systolic.predicted_value, diastolic.predicted_value)];
        Ok(Resolution {
            run_id,
            mode: ResolveMode::OneShot {
                systolic: measured.systolic,
                diastolic: measured.diastolic,
            },
            systolic,
            diastolic,
            trajectory,
            calls: 2,
            completed_at: Utc::now(),
        })
    }
}
