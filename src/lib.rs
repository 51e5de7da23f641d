//! # bpresolve - Cross-prediction resolver for blood pressure estimates
//!
//! Two remote predictors estimate systolic and diastolic blood pressure,
//! but each needs the other value as an input. bpresolve bootstraps both
//! from population priors and alternates the two predictors for a fixed
//! number of rounds, returning the final predictions with their
//! confidence bands.
//!
//! ## Core Concepts
//!
//! - **FeatureVector**: validated clinical inputs, raw or standardized
//! - **Predictor**: an opaque estimator of one target, remote or stubbed
//! - **CrossPredictionResolver**: the fixed-round alternation (iterative mode)
//!   and the concurrent single pair (one-shot mode)
//! - **Resolution**: final results, per-round trajectory, call count
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bpresolve::{CrossPredictionResolver, FeatureVector, HttpPredictor, ResolveMode, ResolverConfig, Sex};
//!
//! let config = ResolverConfig::load(None)?;
//! let resolver = CrossPredictionResolver::new(
//!     HttpPredictor::systolic(&config.endpoints)?,
//!     HttpPredictor::diastolic(&config.endpoints)?,
//! )
//! .with_settings(config.settings()?);
//!
//! let features = FeatureVector::builder()
//!     .is_raw(true)
//!     .sex(Sex::Female)
//!     .age(45.0)
//!     .height(152.0)
//!     .weight(63.0)
//!     .heart_rate(97.0)
//!     .build()?;
//!
//! let resolution = resolver.resolve(&features, ResolveMode::Iterative)?;
//! println!("{resolution}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod features;
pub mod prediction;
pub mod predictor;
pub mod resolver;

// Re-export primary types at crate root for convenience
pub use config::{EndpointConfig, IterationConfig, ResolverConfig};
pub use error::{ConfigError, PredictorError, ResolveError, ResolveResult, ValidationError};
pub use features::{
    CerebralInfarction, CerebrovascularStatus, Comorbidities, DiabetesStatus, FeatureVector,
    FeatureVectorBuilder, Sex,
};
pub use prediction::{EstimatePair, PredictionResult, RunId, Target};
pub use predictor::{Counterpart, FnPredictor, PredictionRequest, Predictor, RecordingPredictor};
#[cfg(feature = "http")]
pub use predictor::HttpPredictor;
pub use resolver::{
    CrossPredictionResolver, Resolution, ResolveMode, ResolverSettings, DEFAULT_ROUNDS, MAX_ROUNDS,
};
