//! One-shot mode: both calls at once, joined.

use std::thread;

use tracing::debug;

use super::call;
use crate::error::{ResolveError, ResolveResult};
use crate::features::FeatureVector;
use crate::predictor::{PredictionRequest, Predictor};
use crate::prediction::{EstimatePair, PredictionResult, Target};

fn settle(target: Target, joined: thread::Result<ResolveResult<PredictionResult>>) -> ResolveResult<PredictionResult> {
    joined.unwrap_or_else(|_| Err(ResolveError::internal(format!("{target} predictor call panicked"))))
}

/// Issues both calls concurrently and waits for both to settle.
///
/// The systolic predictor receives `measured.diastolic` and the diastolic
/// predictor receives `measured.systolic`.
pub(crate) fn fan_out<S, D>(
    features: &FeatureVector,
    measured: EstimatePair,
    systolic: &S,
    diastolic: &D,
) -> (ResolveResult<PredictionResult>, ResolveResult<PredictionResult>)
where
    S: Predictor + ?Sized,
    D: Predictor + ?Sized,
{
    thread::scope(|scope| {
        let sys = scope.spawn(|| {
            call(systolic, &PredictionRequest::systolic(features, measured.diastolic), None)
        });
        let dia = scope.spawn(|| {
            call(diastolic, &PredictionRequest::diastolic(features, measured.systolic), None)
        });
        let sys = settle(Target::Systolic, sys.join());
        let dia = settle(Target::Diastolic, dia.join());
        debug!(
            systolic_ok = sys.is_ok(),
            diastolic_ok = dia.is_ok(),
            "one-shot calls settled"
        );
        (sys, dia)
    })
}

/// Combines the two settled outcomes; a failure on either side fails the run.
pub(crate) fn join(
    systolic: ResolveResult<PredictionResult>,
    diastolic: ResolveResult<PredictionResult>,
) -> ResolveResult<(PredictionResult, PredictionResult)> {
    match (systolic, diastolic) {
        (Ok(s), Ok(d)) => Ok((s, d)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(s), Err(d)) => Err(ResolveError::BothFailed {
            systolic: Box::new(s),
            diastolic: Box::new(d),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictorError;

    #[test]
    fn test_join_reports_single_failure() {
        let err = ResolveError::from_predictor(Target::Diastolic, None, PredictorError::transport("x"));
        let out = join(Ok(PredictionResult::with_std(120.0, 1.0)), Err(err.clone()));
        assert_eq!(out.unwrap_err(), err);
    }

    #[test]
    fn test_join_reports_both_failures() {
        let s = ResolveError::from_predictor(Target::Systolic, None, PredictorError::transport("a"));
        let d = ResolveError::from_predictor(Target::Diastolic, None, PredictorError::malformed("b"));
        let out = join(Err(s.clone()), Err(d.clone()));
        assert_eq!(
            out.unwrap_err(),
            ResolveError::BothFailed {
                systolic: Box::new(s),
                diastolic: Box::new(d),
            }
        );
    }

    #[test]
    fn test_settle_maps_panic() {
        let joined: thread::Result<ResolveResult<PredictionResult>> = Err(Box::new("boom"));
        let err = settle(Target::Systolic, joined).unwrap_err();
        assert!(matches!(err, ResolveError::Internal { .. }));
    }
}
