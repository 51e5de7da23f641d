//! Prediction targets, results and the evolving estimate pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Population-mean systolic prior (mmHg) used to bootstrap round 1.
pub const SYSTOLIC_PRIOR_MMHG: f64 = 120.0;

/// Population-mean diastolic prior (mmHg) used to bootstrap round 1.
pub const DIASTOLIC_PRIOR_MMHG: f64 = 80.0;

/// Identifier of a single resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two coupled values a predictor estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Systolic blood pressure.
    Systolic,
    /// Diastolic blood pressure.
    Diastolic,
}

impl Target {
    /// Wire key under which this target is sent as an input.
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::Systolic => "Systolic_BP",
            Self::Diastolic => "Diastolic_BP",
        }
    }

    /// The other target of the coupled pair.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Systolic => Self::Diastolic,
            Self::Diastolic => Self::Systolic,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Systolic => write!(f, "systolic"),
            Self::Diastolic => write!(f, "diastolic"),
        }
    }
}

/// One predictor answer: point estimate plus uncertainty band, in mmHg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Point estimate in mmHg.
    #[serde(rename = "predicted_value_mmHg")]
    pub predicted_value: f64,

    /// Lower bound of the 95% band in mmHg.
    pub confidence_interval_lower: f64,

    /// Upper bound of the 95% band in mmHg.
    pub confidence_interval_upper: f64,

    /// Standard deviation of the estimate in mmHg.
    #[serde(rename = "prediction_std_mmHg")]
    pub prediction_std: f64,

    /// Model output before denormalization, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_normalized: Option<f64>,

    /// Standard deviation before denormalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_std_normalized: Option<f64>,

    /// `raw` or `normalized`, echoed by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,

    /// Model identifier reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

impl PredictionResult {
    /// Creates a result with only the required fields.
    #[must_use]
    pub fn new(predicted_value: f64, lower: f64, upper: f64, std: f64) -> Self {
        Self {
            predicted_value,
            confidence_interval_lower: lower,
            confidence_interval_upper: upper,
            prediction_std: std,
            predicted_normalized: None,
            prediction_std_normalized: None,
            input_type: None,
            model_type: None,
        }
    }

    /// Creates a result whose band is `value ± 1.96·std`.
    #[must_use]
    pub fn with_std(predicted_value: f64, std: f64) -> Self {
        let half = 1.96 * std;
        Self::new(predicted_value, predicted_value - half, predicted_value + half, std)
    }

    /// Checks the numeric invariants of a decoded result.
    ///
    /// Returns a description of the first violation found.
    pub fn check(&self) -> Result<(), String> {
        let fields = [
            ("predicted_value_mmHg", self.predicted_value),
            ("confidence_interval_lower", self.confidence_interval_lower),
            ("confidence_interval_upper", self.confidence_interval_upper),
            ("prediction_std_mmHg", self.prediction_std),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("{name} is not finite"));
            }
        }
        if self.confidence_interval_lower > self.confidence_interval_upper {
            return Err(format!(
                "confidence interval is inverted ({} > {})",
                self.confidence_interval_lower, self.confidence_interval_upper
            ));
        }
        if self.prediction_std < 0.0 {
            return Err(format!("prediction_std_mmHg is negative ({})", self.prediction_std));
        }
        Ok(())
    }

    /// Width of the confidence band.
    #[must_use]
    pub fn interval_width(&self) -> f64 {
        self.confidence_interval_upper - self.confidence_interval_lower
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Predicted Value: {:.1} mmHg", self.predicted_value)?;
        writeln!(
            f,
            "Confidence Interval: {:.1} - {:.1} mmHg",
            self.confidence_interval_lower, self.confidence_interval_upper
        )?;
        write!(f, "Standard Deviation: ±{:.1} mmHg", self.prediction_std)
    }
}

/// The `(systolic, diastolic)` state carried between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatePair {
    /// Systolic value in mmHg.
    pub systolic: f64,
    /// Diastolic value in mmHg.
    pub diastolic: f64,
}

impl EstimatePair {
    /// Population-mean priors.
    pub const PRIOR: Self = Self {
        systolic: SYSTOLIC_PRIOR_MMHG,
        diastolic: DIASTOLIC_PRIOR_MMHG,
    };

    /// Pairs two values.
    #[must_use]
    pub const fn new(systolic: f64, diastolic: f64) -> Self {
        Self {
            systolic,
            diastolic,
        }
    }
}

impl Default for EstimatePair {
    fn default() -> Self {
        Self::PRIOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_decodes_service_response() {
        let json = r#"{
            "predicted_normalized": 0.3738,
            "prediction_std_normalized": 0.7373,
            "predicted_value_mmHg": 135.6,
            "prediction_std_mmHg": 15.02,
            "confidence_interval_lower": 106.2,
            "confidence_interval_upper": 165.0,
            "input_type": "raw",
            "model_type": "knn_systolic"
        }"#;
        let result: PredictionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.predicted_value, 135.6);
        assert_eq!(result.prediction_std, 15.02);
        assert_eq!(result.model_type.as_deref(), Some("knn_systolic"));
        assert!(result.check().is_ok());
    }

    #[test]
    fn test_result_requires_std() {
        let json = r#"{
            "predicted_value_mmHg": 120.0,
            "confidence_interval_lower": 100.0,
            "confidence_interval_upper": 140.0
        }"#;
        let err = serde_json::from_str::<PredictionResult>(json).unwrap_err();
        assert!(err.to_string().contains("prediction_std_mmHg"));
    }

    #[test]
    fn test_check_rejects_inverted_interval() {
        let result = PredictionResult::new(120.0, 140.0, 100.0, 5.0);
        assert!(result.check().unwrap_err().contains("inverted"));
    }

    #[test]
    fn test_check_rejects_negative_std() {
        let result = PredictionResult::new(120.0, 100.0, 140.0, -1.0);
        assert!(result.check().is_err());
    }

    #[test]
    fn test_check_rejects_nan() {
        let result = PredictionResult::new(f64::NAN, 100.0, 140.0, 1.0);
        assert!(result.check().unwrap_err().contains("predicted_value_mmHg"));
    }

    #[test]
    fn test_report_format() {
        let result = PredictionResult::new(135.64, 106.2, 165.0, 15.02);
        let report = result.to_string();
        assert_eq!(
            report,
            "Predicted Value: 135.6 mmHg\nConfidence Interval: 106.2 - 165.0 mmHg\nStandard Deviation: ±15.0 mmHg"
        );
    }

    #[test]
    fn test_with_std_band_is_symmetric() {
        let result = PredictionResult::with_std(100.0, 10.0);
        assert!((result.interval_width() - 39.2).abs() < 1e-9);
        assert!(result.check().is_ok());
    }

    #[test]
    fn test_target_keys() {
        assert_eq!(Target::Systolic.wire_key(), "Systolic_BP");
        assert_eq!(Target::Diastolic.peer(), Target::Systolic);
        assert_eq!(Target::Diastolic.to_string(), "diastolic");
    }

    #[test]
    fn test_prior_pair() {
        assert_eq!(EstimatePair::default(), EstimatePair::new(120.0, 80.0));
    }
}
