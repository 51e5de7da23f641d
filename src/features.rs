//! Clinical feature vectors.
//!
//! A [`FeatureVector`] holds every predictor input except the two coupled
//! targets. Vectors are built through [`FeatureVectorBuilder`] or parsed from
//! loosely typed form JSON with [`FeatureVector::from_json`]; both paths
//! validate before returning, so a vector in hand is always sendable.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::prediction::Target;

/// Largest accepted magnitude for a standardized (z-score) input.
pub const MAX_Z_SCORE: f64 = 10.0;

/// Body-mass index from height (cm) and weight (kg), rounded to two decimals.
#[must_use]
pub fn bmi(height_cm: f64, weight_kg: f64) -> f64 {
    let meters = height_cm / 100.0;
    (weight_kg / (meters * meters) * 100.0).round() / 100.0
}

/// Biological sex, sent as `0` (female) or `1` (male).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Sent as `0`.
    #[default]
    Female,
    /// Sent as `1`.
    Male,
}

impl Sex {
    const fn code(self) -> u8 {
        match self {
            Self::Female => 0,
            Self::Male => 1,
        }
    }
}

/// Diabetes history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiabetesStatus {
    /// No diabetes.
    #[default]
    None,
    /// Diabetes, type unspecified.
    Diabetes,
    /// Type 2 diabetes.
    Type2,
}

/// Cerebral infarction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CerebralInfarction {
    /// No infarction.
    #[default]
    None,
    /// Prior infarction.
    Infarction,
}

/// Cerebrovascular history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CerebrovascularStatus {
    /// No cerebrovascular condition.
    #[default]
    None,
    /// Cerebrovascular disease.
    Disease,
    /// Cerebrovascular insufficiency.
    Insufficiency,
}

/// Categorical history, sent to the predictors as one-hot flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Comorbidities {
    /// Sent as the `Diabetes_*` flags.
    pub diabetes: DiabetesStatus,
    /// Sent as the `Cerebral_infarction_*` flags.
    pub cerebral_infarction: CerebralInfarction,
    /// Sent as the `Cerebrovascular_*` flags.
    pub cerebrovascular: CerebrovascularStatus,
}

const DIABETES_KEYS: [&str; 3] = ["Diabetes_Diabetes", "Diabetes_None", "Diabetes_Type2"];
const INFARCTION_KEYS: [&str; 2] = ["Cerebral_infarction_None", "Cerebral_infarction_infarction"];
const CEREBROVASCULAR_KEYS: [&str; 3] = [
    "Cerebrovascular_None",
    "Cerebrovascular_disease",
    "Cerebrovascular_insuff",
];

/// Input features for one resolution run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    sex: Sex,
    age: f64,
    height: f64,
    weight: f64,
    heart_rate: f64,
    bmi: f64,
    comorbidities: Comorbidities,
    is_raw: bool,
}

/// Wire shape shared by both predictor endpoints.
#[derive(Serialize)]
struct WireFeatures {
    is_raw: bool,
    #[serde(rename = "Sex")]
    sex: u8,
    #[serde(rename = "Age")]
    age: f64,
    #[serde(rename = "Height")]
    height: f64,
    #[serde(rename = "Weight")]
    weight: f64,
    #[serde(rename = "Heart_Rate")]
    heart_rate: f64,
    #[serde(rename = "BMI")]
    bmi: f64,
    #[serde(rename = "Diabetes_Diabetes")]
    diabetes_diabetes: u8,
    #[serde(rename = "Diabetes_None")]
    diabetes_none: u8,
    #[serde(rename = "Diabetes_Type2")]
    diabetes_type2: u8,
    #[serde(rename = "Cerebral_infarction_None")]
    infarction_none: u8,
    #[serde(rename = "Cerebral_infarction_infarction")]
    infarction_infarction: u8,
    #[serde(rename = "Cerebrovascular_None")]
    cerebrovascular_none: u8,
    #[serde(rename = "Cerebrovascular_disease")]
    cerebrovascular_disease: u8,
    #[serde(rename = "Cerebrovascular_insuff")]
    cerebrovascular_insuff: u8,
}

impl From<&FeatureVector> for WireFeatures {
    fn from(fv: &FeatureVector) -> Self {
        let c = fv.comorbidities;
        let flag = |b: bool| u8::from(b);
        Self {
            is_raw: fv.is_raw,
            sex: fv.sex.code(),
            age: fv.age,
            height: fv.height,
            weight: fv.weight,
            heart_rate: fv.heart_rate,
            bmi: fv.bmi,
            diabetes_diabetes: flag(c.diabetes == DiabetesStatus::Diabetes),
            diabetes_none: flag(c.diabetes == DiabetesStatus::None),
            diabetes_type2: flag(c.diabetes == DiabetesStatus::Type2),
            infarction_none: flag(c.cerebral_infarction == CerebralInfarction::None),
            infarction_infarction: flag(c.cerebral_infarction == CerebralInfarction::Infarction),
            cerebrovascular_none: flag(c.cerebrovascular == CerebrovascularStatus::None),
            cerebrovascular_disease: flag(c.cerebrovascular == CerebrovascularStatus::Disease),
            cerebrovascular_insuff: flag(c.cerebrovascular == CerebrovascularStatus::Insufficiency),
        }
    }
}

struct Bound {
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    min_exclusive: bool,
}

impl Bound {
    const fn inclusive(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self {
            field,
            value,
            min,
            max,
            min_exclusive: false,
        }
    }

    const fn positive(field: &'static str, value: f64, max: f64) -> Self {
        Self {
            field,
            value,
            min: 0.0,
            max,
            min_exclusive: true,
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        if !self.value.is_finite() {
            return Err(ValidationError::NotFinite {
                field: self.field.to_string(),
            });
        }
        let below = if self.min_exclusive {
            self.value <= self.min
        } else {
            self.value < self.min
        };
        if below || self.value > self.max {
            return Err(ValidationError::OutOfRange {
                field: self.field.to_string(),
                value: self.value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl FeatureVector {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> FeatureVectorBuilder {
        FeatureVectorBuilder::default()
    }

    /// Sex of the subject.
    #[must_use]
    pub const fn sex(&self) -> Sex {
        self.sex
    }

    /// Age in years, or its z-score.
    #[must_use]
    pub const fn age(&self) -> f64 {
        self.age
    }

    /// Height in cm, or its z-score.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Weight in kg, or its z-score.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Heart rate in beats per minute, or its z-score.
    #[must_use]
    pub const fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    /// Body-mass index, or its z-score.
    #[must_use]
    pub const fn bmi(&self) -> f64 {
        self.bmi
    }

    /// Categorical history.
    #[must_use]
    pub const fn comorbidities(&self) -> Comorbidities {
        self.comorbidities
    }

    /// True when values are raw measurements the predictors must standardize.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.is_raw
    }

    fn bounds(&self) -> [Bound; 5] {
        if self.is_raw {
            [
                Bound::inclusive("Age", self.age, 0.0, 120.0),
                Bound::positive("Height", self.height, 300.0),
                Bound::positive("Weight", self.weight, 500.0),
                Bound::positive("Heart_Rate", self.heart_rate, 300.0),
                Bound::positive("BMI", self.bmi, 150.0),
            ]
        } else {
            [
                Bound::inclusive("Age", self.age, -MAX_Z_SCORE, MAX_Z_SCORE),
                Bound::inclusive("Height", self.height, -MAX_Z_SCORE, MAX_Z_SCORE),
                Bound::inclusive("Weight", self.weight, -MAX_Z_SCORE, MAX_Z_SCORE),
                Bound::inclusive("Heart_Rate", self.heart_rate, -MAX_Z_SCORE, MAX_Z_SCORE),
                Bound::inclusive("BMI", self.bmi, -MAX_Z_SCORE, MAX_Z_SCORE),
            ]
        }
    }

    /// Checks every value against the range for its input kind.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.bounds().iter().try_for_each(Bound::check)
    }

    /// Checks a caller-supplied measurement of `target` (one-shot mode).
    pub fn validate_measurement(&self, target: Target, value: f64) -> Result<(), ValidationError> {
        let field = target.wire_key();
        let bound = match (self.is_raw, target) {
            (true, Target::Systolic) => Bound::inclusive(field, value, 50.0, 300.0),
            (true, Target::Diastolic) => Bound::inclusive(field, value, 20.0, 200.0),
            (false, _) => Bound::inclusive(field, value, -MAX_Z_SCORE, MAX_Z_SCORE),
        };
        bound.check()
    }

    /// Serializes the vector into the JSON object both endpoints accept.
    pub fn to_wire(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(WireFeatures::from(self))? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "feature vector serialized to non-object: {other}"
            ))),
        }
    }

    /// Parses form-style JSON into a validated vector.
    ///
    /// Numeric fields accept JSON numbers or numeric strings. `is_raw` must
    /// be a JSON boolean. `BMI` is derived from height and weight when
    /// absent on raw input. One-hot groups default to their `*_None` flag
    /// when none of the group's keys are present.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let Some(map) = value.as_object() else {
            return Err(ValidationError::MissingField {
                field: "features".to_string(),
            });
        };

        for target in [Target::Systolic, Target::Diastolic] {
            if map.contains_key(target.wire_key()) {
                return Err(ValidationError::ReservedField {
                    field: target.wire_key().to_string(),
                });
            }
        }

        let is_raw = match map.get("is_raw") {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField {
                    field: "is_raw".to_string(),
                })
            }
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(ValidationError::NotBoolean {
                    field: "is_raw".to_string(),
                })
            }
        };

        let code = required_number(map, "Sex")?;
        let sex = match binary_code(code) {
            Some(false) => Sex::Female,
            Some(true) => Sex::Male,
            None => {
                return Err(ValidationError::OutOfRange {
                    field: "Sex".to_string(),
                    value: code,
                    min: 0.0,
                    max: 1.0,
                })
            }
        };

        let diabetes = match one_hot(map, "Diabetes", &DIABETES_KEYS)? {
            Some(0) => DiabetesStatus::Diabetes,
            Some(2) => DiabetesStatus::Type2,
            _ => DiabetesStatus::None,
        };
        let cerebral_infarction = match one_hot(map, "Cerebral_infarction", &INFARCTION_KEYS)? {
            Some(1) => CerebralInfarction::Infarction,
            _ => CerebralInfarction::None,
        };
        let cerebrovascular = match one_hot(map, "Cerebrovascular", &CEREBROVASCULAR_KEYS)? {
            Some(1) => CerebrovascularStatus::Disease,
            Some(2) => CerebrovascularStatus::Insufficiency,
            _ => CerebrovascularStatus::None,
        };

        let mut builder = Self::builder()
            .is_raw(is_raw)
            .sex(sex)
            .age(required_number(map, "Age")?)
            .height(required_number(map, "Height")?)
            .weight(required_number(map, "Weight")?)
            .heart_rate(required_number(map, "Heart_Rate")?)
            .comorbidities(Comorbidities {
                diabetes,
                cerebral_infarction,
                cerebrovascular,
            });
        if let Some(bmi) = number(map, "BMI")? {
            builder = builder.bmi(bmi);
        }
        builder.build()
    }
}

fn number(map: &Map<String, Value>, field: &str) -> Result<Option<f64>, ValidationError> {
    let not_numeric = |v: &Value| ValidationError::NotNumeric {
        field: field.to_string(),
        value: v.to_string(),
    };
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| not_numeric(v)),
        Some(v @ Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<f64>().map(Some).map_err(|_| not_numeric(v))
        }
        Some(v) => Err(not_numeric(v)),
    }
}

/// Reads an exact `0`/`1` code.
#[allow(clippy::float_cmp)]
fn binary_code(v: f64) -> Option<bool> {
    if v == 0.0 {
        Some(false)
    } else if v == 1.0 {
        Some(true)
    } else {
        None
    }
}

fn required_number(map: &Map<String, Value>, field: &str) -> Result<f64, ValidationError> {
    number(map, field)?.ok_or_else(|| ValidationError::MissingField {
        field: field.to_string(),
    })
}

/// Index of the single set flag of a one-hot group, or `None` if the group is absent.
fn one_hot(map: &Map<String, Value>, group: &str, keys: &[&str]) -> Result<Option<usize>, ValidationError> {
    if !keys.iter().any(|k| map.contains_key(*k)) {
        return Ok(None);
    }

    let mut set = Vec::new();
    for (idx, key) in keys.iter().enumerate() {
        let on = match map.get(*key) {
            Some(Value::Bool(b)) => *b,
            _ => match number(map, key)? {
                None => false,
                Some(v) => binary_code(v).ok_or_else(|| ValidationError::OutOfRange {
                    field: (*key).to_string(),
                    value: v,
                    min: 0.0,
                    max: 1.0,
                })?,
            },
        };
        if on {
            set.push(idx);
        }
    }

    match set.as_slice() {
        [idx] => Ok(Some(*idx)),
        _ => Err(ValidationError::InvalidOneHot {
            group: group.to_string(),
            set: set.len(),
        }),
    }
}

/// Builder for [`FeatureVector`].
///
/// # Example
/// ```rust,ignore
/// let features = FeatureVector::builder()
///     .is_raw(true)
///     .sex(Sex::Female)
///     .age(45.0)
///     .height(152.0)
///     .weight(63.0)
///     .heart_rate(97.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeatureVectorBuilder {
    sex: Option<Sex>,
    age: Option<f64>,
    height: Option<f64>,
    weight: Option<f64>,
    heart_rate: Option<f64>,
    bmi: Option<f64>,
    comorbidities: Comorbidities,
    is_raw: Option<bool>,
}

impl FeatureVectorBuilder {
    /// Sex of the subject. Defaults to female.
    #[must_use]
    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    /// Age in years (raw) or its z-score.
    #[must_use]
    pub fn age(mut self, age: f64) -> Self {
        self.age = Some(age);
        self
    }

    /// Height in cm (raw) or its z-score.
    #[must_use]
    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    /// Weight in kg (raw) or its z-score.
    #[must_use]
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Heart rate in beats per minute (raw) or its z-score.
    #[must_use]
    pub fn heart_rate(mut self, heart_rate: f64) -> Self {
        self.heart_rate = Some(heart_rate);
        self
    }

    /// Explicit BMI. Raw vectors derive it from height and weight when unset.
    #[must_use]
    pub fn bmi(mut self, bmi: f64) -> Self {
        self.bmi = Some(bmi);
        self
    }

    /// Categorical history. Defaults to none in every group.
    #[must_use]
    pub fn comorbidities(mut self, comorbidities: Comorbidities) -> Self {
        self.comorbidities = comorbidities;
        self
    }

    /// Must be set explicitly; there is no default input kind.
    #[must_use]
    pub fn is_raw(mut self, is_raw: bool) -> Self {
        self.is_raw = Some(is_raw);
        self
    }

    /// Builds and validates the vector.
    ///
    /// # Errors
    ///
    /// `MissingField` if `is_raw` or a measurement is unset (BMI too, for
    /// normalized input), otherwise any range violation.
    pub fn build(self) -> Result<FeatureVector, ValidationError> {
        fn require<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
            value.ok_or_else(|| ValidationError::MissingField {
                field: field.to_string(),
            })
        }

        let is_raw = require(self.is_raw, "is_raw")?;
        let sex = require(self.sex, "Sex")?;
        let age = require(self.age, "Age")?;
        let height = require(self.height, "Height")?;
        let weight = require(self.weight, "Weight")?;
        let heart_rate = require(self.heart_rate, "Heart_Rate")?;
        let bmi = match (self.bmi, is_raw) {
            (Some(v), _) => v,
            (None, true) => bmi(height, weight),
            (None, false) => require(None, "BMI")?,
        };

        let features = FeatureVector {
            sex,
            age,
            height,
            weight,
            heart_rate,
            bmi,
            comorbidities: self.comorbidities,
            is_raw,
        };
        features.validate()?;
        Ok(features)
    }
}
