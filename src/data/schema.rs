//! Canonical clinical schema
//!
//! Column names follow the abbreviated medical convention used by the
//! classifier. Categorical fields are explicit enums that serialize to
//! their integer codes, so a JSON record reads `{"sex": 1, "cp": 3, ...}`.

use crate::error::{CardioError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AGE: &str = "age";
pub const SEX: &str = "sex";
pub const CHEST_PAIN: &str = "cp";
pub const RESTING_BP: &str = "trestbps";
pub const CHOLESTEROL: &str = "chol";
pub const FASTING_BS: &str = "fbs";
pub const RESTING_ECG: &str = "restecg";
pub const MAX_HEART_RATE: &str = "thalach";
pub const EXERCISE_ANGINA: &str = "exang";
pub const ST_DEPRESSION: &str = "oldpeak";
pub const ST_SLOPE: &str = "slope";
pub const VESSELS: &str = "ca";
pub const THALASSEMIA: &str = "thal";
pub const TARGET: &str = "target";

/// Features every record supplies, in canonical order
pub const BASE_FEATURES: [&str; 11] = [
    AGE,
    SEX,
    CHEST_PAIN,
    RESTING_BP,
    CHOLESTEROL,
    FASTING_BS,
    RESTING_ECG,
    MAX_HEART_RATE,
    EXERCISE_ANGINA,
    ST_DEPRESSION,
    ST_SLOPE,
];

/// Features only present in richer historical records
pub const OPTIONAL_FEATURES: [&str; 2] = [VESSELS, THALASSEMIA];

/// Full canonical column order, target last
pub const CANONICAL_COLUMNS: [&str; 14] = [
    AGE,
    SEX,
    CHEST_PAIN,
    RESTING_BP,
    CHOLESTEROL,
    FASTING_BS,
    RESTING_ECG,
    MAX_HEART_RATE,
    EXERCISE_ANGINA,
    ST_DEPRESSION,
    ST_SLOPE,
    VESSELS,
    THALASSEMIA,
    TARGET,
];

/// Columns holding integer category codes
pub const CATEGORICAL_COLUMNS: [&str; 6] = [
    SEX,
    CHEST_PAIN,
    FASTING_BS,
    RESTING_ECG,
    EXERCISE_ANGINA,
    ST_SLOPE,
];

fn code_error(field: &str, code: impl fmt::Display) -> CardioError {
    CardioError::InvalidInput(format!("invalid code {} for field '{}'", code, field))
}

/// Biological sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Sex {
    Female = 0,
    Male = 1,
}

impl Sex {
    /// Display label stored in the normalized dataset
    pub fn label(self) -> &'static str {
        match self {
            Sex::Female => "Female",
            Sex::Male => "Male",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Female" => Some(Sex::Female),
            "Male" => Some(Sex::Male),
            _ => None,
        }
    }

    /// Code used by the human-labeled dataset variant
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Sex::Female),
            "M" => Some(Sex::Male),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Sex {
    type Error = CardioError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Sex::Female),
            1 => Ok(Sex::Male),
            other => Err(code_error(SEX, other)),
        }
    }
}

impl From<Sex> for u8 {
    fn from(value: Sex) -> Self {
        value as u8
    }
}

/// Chest pain type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChestPainType {
    TypicalAngina = 0,
    AtypicalAngina = 1,
    NonAnginalPain = 2,
    Asymptomatic = 3,
}

impl ChestPainType {
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "TA" => Some(ChestPainType::TypicalAngina),
            "ATA" => Some(ChestPainType::AtypicalAngina),
            "NAP" => Some(ChestPainType::NonAnginalPain),
            "ASY" => Some(ChestPainType::Asymptomatic),
            _ => None,
        }
    }
}

impl TryFrom<u8> for ChestPainType {
    type Error = CardioError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ChestPainType::TypicalAngina),
            1 => Ok(ChestPainType::AtypicalAngina),
            2 => Ok(ChestPainType::NonAnginalPain),
            3 => Ok(ChestPainType::Asymptomatic),
            other => Err(code_error(CHEST_PAIN, other)),
        }
    }
}

impl From<ChestPainType> for u8 {
    fn from(value: ChestPainType) -> Self {
        value as u8
    }
}

/// Resting electrocardiogram result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RestingEcg {
    Normal = 0,
    StTAbnormality = 1,
    LeftVentricularHypertrophy = 2,
}

impl RestingEcg {
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "Normal" => Some(RestingEcg::Normal),
            "ST" => Some(RestingEcg::StTAbnormality),
            "LVH" => Some(RestingEcg::LeftVentricularHypertrophy),
            _ => None,
        }
    }
}

impl TryFrom<u8> for RestingEcg {
    type Error = CardioError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(RestingEcg::Normal),
            1 => Ok(RestingEcg::StTAbnormality),
            2 => Ok(RestingEcg::LeftVentricularHypertrophy),
            other => Err(code_error(RESTING_ECG, other)),
        }
    }
}

impl From<RestingEcg> for u8 {
    fn from(value: RestingEcg) -> Self {
        value as u8
    }
}

/// Slope of the peak exercise ST segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StSlope {
    Up = 0,
    Flat = 1,
    Down = 2,
}

impl StSlope {
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "Up" => Some(StSlope::Up),
            "Flat" => Some(StSlope::Flat),
            "Down" => Some(StSlope::Down),
            _ => None,
        }
    }
}

impl TryFrom<u8> for StSlope {
    type Error = CardioError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(StSlope::Up),
            1 => Ok(StSlope::Flat),
            2 => Ok(StSlope::Down),
            other => Err(code_error(ST_SLOPE, other)),
        }
    }
}

impl From<StSlope> for u8 {
    fn from(value: StSlope) -> Self {
        value as u8
    }
}

/// Yes/no clinical flag (fasting blood sugar > 120 mg/dl, exercise angina)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Flag {
    No = 0,
    Yes = 1,
}

impl Flag {
    pub fn from_short_code(code: &str) -> Option<Self> {
        match code {
            "N" => Some(Flag::No),
            "Y" => Some(Flag::Yes),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Flag {
    type Error = CardioError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Flag::No),
            1 => Ok(Flag::Yes),
            other => Err(code_error("flag", other)),
        }
    }
}

impl From<Flag> for u8 {
    fn from(value: Flag) -> Self {
        value as u8
    }
}

/// Anything that can answer "what is the value of feature `name`"
pub trait FeatureSource {
    fn feature(&self, name: &str) -> Option<f64>;
}

/// One patient's health metrics as supplied by the intake form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: u32,
    pub sex: Sex,
    pub cp: ChestPainType,
    pub trestbps: u32,
    pub chol: u32,
    pub fbs: Flag,
    pub restecg: RestingEcg,
    pub thalach: u32,
    pub exang: Flag,
    pub oldpeak: f64,
    pub slope: StSlope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thal: Option<u8>,
}

impl FeatureSource for PatientRecord {
    fn feature(&self, name: &str) -> Option<f64> {
        let value = match name {
            AGE => self.age as f64,
            SEX => u8::from(self.sex) as f64,
            CHEST_PAIN => u8::from(self.cp) as f64,
            RESTING_BP => self.trestbps as f64,
            CHOLESTEROL => self.chol as f64,
            FASTING_BS => u8::from(self.fbs) as f64,
            RESTING_ECG => u8::from(self.restecg) as f64,
            MAX_HEART_RATE => self.thalach as f64,
            EXERCISE_ANGINA => u8::from(self.exang) as f64,
            ST_DEPRESSION => self.oldpeak,
            ST_SLOPE => u8::from(self.slope) as f64,
            VESSELS => self.ca? as f64,
            THALASSEMIA => self.thal? as f64,
            _ => return None,
        };
        Some(value)
    }
}

/// One normalized dataset row
///
/// Numeric fields stay `f64` because median imputation may produce
/// fractional values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub age: f64,
    pub sex: Sex,
    pub cp: ChestPainType,
    pub trestbps: f64,
    pub chol: f64,
    pub fbs: Flag,
    pub restecg: RestingEcg,
    pub thalach: f64,
    pub exang: Flag,
    pub oldpeak: f64,
    pub slope: StSlope,
    pub ca: Option<f64>,
    pub thal: Option<f64>,
    pub target: u8,
}

impl FeatureSource for HealthRecord {
    fn feature(&self, name: &str) -> Option<f64> {
        let value = match name {
            AGE => self.age,
            SEX => u8::from(self.sex) as f64,
            CHEST_PAIN => u8::from(self.cp) as f64,
            RESTING_BP => self.trestbps,
            CHOLESTEROL => self.chol,
            FASTING_BS => u8::from(self.fbs) as f64,
            RESTING_ECG => u8::from(self.restecg) as f64,
            MAX_HEART_RATE => self.thalach,
            EXERCISE_ANGINA => u8::from(self.exang) as f64,
            ST_DEPRESSION => self.oldpeak,
            ST_SLOPE => u8::from(self.slope) as f64,
            VESSELS => self.ca?,
            THALASSEMIA => self.thal?,
            _ => return None,
        };
        Some(value)
    }
}

/// Convert a stored numeric category code to its enum
pub(crate) fn category_code<T>(field: &str, value: f64) -> Result<T>
where
    T: TryFrom<u8, Error = CardioError>,
{
    let rounded = value.round();
    if !(0.0..=u8::MAX as f64).contains(&rounded) {
        return Err(code_error(field, value));
    }
    T::try_from(rounded as u8)
}
