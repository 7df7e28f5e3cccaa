//! Prediction history record handed to the persistence layer

use super::predictor::{PredictionResult, RiskLevel};
use crate::data::schema::PatientRecord;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored prediction: the input, the outcome and an optional recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub risk_level: RiskLevel,
    /// Probability of the predicted class
    pub probability: f64,
    pub user_data: PatientRecord,
    #[serde(default)]
    pub recommendation: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(user_data: PatientRecord, result: &PredictionResult) -> Self {
        Self {
            risk_level: result.risk_level(),
            probability: result.risk_probability(),
            user_data,
            recommendation: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: serde_json::Value) -> Self {
        self.recommendation = Some(recommendation);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{ChestPainType, Flag, RestingEcg, Sex, StSlope};

    #[test]
    fn test_record_from_prediction() {
        let patient = PatientRecord {
            age: 54,
            sex: Sex::Female,
            cp: ChestPainType::NonAnginalPain,
            trestbps: 135,
            chol: 304,
            fbs: Flag::Yes,
            restecg: RestingEcg::Normal,
            thalach: 170,
            exang: Flag::No,
            oldpeak: 0.0,
            slope: StSlope::Up,
            ca: Some(0),
            thal: Some(2),
        };
        let result = PredictionResult {
            label: 1,
            probabilities: [0.35, 0.65],
        };

        let record = PredictionRecord::new(patient.clone(), &result)
            .with_recommendation(serde_json::json!({"diet": "low sodium"}));
        assert_eq!(record.risk_level, RiskLevel::High);
        assert_eq!(record.probability, 0.65);

        let restored = PredictionRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(restored, record);
        assert_eq!(restored.user_data, patient);
    }
}
