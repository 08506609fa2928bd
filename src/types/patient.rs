//! Patient record data structures

use crate::feature_extractor::FeatureVector;
use serde::{Deserialize, Serialize};

/// One labelled row of the training dataset.
///
/// Field names match the CSV header; columns are resolved by name so extra
/// columns are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years
    pub age: f64,
    /// Body mass index
    pub bmi: f64,
    /// Systolic blood pressure (mmHg)
    pub bp_systolic: f64,
    /// Fasting plasma glucose (mg/dL)
    pub fasting_glucose: f64,
    /// 1 if a first-degree relative has the condition
    pub family_history: f64,
    /// 0 = sedentary .. 3 = very active
    pub activity_level: f64,
    /// Total cholesterol (mg/dL)
    pub cholesterol: f64,
    pub years_condition: f64,
    /// Label: 1 = at risk
    pub diabetes_risk: u8,
}

impl PatientRecord {
    /// Build a record from a feature vector in model order
    pub fn from_features(features: &FeatureVector, label: u8) -> Self {
        Self {
            age: features[0],
            bmi: features[1],
            bp_systolic: features[2],
            fasting_glucose: features[3],
            family_history: features[4],
            activity_level: features[5],
            cholesterol: features[6],
            years_condition: features[7],
            diabetes_risk: label,
        }
    }

    /// Features in model order
    pub fn features(&self) -> FeatureVector {
        [
            self.age,
            self.bmi,
            self.bp_systolic,
            self.fasting_glucose,
            self.family_history,
            self.activity_level,
            self.cholesterol,
            self.years_condition,
        ]
    }
}

/// Request body accepted by `POST /api/predict`, using the wire key names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPayload {
    pub age: f64,
    pub bmi: f64,
    pub bp_systolic: f64,
    pub fasting_glucose: f64,
    #[serde(rename = "familyHistory")]
    pub family_history: f64,
    #[serde(rename = "activityLevel")]
    pub activity_level: f64,
    pub cholesterol: f64,
    #[serde(rename = "yearsCondition")]
    pub years_condition: f64,
}

impl From<&PatientRecord> for PatientPayload {
    fn from(record: &PatientRecord) -> Self {
        Self {
            age: record.age,
            bmi: record.bmi,
            bp_systolic: record.bp_systolic,
            fasting_glucose: record.fasting_glucose,
            family_history: record.family_history,
            activity_level: record.activity_level,
            cholesterol: record.cholesterol,
            years_condition: record.years_condition,
        }
    }
}
