//! Synthetic patient data following a documented risk-scoring rule

use crate::error::TrainingError;
use crate::types::PatientRecord;
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::{Exp, Normal};
use tracing::debug;

/// Score above which a patient is labelled at risk (before noise)
pub const RISK_THRESHOLD: u32 = 50;

/// Share of labels flipped after scoring
pub const LABEL_NOISE: f64 = 0.1;

/// Points contributed by each risk factor.
///
/// Maximum attainable score is 175.
pub fn risk_score(record: &PatientRecord) -> u32 {
    let mut score = 0;
    if record.age > 45.0 {
        score += 15;
    }
    if record.bmi > 25.0 {
        score += 20;
    }
    if record.bmi > 30.0 {
        score += 15;
    }
    if record.bp_systolic > 130.0 {
        score += 20;
    }
    if record.fasting_glucose > 100.0 {
        score += 25;
    }
    if record.fasting_glucose > 125.0 {
        score += 25;
    }
    if record.family_history == 1.0 {
        score += 20;
    }
    if record.activity_level == 0.0 {
        score += 15;
    }
    if record.cholesterol > 240.0 {
        score += 10;
    }
    if record.years_condition > 5.0 {
        score += 10;
    }
    score
}

/// Noise-free label for a record
pub fn rule_label(record: &PatientRecord) -> u8 {
    u8::from(risk_score(record) > RISK_THRESHOLD)
}

/// Seeded generator of labelled patient records
#[derive(Debug, Clone, Copy)]
pub struct SyntheticGenerator {
    seed: u64,
    samples: usize,
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal, TrainingError> {
    Normal::new(mean, std_dev).map_err(|e| TrainingError::Distribution(e.to_string()))
}

impl SyntheticGenerator {
    pub fn new(seed: u64, samples: usize) -> Self {
        Self { seed, samples }
    }

    pub fn generate(&self) -> Result<Vec<PatientRecord>, TrainingError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let dist_err = |e: String| TrainingError::Distribution(e);

        let age = normal(50.0, 15.0)?;
        let bmi = normal(27.0, 5.0)?;
        let bp = normal(125.0, 20.0)?;
        let glucose = normal(105.0, 30.0)?;
        let cholesterol = normal(200.0, 40.0)?;
        let years = Exp::new(1.0 / 3.0).map_err(|e| dist_err(e.to_string()))?;
        let family = Bernoulli::new(0.4).map_err(|e| dist_err(e.to_string()))?;
        let activity =
            WeightedIndex::new([0.3, 0.3, 0.25, 0.15]).map_err(|e| dist_err(e.to_string()))?;
        let noise = Bernoulli::new(LABEL_NOISE).map_err(|e| dist_err(e.to_string()))?;

        let mut records = Vec::with_capacity(self.samples);
        for _ in 0..self.samples {
            let mut record = PatientRecord {
                age: age.sample(&mut rng).clamp(18.0, 85.0).trunc(),
                bmi: bmi.sample(&mut rng).clamp(15.0, 50.0),
                bp_systolic: bp.sample(&mut rng).clamp(80.0, 200.0),
                fasting_glucose: glucose.sample(&mut rng).clamp(60.0, 250.0),
                family_history: if family.sample(&mut rng) { 1.0 } else { 0.0 },
                activity_level: activity.sample(&mut rng) as f64,
                cholesterol: cholesterol.sample(&mut rng).clamp(100.0, 400.0),
                years_condition: years.sample(&mut rng).clamp(0.0, 30.0),
                diabetes_risk: 0,
            };

            let label = rule_label(&record);
            record.diabetes_risk = if noise.sample(&mut rng) { 1 - label } else { label };
            records.push(record);
        }

        debug!(
            samples = records.len(),
            positives = records.iter().filter(|r| r.diabetes_risk == 1).count(),
            "Synthetic dataset generated"
        );
        Ok(records)
    }
}
