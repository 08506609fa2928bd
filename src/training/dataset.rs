//! Tabular dataset loading, saving and the synthetic fallback

use super::synthetic::SyntheticGenerator;
use crate::config::TrainingConfig;
use crate::error::TrainingError;
use crate::feature_extractor::FeatureVector;
use crate::types::PatientRecord;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Feature rows with aligned 0/1 labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn from_records(records: &[PatientRecord]) -> Self {
        Self {
            features: records.iter().map(PatientRecord::features).collect(),
            labels: records.iter().map(|r| r.diabetes_risk).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Read a CSV dataset with a header row. Columns are matched by name.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PatientRecord>, TrainingError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<PatientRecord>().enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;
        if record.diabetes_risk > 1 {
            return Err(TrainingError::DatasetFormat(format!(
                "{}: row {} has label {}, expected 0 or 1",
                path.display(),
                row + 1,
                record.diabetes_risk
            )));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(TrainingError::DatasetFormat(format!(
            "{}: no data rows",
            path.display()
        )));
    }
    Ok(records)
}

/// Write records as CSV with a header row, creating parent directories
pub fn write_csv<P: AsRef<Path>>(path: P, records: &[PatientRecord]) -> Result<(), TrainingError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TrainingError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|source| TrainingError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the configured dataset, or synthesize one when the file is absent.
///
/// The synthesized rows are written to the dataset path for later runs; a
/// failed write only logs a warning.
pub fn load_or_synthesize(config: &TrainingConfig) -> Result<Vec<PatientRecord>, TrainingError> {
    if config.dataset.exists() {
        let records = load_csv(&config.dataset)?;
        info!(
            path = %config.dataset.display(),
            rows = records.len(),
            "Dataset loaded"
        );
        return Ok(records);
    }

    warn!(
        path = %config.dataset.display(),
        samples = config.synthetic_samples,
        "Dataset not found, generating synthetic data"
    );
    let records = SyntheticGenerator::new(config.seed, config.synthetic_samples).generate()?;

    match write_csv(&config.dataset, &records) {
        Ok(()) => info!(path = %config.dataset.display(), "Synthetic dataset saved"),
        Err(e) => warn!(error = %e, "Failed to save synthetic dataset"),
    }
    Ok(records)
}

fn csv_error(path: &Path, err: csv::Error) -> TrainingError {
    TrainingError::DatasetFormat(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "age,bmi,bp_systolic,fasting_glucose,family_history,activity_level,cholesterol,years_condition,diabetes_risk";

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(
            &path,
            format!("{}\n50,32.1,140,130,1,0,250,8.5,1\n30,21,110,85,0,3,180,0,0\n", HEADER),
        )
        .unwrap();

        let records = load_csv(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].features(), [50.0, 32.1, 140.0, 130.0, 1.0, 0.0, 250.0, 8.5]);
        assert_eq!(records[1].diabetes_risk, 0);
    }

    #[test]
    fn test_columns_resolved_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shuffled.csv");
        fs::write(
            &path,
            "patient_id,diabetes_risk,cholesterol,age,bmi,bp_systolic,fasting_glucose,family_history,activity_level,years_condition\n\
             p1,1,260,61,31,150,140,1,0,9\n",
        )
        .unwrap();

        let records = load_csv(&path).unwrap();
        assert_eq!(records[0].age, 61.0);
        assert_eq!(records[0].cholesterol, 260.0);
        assert_eq!(records[0].diabetes_risk, 1);
    }

    #[test]
    fn test_missing_column_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "age,bmi,diabetes_risk\n50,30,1\n").unwrap();

        assert!(matches!(
            load_csv(&path),
            Err(TrainingError::DatasetFormat(_))
        ));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let records = vec![
            PatientRecord::from_features(&[40.0, 22.0, 118.0, 90.0, 0.0, 2.0, 190.0, 1.5], 0),
            PatientRecord::from_features(&[66.0, 35.0, 150.0, 140.0, 1.0, 0.0, 255.0, 7.0], 1),
        ];

        write_csv(&path, &records).unwrap();
        assert_eq!(load_csv(&path).unwrap(), records);
    }

    #[test]
    fn test_missing_dataset_is_synthesized_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig {
            dataset: dir.path().join("medical_data.csv"),
            synthetic_samples: 50,
            ..TrainingConfig::default()
        };

        let records = load_or_synthesize(&config).unwrap();
        assert_eq!(records.len(), 50);
        assert!(config.dataset.exists());
        assert_eq!(load_or_synthesize(&config).unwrap(), records);
    }

    #[test]
    fn test_subset() {
        let records = vec![
            PatientRecord::from_features(&[1.0; 8], 0),
            PatientRecord::from_features(&[2.0; 8], 1),
            PatientRecord::from_features(&[3.0; 8], 1),
        ];
        let dataset = Dataset::from_records(&records);
        let subset = dataset.subset(&[2, 0]);

        assert_eq!(subset.labels, vec![1, 0]);
        assert_eq!(subset.features[0][0], 3.0);
        assert_eq!(dataset.positives(), 2);
    }
}
