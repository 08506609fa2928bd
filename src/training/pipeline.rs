//! End-to-end offline training run

use super::dataset::{load_or_synthesize, Dataset};
use super::evaluation::{cross_validate, evaluate, rank_importance, EvaluationReport};
use super::split::stratified_split;
use crate::config::{AppConfig, ArtifactsConfig, TrainingConfig};
use crate::models::loader::{ModelArtifact, ModelLoader, ScalerArtifact};
use crate::models::selection::{CandidateScore, ModelSelector, SelectionMetric};
use crate::models::{GradientBoosting, ModelKind, RandomForest, RiskClassifier, TrainedModel};
use crate::scaler::StandardScaler;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Summary of one training run, written as JSON next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub dataset: PathBuf,
    pub samples: usize,
    pub positives: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub selection_metric: SelectionMetric,
    pub selected: ModelKind,
    pub candidates: Vec<EvaluationReport>,
    pub duration_ms: u64,
}

impl TrainingReport {
    /// Report of the selected candidate
    pub fn selected_report(&self) -> Option<&EvaluationReport> {
        self.candidates.iter().find(|c| c.kind == self.selected)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("Failed to write training report")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open report {}", path.display()))?;
        serde_json::from_reader(file).context("Failed to parse training report")
    }

    /// Log a boxed summary of the run
    pub fn log_summary(&self) {
        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║                    TRAINING SUMMARY                          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Samples:         {:>10} ({} at risk)", self.samples, self.positives);
        info!("║ Train / Test:    {:>10} / {}", self.train_rows, self.test_rows);
        for c in &self.candidates {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ {}", c.kind);
            info!("║   Train Accuracy:  {:>8.4}", c.train_accuracy);
            info!("║   Test Accuracy:   {:>8.4}", c.test.accuracy);
            info!("║   ROC-AUC:         {:>8.4}", c.test.roc_auc);
            if let Some(cv) = &c.cross_validation {
                info!("║   CV ROC-AUC:      {}", cv.summary());
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Selected:        {}", self.selected);
        info!("║ Duration:        {:>10} ms", self.duration_ms);
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

/// Fits the scaler and both candidates, selects one and persists everything.
pub struct TrainingPipeline {
    training: TrainingConfig,
    artifacts: ArtifactsConfig,
}

impl TrainingPipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            training: config.training.clone(),
            artifacts: config.artifacts.clone(),
        }
    }

    /// Candidates in declaration order; on a tie the later one is selected
    fn candidates(&self) -> Vec<TrainedModel> {
        vec![
            RandomForest::new(self.training.forest.clone()).into(),
            GradientBoosting::new(self.training.boosting.clone()).into(),
        ]
    }

    pub fn run(&self) -> Result<TrainingReport> {
        let started = Instant::now();

        let records = load_or_synthesize(&self.training).context("Failed to load dataset")?;
        let dataset = Dataset::from_records(&records);
        info!(
            samples = dataset.len(),
            positives = dataset.positives(),
            "Dataset ready"
        );

        let split = stratified_split(&dataset.labels, self.training.test_fraction, self.training.seed)
            .context("Failed to split dataset")?;
        let raw_train = dataset.subset(&split.train);
        let raw_test = dataset.subset(&split.test);
        info!(train = raw_train.len(), test = raw_test.len(), "Stratified split done");

        // Scaler sees the training partition only
        let scaler = StandardScaler::fit(&raw_train.features).context("Failed to fit scaler")?;
        let train = Dataset {
            features: scaler.transform_batch(&raw_train.features),
            labels: raw_train.labels,
        };
        let test = Dataset {
            features: scaler.transform_batch(&raw_test.features),
            labels: raw_test.labels,
        };

        let mut fitted = Vec::new();
        let mut reports = Vec::new();
        for mut model in self.candidates() {
            let report = self.train_candidate(&mut model, &train, &test)?;
            fitted.push(model);
            reports.push(report);
        }

        let scores: Vec<CandidateScore> = reports
            .iter()
            .map(|r| CandidateScore {
                kind: r.kind,
                accuracy: r.test.accuracy,
                roc_auc: r.test.roc_auc,
            })
            .collect();
        let selector = ModelSelector::new(self.training.selection_metric);
        let winner = selector
            .select(&scores)
            .context("No candidate produced a finite score")?;
        let selected = reports[winner].kind;
        info!(
            model = %selected,
            metric = ?selector.metric(),
            margin = selector.margin(&scores).unwrap_or(0.0),
            "Best model selected"
        );

        self.persist(&scaler, &fitted, &reports, winner)?;

        let report = TrainingReport {
            trained_at: Utc::now(),
            dataset: self.training.dataset.clone(),
            samples: dataset.len(),
            positives: dataset.positives(),
            train_rows: train.len(),
            test_rows: test.len(),
            selection_metric: selector.metric(),
            selected,
            candidates: reports,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        report.save(self.artifacts.report_path())?;
        info!(path = %self.artifacts.report_path().display(), "Training report saved");

        Ok(report)
    }

    fn train_candidate(
        &self,
        model: &mut TrainedModel,
        train: &Dataset,
        test: &Dataset,
    ) -> Result<EvaluationReport> {
        let kind = model.kind();
        let template = model.clone();
        let started = Instant::now();

        info!(model = %kind, rows = train.len(), "Training candidate");
        model
            .fit(&train.features, &train.labels)
            .with_context(|| format!("Failed to fit {}", kind))?;

        let train_metrics = evaluate(&*model, train)?;
        let test_metrics = evaluate(&*model, test)?;

        let cross_validation = if self.training.cv_folds >= 2 {
            Some(
                cross_validate(&template, train, self.training.cv_folds, self.training.seed)
                    .with_context(|| format!("Cross-validation of {} failed", kind))?,
            )
        } else {
            None
        };

        let importance = model
            .feature_importance()
            .with_context(|| format!("{} reports no feature importance", kind))?;
        let feature_ranking = rank_importance(&importance);

        info!(
            model = %kind,
            train_accuracy = train_metrics.accuracy,
            test_accuracy = test_metrics.accuracy,
            roc_auc = test_metrics.roc_auc,
            cv_roc_auc = cross_validation.as_ref().map(|cv| cv.mean),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Candidate evaluated"
        );
        for class in &test_metrics.classes {
            info!(
                model = %kind,
                class = class.class,
                precision = class.precision,
                recall = class.recall,
                f1 = class.f1,
                support = class.support,
                "Classification report"
            );
        }
        info!(model = %kind, confusion = ?test_metrics.confusion, "Confusion matrix");
        for (rank, entry) in feature_ranking.iter().enumerate() {
            info!(
                model = %kind,
                rank = rank + 1,
                feature = %entry.feature,
                importance = entry.importance,
                "Feature importance"
            );
        }

        Ok(EvaluationReport {
            kind,
            train_accuracy: train_metrics.accuracy,
            test: test_metrics,
            cross_validation,
            feature_ranking,
        })
    }

    fn persist(
        &self,
        scaler: &StandardScaler,
        fitted: &[TrainedModel],
        reports: &[EvaluationReport],
        winner: usize,
    ) -> Result<()> {
        let loader = ModelLoader::new(self.artifacts.clone());

        for (model, report) in fitted.iter().zip(reports) {
            let artifact = ModelArtifact::new(model.clone(), report.test.accuracy, report.test.roc_auc);
            loader
                .save_model(loader.candidate_path(report.kind), &artifact)
                .with_context(|| format!("Failed to save {} artifact", report.kind))?;
        }

        let best = ModelArtifact::new(
            fitted[winner].clone(),
            reports[winner].test.accuracy,
            reports[winner].test.roc_auc,
        );
        loader
            .save_model(self.artifacts.best_model_path(), &best)
            .context("Failed to save best model artifact")?;
        loader
            .save_scaler(&ScalerArtifact::new(scaler.clone()))
            .context("Failed to save scaler artifact")?;
        Ok(())
    }
}
