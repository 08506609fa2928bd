//! Offline training followed by serving from the persisted artifacts

mod common;

use common::{high_risk_payload, train};
use health_risk_pipeline::models::ModelLoader;
use health_risk_pipeline::{InferenceEngine, ModelKind, PredictionService, TrainingReport};

#[test]
fn test_training_writes_servable_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (config, report) = train(dir.path());
    let artifacts = &config.artifacts;

    for path in [
        artifacts.bagging_path(),
        artifacts.boosting_path(),
        artifacts.best_model_path(),
        artifacts.scaler_path(),
        artifacts.report_path(),
    ] {
        assert!(path.exists(), "missing {}", path.display());
    }
    // Synthetic data is saved for later runs
    assert!(config.training.dataset.exists());

    assert_eq!(report.samples, 600);
    assert_eq!(report.train_rows + report.test_rows, 600);
    assert_eq!(report.candidates.len(), 2);
    assert_eq!(report.candidates[0].kind, ModelKind::Bagging);
    assert_eq!(report.candidates[1].kind, ModelKind::Boosting);
    for candidate in &report.candidates {
        assert!(candidate.test.accuracy > 0.7, "{:?}", candidate.kind);
        assert!(candidate.cross_validation.is_some());
        assert_eq!(candidate.feature_ranking.len(), 8);
    }

    let best = ModelLoader::new(artifacts.clone()).load_best_model().unwrap();
    assert_eq!(best.metadata.kind, report.selected);
    let selected = report.selected_report().unwrap();
    assert_eq!(best.metadata.test_accuracy, selected.test.accuracy);

    let saved = TrainingReport::load(artifacts.report_path()).unwrap();
    assert_eq!(saved.selected, report.selected);
    assert_eq!(saved.samples, report.samples);
    assert!((saved.candidates[1].test.roc_auc - report.candidates[1].test.roc_auc).abs() < 1e-12);
}

#[test]
fn test_high_risk_scenario_after_training() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = train(dir.path());

    let engine = InferenceEngine::load(&config.artifacts).unwrap();
    let metadata = engine.metadata().unwrap();
    assert_eq!(metadata.kind, engine.kind());
    assert_eq!(metadata.feature_names.len(), 8);
    let service = PredictionService::ready(engine);

    let response = service
        .predict(high_risk_payload().to_string().as_bytes())
        .unwrap();
    assert_eq!(response.risk, 1);
    assert!(response.probability > 0.5);
    assert!(response.confidence >= 0.5);

    let total: f64 = response.feature_importance.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn test_training_is_reproducible() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let (config_a, report_a) = train(first.path());
    let (config_b, report_b) = train(second.path());

    assert_eq!(report_a.selected, report_b.selected);
    assert_eq!(report_a.candidates, report_b.candidates);

    let model_a = ModelLoader::new(config_a.artifacts).load_best_model().unwrap();
    let model_b = ModelLoader::new(config_b.artifacts).load_best_model().unwrap();
    assert_eq!(model_a.model, model_b.model);
}

#[test]
fn test_retraining_reuses_saved_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, first) = train(dir.path());

    // A different sample count is ignored once the CSV exists
    config.training.synthetic_samples = 50;
    let second = health_risk_pipeline::TrainingPipeline::new(&config)
        .run()
        .unwrap();
    assert_eq!(second.samples, first.samples);
}
