#![allow(dead_code)]

use health_risk_pipeline::config::{AppConfig, ArtifactsConfig};
use health_risk_pipeline::models::{BoostingParams, ForestParams};
use health_risk_pipeline::server::{self, AppState};
use health_risk_pipeline::{PredictionService, TrainingPipeline, TrainingReport};
use std::path::Path;
use tokio::net::TcpListener;

/// Small, fast configuration rooted in `dir`
pub fn small_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.artifacts = ArtifactsConfig::in_dir(dir.join("models"));
    config.training.dataset = dir.join("medical_data.csv");
    config.training.synthetic_samples = 600;
    config.training.cv_folds = 3;
    config.training.forest = ForestParams {
        n_estimators: 30,
        n_jobs: 2,
        ..ForestParams::default()
    };
    config.training.boosting = BoostingParams {
        n_estimators: 40,
        max_depth: 3,
        ..BoostingParams::default()
    };
    config
}

/// Train into `dir` and return the config that points at the artifacts
pub fn train(dir: &Path) -> (AppConfig, TrainingReport) {
    let config = small_config(dir);
    let report = TrainingPipeline::new(&config).run().unwrap();
    (config, report)
}

/// Serve `service` on an ephemeral port; returns the base URL
pub async fn spawn_server(service: PredictionService) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(AppState::new(service), true);

    tokio::spawn(server::serve(listener, app, std::future::pending()));
    format!("http://{}", addr)
}

/// Payload with every risk factor present
pub fn high_risk_payload() -> serde_json::Value {
    serde_json::json!({
        "age": 50,
        "bmi": 32,
        "bp_systolic": 140,
        "fasting_glucose": 130,
        "familyHistory": 1,
        "activityLevel": 0,
        "cholesterol": 250,
        "yearsCondition": 8
    })
}
