//! HTTP contract of the ML server

mod common;

use common::{high_risk_payload, spawn_server, train};
use health_risk_pipeline::types::{ErrorResponse, PredictionResponse};
use health_risk_pipeline::PredictionService;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn ready_server() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = train(dir.path());
    let service = PredictionService::start(&config);
    assert!(service.is_ready());
    let base = spawn_server(service).await;
    (dir, base)
}

#[tokio::test]
async fn test_health_is_exact_when_unready() {
    let base = spawn_server(PredictionService::unready("no artifacts")).await;

    let resp = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), r#"{"status":"ML Server is running"}"#);
}

#[tokio::test]
async fn test_predict_without_model_is_500() {
    let base = spawn_server(PredictionService::unready("no artifacts")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/predict", base))
        .json(&high_risk_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.error, "Model not loaded");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let base = spawn_server(PredictionService::unready("no artifacts")).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/health", base))
        .header("Origin", "http://dashboard.local")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_predict_contract() {
    let (_dir, base) = ready_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/predict", base);

    // Health body does not change once a model is loaded
    let health = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(health.text().await.unwrap(), r#"{"status":"ML Server is running"}"#);

    let resp = client.post(&url).json(&high_risk_payload()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let raw: Value = resp.json().await.unwrap();
    let keys: Vec<&str> = raw.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    for key in ["risk", "probability", "confidence", "feature_importance"] {
        assert!(keys.contains(&key), "missing {}", key);
    }

    let prediction: PredictionResponse = serde_json::from_value(raw).unwrap();
    assert_eq!(prediction.risk, 1);
    assert!(prediction.probability > 0.5);
    assert!(
        (prediction.confidence - prediction.probability.max(1.0 - prediction.probability)).abs()
            < 1e-12
    );
    assert_eq!(prediction.feature_importance.len(), 8);
    let total: f64 = prediction.feature_importance.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(prediction.feature_importance.contains_key("Fasting Glucose"));
}

#[tokio::test]
async fn test_bad_input_then_recovery() {
    let (_dir, base) = ready_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/predict", base);

    let resp = client
        .post(&url)
        .json(&json!({"age": "abc"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert!(!body.error.is_empty());

    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Service remains usable
    let resp = client.post(&url).json(&high_risk_payload()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_payload_and_idempotence() {
    let (_dir, base) = ready_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/predict", base);

    let resp = client.post(&url).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let empty: PredictionResponse = resp.json().await.unwrap();
    assert!((0.0..=1.0).contains(&empty.probability));
    assert_eq!(empty.risk, u8::from(empty.probability > 0.5));

    let mut responses = Vec::new();
    for _ in 0..3 {
        let resp = client.post(&url).json(&high_risk_payload()).send().await.unwrap();
        responses.push(resp.json::<PredictionResponse>().await.unwrap());
    }
    assert!(responses.windows(2).all(|w| w[0] == w[1]));
}
