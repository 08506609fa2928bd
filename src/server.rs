//! HTTP surface: `GET /api/health` and `POST /api/predict`

use crate::error::PredictError;
use crate::metrics::{RequestOutcome, ServiceMetrics};
use crate::service::PredictionService;
use crate::types::prediction::{ErrorResponse, HealthResponse, PredictionResponse};
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::ModelUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn outcome(&self) -> RequestOutcome {
        match self {
            PredictError::ModelUnavailable => RequestOutcome::Unavailable,
            PredictError::InvalidInput(_) => RequestOutcome::InvalidInput,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState, cors: bool) -> Router {
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/predict", post(predict))
        .with_state(state);

    if cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "ML server listening");
    info!("  • Health endpoint:  GET  /api/health");
    info!("  • Predict endpoint: POST /api/predict");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    state.metrics.record_health_check();
    debug!(ready = state.service.is_ready(), "Health check");
    Json(HealthResponse::default())
}

async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, PredictError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("predict", %request_id);
    let started = Instant::now();

    let result = span.in_scope(|| state.service.predict(&body));
    let latency = started.elapsed();

    match result {
        Ok(response) => {
            state.metrics.record_request(RequestOutcome::Success, latency);
            state
                .metrics
                .record_prediction(response.risk, response.probability);
            span.in_scope(|| {
                debug!(
                    risk = response.risk,
                    probability = response.probability,
                    latency_us = latency.as_micros() as u64,
                    "Prediction served"
                )
            });
            Ok(Json(response))
        }
        Err(e) => {
            state.metrics.record_request(e.outcome(), latency);
            Err(e)
        }
    }
}
