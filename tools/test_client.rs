//! Test Prediction Client
//!
//! Generates patient payloads and posts them concurrently to a running ML server.

use futures::stream::{self, StreamExt};
use health_risk_pipeline::types::{PatientPayload, PredictionResponse};
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Patient payload generator for testing
struct PatientGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PatientGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Young, lean, active, normal labs
    fn generate_healthy(&mut self) -> PatientPayload {
        PatientPayload {
            age: self.rng.gen_range(20..45) as f64,
            bmi: self.rng.gen_range(18.5..25.0),
            bp_systolic: self.rng.gen_range(100.0..125.0),
            fasting_glucose: self.rng.gen_range(70.0..99.0),
            family_history: 0.0,
            activity_level: self.rng.gen_range(1..=3) as f64,
            cholesterol: self.rng.gen_range(150.0..220.0),
            years_condition: self.rng.gen_range(0.0..3.0),
        }
    }

    /// Several risk factors present at once
    fn generate_at_risk(&mut self) -> PatientPayload {
        PatientPayload {
            age: self.rng.gen_range(50..80) as f64,
            bmi: self.rng.gen_range(30.5..42.0),
            bp_systolic: self.rng.gen_range(135.0..175.0),
            fasting_glucose: self.rng.gen_range(126.0..200.0),
            family_history: if self.rng.gen_bool(0.7) { 1.0 } else { 0.0 },
            activity_level: 0.0,
            cholesterol: self.rng.gen_range(240.0..300.0),
            years_condition: self.rng.gen_range(5.5..15.0),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "http://localhost:3002".to_string());
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let at_risk_rate = parse_rate(args.get(3).map(String::as_str), 0.3);
    let concurrency: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(8);

    info!(
        base_url = %base_url,
        count = count,
        at_risk_rate = at_risk_rate,
        concurrency = concurrency,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let health_url = format!("{}/api/health", base_url);
    match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => info!("Server is up"),
        Ok(resp) => {
            warn!(status = %resp.status(), "Health check failed. Running in dry-run mode.");
            return run_dry_mode(count, at_risk_rate);
        }
        Err(e) => {
            warn!(error = %e, "Server unreachable. Running in dry-run mode.");
            return run_dry_mode(count, at_risk_rate);
        }
    }

    let mut generator = PatientGenerator::new();
    let mut rng = rand::thread_rng();
    let payloads: Vec<(bool, PatientPayload)> = (0..count)
        .map(|_| {
            if rng.gen_bool(at_risk_rate) {
                (true, generator.generate_at_risk())
            } else {
                (false, generator.generate_healthy())
            }
        })
        .collect();

    let predict_url = format!("{}/api/predict", base_url);
    let started = Instant::now();

    let results: Vec<(bool, anyhow::Result<PredictionResponse>)> = stream::iter(payloads)
        .map(|(expected_at_risk, payload)| {
            let client = client.clone();
            let url = predict_url.clone();
            async move {
                let result = async {
                    let resp = client.post(&url).json(&payload).send().await?;
                    let status = resp.status();
                    if !status.is_success() {
                        anyhow::bail!("{}: {}", status, resp.text().await.unwrap_or_default());
                    }
                    Ok(resp.json::<PredictionResponse>().await?)
                }
                .await;
                (expected_at_risk, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let elapsed = started.elapsed();
    let mut failures = 0;
    let mut predicted_at_risk = 0;
    let mut agreements = 0;

    for (expected_at_risk, result) in &results {
        match result {
            Ok(prediction) => {
                if prediction.risk == 1 {
                    predicted_at_risk += 1;
                }
                if (prediction.risk == 1) == *expected_at_risk {
                    agreements += 1;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, "Prediction request failed");
            }
        }
    }

    let succeeded = results.len() - failures;
    info!(
        sent = results.len(),
        succeeded = succeeded,
        failed = failures,
        predicted_at_risk = predicted_at_risk,
        agreement = format!("{:.1}%", 100.0 * agreements as f64 / succeeded.max(1) as f64),
        throughput = format!("{:.1} req/s", results.len() as f64 / elapsed.as_secs_f64().max(1e-9)),
        "Completed"
    );

    Ok(())
}

/// Share of at-risk payloads: clamped to [0, 1], `default` when unparsable
fn parse_rate(raw: Option<&str>, default: f64) -> f64 {
    match raw.and_then(|s| s.trim().parse::<f64>().ok()) {
        Some(rate) if rate.is_finite() => rate.clamp(0.0, 1.0),
        Some(_) | None => default,
    }
}

fn run_dry_mode(count: usize, at_risk_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no server connection)");

    let mut generator = PatientGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let payload = if rng.gen_bool(at_risk_rate) {
            generator.generate_at_risk()
        } else {
            generator.generate_healthy()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample payload {}:\n{}", i + 1, serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
