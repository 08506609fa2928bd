//! Request metrics and statistics tracking for the prediction service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// How a prediction request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    InvalidInput,
    Unavailable,
}

/// Metrics collector for the prediction service
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Predictions with risk = 1
    pub at_risk: AtomicU64,
    /// Requests rejected with 400
    pub invalid_requests: AtomicU64,
    /// Requests rejected with 500 while no model is loaded
    pub unavailable_requests: AtomicU64,
    /// Health checks served
    pub health_checks: AtomicU64,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            at_risk: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            unavailable_requests: AtomicU64::new(0),
            health_checks: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a finished prediction request
    pub fn record_request(&self, outcome: RequestOutcome, latency: Duration) {
        let counter = match outcome {
            RequestOutcome::Success => &self.predictions,
            RequestOutcome::InvalidInput => &self.invalid_requests,
            RequestOutcome::Unavailable => &self.unavailable_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut times = self.latencies.write().unwrap_or_else(|e| e.into_inner());
        times.push(latency.as_micros() as u64);
        if times.len() > MAX_LATENCY_SAMPLES {
            times.drain(0..MAX_LATENCY_SAMPLES / 2);
        }
    }

    /// Record the model output of a successful prediction
    pub fn record_prediction(&self, risk: u8, probability: f64) {
        if risk == 1 {
            self.at_risk.fetch_add(1, Ordering::Relaxed);
        }
        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        let mut buckets = self
            .probability_buckets
            .write()
            .unwrap_or_else(|e| e.into_inner());
        buckets[bucket] += 1;
    }

    pub fn record_health_check(&self) {
        self.health_checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Total prediction requests, whatever the outcome
    pub fn total_requests(&self) -> u64 {
        self.predictions.load(Ordering::Relaxed)
            + self.invalid_requests.load(Ordering::Relaxed)
            + self.unavailable_requests.load(Ordering::Relaxed)
    }

    /// Latency statistics over the retained samples
    pub fn get_latency_stats(&self) -> LatencyStats {
        let mut sorted = self
            .latencies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_requests() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        *self
            .probability_buckets
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let total = self.total_requests();
        let predictions = self.predictions.load(Ordering::Relaxed);
        let at_risk = self.at_risk.load(Ordering::Relaxed);
        let at_risk_rate = if predictions > 0 {
            (at_risk as f64 / predictions as f64) * 100.0
        } else {
            0.0
        };

        let latency = self.get_latency_stats();
        let throughput = self.get_throughput();
        let distribution = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            HEALTH RISK SERVICE - METRICS SUMMARY             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests:    {:>8}  │  Throughput: {:>6.1} req/s            ║",
            total, throughput
        );
        info!(
            "║ Predictions: {:>8}  │  At Risk:    {:>6.1}%                ║",
            predictions, at_risk_rate
        );
        info!(
            "║ Invalid:     {:>8}  │  Unavailable: {:>6}                 ║",
            self.invalid_requests.load(Ordering::Relaxed),
            self.unavailable_requests.load(Ordering::Relaxed)
        );
        info!(
            "║ Health checks: {:>6}                                        ║",
            self.health_checks.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}      ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Probability Distribution:                               ║");
        let bucket_total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if bucket_total > 0 {
                (count as f64 / bucket_total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Log a summary every interval; returns at once when the interval is zero
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if self.metrics.total_requests() > 0 {
                self.metrics.print_summary();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request(RequestOutcome::Success, Duration::from_micros(100));
        metrics.record_prediction(1, 0.83);
        metrics.record_request(RequestOutcome::Success, Duration::from_micros(200));
        metrics.record_prediction(0, 0.12);
        metrics.record_request(RequestOutcome::InvalidInput, Duration::from_micros(50));
        metrics.record_request(RequestOutcome::Unavailable, Duration::from_micros(10));

        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.at_risk.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.invalid_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.unavailable_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_requests(), 4);

        let distribution = metrics.get_probability_distribution();
        assert_eq!(distribution[8], 1);
        assert_eq!(distribution[1], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_latency_stats(), LatencyStats::default());

        for us in 1..=100 {
            metrics.record_request(RequestOutcome::Success, Duration::from_micros(us));
        }
        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
    }

    #[test]
    fn test_probability_one_lands_in_last_bucket() {
        let metrics = ServiceMetrics::new();
        metrics.record_prediction(1, 1.0);
        assert_eq!(metrics.get_probability_distribution()[9], 1);
    }
}
