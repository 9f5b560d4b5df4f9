use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    turns_total: AtomicU64,
    sensitive_total: AtomicU64,
    safe_total: AtomicU64,
    remote_failures_total: AtomicU64,
    classifier_inference_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_total: u64,
    pub sensitive_total: u64,
    pub safe_total: u64,
    pub remote_failures_total: u64,
    pub classifier_inference_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_turn(&self) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("privacy_filter_turns_total").increment(1);
    }

    /// Counts one routed turn under its label.
    pub fn inc_routed(&self, sensitive: bool) {
        if sensitive {
            self.sensitive_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.safe_total.fetch_add(1, Ordering::Relaxed);
        }
        let label = if sensitive { "sensitive" } else { "safe" };
        metrics::counter!("privacy_filter_routed_total", "label" => label).increment(1);
    }

    pub fn inc_remote_failure(&self) {
        self.remote_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("privacy_filter_remote_failures_total").increment(1);
    }

    pub fn inc_classifier_inference(&self) {
        self.classifier_inference_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("privacy_filter_classifier_inference_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let turns = self.turns_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            turns_total: turns,
            sensitive_total: self.sensitive_total.load(Ordering::Relaxed),
            safe_total: self.safe_total.load(Ordering::Relaxed),
            remote_failures_total: self.remote_failures_total.load(Ordering::Relaxed),
            classifier_inference_total: self.classifier_inference_total.load(Ordering::Relaxed),
            avg_latency_millis: if turns == 0 {
                0.0
            } else {
                latency as f64 / turns as f64
            },
        }
    }
}

/// JSON logs on stderr, filtered by `RUST_LOG` when set.
pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,campus_agents=info,campus_llm=info",
                service_name.replace('-', "_")
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .init();
    });
}
