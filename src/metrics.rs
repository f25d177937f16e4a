//! Task-scoped metrics for a reduce session.
//!
//! A [`MetricsCollector`] is a cheap, cloneable handle. The session records output
//! counts per label into it, and it can also serve as the progress sampler's
//! [`Instrumentation`] sink, in which case it keeps the latest input counters and
//! memory readings.
//!
//! # Example
//!
//! ```
//! use ironreduce::metrics::MetricsCollector;
//! use serde_json::json;
//!
//! let metrics = MetricsCollector::new();
//! metrics.increment_counter("output_records.counts", 2);
//! metrics.set_gauge("peak_memory_bytes", 4096.0);
//! assert_eq!(metrics.snapshot()["output_records.counts"], json!(2));
//! ```

use crate::sampler::{Instrumentation, ProgressEvent};
use anyhow::Result;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const INPUT_KEY_COUNT: &str = "input_key_count";
pub const INPUT_VALUE_COUNT: &str = "input_value_count";
pub const MEMORY_BYTES: &str = "memory_bytes";
pub const PEAK_MEMORY_BYTES: &str = "peak_memory_bytes";
pub const PROGRESS_EVENTS: &str = "progress_events";

/// Counter name for records written under `label`.
#[must_use]
pub fn output_counter(label: &str) -> String {
    format!("output_records.{label}")
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum MetricValue {
    Counter(u64),
    Gauge(f64),
}

impl MetricValue {
    fn to_json(self) -> Value {
        match self {
            Self::Counter(c) => json!(c),
            Self::Gauge(g) => json!(g),
        }
    }
}

#[derive(Default)]
struct Inner {
    metrics: BTreeMap<String, MetricValue>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

/// Thread-safe metric store shared by the session and its observers.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Inner>>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to a counter, creating it at zero first.
    ///
    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .metrics
            .entry(name.to_string())
            .or_insert(MetricValue::Counter(0));
        if let MetricValue::Counter(c) = slot {
            *c += value;
        } else {
            *slot = MetricValue::Counter(value);
        }
    }

    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    pub fn set_counter(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.insert(name.to_string(), MetricValue::Counter(value));
    }

    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    pub fn set_gauge(&self, name: &str, value: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.insert(name.to_string(), MetricValue::Gauge(value));
    }

    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        match inner.metrics.get(name) {
            Some(MetricValue::Counter(c)) => Some(*c),
            _ => None,
        }
    }

    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    pub fn record_start(&self) {
        self.inner.lock().unwrap().start_time = Some(Instant::now());
    }

    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    pub fn record_end(&self) {
        self.inner.lock().unwrap().end_time = Some(Instant::now());
    }

    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// All metrics by name.
    ///
    /// # Panics
    ///
    /// Panics if the collector's lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .metrics
            .iter()
            .map(|(name, v)| (name.clone(), v.to_json()))
            .collect()
    }

    /// All metrics as a JSON object, plus `execution_time_ms` once the task ended.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out: serde_json::Map<String, Value> = self.snapshot().into_iter().collect();
        if let Some(elapsed) = self.elapsed() {
            out.insert("execution_time_ms".to_string(), json!(elapsed.as_millis()));
        }
        Value::Object(out)
    }

    /// Log every metric at `info` level.
    pub fn report(&self) {
        for (name, value) in self.snapshot() {
            log::info!("{name}: {value}");
        }
        if let Some(elapsed) = self.elapsed() {
            log::info!("execution time: {:.3}s", elapsed.as_secs_f64());
        }
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let mut file = File::create(path)?;
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}

impl Instrumentation for MetricsCollector {
    #[allow(clippy::cast_precision_loss)]
    fn on_event(&mut self, event: &ProgressEvent) {
        self.set_counter(INPUT_KEY_COUNT, event.keys);
        self.set_counter(INPUT_VALUE_COUNT, event.values);
        self.set_gauge(MEMORY_BYTES, event.memory.resident_bytes as f64);
        self.set_gauge(PEAK_MEMORY_BYTES, event.memory.peak_resident_bytes as f64);
        self.increment_counter(PROGRESS_EVENTS, 1);
    }
}
