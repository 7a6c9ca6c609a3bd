//! Per-frame timing metrics.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when logging timing metrics.
#[derive(Error, Debug)]
pub enum TimingError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
}

/// Result type for timing operations.
pub type Result<T> = std::result::Result<T, TimingError>;

/// Summary statistics for one metric, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub name: String,
    pub samples: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Collects named series of per-frame durations.
#[derive(Debug, Default)]
pub struct TimingLog {
    series: HashMap<String, Vec<f64>>,
}

impl TimingLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a metric. Re-registering an existing name keeps its
    /// samples.
    pub fn create_metric(&mut self, name: &str) {
        self.series.entry(name.to_string()).or_default();
    }

    /// Appends one sample to a registered metric.
    pub fn log_duration(&mut self, name: &str, duration: Duration) -> Result<()> {
        let samples = self
            .series
            .get_mut(name)
            .ok_or_else(|| TimingError::UnknownMetric(name.to_string()))?;
        samples.push(duration.as_secs_f64() * 1e3);
        Ok(())
    }

    /// Returns the raw sample series for a metric, if registered.
    pub fn samples(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Returns the registered metric names in sorted order.
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.series.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Summary statistics per metric, sorted by name. Metrics without
    /// samples are skipped.
    pub fn summary(&self) -> Vec<MetricSummary> {
        let mut out: Vec<MetricSummary> = self
            .series
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(name, samples)| {
                let sum: f64 = samples.iter().sum();
                let min = samples.iter().copied().fold(f64::MAX, f64::min);
                let max = samples.iter().copied().fold(f64::MIN, f64::max);
                MetricSummary {
                    name: name.clone(),
                    samples: samples.len(),
                    mean_ms: sum / samples.len() as f64,
                    min_ms: min,
                    max_ms: max,
                }
            })
            .collect();

        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_and_summarize() {
        let mut log = TimingLog::new();
        log.create_metric("acquire");
        log.create_metric("record");

        log.log_duration("acquire", Duration::from_millis(10)).unwrap();
        log.log_duration("acquire", Duration::from_millis(20)).unwrap();
        log.log_duration("record", Duration::from_millis(5)).unwrap();

        let summary = log.summary();
        assert_eq!(summary.len(), 2);

        // Sorted by name: acquire first.
        assert_eq!(summary[0].name, "acquire");
        assert_eq!(summary[0].samples, 2);
        assert!((summary[0].mean_ms - 15.0).abs() < 1e-9);
        assert!((summary[0].min_ms - 10.0).abs() < 1e-9);
        assert!((summary[0].max_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        let mut log = TimingLog::new();
        let err = log
            .log_duration("missing", Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, TimingError::UnknownMetric(_)));
    }

    #[test]
    fn test_empty_metric_excluded_from_summary() {
        let mut log = TimingLog::new();
        log.create_metric("idle");
        assert!(log.summary().is_empty());
        assert_eq!(log.metric_names(), vec!["idle"]);
    }
}
