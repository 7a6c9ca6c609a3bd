//! Configuration types for the lidar pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the sensor's scan geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Azimuth columns per scan
    #[serde(default = "default_columns")]
    pub columns: usize,

    /// Beams per column
    #[serde(default = "default_beams")]
    pub beams: usize,
}

fn default_columns() -> usize {
    1024
}

fn default_beams() -> usize {
    64
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            beams: default_beams(),
        }
    }
}

/// Configuration for the background ingestion stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// How long `start()` blocks so the producer loop reaches steady state
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Hand-off channel capacity; unbounded when absent. A full bounded
    /// channel drops the newest frame.
    #[serde(default)]
    pub channel_capacity: Option<usize>,
}

fn default_startup_delay_ms() -> u64 {
    200
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            channel_capacity: None,
        }
    }
}

/// Configuration for detection post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Class names indexed by 0-based label id
    #[serde(default = "default_class_names")]
    pub class_names: Vec<String>,

    /// 0-based class ids to keep; no filtering when absent
    #[serde(default)]
    pub classes_to_use: Option<Vec<i64>>,
}

fn default_class_names() -> Vec<String> {
    vec![
        "Car".to_string(),
        "Pedestrian".to_string(),
        "Cyclist".to_string(),
    ]
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            class_names: default_class_names(),
            classes_to_use: None,
        }
    }
}

/// Configuration for CSV frame recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Root directory for capture folders
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Capture folder name; a timestamped name is generated when absent
    #[serde(default)]
    pub folder: Option<String>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./lidar_csv")
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            folder: None,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.sensor.columns, 1024);
        assert_eq!(config.sensor.beams, 64);
        assert_eq!(config.stream.startup_delay_ms, 200);
        assert!(config.stream.channel_capacity.is_none());
        assert_eq!(config.detection.class_names.len(), 3);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = PipelineConfig::default();
        config.stream.channel_capacity = Some(16);
        config.detection.classes_to_use = Some(vec![0, 2]);

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();

        assert_eq!(loaded.stream.channel_capacity, Some(16));
        assert_eq!(loaded.detection.classes_to_use, Some(vec![0, 2]));
        assert_eq!(loaded.sensor.columns, 1024);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        std::fs::write(&path, "sensor:\n  columns: 512\n").unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();

        assert_eq!(loaded.sensor.columns, 512);
        assert_eq!(loaded.sensor.beams, 64);
        assert_eq!(loaded.stream.startup_delay_ms, 200);
    }
}
