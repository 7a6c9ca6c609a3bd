//! Real-time lidar ingestion and detection post-processing pipeline.
//!
//! This crate provides tools for:
//! - Streaming sensor scans into point frames on a background thread
//! - Non-blocking frame hand-off through a FIFO channel
//! - Normalizing, filtering, and enriching object-detection results
//! - Recording per-frame geometry and label CSVs
//!
//! # Example
//!
//! ```no_run
//! use lidar_pipeline::config::StreamConfig;
//! use lidar_pipeline::stream::{StreamIngestor, SyntheticScanSource};
//!
//! let source = SyntheticScanSource::new(1024, 64, Some(10));
//! let mut ingestor = StreamIngestor::new(source, &StreamConfig::default());
//! ingestor.start().unwrap();
//! while let Some(frame) = ingestor.get_frame() {
//!     println!("{} points", frame.len());
//! }
//! ingestor.stop().unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod stream;
pub mod visualization;

pub use config::{DetectionConfig, PipelineConfig, RecorderConfig, SensorConfig, StreamConfig};
pub use core::detections::{Box3, Detections, RawDetections, Tensor};
pub use core::frame::{PointFrame, ScanSource};
pub use stream::StreamIngestor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
