//! Core data types and I/O operations.

pub mod detections;
pub mod frame;
pub mod timing;
pub mod writers;

pub use detections::{Box3, DetectionError, Detections, RawDetections, Tensor};
pub use frame::{combine_xyzr, compress_grid, PointFrame, ScanSource};
pub use timing::{MetricSummary, TimingLog};
pub use writers::{find_frame_files, FrameRecorder, WriteError};
