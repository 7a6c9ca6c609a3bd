//! Data processing modules.

pub mod detections;

// Re-export key operations for convenience
pub use detections::{
    compute_distance_matrix, display_detections, filter_by_class, format_labels, normalize,
};
