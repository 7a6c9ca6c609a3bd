//! Detection records: raw runtime tensors and the normalized form.
//!
//! Detector runtimes hand back every output as an f32 tensor with an
//! explicit shape, labels included. [`crate::processors::detections::normalize`]
//! is the single place that converts those tensors into the typed
//! [`Detections`] record the rest of the transform chain operates on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of columns in the fixed-width box encoding.
pub const BOX_DIMS: usize = 9;

/// Errors that can occur in detection records and transforms.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("tensor shape {shape:?} does not match data length {len}")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("unsupported {field} tensor shape: {shape:?}")]
    UnsupportedShape {
        field: &'static str,
        shape: Vec<usize>,
    },

    #[error("parallel field lengths differ: boxes={boxes}, labels={labels}, scores={scores}")]
    LengthMismatch {
        boxes: usize,
        labels: usize,
        scores: usize,
    },

    #[error("box rows need at least 9 columns, got {0}")]
    BoxTooNarrow(usize),
}

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Raw inference-runtime output: row-major data plus its tensor shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Creates a tensor, verifying the shape covers the data.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(DetectionError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Creates a rank-1 tensor from a flat vector.
    pub fn from_vec(data: Vec<f32>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the tensor holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Verifies the stored shape covers the stored data.
    pub fn check_shape(&self) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(DetectionError::ShapeMismatch {
                shape: self.shape.clone(),
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

/// A detection result exactly as handed over by the detector runtime.
///
/// `labels` are 1-indexed class ids still stored as floats; `boxes` is an
/// N×9 tensor (possibly with a leading batch dimension of 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetections {
    pub boxes: Tensor,
    pub labels: Tensor,
    pub scores: Tensor,
}

/// Fixed-width 3D box: center, extent (l, w, h), rotation (rx, ry, rz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3 {
    pub center: [f32; 3],
    pub size: [f32; 3],
    pub rotation: [f32; 3],
}

impl Box3 {
    /// Builds a box from the leading [`BOX_DIMS`] columns of a row.
    ///
    /// Panics if the row is shorter than [`BOX_DIMS`]; callers validate
    /// row width before slicing.
    pub fn from_row(row: &[f32]) -> Self {
        Self {
            center: [row[0], row[1], row[2]],
            size: [row[3], row[4], row[5]],
            rotation: [row[6], row[7], row[8]],
        }
    }

    /// Returns the row form of the box, center first.
    pub fn to_row(&self) -> [f32; BOX_DIMS] {
        [
            self.center[0],
            self.center[1],
            self.center[2],
            self.size[0],
            self.size[1],
            self.size[2],
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
        ]
    }
}

/// A normalized detection result: three parallel per-object sequences.
///
/// Invariant: `boxes`, `labels`, and `scores` always share length N.
/// Every transform verifies this on entry and fails fast on violation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    /// One box per detected object.
    pub boxes: Vec<Box3>,
    /// One class id per object. 1-indexed on arrival from the detector;
    /// 0-indexed after `filter_by_class` or `format_labels` has run.
    pub labels: Vec<i64>,
    /// One confidence score per object.
    pub scores: Vec<f32>,
    /// Pairwise center distances, filled by `compute_distance_matrix`.
    pub distance_matrix: Option<Vec<Vec<f32>>>,
}

impl Detections {
    /// Returns the number of detected objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the result holds no objects.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Verifies the three parallel fields share a length.
    pub fn check_lengths(&self) -> Result<()> {
        if self.boxes.len() != self.labels.len() || self.labels.len() != self.scores.len() {
            return Err(DetectionError::LengthMismatch {
                boxes: self.boxes.len(),
                labels: self.labels.len(),
                scores: self.scores.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_shape_validation() {
        assert!(Tensor::new(vec![1.0, 2.0, 3.0], vec![3]).is_ok());
        assert!(Tensor::new(vec![1.0, 2.0, 3.0], vec![3, 1]).is_ok());

        let err = Tensor::new(vec![1.0, 2.0], vec![3]).unwrap_err();
        assert!(matches!(err, DetectionError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_tensor_from_vec() {
        let t = Tensor::from_vec(vec![0.5, 0.7]);
        assert_eq!(t.shape, vec![2]);
        assert_eq!(t.len(), 2);
        assert!(t.check_shape().is_ok());
    }

    #[test]
    fn test_box3_row_round_trip() {
        let row = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = Box3::from_row(&row);

        assert_eq!(b.center, [1.0, 2.0, 3.0]);
        assert_eq!(b.size, [4.0, 5.0, 6.0]);
        assert_eq!(b.rotation, [7.0, 8.0, 9.0]);
        assert_eq!(b.to_row(), row);
    }

    #[test]
    fn test_check_lengths() {
        let det = Detections {
            boxes: vec![Box3::from_row(&[0.0; 9])],
            labels: vec![1, 2],
            scores: vec![0.9, 0.8],
            distance_matrix: None,
        };

        let err = det.check_lengths().unwrap_err();
        assert!(matches!(
            err,
            DetectionError::LengthMismatch {
                boxes: 1,
                labels: 2,
                scores: 2
            }
        ));
    }
}
