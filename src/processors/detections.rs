//! Detection post-processing transforms.
//!
//! A fixed chain of pure transforms over a detection result: tensor
//! normalization, class filtering, label re-indexing, and pairwise
//! center-distance computation. Transforms assume exclusive ownership of
//! the result they mutate and are not designed for concurrent use on the
//! same record.
//!
//! Label convention: raw labels arrive 1-indexed from the detector.
//! Exactly one of [`filter_by_class`] or [`format_labels`] subtracts 1;
//! chaining both on the same result double-subtracts and is a caller
//! error.

use std::collections::HashSet;

use log::info;
use rayon::prelude::*;

use crate::core::detections::{
    Box3, DetectionError, Detections, RawDetections, Result, Tensor, BOX_DIMS,
};

/// Removes size-1 dimensions until the shape has at most `rank` dims.
///
/// Returns `None` when the shape cannot be reduced that far.
fn squeeze_to_rank(shape: &[usize], rank: usize) -> Option<Vec<usize>> {
    let mut dims: Vec<usize> = shape.to_vec();
    while dims.len() > rank {
        let pos = dims.iter().position(|&d| d == 1)?;
        dims.remove(pos);
    }
    Some(dims)
}

/// Validates a scalar-per-object field and returns its object count.
fn object_count(field: &'static str, tensor: &Tensor) -> Result<usize> {
    tensor.check_shape()?;
    squeeze_to_rank(&tensor.shape, 1).ok_or_else(|| DetectionError::UnsupportedShape {
        field,
        shape: tensor.shape.clone(),
    })?;
    Ok(tensor.len())
}

/// Converts raw runtime tensors into the typed [`Detections`] record.
///
/// Accepts boxes of shape `[N, B]` or `[1, N, B]` with `B >=` [`BOX_DIMS`]
/// (columns beyond the fixed encoding are ignored) and labels/scores of
/// shape `[N]`, `[N, 1]`, or `[1, N, 1]`. Labels are cast to integers.
/// Performs no label remapping and no filtering; normalizing equivalent
/// tensor layouts of the same result yields identical output.
pub fn normalize(raw: &RawDetections) -> Result<Detections> {
    let n = object_count("labels", &raw.labels)?;
    let n_scores = object_count("scores", &raw.scores)?;

    raw.boxes.check_shape()?;

    // Empty result: every field must be empty, whatever its shape says.
    if n == 0 {
        if n_scores != 0 || !raw.boxes.is_empty() {
            return Err(DetectionError::LengthMismatch {
                boxes: raw.boxes.len(),
                labels: 0,
                scores: n_scores,
            });
        }
        return Ok(Detections::default());
    }

    let box_dims = squeeze_to_rank(&raw.boxes.shape, 2)
        .filter(|dims| dims.len() == 2 || (dims.len() == 1 && n == 1))
        .ok_or_else(|| DetectionError::UnsupportedShape {
            field: "boxes",
            shape: raw.boxes.shape.clone(),
        })?;

    let (rows, width) = match box_dims.as_slice() {
        [rows, width] => (*rows, *width),
        // Single box delivered as a rank-1 row.
        [width] => (1, *width),
        _ => unreachable!(),
    };

    if width < BOX_DIMS {
        return Err(DetectionError::BoxTooNarrow(width));
    }
    if rows != n || n_scores != n {
        return Err(DetectionError::LengthMismatch {
            boxes: rows,
            labels: n,
            scores: n_scores,
        });
    }

    let boxes = raw
        .boxes
        .data
        .chunks_exact(width)
        .map(|row| Box3::from_row(&row[..BOX_DIMS]))
        .collect();
    let labels = raw.labels.data.iter().map(|&l| l as i64).collect();
    let scores = raw.scores.data.clone();

    Ok(Detections {
        boxes,
        labels,
        scores,
        distance_matrix: None,
    })
}

/// Restricts a result to an allow-list of classes and re-indexes labels.
///
/// With `classes_to_use` given and a non-empty result, keeps only objects
/// whose `label - 1` is in the set and relabels kept rows to `label - 1`,
/// preserving relative order. Without a set, relabels every row without
/// filtering. Empty results pass through unchanged.
///
/// Precondition: labels are still 1-indexed. Running this after
/// [`format_labels`] (or twice) subtracts twice. Any previously computed
/// distance matrix is discarded when rows are removed.
pub fn filter_by_class(
    detections: &mut Detections,
    classes_to_use: Option<&HashSet<i64>>,
) -> Result<()> {
    detections.check_lengths()?;

    if detections.is_empty() {
        return Ok(());
    }

    match classes_to_use {
        Some(keep) => {
            let indices: Vec<usize> = detections
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| keep.contains(&(label - 1)))
                .map(|(i, _)| i)
                .collect();

            detections.boxes = indices.iter().map(|&i| detections.boxes[i]).collect();
            detections.scores = indices.iter().map(|&i| detections.scores[i]).collect();
            detections.labels = indices
                .iter()
                .map(|&i| detections.labels[i] - 1)
                .collect();
            detections.distance_matrix = None;
        }
        None => {
            for label in &mut detections.labels {
                *label -= 1;
            }
        }
    }

    Ok(())
}

/// Re-indexes labels to 0-based without filtering.
///
/// The lighter-weight variant of [`filter_by_class`] for callers that do
/// not need an allow-list. Same precondition: labels must still be
/// 1-indexed, and chaining with [`filter_by_class`] double-subtracts.
pub fn format_labels(detections: &mut Detections) -> Result<()> {
    detections.check_lengths()?;

    if detections.is_empty() {
        return Ok(());
    }

    for label in &mut detections.labels {
        *label -= 1;
    }

    Ok(())
}

/// Fills the pairwise Euclidean distance matrix between box centers.
///
/// The matrix is N×N, symmetric with a zero diagonal, and uses only the
/// positional part of each box. Rows are computed in parallel. An empty
/// result produces an empty matrix.
pub fn compute_distance_matrix(detections: &mut Detections) -> Result<()> {
    detections.check_lengths()?;

    let centers: Vec<[f32; 3]> = detections.boxes.iter().map(|b| b.center).collect();

    let matrix: Vec<Vec<f32>> = centers
        .par_iter()
        .map(|a| {
            centers
                .iter()
                .map(|b| {
                    let dx = a[0] - b[0];
                    let dy = a[1] - b[1];
                    let dz = a[2] - b[2];
                    (dx * dx + dy * dy + dz * dz).sqrt()
                })
                .collect()
        })
        .collect();

    detections.distance_matrix = Some(matrix);
    Ok(())
}

/// Logs one line per detected object with its class name and confidence.
///
/// Expects 0-indexed labels; ids outside `class_names` resolve to
/// "unknown". Emits nothing beyond the count line for an empty result,
/// and nothing at all when no logger is installed or `info` is filtered.
pub fn display_detections(detections: &Detections, class_names: &[String]) {
    info!("model detected {} objects", detections.len());

    for (&label, &score) in detections.labels.iter().zip(detections.scores.iter()) {
        let name = usize::try_from(label)
            .ok()
            .and_then(|id| class_names.get(id))
            .map(String::as_str)
            .unwrap_or("unknown");
        info!("  {} (id {}) with confidence {:.3e}", name, label, score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_for(labels: &[f32], scores: &[f32], centers: &[[f32; 3]]) -> RawDetections {
        let n = labels.len();
        let mut box_data = Vec::with_capacity(n * BOX_DIMS);
        for c in centers {
            box_data.extend_from_slice(&[c[0], c[1], c[2], 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        }

        RawDetections {
            boxes: Tensor::new(box_data, vec![n, BOX_DIMS]).unwrap(),
            labels: Tensor::new(labels.to_vec(), vec![n, 1]).unwrap(),
            scores: Tensor::new(scores.to_vec(), vec![n, 1]).unwrap(),
        }
    }

    #[test]
    fn test_normalize_casts_labels() {
        let raw = raw_for(&[1.0, 3.0], &[0.9, 0.4], &[[0.0; 3], [1.0; 3]]);

        let det = normalize(&raw).unwrap();

        assert_eq!(det.labels, vec![1, 3]);
        assert_eq!(det.scores, vec![0.9, 0.4]);
        assert_eq!(det.boxes.len(), 2);
        assert!(det.check_lengths().is_ok());
    }

    #[test]
    fn test_normalize_accepts_batch_dim() {
        let flat = raw_for(&[2.0], &[0.5], &[[1.0, 2.0, 3.0]]);

        let batched = RawDetections {
            boxes: Tensor::new(flat.boxes.data.clone(), vec![1, 1, BOX_DIMS]).unwrap(),
            labels: Tensor::new(flat.labels.data.clone(), vec![1, 1, 1]).unwrap(),
            scores: Tensor::new(flat.scores.data.clone(), vec![1, 1, 1]).unwrap(),
        };

        assert_eq!(normalize(&batched).unwrap(), normalize(&flat).unwrap());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = raw_for(&[1.0, 2.0], &[0.9, 0.8], &[[0.0; 3], [3.0, 4.0, 0.0]]);
        let once = normalize(&raw).unwrap();

        // Rebuild an equivalent raw record from the canonical output and
        // normalize again; the result must be identical.
        let rewrapped = RawDetections {
            boxes: Tensor::new(
                once.boxes.iter().flat_map(|b| b.to_row()).collect(),
                vec![once.len(), BOX_DIMS],
            )
            .unwrap(),
            labels: Tensor::from_vec(once.labels.iter().map(|&l| l as f32).collect()),
            scores: Tensor::from_vec(once.scores.clone()),
        };

        assert_eq!(normalize(&rewrapped).unwrap(), once);
    }

    #[test]
    fn test_normalize_rejects_narrow_boxes() {
        let raw = RawDetections {
            boxes: Tensor::new(vec![1.0, 2.0, 3.0], vec![1, 3]).unwrap(),
            labels: Tensor::from_vec(vec![1.0]),
            scores: Tensor::from_vec(vec![0.9]),
        };

        assert!(matches!(
            normalize(&raw).unwrap_err(),
            DetectionError::BoxTooNarrow(3)
        ));
    }

    #[test]
    fn test_normalize_rejects_mismatched_counts() {
        let raw = RawDetections {
            boxes: Tensor::new(vec![0.0; BOX_DIMS], vec![1, BOX_DIMS]).unwrap(),
            labels: Tensor::from_vec(vec![1.0, 2.0]),
            scores: Tensor::from_vec(vec![0.9, 0.8]),
        };

        assert!(matches!(
            normalize(&raw).unwrap_err(),
            DetectionError::LengthMismatch { .. }
        ));
    }

    #[test]
    fn test_filter_by_class_keeps_and_relabels() {
        let raw = raw_for(
            &[1.0, 2.0, 3.0, 2.0, 1.0],
            &[0.9, 0.8, 0.7, 0.6, 0.5],
            &[[0.0; 3], [1.0; 3], [2.0; 3], [3.0; 3], [4.0; 3]],
        );
        let mut det = normalize(&raw).unwrap();

        let classes: HashSet<i64> = [0, 1].into_iter().collect();
        filter_by_class(&mut det, Some(&classes)).unwrap();

        // Original labels 1 and 2 survive, re-indexed, order preserved.
        assert_eq!(det.labels, vec![0, 1, 1, 0]);
        assert_eq!(det.scores, vec![0.9, 0.8, 0.6, 0.5]);
        assert_eq!(det.boxes[2].center, [3.0; 3]);
        assert!(det.check_lengths().is_ok());
    }

    #[test]
    fn test_filter_by_class_without_set_relabels_all() {
        let raw = raw_for(&[1.0, 3.0], &[0.9, 0.8], &[[0.0; 3], [1.0; 3]]);
        let mut det = normalize(&raw).unwrap();

        filter_by_class(&mut det, None).unwrap();

        assert_eq!(det.labels, vec![0, 2]);
        assert_eq!(det.len(), 2);
    }

    #[test]
    fn test_filter_discards_stale_distance_matrix() {
        let raw = raw_for(&[1.0, 2.0], &[0.9, 0.8], &[[0.0; 3], [1.0; 3]]);
        let mut det = normalize(&raw).unwrap();
        compute_distance_matrix(&mut det).unwrap();

        let classes: HashSet<i64> = [0].into_iter().collect();
        filter_by_class(&mut det, Some(&classes)).unwrap();

        assert_eq!(det.len(), 1);
        assert!(det.distance_matrix.is_none());
    }

    #[test]
    fn test_format_labels() {
        let raw = raw_for(&[1.0, 2.0, 5.0], &[0.9, 0.8, 0.7], &[[0.0; 3]; 3]);
        let mut det = normalize(&raw).unwrap();

        format_labels(&mut det).unwrap();

        assert_eq!(det.labels, vec![0, 1, 4]);
        assert_eq!(det.len(), 3);
    }

    #[test]
    fn test_distance_matrix_values() {
        let raw = raw_for(&[1.0, 1.0], &[0.9, 0.8], &[[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]);
        let mut det = normalize(&raw).unwrap();

        compute_distance_matrix(&mut det).unwrap();

        let m = det.distance_matrix.as_ref().unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0], vec![0.0, 5.0]);
        assert_eq!(m[1], vec![5.0, 0.0]);
    }

    #[test]
    fn test_distance_matrix_ignores_size_and_rotation() {
        let mut det = Detections {
            boxes: vec![
                Box3 {
                    center: [0.0, 0.0, 0.0],
                    size: [9.0, 9.0, 9.0],
                    rotation: [1.0, 2.0, 3.0],
                },
                Box3 {
                    center: [1.0, 0.0, 0.0],
                    size: [0.1, 0.1, 0.1],
                    rotation: [0.0, 0.0, 0.0],
                },
            ],
            labels: vec![1, 2],
            scores: vec![0.9, 0.8],
            distance_matrix: None,
        };

        compute_distance_matrix(&mut det).unwrap();

        let m = det.distance_matrix.as_ref().unwrap();
        assert!((m[0][1] - 1.0).abs() < 1e-6);
        assert!((m[1][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_result_is_safe_everywhere() {
        let raw = RawDetections {
            boxes: Tensor::new(Vec::new(), vec![0, BOX_DIMS]).unwrap(),
            labels: Tensor::from_vec(Vec::new()),
            scores: Tensor::from_vec(Vec::new()),
        };

        let mut det = normalize(&raw).unwrap();
        assert!(det.is_empty());

        let classes: HashSet<i64> = [0].into_iter().collect();
        filter_by_class(&mut det, Some(&classes)).unwrap();
        assert!(det.is_empty());

        format_labels(&mut det).unwrap();
        assert!(det.is_empty());

        compute_distance_matrix(&mut det).unwrap();
        assert_eq!(det.distance_matrix.as_ref().unwrap().len(), 0);

        display_detections(&det, &[]);
    }

    #[test]
    fn test_transforms_fail_fast_on_length_mismatch() {
        let mut det = Detections {
            boxes: Vec::new(),
            labels: vec![1],
            scores: vec![0.9],
            distance_matrix: None,
        };

        assert!(filter_by_class(&mut det, None).is_err());
        assert!(format_labels(&mut det).is_err());
        assert!(compute_distance_matrix(&mut det).is_err());
    }
}
