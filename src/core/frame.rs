//! Point frames and the sensor-stream boundary.
//!
//! A [`ScanSource`] yields opaque scans and knows how to derive per-beam
//! geometry from them. The free functions in this module turn those
//! derived fields into the canonical flat [`PointFrame`] that the rest
//! of the pipeline consumes.

use anyhow::Result;

/// A single captured frame: one row per point, columns {x, y, z, intensity}.
///
/// Frames are immutable after creation and owned exclusively by whichever
/// consumer dequeues them. Row order is stable within a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFrame {
    points: Vec<[f32; 4]>,
}

impl PointFrame {
    /// Creates a frame from pre-built rows.
    pub fn new(points: Vec<[f32; 4]>) -> Self {
        Self { points }
    }

    /// Returns the number of points in the frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the frame contains no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the rows of the frame.
    #[inline]
    pub fn points(&self) -> &[[f32; 4]] {
        &self.points
    }
}

impl Default for PointFrame {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

/// The sensor-SDK boundary.
///
/// A source is an in-process stream of opaque scans. Given a scan, the
/// source derives its geometric fields as a `[columns][beams]` grid, the
/// staggered layout sensors deliver natively. [`combine_xyzr`] and
/// [`compress_grid`] collapse that grid into a [`PointFrame`].
pub trait ScanSource {
    /// Opaque per-iteration unit; only read through the derivations below.
    type Scan;

    /// Pulls the next scan. `Ok(None)` means the stream is exhausted;
    /// an error means the source failed mid-stream. Both end ingestion.
    fn next_scan(&mut self) -> Result<Option<Self::Scan>>;

    /// Per-beam 3D coordinates, shape `[columns][beams]`.
    fn positions(&self, scan: &Self::Scan) -> Vec<Vec<[f32; 3]>>;

    /// Per-beam reflectivity/signal values, same grid shape as `positions`.
    fn intensities(&self, scan: &Self::Scan) -> Vec<Vec<f32>>;
}

/// Zip a position grid and an intensity grid into xyzr records.
///
/// Both grids must have identical shape.
pub fn combine_xyzr(
    positions: &[Vec<[f32; 3]>],
    intensities: &[Vec<f32>],
) -> Vec<Vec<[f32; 4]>> {
    debug_assert_eq!(
        positions.len(),
        intensities.len(),
        "position and intensity grids must have same column count"
    );

    positions
        .iter()
        .zip(intensities.iter())
        .map(|(pos_col, int_col)| {
            debug_assert_eq!(pos_col.len(), int_col.len());

            pos_col
                .iter()
                .zip(int_col.iter())
                .map(|(&[x, y, z], &r)| [x, y, z, r])
                .collect()
        })
        .collect()
}

/// Collapse the grid's leading dimension into the canonical 2-D frame.
///
/// Rows keep grid order: column-major over the grid, beam order within
/// each column. Total row count is the sum of the column lengths.
pub fn compress_grid(grid: Vec<Vec<[f32; 4]>>) -> PointFrame {
    let total: usize = grid.iter().map(|col| col.len()).sum();

    let mut points = Vec::with_capacity(total);
    for col in grid {
        points.extend(col);
    }

    PointFrame::new(points)
}
