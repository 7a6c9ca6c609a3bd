//! Deterministic synthetic scan source.
//!
//! Stands in for sensor hardware in the CLI and in tests: emits a
//! rotating-ring geometry with LCG-generated reflectivity noise, fully
//! reproducible from the seed.

use anyhow::Result;

use crate::core::frame::ScanSource;

/// One synthetic scan: a `[columns][beams]` grid of ranges and
/// reflectivity values plus the scan's sequence index.
#[derive(Debug, Clone)]
pub struct SyntheticScan {
    /// Sequence index, starting at 0.
    pub index: usize,
    ranges: Vec<Vec<f32>>,
    reflectivity: Vec<Vec<f32>>,
}

/// Generates an endless (or length-limited) stream of synthetic scans.
pub struct SyntheticScanSource {
    columns: usize,
    beams: usize,
    limit: Option<usize>,
    produced: usize,
    state: u64,
}

impl SyntheticScanSource {
    /// Creates a source emitting `columns x beams` scans; `limit` caps
    /// the stream length, `None` streams forever.
    pub fn new(columns: usize, beams: usize, limit: Option<usize>) -> Self {
        Self {
            columns,
            beams,
            limit,
            produced: 0,
            state: 12345,
        }
    }

    /// Next value in [0, 1) from the internal LCG.
    fn next_noise(&mut self) -> f32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 40) as f32) / ((1u64 << 24) as f32)
    }
}

impl ScanSource for SyntheticScanSource {
    type Scan = SyntheticScan;

    fn next_scan(&mut self) -> Result<Option<SyntheticScan>> {
        if let Some(limit) = self.limit {
            if self.produced >= limit {
                return Ok(None);
            }
        }

        let index = self.produced;
        let mut ranges = Vec::with_capacity(self.columns);
        let mut reflectivity = Vec::with_capacity(self.columns);

        for _ in 0..self.columns {
            let mut range_col = Vec::with_capacity(self.beams);
            let mut refl_col = Vec::with_capacity(self.beams);
            for _ in 0..self.beams {
                range_col.push(5.0 + 20.0 * self.next_noise());
                refl_col.push(255.0 * self.next_noise());
            }
            ranges.push(range_col);
            reflectivity.push(refl_col);
        }

        self.produced += 1;
        Ok(Some(SyntheticScan {
            index,
            ranges,
            reflectivity,
        }))
    }

    fn positions(&self, scan: &SyntheticScan) -> Vec<Vec<[f32; 3]>> {
        let columns = scan.ranges.len();

        scan.ranges
            .iter()
            .enumerate()
            .map(|(c, range_col)| {
                let azimuth = 2.0 * std::f32::consts::PI * c as f32 / columns.max(1) as f32;
                let cos_a = azimuth.cos();
                let sin_a = azimuth.sin();
                let beams = range_col.len();

                range_col
                    .iter()
                    .enumerate()
                    .map(|(b, &range)| {
                        // Elevation spread of +-15 degrees across the beams.
                        let elevation = if beams > 1 {
                            (b as f32 / (beams - 1) as f32 - 0.5) * std::f32::consts::PI / 6.0
                        } else {
                            0.0
                        };
                        let horizontal = range * elevation.cos();
                        [horizontal * cos_a, horizontal * sin_a, range * elevation.sin()]
                    })
                    .collect()
            })
            .collect()
    }

    fn intensities(&self, scan: &SyntheticScan) -> Vec<Vec<f32>> {
        scan.reflectivity.clone()
    }
}
