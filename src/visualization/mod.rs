//! Visualization of timing metrics.
//!
//! Renders the per-frame duration series collected in a
//! [`TimingLog`](crate::core::timing::TimingLog) as a PNG line chart
//! using the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::timing::TimingLog;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No timing samples to plot")]
    EmptyLog,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Color palette for metric series.
const METRIC_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Plot every metric's per-frame duration series as a line and save as PNG.
///
/// X is the sample (frame) index, Y the duration in milliseconds. One
/// colored line per metric (untitled - no fonts on WSL).
pub fn plot_metric_series(output_path: &Path, log: &TimingLog) -> Result<()> {
    let names = log.metric_names();

    let mut max_samples = 0usize;
    let mut max_ms = f32::MIN;

    for name in &names {
        if let Some(samples) = log.samples(name) {
            max_samples = max_samples.max(samples.len());
            for &ms in samples {
                max_ms = max_ms.max(ms as f32);
            }
        }
    }

    if max_samples == 0 {
        return Err(VisualizationError::EmptyLog);
    }

    if max_ms <= 0.0 {
        max_ms = 1.0;
    }

    let root =
        BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0f32..(max_samples.saturating_sub(1).max(1)) as f32, 0f32..max_ms * 1.05)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for (series_idx, name) in names.iter().enumerate() {
        let samples = match log.samples(name) {
            Some(samples) if !samples.is_empty() => samples,
            _ => continue,
        };

        let c = METRIC_COLORS[series_idx % METRIC_COLORS.len()];
        let color = RGBColor(c.0, c.1, c.2);

        chart
            .draw_series(LineSeries::new(
                samples
                    .iter()
                    .enumerate()
                    .map(|(i, &ms)| (i as f32, ms as f32)),
                &color,
            ))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}
