//! CSV persistence for recorded frames.
//!
//! Each recorded step produces two artifacts with a shared sequential
//! index: `cloud_<i>.csv` with the frame geometry and `label_<i>.csv`
//! with one row per detected object.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;
use regex::Regex;
use thiserror::Error;

use super::detections::{DetectionError, Detections};
use super::frame::PointFrame;
use crate::config::RecorderConfig;

/// Errors that can occur during recording.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create the capture directory.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a frame file.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// The detection record violated its length invariant.
    #[error("detections are malformed: {0}")]
    Malformed(#[from] DetectionError),
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Writes per-frame geometry and label CSVs with sequential indices.
pub struct FrameRecorder {
    path: PathBuf,
    class_names: Vec<String>,
    frames: usize,
}

impl FrameRecorder {
    /// Creates the capture directory (`<root>/<folder>`) and a recorder
    /// writing into it. A missing folder name defaults to a timestamped
    /// `frames_YYYYmmdd_HHMMSS`.
    pub fn create(config: &RecorderConfig, class_names: Vec<String>) -> Result<Self> {
        let folder = config
            .folder
            .clone()
            .unwrap_or_else(|| format!("frames_{}", Local::now().format("%Y%m%d_%H%M%S")));
        let path = config.root_dir.join(folder);

        fs::create_dir_all(&path).map_err(|e| WriteError::CreateDirectory {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            path,
            class_names,
            frames: 0,
        })
    }

    /// Returns the capture directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of frames recorded so far.
    pub fn frames_written(&self) -> usize {
        self.frames
    }

    /// Writes both artifacts for one logical recording step and advances
    /// the frame index.
    pub fn record(&mut self, frame: &PointFrame, detections: &Detections) -> Result<()> {
        detections.check_lengths()?;

        let cloud_path = self.path.join(format!("cloud_{}.csv", self.frames));
        let label_path = self.path.join(format!("label_{}.csv", self.frames));

        write_cloud_csv(&cloud_path, frame)?;
        write_label_csv(&label_path, detections, &self.class_names)?;

        self.frames += 1;
        Ok(())
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write frame geometry: header `x,y,z,r`, one row per point.
pub fn write_cloud_csv(path: &Path, frame: &PointFrame) -> Result<()> {
    let mut writer = csv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record(["x", "y", "z", "r"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for point in frame.points() {
        writer
            .write_record(point.iter().map(|v| format!("{:.6}", v)))
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::CsvError {
        path: path_str,
        source: csv::Error::from(e),
    })?;

    Ok(())
}

/// Write per-object rows: box fields, resolved class name, class id,
/// and confidence score.
pub fn write_label_csv(
    path: &Path,
    detections: &Detections,
    class_names: &[String],
) -> Result<()> {
    detections.check_lengths()?;

    let mut writer = csv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record([
            "x", "y", "z", "l", "w", "h", "rx", "ry", "rz", "label", "label_id", "score",
        ])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for ((b, &label), &score) in detections
        .boxes
        .iter()
        .zip(detections.labels.iter())
        .zip(detections.scores.iter())
    {
        let name = usize::try_from(label)
            .ok()
            .and_then(|id| class_names.get(id))
            .map(String::as_str)
            .unwrap_or("unknown");

        let mut record: Vec<String> = b.to_row().iter().map(|v| format!("{:.6}", v)).collect();
        record.push(name.to_string());
        record.push(label.to_string());
        record.push(format!("{:.6}", score));

        writer
            .write_record(&record)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::CsvError {
        path: path_str,
        source: csv::Error::from(e),
    })?;

    Ok(())
}

/// List `<prefix>_<n>.csv` files in a directory, sorted by numeric index.
///
/// Lexicographic listing puts `cloud_10` before `cloud_2`; replaying a
/// capture needs the humane order.
pub fn find_frame_files(directory: &Path, prefix: &str) -> Vec<PathBuf> {
    let pattern = Regex::new(&format!(r"^{}_(\d+)\.csv$", regex::escape(prefix)))
        .expect("frame-file pattern is valid");

    let mut indexed: Vec<(usize, PathBuf)> = fs::read_dir(directory)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let captures = pattern.captures(name)?;
            let index: usize = captures.get(1)?.as_str().parse().ok()?;
            Some((index, path))
        })
        .collect();

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, path)| path).collect()
}
