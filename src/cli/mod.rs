//! Command-line interface for the lidar pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::core::detections::{Detections, RawDetections};
use crate::core::timing::TimingLog;
use crate::core::writers::{write_label_csv, FrameRecorder};
use crate::processors::{
    compute_distance_matrix, display_detections, filter_by_class, normalize,
};
use crate::stream::{StreamIngestor, SyntheticScanSource};
use crate::visualization;

#[derive(Parser)]
#[command(name = "lidar-pipeline")]
#[command(about = "Real-time lidar ingestion and detection post-processing", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream synthetic scans through the ingestor and record frames to CSV
    Stream {
        /// Number of frames to capture
        #[arg(short, long, default_value_t = 100)]
        frames: usize,
        /// Root directory for the capture folder (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Write a PNG of the per-frame timing series
        #[arg(long)]
        plot: Option<PathBuf>,
    },

    /// Post-process a raw detection result from a JSON file
    Postprocess {
        /// JSON file with raw detector output (boxes, labels, scores tensors)
        input: PathBuf,
        /// Output label CSV
        output: PathBuf,
        /// 0-based class ids to keep (overrides config)
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<i64>>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Stream {
            frames,
            output_dir,
            plot,
        } => {
            cmd_stream(frames, output_dir, plot, &config);
        }
        Commands::Postprocess {
            input,
            output,
            classes,
        } => {
            cmd_postprocess(&input, &output, classes, &config);
        }
    }
}

fn cmd_stream(
    frames: usize,
    output_dir: Option<PathBuf>,
    plot: Option<PathBuf>,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    println!("Streaming synthetic scans...");
    println!("Frames to capture: {}", frames);
    println!(
        "Scan geometry: {} columns x {} beams",
        config.sensor.columns, config.sensor.beams
    );

    let mut recorder_config = config.recorder.clone();
    if let Some(dir) = output_dir {
        recorder_config.root_dir = dir;
    }

    let mut recorder =
        match FrameRecorder::create(&recorder_config, config.detection.class_names.clone()) {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to create capture folder: {}", e);
                std::process::exit(1);
            }
        };

    let source = SyntheticScanSource::new(
        config.sensor.columns,
        config.sensor.beams,
        Some(frames),
    );
    let mut ingestor = StreamIngestor::new(source, &config.stream);

    let mut timing = TimingLog::new();
    timing.create_metric("acquire");
    timing.create_metric("record");

    if let Err(e) = ingestor.start() {
        error!("Failed to start ingestion: {}", e);
        std::process::exit(1);
    }

    let spinner = create_spinner("Capturing frames...");

    // Poll until every produced frame is drained; the producer may die
    // early (source failure), in which case we keep what arrived.
    let mut captured = 0;
    let mut points_total = 0usize;
    while captured < frames {
        let poll_start = Instant::now();
        match ingestor.get_frame() {
            Some(frame) => {
                let _ = timing.log_duration("acquire", poll_start.elapsed());

                let record_start = Instant::now();
                if let Err(e) = recorder.record(&frame, &Detections::default()) {
                    spinner.finish_and_clear();
                    error!("Failed to record frame {}: {}", captured, e);
                    std::process::exit(1);
                }
                let _ = timing.log_duration("record", record_start.elapsed());

                points_total += frame.len();
                captured += 1;
            }
            None => {
                if !ingestor.is_running() && ingestor.queued_frames() == 0 {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    if let Err(e) = ingestor.stop() {
        error!("Failed to stop ingestion: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();

    let mut summary_items = vec![
        ("Frames captured", captured.to_string()),
        ("Points captured", points_total.to_string()),
        ("Capture folder", recorder.path().display().to_string()),
    ];
    for metric in timing.summary() {
        summary_items.push((
            match metric.name.as_str() {
                "acquire" => "Mean acquire (ms)",
                _ => "Mean record (ms)",
            },
            format!("{:.3}", metric.mean_ms),
        ));
    }
    summary_items.push(("Duration", format!("{:.2?}", start.elapsed())));

    if let Some(plot_path) = plot {
        match visualization::plot_metric_series(&plot_path, &timing) {
            Ok(()) => summary_items.push(("Timing plot", plot_path.display().to_string())),
            Err(e) => warn!("Failed to plot timing series: {}", e),
        }
    }

    print_summary("Stream Capture Complete", &summary_items);
}

fn cmd_postprocess(
    input: &PathBuf,
    output: &PathBuf,
    classes: Option<Vec<i64>>,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    println!("Post-processing detections...");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());

    let raw: RawDetections = match File::open(input)
        .map_err(|e| e.to_string())
        .and_then(|f| serde_json::from_reader(f).map_err(|e| e.to_string()))
    {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read raw detections from {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    let mut detections = match normalize(&raw) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to normalize detections: {}", e);
            std::process::exit(1);
        }
    };
    let total = detections.len();

    // CLI flag wins over config.
    let classes_to_use: Option<HashSet<i64>> = classes
        .or_else(|| config.detection.classes_to_use.clone())
        .map(|v| v.into_iter().collect());

    if let Err(e) = filter_by_class(&mut detections, classes_to_use.as_ref()) {
        error!("Failed to filter detections: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = compute_distance_matrix(&mut detections) {
        error!("Failed to compute distance matrix: {}", e);
        std::process::exit(1);
    }

    display_detections(&detections, &config.detection.class_names);

    if let Err(e) = write_label_csv(output, &detections, &config.detection.class_names) {
        error!("Failed to write label CSV: {}", e);
        std::process::exit(1);
    }

    print_summary(
        "Post-processing Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output CSV", output.display().to_string()),
            ("Objects in", total.to_string()),
            ("Objects kept", detections.len().to_string()),
            (
                "Class filter",
                classes_to_use
                    .map(|c| {
                        let mut ids: Vec<i64> = c.into_iter().collect();
                        ids.sort_unstable();
                        format!("{:?}", ids)
                    })
                    .unwrap_or_else(|| "none".to_string()),
            ),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
