//! Marker Pose Example
//!
//! Detects a square marker in one image or a directory of images, estimates
//! the marker pose for a calibrated camera and writes overlay images with
//! the detected corners and the marker coordinate axes.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --example marker_pose -- \
//!   --marker samples/marker.png \
//!   --length 80 \
//!   --camera samples/camera.yaml \
//!   --images samples/frames
//! ```

use calib3d::calibration::estimate_extrinsics;
use calib3d::camera::{CameraModel, PinholeCamera};
use calib3d::detection::{MarkerDetector, MarkerDetectorConfig, PatternDetector};
use calib3d::io::images;
use calib3d::pattern::{MarkerPattern, Pattern};
use calib3d::render::{AxisRenderer, BorderRenderer, CalibrationRenderer, DetectionRenderer, PointRenderer};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Marker detection and pose estimation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Square image of the marker
    #[arg(short = 'm', long)]
    marker: PathBuf,

    /// Side length of the printed marker in world units
    #[arg(short = 'l', long, default_value_t = 10.0)]
    length: f64,

    /// Camera parameters (YAML with a cam0 entry)
    #[arg(short = 'c', long)]
    camera: PathBuf,

    /// Image file or directory of images to search
    #[arg(short = 'i', long)]
    images: PathBuf,

    /// Optional detector configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the overlay images
    #[arg(short = 'o', long, default_value = "output")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let camera_path = cli.camera.to_str().ok_or("Invalid camera path string")?;
    let camera = PinholeCamera::load_from_yaml(camera_path)?;
    let config = match &cli.config {
        Some(path) => {
            MarkerDetectorConfig::load_from_yaml(path.to_str().ok_or("Invalid config path string")?)?
        }
        None => MarkerDetectorConfig::default(),
    };

    let marker_image = images::load_image(&cli.marker)?.to_luma8();
    let pattern = Arc::new(Pattern::from(MarkerPattern::with_image(cli.length, marker_image)));
    let detector = MarkerDetector::with_pattern(config, pattern)?;

    std::fs::create_dir_all(&cli.output_dir)?;
    let frames = images::from_path(&cli.images)?;
    info!("Searching {} images for the marker", frames.len());

    for (i, frame) in frames.iter().enumerate() {
        let detection = detector.find_pattern(frame)?;
        let mut canvas = frame.to_rgb8();
        BorderRenderer::default().render(&mut canvas, &detection);
        PointRenderer::default().render(&mut canvas, &detection);

        if detection.success() {
            let result = estimate_extrinsics(&detection.correspondences()?, &camera)?;
            let pose = &result.extrinsics[0];
            println!(
                "Image {}: rotation ({:.4}, {:.4}, {:.4}) translation ({:.3}, {:.3}, {:.3}), error {:.3} px",
                i,
                pose.rotation.x,
                pose.rotation.y,
                pose.rotation.z,
                pose.translation.x,
                pose.translation.y,
                pose.translation.z,
                result.reprojection_error
            );
            AxisRenderer::default().render(&mut canvas, &result, 0)?;
        } else {
            warn!("Image {}: marker not found", i);
        }

        let path = cli.output_dir.join(format!("marker_pose_{i:03}.png"));
        canvas.save(&path)?;
    }
    Ok(())
}
