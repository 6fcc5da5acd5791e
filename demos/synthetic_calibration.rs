//! Synthetic Calibration Example
//!
//! Renders a checkerboard from several known poses through a known camera,
//! calibrates from the resulting correspondences and compares the estimate
//! with the ground truth.
//!
//! Usage:
//! ```bash
//! cargo run --example synthetic_calibration -- \
//!   --views 10 \
//!   --noise 0.2 \
//!   --format opencv \
//!   --output output/synthetic.yaml
//! ```

use calib3d::calibration::{self, estimate_intrinsics, reprojection_statistics, CalibrationOptions};
use calib3d::camera::{Distortion, DistortionModel, Extrinsics, Intrinsics, PinholeCamera, Resolution};
use calib3d::geometry::Point2;
use calib3d::io::{self, text};
use calib3d::pattern::CheckerBoardPattern;
use calib3d::{MultiViewCorrespondences, Registry};
use clap::Parser;
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use log::info;
use nalgebra::Vector3;
use std::path::PathBuf;

/// Synthetic checkerboard calibration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of synthetic views
    #[arg(short = 'n', long, default_value_t = 8)]
    views: usize,

    /// Amplitude of the deterministic pixel perturbation added to every corner
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Estimate the 8-coefficient rational distortion instead of 5 coefficients
    #[arg(long)]
    rational: bool,

    /// Result format registered in the default registry (json, opencv, text)
    #[arg(short = 'f', long, default_value = "json")]
    format: String,

    /// Where to write the calibration result
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Where to write the correspondences as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn ground_truth_camera() -> Result<PinholeCamera, Box<dyn std::error::Error>> {
    Ok(PinholeCamera::new(
        Intrinsics {
            fx: 812.0,
            fy: 806.0,
            cx: 321.5,
            cy: 243.0,
        },
        Distortion::new(vec![-0.18, 0.06, 0.0012, -0.0009, 0.0])?,
        Resolution::new(640, 480),
    )?)
}

/// Poses looking at the board centre from slowly varying directions.
fn view_poses(count: usize, board_center: Vector3<f64>) -> Vec<Extrinsics> {
    (0..count)
        .map(|i| {
            let phase = i as f64 / count.max(1) as f64 * std::f64::consts::TAU;
            let rotation = Vector3::new(0.35 * phase.cos(), 0.3 * phase.sin(), 0.1 * (2.0 * phase).sin());
            let pose = Extrinsics::new(rotation, Vector3::zeros());
            let distance = 650.0 + 80.0 * (3.0 * phase).cos();
            let translation = -(pose.rotation_matrix() * board_center) + Vector3::new(0.0, 0.0, distance);
            Extrinsics::new(rotation, translation)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Logger::try_with_str("info")?
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .suppress_timestamp()
                .suffix("log"),
        )
        .duplicate_to_stdout(Duplicate::All)
        .format_for_files(detailed_format)
        .format_for_stdout(colored_detailed_format)
        .start()?;

    let cli = Cli::parse();
    let registry = Registry::with_defaults();
    let format = registry.format(&cli.format)?;

    let truth = ground_truth_camera()?;
    let board = CheckerBoardPattern::new(9, 6, 25.0);
    let center = Vector3::new(
        (board.corners_x() - 1) as f64 * board.square_length() / 2.0,
        (board.corners_y() - 1) as f64 * board.square_length() / 2.0,
        0.0,
    );
    let poses = view_poses(cli.views, center);

    let mut correspondences = MultiViewCorrespondences::new();
    for pose in &poses {
        let image_points = calibration::project(board.model_points(), pose, &truth)
            .into_iter()
            .enumerate()
            .map(|(k, p)| {
                let k = k as f64;
                Point2::new(p.x + cli.noise * (1.7 * k).sin(), p.y + cli.noise * (2.3 * k).cos())
            })
            .collect();
        correspondences.add_view(image_points, board.model_points().to_vec())?;
    }
    info!(
        "Generated {} views with {} correspondences",
        correspondences.view_count(),
        correspondences.correspondence_count()
    );

    if let Some(path) = &cli.csv {
        io::export_correspondences_csv(path, &correspondences)?;
    }

    let options = CalibrationOptions {
        distortion_model: if cli.rational {
            DistortionModel::Rational8
        } else {
            DistortionModel::RadialTangential5
        },
        verbose: true,
    };
    let result = estimate_intrinsics(&correspondences, truth.resolution, &options)?;
    let stats = reprojection_statistics(&result.camera, &result.extrinsics, &correspondences)?;

    println!("{}", text::pretty_print(&result, true, false)?);
    println!(
        "Reprojection error: rmse {:.4} px, median {:.4} px, max {:.4} px",
        stats.rmse, stats.median, stats.max
    );
    println!(
        "Focal length error: fx {:.4} px, fy {:.4} px",
        (result.camera.intrinsics.fx - truth.intrinsics.fx).abs(),
        (result.camera.intrinsics.fy - truth.intrinsics.fy).abs()
    );

    if let Some(path) = &cli.output {
        std::fs::write(path, (format.export)(&result)?)?;
        info!("Wrote {} result to {}", cli.format, path.display());
    }
    Ok(())
}
