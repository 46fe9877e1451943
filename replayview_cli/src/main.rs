//! ReplayView CLI
//!
//! Render one replay frame: camera overlays, the top-down grid and live
//! telemetry plots, written out as PNG files.

mod scene;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use image::RgbImage;
use replayview_core::plots::{FigureSize, LineStyle, SeriesSpec, SubplotSpec};
use replayview_core::{
    composite, default_palette, draw_lead_car, draw_lead_on, draw_mpc, draw_steer_path,
    Calibration, PlotLayout, PlotRenderer, RasterPlotRenderer, ReplayError, TopDown, UiParams,
};
use serde::Serialize;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use scene::{Scene, SceneConfig};

/// Steer path colour on the camera frame.
const PATH_COLOR: [u8; 3] = [0, 255, 0];

/// Steer path colour on the top-down grid.
const PATH_GRID_COLOR: [u8; 3] = [0, 0, 255];

/// Lead marker colour on the camera frame.
const LEAD_COLOR: [u8; 3] = [255, 0, 0];

/// ReplayView overlay renderer
#[derive(Parser, Debug)]
#[command(name = "replayview")]
#[command(about = "Render replay debugging overlays to PNG", long_about = None)]
struct Args {
    /// Seed for the synthetic frame and telemetry
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Steering curvature of the drawn path (1/m)
    #[arg(short, long, default_value = "0.002", allow_hyphen_values = true)]
    curvature: f64,

    /// Distance to the closest lead car in meters (omit for no lead)
    #[arg(short, long)]
    lead_distance: Option<f64>,

    /// Lateral offset of the lead car in meters
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    lead_lateral: f64,

    /// Telemetry history length in samples
    #[arg(long, default_value = "200")]
    history: usize,

    /// UI parameters JSON (grid geometry, marker sizes)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calibration JSON with `car_to_model` and `car_to_bb`
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Plot layout JSON
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "replay_out")]
    output: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,
}

/// What a render produced.
#[derive(Debug, Serialize)]
struct RenderSummary {
    seed: u64,
    path_pixels: usize,
    mpc_points: usize,
    lead_bar: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    lead_anchor: Option<(i64, i64)>,
    frame: String,
    top_down: String,
}

/// Pinhole ground-plane calibration for a 640x480 camera 1.2m above the road.
fn default_calibration() -> Result<Calibration, ReplayError> {
    let ground = Calibration::pinhole_ground(500.0, 320.0, 240.0, 1.2);
    Calibration::new(ground.clone(), ground)
}

/// Speed and steering on top, acceleration and curvature below.
fn default_layout(history: usize) -> PlotLayout {
    let x_lim = (0.0, history.saturating_sub(1).max(1) as f64);
    let series = |name: &str, color: char, style: LineStyle| SeriesSpec {
        name: name.to_string(),
        color,
        style,
    };
    PlotLayout {
        subplots: vec![
            SubplotSpec {
                x_lim,
                y_lim: (0.0, 40.0),
                series: vec![series("v_ego", 'g', LineStyle::Solid)],
            },
            SubplotSpec {
                x_lim,
                y_lim: (-15.0, 15.0),
                series: vec![series("steer_angle", 'r', LineStyle::Solid)],
            },
            SubplotSpec {
                x_lim,
                y_lim: (-1.0, 1.0),
                series: vec![
                    series("a_ego", 'y', LineStyle::Dashed),
                    series("curvature", 'p', LineStyle::Dotted),
                ],
            },
        ],
        size: FigureSize::Custom(400, 480),
    }
}

fn load_layout(path: &Path) -> Result<PlotLayout, ReplayError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn run(args: &Args) -> Result<RenderSummary, ReplayError> {
    let params = match &args.config {
        Some(path) => UiParams::from_file(path)?,
        None => UiParams::default(),
    };
    let calibration = match &args.calibration {
        Some(path) => Calibration::from_file(path)?,
        None => default_calibration()?,
    };
    let layout = match &args.layout {
        Some(path) => load_layout(path)?,
        None => default_layout(args.history),
    };

    let scene_config = SceneConfig {
        seed: args.seed,
        history: args.history,
        curvature: args.curvature,
        lead: args.lead_distance.map(|d| (d, args.lead_lateral)),
        ..Default::default()
    };
    let Scene {
        mut camera,
        telemetry,
        mpc_x,
        mpc_y,
        curvature,
        lead,
    } = scene::synthesize(&scene_config)?;
    debug!(
        "Synthesized {}x{} frame with {} telemetry samples",
        camera.width(),
        camera.height(),
        telemetry.len()
    );

    let mut grid = TopDown::new(params.clone(), default_palette())?;
    grid.draw_car();

    let stamped = draw_steer_path(
        &mut camera,
        curvature,
        PATH_COLOR,
        &calibration,
        Some((&mut grid, PATH_GRID_COLOR)),
    )?;
    let mpc_points = draw_mpc(&mpc_x, &mpc_y, &mut grid)?;
    let lead_bar = draw_lead_car(lead.map(|(d, _)| d), &mut grid);
    let lead_anchor = match lead {
        Some((x, y)) => draw_lead_on(
            &mut camera,
            &params,
            &calibration,
            x,
            y,
            (0.0, 0.0),
            LEAD_COLOR,
        )?,
        None => None,
    };
    debug!(
        "Overlays: {} path pixels, {} MPC points, lead bar {}",
        stamped.len(),
        mpc_points,
        lead_bar
    );

    let mut renderer = RasterPlotRenderer::new(&layout, &telemetry)?;
    let plot = renderer.render_frame(&telemetry)?;

    let mut frame = RgbImage::new(
        camera.width() + plot.width(),
        camera.height().max(plot.height()),
    );
    composite(&mut frame, &camera, 0, 0);
    composite(&mut frame, &plot, camera.width() as i64, 0);

    fs::create_dir_all(&args.output)?;
    let frame_path = args.output.join("frame.png");
    let top_down_path = args.output.join("top_down.png");
    frame.save(&frame_path)?;
    grid.to_rgb_image().save(&top_down_path)?;

    Ok(RenderSummary {
        seed: args.seed,
        path_pixels: stamped.len(),
        mpc_points,
        lead_bar,
        lead_anchor,
        frame: frame_path.display().to_string(),
        top_down: top_down_path.display().to_string(),
    })
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    match run(&args) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to encode summary: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                info!("✓ Rendered seed={} -> {}", summary.seed, summary.frame);
                info!("  top-down: {}", summary.top_down);
                info!(
                    "  path pixels={} | mpc points={} | lead bar={}",
                    summary.path_pixels, summary.mpc_points, summary.lead_bar
                );
            }
        }
        Err(e) => {
            error!("✗ Render failed: {}", e);
            std::process::exit(1);
        }
    }
}
