//! Deterministic synthetic replay frames.
//!
//! Stands in for decoded video and logged telemetry so the overlays can be
//! rendered without a drive log. Every value derives from one seed.

use image::RgbImage;
use nalgebra::DMatrix;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use replayview_core::{steer_path, Result, Telemetry};

/// Telemetry channels carried by a synthetic scene.
pub const CHANNELS: [&str; 4] = ["v_ego", "a_ego", "steer_angle", "curvature"];

/// MPC plan horizon in meters.
const MPC_HORIZON_M: usize = 50;

/// Inputs for one synthetic frame.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    /// Telemetry history length in samples
    pub history: usize,
    pub curvature: f64,
    /// Closest lead car `(longitudinal, lateral)` in meters
    pub lead: Option<(f64, f64)>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            width: 640,
            height: 480,
            history: 200,
            curvature: 0.002,
            lead: Some((35.0, 0.0)),
        }
    }
}

/// A synthetic camera frame with its telemetry and plan.
pub struct Scene {
    pub camera: RgbImage,
    pub telemetry: Telemetry,
    /// MPC plan, longitudinal
    pub mpc_x: Vec<f64>,
    /// MPC plan, lateral
    pub mpc_y: Vec<f64>,
    pub curvature: f64,
    pub lead: Option<(f64, f64)>,
}

/// Build a scene from `config`.
pub fn synthesize(config: &SceneConfig) -> Result<Scene> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    // Sky above the horizon, noisy asphalt below
    let horizon = config.height / 2;
    let camera = RgbImage::from_fn(config.width, config.height, |_, y| {
        if y < horizon {
            let shade = (150 + (y * 60 / horizon.max(1))) as u8;
            image::Rgb([shade / 2, shade / 2 + 20, shade])
        } else {
            let grey = rng.gen_range(70u8..90);
            image::Rgb([grey, grey, grey])
        }
    });

    let mut rows = Vec::with_capacity(config.history * CHANNELS.len());
    let mut v_ego: f64 = 20.0;
    let mut steer: f64 = 0.0;
    for _ in 0..config.history {
        let a_ego = rng.gen_range(-0.5..0.5);
        v_ego = (v_ego + a_ego * 0.05).max(0.0);
        steer = (steer + rng.gen_range(-0.3..0.3)).clamp(-15.0, 15.0);
        let curvature = config.curvature + steer * 1.0e-4;
        rows.extend_from_slice(&[v_ego, a_ego, steer, curvature]);
    }
    let samples = DMatrix::from_row_slice(config.history, CHANNELS.len(), &rows);
    let telemetry = Telemetry::new(&CHANNELS, samples)?;

    let (lateral, longitudinal) = steer_path(config.curvature);
    let mpc_x: Vec<f64> = longitudinal.iter().take(MPC_HORIZON_M).copied().collect();
    let mpc_y: Vec<f64> = lateral
        .iter()
        .take(MPC_HORIZON_M)
        .map(|y| y + rng.gen_range(-0.05..0.05))
        .collect();

    Ok(Scene {
        camera,
        telemetry,
        mpc_x,
        mpc_y,
        curvature: config.curvature,
        lead: config.lead,
    })
}
