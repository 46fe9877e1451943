//! ReplayView Core - overlay drawing for driving-replay debugging
//!
//! This library turns vehicle-relative coordinates into pixels:
//! 1. **Projection**: ground-plane points through a calibration matrix into
//!    camera pixels, and onto the top-down grid via an offset/scale
//! 2. **Overlays**: planned paths, lead cars and MPC plans drawn onto the
//!    camera frame and the top-down grid with bounds-checked writes
//! 3. **Plots**: live telemetry line plots composited onto the frame

pub mod config;
pub mod draw;
pub mod error;
pub mod plots;
pub mod projection;
pub mod top_down;

// Re-export key types for convenience
pub use config::UiParams;
pub use draw::{
    draw_lead_car, draw_lead_on, draw_mpc, draw_path, draw_steer_path, rasterize_path, steer_path,
};
pub use error::{ReplayError, Result};
pub use plots::{composite, PlotLayout, PlotRenderer, RasterPlotRenderer, Telemetry};
pub use projection::{vehicle_to_grid, warp_point, warp_points, Calibration, GridPoint};
pub use top_down::{default_palette, TopDown, NOT_FOUND};
