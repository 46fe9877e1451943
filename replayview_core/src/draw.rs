//! Overlay drawing onto the camera frame and the top-down grid.
//!
//! Every write goes through a bounds check. Points that project outside a
//! surface (or to non-finite coordinates) are dropped silently; only
//! malformed inputs such as mismatched sequence lengths are errors.

use image::RgbImage;
use nalgebra::DMatrix;

use crate::config::UiParams;
use crate::error::{ReplayError, Result};
use crate::projection::{vehicle_to_grid, warp_point, warp_points, Calibration};
use crate::top_down::{Rgb, TopDown};

/// Plus-shaped neighbourhood stamped around each projected path sample,
/// as `(d_row, d_col)`.
const PLUS_STAMP: [(i32, i32); 5] = [(-1, 0), (0, -1), (0, 0), (0, 1), (1, 0)];

/// Longitudinal extent of a steer path in meters.
const STEER_PATH_LENGTH_M: u32 = 100;

/// Lead-car bar colour on the top-down grid.
const LEAD_CAR_COLOR: Rgb = [255, 0, 0];

/// MPC plan colour on the top-down grid.
const MPC_COLOR: Rgb = [0, 255, 0];

fn check_paired(lateral: &[f64], longitudinal: &[f64]) -> Result<()> {
    if lateral.len() != longitudinal.len() {
        return Err(ReplayError::LengthMismatch {
            lateral: lateral.len(),
            longitudinal: longitudinal.len(),
        });
    }
    if lateral.is_empty() {
        return Err(ReplayError::EmptyInput("path"));
    }
    Ok(())
}

fn put_checked(img: &mut RgbImage, col: i64, row: i64, color: Rgb) -> bool {
    if col < 0 || row < 0 || col > u32::MAX as i64 || row > u32::MAX as i64 {
        return false;
    }
    match img.get_pixel_mut_checked(col as u32, row as u32) {
        Some(px) => {
            *px = image::Rgb(color);
            true
        }
        None => false,
    }
}

/// Project a vehicle-frame path through `warp` and plus-stamp every sample.
///
/// Samples are rounded to the nearest pixel. A sample survives only if its
/// whole stamp fits: `1 <= u < width - 1` and `1 <= v < height - 1`.
/// Samples are not joined, so sparse paths show gaps.
///
/// # Returns
/// The stamped centre pixels as `(col, row)`.
pub fn rasterize_path(
    img: &mut RgbImage,
    lateral: &[f64],
    longitudinal: &[f64],
    warp: &DMatrix<f64>,
    color: Rgb,
) -> Result<Vec<(u32, u32)>> {
    check_paired(lateral, longitudinal)?;

    let points = DMatrix::from_fn(lateral.len(), 2, |i, j| {
        if j == 0 {
            longitudinal[i]
        } else {
            lateral[i]
        }
    });
    let uv = warp_points(&points, warp)?;
    if uv.ncols() < 2 {
        return Err(ReplayError::dimension(format!(
            "path projection must yield 2D pixels, got {} coordinates",
            uv.ncols()
        )));
    }

    let (width, height) = img.dimensions();
    let max_u = width as f64 - 1.0;
    let max_v = height as f64 - 1.0;

    let mut stamped = Vec::with_capacity(uv.nrows());
    let mut degenerate = 0usize;
    for row in uv.row_iter() {
        let u = row[0].round();
        let v = row[1].round();
        if !(u.is_finite() && v.is_finite()) {
            degenerate += 1;
            continue;
        }
        if u < 1.0 || v < 1.0 || u >= max_u || v >= max_v {
            continue;
        }
        let (u, v) = (u as u32, v as u32);
        for (d_row, d_col) in PLUS_STAMP {
            put_checked(img, u as i64 + d_col as i64, v as i64 + d_row as i64, color);
        }
        stamped.push((u, v));
    }

    if degenerate > 0 {
        tracing::warn!("Skipped {} path samples with degenerate projection", degenerate);
    }
    Ok(stamped)
}

/// Draw a path on the camera frame, and optionally mirror it onto the grid.
///
/// The camera projection uses `calibration.car_to_model`. When `grid` is
/// given, every sample that lands on the grid is written with the palette
/// index of the paired colour.
pub fn draw_path(
    img: &mut RgbImage,
    lateral: &[f64],
    longitudinal: &[f64],
    color: Rgb,
    calibration: &Calibration,
    grid: Option<(&mut TopDown, Rgb)>,
) -> Result<Vec<(u32, u32)>> {
    let stamped = rasterize_path(img, lateral, longitudinal, calibration.car_to_model(), color)?;

    if let Some((grid, grid_color)) = grid {
        let index = grid.color_index(grid_color);
        let params = grid.params().clone();
        for (&lat, &lon) in lateral.iter().zip(longitudinal) {
            if let Some(p) = vehicle_to_grid(&params, lat, lon) {
                grid.set(p.x, p.y, index);
            }
        }
    }
    Ok(stamped)
}

/// Path traced by a constant steering curvature.
///
/// Longitudinal samples run `0..=100` meters, one per meter. The lateral
/// offset is the chord offset of a circular arc, with the sine argument
/// clipped to `[-0.999, 0.999]` so tight curves stay defined.
///
/// # Returns
/// `(lateral, longitudinal)`
pub fn steer_path(curvature: f64) -> (Vec<f64>, Vec<f64>) {
    let longitudinal: Vec<f64> = (0..=STEER_PATH_LENGTH_M).map(f64::from).collect();
    let lateral = longitudinal
        .iter()
        .map(|&x| x * ((x * curvature).clamp(-0.999, 0.999).asin() / 2.0).tan())
        .collect();
    (lateral, longitudinal)
}

/// Draw the path implied by a steering curvature.
pub fn draw_steer_path(
    img: &mut RgbImage,
    curvature: f64,
    color: Rgb,
    calibration: &Calibration,
    grid: Option<(&mut TopDown, Rgb)>,
) -> Result<Vec<(u32, u32)>> {
    let (lateral, longitudinal) = steer_path(curvature);
    draw_path(img, &lateral, &longitudinal, color, calibration, grid)
}

/// Draw a horizontal bar across the grid at the closest lead car's distance.
///
/// The bar extends `2 * meter_width` grid cells to each side of the car
/// origin. Distances that map to row 0 or above the grid draw nothing.
///
/// # Returns
/// `true` if a bar was drawn.
pub fn draw_lead_car(closest: Option<f64>, grid: &mut TopDown) -> bool {
    let Some(distance) = closest else {
        return false;
    };
    let p = grid.params().clone();
    let row = (p.lidar_car_y - distance * p.lidar_zoom).round();
    if !(row > 0.0 && row < grid.height() as f64) {
        return false;
    }
    let row = row as usize;

    let half = p.meter_width * 2.0;
    let x0 = (p.lidar_car_x - half).round().max(0.0) as usize;
    let x1 = ((p.lidar_car_x + half).round().max(0.0) as usize).min(grid.width());

    let red = grid.color_index(LEAD_CAR_COLOR);
    for x in x0..x1 {
        grid.set(x, row, red);
    }
    true
}

/// Mark a lead vehicle on the display frame with a cross.
///
/// The lead position (`closest_x_m` forward, `closest_y_m` lateral) is
/// projected through `calibration.car_to_bb` and shifted by `img_offset`.
/// The cross is lifted `lead_marker_offset` pixels above the projected point
/// and spans `2 * lead_marker_size` pixels per arm. Nothing is drawn unless
/// the point is strictly inside the frame, and every pixel is clipped.
///
/// # Returns
/// The integer marker anchor `(u, v)`, or `None` when the projection is
/// degenerate.
pub fn draw_lead_on(
    img: &mut RgbImage,
    params: &UiParams,
    calibration: &Calibration,
    closest_x_m: f64,
    closest_y_m: f64,
    img_offset: (f64, f64),
    color: Rgb,
) -> Result<Option<(i64, i64)>> {
    let uv = warp_point(&[closest_x_m, closest_y_m], calibration.car_to_bb())?;
    if uv.len() < 2 {
        return Err(ReplayError::dimension("car_to_bb must yield 2D pixels"));
    }
    let (u, v) = (uv[0] + img_offset.0, uv[1] + img_offset.1);
    if !(u.is_finite() && v.is_finite()) {
        return Ok(None);
    }
    let (u, v) = (u as i64, v as i64);

    let (width, height) = img.dimensions();
    let lift = params.lead_marker_offset as i64;
    let size = params.lead_marker_size as i64;
    let inside = u > 0 && u < width as i64 && v > 0 && v < height as i64 - lift;
    if inside {
        let center_row = v - lift;
        for row in (center_row - size)..(center_row + size) {
            put_checked(img, u, row, color);
        }
        for col in (u - size)..(u + size) {
            put_checked(img, col, center_row, color);
        }
    }
    Ok(Some((u, v)))
}

/// Plot an MPC plan onto the grid.
///
/// `xs` are longitudinal and `ys` lateral positions in meters. Points off the
/// grid are skipped.
///
/// # Returns
/// Number of points written.
pub fn draw_mpc(xs: &[f64], ys: &[f64], grid: &mut TopDown) -> Result<usize> {
    if xs.len() != ys.len() {
        return Err(ReplayError::LengthMismatch {
            lateral: ys.len(),
            longitudinal: xs.len(),
        });
    }
    let green = grid.color_index(MPC_COLOR);
    let params = grid.params().clone();
    let mut written = 0;
    for (&x, &y) in xs.iter().zip(ys) {
        if let Some(p) = vehicle_to_grid(&params, y, x) {
            grid.set(p.x, p.y, green);
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::top_down::{default_palette, NOT_FOUND};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn identity_calibration() -> Calibration {
        Calibration::new(DMatrix::identity(3, 3), DMatrix::identity(3, 3)).unwrap()
    }

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::new(width, height)
    }

    fn colored_pixels(img: &RgbImage) -> Vec<(u32, u32)> {
        img.enumerate_pixels()
            .filter(|(_, _, px)| px.0 != [0, 0, 0])
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn test_plus_stamp_shape() {
        let mut img = blank(10, 10);
        // Identity warp: (longitudinal, lateral) -> (u, v)
        let stamped =
            rasterize_path(&mut img, &[4.0], &[5.0], &DMatrix::identity(3, 3), [255, 0, 0])
                .unwrap();
        assert_eq!(stamped, vec![(5, 4)]);
        let mut pixels = colored_pixels(&img);
        pixels.sort();
        assert_eq!(pixels, vec![(4, 4), (5, 3), (5, 4), (5, 5), (6, 4)]);
    }

    #[test]
    fn test_rounding_to_nearest_pixel() {
        let mut img = blank(10, 10);
        let stamped =
            rasterize_path(&mut img, &[3.4], &[5.6], &DMatrix::identity(3, 3), [1, 1, 1]).unwrap();
        assert_eq!(stamped, vec![(6, 3)]);
    }

    #[test]
    fn test_boundary_samples_dropped() {
        let mut img = blank(10, 8);
        // u = 0, u = 9 (width - 1), v = 0, v = 7 (height - 1) must all be dropped
        let longitudinal = [0.0, 9.0, 4.0, 4.0, 8.0];
        let lateral = [4.0, 4.0, 0.0, 7.0, 6.0];
        let stamped = rasterize_path(
            &mut img,
            &lateral,
            &longitudinal,
            &DMatrix::identity(3, 3),
            [9, 9, 9],
        )
        .unwrap();
        assert_eq!(stamped, vec![(8, 6)]);
        assert_eq!(colored_pixels(&img).len(), 5);
    }

    #[test]
    fn test_degenerate_projection_skipped() {
        let mut img = blank(640, 480);
        let warp = Calibration::pinhole_ground(500.0, 320.0, 240.0, 1.2);
        // longitudinal 0 has a zero denominator
        let stamped = rasterize_path(&mut img, &[0.0, 0.0], &[0.0, 10.0], &warp, [255, 255, 255])
            .unwrap();
        assert_eq!(stamped, vec![(320, 300)]);
    }

    #[test]
    fn test_length_mismatch() {
        let mut img = blank(10, 10);
        let result = rasterize_path(&mut img, &[1.0, 2.0], &[1.0], &DMatrix::identity(3, 3), [1; 3]);
        assert!(matches!(
            result,
            Err(ReplayError::LengthMismatch {
                lateral: 2,
                longitudinal: 1
            })
        ));
        assert!(colored_pixels(&img).is_empty());
    }

    #[test]
    fn test_empty_path() {
        let mut img = blank(10, 10);
        let result = rasterize_path(&mut img, &[], &[], &DMatrix::identity(3, 3), [1; 3]);
        assert!(matches!(result, Err(ReplayError::EmptyInput(_))));
    }

    #[test]
    fn test_wrong_matrix_shape() {
        let mut img = blank(10, 10);
        let result = rasterize_path(&mut img, &[1.0], &[1.0], &DMatrix::identity(4, 4), [1; 3]);
        assert!(matches!(result, Err(ReplayError::DimensionMismatch(_))));
    }

    #[test]
    fn test_steer_path_straight() {
        let (lateral, longitudinal) = steer_path(0.0);
        assert_eq!(longitudinal.len(), 101);
        assert_relative_eq!(longitudinal[100], 100.0);
        assert!(lateral.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_steer_path_curves_left() {
        let curvature = 0.01;
        let (lateral, _) = steer_path(curvature);
        let expected = 50.0 * ((50.0f64 * curvature).asin() / 2.0).tan();
        assert_relative_eq!(lateral[50], expected, epsilon = 1e-12);
        assert!(lateral[100] > lateral[50]);
        // Clipped beyond 1 / curvature
        let clipped = 100.0 * (0.999f64.asin() / 2.0).tan();
        assert_relative_eq!(lateral[100], clipped, epsilon = 1e-12);
    }

    #[test]
    fn test_draw_path_mirrors_onto_grid() {
        let mut img = blank(640, 480);
        let mut grid = TopDown::new(UiParams::default(), default_palette()).unwrap();
        let calib = Calibration::new(
            Calibration::pinhole_ground(500.0, 320.0, 240.0, 1.2),
            DMatrix::identity(3, 3),
        )
        .unwrap();
        let stamped = draw_path(
            &mut img,
            &[0.0, 0.0],
            &[10.0, 20.0],
            [0, 255, 0],
            &calib,
            Some((&mut grid, [0, 0, 255])),
        )
        .unwrap();
        assert_eq!(stamped.len(), 2);

        let blue = grid.color_index([0, 0, 255]);
        let p = vehicle_to_grid(grid.params(), 0.0, 10.0).unwrap();
        assert_eq!(grid.get(p.x, p.y), Some(blue));
    }

    #[test]
    fn test_draw_steer_path_on_camera() {
        let mut img = blank(640, 480);
        let calib = Calibration::new(
            Calibration::pinhole_ground(500.0, 320.0, 240.0, 1.2),
            DMatrix::identity(3, 3),
        )
        .unwrap();
        let stamped = draw_steer_path(&mut img, 0.0, [255, 0, 0], &calib, None).unwrap();
        // Sample 0 is degenerate and near samples fall below the frame
        assert!(!stamped.is_empty());
        assert!(stamped.iter().all(|&(u, _)| u == 320));
    }

    #[test]
    fn test_lead_car_bar() {
        let mut grid = TopDown::new(UiParams::default(), default_palette()).unwrap();
        assert!(draw_lead_car(Some(20.0), &mut grid));
        let p = grid.params().clone();
        let row = (p.lidar_car_y - 20.0 * p.lidar_zoom).round() as usize;
        let red = grid.color_index([255, 0, 0]);
        assert_eq!(grid.get(192, row), Some(red));
        assert_eq!(grid.get(152, row), Some(red));
        assert_eq!(grid.get(231, row), Some(red));
        assert_eq!(grid.get(232, row), Some(0));
        assert_eq!(grid.get(151, row), Some(0));
    }

    #[test]
    fn test_lead_car_none_or_out_of_view() {
        let mut grid = TopDown::new(UiParams::default(), default_palette()).unwrap();
        assert!(!draw_lead_car(None, &mut grid));
        // Far enough ahead to map to row 0 or above
        let far = grid.params().lidar_car_y / grid.params().lidar_zoom;
        assert!(!draw_lead_car(Some(far), &mut grid));
        assert!(!draw_lead_car(Some(far + 50.0), &mut grid));
        assert!(!draw_lead_car(Some(-1000.0), &mut grid));
        assert!(!draw_lead_car(Some(f64::NAN), &mut grid));
        assert_eq!(grid.cached_colors(), 0);
    }

    #[test]
    fn test_lead_car_missing_palette_color() {
        let mut grid = TopDown::new(UiParams::default(), vec![[0, 0, 0]]).unwrap();
        assert!(draw_lead_car(Some(10.0), &mut grid));
        let p = grid.params().clone();
        let row = (p.lidar_car_y - 10.0 * p.lidar_zoom).round() as usize;
        assert_eq!(grid.get(192, row), Some(NOT_FOUND));
    }

    #[test]
    fn test_lead_marker_cross() {
        let mut img = blank(640, 480);
        let params = UiParams::default();
        let calib = identity_calibration();
        let anchor = draw_lead_on(&mut img, &params, &calib, 100.0, 200.0, (0.0, 0.0), [7, 7, 7])
            .unwrap();
        assert_eq!(anchor, Some((100, 200)));
        // vertical arm: rows 185..205 at col 100; horizontal: cols 90..110 at row 195
        assert_eq!(img.get_pixel(100, 185).0, [7, 7, 7]);
        assert_eq!(img.get_pixel(100, 204).0, [7, 7, 7]);
        assert_eq!(img.get_pixel(100, 205).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(90, 195).0, [7, 7, 7]);
        assert_eq!(img.get_pixel(109, 195).0, [7, 7, 7]);
        assert_eq!(img.get_pixel(110, 195).0, [0, 0, 0]);
        assert_eq!(colored_pixels(&img).len(), 39);
    }

    #[test]
    fn test_lead_marker_offset_and_clipping() {
        let mut img = blank(640, 480);
        let params = UiParams::default();
        let calib = identity_calibration();
        // Anchor near the top-left: arms are clipped, nothing wraps around
        let anchor =
            draw_lead_on(&mut img, &params, &calib, 0.5, 2.0, (2.0, 1.0), [9, 9, 9]).unwrap();
        assert_eq!(anchor, Some((2, 3)));
        assert!(colored_pixels(&img)
            .iter()
            .all(|&(x, y)| x < 12 && y < 10));
        assert_eq!(img.get_pixel(639, 479).0, [0, 0, 0]);
    }

    #[test]
    fn test_lead_marker_outside_frame() {
        let mut img = blank(640, 480);
        let params = UiParams::default();
        let calib = identity_calibration();
        let anchor =
            draw_lead_on(&mut img, &params, &calib, 700.0, 100.0, (0.0, 0.0), [9, 9, 9]).unwrap();
        assert_eq!(anchor, Some((700, 100)));
        // v within `lead_marker_offset` of the bottom edge draws nothing
        draw_lead_on(&mut img, &params, &calib, 100.0, 476.0, (0.0, 0.0), [9, 9, 9]).unwrap();
        assert!(colored_pixels(&img).is_empty());
    }

    #[test]
    fn test_lead_marker_degenerate() {
        let mut img = blank(640, 480);
        let params = UiParams::default();
        let calib = Calibration::new(
            DMatrix::identity(3, 3),
            Calibration::pinhole_ground(500.0, 320.0, 240.0, 1.2),
        )
        .unwrap();
        let anchor =
            draw_lead_on(&mut img, &params, &calib, 0.0, 0.0, (0.0, 0.0), [9, 9, 9]).unwrap();
        assert_eq!(anchor, None);
    }

    #[test]
    fn test_mpc_skips_off_grid() {
        let mut grid = TopDown::new(UiParams::default(), default_palette()).unwrap();
        let xs = [0.0, 5.0, 1000.0];
        let ys = [0.0, 1.0, 0.0];
        assert_eq!(draw_mpc(&xs, &ys, &mut grid).unwrap(), 2);
        let green = grid.color_index([0, 255, 0]);
        let p = vehicle_to_grid(grid.params(), 1.0, 5.0).unwrap();
        assert_eq!(grid.get(p.x, p.y), Some(green));
        // The last cell of the grid is untouched
        assert_eq!(grid.get(grid.width() - 1, grid.height() - 1), Some(0));
    }

    #[test]
    fn test_mpc_length_mismatch() {
        let mut grid = TopDown::new(UiParams::default(), default_palette()).unwrap();
        assert!(draw_mpc(&[1.0], &[], &mut grid).is_err());
    }

    proptest! {
        #[test]
        fn prop_rasterize_never_leaves_buffer(
            samples in prop::collection::vec((-5.0f64..25.0, -5.0f64..25.0), 1..40),
            width in 1u32..20,
            height in 1u32..20,
        ) {
            let mut img = blank(width, height);
            let lateral: Vec<f64> = samples.iter().map(|s| s.0).collect();
            let longitudinal: Vec<f64> = samples.iter().map(|s| s.1).collect();
            let stamped = rasterize_path(
                &mut img, &lateral, &longitudinal, &DMatrix::identity(3, 3), [200, 0, 0],
            ).unwrap();
            for (u, v) in stamped {
                prop_assert!(u >= 1 && u + 1 < width);
                prop_assert!(v >= 1 && v + 1 < height);
            }
            prop_assert_eq!(img.dimensions(), (width, height));
        }

        #[test]
        fn prop_rasterize_is_idempotent(
            samples in prop::collection::vec((-50.0f64..50.0, 0.0f64..100.0), 1..60),
        ) {
            let calib = Calibration::pinhole_ground(500.0, 320.0, 240.0, 1.2);
            let lateral: Vec<f64> = samples.iter().map(|s| s.0).collect();
            let longitudinal: Vec<f64> = samples.iter().map(|s| s.1).collect();

            let mut once = blank(640, 480);
            rasterize_path(&mut once, &lateral, &longitudinal, &calib, [1, 2, 3]).unwrap();

            let mut twice = blank(640, 480);
            rasterize_path(&mut twice, &lateral, &longitudinal, &calib, [1, 2, 3]).unwrap();
            rasterize_path(&mut twice, &lateral, &longitudinal, &calib, [1, 2, 3]).unwrap();

            let mut fresh = blank(640, 480);
            rasterize_path(&mut fresh, &lateral, &longitudinal, &calib, [1, 2, 3]).unwrap();

            prop_assert!(once == fresh);
            prop_assert!(once == twice);
        }
    }
}
