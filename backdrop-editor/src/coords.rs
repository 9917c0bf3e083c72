//! Slider space <-> surface pixels.
//!
//! Slider space is a 200x200 grid centered on the image, -100..100 on each
//! axis, so the same slider values place text at the same relative spot at
//! any resolution.

use backdrop_api::Point;

pub const SLIDER_MIN: f32 = -100.0;
pub const SLIDER_MAX: f32 = 100.0;

const GRID: f32 = 200.0;

/// Absolute surface position for slider coordinates.
///
/// Not clamped: values outside the slider range land outside the image.
pub fn to_absolute(slider_x: f32, slider_y: f32, width: u32, height: u32) -> Point {
    let (w, h) = (width as f32, height as f32);
    Point {
        x: w / 2.0 + slider_x * (w / GRID),
        y: h / 2.0 + slider_y * (h / GRID),
    }
}

/// Slider coordinates for an absolute position. Zero on a zero-sized axis.
pub fn to_slider(position: Point, width: u32, height: u32) -> (f32, f32) {
    let axis = |p: f32, extent: u32| {
        if extent == 0 {
            0.0
        } else {
            let e = extent as f32;
            (p - e / 2.0) / (e / GRID)
        }
    };
    (axis(position.x, width), axis(position.y, height))
}

/// Clamp a slider value into its input range. NaN becomes 0.
pub fn clamp_slider(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(SLIDER_MIN, SLIDER_MAX)
    }
}
