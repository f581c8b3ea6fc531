//! Conversions between the 16-bit hue wheel and 8-bit RGB.

use crate::domain::{HueValue, RgbColor, Saturation, HUE_STEPS};

/// Width of one of the six sextants of the wheel.
pub const SEGMENT_WIDTH: f64 = HUE_STEPS as f64 / 6.0;

/// Secondary-channel values at or above this are emitted as a full 255.
const FULL_CHANNEL_TOLERANCE: f64 = 0.999;

/// Index `0..=5` of the sextant containing `hue`.
pub fn sextant(hue: HueValue) -> usize {
    let position = f64::from(hue.get()) / SEGMENT_WIDTH;
    (position.floor() as usize % 6).min(5)
}

/// Converts a fully saturated, full-value hue into RGB.
///
/// One channel is pinned at 255, one at 0, and the third ramps across the
/// sextant. Total over the whole wheel and allocation free.
pub fn hsv_to_rgb(hue: HueValue) -> RgbColor {
    let position = f64::from(hue.get()) / SEGMENT_WIDTH;
    let x = 1.0 - ((position % 2.0) - 1.0).abs();
    let x = if x >= FULL_CHANNEL_TOLERANCE {
        255
    } else {
        (x * 256.0).floor().clamp(0.0, 255.0) as u8
    };

    match sextant(hue) {
        0 => RgbColor::new(255, x, 0),
        1 => RgbColor::new(x, 255, 0),
        2 => RgbColor::new(0, 255, x),
        3 => RgbColor::new(0, x, 255),
        4 => RgbColor::new(x, 0, 255),
        _ => RgbColor::new(255, 0, x),
    }
}

/// Decomposes an RGB colour into wheel hue, saturation and value.
///
/// Greys (including black) report hue 0 and no saturation.
pub fn rgb_to_hsv(color: RgbColor) -> (HueValue, Saturation, f32) {
    let [r, g, b] = color.channels().map(|c| f32::from(c) / 255.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    if delta == 0.0 {
        return (HueValue::ZERO, Saturation::new(saturation), max);
    }

    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    let hue = HueValue::from_position(f64::from(sector) * SEGMENT_WIDTH);
    (hue, Saturation::new(saturation), max)
}

#[cfg(test)]
#[path = "tests/color_tests.rs"]
mod tests;
