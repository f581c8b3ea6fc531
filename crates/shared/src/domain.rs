use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Number of distinct positions on the 16-bit hue wheel.
pub const HUE_STEPS: u32 = 65_536;
pub const MAX_HUE: u16 = u16::MAX;

/// Position on the 16-bit colour wheel. Always in `0..=65535`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HueValue(u16);

impl HueValue {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Maps any integer onto the wheel modulo 65536.
    pub fn wrapping(raw: i64) -> Self {
        Self(raw.rem_euclid(i64::from(HUE_STEPS)) as u16)
    }

    /// Rounds a fractional wheel position to the nearest step and wraps it.
    pub fn from_position(position: f64) -> Self {
        if !position.is_finite() {
            return Self::ZERO;
        }
        Self::wrapping(position.round() as i64)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for HueValue {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl TryFrom<i64> for HueValue {
    type Error = ConversionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .map(Self)
            .map_err(|_| ConversionError::HueOutOfRange(value))
    }
}

impl fmt::Display for HueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 8-bit RGB triple. Channel bounds are enforced by the `u8` representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Saturation as a fraction of the vendor's full scale, clamped to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Saturation(f32);

impl Saturation {
    pub const NONE: Self = Self(0.0);
    pub const FULL: Self = Self(1.0);

    pub fn new(fraction: f32) -> Self {
        if fraction.is_nan() {
            return Self::NONE;
        }
        Self(fraction.clamp(0.0, 1.0))
    }

    pub const fn fraction(self) -> f32 {
        self.0
    }

    /// Scales onto a native `0..=max` saturation range.
    pub fn to_native(self, max: u16) -> u16 {
        (f32::from(max) * self.0).round() as u16
    }
}

/// Native brightness range of one vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessScale {
    pub min: u16,
    pub max: u16,
}

impl BrightnessScale {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn clamp(self, level: u16) -> u16 {
        level.clamp(self.min, self.max)
    }

    /// Converts a `0.0..=1.0` fraction of full brightness into a native level.
    pub fn from_fraction(self, fraction: f32) -> u16 {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.clamp((f32::from(self.max) * fraction) as u16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Bridge,
    LocalBulb,
    Cloud,
}

impl Vendor {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::LocalBulb => "local_bulb",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorTarget {
    Hue(HueValue),
    Rgb(RgbColor),
    White,
}

/// Target state for one batched update. `None` fields are left untouched.
///
/// Fade durations are adapter configuration, not part of the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightState {
    pub power: Option<bool>,
    /// Native brightness on the receiving adapter's scale.
    pub brightness: Option<u16>,
    pub saturation: Option<Saturation>,
    pub color: Option<ColorTarget>,
}

impl LightState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power(mut self, on: bool) -> Self {
        self.power = Some(on);
        self
    }

    pub fn with_brightness(mut self, level: u16) -> Self {
        self.brightness = Some(level);
        self
    }

    pub fn with_saturation(mut self, saturation: Saturation) -> Self {
        self.saturation = Some(saturation);
        self
    }

    pub fn with_color(mut self, color: ColorTarget) -> Self {
        self.color = Some(color);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.brightness.is_none()
            && self.saturation.is_none()
            && self.color.is_none()
    }
}

/// Shared state of the colour cycle, owned by one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleState {
    pub running: bool,
    pub current_hue: HueValue,
    pub brightness_jitter_enabled: bool,
    pub tick: u64,
}

impl CycleState {
    /// Returns to the stopped state. The jitter toggle survives a stop.
    pub fn reset(&mut self) {
        self.running = false;
        self.current_hue = HueValue::ZERO;
        self.tick = 0;
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
