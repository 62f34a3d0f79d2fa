//! HSBK color values and the arithmetic animations perform on them

use palette::{FromColor, Hsv, Srgb};
use parse_display::{Display, FromStr};
use serde_derive::{Deserialize, Serialize};

mod utils;
pub use utils::color_temperature_to_rgb;

/// Size of the circular hue domain: one full turn
const HUE_TURN: f64 = 65536.;

/// Default white point used when a color is built from RGB components
pub const DEFAULT_KELVIN: u16 = 3500;

/// Range of white points accepted by devices
pub const KELVIN_RANGE: std::ops::RangeInclusive<u16> = 1500..=9000;

/// Device color, in the hue/saturation/brightness/kelvin space
///
/// All four channels are always present. When `saturation` is 0, `kelvin` selects the white point
/// and `hue` is irrelevant.
#[derive(
    Debug, Display, FromStr, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[display("{hue},{saturation},{brightness},{kelvin}")]
pub struct Color {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl Default for Color {
    fn default() -> Self {
        Self::OFF
    }
}

impl Color {
    pub const OFF: Self = Self::new(0, 0, 0, DEFAULT_KELVIN);
    pub const WHITE: Self = Self::new(0, 0, u16::MAX, DEFAULT_KELVIN);
    pub const RED: Self = Self::new(0, u16::MAX, u16::MAX, DEFAULT_KELVIN);
    pub const YELLOW: Self = Self::new(10923, u16::MAX, u16::MAX, DEFAULT_KELVIN);
    pub const GREEN: Self = Self::new(21845, u16::MAX, u16::MAX, DEFAULT_KELVIN);
    pub const CYAN: Self = Self::new(32768, u16::MAX, u16::MAX, DEFAULT_KELVIN);
    pub const BLUE: Self = Self::new(43691, u16::MAX, u16::MAX, DEFAULT_KELVIN);
    pub const MAGENTA: Self = Self::new(54613, u16::MAX, u16::MAX, DEFAULT_KELVIN);

    pub const fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    /// White at the given color temperature
    pub fn white(kelvin: u16, brightness: u16) -> Self {
        Self::new(0, 0, brightness, kelvin)
    }

    /// Build a color from RGB components in `[0, 1]`
    pub fn from_rgb(red: f32, green: f32, blue: f32, kelvin: u16) -> Self {
        let hsv: Hsv = Hsv::from_color(Srgb::new(
            red.clamp(0., 1.),
            green.clamp(0., 1.),
            blue.clamp(0., 1.),
        ));

        let hue = (f64::from(hsv.hue.into_positive_degrees()) / 360. * HUE_TURN).round();

        Self {
            hue: (hue as u32 % 65536) as u16,
            saturation: unit_to_u16(f64::from(hsv.saturation)),
            brightness: unit_to_u16(f64::from(hsv.value)),
            kelvin,
        }
    }

    /// RGB components of this color in `[0, 1]`, ignoring the white point
    pub fn to_rgb(&self) -> (f32, f32, f32) {
        let hsv: Hsv = Hsv::new(
            (f64::from(self.hue) / HUE_TURN * 360.) as f32,
            f32::from(self.saturation) / 65535.,
            f32::from(self.brightness) / 65535.,
        );

        let rgb: Srgb = Srgb::from_color(hsv);
        rgb.into_components()
    }

    /// Blend this color towards `other`
    ///
    /// Saturation, brightness and kelvin are interpolated linearly. Hue is interpolated along the
    /// shorter arc of the hue circle; when both arcs have the same length, the hue increases.
    /// `weight` is clamped to `[0, 1]`: 0 returns `self`, 1 returns `other`.
    pub fn add(&self, other: &Color, weight: f64) -> Self {
        let weight = if weight.is_nan() {
            0.
        } else {
            weight.clamp(0., 1.)
        };

        let mut hue_diff = f64::from(other.hue) - f64::from(self.hue);
        if hue_diff > HUE_TURN / 2. {
            hue_diff -= HUE_TURN;
        } else if hue_diff < -HUE_TURN / 2. {
            hue_diff += HUE_TURN;
        }

        let hue = (f64::from(self.hue) + weight * hue_diff)
            .round()
            .rem_euclid(HUE_TURN);

        Self {
            hue: hue as u16,
            saturation: lerp(self.saturation, other.saturation, weight),
            brightness: lerp(self.brightness, other.brightness, weight),
            kelvin: lerp(self.kelvin, other.kelvin, weight),
        }
    }

    /// Multiply the brightness by `factor`, clamped to the valid range
    pub fn with_relative_brightness(&self, factor: f64) -> Self {
        Self {
            brightness: scale(self.brightness, factor),
            ..*self
        }
    }

    /// Raise the brightness to at least `floor`
    pub fn with_min_brightness(&self, floor: u16) -> Self {
        Self {
            brightness: self.brightness.max(floor),
            ..*self
        }
    }

    /// Replace the brightness channel
    pub fn with_brightness(&self, brightness: u16) -> Self {
        Self {
            brightness,
            ..*self
        }
    }

    pub fn is_off(&self) -> bool {
        self.brightness == 0
    }
}

/// Free-function form of [Color::add]
pub fn blend(a: &Color, b: &Color, t: f64) -> Color {
    a.add(b, t)
}

/// Free-function form of [Color::with_relative_brightness]
pub fn with_relative_brightness(color: &Color, factor: f64) -> Color {
    color.with_relative_brightness(factor)
}

fn lerp(a: u16, b: u16, t: f64) -> u16 {
    let (a, b) = (f64::from(a), f64::from(b));
    (a + (b - a) * t).round().clamp(0., 65535.) as u16
}

fn scale(value: u16, factor: f64) -> u16 {
    (f64::from(value) * factor).round().clamp(0., 65535.) as u16
}

pub(crate) fn unit_to_u16(x: f64) -> u16 {
    (x * 65535.).round().clamp(0., 65535.) as u16
}

/// Extension to render colors in a truecolor terminal
pub trait AnsiDisplayExt {
    fn to_ansi_truecolor(self, buf: &mut String);
}

impl<T: Iterator<Item = Color>> AnsiDisplayExt for T {
    fn to_ansi_truecolor(self, buf: &mut String) {
        use std::fmt::Write;

        for color in self {
            let (r, g, b) = color.to_rgb();
            // ok: writing to a String never fails
            write!(
                buf,
                "\x1B[38;2;{};{};{}m█",
                (r * 255.) as u8,
                (g * 255.) as u8,
                (b * 255.) as u8
            )
            .ok();
        }

        buf.push_str("\x1B[0m");
    }
}
