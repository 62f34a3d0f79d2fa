//! Color fields that adapt to the geometry of the device they are painted on
//!
//! A generator describes *what* to paint independently of how many zones or pixels a device has:
//! [ZoneColors] maps a zone index (out of a zone count) to a color, [PixelColors] maps a canvas
//! position (out of a canvas size) to a color. Both are immutable values; transforms build new
//! values wrapping the previous one.

use crate::color::Color;

mod pixels;
pub use pixels::*;

mod zones;
pub use zones::*;

/// Cyclic interpolation over `colors` at fractional index `position`
///
/// Position `i` is exactly `colors[i % len]`, positions in between blend neighbours, and the last
/// color blends back into the first one.
pub fn interpolate_cyclic(colors: &[Color], position: f64) -> Color {
    match colors.len() {
        0 => Color::OFF,
        1 => colors[0],
        len => {
            if !position.is_finite() {
                return colors[0];
            }

            let position = position.rem_euclid(len as f64);
            let lower = (position.floor() as usize).min(len - 1);
            let upper = (lower + 1) % len;

            colors[lower].add(&colors[upper], position - lower as f64)
        }
    }
}

/// Linear interpolation over `colors`, clamped to the first and last color
pub fn interpolate_linear(colors: &[Color], position: f64) -> Color {
    match colors.len() {
        0 => Color::OFF,
        1 => colors[0],
        len => {
            if position.is_nan() {
                return colors[0];
            }

            let position = position.clamp(0., (len - 1) as f64);
            let lower = (position.floor() as usize).min(len - 1);
            let upper = (lower + 1).min(len - 1);

            colors[lower].add(&colors[upper], position - lower as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_wraps_last_into_first() {
        let colors = [Color::RED, Color::GREEN, Color::BLUE];

        assert_eq!(interpolate_cyclic(&colors, 0.), Color::RED);
        assert_eq!(interpolate_cyclic(&colors, 2.), Color::BLUE);
        assert_eq!(interpolate_cyclic(&colors, 3.), Color::RED);
        assert_eq!(interpolate_cyclic(&colors, -1.), Color::BLUE);
        assert_eq!(
            interpolate_cyclic(&colors, 2.5),
            Color::BLUE.add(&Color::RED, 0.5)
        );
    }

    #[test]
    fn linear_clamps() {
        let colors = [Color::RED, Color::BLUE];

        assert_eq!(interpolate_linear(&colors, -3.), Color::RED);
        assert_eq!(interpolate_linear(&colors, 7.), Color::BLUE);
        assert_eq!(
            interpolate_linear(&colors, 0.25),
            Color::RED.add(&Color::BLUE, 0.25)
        );
    }

    #[test]
    fn empty_lists_are_off() {
        assert_eq!(interpolate_cyclic(&[], 1.), Color::OFF);
        assert_eq!(interpolate_linear(&[], 1.), Color::OFF);
    }
}
