//! Color utilities

use super::{unit_to_u16, Color, KELVIN_RANGE};

/// Black-body approximation of a color temperature, as RGB components in `[0, 1]`
///
/// # Parameters
///
/// * `t`: temperature in Kelvin
fn kelvin_to_rgbf64(t: f64) -> (f64, f64, f64) {
    // http://www.tannerhelland.com/4435/convert-temperature-rgb-algorithm-code/
    //
    // Check bounds on temperature
    let t = if t > 40000.0 { 40000.0 } else { t };
    let t = if t < 1000.0 { 1000.0 } else { t };

    // Scale
    let t = t / 100.0;

    let r = if t <= 66.0 {
        255.0
    } else {
        329.698_727_446 * (t - 60.0).powf(-0.133_204_759_2)
    };

    let g = if t <= 66.0 {
        99.470_802_586_1 * t.ln() - 161.119_568_166_1
    } else {
        288.122_169_528_3 * (t - 60.0).powf(-0.075_514_849_2)
    };

    let b = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        138.517_731_223_1 * (t - 10.0).ln() - 305.044_792_730_7
    };

    (
        (r / 255.0).clamp(0.0, 1.0),
        (g / 255.0).clamp(0.0, 1.0),
        (b / 255.0).clamp(0.0, 1.0),
    )
}

/// Color of a black body at temperature `kelvin`, at the given relative `brightness`
///
/// Channels are clamped to `[0, 1]` before being scaled by `brightness`, then quantized to 16 bits
/// and converted back to HSBK. The white point of the result is `kelvin` clamped to the range
/// devices accept.
pub fn color_temperature_to_rgb(kelvin: f64, brightness: f64) -> Color {
    let brightness = if brightness.is_nan() {
        0.0
    } else {
        brightness.clamp(0.0, 1.0)
    };

    let (r, g, b) = kelvin_to_rgbf64(kelvin);

    // Quantize to the device color depth first
    let (r, g, b) = (
        unit_to_u16(r * brightness),
        unit_to_u16(g * brightness),
        unit_to_u16(b * brightness),
    );

    let white_point = if kelvin.is_nan() {
        super::DEFAULT_KELVIN
    } else {
        kelvin
            .round()
            .clamp(f64::from(*KELVIN_RANGE.start()), f64::from(*KELVIN_RANGE.end())) as u16
    };

    Color::from_rgb(
        f32::from(r) / 65535.,
        f32::from(g) / 65535.,
        f32::from(b) / 65535.,
        white_point,
    )
}
