use std::{f64::consts::PI, sync::Arc, time::Duration};

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    animation::{AnimationDefinition, Frame, StartAnimationError},
    color::Color,
    device::LightInfo,
    generators::{interpolate_cyclic, PixelColors},
};

/// Shape of the wave fronts
#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WaveShape {
    Circle,
    Square,
    Diamond,
    Heart,
    /// Fronts are horizontal lines travelling up or down
    Vertical,
    /// Fronts are vertical lines travelling left or right
    Horizontal,
}

impl WaveShape {
    /// Distance of an offset `(dx, dy)` from the center, `dy` growing downwards
    pub fn distance(self, dx: f64, dy: f64) -> f64 {
        match self {
            Self::Circle => dx.hypot(dy),
            Self::Square => dx.abs().max(dy.abs()),
            Self::Diamond => dx.abs() + dy.abs(),
            Self::Heart => {
                let radius = dx.hypot(dy);
                // Angle from the upward direction, in [0, PI]
                let theta = dx.abs().atan2(-dy);
                radius / ((2. * theta / PI - 1.).powi(5) + 1.2 + (theta / 2.).cos() / 3.)
            }
            Self::Vertical => dy.abs(),
            Self::Horizontal => dx.abs(),
        }
    }
}

/// Where the wave starts from
#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WaveDirection {
    FromLeft,
    FromRight,
    FromTop,
    FromBottom,
    /// Towards the center of the canvas
    Inward,
    /// From the center of the canvas
    Outward,
}

impl WaveDirection {
    /// Wave center on a canvas of `width` by `height` pixels
    fn center(self, width: f64, height: f64) -> (f64, f64) {
        let (mid_x, mid_y) = ((width - 1.) / 2., (height - 1.) / 2.);

        match self {
            Self::FromLeft => (-1., mid_y),
            Self::FromRight => (width, mid_y),
            Self::FromTop => (mid_x, -1.),
            Self::FromBottom => (mid_x, height),
            Self::Inward | Self::Outward => (mid_x, mid_y),
        }
    }
}

/// Color waves travelling over a pixel canvas
#[derive(Debug, Clone, PartialEq)]
pub struct TileWave {
    colors: Arc<Vec<Color>>,
    shape: WaveShape,
    direction: WaveDirection,
    /// Distance travelled by the fronts at every step, in pixels
    radius_factor: f64,
    /// Distance between two consecutive colors, in pixels
    spacing: f64,
    step: Duration,
}

impl TileWave {
    pub fn new(
        colors: Vec<Color>,
        shape: WaveShape,
        direction: WaveDirection,
        radius_factor: f64,
        spacing: f64,
        step: Duration,
    ) -> Result<Self, StartAnimationError> {
        if colors.is_empty() {
            return Err(StartAnimationError::Invalid("wave without colors".to_owned()));
        }

        if !spacing.is_finite() || spacing <= 0. {
            return Err(StartAnimationError::Invalid(format!(
                "color spacing must be positive, got {}",
                spacing
            )));
        }

        if !radius_factor.is_finite() {
            return Err(StartAnimationError::Invalid(format!(
                "invalid radius factor {}",
                radius_factor
            )));
        }

        Ok(Self {
            colors: Arc::new(colors),
            shape,
            direction,
            radius_factor,
            spacing,
            step,
        })
    }

    /// Pixel field of step `n`
    pub fn pixels(&self, n: u64) -> PixelColors {
        let colors = self.colors.clone();
        let (shape, direction, spacing) = (self.shape, self.direction, self.spacing);

        let travelled = n as f64 * self.radius_factor;
        let offset = match direction {
            WaveDirection::Inward => travelled,
            _ => -travelled,
        };

        PixelColors::computed(move |x, y, width, height| {
            let (cx, cy) = direction.center(width as f64, height as f64);
            let distance = shape.distance(x as f64 - cx, y as f64 - cy);
            interpolate_cyclic(&colors, (distance + offset) / spacing)
        })
    }
}

impl AnimationDefinition for TileWave {
    fn frame(&mut self, n: u64) -> Option<Frame> {
        Some(Frame::Pixels(self.pixels(n)))
    }

    fn duration(&mut self, _n: u64) -> Duration {
        // Inward fronts shrink, slow them down to keep their angular speed
        match self.direction {
            WaveDirection::Inward => self.step.saturating_mul(2),
            _ => self.step,
        }
    }

    fn prepare(&mut self, _light: &LightInfo) -> Result<(), StartAnimationError> {
        // Any device can show a pixel field
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(shape: WaveShape, direction: WaveDirection) -> TileWave {
        TileWave::new(
            vec![Color::RED, Color::GREEN, Color::BLUE],
            shape,
            direction,
            1.,
            1.,
            Duration::from_millis(100),
        )
        .expect("invalid wave")
    }

    #[test]
    fn distances() {
        assert_eq!(WaveShape::Circle.distance(3., 4.), 5.);
        assert_eq!(WaveShape::Square.distance(-3., 2.), 3.);
        assert_eq!(WaveShape::Diamond.distance(-3., 2.), 5.);
        assert_eq!(WaveShape::Vertical.distance(-3., 2.), 2.);
        assert_eq!(WaveShape::Horizontal.distance(-3., 2.), 3.);
    }

    #[test]
    fn heart_is_pointy_at_the_bottom() {
        let up = WaveShape::Heart.distance(0., -1.);
        let down = WaveShape::Heart.distance(0., 1.);

        // The same distance reaches further downwards
        assert!(down < up);
        // Left/right symmetric
        assert_eq!(
            WaveShape::Heart.distance(-2., 1.),
            WaveShape::Heart.distance(2., 1.)
        );
    }

    #[test]
    fn outward_waves_leave_the_center() {
        let wave = wave(WaveShape::Circle, WaveDirection::Outward);

        // Center of a 3x3 canvas shows colors[0], then the previous colors move outwards
        assert_eq!(wave.pixels(0).color(1, 1, 3, 3), Color::RED);
        assert_eq!(wave.pixels(1).color(1, 1, 3, 3), Color::BLUE);
        assert_eq!(wave.pixels(1).color(2, 1, 3, 3), Color::RED);
    }

    #[test]
    fn inward_waves_move_to_the_center() {
        let mut wave = wave(WaveShape::Square, WaveDirection::Inward);

        assert_eq!(wave.pixels(0).color(2, 1, 3, 3), Color::GREEN);
        assert_eq!(wave.pixels(1).color(1, 1, 3, 3), Color::GREEN);
        assert_eq!(wave.duration(0), Duration::from_millis(200));
    }

    #[test]
    fn inward_duration_saturates() {
        let mut wave = TileWave::new(
            vec![Color::RED],
            WaveShape::Circle,
            WaveDirection::Inward,
            1.,
            1.,
            Duration::MAX,
        )
        .expect("invalid wave");

        assert_eq!(wave.duration(0), Duration::MAX);
    }

    #[test]
    fn edge_directions_start_off_canvas() {
        let wave = wave(WaveShape::Horizontal, WaveDirection::FromLeft);

        // Column 0 is one pixel away from the center
        assert_eq!(wave.pixels(0).color(0, 0, 4, 4), Color::GREEN);
        assert_eq!(wave.pixels(0).color(0, 3, 4, 4), Color::GREEN);
        assert_eq!(wave.pixels(1).color(1, 0, 4, 4), Color::GREEN);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(TileWave::new(
            vec![],
            WaveShape::Circle,
            WaveDirection::Outward,
            1.,
            1.,
            Duration::ZERO
        )
        .is_err());
        assert!(TileWave::new(
            vec![Color::RED],
            WaveShape::Circle,
            WaveDirection::Outward,
            1.,
            0.,
            Duration::ZERO
        )
        .is_err());
    }
}
