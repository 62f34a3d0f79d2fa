use serde_derive::{Deserialize, Serialize};

use super::{interpolate_cyclic, interpolate_linear};
use crate::color::Color;

/// Colors of a multi-zone device, as a function of `(zone index, zone count)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneColors {
    /// Same color on every zone
    Fixed { color: Color },
    /// One color per zone, repeated when the device has more zones than colors
    Exact { colors: Vec<Color> },
    /// Colors spread evenly over all zones, blending in between
    Interpolated {
        #[serde(default)]
        cyclic: bool,
        colors: Vec<Color>,
    },
    /// Zone mapping rotated cyclically by `shift` zones
    Shifted { inner: Box<ZoneColors>, shift: i64 },
    /// Zone mapping reflected end to end
    Mirrored { inner: Box<ZoneColors> },
    /// Inner mapping resampled over a domain `factor` times larger
    Stretched { inner: Box<ZoneColors>, factor: f64 },
    /// First half of the zones from `left`, second half from `right`
    Split {
        left: Box<ZoneColors>,
        right: Box<ZoneColors>,
    },
    RelativeBrightness { inner: Box<ZoneColors>, factor: f64 },
    MinBrightness { inner: Box<ZoneColors>, floor: u16 },
}

impl Default for ZoneColors {
    fn default() -> Self {
        Self::Fixed { color: Color::OFF }
    }
}

impl From<Color> for ZoneColors {
    fn from(color: Color) -> Self {
        Self::Fixed { color }
    }
}

impl ZoneColors {
    pub fn fixed(color: Color) -> Self {
        Self::Fixed { color }
    }

    pub fn exact(colors: Vec<Color>) -> Self {
        Self::Exact { colors }
    }

    pub fn interpolated(cyclic: bool, colors: Vec<Color>) -> Self {
        Self::Interpolated { cyclic, colors }
    }

    /// Color of zone `zone` on a device with `count` zones
    pub fn color(&self, zone: usize, count: usize) -> Color {
        self.sample(zone as f64, count as f64)
    }

    /// Colors of all zones of a device with `count` zones
    pub fn colors(&self, count: usize) -> Vec<Color> {
        (0..count).map(|zone| self.color(zone, count)).collect()
    }

    /// Highest brightness over all zones of a device with `count` zones
    pub fn max_brightness(&self, count: usize) -> u16 {
        (0..count.max(1))
            .map(|zone| self.color(zone, count.max(1)).brightness)
            .max()
            .unwrap_or(0)
    }

    fn sample(&self, index: f64, count: f64) -> Color {
        match self {
            Self::Fixed { color } => *color,
            Self::Exact { colors } => {
                if colors.is_empty() || !index.is_finite() {
                    colors.first().copied().unwrap_or(Color::OFF)
                } else {
                    let index = (index.floor() as i64).rem_euclid(colors.len() as i64);
                    colors[index as usize]
                }
            }
            Self::Interpolated { cyclic, colors } => {
                if count <= 0. {
                    colors.first().copied().unwrap_or(Color::OFF)
                } else if *cyclic {
                    interpolate_cyclic(colors, index / count * colors.len() as f64)
                } else if count <= 1. {
                    colors.first().copied().unwrap_or(Color::OFF)
                } else {
                    interpolate_linear(
                        colors,
                        index / (count - 1.) * (colors.len().max(1) - 1) as f64,
                    )
                }
            }
            Self::Shifted { inner, shift } => {
                if count <= 0. {
                    inner.sample(index, count)
                } else {
                    inner.sample((index - *shift as f64).rem_euclid(count), count)
                }
            }
            Self::Mirrored { inner } => inner.sample(count - 1. - index, count),
            Self::Stretched { inner, factor } => inner.sample(index / factor, count / factor),
            Self::Split { left, right } => {
                if index < count / 2. {
                    left.sample(index, count)
                } else {
                    right.sample(index, count)
                }
            }
            Self::RelativeBrightness { inner, factor } => inner
                .sample(index, count)
                .with_relative_brightness(*factor),
            Self::MinBrightness { inner, floor } => {
                inner.sample(index, count).with_min_brightness(*floor)
            }
        }
    }

    /// Rotate the zone mapping by `shift` zones, so that zone `i` shows what zone `i - shift`
    /// showed before
    pub fn shift(self, shift: i64) -> Self {
        match self {
            Self::Shifted {
                inner,
                shift: previous,
            } => {
                let shift = previous.wrapping_add(shift);
                if shift == 0 {
                    *inner
                } else {
                    Self::Shifted { inner, shift }
                }
            }
            this if shift == 0 => this,
            this => Self::Shifted {
                inner: Box::new(this),
                shift,
            },
        }
    }

    /// Reflect the zone mapping end to end
    pub fn mirror(self) -> Self {
        match self {
            Self::Mirrored { inner } => *inner,
            this => Self::Mirrored {
                inner: Box::new(this),
            },
        }
    }

    /// Resample the mapping over a domain `factor` times as many zones
    ///
    /// Apply this before [Self::shift] or [Self::mirror]: shifts are expressed in zones of the
    /// outermost mapping.
    pub fn stretch(self, factor: f64) -> Self {
        if (factor - 1.).abs() < f64::EPSILON {
            self
        } else {
            Self::Stretched {
                inner: Box::new(self),
                factor,
            }
        }
    }

    /// Paint the first half of the zones from `self` and the second half from `right`
    pub fn split(self, right: ZoneColors) -> Self {
        Self::Split {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn with_relative_brightness(self, factor: f64) -> Self {
        Self::RelativeBrightness {
            inner: Box::new(self),
            factor,
        }
    }

    pub fn with_min_brightness(self, floor: u16) -> Self {
        Self::MinBrightness {
            inner: Box::new(self),
            floor,
        }
    }
}
