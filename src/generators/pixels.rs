use std::{fmt, sync::Arc};

use crate::{color::Color, geometry::TileChainGeometry};

/// Signature of computed pixel fields: `(x, y, width, height) -> color`
pub type PixelFn = dyn Fn(usize, usize, usize, usize) -> Color + Send + Sync;

/// Colors of a tile chain, as a function of a position on the chain's logical canvas
///
/// `(0, 0)` is the top-left corner of the canvas.
#[derive(Clone)]
pub enum PixelColors {
    /// Same color on every pixel
    Fixed(Color),
    /// Bilinear interpolation between the four corners of the canvas
    InterpolatedCorners {
        top_left: Color,
        top_right: Color,
        bottom_left: Color,
        bottom_right: Color,
    },
    /// Explicit colors for each physical tile
    PerTile(Arc<TileColors>),
    /// Arbitrary computed field
    Computed(Arc<PixelFn>),
    RelativeBrightness {
        inner: Box<PixelColors>,
        factor: f64,
    },
    MinBrightness {
        inner: Box<PixelColors>,
        floor: u16,
    },
}

/// Per-tile colors, in the order the tiles store them
#[derive(Debug, Clone, PartialEq)]
pub struct TileColors {
    pub geometry: TileChainGeometry,
    /// `colors[tile][row * width + col]`
    pub colors: Vec<Vec<Color>>,
    /// Color of canvas positions not covered by a tile
    pub background: Color,
}

impl PixelColors {
    pub fn computed(f: impl Fn(usize, usize, usize, usize) -> Color + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    pub fn per_tile(geometry: TileChainGeometry, colors: Vec<Vec<Color>>) -> Self {
        Self::PerTile(Arc::new(TileColors {
            geometry,
            colors,
            background: Color::OFF,
        }))
    }

    /// Color at `(x, y)` on a canvas of `width` by `height` pixels
    pub fn color(&self, x: usize, y: usize, width: usize, height: usize) -> Color {
        match self {
            Self::Fixed(color) => *color,
            Self::InterpolatedCorners {
                top_left,
                top_right,
                bottom_left,
                bottom_right,
            } => {
                let fx = ratio(x, width);
                let fy = ratio(y, height);

                let top = top_left.add(top_right, fx);
                let bottom = bottom_left.add(bottom_right, fx);
                top.add(&bottom, fy)
            }
            Self::PerTile(tiles) => tiles.color(x, y, width, height),
            Self::Computed(f) => f(x, y, width, height),
            Self::RelativeBrightness { inner, factor } => inner
                .color(x, y, width, height)
                .with_relative_brightness(*factor),
            Self::MinBrightness { inner, floor } => inner
                .color(x, y, width, height)
                .with_min_brightness(*floor),
        }
    }

    /// Highest brightness over a canvas of `width` by `height` pixels
    pub fn max_brightness(&self, width: usize, height: usize) -> u16 {
        let (width, height) = (width.max(1), height.max(1));

        (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| self.color(x, y, width, height).brightness)
            .max()
            .unwrap_or(0)
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

impl From<Color> for PixelColors {
    fn from(color: Color) -> Self {
        Self::Fixed(color)
    }
}

impl PartialEq for PixelColors {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (
                Self::InterpolatedCorners {
                    top_left: a0,
                    top_right: a1,
                    bottom_left: a2,
                    bottom_right: a3,
                },
                Self::InterpolatedCorners {
                    top_left: b0,
                    top_right: b1,
                    bottom_left: b2,
                    bottom_right: b3,
                },
            ) => a0 == b0 && a1 == b1 && a2 == b2 && a3 == b3,
            (Self::PerTile(a), Self::PerTile(b)) => a == b,
            // Computed fields are only equal to themselves
            (Self::Computed(a), Self::Computed(b)) => Arc::ptr_eq(a, b),
            (
                Self::RelativeBrightness {
                    inner: a,
                    factor: fa,
                },
                Self::RelativeBrightness {
                    inner: b,
                    factor: fb,
                },
            ) => a == b && fa == fb,
            (
                Self::MinBrightness { inner: a, floor: fa },
                Self::MinBrightness { inner: b, floor: fb },
            ) => a == b && fa == fb,
            _ => false,
        }
    }
}

impl fmt::Debug for PixelColors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(color) => f.debug_tuple("Fixed").field(color).finish(),
            Self::InterpolatedCorners {
                top_left,
                top_right,
                bottom_left,
                bottom_right,
            } => f
                .debug_struct("InterpolatedCorners")
                .field("top_left", top_left)
                .field("top_right", top_right)
                .field("bottom_left", bottom_left)
                .field("bottom_right", bottom_right)
                .finish(),
            Self::PerTile(tiles) => f.debug_tuple("PerTile").field(tiles).finish(),
            Self::Computed(_) => f.write_str("Computed"),
            Self::RelativeBrightness { inner, factor } => f
                .debug_struct("RelativeBrightness")
                .field("inner", inner)
                .field("factor", factor)
                .finish(),
            Self::MinBrightness { inner, floor } => f
                .debug_struct("MinBrightness")
                .field("inner", inner)
                .field("floor", floor)
                .finish(),
        }
    }
}

impl TileColors {
    fn color(&self, x: usize, y: usize, width: usize, height: usize) -> Color {
        let (own_width, own_height) = self.geometry.canvas_size();

        // Rescale when painting a canvas of a different size
        let x = rescale(x, width, own_width);
        let y = rescale(y, height, own_height);

        self.geometry
            .from_canvas(x, y)
            .and_then(|(tile, col, row)| {
                let width = self.geometry.tiles()[tile].width as usize;
                self.colors.get(tile)?.get(row * width + col).copied()
            })
            .unwrap_or(self.background)
    }
}

fn ratio(position: usize, size: usize) -> f64 {
    if size <= 1 {
        0.
    } else {
        position as f64 / (size - 1) as f64
    }
}

fn rescale(position: usize, from: usize, to: usize) -> usize {
    if from == to || from == 0 {
        position
    } else {
        position * to / from
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, TileLayout};

    #[test]
    fn corners_are_exact() {
        let colors = PixelColors::InterpolatedCorners {
            top_left: Color::RED,
            top_right: Color::GREEN,
            bottom_left: Color::BLUE,
            bottom_right: Color::WHITE,
        };

        assert_eq!(colors.color(0, 0, 8, 8), Color::RED);
        assert_eq!(colors.color(7, 0, 8, 8), Color::GREEN);
        assert_eq!(colors.color(0, 7, 8, 8), Color::BLUE);
        assert_eq!(colors.color(7, 7, 8, 8), Color::WHITE);
        assert_eq!(colors.color(0, 0, 1, 1), Color::RED);
    }

    #[test]
    fn per_tile_follows_rotation() {
        let geometry = TileChainGeometry::new(vec![
            TileLayout {
                user_x: 0.,
                user_y: 0.,
                width: 2,
                height: 2,
                orientation: Orientation::RightSideUp,
            },
            TileLayout {
                user_x: 1.,
                user_y: 0.,
                width: 2,
                height: 2,
                orientation: Orientation::UpsideDown,
            },
        ]);

        let colors = PixelColors::per_tile(
            geometry,
            vec![
                vec![Color::RED, Color::GREEN, Color::BLUE, Color::WHITE],
                vec![Color::RED, Color::GREEN, Color::BLUE, Color::WHITE],
            ],
        );

        // Upright tile
        assert_eq!(colors.color(0, 0, 4, 2), Color::RED);
        assert_eq!(colors.color(1, 1, 4, 2), Color::WHITE);
        // Upside-down tile: stored (0, 0) shows at the bottom-right
        assert_eq!(colors.color(3, 1, 4, 2), Color::RED);
        assert_eq!(colors.color(2, 0, 4, 2), Color::WHITE);
    }

    #[test]
    fn per_tile_background_outside_tiles() {
        let geometry = TileChainGeometry::new(vec![
            TileLayout {
                user_x: 0.,
                user_y: 0.,
                width: 2,
                height: 2,
                orientation: Orientation::RightSideUp,
            },
            TileLayout {
                user_x: 1.,
                user_y: 1.,
                width: 2,
                height: 2,
                orientation: Orientation::RightSideUp,
            },
        ]);

        let colors = PixelColors::per_tile(geometry, vec![vec![Color::RED; 4], vec![Color::BLUE; 4]]);

        // Canvas is 4x4, top-left quadrant is empty
        assert_eq!(colors.color(0, 0, 4, 4), Color::OFF);
        assert_eq!(colors.color(3, 0, 4, 4), Color::BLUE);
        assert_eq!(colors.color(0, 3, 4, 4), Color::RED);
    }

    #[test]
    fn computed_equality_is_identity() {
        let a = PixelColors::computed(|x, _, _, _| Color::RED.with_brightness(x as u16));
        let b = PixelColors::computed(|x, _, _, _| Color::RED.with_brightness(x as u16));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.color(12, 0, 16, 1).brightness, 12);
    }

    #[test]
    fn max_brightness_over_canvas() {
        let colors = PixelColors::computed(|x, y, _, _| Color::WHITE.with_brightness((x * 10 + y) as u16));
        assert_eq!(colors.max_brightness(4, 3), 32);
        assert_eq!(
            colors.with_relative_brightness(2.).max_brightness(4, 3),
            64
        );
    }
}
