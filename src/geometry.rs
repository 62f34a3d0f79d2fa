//! Layout of tile chains on a logical pixel canvas

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Physical orientation of a tile, derived from its accelerometer
#[derive(
    Debug,
    Display,
    EnumString,
    IntoStaticStr,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Orientation {
    RightSideUp,
    RotatedLeft,
    RotatedRight,
    UpsideDown,
    FaceUp,
    FaceDown,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::RightSideUp
    }
}

impl Orientation {
    /// Infer the orientation from accelerometer measurements
    pub fn from_accelerometer(x: i16, y: i16, z: i16) -> Self {
        // Tiles without a working accelerometer report -1 on all axes
        if x == -1 && y == -1 && z == -1 {
            return Self::RightSideUp;
        }

        let (ax, ay, az) = (
            i32::from(x).abs(),
            i32::from(y).abs(),
            i32::from(z).abs(),
        );

        if ax > ay && ax > az {
            if x > 0 {
                Self::RotatedRight
            } else {
                Self::RotatedLeft
            }
        } else if az > ax && az > ay {
            if z > 0 {
                Self::FaceDown
            } else {
                Self::FaceUp
            }
        } else if y > 0 {
            Self::UpsideDown
        } else {
            Self::RightSideUp
        }
    }

    /// Map a tile-local pixel (as stored on the device) to its upright position within the tile
    fn to_upright(self, col: usize, row: usize, width: usize, height: usize) -> (usize, usize) {
        match self {
            Self::RightSideUp | Self::FaceUp | Self::FaceDown => (col, row),
            Self::UpsideDown => (width - 1 - col, height - 1 - row),
            Self::RotatedLeft => (row, width - 1 - col),
            Self::RotatedRight => (height - 1 - row, col),
        }
    }

    /// Inverse of [Self::to_upright]
    fn from_upright(self, x: usize, y: usize, width: usize, height: usize) -> (usize, usize) {
        match self {
            Self::RightSideUp | Self::FaceUp | Self::FaceDown => (x, y),
            Self::UpsideDown => (width - 1 - x, height - 1 - y),
            Self::RotatedLeft => (width - 1 - y, x),
            Self::RotatedRight => (y, height - 1 - x),
        }
    }

    fn is_quarter_turn(self) -> bool {
        matches!(self, Self::RotatedLeft | Self::RotatedRight)
    }
}

/// Position and size of one tile in a chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileLayout {
    /// Horizontal position, in tile widths
    pub user_x: f32,
    /// Vertical position, in tile heights, growing upwards
    pub user_y: f32,
    pub width: u8,
    pub height: u8,
    #[serde(default)]
    pub orientation: Orientation,
}

impl TileLayout {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of the tile on the canvas once rotated upright
    fn upright_size(&self) -> (usize, usize) {
        if self.orientation.is_quarter_turn() {
            (self.height as usize, self.width as usize)
        } else {
            (self.width as usize, self.height as usize)
        }
    }
}

/// Tiles of a chain, placed on a shared canvas whose origin is the top-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct TileChainGeometry {
    tiles: Vec<TileLayout>,
    origins: Vec<(usize, usize)>,
    width: usize,
    height: usize,
}

impl TileChainGeometry {
    pub fn new(tiles: Vec<TileLayout>) -> Self {
        let min_x = tiles
            .iter()
            .map(|tile| tile.user_x)
            .fold(f32::INFINITY, f32::min);
        let max_y = tiles
            .iter()
            .map(|tile| tile.user_y)
            .fold(f32::NEG_INFINITY, f32::max);

        let origins: Vec<_> = tiles
            .iter()
            .map(|tile| {
                let x = ((tile.user_x - min_x) * f32::from(tile.width)).round().max(0.);
                let y = ((max_y - tile.user_y) * f32::from(tile.height))
                    .round()
                    .max(0.);
                (x as usize, y as usize)
            })
            .collect();

        let (width, height) = tiles.iter().zip(&origins).fold(
            (0, 0),
            |(width, height), (tile, (x, y))| {
                let (w, h) = tile.upright_size();
                (width.max(x + w), height.max(y + h))
            },
        );

        Self {
            tiles,
            origins,
            width,
            height,
        }
    }

    /// A single upright tile of the given size
    pub fn single(width: u8, height: u8) -> Self {
        Self::new(vec![TileLayout {
            user_x: 0.,
            user_y: 0.,
            width,
            height,
            orientation: Orientation::RightSideUp,
        }])
    }

    pub fn tiles(&self) -> &[TileLayout] {
        &self.tiles
    }

    /// Canvas size, in pixels, as (width, height)
    pub fn canvas_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Canvas position of the pixel stored at `(col, row)` on tile `tile`
    pub fn to_canvas(&self, tile: usize, col: usize, row: usize) -> Option<(usize, usize)> {
        let layout = self.tiles.get(tile)?;
        let (ox, oy) = self.origins[tile];
        let (w, h) = (layout.width as usize, layout.height as usize);

        if col >= w || row >= h {
            return None;
        }

        let (x, y) = layout.orientation.to_upright(col, row, w, h);
        Some((ox + x, oy + y))
    }

    /// Tile and stored pixel position displayed at canvas position `(x, y)`
    ///
    /// Overlapping tiles resolve to the one with the lowest index.
    pub fn from_canvas(&self, x: usize, y: usize) -> Option<(usize, usize, usize)> {
        self.tiles
            .iter()
            .zip(&self.origins)
            .enumerate()
            .find_map(|(index, (tile, &(ox, oy)))| {
                let (uw, uh) = tile.upright_size();
                if x < ox || y < oy || x >= ox + uw || y >= oy + uh {
                    return None;
                }

                let (col, row) = tile.orientation.from_upright(
                    x - ox,
                    y - oy,
                    tile.width as usize,
                    tile.height as usize,
                );
                Some((index, col, row))
            })
    }
}
