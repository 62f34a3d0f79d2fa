use derive_more::From;

use crate::{
    color::Color,
    generators::{PixelColors, ZoneColors},
    geometry::TileChainGeometry,
};

use super::DeviceKind;

/// What to display on a device for one animation frame
#[derive(Debug, Clone, PartialEq, From)]
pub enum Frame {
    Color(Color),
    Zones(ZoneColors),
    Pixels(PixelColors),
}

impl Frame {
    /// Color of a single-color light
    pub fn single_color(&self) -> Color {
        match self {
            Self::Color(color) => *color,
            Self::Zones(zones) => zones.color(0, 1),
            Self::Pixels(pixels) => pixels.color(0, 0, 1, 1),
        }
    }

    /// Colors of a strip of `count` zones
    ///
    /// Pixel fields are sampled along the middle row of a square canvas.
    pub fn zone_colors(&self, count: usize) -> Vec<Color> {
        match self {
            Self::Color(color) => vec![*color; count],
            Self::Zones(zones) => zones.colors(count),
            Self::Pixels(pixels) => (0..count)
                .map(|x| pixels.color(x, count / 2, count, count))
                .collect(),
        }
    }

    /// Colors of every tile of a chain, in the order the tiles store their pixels
    ///
    /// Zone fields are spread over the canvas columns.
    pub fn tile_colors(&self, geometry: &TileChainGeometry) -> Vec<Vec<Color>> {
        let (width, height) = geometry.canvas_size();

        geometry
            .tiles()
            .iter()
            .enumerate()
            .map(|(index, tile)| {
                let mut colors = Vec::with_capacity(tile.pixel_count());

                for row in 0..tile.height as usize {
                    for col in 0..tile.width as usize {
                        let color = match geometry.to_canvas(index, col, row) {
                            Some((x, y)) => self.canvas_color(x, y, width, height),
                            None => Color::OFF,
                        };

                        colors.push(color);
                    }
                }

                colors
            })
            .collect()
    }

    fn canvas_color(&self, x: usize, y: usize, width: usize, height: usize) -> Color {
        match self {
            Self::Color(color) => *color,
            Self::Zones(zones) => zones.color(x, width),
            Self::Pixels(pixels) => pixels.color(x, y, width, height),
        }
    }

    /// Highest brightness this frame reaches on a device of the given kind
    pub fn max_brightness(&self, kind: &DeviceKind) -> u16 {
        match kind {
            DeviceKind::Plain => self.single_color().brightness,
            DeviceKind::MultiZone { zone_count } => match self {
                Self::Zones(zones) => zones.max_brightness(*zone_count),
                other => other
                    .zone_colors(*zone_count)
                    .iter()
                    .map(|color| color.brightness)
                    .max()
                    .unwrap_or(0),
            },
            DeviceKind::TileChain(geometry) => {
                let (width, height) = geometry.canvas_size();
                match self {
                    Self::Pixels(pixels) => pixels.max_brightness(width, height),
                    Self::Zones(zones) => zones.max_brightness(width),
                    Self::Color(color) => color.brightness,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, TileLayout};

    fn chain() -> TileChainGeometry {
        TileChainGeometry::new(vec![
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
        ])
    }

    #[test]
    fn zones_span_canvas_columns() {
        let frame = Frame::from(ZoneColors::exact(vec![
            Color::RED,
            Color::GREEN,
            Color::BLUE,
            Color::WHITE,
        ]));

        let colors = frame.tile_colors(&chain());
        assert_eq!(
            colors[0],
            vec![Color::RED, Color::GREEN, Color::RED, Color::GREEN]
        );
        // Upside down: stored column 0 is canvas column 3
        assert_eq!(
            colors[1],
            vec![Color::WHITE, Color::BLUE, Color::WHITE, Color::BLUE]
        );
    }

    #[test]
    fn pixels_on_a_strip_use_the_middle_row() {
        let frame = Frame::from(PixelColors::computed(|x, y, _, _| {
            Color::WHITE.with_brightness((y * 100 + x) as u16)
        }));

        let brightness: Vec<_> = frame
            .zone_colors(4)
            .iter()
            .map(|color| color.brightness)
            .collect();
        assert_eq!(brightness, vec![200, 201, 202, 203]);
    }

    #[test]
    fn plain_lights_take_the_first_sample() {
        let frame = Frame::from(ZoneColors::interpolated(false, vec![Color::RED, Color::BLUE]));
        assert_eq!(frame.single_color(), Color::RED);
        assert_eq!(Frame::from(Color::CYAN).single_color(), Color::CYAN);
    }

    #[test]
    fn max_brightness_depends_on_geometry() {
        let frame = Frame::from(PixelColors::computed(|x, _, _, _| {
            Color::WHITE.with_brightness(x as u16)
        }));

        assert_eq!(frame.max_brightness(&DeviceKind::Plain), 0);
        assert_eq!(
            frame.max_brightness(&DeviceKind::MultiZone { zone_count: 10 }),
            9
        );
        assert_eq!(
            frame.max_brightness(&DeviceKind::TileChain(std::sync::Arc::new(chain()))),
            3
        );
    }
}
