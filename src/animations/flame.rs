use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::time::Instant;

use crate::{
    animation::{AnimationDefinition, Frame, StartAnimationError},
    color::{color_temperature_to_rgb, Color},
    device::{DeviceKind, LightInfo},
    generators::{PixelColors, ZoneColors},
};

/// Shortest time a flame frame lasts, in milliseconds
pub const MIN_FRAME_MS: f64 = 20.;

const KELVIN_MIN: f64 = 2500.;
const KELVIN_MAX: f64 = 3500.;
const TARGET_MS_MIN: f64 = 100.;
const TARGET_MS_MAX: f64 = 2100.;
/// Temperature lost at the top of a cell
const REDDENING_KELVIN: f64 = 1000.;
/// Weight of the yellow tint at the top of a cell
const YELLOW_TINT: f64 = 0.1;

/// Shape of the random brightness draws
#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BrightnessDistribution {
    /// Mostly around the middle of the range
    Centered,
    /// Mostly near the low end
    Lowered,
    SlightlyLowered,
    SlightlyCentered,
}

impl BrightnessDistribution {
    /// Map a uniform draw in `[0, 1]` to this distribution, also in `[0, 1]`
    pub fn transform(self, u: f64) -> f64 {
        let u = u.clamp(0., 1.);
        let v = 2. * u - 1.;

        match self {
            Self::Centered => 0.5 + 0.5 * v.powi(3),
            Self::Lowered => u * u,
            Self::SlightlyLowered => u.powf(1.5),
            Self::SlightlyCentered => 0.5 + 0.5 * v * v.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlameSettings {
    /// Lowest base brightness, in `[0, 1]`
    pub brightness_min: f64,
    /// Highest base brightness, in `[0, 1]`
    pub brightness_max: f64,
    pub distribution: BrightnessDistribution,
    /// Color shown where the flame fades out
    pub background: Color,
    /// Per-column temperature perturbation, in Kelvin
    pub kelvin_jitter: f64,
    /// Per-column brightness perturbation
    pub brightness_jitter: f64,
    /// Brightness lost at the top of a cell, relative to its bottom
    pub falloff: f64,
    /// Width of a candle on a tile chain, in pixels
    pub cell_width: usize,
    /// Seed for reproducible flames, drawn from entropy when missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for FlameSettings {
    fn default() -> Self {
        Self {
            brightness_min: 0.3,
            brightness_max: 1.,
            distribution: BrightnessDistribution::SlightlyCentered,
            background: Color::OFF,
            kelvin_jitter: 150.,
            brightness_jitter: 0.1,
            falloff: 0.6,
            cell_width: 4,
            seed: None,
        }
    }
}

impl FlameSettings {
    fn validate(&self) -> Result<(), StartAnimationError> {
        let unit = 0.0..=1.0;

        if !unit.contains(&self.brightness_min)
            || !unit.contains(&self.brightness_max)
            || self.brightness_min > self.brightness_max
        {
            return Err(StartAnimationError::Invalid(format!(
                "invalid flame brightness range {}..{}",
                self.brightness_min, self.brightness_max
            )));
        }

        if !unit.contains(&self.falloff) {
            return Err(StartAnimationError::Invalid(format!(
                "flame falloff must be in [0, 1], got {}",
                self.falloff
            )));
        }

        if !(self.kelvin_jitter >= 0. && self.kelvin_jitter.is_finite())
            || !(self.brightness_jitter >= 0. && self.brightness_jitter.is_finite())
        {
            return Err(StartAnimationError::Invalid(
                "flame jitter must be positive".to_owned(),
            ));
        }

        if self.cell_width == 0 {
            return Err(StartAnimationError::Invalid(
                "flame cells must be at least one pixel wide".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Temperature and brightness of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flicker {
    pub kelvin: f64,
    pub brightness: f64,
}

/// One candle: a block of columns flickering around a shared target
#[derive(Debug, Clone, PartialEq)]
pub struct FlameCell {
    height: usize,
    current: Vec<Flicker>,
    target: Vec<Flicker>,
    /// Time left to reach `target`, in milliseconds
    remaining: f64,
}

impl FlameCell {
    pub fn new(width: usize, height: usize, rng: &mut impl Rng, settings: &FlameSettings) -> Self {
        let mut cell = Self {
            height: height.max(1),
            current: Vec::new(),
            target: vec![
                Flicker {
                    kelvin: KELVIN_MIN,
                    brightness: 0.
                };
                width.max(1)
            ],
            remaining: 0.,
        };

        cell.retarget(rng, settings);
        cell.current = cell.target.clone();
        cell
    }

    pub fn current(&self) -> &[Flicker] {
        &self.current
    }

    pub fn target(&self) -> &[Flicker] {
        &self.target
    }

    /// Time left to reach the target, in milliseconds
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    fn retarget(&mut self, rng: &mut impl Rng, settings: &FlameSettings) {
        let kelvin = (KELVIN_MIN.ln() + rng.gen::<f64>() * (KELVIN_MAX.ln() - KELVIN_MIN.ln())).exp();
        let brightness = settings.brightness_min
            + (settings.brightness_max - settings.brightness_min)
                * settings.distribution.transform(rng.gen());

        for target in &mut self.target {
            let kelvin_jitter = rng.gen_range(-settings.kelvin_jitter..=settings.kelvin_jitter);
            let brightness_jitter =
                rng.gen_range(-settings.brightness_jitter..=settings.brightness_jitter);

            *target = Flicker {
                kelvin: kelvin + kelvin_jitter,
                brightness: (brightness + brightness_jitter).clamp(0., 1.),
            };
        }

        self.remaining = rng.gen_range(TARGET_MS_MIN..=TARGET_MS_MAX);
    }

    /// Move `elapsed_ms` towards the target, returning the time left to reach it
    ///
    /// When less than [MIN_FRAME_MS] would be left, the target is reached right away and a new
    /// one is drawn.
    pub fn add_time(&mut self, elapsed_ms: f64, rng: &mut impl Rng, settings: &FlameSettings) -> f64 {
        let elapsed_ms = elapsed_ms.max(0.);

        if self.remaining - elapsed_ms < MIN_FRAME_MS {
            self.current.clone_from(&self.target);
            self.retarget(rng, settings);
        } else {
            let weight = elapsed_ms / self.remaining;

            for (current, target) in self.current.iter_mut().zip(&self.target) {
                current.kelvin += (target.kelvin - current.kelvin) * weight;
                current.brightness += (target.brightness - current.brightness) * weight;
            }

            self.remaining -= elapsed_ms;
        }

        self.remaining
    }

    /// Color of column `col`, `row` rows below the top of the cell
    pub fn color(&self, col: usize, row: usize, settings: &FlameSettings) -> Color {
        let flicker = match self.current.get(col) {
            Some(flicker) => *flicker,
            None => return settings.background,
        };

        // 0 at the bottom, 1 at the top
        let height = if self.height > 1 {
            (self.height - 1 - row.min(self.height - 1)) as f64 / (self.height - 1) as f64
        } else {
            0.
        };

        let flame = color_temperature_to_rgb(flicker.kelvin - REDDENING_KELVIN * height, 1.)
            .add(&Color::YELLOW, YELLOW_TINT * height);
        let brightness = flicker.brightness * (1. - settings.falloff * height);

        settings.background.add(&flame, brightness)
    }
}

/// Where the candles are laid out
#[derive(Debug, Clone, Copy, PartialEq)]
enum FlameLayout {
    /// One flickering color
    Single,
    /// One cell over a zone strip
    Strip(usize),
    /// Candles of `cell_width` columns over a pixel canvas
    Canvas { width: usize, height: usize },
}

/// Candle flames
///
/// Every cell flickers on its own schedule. A frame lasts until the first cell needs a new
/// target, at least [MIN_FRAME_MS].
pub struct Flame {
    settings: FlameSettings,
    rng: StdRng,
    layout: FlameLayout,
    cells: Vec<FlameCell>,
    next_duration: Duration,
    last_frame: Option<Instant>,
}

impl Flame {
    pub fn new(settings: FlameSettings) -> Result<Self, StartAnimationError> {
        settings.validate()?;

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut flame = Self {
            settings,
            rng,
            layout: FlameLayout::Single,
            cells: Vec::new(),
            next_duration: Duration::from_millis(MIN_FRAME_MS as u64),
            last_frame: None,
        };
        flame.lay_out(FlameLayout::Single);
        Ok(flame)
    }

    pub fn settings(&self) -> &FlameSettings {
        &self.settings
    }

    pub fn cells(&self) -> &[FlameCell] {
        &self.cells
    }

    fn lay_out(&mut self, layout: FlameLayout) {
        let cells = match layout {
            FlameLayout::Single => vec![(1, 1)],
            FlameLayout::Strip(zones) => vec![(zones, 1)],
            FlameLayout::Canvas { width, height } => {
                let cell_width = self.settings.cell_width;
                (0..width)
                    .step_by(cell_width)
                    .map(|x| ((width - x).min(cell_width), height))
                    .collect()
            }
        };

        let rng = &mut self.rng;
        let settings = &self.settings;
        self.cells = cells
            .into_iter()
            .map(|(width, height)| FlameCell::new(width, height, &mut *rng, settings))
            .collect();
        self.layout = layout;
    }

    /// Advance the simulation by `elapsed_ms` and render the result
    pub fn advance(&mut self, elapsed_ms: f64) -> Frame {
        let rng = &mut self.rng;
        let settings = &self.settings;

        let next = self
            .cells
            .iter_mut()
            .map(|cell| cell.add_time(elapsed_ms, &mut *rng, settings))
            .fold(f64::INFINITY, f64::min)
            .clamp(MIN_FRAME_MS, TARGET_MS_MAX);

        self.next_duration = Duration::from_secs_f64(next / 1000.);
        self.render()
    }

    fn render(&self) -> Frame {
        let settings = &self.settings;

        match self.layout {
            FlameLayout::Single => Frame::Color(
                self.cells
                    .first()
                    .map(|cell| cell.color(0, 0, settings))
                    .unwrap_or(settings.background),
            ),
            FlameLayout::Strip(zones) => Frame::Zones(ZoneColors::exact(
                (0..zones)
                    .map(|zone| {
                        self.cells
                            .first()
                            .map(|cell| cell.color(zone, 0, settings))
                            .unwrap_or(settings.background)
                    })
                    .collect(),
            )),
            FlameLayout::Canvas { width, height } => {
                let cell_width = settings.cell_width;
                let canvas: Vec<Color> = (0..height)
                    .flat_map(|y| (0..width).map(move |x| (x, y)))
                    .map(|(x, y)| match self.cells.get(x / cell_width) {
                        Some(cell) => cell.color(x % cell_width, y, settings),
                        None => settings.background,
                    })
                    .collect();

                let canvas = Arc::new(canvas);
                Frame::Pixels(PixelColors::computed(move |x, y, w, h| {
                    let x = (x * width / w.max(1)).min(width - 1);
                    let y = (y * height / h.max(1)).min(height - 1);
                    canvas[y * width + x]
                }))
            }
        }
    }
}

impl AnimationDefinition for Flame {
    fn frame(&mut self, _n: u64) -> Option<Frame> {
        let now = Instant::now();
        let elapsed = self
            .last_frame
            .replace(now)
            .map(|last| (now - last).as_secs_f64() * 1000.)
            .unwrap_or(0.);

        Some(self.advance(elapsed))
    }

    fn duration(&mut self, _n: u64) -> Duration {
        self.next_duration
    }

    fn prepare(&mut self, light: &LightInfo) -> Result<(), StartAnimationError> {
        let layout = match &light.kind {
            DeviceKind::Plain => FlameLayout::Single,
            DeviceKind::MultiZone { zone_count } => FlameLayout::Strip((*zone_count).max(1)),
            DeviceKind::TileChain(geometry) => {
                let (width, height) = geometry.canvas_size();
                if width == 0 || height == 0 {
                    return Err(StartAnimationError::Unsupported {
                        kind: light.kind.name(),
                        reason: "empty tile chain".to_owned(),
                    });
                }

                FlameLayout::Canvas { width, height }
            }
        };

        self.lay_out(layout);
        self.last_frame = None;
        Ok(())
    }
}
