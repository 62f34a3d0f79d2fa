use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use super::{
    CycleAnimation, Flame, FlameSettings, MoveDirection, MultizoneMove, TileWave, WaveDirection,
    WaveShape,
};
use crate::{
    animation::{AnimationDefinition, AnimationOptions, StartAnimationError},
    color::Color,
    generators::ZoneColors,
};

fn default_step_ms() -> u64 {
    1000
}

fn default_cycle_count() -> u32 {
    1
}

fn default_stretch() -> f64 {
    1.
}

fn default_radius_factor() -> f64 {
    1.
}

fn default_spacing() -> f64 {
    4.
}

/// Description of an animation, as found in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimationSpec {
    Cycle {
        colors: Vec<Color>,
        #[serde(default = "default_step_ms")]
        step_ms: u64,
        /// Passes through the colors, 0 to loop forever
        #[serde(default = "default_cycle_count")]
        cycle_count: u32,
    },
    Move {
        colors: ZoneColors,
        #[serde(default = "default_stretch")]
        stretch: f64,
        direction: MoveDirection,
        #[serde(default = "default_step_ms")]
        step_ms: u64,
    },
    Wave {
        colors: Vec<Color>,
        shape: WaveShape,
        direction: WaveDirection,
        #[serde(default = "default_radius_factor")]
        radius_factor: f64,
        #[serde(default = "default_spacing")]
        spacing: f64,
        #[serde(default = "default_step_ms")]
        step_ms: u64,
    },
    Flame(FlameSettings),
}

impl AnimationSpec {
    pub fn build(&self) -> Result<Box<dyn AnimationDefinition>, StartAnimationError> {
        Ok(match self {
            Self::Cycle {
                colors,
                step_ms,
                cycle_count,
            } => Box::new(CycleAnimation::new(
                colors.iter().copied(),
                Duration::from_millis(*step_ms),
                *cycle_count,
            )),
            Self::Move {
                colors,
                stretch,
                direction,
                step_ms,
            } => Box::new(MultizoneMove::new(
                colors.clone(),
                *stretch,
                *direction,
                Duration::from_millis(*step_ms),
            )?),
            Self::Wave {
                colors,
                shape,
                direction,
                radius_factor,
                spacing,
                step_ms,
            } => Box::new(TileWave::new(
                colors.clone(),
                *shape,
                *direction,
                *radius_factor,
                *spacing,
                Duration::from_millis(*step_ms),
            )?),
            Self::Flame(settings) => Box::new(Flame::new(settings.clone())?),
        })
    }
}

/// Named animation with what to show once it ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(flatten)]
    pub animation: AnimationSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_color: Option<Color>,
    #[serde(default)]
    pub end_transition_ms: u64,
}

impl AnimationConfig {
    pub fn options(&self) -> AnimationOptions {
        match self.end_color {
            Some(color) => AnimationOptions::default()
                .with_end_color(color, Duration::from_millis(self.end_transition_ms)),
            None => AnimationOptions::default(),
        }
    }
}
