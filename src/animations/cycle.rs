use std::time::Duration;

use crate::animation::{AnimationDefinition, Frame};

/// Cycles through a list of frames, each displayed for the same time
#[derive(Debug, Clone, PartialEq)]
pub struct CycleAnimation {
    frames: Vec<Frame>,
    step: Duration,
    /// Number of passes through the list, 0 for no limit
    cycle_count: u32,
}

impl CycleAnimation {
    pub fn new<I>(frames: I, step: Duration, cycle_count: u32) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Frame>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            step,
            cycle_count,
        }
    }
}

impl AnimationDefinition for CycleAnimation {
    fn frame(&mut self, n: u64) -> Option<Frame> {
        let len = self.frames.len() as u64;
        if len == 0 {
            return None;
        }

        if self.cycle_count > 0 && n >= len.saturating_mul(u64::from(self.cycle_count)) {
            return None;
        }

        self.frames.get((n % len) as usize).cloned()
    }

    fn duration(&mut self, _n: u64) -> Duration {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    fn colors() -> Vec<Color> {
        vec![Color::RED, Color::GREEN, Color::BLUE]
    }

    #[test]
    fn single_cycle_ends_after_the_last_color() {
        let mut animation = CycleAnimation::new(colors(), Duration::from_millis(100), 1);

        for (n, color) in colors().into_iter().enumerate() {
            assert_eq!(animation.frame(n as u64), Some(Frame::Color(color)));
        }
        assert_eq!(animation.frame(3), None);
    }

    #[test]
    fn cycle_count_bounds_the_passes() {
        let mut animation = CycleAnimation::new(colors(), Duration::from_millis(100), 2);

        assert_eq!(animation.frame(4), Some(Frame::Color(Color::GREEN)));
        assert_eq!(animation.frame(5), Some(Frame::Color(Color::BLUE)));
        assert_eq!(animation.frame(6), None);
    }

    #[test]
    fn zero_cycle_count_never_ends() {
        let mut animation = CycleAnimation::new(colors(), Duration::from_millis(100), 0);

        assert_eq!(animation.frame(3_000_001), Some(Frame::Color(Color::GREEN)));
        assert_eq!(animation.duration(7), Duration::from_millis(100));
    }

    #[test]
    fn empty_list_ends_immediately() {
        let mut animation = CycleAnimation::new(Vec::<Color>::new(), Duration::from_millis(100), 0);
        assert_eq!(animation.frame(0), None);
    }
}
