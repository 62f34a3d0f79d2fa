use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    animation::{AnimationDefinition, Frame, StartAnimationError},
    device::{DeviceKind, LightInfo},
    generators::ZoneColors,
};

#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MoveDirection {
    /// Towards higher zones
    Forward,
    /// Towards zone 0
    Backward,
    /// From both ends towards the middle
    Inward,
    /// From the middle towards both ends
    Outward,
}

/// Scrolls a zone pattern along a strip, one zone per step
#[derive(Debug, Clone, PartialEq)]
pub struct MultizoneMove {
    colors: ZoneColors,
    direction: MoveDirection,
    step: Duration,
}

impl MultizoneMove {
    /// The pattern is stretched by `stretch` once, shifts then happen in device zones
    pub fn new(
        colors: ZoneColors,
        stretch: f64,
        direction: MoveDirection,
        step: Duration,
    ) -> Result<Self, StartAnimationError> {
        if !stretch.is_finite() || stretch <= 0. {
            return Err(StartAnimationError::Invalid(format!(
                "stretch must be positive, got {}",
                stretch
            )));
        }

        Ok(Self {
            colors: colors.stretch(stretch),
            direction,
            step,
        })
    }
}

impl AnimationDefinition for MultizoneMove {
    fn frame(&mut self, n: u64) -> Option<Frame> {
        let n = (n % i64::MAX as u64) as i64;
        let shift = match self.direction {
            MoveDirection::Forward | MoveDirection::Outward => n,
            MoveDirection::Backward | MoveDirection::Inward => -n,
        };

        let shifted = self.colors.clone().shift(shift);

        Some(Frame::Zones(match self.direction {
            MoveDirection::Forward | MoveDirection::Backward => shifted,
            MoveDirection::Inward | MoveDirection::Outward => shifted.clone().mirror().split(shifted),
        }))
    }

    fn duration(&mut self, _n: u64) -> Duration {
        self.step
    }

    fn prepare(&mut self, light: &LightInfo) -> Result<(), StartAnimationError> {
        match light.kind {
            DeviceKind::MultiZone { .. } => Ok(()),
            _ => Err(StartAnimationError::Unsupported {
                kind: light.kind.name(),
                reason: "moving patterns need a zone strip".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use super::*;
    use crate::{color::Color, geometry::TileChainGeometry, protocol::DeviceId};

    fn zones(frame: Option<Frame>, count: usize) -> Vec<Color> {
        match frame {
            Some(Frame::Zones(zones)) => zones.colors(count),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn forward_moves_one_zone_per_step() {
        let colors = ZoneColors::exact(vec![Color::RED, Color::OFF, Color::OFF, Color::OFF]);
        let mut animation =
            MultizoneMove::new(colors, 1., MoveDirection::Forward, Duration::from_millis(50))
                .expect("invalid animation");

        assert_eq!(zones(animation.frame(0), 4)[0], Color::RED);
        assert_eq!(zones(animation.frame(1), 4)[1], Color::RED);
        assert_eq!(zones(animation.frame(5), 4)[1], Color::RED);

        let mut backward =
            MultizoneMove::new(
                ZoneColors::exact(vec![Color::RED, Color::OFF, Color::OFF, Color::OFF]),
                1.,
                MoveDirection::Backward,
                Duration::from_millis(50),
            )
            .expect("invalid animation");
        assert_eq!(zones(backward.frame(1), 4)[3], Color::RED);
    }

    #[test]
    fn stretch_is_bound_before_shifting() {
        let colors = ZoneColors::interpolated(true, vec![Color::RED, Color::BLUE]);
        let mut animation =
            MultizoneMove::new(colors.clone(), 2., MoveDirection::Forward, Duration::ZERO)
                .expect("invalid animation");

        // One step moves the stretched pattern by exactly one zone
        let expected = colors.stretch(2.).shift(1).colors(8);
        assert_eq!(zones(animation.frame(1), 8), expected);
    }

    #[test]
    fn outward_is_symmetric() {
        let colors = ZoneColors::exact(vec![Color::RED, Color::GREEN, Color::BLUE]);
        let mut animation =
            MultizoneMove::new(colors, 1., MoveDirection::Outward, Duration::ZERO)
                .expect("invalid animation");

        for n in 0..5 {
            let frame = zones(animation.frame(n), 8);
            let mut reversed = frame.clone();
            reversed.reverse();
            assert_eq!(frame, reversed);
        }
    }

    #[test]
    fn only_zone_strips_are_accepted() {
        let info = |kind| LightInfo {
            id: DeviceId::from_mac([0xd0, 0x73, 0xd5, 0, 0, 1]),
            address: SocketAddr::from(([127, 0, 0, 1], 56700)),
            label: "Strip".to_owned(),
            vendor: 1,
            product: 32,
            kind,
        };
        let mut animation = MultizoneMove::new(
            ZoneColors::fixed(Color::RED),
            1.,
            MoveDirection::Forward,
            Duration::from_millis(50),
        )
        .expect("invalid animation");

        assert!(animation
            .prepare(&info(DeviceKind::MultiZone { zone_count: 16 }))
            .is_ok());
        assert!(matches!(
            animation.prepare(&info(DeviceKind::Plain)),
            Err(StartAnimationError::Unsupported { kind: "plain", .. })
        ));
        assert!(matches!(
            animation.prepare(&info(DeviceKind::TileChain(Arc::new(
                TileChainGeometry::single(8, 8)
            )))),
            Err(StartAnimationError::Unsupported { .. })
        ));
    }

    #[test]
    fn rejects_invalid_stretch() {
        for stretch in &[0., -1., f64::NAN] {
            assert!(MultizoneMove::new(
                ZoneColors::fixed(Color::RED),
                *stretch,
                MoveDirection::Forward,
                Duration::ZERO
            )
            .is_err());
        }
    }
}
