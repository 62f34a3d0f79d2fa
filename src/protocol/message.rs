use bytes::{Buf, BufMut, BytesMut};

use super::*;

/// How a device handles the zone colors of a [Message::SetExtendedColorZones]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneApply {
    /// Buffer the colors without displaying them
    NoApply,
    /// Display the colors along with any buffered ones
    Apply,
    /// Display buffered colors, ignoring the colors of this message
    ApplyOnly,
}

impl ZoneApply {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NoApply,
            2 => Self::ApplyOnly,
            _ => Self::Apply,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::NoApply => 0,
            Self::Apply => 1,
            Self::ApplyOnly => 2,
        }
    }
}

/// Messages of the LAN protocol
///
/// Reserved fields are omitted, they are written as zeroes.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    GetService,
    StateService {
        service: u8,
        port: u32,
    },
    GetPower,
    SetPower {
        level: u16,
    },
    StatePower {
        level: u16,
    },
    GetLabel,
    StateLabel {
        label: String,
    },
    GetVersion,
    StateVersion {
        vendor: u32,
        product: u32,
    },
    Acknowledgement,
    LightGet,
    LightSetColor {
        color: Color,
        /// Transition time, in milliseconds
        duration: u32,
    },
    LightState {
        color: Color,
        power: u16,
        label: String,
    },
    LightSetPower {
        level: u16,
        duration: u32,
    },
    SetExtendedColorZones {
        duration: u32,
        apply: ZoneApply,
        index: u16,
        /// At most [ZONES_PER_PACKET] colors
        colors: Vec<Color>,
    },
    GetExtendedColorZones,
    StateExtendedColorZones {
        /// Total number of zones on the device
        count: u16,
        index: u16,
        colors: Vec<Color>,
    },
    GetDeviceChain,
    StateDeviceChain {
        start_index: u8,
        tiles: Vec<TileLayout>,
    },
    Get64 {
        tile_index: u8,
        length: u8,
        x: u8,
        y: u8,
        width: u8,
    },
    State64 {
        tile_index: u8,
        x: u8,
        y: u8,
        width: u8,
        colors: Vec<Color>,
    },
    Set64 {
        tile_index: u8,
        length: u8,
        x: u8,
        y: u8,
        width: u8,
        duration: u32,
        /// At most [TILE_PIXELS] colors
        colors: Vec<Color>,
    },
    /// Message this crate does not know about
    Unknown {
        kind: u16,
    },
}

pub mod kind {
    pub const GET_SERVICE: u16 = 2;
    pub const STATE_SERVICE: u16 = 3;
    pub const GET_POWER: u16 = 20;
    pub const SET_POWER: u16 = 21;
    pub const STATE_POWER: u16 = 22;
    pub const GET_LABEL: u16 = 23;
    pub const STATE_LABEL: u16 = 25;
    pub const GET_VERSION: u16 = 32;
    pub const STATE_VERSION: u16 = 33;
    pub const ACKNOWLEDGEMENT: u16 = 45;
    pub const LIGHT_GET: u16 = 101;
    pub const LIGHT_SET_COLOR: u16 = 102;
    pub const LIGHT_STATE: u16 = 107;
    pub const LIGHT_SET_POWER: u16 = 117;
    pub const SET_EXTENDED_COLOR_ZONES: u16 = 510;
    pub const GET_EXTENDED_COLOR_ZONES: u16 = 511;
    pub const STATE_EXTENDED_COLOR_ZONES: u16 = 512;
    pub const GET_DEVICE_CHAIN: u16 = 701;
    pub const STATE_DEVICE_CHAIN: u16 = 702;
    pub const GET_64: u16 = 707;
    pub const STATE_64: u16 = 711;
    pub const SET_64: u16 = 715;
}

impl Message {
    /// Numeric message type
    pub fn kind(&self) -> u16 {
        match self {
            Self::GetService => kind::GET_SERVICE,
            Self::StateService { .. } => kind::STATE_SERVICE,
            Self::GetPower => kind::GET_POWER,
            Self::SetPower { .. } => kind::SET_POWER,
            Self::StatePower { .. } => kind::STATE_POWER,
            Self::GetLabel => kind::GET_LABEL,
            Self::StateLabel { .. } => kind::STATE_LABEL,
            Self::GetVersion => kind::GET_VERSION,
            Self::StateVersion { .. } => kind::STATE_VERSION,
            Self::Acknowledgement => kind::ACKNOWLEDGEMENT,
            Self::LightGet => kind::LIGHT_GET,
            Self::LightSetColor { .. } => kind::LIGHT_SET_COLOR,
            Self::LightState { .. } => kind::LIGHT_STATE,
            Self::LightSetPower { .. } => kind::LIGHT_SET_POWER,
            Self::SetExtendedColorZones { .. } => kind::SET_EXTENDED_COLOR_ZONES,
            Self::GetExtendedColorZones => kind::GET_EXTENDED_COLOR_ZONES,
            Self::StateExtendedColorZones { .. } => kind::STATE_EXTENDED_COLOR_ZONES,
            Self::GetDeviceChain => kind::GET_DEVICE_CHAIN,
            Self::StateDeviceChain { .. } => kind::STATE_DEVICE_CHAIN,
            Self::Get64 { .. } => kind::GET_64,
            Self::State64 { .. } => kind::STATE_64,
            Self::Set64 { .. } => kind::SET_64,
            Self::Unknown { kind } => *kind,
        }
    }

    /// Which part of a multi-packet reply this message is
    ///
    /// Replies of the same device to the same request are distinct when their part differs.
    pub fn part_index(&self) -> u32 {
        match self {
            Self::StateService { service, .. } => u32::from(*service),
            Self::StateExtendedColorZones { index, .. } => u32::from(*index),
            Self::StateDeviceChain { start_index, .. } => u32::from(*start_index),
            Self::State64 { tile_index, .. } => u32::from(*tile_index),
            _ => 0,
        }
    }

    pub(super) fn encode_payload(&self, buf: &mut BytesMut) {
        match self {
            Self::GetService
            | Self::GetPower
            | Self::GetLabel
            | Self::GetVersion
            | Self::Acknowledgement
            | Self::LightGet
            | Self::GetExtendedColorZones
            | Self::GetDeviceChain
            | Self::Unknown { .. } => {}
            Self::StateService { service, port } => {
                buf.put_u8(*service);
                buf.put_u32_le(*port);
            }
            Self::SetPower { level } | Self::StatePower { level } => {
                buf.put_u16_le(*level);
            }
            Self::StateLabel { label } => {
                put_label(buf, label);
            }
            Self::StateVersion { vendor, product } => {
                buf.put_u32_le(*vendor);
                buf.put_u32_le(*product);
                buf.put_u32_le(0);
            }
            Self::LightSetColor { color, duration } => {
                buf.put_u8(0);
                put_color(buf, color);
                buf.put_u32_le(*duration);
            }
            Self::LightState {
                color,
                power,
                label,
            } => {
                put_color(buf, color);
                buf.put_i16_le(0);
                buf.put_u16_le(*power);
                put_label(buf, label);
                buf.put_u64_le(0);
            }
            Self::LightSetPower { level, duration } => {
                buf.put_u16_le(*level);
                buf.put_u32_le(*duration);
            }
            Self::SetExtendedColorZones {
                duration,
                apply,
                index,
                colors,
            } => {
                buf.put_u32_le(*duration);
                buf.put_u8(apply.to_u8());
                buf.put_u16_le(*index);
                buf.put_u8(colors.len().min(ZONES_PER_PACKET) as u8);
                put_colors(buf, colors, ZONES_PER_PACKET);
            }
            Self::StateExtendedColorZones {
                count,
                index,
                colors,
            } => {
                buf.put_u16_le(*count);
                buf.put_u16_le(*index);
                buf.put_u8(colors.len().min(ZONES_PER_PACKET) as u8);
                put_colors(buf, colors, ZONES_PER_PACKET);
            }
            Self::StateDeviceChain { start_index, tiles } => {
                buf.put_u8(*start_index);
                for i in 0..CHAIN_TILES {
                    match tiles.get(i) {
                        Some(tile) => put_tile(buf, tile),
                        None => buf.put_bytes(0, TILE_SIZE),
                    }
                }
                buf.put_u8(tiles.len().min(CHAIN_TILES) as u8);
            }
            Self::Get64 {
                tile_index,
                length,
                x,
                y,
                width,
            } => {
                buf.put_u8(*tile_index);
                buf.put_u8(*length);
                buf.put_u8(0);
                buf.put_u8(*x);
                buf.put_u8(*y);
                buf.put_u8(*width);
            }
            Self::State64 {
                tile_index,
                x,
                y,
                width,
                colors,
            } => {
                buf.put_u8(*tile_index);
                buf.put_u8(0);
                buf.put_u8(*x);
                buf.put_u8(*y);
                buf.put_u8(*width);
                put_colors(buf, colors, TILE_PIXELS);
            }
            Self::Set64 {
                tile_index,
                length,
                x,
                y,
                width,
                duration,
                colors,
            } => {
                buf.put_u8(*tile_index);
                buf.put_u8(*length);
                buf.put_u8(0);
                buf.put_u8(*x);
                buf.put_u8(*y);
                buf.put_u8(*width);
                buf.put_u32_le(*duration);
                put_colors(buf, colors, TILE_PIXELS);
            }
        }
    }

    pub(super) fn decode_payload(kind: u16, payload: &[u8]) -> Result<Self, CodecError> {
        let check = |expected: usize| {
            if payload.len() < expected {
                Err(CodecError::Payload {
                    kind,
                    expected,
                    actual: payload.len(),
                })
            } else {
                Ok(payload)
            }
        };

        Ok(match kind {
            kind::GET_SERVICE => Self::GetService,
            kind::STATE_SERVICE => {
                let mut buf = check(5)?;
                Self::StateService {
                    service: buf.get_u8(),
                    port: buf.get_u32_le(),
                }
            }
            kind::GET_POWER => Self::GetPower,
            kind::SET_POWER => Self::SetPower {
                level: check(2)?.get_u16_le(),
            },
            kind::STATE_POWER => Self::StatePower {
                level: check(2)?.get_u16_le(),
            },
            kind::GET_LABEL => Self::GetLabel,
            kind::STATE_LABEL => Self::StateLabel {
                label: get_label(&mut check(LABEL_SIZE)?),
            },
            kind::GET_VERSION => Self::GetVersion,
            kind::STATE_VERSION => {
                let mut buf = check(12)?;
                Self::StateVersion {
                    vendor: buf.get_u32_le(),
                    product: buf.get_u32_le(),
                }
            }
            kind::ACKNOWLEDGEMENT => Self::Acknowledgement,
            kind::LIGHT_GET => Self::LightGet,
            kind::LIGHT_SET_COLOR => {
                let mut buf = check(13)?;
                buf.advance(1);
                Self::LightSetColor {
                    color: get_color(&mut buf),
                    duration: buf.get_u32_le(),
                }
            }
            kind::LIGHT_STATE => {
                let mut buf = check(52)?;
                let color = get_color(&mut buf);
                buf.advance(2);
                let power = buf.get_u16_le();
                let label = get_label(&mut buf);
                Self::LightState {
                    color,
                    power,
                    label,
                }
            }
            kind::LIGHT_SET_POWER => {
                let mut buf = check(6)?;
                Self::LightSetPower {
                    level: buf.get_u16_le(),
                    duration: buf.get_u32_le(),
                }
            }
            kind::SET_EXTENDED_COLOR_ZONES => {
                let mut buf = check(8 + ZONES_PER_PACKET * 8)?;
                let duration = buf.get_u32_le();
                let apply = ZoneApply::from_u8(buf.get_u8());
                let index = buf.get_u16_le();
                let count = (buf.get_u8() as usize).min(ZONES_PER_PACKET);
                Self::SetExtendedColorZones {
                    duration,
                    apply,
                    index,
                    colors: (0..count).map(|_| get_color(&mut buf)).collect(),
                }
            }
            kind::GET_EXTENDED_COLOR_ZONES => Self::GetExtendedColorZones,
            kind::STATE_EXTENDED_COLOR_ZONES => {
                let mut buf = check(5 + ZONES_PER_PACKET * 8)?;
                let count = buf.get_u16_le();
                let index = buf.get_u16_le();
                let colors_count = (buf.get_u8() as usize).min(ZONES_PER_PACKET);
                Self::StateExtendedColorZones {
                    count,
                    index,
                    colors: (0..colors_count).map(|_| get_color(&mut buf)).collect(),
                }
            }
            kind::GET_DEVICE_CHAIN => Self::GetDeviceChain,
            kind::STATE_DEVICE_CHAIN => {
                let mut buf = check(2 + CHAIN_TILES * TILE_SIZE)?;
                let start_index = buf.get_u8();
                let mut tiles: Vec<_> = (0..CHAIN_TILES).map(|_| get_tile(&mut buf)).collect();
                tiles.truncate(buf.get_u8() as usize);
                Self::StateDeviceChain { start_index, tiles }
            }
            kind::GET_64 => {
                let mut buf = check(6)?;
                let tile_index = buf.get_u8();
                let length = buf.get_u8();
                buf.advance(1);
                Self::Get64 {
                    tile_index,
                    length,
                    x: buf.get_u8(),
                    y: buf.get_u8(),
                    width: buf.get_u8(),
                }
            }
            kind::STATE_64 => {
                let mut buf = check(5 + TILE_PIXELS * 8)?;
                let tile_index = buf.get_u8();
                buf.advance(1);
                Self::State64 {
                    tile_index,
                    x: buf.get_u8(),
                    y: buf.get_u8(),
                    width: buf.get_u8(),
                    colors: (0..TILE_PIXELS).map(|_| get_color(&mut buf)).collect(),
                }
            }
            kind::SET_64 => {
                let mut buf = check(10 + TILE_PIXELS * 8)?;
                let tile_index = buf.get_u8();
                let length = buf.get_u8();
                buf.advance(1);
                Self::Set64 {
                    tile_index,
                    length,
                    x: buf.get_u8(),
                    y: buf.get_u8(),
                    width: buf.get_u8(),
                    duration: buf.get_u32_le(),
                    colors: (0..TILE_PIXELS).map(|_| get_color(&mut buf)).collect(),
                }
            }
            other => Self::Unknown { kind: other },
        })
    }
}
