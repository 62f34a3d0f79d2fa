//! LAN protocol packets
//!
//! Every packet is a 36-byte little-endian header followed by a message-specific payload.

use std::{fmt, str::FromStr};

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::{
    color::Color,
    geometry::{Orientation, TileLayout},
};

mod message;
pub use message::*;

/// Default UDP port of devices
pub const DEFAULT_PORT: u16 = 56700;

/// Size of the packet header
pub const HEADER_SIZE: usize = 36;

/// Protocol number carried by every packet
const PROTOCOL: u16 = 1024;

const ADDRESSABLE: u16 = 1 << 12;
const TAGGED: u16 = 1 << 13;
const PROTOCOL_MASK: u16 = 0x0fff;

const RES_REQUIRED: u8 = 1;
const ACK_REQUIRED: u8 = 1 << 1;

/// Number of zones carried by one extended multizone packet
pub const ZONES_PER_PACKET: usize = 82;

/// Number of pixels carried by one tile packet
pub const TILE_PIXELS: usize = 64;

/// Maximum number of tiles described by one device chain packet
pub const CHAIN_TILES: usize = 16;

const LABEL_SIZE: usize = 32;

/// Size of one tile description in a device chain payload
const TILE_SIZE: usize = 55;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("packet too short: {actual} bytes, expected at least {expected}")]
    Truncated { expected: usize, actual: usize },
    #[error("unsupported protocol number {0}")]
    Protocol(u16),
    #[error("payload of message {kind} too short: {actual} bytes, expected {expected}")]
    Payload {
        kind: u16,
        expected: usize,
        actual: usize,
    },
}

/// Device identity: the MAC address of the device, stored in the 6 low bytes
///
/// The all-zero identity addresses every device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const ALL: Self = Self(0);

    pub fn from_mac(mac: [u8; 6]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..6].copy_from_slice(&mac);
        Self(u64::from_le_bytes(bytes))
    }

    pub fn mac(&self) -> [u8; 6] {
        let bytes = self.0.to_le_bytes();
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[..6]);
        mac
    }

    pub fn is_all(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mac = self.mac();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }
}

#[derive(Debug, Error)]
#[error("invalid device id '{0}', expected a MAC address")]
pub struct ParseDeviceIdError(String);

impl FromStr for DeviceId {
    type Err = ParseDeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(ParseDeviceIdError(s.to_owned()));
        }

        let mut mac = [0u8; 6];
        for (byte, part) in mac.iter_mut().zip(parts) {
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseDeviceIdError(s.to_owned()))?;
        }

        Ok(Self::from_mac(mac))
    }
}

/// Packet header fields that matter for correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Sent to all devices
    pub tagged: bool,
    /// Client identifier, echoed by devices
    pub source: u32,
    pub target: DeviceId,
    pub ack_required: bool,
    pub res_required: bool,
    /// Request sequence number, echoed by devices
    pub sequence: u8,
}

/// A complete packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub message: Message,
}

impl Packet {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::new();
        self.message.encode_payload(&mut payload);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());

        // Frame
        buf.put_u16_le((HEADER_SIZE + payload.len()) as u16);
        let mut protocol = PROTOCOL | ADDRESSABLE;
        if self.header.tagged {
            protocol |= TAGGED;
        }
        buf.put_u16_le(protocol);
        buf.put_u32_le(self.header.source);

        // Frame address
        buf.put_u64_le(self.header.target.0);
        buf.put_bytes(0, 6);
        let mut flags = 0;
        if self.header.res_required {
            flags |= RES_REQUIRED;
        }
        if self.header.ack_required {
            flags |= ACK_REQUIRED;
        }
        buf.put_u8(flags);
        buf.put_u8(self.header.sequence);

        // Protocol header
        buf.put_u64_le(0);
        buf.put_u16_le(self.message.kind());
        buf.put_u16_le(0);

        buf.extend_from_slice(&payload);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_SIZE {
            return Err(CodecError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let mut buf = data;
        let size = buf.get_u16_le() as usize;
        if size < HEADER_SIZE || size > data.len() {
            return Err(CodecError::Truncated {
                expected: size.max(HEADER_SIZE),
                actual: data.len(),
            });
        }

        let protocol = buf.get_u16_le();
        if protocol & PROTOCOL_MASK != PROTOCOL {
            return Err(CodecError::Protocol(protocol & PROTOCOL_MASK));
        }

        let source = buf.get_u32_le();
        let target = DeviceId(buf.get_u64_le() & 0xffff_ffff_ffff);
        buf.advance(6);
        let flags = buf.get_u8();
        let sequence = buf.get_u8();
        buf.advance(8);
        let kind = buf.get_u16_le();
        buf.advance(2);

        let header = Header {
            tagged: protocol & TAGGED != 0,
            source,
            target,
            ack_required: flags & ACK_REQUIRED != 0,
            res_required: flags & RES_REQUIRED != 0,
            sequence,
        };

        let message = Message::decode_payload(kind, &data[HEADER_SIZE..size])?;

        Ok(Self { header, message })
    }
}

fn put_color(buf: &mut BytesMut, color: &Color) {
    buf.put_u16_le(color.hue);
    buf.put_u16_le(color.saturation);
    buf.put_u16_le(color.brightness);
    buf.put_u16_le(color.kelvin);
}

fn get_color(buf: &mut &[u8]) -> Color {
    Color::new(
        buf.get_u16_le(),
        buf.get_u16_le(),
        buf.get_u16_le(),
        buf.get_u16_le(),
    )
}

/// Write `count` colors, padding with [Color::OFF] when `colors` is shorter
fn put_colors(buf: &mut BytesMut, colors: &[Color], count: usize) {
    for i in 0..count {
        put_color(buf, colors.get(i).unwrap_or(&Color::OFF));
    }
}

fn put_label(buf: &mut BytesMut, label: &str) {
    let mut bytes = [0u8; LABEL_SIZE];
    let mut len = label.len().min(LABEL_SIZE);
    // Do not cut a character in half
    while !label.is_char_boundary(len) {
        len -= 1;
    }
    bytes[..len].copy_from_slice(&label.as_bytes()[..len]);
    buf.put_slice(&bytes);
}

fn get_label(buf: &mut &[u8]) -> String {
    let bytes = &buf[..LABEL_SIZE];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(LABEL_SIZE);
    let label = String::from_utf8_lossy(&bytes[..end]).into_owned();
    buf.advance(LABEL_SIZE);
    label
}

fn put_tile(buf: &mut BytesMut, tile: &TileLayout) {
    // Accelerometer readings matching the orientation
    let (x, y, z): (i16, i16, i16) = match tile.orientation {
        Orientation::RightSideUp => (0, -100, 0),
        Orientation::UpsideDown => (0, 100, 0),
        Orientation::RotatedLeft => (-100, 0, 0),
        Orientation::RotatedRight => (100, 0, 0),
        Orientation::FaceUp => (0, 0, -100),
        Orientation::FaceDown => (0, 0, 100),
    };

    buf.put_i16_le(x);
    buf.put_i16_le(y);
    buf.put_i16_le(z);
    buf.put_i16_le(0);
    buf.put_f32_le(tile.user_x);
    buf.put_f32_le(tile.user_y);
    buf.put_u8(tile.width);
    buf.put_u8(tile.height);
    // Reserved, vendor, product, reserved, firmware build, reserved, firmware version, reserved
    buf.put_bytes(0, 1 + 4 + 4 + 4 + 8 + 8 + 2 + 2 + 4);
}

fn get_tile(buf: &mut &[u8]) -> TileLayout {
    let x = buf.get_i16_le();
    let y = buf.get_i16_le();
    let z = buf.get_i16_le();
    buf.advance(2);
    let user_x = buf.get_f32_le();
    let user_y = buf.get_f32_le();
    let width = buf.get_u8();
    let height = buf.get_u8();
    buf.advance(1 + 4 + 4 + 4 + 8 + 8 + 2 + 2 + 4);

    TileLayout {
        user_x,
        user_y,
        width,
        height,
        orientation: Orientation::from_accelerometer(x, y, z),
    }
}
