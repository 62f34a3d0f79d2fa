//! Devices reachable over the LAN protocol
//!
//! A [Light] is a cheap, clonable handle to one device. What the device can display is described by
//! its [DeviceKind], which selects how a [Frame] is sent to it.

use std::{fmt, io, net::SocketAddr, sync::Arc, time::Duration};

use strum_macros::IntoStaticStr;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    color::Color,
    geometry::{TileChainGeometry, TileLayout},
    protocol::{
        kind, DeviceId, Message, ZoneApply, CHAIN_TILES, DEFAULT_PORT, TILE_PIXELS,
        ZONES_PER_PACKET,
    },
    retry::{execute, ExpectedResponses, RetryError, RetrySettings},
    transport::{Response, UdpTransport},
};

mod discovery;
pub use discovery::*;

mod frame;
pub use frame::*;

pub mod products;


#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("transport failure after {received} response(s): {source}")]
    Transport { source: io::Error, received: usize },
    #[error("no reply from {0}")]
    Timeout(String),
    #[error("unexpected reply from {address}: message type {kind}")]
    UnexpectedReply { address: SocketAddr, kind: u16 },
    #[error("{operation} is not supported by {kind} devices")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },
}

impl<R> From<RetryError<R>> for DeviceError {
    fn from(error: RetryError<R>) -> Self {
        Self::Transport {
            source: error.source,
            received: error.partial.len(),
        }
    }
}

/// Geometry of a device
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    /// One color for the whole device
    Plain,
    /// Linear strip of zones
    MultiZone { zone_count: usize },
    /// Chain of pixel matrices
    TileChain(Arc<TileChainGeometry>),
}

impl DeviceKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Static description of a device
#[derive(Debug, Clone, PartialEq)]
pub struct LightInfo {
    pub id: DeviceId,
    pub address: SocketAddr,
    pub label: String,
    pub vendor: u32,
    pub product: u32,
    pub kind: DeviceKind,
}

impl LightInfo {
    pub fn product_name(&self) -> Option<&'static str> {
        products::lookup(self.vendor, self.product).map(|product| product.name)
    }
}

impl fmt::Display for LightInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}", self.id, self.address, self.kind.name())?;
        if let Some(name) = self.product_name() {
            write!(f, ", {}", name)?;
        }
        if !self.label.is_empty() {
            write!(f, ", \"{}\"", self.label)?;
        }
        write!(f, ")")
    }
}

/// Options for connecting to devices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectOptions {
    /// Local address the device sockets are bound to
    pub bind: SocketAddr,
    pub retry: RetrySettings,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            retry: RetrySettings::default(),
        }
    }
}

/// Socket dedicated to one device
#[derive(Debug)]
struct Connection {
    transport: Mutex<UdpTransport>,
    retry: RetrySettings,
}

impl Connection {
    /// Send `message` to `target` at `address` and wait for `expected` replies of type `reply`
    ///
    /// With no reply type, waits for an acknowledgement when `ack` is set, and only sends the
    /// message once otherwise.
    async fn exchange(
        &self,
        address: SocketAddr,
        target: DeviceId,
        message: Message,
        reply: Option<u16>,
        ack: bool,
        expected: usize,
    ) -> Result<Vec<Response>, DeviceError> {
        let mut transport = self.transport.lock().await;

        let mut request = transport.request(address, target, message);
        let expected = if let Some(reply) = reply {
            request.res_required = true;
            request = request.with_reply(reply);
            expected
        } else if ack {
            request = request.with_ack();
            1
        } else {
            0
        };

        let responses = execute(
            &mut *transport,
            &request,
            &mut self.retry.policy(ExpectedResponses::Count(expected)),
        )
        .await?;

        if responses.len() < expected {
            let who = if target.is_all() {
                address.to_string()
            } else {
                format!("{} ({})", target, address)
            };

            return Err(DeviceError::Timeout(who));
        }

        Ok(responses)
    }

    /// Send `message` and return the single reply of type `reply`
    async fn query(
        &self,
        address: SocketAddr,
        target: DeviceId,
        message: Message,
        reply: u16,
    ) -> Result<Response, DeviceError> {
        self.exchange(address, target, message, Some(reply), false, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DeviceError::Timeout(address.to_string()))
    }
}

/// Handle to a device
#[derive(Debug, Clone)]
pub struct Light {
    info: Arc<LightInfo>,
    connection: Arc<Connection>,
}

fn unexpected(response: &Response) -> DeviceError {
    DeviceError::UnexpectedReply {
        address: response.addr,
        kind: response.message.kind(),
    }
}

fn duration_ms(duration: Duration) -> u32 {
    duration.as_millis().min(u32::MAX as u128) as u32
}

impl Light {
    /// Connect to the device at `address` and query what kind of device it is
    ///
    /// When `target` is not given, any device answering at `address` is accepted. A missing port
    /// defaults to the protocol port.
    #[instrument(skip(options))]
    pub async fn connect(
        address: SocketAddr,
        target: Option<DeviceId>,
        options: &ConnectOptions,
    ) -> Result<Self, DeviceError> {
        let address = if address.port() == 0 {
            SocketAddr::new(address.ip(), DEFAULT_PORT)
        } else {
            address
        };

        let connection = Arc::new(Connection {
            transport: Mutex::new(UdpTransport::bind(options.bind).await?),
            retry: options.retry,
        });

        let info = Self::probe(&connection, address, target.unwrap_or(DeviceId::ALL)).await?;
        debug!(light = %info, "connected");

        Ok(Self {
            info: Arc::new(info),
            connection,
        })
    }

    async fn probe(
        connection: &Connection,
        address: SocketAddr,
        target: DeviceId,
    ) -> Result<LightInfo, DeviceError> {
        let response = connection
            .query(address, target, Message::GetVersion, kind::STATE_VERSION)
            .await?;

        let (vendor, product) = match &response.message {
            Message::StateVersion { vendor, product } => (*vendor, *product),
            _ => return Err(unexpected(&response)),
        };

        // Pin the device that answered
        let id = response.header.target;

        let response = connection
            .query(address, id, Message::GetLabel, kind::STATE_LABEL)
            .await?;
        let label = match response.message {
            Message::StateLabel { label } => label,
            _ => return Err(unexpected(&response)),
        };

        let features = products::lookup(vendor, product)
            .map(|product| product.features)
            .unwrap_or_default();

        let kind = if features.matrix {
            let tiles = Self::fetch_chain(connection, address, id).await?;
            DeviceKind::TileChain(Arc::new(TileChainGeometry::new(tiles)))
        } else if features.multizone {
            let response = connection
                .query(
                    address,
                    id,
                    Message::GetExtendedColorZones,
                    kind::STATE_EXTENDED_COLOR_ZONES,
                )
                .await?;

            match response.message {
                Message::StateExtendedColorZones { count, .. } => DeviceKind::MultiZone {
                    zone_count: count as usize,
                },
                _ => return Err(unexpected(&response)),
            }
        } else {
            if products::lookup(vendor, product).is_none() {
                warn!(%id, vendor, product, "unknown product, driving it as a single color light");
            }

            DeviceKind::Plain
        };

        Ok(LightInfo {
            id,
            address,
            label,
            vendor,
            product,
            kind,
        })
    }

    async fn fetch_chain(
        connection: &Connection,
        address: SocketAddr,
        id: DeviceId,
    ) -> Result<Vec<TileLayout>, DeviceError> {
        let response = connection
            .query(address, id, Message::GetDeviceChain, kind::STATE_DEVICE_CHAIN)
            .await?;

        match response.message {
            Message::StateDeviceChain { tiles, .. } if !tiles.is_empty() => {
                Ok(tiles.into_iter().take(CHAIN_TILES).collect())
            }
            _ => Err(unexpected(&response)),
        }
    }

    pub fn info(&self) -> &LightInfo {
        &self.info
    }

    pub fn id(&self) -> DeviceId {
        self.info.id
    }

    pub fn kind(&self) -> &DeviceKind {
        &self.info.kind
    }

    async fn query(&self, message: Message, reply: u16) -> Result<Response, DeviceError> {
        self.connection
            .query(self.info.address, self.info.id, message, reply)
            .await
    }

    async fn command(&self, message: Message, ack: bool) -> Result<(), DeviceError> {
        self.connection
            .exchange(self.info.address, self.info.id, message, None, ack, 0)
            .await
            .map(|_| ())
    }

    fn unsupported(&self, operation: &'static str) -> DeviceError {
        DeviceError::Unsupported {
            operation,
            kind: self.info.kind.name(),
        }
    }

    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn get_power(&self) -> Result<bool, DeviceError> {
        let response = self.query(Message::GetPower, kind::STATE_POWER).await?;
        match response.message {
            Message::StatePower { level } => Ok(level > 0),
            _ => Err(unexpected(&response)),
        }
    }

    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn set_power(&self, on: bool, duration: Duration, ack: bool) -> Result<(), DeviceError> {
        self.command(
            Message::LightSetPower {
                level: if on { u16::MAX } else { 0 },
                duration: duration_ms(duration),
            },
            ack,
        )
        .await
    }

    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn get_label(&self) -> Result<String, DeviceError> {
        let response = self.query(Message::GetLabel, kind::STATE_LABEL).await?;
        match response.message {
            Message::StateLabel { label } => Ok(label),
            _ => Err(unexpected(&response)),
        }
    }

    /// Current color of the device
    ///
    /// For multizone and tile devices, this is the color the device reports for itself.
    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn get_color(&self) -> Result<Color, DeviceError> {
        let response = self.query(Message::LightGet, kind::LIGHT_STATE).await?;
        match response.message {
            Message::LightState { color, .. } => Ok(color),
            _ => Err(unexpected(&response)),
        }
    }

    /// Set the same color on the whole device, fading over `duration`
    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn set_color(&self, color: Color, duration: Duration, ack: bool) -> Result<(), DeviceError> {
        self.command(
            Message::LightSetColor {
                color,
                duration: duration_ms(duration),
            },
            ack,
        )
        .await
    }

    /// Colors of all zones of a multizone device
    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn get_zone_colors(&self) -> Result<Vec<Color>, DeviceError> {
        let zone_count = match &self.info.kind {
            DeviceKind::MultiZone { zone_count } => *zone_count,
            _ => return Err(self.unsupported("reading zones")),
        };

        let packets = ((zone_count + ZONES_PER_PACKET - 1) / ZONES_PER_PACKET).max(1);
        let responses = self
            .connection
            .exchange(
                self.info.address,
                self.info.id,
                Message::GetExtendedColorZones,
                Some(kind::STATE_EXTENDED_COLOR_ZONES),
                false,
                packets,
            )
            .await?;

        let mut colors = vec![Color::OFF; zone_count];
        for response in &responses {
            match &response.message {
                Message::StateExtendedColorZones { index, colors: part, .. } => {
                    for (offset, color) in part.iter().enumerate() {
                        if let Some(zone) = colors.get_mut(*index as usize + offset) {
                            *zone = *color;
                        }
                    }
                }
                _ => return Err(unexpected(response)),
            }
        }

        Ok(colors)
    }

    /// Set the colors of a multizone device, starting at zone 0
    ///
    /// Colors are sent in packets of [ZONES_PER_PACKET] zones; only the last packet applies them.
    #[instrument(skip(self, colors), fields(id = %self.info.id, count = colors.len()))]
    pub async fn set_zone_colors(
        &self,
        colors: &[Color],
        duration: Duration,
        ack: bool,
    ) -> Result<(), DeviceError> {
        if !matches!(self.info.kind, DeviceKind::MultiZone { .. }) {
            return Err(self.unsupported("setting zones"));
        }

        let chunks: Vec<_> = colors.chunks(ZONES_PER_PACKET).collect();
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.into_iter().enumerate() {
            self.command(
                Message::SetExtendedColorZones {
                    duration: duration_ms(duration),
                    apply: if i == last {
                        ZoneApply::Apply
                    } else {
                        ZoneApply::NoApply
                    },
                    index: (i * ZONES_PER_PACKET) as u16,
                    colors: chunk.to_vec(),
                },
                ack,
            )
            .await?;
        }

        Ok(())
    }

    /// Pixel blocks covering a tile: (y offset, row count)
    fn tile_blocks(tile: &TileLayout) -> impl Iterator<Item = (usize, usize)> {
        let width = (tile.width as usize).max(1);
        let height = tile.height as usize;
        let rows = (TILE_PIXELS / width).max(1);

        (0..height)
            .step_by(rows)
            .map(move |y| (y, rows.min(height - y)))
    }

    /// Colors of every tile of a chain, in the order the tiles store their pixels
    #[instrument(skip(self), fields(id = %self.info.id))]
    pub async fn get_tile_colors(&self) -> Result<Vec<Vec<Color>>, DeviceError> {
        let geometry = match &self.info.kind {
            DeviceKind::TileChain(geometry) => geometry.clone(),
            _ => return Err(self.unsupported("reading tiles")),
        };

        let mut result = Vec::with_capacity(geometry.tiles().len());

        for (index, tile) in geometry.tiles().iter().enumerate() {
            let mut colors = Vec::with_capacity(tile.pixel_count());

            for (y, rows) in Self::tile_blocks(tile) {
                let response = self
                    .query(
                        Message::Get64 {
                            tile_index: index as u8,
                            length: 1,
                            x: 0,
                            y: y as u8,
                            width: tile.width,
                        },
                        kind::STATE_64,
                    )
                    .await?;

                match response.message {
                    Message::State64 { colors: block, .. } => {
                        colors.extend(block.into_iter().take(rows * tile.width as usize));
                    }
                    _ => return Err(unexpected(&response)),
                }
            }

            result.push(colors);
        }

        Ok(result)
    }

    /// Set the colors of every tile of a chain
    #[instrument(skip(self, colors), fields(id = %self.info.id))]
    pub async fn set_tile_colors(
        &self,
        colors: &[Vec<Color>],
        duration: Duration,
        ack: bool,
    ) -> Result<(), DeviceError> {
        let geometry = match &self.info.kind {
            DeviceKind::TileChain(geometry) => geometry.clone(),
            _ => return Err(self.unsupported("setting tiles")),
        };

        for (index, (tile, colors)) in geometry.tiles().iter().zip(colors).enumerate() {
            let width = tile.width as usize;

            for (y, rows) in Self::tile_blocks(tile) {
                let start = (y * width).min(colors.len());
                let end = ((y + rows) * width).min(colors.len());

                self.command(
                    Message::Set64 {
                        tile_index: index as u8,
                        length: 1,
                        x: 0,
                        y: y as u8,
                        width: tile.width,
                        duration: duration_ms(duration),
                        colors: colors[start..end].to_vec(),
                    },
                    ack,
                )
                .await?;
            }
        }

        Ok(())
    }

    /// Display `frame`, mapped onto the geometry of the device
    pub async fn apply_frame(&self, frame: &Frame, duration: Duration, ack: bool) -> Result<(), DeviceError> {
        match (&self.info.kind, frame) {
            // A single color is a single message on any device
            (_, Frame::Color(color)) => self.set_color(*color, duration, ack).await,
            (DeviceKind::Plain, frame) => self.set_color(frame.single_color(), duration, ack).await,
            (DeviceKind::MultiZone { zone_count }, frame) => {
                self.set_zone_colors(&frame.zone_colors(*zone_count), duration, ack)
                    .await
            }
            (DeviceKind::TileChain(geometry), frame) => {
                self.set_tile_colors(&frame.tile_colors(geometry), duration, ack)
                    .await
            }
        }
    }

    /// Highest brightness `frame` reaches on this device
    pub fn max_brightness(&self, frame: &Frame) -> u16 {
        frame.max_brightness(&self.info.kind)
    }
}
