//! In-process fake devices for tests

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tokio::{net::UdpSocket, task::JoinHandle};

use crate::{
    color::Color,
    geometry::TileLayout,
    protocol::{
        DeviceId, Header, Message, Packet, ZoneApply, TILE_PIXELS, ZONES_PER_PACKET,
    },
};

static NEXT_ID: AtomicU8 = AtomicU8::new(1);

/// State of a fake device, inspected and modified by tests
#[derive(Debug, Clone)]
pub struct FakeState {
    pub label: String,
    pub product: u32,
    pub power: u16,
    pub color: Color,
    pub zones: Vec<Color>,
    pub tiles: Vec<TileLayout>,
    pub pixels: Vec<Vec<Color>>,
    /// Messages received, in order
    pub received: Vec<Message>,
    /// Number of upcoming requests to ignore, simulating packet loss
    pub drop_next: usize,
    /// Ignore every request
    pub mute: bool,
    /// Only answer discovery requests, like a device going silent once found
    pub services_only: bool,
    /// Other devices announced in discovery replies, as if the broadcast had reached them too
    pub announced: Vec<(DeviceId, u16)>,
}

/// A device answering the LAN protocol on a loopback socket
pub struct FakeLight {
    pub id: DeviceId,
    pub addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    task: JoinHandle<()>,
}

impl FakeLight {
    fn base(label: &str, product: u32) -> FakeState {
        FakeState {
            label: label.to_owned(),
            product,
            power: 0,
            color: Color::OFF,
            zones: Vec::new(),
            tiles: Vec::new(),
            pixels: Vec::new(),
            received: Vec::new(),
            drop_next: 0,
            mute: false,
            services_only: false,
            announced: Vec::new(),
        }
    }

    /// Single color light
    pub async fn plain(label: &str) -> Self {
        Self::spawn(Self::base(label, 27)).await
    }

    /// Extended multizone strip
    pub async fn strip(label: &str, zone_count: usize) -> Self {
        let mut state = Self::base(label, 32);
        state.zones = vec![Color::OFF; zone_count];
        Self::spawn(state).await
    }

    /// Tile chain
    pub async fn chain(label: &str, tiles: Vec<TileLayout>) -> Self {
        let mut state = Self::base(label, 55);
        state.pixels = tiles
            .iter()
            .map(|tile| vec![Color::OFF; tile.pixel_count()])
            .collect();
        state.tiles = tiles;
        Self::spawn(state).await
    }

    pub async fn spawn(state: FakeState) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake light");
        let addr = socket.local_addr().expect("no local address");
        let id = DeviceId::from_mac([
            0xd0,
            0x73,
            0xd5,
            0x10,
            0x20,
            NEXT_ID.fetch_add(1, Ordering::Relaxed),
        ]);
        let state = Arc::new(Mutex::new(state));

        let task = tokio::spawn({
            let state = state.clone();
            async move {
                let mut buf = vec![0; 1500];
                loop {
                    let (len, from) = match socket.recv_from(&mut buf).await {
                        Ok(received) => received,
                        Err(_) => return,
                    };

                    let packet = match Packet::decode(&buf[..len]) {
                        Ok(packet) => packet,
                        Err(_) => continue,
                    };

                    if !packet.header.target.is_all() && packet.header.target != id {
                        continue;
                    }

                    let replies = {
                        let mut state = state.lock().expect("poisoned");
                        if state.mute {
                            continue;
                        }
                        if state.services_only && !matches!(packet.message, Message::GetService) {
                            continue;
                        }
                        if state.drop_next > 0 {
                            state.drop_next -= 1;
                            continue;
                        }

                        handle(&mut state, id, addr.port(), packet)
                    };

                    for packet in replies {
                        let _ = socket.send_to(&packet.encode(), from).await;
                    }
                }
            }
        });

        Self {
            id,
            addr,
            state,
            task,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("poisoned")
    }

    /// Messages received so far, excluding queries
    pub fn commands(&self) -> Vec<Message> {
        self.state()
            .received
            .iter()
            .filter(|message| {
                matches!(
                    message,
                    Message::SetPower { .. }
                        | Message::LightSetPower { .. }
                        | Message::LightSetColor { .. }
                        | Message::SetExtendedColorZones { .. }
                        | Message::Set64 { .. }
                )
            })
            .cloned()
            .collect()
    }
}

impl Drop for FakeLight {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn handle(state: &mut FakeState, id: DeviceId, port: u16, packet: Packet) -> Vec<Packet> {
    let header = Header {
        tagged: false,
        source: packet.header.source,
        target: id,
        ack_required: false,
        res_required: false,
        sequence: packet.header.sequence,
    };

    let reply = |message| Packet { header, message };
    let mut replies = Vec::new();

    if packet.header.ack_required {
        replies.push(reply(Message::Acknowledgement));
    }

    state.received.push(packet.message.clone());

    match packet.message {
        Message::GetService => {
            replies.push(reply(Message::StateService {
                service: 1,
                port: u32::from(port),
            }));
            replies.extend(state.announced.iter().map(|(other, port)| Packet {
                header: Header {
                    target: *other,
                    ..header
                },
                message: Message::StateService {
                    service: 1,
                    port: u32::from(*port),
                },
            }));
        }
        Message::GetPower => replies.push(reply(Message::StatePower { level: state.power })),
        Message::SetPower { level } | Message::LightSetPower { level, .. } => state.power = level,
        Message::GetLabel => replies.push(reply(Message::StateLabel {
            label: state.label.clone(),
        })),
        Message::GetVersion => replies.push(reply(Message::StateVersion {
            vendor: 1,
            product: state.product,
        })),
        Message::LightGet => replies.push(reply(Message::LightState {
            color: state.color,
            power: state.power,
            label: state.label.clone(),
        })),
        Message::LightSetColor { color, .. } => {
            state.color = color;
            for zone in state.zones.iter_mut() {
                *zone = color;
            }
        }
        Message::GetExtendedColorZones => {
            let count = state.zones.len();
            for (i, chunk) in state.zones.chunks(ZONES_PER_PACKET).enumerate() {
                replies.push(reply(Message::StateExtendedColorZones {
                    count: count as u16,
                    index: (i * ZONES_PER_PACKET) as u16,
                    colors: chunk.to_vec(),
                }));
            }
        }
        Message::SetExtendedColorZones {
            apply,
            index,
            colors,
            ..
        } => {
            if apply != ZoneApply::ApplyOnly {
                for (offset, color) in colors.into_iter().enumerate() {
                    if let Some(zone) = state.zones.get_mut(index as usize + offset) {
                        *zone = color;
                    }
                }
            }
        }
        Message::GetDeviceChain => replies.push(reply(Message::StateDeviceChain {
            start_index: 0,
            tiles: state.tiles.clone(),
        })),
        Message::Get64 {
            tile_index,
            x,
            y,
            width,
            ..
        } => {
            let start = y as usize * width as usize;
            let colors = state
                .pixels
                .get(tile_index as usize)
                .map(|pixels| {
                    pixels
                        .iter()
                        .skip(start)
                        .take(TILE_PIXELS)
                        .copied()
                        .collect()
                })
                .unwrap_or_default();

            replies.push(reply(Message::State64 {
                tile_index,
                x,
                y,
                width,
                colors,
            }));
        }
        Message::Set64 {
            tile_index,
            y,
            width,
            colors,
            ..
        } => {
            let start = y as usize * width as usize;
            if let Some(pixels) = state.pixels.get_mut(tile_index as usize) {
                for (offset, color) in colors.into_iter().take(TILE_PIXELS).enumerate() {
                    if let Some(pixel) = pixels.get_mut(start + offset) {
                        *pixel = color;
                    }
                }
            }
        }
        _ => {}
    }

    replies
}
