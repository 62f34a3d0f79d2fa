//! UDP transport for the LAN protocol

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use rand::Rng;
use tokio::net::UdpSocket;

use crate::{
    protocol::{DeviceId, Header, Message, Packet},
    retry::{Correlate, Transport},
};

/// Largest datagram accepted from a device
const MAX_DATAGRAM: usize = 1500;

/// A request, ready to be sent (and retransmitted) as-is
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Address the datagram is sent to
    pub destination: SocketAddr,
    /// Device the request is meant for, [DeviceId::ALL] to address any device
    pub target: DeviceId,
    pub message: Message,
    pub sequence: u8,
    pub ack_required: bool,
    pub res_required: bool,
    /// Message types accepted as replies
    pub reply_kinds: Vec<u16>,
}

impl Request {
    fn packet(&self, source: u32) -> Packet {
        Packet {
            header: Header {
                tagged: self.target.is_all(),
                source,
                target: self.target,
                ack_required: self.ack_required,
                res_required: self.res_required,
                sequence: self.sequence,
            },
            message: self.message.clone(),
        }
    }

    /// Expect an acknowledgement for this request
    pub fn with_ack(mut self) -> Self {
        self.ack_required = true;
        self.reply_kinds.push(crate::protocol::kind::ACKNOWLEDGEMENT);
        self
    }

    /// Expect replies of type `kind` for this request
    pub fn with_reply(mut self, kind: u16) -> Self {
        self.reply_kinds.push(kind);
        self
    }

    fn accepts(&self, source: u32, header: &Header, message: &Message) -> bool {
        header.source == source
            && header.sequence == self.sequence
            && (self.target.is_all() || header.target == self.target)
            && self.reply_kinds.contains(&message.kind())
    }
}

/// A reply received from a device
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Address the reply came from
    pub addr: SocketAddr,
    pub header: Header,
    pub message: Message,
}

impl Correlate for Response {
    type Key = (DeviceId, u16, u32);

    fn correlation_key(&self) -> Self::Key {
        (
            self.header.target,
            self.message.kind(),
            self.message.part_index(),
        )
    }
}

/// UDP socket identified by a random source number
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    source: u32,
    sequence: u8,
    buffer: Vec<u8>,
}

impl UdpTransport {
    /// Bind a new socket on `local_addr`, with broadcasting enabled
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        socket.set_broadcast(true)?;

        // Source 0 asks devices to broadcast their replies, 1 is used by vendor apps
        let source = rand::thread_rng().gen_range(2..=u32::MAX);

        debug!(
            local_addr = %socket.local_addr()?,
            source = format_args!("{:08x}", source),
            "bound transport"
        );

        Ok(Self {
            socket,
            source,
            sequence: 0,
            buffer: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn source(&self) -> u32 {
        self.source
    }

    /// Prepare a request, assigning it the next sequence number
    pub fn request(
        &mut self,
        destination: SocketAddr,
        target: DeviceId,
        message: Message,
    ) -> Request {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        Request {
            destination,
            target,
            message,
            sequence,
            ack_required: false,
            res_required: false,
            reply_kinds: Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    type Request = Request;
    type Response = Response;

    async fn send(&mut self, request: &Request) -> io::Result<()> {
        let data = request.packet(self.source).encode();

        trace!(
            destination = %request.destination,
            target = %request.target,
            kind = request.message.kind(),
            sequence = request.sequence,
            "send"
        );

        self.socket.send_to(&data, request.destination).await?;
        Ok(())
    }

    async fn recv(&mut self, request: &Request) -> io::Result<Response> {
        loop {
            // recv_from is cancel-safe
            let (len, addr) = self.socket.recv_from(&mut self.buffer).await?;

            let packet = match Packet::decode(&self.buffer[..len]) {
                Ok(packet) => packet,
                Err(error) => {
                    trace!(%addr, error = %error, "discarding invalid datagram");
                    continue;
                }
            };

            if !request.accepts(self.source, &packet.header, &packet.message) {
                trace!(
                    %addr,
                    kind = packet.message.kind(),
                    sequence = packet.header.sequence,
                    "discarding unrelated datagram"
                );
                continue;
            }

            return Ok(Response {
                addr,
                header: packet.header,
                message: packet.message,
            });
        }
    }
}
