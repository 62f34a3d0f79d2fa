use std::{convert::TryFrom, net::SocketAddr, time::Duration};

use futures::future::join_all;

use super::{ConnectOptions, DeviceError, Light};
use crate::{
    protocol::{kind, DeviceId, Message, DEFAULT_PORT},
    retry::{execute, BasicRetryPolicy, ExpectedResponses},
    transport::{Response, UdpTransport},
};

/// Service number of the UDP protocol in StateService replies
const SERVICE_UDP: u8 = 1;

/// Broadcast discovery of devices
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Address discovery requests are sent to
    pub broadcast: SocketAddr,
    pub attempts: u32,
    /// How long to listen for replies after each request
    pub timeout: Duration,
    /// Options for the devices that are found
    pub connect: ConnectOptions,
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            broadcast: SocketAddr::from(([255, 255, 255, 255], DEFAULT_PORT)),
            attempts: 2,
            timeout: Duration::from_millis(2500),
            connect: ConnectOptions::default(),
        }
    }
}

impl Discovery {
    /// Find the devices answering on the network
    ///
    /// Every device that answers is then queried for its description. Devices that fail to
    /// answer these queries are skipped. Finding no device is not an error.
    #[instrument(skip(self), fields(broadcast = %self.broadcast))]
    pub async fn run(&self) -> Result<Vec<Light>, DeviceError> {
        let services = self.services().await?;

        info!(count = services.len(), "found devices");

        let lights = join_all(
            services
                .iter()
                .map(|(id, address)| Light::connect(*address, Some(*id), &self.connect)),
        )
        .await;

        Ok(lights
            .into_iter()
            .zip(services)
            .filter_map(|(result, (id, address))| match result {
                Ok(light) => Some(light),
                Err(error) => {
                    warn!(%id, %address, error = %error, "skipping device");
                    None
                }
            })
            .collect())
    }

    /// Identity and UDP address of every device answering the discovery broadcast
    async fn services(&self) -> Result<Vec<(DeviceId, SocketAddr)>, DeviceError> {
        let mut transport = UdpTransport::bind(self.connect.bind).await?;
        let request = transport
            .request(self.broadcast, DeviceId::ALL, Message::GetService)
            .with_reply(kind::STATE_SERVICE);

        let mut policy = BasicRetryPolicy::new(
            self.attempts,
            self.timeout,
            ExpectedResponses::Unbounded,
        )
        .with_callback(|response: &Response| {
            debug!(id = %response.header.target, address = %response.addr, "discovery reply");
        });

        let responses = match execute(&mut transport, &request, &mut policy).await {
            Ok(responses) => responses,
            Err(error) if !error.partial.is_empty() => {
                warn!(error = %error.source, "discovery interrupted, keeping the devices found so far");
                error.partial
            }
            Err(error) => return Err(error.into()),
        };

        let mut services: Vec<(DeviceId, SocketAddr)> = Vec::new();
        for response in responses {
            if let Message::StateService {
                service: SERVICE_UDP,
                port,
            } = response.message
            {
                let id = response.header.target;
                if services.iter().any(|(known, _)| *known == id) {
                    continue;
                }

                let port = u16::try_from(port).unwrap_or(DEFAULT_PORT);
                services.push((id, SocketAddr::new(response.addr.ip(), port)));
            }
        }

        Ok(services)
    }
}
