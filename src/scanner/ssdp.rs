//! SSDP scanner. Locates a Roku device by searching for `roku:ecp` and taking
//! the host of the first usable `LOCATION` reply.
//!
//! The default search goes through `ssdp-client` on the multicast group. A scanner
//! given an explicit target sends its own M-SEARCH to that address instead.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::StreamExt;
use socket2::{Domain, Protocol, Socket, Type};
use ssdp_client::SearchTarget;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::error::{RemoteError, Result};
use crate::network::device_control::DeviceAddress;

pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;
pub const ROKU_SEARCH_TARGET: &str = "roku:ecp";

const SEARCH_MX: usize = 3;
const RECV_BUFFER_SIZE: usize = 1024;

/// SSDP discovery of a single Roku device
#[derive(Debug, Clone)]
pub struct SsdpScanner {
    timeout: Duration,
    target: Option<SocketAddr>,
}

impl SsdpScanner {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            target: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send the probe to one address instead of the SSDP multicast group
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = Some(target);
        self
    }

    /// The M-SEARCH request sent as the probe
    pub fn search_request() -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\nHOST: {}:{}\r\nMAN: \"ssdp:discover\"\r\nST: {}\r\nMX: {}\r\n\r\n",
            SSDP_MULTICAST_ADDR, SSDP_PORT, ROKU_SEARCH_TARGET, SEARCH_MX
        )
    }

    /// Extract the device host from the `LOCATION` header of an SSDP reply
    pub fn parse_location(response: &str) -> Option<DeviceAddress> {
        response.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if !name.trim().eq_ignore_ascii_case("location") {
                return None;
            }
            Self::location_host(value)
        })
    }

    /// Device host named by a `LOCATION` URL
    pub fn location_host(location: &str) -> Option<DeviceAddress> {
        let url = url::Url::parse(location.trim()).ok()?;
        DeviceAddress::new(url.host_str()?).ok()
    }

    /// Discover a device, returning the first responder's address.
    ///
    /// Timing out, malformed replies and socket failures all end in `None`.
    pub async fn discover(&self) -> Option<DeviceAddress> {
        info!("Searching for Roku devices on your network...");
        match self.search().await {
            Ok(address) => {
                info!("Found Roku device at {}", address);
                Some(address)
            }
            Err(RemoteError::NotFound) => {
                info!("No Roku devices found automatically.");
                None
            }
            Err(e) => {
                warn!("SSDP discovery error: {}", e);
                None
            }
        }
    }

    /// Discovery with the failure reason kept.
    ///
    /// The socket lives only for this call and is closed on every return path.
    pub async fn search(&self) -> Result<DeviceAddress> {
        match self.target {
            Some(target) => self.search_at(target).await,
            None => self.search_multicast().await,
        }
    }

    async fn search_multicast(&self) -> Result<DeviceAddress> {
        let search_target = SearchTarget::Custom("roku".into(), "ecp".into());
        let mut responses = ssdp_client::search(&search_target, self.timeout, SEARCH_MX, None)
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        while let Some(response) = responses.next().await {
            match response {
                Ok(response) => match Self::location_host(response.location()) {
                    Some(address) => return Ok(address),
                    None => debug!("Ignoring SSDP reply with LOCATION {:?}", response.location()),
                },
                Err(e) => debug!("Ignoring malformed SSDP reply: {}", e),
            }
        }
        Err(RemoteError::NotFound)
    }

    async fn search_at(&self, target: SocketAddr) -> Result<DeviceAddress> {
        let socket = Self::bind_socket()?;
        let deadline = Instant::now() + self.timeout;

        socket
            .send_to(Self::search_request().as_bytes(), target)
            .await?;
        debug!("Sent M-SEARCH to {}", target);

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RemoteError::NotFound);
            }

            match timeout(remaining, socket.recv_from(&mut buf)).await {
                Err(_) => return Err(RemoteError::NotFound),
                Ok(Err(e)) => {
                    // ICMP errors from earlier sends surface here on some platforms
                    debug!("SSDP receive error: {}", e);
                }
                Ok(Ok((len, from))) => {
                    let response = String::from_utf8_lossy(&buf[..len]);
                    match Self::parse_location(&response) {
                        Some(address) => return Ok(address),
                        None => debug!("Ignoring SSDP reply without usable LOCATION from {}", from),
                    }
                }
            }
        }
    }

    fn bind_socket() -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;

        Ok(UdpSocket::from_std(socket.into())?)
    }
}

impl Default for SsdpScanner {
    fn default() -> Self {
        Self::new()
    }
}
