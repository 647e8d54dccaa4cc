//! SNTP time client.
//!
//! [`TimeSource`] is what the sequencer polls; [`NtpClient`] implements it
//! with one SNTPv3 client request over UDP per query.

use core::net::Ipv4Addr;

use defmt::{Debug2Format, info, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint, Stack};
use embassy_time::{Duration, with_timeout};
use heapless::String;

use crate::config::MAX_HOST_LEN;
use crate::error::TimeError;

/// Size of an SNTP packet without extensions
pub const NTP_PACKET_LEN: usize = 48;

/// Seconds from the NTP era 0 epoch (1900-01-01) to the Unix epoch
pub const NTP_UNIX_OFFSET: u32 = 2_208_988_800;

/// LI = 0, VN = 3, Mode = 3 (client)
const REQUEST_HEADER: u8 = 0x1B;

const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;

/// Offset of the transmit timestamp seconds field
const TRANSMIT_SECS_OFFSET: usize = 40;

/// Room for a reply carrying extension fields or a MAC
const RECEIVE_BUFFER_LEN: usize = 128;

/// Timestamps with the top bit clear are in NTP era 1 (from 2036-02-07)
const ERA_0_MSB: u32 = 0x8000_0000;

/// How long to wait for the server's answer
const RECEIVE_TIMEOUT_SECS: u64 = 15;

/// A server that reports the current time.
#[allow(async_fn_in_trait)]
pub trait TimeSource {
    /// Set the server to query. Must be called before [`get_timestamp`](TimeSource::get_timestamp).
    fn set_server(&mut self, host: &str, port: u16);

    /// Query the server once, returning seconds since the Unix epoch.
    async fn get_timestamp(&mut self) -> Result<u32, TimeError>;
}

/// Build a client-mode request packet.
pub fn build_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = REQUEST_HEADER;
    packet
}

/// Extract Unix seconds from a server reply.
///
/// # Errors
///
/// Returns [`TimeError::MALFORMED`] if the reply is short, is not a server
/// or broadcast packet, or carries a transmit time before 1970. Bytes past
/// the fixed header are ignored.
pub fn parse_response(packet: &[u8]) -> Result<u32, TimeError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(TimeError::MALFORMED);
    }
    let mode = packet[0] & 0x07;
    if mode != MODE_SERVER && mode != MODE_BROADCAST {
        return Err(TimeError::MALFORMED);
    }
    let secs = u32::from_be_bytes([
        packet[TRANSMIT_SECS_OFFSET],
        packet[TRANSMIT_SECS_OFFSET + 1],
        packet[TRANSMIT_SECS_OFFSET + 2],
        packet[TRANSMIT_SECS_OFFSET + 3],
    ]);
    if secs & ERA_0_MSB == 0 {
        // Era 1: the 32-bit field wrapped, Unix time still fits until 2106
        return Ok(secs.wrapping_sub(NTP_UNIX_OFFSET));
    }
    secs.checked_sub(NTP_UNIX_OFFSET).ok_or(TimeError::MALFORMED)
}

/// SNTP client over an `embassy-net` stack.
pub struct NtpClient<'d> {
    stack: Stack<'d>,
    host: Option<String<MAX_HOST_LEN>>,
    port: u16,
}

impl<'d> NtpClient<'d> {
    /// Create a client with no server configured.
    pub fn new(stack: Stack<'d>) -> Self {
        Self {
            stack,
            host: None,
            port: 0,
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, TimeError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(ip));
        }
        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup of {=str} failed: {}", host, Debug2Format(&e));
                TimeError::DNS_FAILURE
            })?;
        addrs.first().copied().ok_or(TimeError::DNS_FAILURE)
    }

    async fn request(&self, server: IpEndpoint) -> Result<u32, TimeError> {
        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; RECEIVE_BUFFER_LEN];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|e| {
            warn!("UDP bind failed: {}", Debug2Format(&e));
            TimeError::SOCKET
        })?;

        socket
            .send_to(&build_request(), server)
            .await
            .map_err(|e| {
                warn!("NTP send failed: {}", Debug2Format(&e));
                TimeError::SOCKET
            })?;

        let mut response = [0u8; RECEIVE_BUFFER_LEN];
        let (len, from) = with_timeout(
            Duration::from_secs(RECEIVE_TIMEOUT_SECS),
            socket.recv_from(&mut response),
        )
        .await
        .map_err(|_| TimeError::TIMEOUT)?
        .map_err(|e| {
            warn!("NTP receive failed: {}", Debug2Format(&e));
            TimeError::SOCKET
        })?;

        if from.endpoint.addr != server.addr {
            warn!("NTP reply from unexpected peer {}", Debug2Format(&from.endpoint));
            return Err(TimeError::MALFORMED);
        }
        parse_response(&response[..len])
    }
}

impl TimeSource for NtpClient<'_> {
    fn set_server(&mut self, host: &str, port: u16) {
        self.host = String::try_from(host).ok();
        if self.host.is_none() {
            warn!("NTP host name longer than {} bytes", MAX_HOST_LEN);
        }
        self.port = port;
    }

    async fn get_timestamp(&mut self) -> Result<u32, TimeError> {
        let Some(host) = self.host.clone() else {
            return Err(TimeError::NOT_CONFIGURED);
        };
        let addr = self.resolve(&host).await?;
        let server = IpEndpoint::new(addr, self.port);
        info!("Sending NTP request to {}", Debug2Format(&server));

        let result = self.request(server).await;
        match &result {
            Ok(secs) => info!("NTP reply: {} s since 1970", secs),
            Err(e) => warn!("NTP request failed: {}", e),
        }
        result
    }
}

