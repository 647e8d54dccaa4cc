//! Network interface adapter.
//!
//! [`WifiAdapter`] is the small call interface the scanner and sequencer use
//! to reach the radio. [`EspWifiAdapter`] implements it on top of the
//! `esp-radio` WiFi controller and the `embassy-net` stack.

use alloc::vec::Vec;

use defmt::{Debug2Format, info, warn};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, with_timeout};
use esp_radio::wifi::{
    AccessPointInfo, AuthMethod, ClientConfig, ModeConfig, ScanConfig, WifiController,
};
use heapless::String;

use crate::config::MAX_SSID_LEN;
use crate::error::AdapterError;
use crate::types::{AccessPointRecord, MacAddress, NetworkAddressInfo, SecurityKind};

/// Upper bound on association plus DHCP
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Settle time after starting the radio
const START_SETTLE_MS: u64 = 500;

/// Connectivity primitives the program needs from a radio driver.
///
/// Scanning is split into [`probe_count`](WifiAdapter::probe_count), which
/// learns how many networks are visible, and [`fill`](WifiAdapter::fill),
/// which copies at most `buffer.len()` of them.
#[allow(async_fn_in_trait)]
pub trait WifiAdapter {
    /// Scan and return the number of visible networks.
    async fn probe_count(&mut self) -> Result<usize, AdapterError>;

    /// Fill `buffer` with scan results, returning how many were written.
    ///
    /// Releases results cached by `probe_count`, even when `buffer` is
    /// empty.
    async fn fill(&mut self, buffer: &mut [AccessPointRecord]) -> Result<usize, AdapterError>;

    /// Join a network and wait until an address is assigned.
    async fn connect(
        &mut self,
        ssid: &str,
        passphrase: &str,
        security: SecurityKind,
    ) -> Result<(), AdapterError>;

    /// Hardware address of the station interface.
    fn mac_address(&self) -> MacAddress;

    /// Assigned IPv4 configuration, once connected.
    fn address_info(&self) -> Option<NetworkAddressInfo>;

    /// Signal strength of the current association in dBm.
    fn rssi(&self) -> Option<i32>;
}

impl From<Option<AuthMethod>> for SecurityKind {
    fn from(auth: Option<AuthMethod>) -> Self {
        match auth {
            Some(AuthMethod::None) => SecurityKind::None,
            Some(AuthMethod::Wep) => SecurityKind::Wep,
            Some(AuthMethod::Wpa) => SecurityKind::Wpa,
            Some(AuthMethod::Wpa2Personal) => SecurityKind::Wpa2,
            Some(AuthMethod::WpaWpa2Personal) => SecurityKind::WpaWpa2,
            _ => SecurityKind::Unknown,
        }
    }
}

impl TryFrom<SecurityKind> for AuthMethod {
    type Error = AdapterError;

    fn try_from(kind: SecurityKind) -> Result<Self, Self::Error> {
        match kind {
            SecurityKind::None => Ok(AuthMethod::None),
            SecurityKind::Wep => Ok(AuthMethod::Wep),
            SecurityKind::Wpa => Ok(AuthMethod::Wpa),
            SecurityKind::Wpa2 => Ok(AuthMethod::Wpa2Personal),
            SecurityKind::WpaWpa2 => Ok(AuthMethod::WpaWpa2Personal),
            SecurityKind::Unknown => Err(AdapterError::UnsupportedSecurity),
        }
    }
}

impl From<&AccessPointInfo> for AccessPointRecord {
    fn from(ap: &AccessPointInfo) -> Self {
        AccessPointRecord {
            ssid: truncated_ssid(ap.ssid.as_str()),
            security: ap.auth_method.into(),
            bssid: MacAddress(ap.bssid),
            rssi: ap.signal_strength,
            channel: ap.channel,
        }
    }
}

/// Copy an SSID, dropping whole characters past [`MAX_SSID_LEN`] bytes.
pub fn truncated_ssid(ssid: &str) -> String<MAX_SSID_LEN> {
    let mut out = String::new();
    for c in ssid.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Check credentials before handing them to the driver and pick the
/// matching driver auth method.
///
/// # Errors
///
/// [`AdapterError::InvalidCredentials`] for an empty or over-long SSID, or an
/// empty passphrase on a secured network; [`AdapterError::UnsupportedSecurity`]
/// for [`SecurityKind::Unknown`].
pub fn check_credentials(
    ssid: &str,
    passphrase: &str,
    security: SecurityKind,
) -> Result<AuthMethod, AdapterError> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return Err(AdapterError::InvalidCredentials);
    }
    if security != SecurityKind::None && passphrase.is_empty() {
        return Err(AdapterError::InvalidCredentials);
    }
    AuthMethod::try_from(security)
}

/// [`WifiAdapter`] over an `esp-radio` station and an `embassy-net` stack.
pub struct EspWifiAdapter<'d> {
    controller: &'d mut WifiController<'static>,
    stack: Stack<'d>,
    mac: MacAddress,
    // Results of the last probe, handed out by the next fill
    pending: Option<Vec<AccessPointInfo>>,
}

impl<'d> EspWifiAdapter<'d> {
    /// Wrap a controller and the stack running on its station interface.
    ///
    /// `mac` is the station interface address, read from the device before
    /// it was handed to the stack.
    pub fn new(controller: &'d mut WifiController<'static>, stack: Stack<'d>, mac: [u8; 6]) -> Self {
        Self {
            controller,
            stack,
            mac: MacAddress(mac),
            pending: None,
        }
    }

    async fn ensure_started(&mut self) -> Result<(), AdapterError> {
        if matches!(self.controller.is_started(), Ok(true)) {
            return Ok(());
        }
        info!("Starting WiFi controller...");
        self.controller.start_async().await.map_err(|e| {
            warn!("Failed to start Wi-Fi controller: {}", Debug2Format(&e));
            AdapterError::Driver
        })?;
        Timer::after(Duration::from_millis(START_SETTLE_MS)).await;
        Ok(())
    }

    async fn scan(&mut self, max: Option<usize>) -> Result<Vec<AccessPointInfo>, AdapterError> {
        self.ensure_started().await?;
        let mut scan_config = ScanConfig::default();
        if let Some(max) = max {
            scan_config = scan_config.with_max(max);
        }
        self.controller
            .scan_with_config_async(scan_config)
            .await
            .map_err(|e| {
                warn!("WiFi scan failed: {}", Debug2Format(&e));
                AdapterError::Driver
            })
    }
}

impl WifiAdapter for EspWifiAdapter<'_> {
    async fn probe_count(&mut self) -> Result<usize, AdapterError> {
        let results = self.scan(None).await?;
        let count = results.len();
        self.pending = Some(results);
        Ok(count)
    }

    async fn fill(&mut self, buffer: &mut [AccessPointRecord]) -> Result<usize, AdapterError> {
        let pending = self.pending.take();
        if buffer.is_empty() {
            return Ok(0);
        }
        let results = match pending {
            Some(results) => results,
            None => self.scan(Some(buffer.len())).await?,
        };
        let filled = results.len().min(buffer.len());
        for (slot, ap) in buffer.iter_mut().zip(results.iter()) {
            *slot = AccessPointRecord::from(ap);
        }
        Ok(filled)
    }

    async fn connect(
        &mut self,
        ssid: &str,
        passphrase: &str,
        security: SecurityKind,
    ) -> Result<(), AdapterError> {
        let auth_method = check_credentials(ssid, passphrase, security)?;

        info!("Configuring WiFi with SSID: {=str}", ssid);
        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(ssid.into())
                .with_password(passphrase.into())
                .with_auth_method(auth_method),
        );
        self.controller.set_config(&client_config).map_err(|e| {
            warn!("Failed to set Wi-Fi config: {}", Debug2Format(&e));
            AdapterError::Driver
        })?;
        self.ensure_started().await?;

        info!("Attempting to connect to WiFi...");
        self.controller.connect_async().await.map_err(|e| {
            warn!("Failed to connect to WiFi: {}", Debug2Format(&e));
            AdapterError::Driver
        })?;
        info!("WiFi associated, waiting for DHCP lease...");

        let stack = self.stack;
        let timeout = Duration::from_secs(CONNECT_TIMEOUT_SECS);
        with_timeout(timeout, async {
            stack.wait_link_up().await;
            stack.wait_config_up().await;
        })
        .await
        .map_err(|_| {
            warn!("No DHCP lease after {} s", CONNECT_TIMEOUT_SECS);
            AdapterError::Timeout
        })?;

        if self.stack.config_v4().is_none() {
            return Err(AdapterError::NoAddress);
        }
        Ok(())
    }

    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn address_info(&self) -> Option<NetworkAddressInfo> {
        let config = self.stack.config_v4()?;
        Some(NetworkAddressInfo {
            ip_address: config.address.address(),
            netmask: config.address.netmask(),
            gateway: config.gateway,
        })
    }

    fn rssi(&self) -> Option<i32> {
        self.controller.rssi().ok()
    }
}
