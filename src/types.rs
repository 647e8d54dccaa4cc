//! Data types shared between the adapter, scanner and sequencer, plus the
//! static storage for the radio components.
//!
//! The static cells give the radio controller, WiFi controller and network
//! stack resources the `'static` lifetime required by Embassy async tasks.

use core::fmt;
use core::net::Ipv4Addr;

use defmt::Format;
use embassy_net::StackResources;
use esp_radio::wifi::WifiController;
use heapless::String;
use static_cell::StaticCell;

use crate::config::MAX_SSID_LEN;

/// Sockets needed: DHCP, DNS and the SNTP UDP socket.
pub const STACK_SOCKETS: usize = 3;

/// Static storage for WiFi controller.
pub static WIFI_CONTROLLER: StaticCell<WifiController<'static>> = StaticCell::new();

/// Static storage for radio initialization controller.
///
/// This static cell stores the radio controller that manages WiFi/BLE hardware.
pub static RADIO_INIT: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Static storage for the network stack's socket slots.
pub static STACK_RESOURCES: StaticCell<StackResources<STACK_SOCKETS>> = StaticCell::new();

/// Security mode of an access point, or the mode used to join one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Format)]
pub enum SecurityKind {
    /// Open network
    None,
    /// Legacy WEP
    Wep,
    /// WPA personal
    Wpa,
    /// WPA2 personal
    Wpa2,
    /// Mixed WPA/WPA2 personal
    WpaWpa2,
    /// Anything else the radio reports
    #[default]
    Unknown,
}

impl SecurityKind {
    /// Label printed in scan results.
    pub const fn label(&self) -> &'static str {
        match self {
            SecurityKind::None => "None",
            SecurityKind::Wep => "WEP",
            SecurityKind::Wpa => "WPA",
            SecurityKind::Wpa2 => "WPA2",
            SecurityKind::WpaWpa2 => "WPA/WPA2",
            SecurityKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SecurityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 6-byte hardware address, displayed as `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Format)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// One network seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessPointRecord {
    /// Network name
    pub ssid: String<MAX_SSID_LEN>,
    /// Advertised security mode
    pub security: SecurityKind,
    /// Hardware address of the access point
    pub bssid: MacAddress,
    /// Signal strength in dBm
    pub rssi: i8,
    /// Primary channel
    pub channel: u8,
}

impl fmt::Display for AccessPointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Network: {} secured: {} BSSID: {} RSSI: {} Ch: {}",
            self.ssid, self.security, self.bssid, self.rssi, self.channel
        )
    }
}

/// IPv4 configuration assigned after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAddressInfo {
    /// Address assigned to this device
    pub ip_address: Ipv4Addr,
    /// Subnet mask of the assigned prefix
    pub netmask: Ipv4Addr,
    /// Default router, if the lease carried one
    pub gateway: Option<Ipv4Addr>,
}
