//! Build-time configuration.
//!
//! Credentials and the time server come from environment variables at build
//! time, e.g.
//!
//! ```text
//! WIFI_SSID=myssid WIFI_PASSWORD=secret NTP_SERVER=pool.ntp.org cargo run --release
//! ```

use crate::error::ConfigError;
use crate::types::SecurityKind;

/// Longest SSID 802.11 allows
pub const MAX_SSID_LEN: usize = 32;

/// Longest time server host name the client stores
pub const MAX_HOST_LEN: usize = 64;

/// Default time server: VTT MIKES, Helsinki
const DEFAULT_NTP_SERVER: &str = "time.mikes.fi";

/// Standard NTP port
const DEFAULT_NTP_PORT: u16 = 123;

/// GMT+3, Finnish summer time
const DEFAULT_TIMEZONE_OFFSET_SECS: i32 = 3 * 60 * 60;

const fn env_or(value: Option<&'static str>, default: &'static str) -> &'static str {
    match value {
        Some(v) => v,
        None => default,
    }
}

/// Everything the program needs to know about the network it joins and the
/// time server it queries.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Network to join
    pub ssid: &'static str,
    /// WPA passphrase (ignored for open networks)
    pub passphrase: &'static str,
    /// Security used when joining
    pub security: SecurityKind,
    /// Time server host name or IPv4 literal
    pub server_host: &'static str,
    /// Time server UDP port
    pub server_port: u16,
    /// Added to server time before display
    pub timezone_offset_secs: i32,
}

impl Config {
    /// Configuration baked in at build time.
    pub const DEFAULT: Config = Config {
        ssid: env_or(option_env!("WIFI_SSID"), ""),
        passphrase: env_or(option_env!("WIFI_PASSWORD"), ""),
        security: SecurityKind::WpaWpa2,
        server_host: env_or(option_env!("NTP_SERVER"), DEFAULT_NTP_SERVER),
        server_port: DEFAULT_NTP_PORT,
        timezone_offset_secs: DEFAULT_TIMEZONE_OFFSET_SECS,
    };

    /// Check the configuration can be used to connect and query.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong);
        }
        if self.security != SecurityKind::None && self.passphrase.is_empty() {
            return Err(ConfigError::EmptyPassphrase);
        }
        if self.server_host.is_empty() || self.server_host.len() > MAX_HOST_LEN {
            return Err(ConfigError::InvalidServerHost);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}
