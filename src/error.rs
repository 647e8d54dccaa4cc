//! Error types shared by the adapter, time client and sequencer.

use core::fmt;

use defmt::Format;

/// Build-time configuration problems detected before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum ConfigError {
    /// `WIFI_SSID` was empty or not set at build time
    EmptySsid,
    /// Secured networks need a passphrase
    EmptyPassphrase,
    /// SSID longer than the 32 bytes 802.11 allows
    SsidTooLong,
    /// Time server host missing or longer than the client can store
    InvalidServerHost,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptySsid => f.write_str("WiFi SSID is empty"),
            ConfigError::EmptyPassphrase => f.write_str("WiFi passphrase is empty"),
            ConfigError::SsidTooLong => f.write_str("WiFi SSID is longer than 32 bytes"),
            ConfigError::InvalidServerHost => f.write_str("time server host is invalid"),
        }
    }
}

/// Failures reported by a [`WifiAdapter`](crate::adapter::WifiAdapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum AdapterError {
    /// The radio driver rejected the request
    Driver,
    /// Credentials could not be handed to the driver
    InvalidCredentials,
    /// The requested security kind cannot be used to connect
    UnsupportedSecurity,
    /// Link or DHCP lease did not come up in time
    Timeout,
    /// Connected, but no IPv4 configuration was assigned
    NoAddress,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Driver => f.write_str("radio driver error"),
            AdapterError::InvalidCredentials => f.write_str("invalid credentials"),
            AdapterError::UnsupportedSecurity => f.write_str("unsupported security kind"),
            AdapterError::Timeout => f.write_str("timed out waiting for the network"),
            AdapterError::NoAddress => f.write_str("no IPv4 address assigned"),
        }
    }
}

/// A failed time query.
///
/// Carries only the raw negative code of the failure; callers can tell
/// success from failure but not one cause from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct TimeError {
    code: i32,
}

impl TimeError {
    /// Server was never configured with `set_server`
    pub const NOT_CONFIGURED: TimeError = TimeError { code: -1 };
    /// Host name could not be resolved
    pub const DNS_FAILURE: TimeError = TimeError { code: -2 };
    /// Socket could not be bound, or send/receive failed
    pub const SOCKET: TimeError = TimeError { code: -3 };
    /// No answer within the receive timeout
    pub const TIMEOUT: TimeError = TimeError { code: -4 };
    /// Answer too short, from the wrong peer, or not a server reply
    pub const MALFORMED: TimeError = TimeError { code: -5 };

    /// Wrap a raw code. Non-negative values are folded to `-1` so the code
    /// always reads as a failure.
    pub const fn new(code: i32) -> Self {
        if code < 0 {
            TimeError { code }
        } else {
            TimeError { code: -1 }
        }
    }

    /// Raw failure code, always negative.
    pub const fn code(&self) -> i32 {
        self.code
    }
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time request failed with code {}", self.code)
    }
}

/// Errors that stop the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum SequencerError {
    /// Configuration rejected before connecting
    Config(ConfigError),
    /// The adapter failed to connect
    Connect(AdapterError),
    /// Time polling was requested before a successful connect
    NotConnected,
    /// Writing to the console failed
    Console,
}

impl SequencerError {
    /// Status the program ends with for this error.
    pub const fn exit_code(&self) -> i32 {
        -1
    }
}

impl From<ConfigError> for SequencerError {
    fn from(e: ConfigError) -> Self {
        SequencerError::Config(e)
    }
}

impl From<AdapterError> for SequencerError {
    fn from(e: AdapterError) -> Self {
        SequencerError::Connect(e)
    }
}

impl From<fmt::Error> for SequencerError {
    fn from(_: fmt::Error) -> Self {
        SequencerError::Console
    }
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerError::Config(e) => write!(f, "configuration error: {e}"),
            SequencerError::Connect(e) => write!(f, "connection error: {e}"),
            SequencerError::NotConnected => f.write_str("network is not connected"),
            SequencerError::Console => f.write_str("console write failed"),
        }
    }
}
