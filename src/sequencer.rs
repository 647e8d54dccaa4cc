//! Main sequencer.
//!
//! Drives the program through its stages:
//!
//! ```text
//! Idle -> ScanDone -> Connected -> Polling(1..=5) -> Cooldown -> IdleForever
//! ```
//!
//! All collaborators are injected, so the same sequence runs against the
//! radio in the firmware and against simulated parts in tests.

use core::convert::Infallible;
use core::fmt::Write;

use defmt::{Format, info, warn};
use embedded_hal_async::delay::DelayNs;

use crate::adapter::WifiAdapter;
use crate::calendar::CalendarTime;
use crate::config::Config;
use crate::error::{AdapterError, SequencerError};
use crate::ntp::TimeSource;
use crate::scanner::{MAX_SCAN_RESULTS, scan_networks};
use crate::types::NetworkAddressInfo;

/// Time queries per run
pub const POLL_ITERATIONS: u8 = 5;

/// Pause after every time query
pub const POLL_INTERVAL_MS: u32 = 10_000;

/// Pause between the last query and the idle loop
pub const COOLDOWN_MS: u32 = 30_000;

/// Period of the idle reminder
pub const IDLE_INTERVAL_MS: u32 = 3_000;

/// Time the radio needs to wake up before the first scan
pub const RADIO_WAKE_MS: u32 = 500;

/// Where the sequencer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum Stage {
    /// Nothing done yet
    Idle,
    /// Networks scanned and listed
    ScanDone,
    /// Joined the network with an address assigned
    Connected,
    /// Running time query `n` of [`POLL_ITERATIONS`]
    Polling(u8),
    /// Queries finished, waiting before the idle loop
    Cooldown,
    /// Printing the reminder forever
    IdleForever,
}

/// Outcome counts of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Format)]
pub struct PollReport {
    /// Queries that returned a time
    pub successes: u8,
    /// Queries that failed
    pub failures: u8,
}

impl PollReport {
    /// Number of queries made.
    pub const fn iterations(&self) -> u8 {
        self.successes + self.failures
    }
}

/// Sequences the adapter, scanner and time client, printing to `console`.
pub struct Sequencer<A, T, D, W> {
    config: Config,
    adapter: A,
    time: T,
    delay: D,
    console: W,
    stage: Stage,
    address: Option<NetworkAddressInfo>,
}

impl<A, T, D, W> Sequencer<A, T, D, W>
where
    A: WifiAdapter,
    T: TimeSource,
    D: DelayNs,
    W: Write,
{
    /// Create a sequencer in the [`Stage::Idle`] stage.
    pub fn new(config: Config, adapter: A, time: T, delay: D, console: W) -> Self {
        Self {
            config,
            adapter,
            time,
            delay,
            console,
            stage: Stage::Idle,
            address: None,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Address assigned by the last successful connect.
    pub fn address(&self) -> Option<&NetworkAddressInfo> {
        self.address.as_ref()
    }

    /// Console output sink.
    pub fn console(&self) -> &W {
        &self.console
    }

    /// Network adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Time source.
    pub fn time_source(&self) -> &T {
        &self.time
    }

    /// Delay provider.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    fn enter(&mut self, stage: Stage) {
        info!("Stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Run the whole sequence.
    ///
    /// Only returns on failure to connect; otherwise ends in
    /// [`idle_forever`](Self::idle_forever).
    ///
    /// # Errors
    ///
    /// [`SequencerError::Config`] or [`SequencerError::Connect`] if the
    /// network cannot be joined, [`SequencerError::Console`] if the console
    /// fails before the idle loop.
    pub async fn run(&mut self) -> Result<Infallible, SequencerError> {
        writeln!(self.console, "WiFi example\n")?;
        self.delay.delay_ms(RADIO_WAKE_MS).await;

        self.scan().await?;
        self.connect().await?;
        self.poll_time().await?;
        self.cooldown().await?;
        self.idle_forever().await
    }

    /// List nearby networks once. Scan failures are absorbed.
    pub async fn scan(&mut self) -> Result<usize, SequencerError> {
        writeln!(self.console, "Scan:")?;
        let count = scan_networks(&mut self.adapter, &mut self.console, MAX_SCAN_RESULTS).await?;
        self.enter(Stage::ScanDone);
        Ok(count)
    }

    /// Join the configured network and print the link details.
    ///
    /// # Errors
    ///
    /// Any failure prints `Connection error` and is returned; the caller is
    /// expected to stop.
    pub async fn connect(&mut self) -> Result<NetworkAddressInfo, SequencerError> {
        writeln!(self.console, "\nConnecting...")?;

        let result = self.join().await;
        let address = match result {
            Ok(address) => address,
            Err(e) => {
                warn!("Connect failed: {}", e);
                writeln!(self.console, "\nConnection error")?;
                return Err(e);
            }
        };

        writeln!(self.console, "Success\n")?;
        writeln!(self.console, "MAC: {}", self.adapter.mac_address())?;
        writeln!(self.console, "IP: {}", address.ip_address)?;
        writeln!(self.console, "Netmask: {}", address.netmask)?;
        match address.gateway {
            Some(gateway) => writeln!(self.console, "Gateway: {gateway}")?,
            None => writeln!(self.console, "Gateway: none")?,
        }
        match self.adapter.rssi() {
            Some(rssi) => writeln!(self.console, "RSSI: {rssi}\n")?,
            None => writeln!(self.console, "RSSI: unknown\n")?,
        }

        self.address = Some(address);
        self.enter(Stage::Connected);
        Ok(address)
    }

    async fn join(&mut self) -> Result<NetworkAddressInfo, SequencerError> {
        self.config.validate()?;
        self.adapter
            .connect(self.config.ssid, self.config.passphrase, self.config.security)
            .await?;
        self.adapter
            .address_info()
            .ok_or(SequencerError::Connect(AdapterError::NoAddress))
    }

    /// Query the time server [`POLL_ITERATIONS`] times, pausing
    /// [`POLL_INTERVAL_MS`] after every query whatever its outcome.
    ///
    /// # Errors
    ///
    /// [`SequencerError::NotConnected`] if called before a successful
    /// [`connect`](Self::connect); the time source is not touched then.
    pub async fn poll_time(&mut self) -> Result<PollReport, SequencerError> {
        if self.stage != Stage::Connected {
            return Err(SequencerError::NotConnected);
        }

        writeln!(self.console, "\nNTP Client example (using WLAN)")?;
        self.time
            .set_server(self.config.server_host, self.config.server_port);

        let mut report = PollReport::default();
        for i in 1..=POLL_ITERATIONS {
            self.enter(Stage::Polling(i));
            match self.time.get_timestamp().await {
                Ok(secs) => {
                    report.successes += 1;
                    self.print_time(secs)?;
                }
                Err(e) => {
                    report.failures += 1;
                    writeln!(
                        self.console,
                        "An error occurred when getting the time. Code: {}",
                        e.code()
                    )?;
                }
            }

            writeln!(self.console, "Waiting for 10 seconds before trying again...")?;
            self.delay.delay_ms(POLL_INTERVAL_MS).await;
        }

        info!("Polling done: {}", report);
        Ok(report)
    }

    fn print_time(&mut self, secs: u32) -> Result<(), SequencerError> {
        writeln!(
            self.console,
            "The timestamp seconds from the NTP server in\n  32 bit hexadecimal number is {secs:X}"
        )?;
        writeln!(self.console, "  decimal number is {secs}")?;
        let local = i64::from(secs) + i64::from(self.config.timezone_offset_secs);
        writeln!(self.console, "Current time is {}", CalendarTime::from_unix(local))?;
        Ok(())
    }

    /// Print the firewall hint and wait [`COOLDOWN_MS`].
    pub async fn cooldown(&mut self) -> Result<(), SequencerError> {
        self.enter(Stage::Cooldown);
        writeln!(
            self.console,
            "Did it succeed to get correct time?\n If not the port might be blocked on the firewall."
        )?;
        self.delay.delay_ms(COOLDOWN_MS).await;
        Ok(())
    }

    /// Print the reminder once and wait [`IDLE_INTERVAL_MS`].
    ///
    /// The wait happens even if the console write fails.
    pub async fn idle_tick(&mut self) -> Result<(), SequencerError> {
        let printed = writeln!(
            self.console,
            "\nWe stopped sending more UDP packets to the server.\nUnplug your device!"
        );
        self.delay.delay_ms(IDLE_INTERVAL_MS).await;
        printed.map_err(SequencerError::from)
    }

    /// Print the reminder every [`IDLE_INTERVAL_MS`], forever.
    pub async fn idle_forever(&mut self) -> ! {
        self.enter(Stage::IdleForever);
        loop {
            if self.idle_tick().await.is_err() {
                warn!("Console write failed");
            }
        }
    }
}
