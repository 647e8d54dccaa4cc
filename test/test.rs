//! On-target tests for the scanner, sequencer, calendar and SNTP codec.
//!
//! Run with `cargo test` and a board attached; `probe-rs` flashes and runs
//! each test in turn.

#![no_std]
#![no_main]

use panic_rtt_target as _;

esp_bootloader_esp_idf::esp_app_desc!();

mod mocks {
    use core::fmt::Write;
    use core::net::Ipv4Addr;

    use embedded_hal_async::delay::DelayNs;
    use heapless::{String, Vec};
    use wifi_ntp::adapter::WifiAdapter;
    use wifi_ntp::error::{AdapterError, TimeError};
    use wifi_ntp::ntp::TimeSource;
    use wifi_ntp::types::{AccessPointRecord, MacAddress, NetworkAddressInfo, SecurityKind};

    pub type Console = String<4096>;

    /// Adapter that reports `visible` networks named `net-<n>`.
    pub struct MockAdapter {
        pub visible: usize,
        pub probe_fails: bool,
        pub connect_result: Result<(), AdapterError>,
        pub probe_calls: u8,
        pub fill_capacities: Vec<usize, 4>,
        pub connect_calls: u8,
        connected: bool,
    }

    impl MockAdapter {
        pub fn with_networks(visible: usize) -> Self {
            Self {
                visible,
                probe_fails: false,
                connect_result: Ok(()),
                probe_calls: 0,
                fill_capacities: Vec::new(),
                connect_calls: 0,
                connected: false,
            }
        }

        pub fn failing_connect(error: AdapterError) -> Self {
            Self {
                connect_result: Err(error),
                ..Self::with_networks(2)
            }
        }
    }

    impl WifiAdapter for MockAdapter {
        async fn probe_count(&mut self) -> Result<usize, AdapterError> {
            self.probe_calls += 1;
            if self.probe_fails {
                Err(AdapterError::Driver)
            } else {
                Ok(self.visible)
            }
        }

        async fn fill(&mut self, buffer: &mut [AccessPointRecord]) -> Result<usize, AdapterError> {
            let _ = self.fill_capacities.push(buffer.len());
            let count = self.visible.min(buffer.len());
            for (i, slot) in buffer.iter_mut().take(count).enumerate() {
                let mut ssid = String::new();
                let _ = write!(ssid, "net-{i}");
                *slot = AccessPointRecord {
                    ssid,
                    security: SecurityKind::WpaWpa2,
                    bssid: MacAddress([0x02, 0, 0, 0, 0, i as u8]),
                    rssi: -40 - i as i8,
                    channel: 1 + (i % 13) as u8,
                };
            }
            Ok(count)
        }

        async fn connect(
            &mut self,
            _ssid: &str,
            _passphrase: &str,
            _security: SecurityKind,
        ) -> Result<(), AdapterError> {
            self.connect_calls += 1;
            self.connect_result?;
            self.connected = true;
            Ok(())
        }

        fn mac_address(&self) -> MacAddress {
            MacAddress([0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56])
        }

        fn address_info(&self) -> Option<NetworkAddressInfo> {
            self.connected.then_some(NetworkAddressInfo {
                ip_address: Ipv4Addr::new(192, 168, 1, 42),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Some(Ipv4Addr::new(192, 168, 1, 1)),
            })
        }

        fn rssi(&self) -> Option<i32> {
            Some(-55)
        }
    }

    /// Time source replaying a fixed script of answers, cycling when it
    /// runs out.
    pub struct ScriptedTime {
        script: Vec<Result<u32, TimeError>, 8>,
        pub calls: u8,
        pub server: Option<(String<64>, u16)>,
    }

    impl ScriptedTime {
        pub fn new(answers: &[Result<u32, TimeError>]) -> Self {
            let mut script = Vec::new();
            for answer in answers {
                let _ = script.push(*answer);
            }
            Self {
                script,
                calls: 0,
                server: None,
            }
        }
    }

    impl TimeSource for ScriptedTime {
        fn set_server(&mut self, host: &str, port: u16) {
            self.server = String::try_from(host).ok().map(|h| (h, port));
        }

        async fn get_timestamp(&mut self) -> Result<u32, TimeError> {
            let answer = self.script[self.calls as usize % self.script.len()];
            self.calls += 1;
            answer
        }
    }

    /// Delay that returns at once and remembers what was asked for.
    #[derive(Default)]
    pub struct RecordingDelay {
        pub sleeps_ms: Vec<u32, 32>,
        pub total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }

        async fn delay_ms(&mut self, ms: u32) {
            let _ = self.sleeps_ms.push(ms);
            self.total_ns += u64::from(ms) * 1_000_000;
        }
    }
}

#[cfg(test)]
#[embedded_test::tests(executor = esp_rtos::embassy::Executor::new())]
mod tests {
    use defmt::{assert, assert_eq};
    use embassy_futures::select::{Either, select};
    use embassy_time::{Delay, Duration, Timer};
    use esp_hal::timer::timg::TimerGroup;
    use esp_radio::wifi::AuthMethod;
    use wifi_ntp::adapter::{check_credentials, truncated_ssid};
    use wifi_ntp::calendar::CalendarTime;
    use wifi_ntp::config::Config;
    use wifi_ntp::error::{AdapterError, ConfigError, SequencerError, TimeError};
    use wifi_ntp::ntp::{NTP_PACKET_LEN, NTP_UNIX_OFFSET, build_request, parse_response};
    use wifi_ntp::scanner::{MAX_SCAN_RESULTS, scan_networks};
    use wifi_ntp::sequencer::{
        COOLDOWN_MS, IDLE_INTERVAL_MS, POLL_INTERVAL_MS, POLL_ITERATIONS, RADIO_WAKE_MS, Sequencer,
        Stage,
    };
    use wifi_ntp::types::{MacAddress, SecurityKind};

    use crate::mocks::{Console, MockAdapter, RecordingDelay, ScriptedTime};

    const TEST_CONFIG: Config = Config {
        ssid: "lab",
        passphrase: "secret123",
        security: SecurityKind::WpaWpa2,
        server_host: "time.example.org",
        server_port: 123,
        timezone_offset_secs: 3 * 60 * 60,
    };

    type TestSequencer = Sequencer<MockAdapter, ScriptedTime, RecordingDelay, Console>;

    fn sequencer(adapter: MockAdapter, time: ScriptedTime) -> TestSequencer {
        Sequencer::new(
            TEST_CONFIG,
            adapter,
            time,
            RecordingDelay::default(),
            Console::new(),
        )
    }

    async fn connected(time: ScriptedTime) -> TestSequencer {
        let mut seq = sequencer(MockAdapter::with_networks(1), time);
        assert!(seq.connect().await.is_ok());
        seq
    }

    fn ntp_reply(mode: u8, ntp_secs: u32) -> [u8; NTP_PACKET_LEN] {
        let mut packet = [0u8; NTP_PACKET_LEN];
        packet[0] = 0x18 | mode;
        packet[1] = 1;
        packet[40..44].copy_from_slice(&ntp_secs.to_be_bytes());
        packet
    }

    #[init]
    fn init() {
        let peripherals = esp_hal::init(esp_hal::Config::default());

        let timg1 = TimerGroup::new(peripherals.TIMG1);
        esp_rtos::start(timg1.timer0);

        rtt_target::rtt_init_defmt!();
        wifi_ntp::allocator::init_heap();
    }

    #[test]
    async fn scan_caps_listing_at_fifteen() {
        let mut adapter = MockAdapter::with_networks(40);
        let mut console = Console::new();

        let count = scan_networks(&mut adapter, &mut console, MAX_SCAN_RESULTS)
            .await
            .unwrap();

        assert_eq!(count, 15);
        assert_eq!(adapter.probe_calls, 1);
        assert_eq!(console.matches("Network: ").count(), 15);
        assert!(console.ends_with("15 networks available.\n"));
        assert_eq!(adapter.fill_capacities.as_slice(), &[15usize][..]);
    }

    #[test]
    async fn scan_lists_every_network_below_cap() {
        for visible in [1usize, 7, 14, 15, 16] {
            let mut adapter = MockAdapter::with_networks(visible);
            let mut console = Console::new();

            let count = scan_networks(&mut adapter, &mut console, MAX_SCAN_RESULTS)
                .await
                .unwrap();

            let expected = visible.min(15);
            assert_eq!(count, expected);
            assert_eq!(console.matches("Network: ").count(), expected);
        }
    }

    #[test]
    async fn scan_formats_record_line() {
        let mut adapter = MockAdapter::with_networks(1);
        let mut console = Console::new();

        scan_networks(&mut adapter, &mut console, MAX_SCAN_RESULTS)
            .await
            .unwrap();

        assert_eq!(
            console.as_str(),
            "Network: net-0 secured: WPA/WPA2 BSSID: 02:00:00:00:00:00 RSSI: -40 Ch: 1\n\
             1 networks available.\n"
        );
    }

    #[test]
    async fn scan_absorbs_empty_and_failed_counts() {
        let mut empty = MockAdapter::with_networks(0);
        let mut console = Console::new();
        let count = scan_networks(&mut empty, &mut console, MAX_SCAN_RESULTS)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(console.as_str(), "0 networks available.\n");
        assert_eq!(empty.fill_capacities.as_slice(), &[0usize][..]);

        let mut failing = MockAdapter::with_networks(5);
        failing.probe_fails = true;
        let mut console = Console::new();
        let count = scan_networks(&mut failing, &mut console, MAX_SCAN_RESULTS)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(console.as_str(), "0 networks available.\n");
        assert!(failing.fill_capacities.is_empty());
    }

    #[test]
    async fn scan_with_zero_limit_still_releases_results() {
        let mut adapter = MockAdapter::with_networks(6);
        let mut console = Console::new();

        let count = scan_networks(&mut adapter, &mut console, 0).await.unwrap();

        assert_eq!(count, 0);
        assert_eq!(adapter.probe_calls, 1);
        assert_eq!(adapter.fill_capacities.as_slice(), &[0usize][..]);
        assert_eq!(console.as_str(), "0 networks available.\n");
    }

    #[test]
    async fn connect_failure_stops_before_time_client() {
        let mut seq = sequencer(
            MockAdapter::failing_connect(AdapterError::Timeout),
            ScriptedTime::new(&[Ok(0)]),
        );

        let result = seq.run().await;

        assert_eq!(
            result.err(),
            Some(SequencerError::Connect(AdapterError::Timeout))
        );
        assert_eq!(SequencerError::Connect(AdapterError::Timeout).exit_code(), -1);
        assert_eq!(seq.time_source().calls, 0);
        assert!(seq.time_source().server.is_none());
        assert_eq!(seq.stage(), Stage::ScanDone);
        assert!(seq.console().contains("Connection error"));
        assert!(!seq.console().contains("NTP Client example"));
        assert_eq!(seq.delay().sleeps_ms.as_slice(), &[RADIO_WAKE_MS][..]);
    }

    #[test]
    async fn invalid_config_never_reaches_adapter() {
        let config = Config {
            ssid: "",
            ..TEST_CONFIG
        };
        let mut seq = Sequencer::new(
            config,
            MockAdapter::with_networks(0),
            ScriptedTime::new(&[Ok(0)]),
            RecordingDelay::default(),
            Console::new(),
        );

        let result = seq.connect().await;

        assert_eq!(
            result.err(),
            Some(SequencerError::Config(ConfigError::EmptySsid))
        );
        assert_eq!(seq.adapter().connect_calls, 0);
    }

    #[test]
    async fn connect_prints_link_details() {
        let seq = connected(ScriptedTime::new(&[Ok(0)])).await;

        assert_eq!(seq.stage(), Stage::Connected);
        let console = seq.console();
        assert!(console.contains("Success\n"));
        assert!(console.contains("MAC: 24:0A:C4:12:34:56\n"));
        assert!(console.contains("IP: 192.168.1.42\n"));
        assert!(console.contains("Netmask: 255.255.255.0\n"));
        assert!(console.contains("Gateway: 192.168.1.1\n"));
        assert!(console.contains("RSSI: -55\n"));
    }

    #[test]
    async fn polling_requires_connection() {
        let mut seq = sequencer(MockAdapter::with_networks(0), ScriptedTime::new(&[Ok(0)]));

        assert_eq!(seq.poll_time().await.err(), Some(SequencerError::NotConnected));
        assert_eq!(seq.time_source().calls, 0);
    }

    #[test]
    async fn failed_queries_print_code_and_keep_polling() {
        let mut seq = connected(ScriptedTime::new(&[Err(TimeError::new(-3001))])).await;

        let report = seq.poll_time().await.unwrap();

        assert_eq!(report.failures, POLL_ITERATIONS);
        assert_eq!(report.successes, 0);
        assert_eq!(seq.time_source().calls, POLL_ITERATIONS);
        assert_eq!(
            seq.console()
                .matches("An error occurred when getting the time. Code: -3001\n")
                .count(),
            5
        );
        assert_eq!(
            seq.delay().sleeps_ms.as_slice(),
            &[POLL_INTERVAL_MS; 5][..]
        );
    }

    #[test]
    async fn successful_query_prints_offset_calendar_time() {
        let mut seq = connected(ScriptedTime::new(&[Ok(1_700_000_000)])).await;

        seq.poll_time().await.unwrap();

        let console = seq.console();
        assert!(console.contains("32 bit hexadecimal number is 6553F100\n"));
        assert!(console.contains("  decimal number is 1700000000\n"));
        assert!(console.contains("Current time is Wed Nov 15 01:13:20 2023\n"));
        let (host, port) = seq.time_source().server.clone().unwrap();
        assert_eq!(host.as_str(), "time.example.org");
        assert_eq!(port, 123);
    }

    #[test]
    async fn polling_runs_five_times_for_any_outcome_mix() {
        let mut seq = connected(ScriptedTime::new(&[
            Ok(0),
            Err(TimeError::TIMEOUT),
            Err(TimeError::DNS_FAILURE),
            Ok(1_234_567_890),
            Err(TimeError::MALFORMED),
        ]))
        .await;

        let report = seq.poll_time().await.unwrap();

        assert_eq!(report.iterations(), POLL_ITERATIONS);
        assert_eq!(report.successes, 2);
        assert_eq!(report.failures, 3);
        assert_eq!(seq.stage(), Stage::Polling(POLL_ITERATIONS));
        assert_eq!(
            seq.console()
                .matches("Waiting for 10 seconds before trying again...")
                .count(),
            5
        );
        assert!(seq.console().contains("Current time is Thu Jan  1 03:00:00 1970\n"));
        assert!(seq.console().contains("Current time is Sat Feb 14 02:31:30 2009\n"));
        assert!(seq.console().contains("Code: -4\n"));
        assert_eq!(seq.delay().total_ns, 50_000_000_000);
    }

    #[test]
    async fn cooldown_then_idle_tick() {
        let mut seq = connected(ScriptedTime::new(&[Ok(0)])).await;

        seq.cooldown().await.unwrap();
        assert_eq!(seq.stage(), Stage::Cooldown);
        assert!(seq.console().contains("If not the port might be blocked on the firewall."));

        seq.idle_tick().await.unwrap();
        assert!(seq.console().contains("Unplug your device!\n"));
        assert_eq!(
            seq.delay().sleeps_ms.as_slice(),
            &[COOLDOWN_MS, IDLE_INTERVAL_MS][..]
        );
    }

    #[test]
    async fn idle_loop_never_exits() {
        let mut seq = Sequencer::new(
            TEST_CONFIG,
            MockAdapter::with_networks(0),
            ScriptedTime::new(&[Ok(0)]),
            Delay,
            Console::new(),
        );

        let outcome = select(seq.idle_forever(), Timer::after(Duration::from_secs(7))).await;

        assert!(matches!(outcome, Either::Second(())));
        assert_eq!(seq.stage(), Stage::IdleForever);
        assert_eq!(seq.console().matches("Unplug your device!").count(), 3);
    }

    #[test]
    fn calendar_matches_ctime() {
        let cases: [(i64, &str); 5] = [
            (0, "Thu Jan  1 00:00:00 1970"),
            (951_782_400, "Tue Feb 29 00:00:00 2000"),
            (1_700_000_000, "Tue Nov 14 22:13:20 2023"),
            (2_147_483_647, "Tue Jan 19 03:14:07 2038"),
            (-1, "Wed Dec 31 23:59:59 1969"),
        ];
        for (secs, expected) in cases {
            let mut text = heapless::String::<32>::new();
            core::fmt::write(&mut text, format_args!("{}", CalendarTime::from_unix(secs))).unwrap();
            assert_eq!(text.as_str(), expected);
        }
    }

    #[test]
    fn ntp_request_is_client_mode() {
        let request = build_request();
        assert_eq!(request.len(), NTP_PACKET_LEN);
        assert_eq!(request[0], 0x1B);
        assert!(request[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn ntp_response_validation() {
        let unix = 1_700_000_000u32;
        assert_eq!(parse_response(&ntp_reply(4, unix + NTP_UNIX_OFFSET)), Ok(unix));
        assert_eq!(parse_response(&ntp_reply(5, NTP_UNIX_OFFSET)), Ok(0));
        assert_eq!(
            parse_response(&ntp_reply(4, unix + NTP_UNIX_OFFSET)[..47]),
            Err(TimeError::MALFORMED)
        );
        assert_eq!(
            parse_response(&ntp_reply(3, unix + NTP_UNIX_OFFSET)),
            Err(TimeError::MALFORMED)
        );
        assert_eq!(
            parse_response(&ntp_reply(4, NTP_UNIX_OFFSET - 1)),
            Err(TimeError::MALFORMED)
        );
        assert_eq!(
            parse_response(&ntp_reply(4, 0x8000_0000)),
            Err(TimeError::MALFORMED)
        );
    }

    #[test]
    fn ntp_era_rollover() {
        // 2036-02-07 06:28:16 UTC, first second of era 1
        assert_eq!(parse_response(&ntp_reply(4, 0)), Ok(2_085_978_496));
        assert_eq!(parse_response(&ntp_reply(4, 3600)), Ok(2_085_982_096));
        assert_eq!(
            parse_response(&ntp_reply(4, u32::MAX)),
            Ok(u32::MAX - NTP_UNIX_OFFSET)
        );
    }

    #[test]
    fn ntp_reply_with_extension_fields() {
        let unix = 1_700_000_000u32;
        let mut packet = [0xA5u8; 68];
        packet[..NTP_PACKET_LEN].copy_from_slice(&ntp_reply(4, unix + NTP_UNIX_OFFSET));
        assert_eq!(parse_response(&packet), Ok(unix));
    }

    #[test]
    fn time_error_codes_are_negative() {
        assert_eq!(TimeError::new(-3001).code(), -3001);
        assert_eq!(TimeError::new(7).code(), -1);
        assert!(TimeError::TIMEOUT.code() < 0);
    }

    #[test]
    fn config_validation() {
        assert!(TEST_CONFIG.validate().is_ok());
        assert_eq!(
            Config { passphrase: "", ..TEST_CONFIG }.validate(),
            Err(ConfigError::EmptyPassphrase)
        );
        assert!(
            Config {
                passphrase: "",
                security: SecurityKind::None,
                ..TEST_CONFIG
            }
            .validate()
            .is_ok()
        );
        assert_eq!(
            Config { server_host: "", ..TEST_CONFIG }.validate(),
            Err(ConfigError::InvalidServerHost)
        );
        assert_eq!(
            Config {
                ssid: "this-ssid-is-far-longer-than-thirty-two-bytes",
                ..TEST_CONFIG
            }
            .validate(),
            Err(ConfigError::SsidTooLong)
        );
    }

    #[test]
    fn security_maps_to_driver_auth() {
        assert!(matches!(
            AuthMethod::try_from(SecurityKind::Unknown),
            Err(AdapterError::UnsupportedSecurity)
        ));
        assert!(matches!(AuthMethod::try_from(SecurityKind::None), Ok(AuthMethod::None)));
        assert!(matches!(
            AuthMethod::try_from(SecurityKind::Wpa2),
            Ok(AuthMethod::Wpa2Personal)
        ));
        assert!(matches!(
            AuthMethod::try_from(SecurityKind::WpaWpa2),
            Ok(AuthMethod::WpaWpa2Personal)
        ));
    }

    #[test]
    fn driver_auth_maps_to_labels() {
        let label = |auth: Option<AuthMethod>| SecurityKind::from(auth).label();
        assert_eq!(label(Some(AuthMethod::None)), "None");
        assert_eq!(label(Some(AuthMethod::Wep)), "WEP");
        assert_eq!(label(Some(AuthMethod::Wpa)), "WPA");
        assert_eq!(label(Some(AuthMethod::Wpa2Personal)), "WPA2");
        assert_eq!(label(Some(AuthMethod::WpaWpa2Personal)), "WPA/WPA2");
        assert_eq!(label(Some(AuthMethod::Wpa3Personal)), "Unknown");
        assert_eq!(label(Some(AuthMethod::Wpa2Wpa3Personal)), "Unknown");
        assert_eq!(label(None), "Unknown");
    }

    #[test]
    fn ssid_truncates_on_char_boundary() {
        let exact = "abcdefghijklmnopqrstuvwxyz012345";
        assert_eq!(truncated_ssid(exact).as_str(), exact);
        assert_eq!(truncated_ssid("abcdefghijklmnopqrstuvwxyz0123456789").as_str(), exact);

        // 31 ASCII bytes then a two-byte character that would end at byte 33
        let split = "abcdefghijklmnopqrstuvwxyz01234\u{e9}";
        assert_eq!(truncated_ssid(split).as_str(), "abcdefghijklmnopqrstuvwxyz01234");
        assert_eq!(truncated_ssid("").as_str(), "");
    }

    #[test]
    fn credentials_checked_before_driver() {
        assert!(matches!(
            check_credentials("home", "secret", SecurityKind::Wpa2),
            Ok(AuthMethod::Wpa2Personal)
        ));
        assert!(matches!(
            check_credentials("cafe", "", SecurityKind::None),
            Ok(AuthMethod::None)
        ));
        assert!(matches!(
            check_credentials("home", "", SecurityKind::Wpa2),
            Err(AdapterError::InvalidCredentials)
        ));
        assert!(matches!(
            check_credentials("", "secret", SecurityKind::Wpa2),
            Err(AdapterError::InvalidCredentials)
        ));
        assert!(matches!(
            check_credentials("abcdefghijklmnopqrstuvwxyz0123456", "secret", SecurityKind::Wpa2),
            Err(AdapterError::InvalidCredentials)
        ));
        assert!(matches!(
            check_credentials("home", "secret", SecurityKind::Unknown),
            Err(AdapterError::UnsupportedSecurity)
        ));
    }

    #[test]
    fn labels_and_addresses() {
        assert_eq!(SecurityKind::WpaWpa2.label(), "WPA/WPA2");
        assert_eq!(SecurityKind::Wep.label(), "WEP");
        assert_eq!(SecurityKind::Unknown.label(), "Unknown");

        let mut text = heapless::String::<32>::new();
        core::fmt::write(
            &mut text,
            format_args!("{}", MacAddress([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01])),
        )
        .unwrap();
        assert_eq!(text.as_str(), "DE:AD:BE:EF:00:01");
    }
}
