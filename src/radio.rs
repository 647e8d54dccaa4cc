//! Radio and network stack bring-up.
//!
//! Initializes the radio, creates the WiFi controller in station mode and
//! builds the DHCP-configured `embassy-net` stack on its station interface.

use defmt::{Debug2Format, error, info};
use embassy_net::{Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};

use crate::error::AdapterError;
use crate::types::{RADIO_INIT, STACK_RESOURCES, STACK_SOCKETS, WIFI_CONTROLLER};

/// Everything produced by [`init_wifi`].
pub struct WifiParts {
    /// Station-mode controller, not yet started
    pub controller: &'static mut WifiController<'static>,
    /// Network stack on the station interface
    pub stack: Stack<'static>,
    /// Stack runner, to be driven by [`net_task`]
    pub runner: Runner<'static, WifiDevice<'static>>,
    /// Station interface hardware address
    pub mac: [u8; 6],
}

/// Bring up the radio, the WiFi controller and the network stack.
///
/// `seed` seeds the stack's port and sequence number randomization.
///
/// # Errors
///
/// Returns [`AdapterError::Driver`] if the radio cannot be initialized, the
/// controller cannot be created or station mode cannot be set.
pub async fn init_wifi(device: WIFI<'static>, seed: u64) -> Result<WifiParts, AdapterError> {
    let radio_init = esp_radio::init().map_err(|e| {
        error!("Failed to initialize radio controller: {}", Debug2Format(&e));
        AdapterError::Driver
    })?;
    let radio_init = RADIO_INIT.init(radio_init);
    info!("Radio initialized!");

    let (wifi_controller, interfaces) = esp_radio::wifi::new(radio_init, device, Default::default())
        .map_err(|e| {
            error!("Failed to create WiFi controller: {}", Debug2Format(&e));
            AdapterError::Driver
        })?;
    info!("WiFi controller created!");

    let wifi_controller = WIFI_CONTROLLER.init(wifi_controller);
    wifi_controller
        .set_config(&ModeConfig::Client(ClientConfig::default()))
        .map_err(|e| {
            error!("Failed to set Wi-Fi mode: {}", Debug2Format(&e));
            AdapterError::Driver
        })?;

    Timer::after(Duration::from_millis(500)).await;

    let device = interfaces.sta;
    let mac = device.mac_address();

    let net_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, runner) = embassy_net::new(
        device,
        net_config,
        STACK_RESOURCES.init(StackResources::<STACK_SOCKETS>::new()),
        seed,
    );
    info!("Network stack initialized!");

    Ok(WifiParts {
        controller: wifi_controller,
        stack,
        runner,
        mac,
    })
}

/// Embassy task driving the network stack.
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    info!("Starting network task...");
    runner.run().await
}
