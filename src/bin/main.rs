#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_println::{Printer, println};
use panic_rtt_target as _;

use wifi_ntp::adapter::EspWifiAdapter;
use wifi_ntp::allocator;
use wifi_ntp::config::Config;
use wifi_ntp::ntp::NtpClient;
use wifi_ntp::radio::{init_wifi, net_task};
use wifi_ntp::sequencer::Sequencer;

esp_bootloader_esp_idf::esp_app_desc!();

/// Park the core after a fatal error, reporting `code` as the exit status.
async fn halt(code: i32) -> ! {
    error!("Exiting with status {}", code);
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    allocator::init_heap();

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let parts = match init_wifi(peripherals.WIFI, seed).await {
        Ok(parts) => parts,
        Err(e) => {
            println!("WiFi initialization failed: {}", e);
            halt(-1).await
        }
    };

    if let Err(e) = spawner.spawn(net_task(parts.runner)) {
        error!("Failed to spawn network task: {}", defmt::Debug2Format(&e));
        halt(-1).await
    }

    let adapter = EspWifiAdapter::new(parts.controller, parts.stack, parts.mac);
    let time_client = NtpClient::new(parts.stack);
    let mut sequencer = Sequencer::new(Config::DEFAULT, adapter, time_client, Delay, Printer);

    match sequencer.run().await {
        Ok(never) => match never {},
        Err(e) => {
            error!("Sequence stopped: {}", e);
            halt(e.exit_code()).await
        }
    }
}
