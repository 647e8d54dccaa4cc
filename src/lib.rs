//! ESP32 WiFi and NTP bring-up library
//!
//! Brings up the on-chip WiFi radio with `esp-radio` and `embassy-net`,
//! lists nearby access points, joins a network and polls an NTP server,
//! printing everything to the serial console.
//!
//! ## Example
//!
//! ```no_run
//! use wifi_ntp::{allocator, config::Config, sequencer::Sequencer};
//! use embassy_executor::Spawner;
//!
//! #[esp_rtos::main]
//! async fn main(spawner: Spawner) -> ! {
//!     // Initialize heap
//!     allocator::init_heap();
//!
//!     // Bring up the radio, spawn the stack runner and run the sequence
//!     // ... (see bin/main.rs for complete example)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

/// Network interface adapter trait and its `esp-radio` implementation
pub mod adapter;

/// Memory allocation configuration
pub mod allocator;

/// Unix time to calendar text
pub mod calendar;

/// Build-time configuration
pub mod config;

/// Error types
pub mod error;

/// SNTP time client
pub mod ntp;

/// Radio and network stack bring-up
pub mod radio;

/// Access-point scanning
pub mod scanner;

/// Stage-by-stage program flow
pub mod sequencer;

/// Shared data types and static storage
pub mod types;
