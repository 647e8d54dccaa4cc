//! Memory allocation configuration for ESP32 WiFi operations.
//!
//! The radio driver keeps its buffers and internal state on the heap, and
//! scan results are collected into heap vectors.

/// Reclaimed RAM heap size (from bootloader sections)
const RECLAIMED_HEAP_SIZE: usize = 98768;

/// Main heap size for radio buffers, scan results and the DNS/UDP sockets
const MAIN_HEAP_SIZE: usize = 64 * 1024;

/// Initialize heap allocators for WiFi operations.
///
/// Sets up two regions: RAM reclaimed from the bootloader and a main heap.
/// Must be called once, before the radio is initialized.
pub fn init_heap() {
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: RECLAIMED_HEAP_SIZE);
    esp_alloc::heap_allocator!(size: MAIN_HEAP_SIZE);
}
