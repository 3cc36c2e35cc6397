//! ESP32-S3 firmware-specific modules for co2ring
//!
//! This crate contains the hardware-bound halves of the core traits: the
//! esp-radio WiFi station, the rust-mqtt broker session over embassy-net,
//! the RMT-driven LED ring and the build-time WiFi credentials.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod mqtt;
pub mod shared_socket;
pub mod wifi;
pub mod wifi_secrets;
