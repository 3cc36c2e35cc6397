//! Hardware-independent core library for co2ring
//!
//! This crate contains all platform-agnostic logic for the CO2 monitor: the
//! alert state machine, LED ring patterns, connectivity retry policy, the
//! publish timer and record format, sensor trait definitions and the
//! application loop that ties them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod alert;
pub mod app_state;
pub mod config;
pub mod connectivity;
pub mod publisher;
pub mod reading;
pub mod ring;
pub mod sensors;
pub mod timer;

#[cfg(test)]
pub(crate) mod test_support;
