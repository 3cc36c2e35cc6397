//! Compile-time device configuration
//!
//! Everything the device needs to know is fixed at build time. Firmware fills
//! the credentials from the build environment and keeps the remaining
//! defaults.

use core::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::connectivity::RetryPolicy;

pub const HOSTNAME: &str = "CO2_SENSOR";
pub const FIRMWARE_VERSION: &str = "1.0";

pub const MQTT_SERVER: &str = "mqtt.guiet.lan";
pub const MQTT_PORT: u16 = 1883;
pub const MQTT_CLIENT_ID: &str = "CO2SensorMqttClient";
pub const MQTT_TOPIC: &str = "guiet/co2sensor/1";

/// Pixels on the indicator ring
pub const LED_COUNT: usize = 24;
/// Global ring brightness, 0 (off) to 255
pub const BRIGHTNESS: u8 = 100;

/// Publish one record per minute
pub const PUBLISH_INTERVAL_MS: u32 = 60_000;

/// Connection attempts before the device restarts
pub const MAX_RETRY: u32 = 50;
pub const RETRY_DELAY_MS: u32 = 500;

/// CO2 band boundaries in ppm
pub const CO2_MEDIUM_PPM: u16 = 800;
pub const CO2_HIGH_PPM: u16 = 1200;
pub const CO2_CRITICAL_PPM: u16 = 2000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub mqtt: MqttConfig<'a>,
    pub device: DeviceConfig<'a>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MqttConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub topic: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig<'a> {
    pub hostname: &'a str,
    pub firmware: &'a str,
    pub brightness: u8,
    pub publish_interval_ms: u32,
    pub max_retry: u32,
    pub retry_delay_ms: u32,
    #[serde(skip, default = "default_log_level")]
    pub log_level: LevelFilter,
}

const fn default_log_level() -> LevelFilter {
    LevelFilter::Info
}

impl<'a> Config<'a> {
    /// Build the device configuration around a set of WiFi credentials.
    pub const fn with_credentials(ssid: &'a str, password: &'a str) -> Self {
        Self {
            internet: InternetConfig { ssid, password },
            mqtt: MqttConfig::DEFAULT,
            device: DeviceConfig::DEFAULT,
        }
    }
}

impl Default for Config<'_> {
    fn default() -> Self {
        Self::with_credentials("", "")
    }
}

impl MqttConfig<'static> {
    pub const DEFAULT: Self = Self {
        host: MQTT_SERVER,
        port: MQTT_PORT,
        client_id: MQTT_CLIENT_ID,
        topic: MQTT_TOPIC,
    };
}

impl Default for MqttConfig<'_> {
    fn default() -> Self {
        MqttConfig::DEFAULT
    }
}

impl DeviceConfig<'static> {
    pub const DEFAULT: Self = Self {
        hostname: HOSTNAME,
        firmware: FIRMWARE_VERSION,
        brightness: BRIGHTNESS,
        publish_interval_ms: PUBLISH_INTERVAL_MS,
        max_retry: MAX_RETRY,
        retry_delay_ms: RETRY_DELAY_MS,
        log_level: default_log_level(),
    };
}

impl Default for DeviceConfig<'_> {
    fn default() -> Self {
        DeviceConfig::DEFAULT
    }
}

impl DeviceConfig<'_> {
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry,
            delay: Duration::from_millis(self.retry_delay_ms as u64),
        }
    }
}
