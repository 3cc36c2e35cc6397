//! Periodic publication of readings to the broker

use heapless::String;
use log::{debug, info};
use thiserror_no_std::Error;

use crate::config::{DeviceConfig, MqttConfig};
use crate::connectivity::MqttLink;
use crate::reading::{Reading, Record};
use crate::timer::PublishTimer;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to serialize record")]
    Serialize,
    #[error("broker rejected publish: {0}")]
    Link(String<64>),
}

pub struct Publisher<'a> {
    name: &'a str,
    firmware: &'a str,
    topic: &'a str,
    timer: PublishTimer,
}

impl<'a> Publisher<'a> {
    pub const fn new(
        name: &'a str,
        firmware: &'a str,
        topic: &'a str,
        interval_ms: u32,
    ) -> Self {
        Self {
            name,
            firmware,
            topic,
            timer: PublishTimer::new(interval_ms),
        }
    }

    pub const fn from_config(device: &DeviceConfig<'a>, mqtt: &MqttConfig<'a>) -> Self {
        Self::new(
            device.hostname,
            device.firmware,
            mqtt.topic,
            device.publish_interval_ms,
        )
    }

    pub fn record(&self, reading: &Reading) -> Record<'a> {
        Record::new(self.name, self.firmware, reading)
    }

    /// Publish `reading` if the interval has elapsed at `now_ms`.
    ///
    /// Returns `Ok(true)` when a record went out. The timer restarts on every
    /// attempt, so a failed publish waits a full interval like a successful
    /// one.
    pub async fn maybe_publish<M: MqttLink>(
        &mut self,
        reading: &Reading,
        now_ms: u32,
        mqtt: &mut M,
    ) -> Result<bool, PublishError> {
        if !self.timer.poll(now_ms) {
            return Ok(false);
        }

        let payload = self
            .record(reading)
            .to_json_bytes()
            .map_err(|_| PublishError::Serialize)?;

        mqtt.publish(self.topic, &payload).await.map_err(|e| {
            let mut details = String::new();
            // Overlong detail text is truncated, not an error.
            let _ = core::fmt::write(&mut details, format_args!("{:?}", e));
            PublishError::Link(details)
        })?;

        info!("Published reading to {}", self.topic);
        debug!(
            "Payload: {}",
            core::str::from_utf8(&payload).unwrap_or("<binary>")
        );
        Ok(true)
    }
}
