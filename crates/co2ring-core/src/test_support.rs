//! In-memory stand-ins for the hardware traits, shared by the unit tests.

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use smart_leds::{RGB8, SmartLedsWriteAsync};

use crate::connectivity::{MqttLink, WifiLink};
use crate::reading::Reading;
use crate::sensors::{Sensor, SensorError};

/// Adds up requested delays instead of sleeping.
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay {
    total_ns: u64,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    async fn delay_us(&mut self, us: u32) {
        self.total_ns += us as u64 * 1_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ns += ms as u64 * 1_000_000;
    }
}

/// Keeps every frame pushed to the LEDs.
#[derive(Debug, Default)]
pub struct RecordingStrip {
    pub frames: Vec<Vec<RGB8>>,
}

impl SmartLedsWriteAsync for RecordingStrip {
    type Error = Infallible;
    type Color = RGB8;

    async fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.frames.push(iterator.into_iter().map(Into::into).collect());
        Ok(())
    }
}

/// I2C bus that records writes and answers reads from a queue.
#[derive(Debug, Default)]
pub struct FakeI2c {
    pub writes: Vec<(u8, Vec<u8>)>,
    pub responses: VecDeque<Vec<u8>>,
    pub absent: bool,
}

impl FakeI2c {
    pub fn absent() -> Self {
        Self {
            absent: true,
            ..Self::default()
        }
    }
}

impl ErrorType for FakeI2c {
    type Error = ErrorKind;
}

impl I2c for FakeI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.absent {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                Operation::Read(buffer) => {
                    let response = self.responses.pop_front().ok_or(ErrorKind::Other)?;
                    buffer.copy_from_slice(&response[..buffer.len()]);
                }
            }
        }
        Ok(())
    }
}

/// WiFi link that associates after a set number of status polls.
#[derive(Debug, Default)]
pub struct ScriptedWifi {
    pub begin_calls: u32,
    pub fail_begin: bool,
    polls_needed: Option<u32>,
    polls: u32,
    always_up: bool,
}

impl ScriptedWifi {
    pub fn connected() -> Self {
        Self {
            always_up: true,
            ..Self::default()
        }
    }

    pub fn connects_after(polls: u32) -> Self {
        Self {
            polls_needed: Some(polls),
            ..Self::default()
        }
    }

    pub fn never() -> Self {
        Self::default()
    }
}

impl WifiLink for ScriptedWifi {
    type Error = LinkDown;

    fn is_connected(&mut self) -> bool {
        if self.always_up {
            return true;
        }
        if self.begin_calls == 0 {
            return false;
        }
        self.polls += 1;
        self.polls_needed.is_some_and(|needed| self.polls > needed)
    }

    async fn begin(&mut self) -> Result<(), Self::Error> {
        self.begin_calls += 1;
        if self.fail_begin {
            return Err(LinkDown);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkDown;

/// Broker link with scripted connect failures and a publish log.
#[derive(Debug, Default)]
pub struct ScriptedMqtt {
    pub connect_calls: u32,
    pub poll_calls: u32,
    pub published: Vec<(String, Vec<u8>)>,
    pub fail_publish: bool,
    pub fail_poll: bool,
    failures_left: u32,
    connected: bool,
}

impl ScriptedMqtt {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn connects_after(failures: u32) -> Self {
        Self {
            failures_left: failures,
            ..Self::default()
        }
    }

    pub fn never() -> Self {
        Self::connects_after(u32::MAX)
    }

    pub fn drop_connection(&mut self) {
        self.connected = false;
    }
}

impl MqttLink for ScriptedMqtt {
    type Error = LinkDown;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_calls += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(LinkDown);
        }
        self.connected = true;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if self.fail_publish {
            self.connected = false;
            return Err(LinkDown);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn poll(&mut self) -> Result<(), Self::Error> {
        self.poll_calls += 1;
        if self.fail_poll {
            self.connected = false;
            return Err(LinkDown);
        }
        Ok(())
    }
}

/// Sensor replaying a fixed list of readings, one per poll.
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    pub readings: VecDeque<Result<Reading, SensorError>>,
    pub present: bool,
    pub begin_calls: u32,
}

impl ScriptedSensor {
    pub fn with_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            readings: readings.into_iter().map(Ok).collect(),
            present: true,
            begin_calls: 0,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

impl Sensor for ScriptedSensor {
    async fn begin(&mut self) -> Result<(), SensorError> {
        self.begin_calls += 1;
        if self.present {
            Ok(())
        } else {
            Err(SensorError::NotFound { sensor: "scripted" })
        }
    }

    async fn data_ready(&mut self) -> Result<bool, SensorError> {
        Ok(!self.readings.is_empty())
    }

    async fn read(&mut self) -> Result<Reading, SensorError> {
        self.readings
            .pop_front()
            .unwrap_or(Err(SensorError::ReadFailed {
                sensor: "scripted",
                operation: "read measurement",
            }))
    }
}
