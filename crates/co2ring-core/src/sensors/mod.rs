#[cfg(feature = "sensor-scd30")]
pub mod scd30;

use thiserror_no_std::Error;

use crate::reading::Reading;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} not detected, check wiring")]
    NotFound { sensor: &'static str },
    #[error("{sensor} failed to {operation}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor} CRC mismatch in word {word}")]
    Crc { sensor: &'static str, word: usize },
}

/// Trait for a CO2/temperature/humidity source.
pub trait Sensor {
    /// Detect the device and start measuring.
    ///
    /// Returns [`SensorError::NotFound`] when nothing answers on the bus.
    fn begin(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Whether a fresh measurement can be read without waiting.
    fn data_ready(&mut self) -> impl Future<Output = Result<bool, SensorError>>;

    /// Read the latest measurement.
    fn read(&mut self) -> impl Future<Output = Result<Reading, SensorError>>;
}

#[cfg(feature = "sensor-scd30")]
pub use scd30::Scd30Sensor;
