//! Sensirion SCD30 over I2C
//!
//! Only the commands needed to run continuous measurement are covered.
//! Every 16-bit word on the wire is followed by a CRC-8 (polynomial 0x31,
//! init 0xFF). The sensor needs a few milliseconds between a command write
//! and the following read.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{Sensor, SensorError};
use crate::reading::Reading;

const SENSOR: &str = "SCD30";

pub const DEFAULT_ADDRESS: u8 = 0x61;

/// Seconds between measurements in continuous mode
const MEASUREMENT_INTERVAL_S: u16 = 2;
/// Wait between a command and reading its response
const COMMAND_DELAY_MS: u32 = 3;

const CMD_START_CONTINUOUS: u16 = 0x0010;
const CMD_SET_INTERVAL: u16 = 0x4600;
const CMD_DATA_READY: u16 = 0x0202;
const CMD_READ_MEASUREMENT: u16 = 0x0300;
const CMD_FIRMWARE_VERSION: u16 = 0xD100;

/// Sensirion CRC-8 over one data word
pub const fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    let mut i = 0;
    while i < data.len() {
        crc ^= data[i];
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
            bit += 1;
        }
        i += 1;
    }
    crc
}

/// Check CRCs of a response and strip them, leaving the data words.
fn decode_words<const WORDS: usize>(raw: &[u8]) -> Result<[u16; WORDS], SensorError> {
    let mut words = [0u16; WORDS];
    for (word, chunk) in raw.chunks_exact(3).take(WORDS).enumerate() {
        if crc8(&chunk[..2]) != chunk[2] {
            return Err(SensorError::Crc {
                sensor: SENSOR,
                word,
            });
        }
        words[word] = u16::from_be_bytes([chunk[0], chunk[1]]);
    }
    Ok(words)
}

/// Decode a measurement frame: CO2 (ppm), temperature (°C) and relative
/// humidity (%), each a big-endian float split over two words.
pub fn decode_measurement(raw: &[u8; 18]) -> Result<Reading, SensorError> {
    let words = decode_words::<6>(raw)?;
    let float = |hi: u16, lo: u16| f32::from_bits(((hi as u32) << 16) | lo as u32);

    let co2 = float(words[0], words[1]);
    let temperature_c = float(words[2], words[3]);
    let humidity_pct = float(words[4], words[5]);

    // Float to int casts saturate, so negative noise reads as 0 ppm.
    Ok(Reading::new(co2 as u16, temperature_c, humidity_pct))
}

pub struct Scd30Sensor<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Scd30Sensor<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    pub fn release(self) -> I {
        self.i2c
    }

    async fn command(
        &mut self,
        command: u16,
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &command.to_be_bytes())
            .await
            .map_err(|e| {
                error!("{} {} write failed: {:?}", SENSOR, operation, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                }
            })
    }

    async fn command_with_arg(
        &mut self,
        command: u16,
        argument: u16,
        operation: &'static str,
    ) -> Result<(), SensorError> {
        let [c0, c1] = command.to_be_bytes();
        let [a0, a1] = argument.to_be_bytes();
        let frame = [c0, c1, a0, a1, crc8(&[a0, a1])];

        self.i2c.write(self.address, &frame).await.map_err(|e| {
            error!("{} {} write failed: {:?}", SENSOR, operation, e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation,
            }
        })
    }

    async fn read_response<const N: usize>(
        &mut self,
        command: u16,
        operation: &'static str,
    ) -> Result<[u8; N], SensorError> {
        self.command(command, operation).await?;
        self.delay.delay_ms(COMMAND_DELAY_MS).await;

        let mut buffer = [0u8; N];
        self.i2c
            .read(self.address, &mut buffer)
            .await
            .map_err(|e| {
                error!("{} {} read failed: {:?}", SENSOR, operation, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                }
            })?;
        Ok(buffer)
    }

    pub async fn firmware_version(&mut self) -> Result<(u8, u8), SensorError> {
        let raw = self
            .read_response::<3>(CMD_FIRMWARE_VERSION, "read firmware version")
            .await?;
        let [version] = decode_words::<1>(&raw)?;
        let [major, minor] = version.to_be_bytes();
        Ok((major, minor))
    }
}

impl<I: I2c, D: DelayNs> Sensor for Scd30Sensor<I, D> {
    async fn begin(&mut self) -> Result<(), SensorError> {
        let (major, minor) = self
            .firmware_version()
            .await
            .map_err(|_| SensorError::NotFound { sensor: SENSOR })?;
        info!("SCD30 firmware {}.{} detected", major, minor);

        // Ambient pressure compensation disabled
        self.command_with_arg(CMD_START_CONTINUOUS, 0, "start continuous measurement")
            .await?;
        self.command_with_arg(
            CMD_SET_INTERVAL,
            MEASUREMENT_INTERVAL_S,
            "set measurement interval",
        )
        .await?;

        info!("SCD30 measuring every {}s", MEASUREMENT_INTERVAL_S);
        Ok(())
    }

    async fn data_ready(&mut self) -> Result<bool, SensorError> {
        let raw = self
            .read_response::<3>(CMD_DATA_READY, "check data ready status")
            .await?;
        let [ready] = decode_words::<1>(&raw)?;
        Ok(ready == 1)
    }

    async fn read(&mut self) -> Result<Reading, SensorError> {
        let raw = self
            .read_response::<18>(CMD_READ_MEASUREMENT, "read measurement")
            .await?;
        let reading = decode_measurement(&raw)?;
        debug!(
            "co2(ppm): {} temp(C): {:.2} humidity(%): {:.2}",
            reading.co2_ppm, reading.temperature_c, reading.humidity_pct
        );
        Ok(reading)
    }
}
