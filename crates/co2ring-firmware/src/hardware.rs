//! Peripheral setup for the co2ring board
//!
//! The SCD30 sits on I2C0 and the 24-pixel WS2812 ring is driven by RMT
//! channel 0.

use co2ring_core::config::LED_COUNT;
use esp_hal::gpio::interconnect::PeripheralOutput;
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError, I2c};
use esp_hal::peripherals::{I2C0, RMT};
use esp_hal::rmt::{PulseCode, Rmt};
use esp_hal::time::Rate;
use esp_hal::Async;
use esp_hal_smartled::{SmartLedsAdapterAsync, smart_led_buffer};
use log::info;
use static_cell::StaticCell;

/// One RMT pulse per bit of every pixel, plus the end marker
pub const RING_BUFFER_LEN: usize = LED_COUNT * 24 + 1;

pub type RingWriter = SmartLedsAdapterAsync<'static, RING_BUFFER_LEN>;
pub type SensorBus = I2c<'static, Async>;

/// Create the sensor I2C bus.
///
/// The SCD30 tolerates at most 100 kHz.
pub fn create_i2c_bus(
    i2c0: I2C0<'static>,
    sda: impl PeripheralOutput<'static>,
    scl: impl PeripheralOutput<'static>,
) -> Result<SensorBus, ConfigError> {
    let bus = I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(100)))?
        .with_sda(sda)
        .with_scl(scl)
        .into_async();
    info!("Sensor I2C bus ready");
    Ok(bus)
}

/// Create the LED ring writer on RMT channel 0.
pub fn create_ring_writer(
    rmt: RMT<'static>,
    data_pin: impl PeripheralOutput<'static>,
) -> Result<RingWriter, esp_hal::rmt::Error> {
    static RMT_BUFFER: StaticCell<[PulseCode; RING_BUFFER_LEN]> = StaticCell::new();
    let buffer = RMT_BUFFER.init(smart_led_buffer!(LED_COUNT));

    let rmt = Rmt::new(rmt, Rate::from_mhz(80))?.into_async();
    info!("LED ring on RMT channel 0 ({} pixels)", LED_COUNT);
    Ok(SmartLedsAdapterAsync::new(rmt.channel0, data_pin, buffer))
}
