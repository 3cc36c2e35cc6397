//! LED ring driver
//!
//! Keeps a frame of `N` pixels and pushes it through any async smart-LED
//! writer. Timing for blink patterns comes from the supplied delay, so every
//! pattern blocks the caller until it has finished.

use core::fmt::Debug;
use core::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::warn;
use smart_leds::{RGB8, SmartLedsWriteAsync, brightness};

pub mod colors {
    use smart_leds::RGB8;

    pub const OFF: RGB8 = RGB8::new(0, 0, 0);
    pub const BLUE: RGB8 = RGB8::new(0, 0, 255);
    pub const RED: RGB8 = RGB8::new(255, 0, 0);
    pub const GREEN: RGB8 = RGB8::new(0, 255, 0);
    pub const ORANGE: RGB8 = RGB8::new(255, 106, 0);
    pub const WHITE: RGB8 = RGB8::new(255, 255, 255);
}

const STARTUP_BLINK_COUNT: u8 = 3;
const STARTUP_BLINK_PERIOD: Duration = Duration::from_millis(500);
const FAULT_BLINK_PERIOD: Duration = Duration::from_millis(1000);

/// What to draw on the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPattern {
    /// Four evenly spaced pixels lit, the rest off
    Cardinal(RGB8),
    /// Whole ring flashes `count` times, ending dark
    Blink {
        color: RGB8,
        count: u8,
        period: Duration,
    },
}

pub struct LedRing<W, D, const N: usize> {
    writer: W,
    delay: D,
    pixels: [RGB8; N],
    brightness: u8,
}

impl<W, D, const N: usize> LedRing<W, D, N>
where
    W: SmartLedsWriteAsync<Color = RGB8>,
    W::Error: Debug,
    D: DelayNs,
{
    pub fn new(writer: W, delay: D, brightness: u8) -> Self {
        Self {
            writer,
            delay,
            pixels: [colors::OFF; N],
            brightness,
        }
    }

    /// Current frame, before brightness scaling
    pub fn pixels(&self) -> &[RGB8; N] {
        &self.pixels
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Indices of the four quarter-position pixels.
    ///
    /// On a 24 pixel ring these are 5, 11, 17 and 23.
    pub const fn cardinal_indices() -> [usize; 4] {
        [N / 4 - 1, N / 2 - 1, 3 * N / 4 - 1, N - 1]
    }

    /// Push the frame to the LEDs.
    pub async fn show(&mut self) {
        let frame = brightness(self.pixels.iter().copied(), self.brightness);
        if let Err(e) = self.writer.write(frame).await {
            warn!("LED ring write failed: {:?}", e);
        }
    }

    pub fn fill(&mut self, color: RGB8) {
        self.pixels = [color; N];
    }

    pub async fn clear(&mut self) {
        self.fill(colors::OFF);
        self.show().await;
    }

    pub async fn show_cardinal_points(&mut self, color: RGB8) {
        self.clear().await;

        for index in Self::cardinal_indices() {
            self.pixels[index] = color;
        }
        self.show().await;
    }

    pub async fn blink(&mut self, color: RGB8, count: u8, period: Duration) {
        let period_ms = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);

        for _ in 0..count {
            self.clear().await;
            self.delay.delay_ms(period_ms).await;
            self.fill(color);
            self.show().await;
            self.delay.delay_ms(period_ms).await;
        }

        self.clear().await;
    }

    pub async fn render(&mut self, pattern: RingPattern) {
        match pattern {
            RingPattern::Cardinal(color) => self.show_cardinal_points(color).await,
            RingPattern::Blink {
                color,
                count,
                period,
            } => self.blink(color, count, period).await,
        }
    }

    /// Boot indication shown before the sensor is brought up.
    pub async fn startup(&mut self) {
        self.clear().await;
        self.blink(colors::BLUE, STARTUP_BLINK_COUNT, STARTUP_BLINK_PERIOD)
            .await;
    }

    /// Blink red forever. Used when the device cannot continue without a
    /// physical fix.
    pub async fn halt_with_fault(&mut self) -> ! {
        loop {
            self.blink(colors::RED, 1, FAULT_BLINK_PERIOD).await;
        }
    }
}
