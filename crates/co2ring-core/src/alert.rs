//! CO2 alert levels and the hysteresis state machine that picks what the
//! ring shows.
//!
//! The ring is only redrawn when the level changes. Each of the steady
//! levels (Low, Medium, High) owns a guard flag: entering the level disarms
//! its own flag and re-arms the others, so a reading that stays in the same
//! band does not touch the LEDs again. Critical is momentary and blinks on
//! every reading that reaches it.

use core::time::Duration;

use smart_leds::RGB8;

use crate::config::{CO2_CRITICAL_PPM, CO2_HIGH_PPM, CO2_MEDIUM_PPM};
use crate::ring::{RingPattern, colors};

const CRITICAL_BLINK_COUNT: u8 = 3;
const CRITICAL_BLINK_PERIOD: Duration = Duration::from_millis(250);

/// Air quality band derived from a CO2 concentration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Below 800 ppm
    Low,
    /// 800 ppm up to, but excluding, 1200 ppm
    Medium,
    /// Above 1200 ppm and below 2000 ppm
    High,
    /// 2000 ppm and above
    Critical,
}

impl AlertLevel {
    /// Classify a CO2 concentration.
    ///
    /// Exactly 1200 ppm belongs to no band and yields `None`.
    pub const fn classify(co2_ppm: u16) -> Option<Self> {
        if co2_ppm < CO2_MEDIUM_PPM {
            Some(Self::Low)
        } else if co2_ppm < CO2_HIGH_PPM {
            Some(Self::Medium)
        } else if co2_ppm > CO2_HIGH_PPM && co2_ppm < CO2_CRITICAL_PPM {
            Some(Self::High)
        } else if co2_ppm >= CO2_CRITICAL_PPM {
            Some(Self::Critical)
        } else {
            None
        }
    }

    pub const fn color(self) -> RGB8 {
        match self {
            Self::Low => colors::GREEN,
            Self::Medium => colors::ORANGE,
            Self::High | Self::Critical => colors::RED,
        }
    }

    /// Pattern drawn on the ring when this level is entered
    pub const fn pattern(self) -> RingPattern {
        match self {
            Self::Low | Self::Medium | Self::High => RingPattern::Cardinal(self.color()),
            Self::Critical => RingPattern::Blink {
                color: self.color(),
                count: CRITICAL_BLINK_COUNT,
                period: CRITICAL_BLINK_PERIOD,
            },
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Render guards for the steady levels.
///
/// A flag is `true` while its level may still be rendered, i.e. the level
/// has not been entered since the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisFlags {
    pub low: bool,
    pub medium: bool,
    pub high: bool,
}

impl HysteresisFlags {
    pub const ARMED: Self = Self {
        low: true,
        medium: true,
        high: true,
    };

    const fn entered(level: AlertLevel) -> Self {
        Self {
            low: !matches!(level, AlertLevel::Low),
            medium: !matches!(level, AlertLevel::Medium),
            high: !matches!(level, AlertLevel::High),
        }
    }

    const fn is_armed(&self, level: AlertLevel) -> bool {
        match level {
            AlertLevel::Low => self.low,
            AlertLevel::Medium => self.medium,
            AlertLevel::High => self.high,
            AlertLevel::Critical => true,
        }
    }
}

impl Default for HysteresisFlags {
    fn default() -> Self {
        Self::ARMED
    }
}

#[derive(Debug, Default)]
pub struct AlertStateMachine {
    flags: HysteresisFlags,
}

impl AlertStateMachine {
    pub const fn new() -> Self {
        Self {
            flags: HysteresisFlags::ARMED,
        }
    }

    pub const fn flags(&self) -> HysteresisFlags {
        self.flags
    }

    /// Feed a reading and get the pattern to draw, if the ring must change.
    pub fn update(&mut self, co2_ppm: u16) -> Option<RingPattern> {
        let level = AlertLevel::classify(co2_ppm)?;

        if !self.flags.is_armed(level) {
            return None;
        }

        self.flags = HysteresisFlags::entered(level);
        Some(level.pattern())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_band_boundaries() {
        assert_eq!(AlertLevel::classify(0), Some(AlertLevel::Low));
        assert_eq!(AlertLevel::classify(799), Some(AlertLevel::Low));
        assert_eq!(AlertLevel::classify(800), Some(AlertLevel::Medium));
        assert_eq!(AlertLevel::classify(1199), Some(AlertLevel::Medium));
        assert_eq!(AlertLevel::classify(1200), None);
        assert_eq!(AlertLevel::classify(1201), Some(AlertLevel::High));
        assert_eq!(AlertLevel::classify(1999), Some(AlertLevel::High));
        assert_eq!(AlertLevel::classify(2000), Some(AlertLevel::Critical));
        assert_eq!(AlertLevel::classify(u16::MAX), Some(AlertLevel::Critical));
    }

    #[test]
    fn low_renders_once_per_entry() {
        let mut machine = AlertStateMachine::new();

        let renders = [400, 450, 799, 500]
            .into_iter()
            .filter_map(|ppm| machine.update(ppm))
            .count();
        assert_eq!(renders, 1);

        assert!(machine.update(900).is_some());
        assert_eq!(
            machine.update(600),
            Some(RingPattern::Cardinal(colors::GREEN))
        );
        assert_eq!(machine.update(610), None);
    }

    #[test]
    fn every_low_reading_range_renders_once_from_fresh_state() {
        for ppm in (0..800).step_by(37) {
            let mut machine = AlertStateMachine::new();
            assert_eq!(machine.update(ppm), Some(AlertLevel::Low.pattern()));
            assert_eq!(machine.update(ppm), None);
        }
    }

    #[test]
    fn medium_and_high_render_once_per_entry() {
        let mut machine = AlertStateMachine::new();

        assert_eq!(
            machine.update(1000),
            Some(RingPattern::Cardinal(colors::ORANGE))
        );
        assert_eq!(machine.update(1100), None);
        assert_eq!(
            machine.update(1500),
            Some(RingPattern::Cardinal(colors::RED))
        );
        assert_eq!(machine.update(1999), None);
        assert_eq!(
            machine.update(1000),
            Some(RingPattern::Cardinal(colors::ORANGE))
        );
    }

    #[test]
    fn critical_retriggers_and_rearms_everything() {
        let mut machine = AlertStateMachine::new();
        machine.update(1500);

        let blink = AlertLevel::Critical.pattern();
        assert_eq!(machine.update(2500), Some(blink));
        assert_eq!(machine.update(2500), Some(blink));
        assert_eq!(machine.flags(), HysteresisFlags::ARMED);

        // High was already shown before the spike but is drawn again after it.
        assert_eq!(
            machine.update(1500),
            Some(RingPattern::Cardinal(colors::RED))
        );
    }

    #[test]
    fn exactly_1200_leaves_ring_and_flags_untouched() {
        let mut machine = AlertStateMachine::new();
        machine.update(1000);
        let before = machine.flags();

        assert_eq!(machine.update(1200), None);
        assert_eq!(machine.flags(), before);
        assert_eq!(machine.update(1100), None);
    }

    #[test]
    fn entering_a_level_rearms_the_others() {
        let mut machine = AlertStateMachine::new();
        machine.update(1000);

        assert_eq!(
            machine.flags(),
            HysteresisFlags {
                low: true,
                medium: false,
                high: true,
            }
        );
    }
}
