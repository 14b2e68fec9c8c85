//! Push-button sampling and edge detection.
//!
//! The sampler runs at a fixed periodic tick, independent of the control
//! loop, and publishes a debounced 4-bit snapshot. Debouncing is asymmetric
//! on purpose: a press registers on the very next tick, a release must stay
//! stable for [`DEBOUNCE_TICKS`] consecutive samples before the bit clears.
//! Responsive actuation wins over aggressive anti-bounce on release.

use crate::channels::{CHANNEL_COUNT, ChannelId};

/// Consecutive released samples required before a button reads released.
pub const DEBOUNCE_TICKS: u8 = 5;

/// Debounced button snapshot, one bit per channel button (bit 0 == P1).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct ButtonBitmask(u8);

impl ButtonBitmask {
    pub const EMPTY: Self = Self(0);

    /// Wraps a raw 4-bit mask; upper bits are discarded.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    /// Raw bits of the snapshot.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when the given channel's button reads pressed.
    pub const fn is_pressed(self, id: ChannelId) -> bool {
        self.0 & (1 << id.as_index()) != 0
    }

    /// Bits set in `self` but clear in `previous`: the press edges.
    pub const fn rising_from(self, previous: Self) -> Self {
        Self(self.0 & !previous.0)
    }
}

/// Raw per-tick electrical read of the four buttons, not persisted.
///
/// The buttons are wired active-low; [`RawButtonSample::from_levels`]
/// converts sampled line levels into pressed bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RawButtonSample(u8);

impl RawButtonSample {
    /// Builds a sample from already polarity-corrected pressed bits.
    pub const fn from_pressed_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    /// Builds a sample from raw line levels (low == pressed).
    pub const fn from_levels(levels: u8) -> Self {
        Self(!levels & 0x0f)
    }

    const fn pressed(self, index: usize) -> bool {
        self.0 & (1 << index) != 0
    }
}

/// Per-button countdown debouncer fed by the periodic sampler tick.
#[derive(Copy, Clone, Debug)]
pub struct Debouncer {
    counters: [u8; CHANNEL_COUNT],
    mask: ButtonBitmask,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            counters: [0; CHANNEL_COUNT],
            mask: ButtonBitmask::EMPTY,
        }
    }

    /// Feeds one raw sample and returns the updated debounced snapshot.
    ///
    /// A pressed sample sets the bit immediately and reloads the counter; a
    /// released sample only clears the bit after the counter has counted
    /// down to zero across consecutive released samples.
    pub fn sample(&mut self, raw: RawButtonSample) -> ButtonBitmask {
        let mut bits = self.mask.bits();
        for index in 0..CHANNEL_COUNT {
            if raw.pressed(index) {
                bits |= 1 << index;
                self.counters[index] = DEBOUNCE_TICKS;
            } else if self.counters[index] > 0 {
                self.counters[index] -= 1;
            } else {
                bits &= !(1 << index);
            }
        }

        self.mask = ButtonBitmask::from_bits(bits);
        self.mask
    }

    /// The most recent debounced snapshot.
    pub const fn mask(&self) -> ButtonBitmask {
        self.mask
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the previous iteration's snapshot to isolate press edges.
#[derive(Copy, Clone, Debug, Default)]
pub struct EdgeDetector {
    previous: ButtonBitmask,
}

impl EdgeDetector {
    pub const fn new() -> Self {
        Self {
            previous: ButtonBitmask::EMPTY,
        }
    }

    /// Returns the buttons newly pressed since the last call.
    pub fn rising(&mut self, current: ButtonBitmask) -> ButtonBitmask {
        let edges = current.rising_from(self.previous);
        self.previous = current;
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_registers_on_next_tick() {
        let mut debouncer = Debouncer::new();
        let mask = debouncer.sample(RawButtonSample::from_pressed_bits(0b0001));
        assert!(mask.is_pressed(ChannelId::C1));
        assert!(!mask.is_pressed(ChannelId::C2));
    }

    #[test]
    fn release_requires_full_debounce_window() {
        let mut debouncer = Debouncer::new();
        debouncer.sample(RawButtonSample::from_pressed_bits(0b0001));

        // Four released samples are not enough to clear the bit.
        for _ in 0..DEBOUNCE_TICKS - 1 {
            let mask = debouncer.sample(RawButtonSample::from_pressed_bits(0));
            assert!(mask.is_pressed(ChannelId::C1));
        }

        // The fifth consumes the counter; the sixth clears the bit.
        let mask = debouncer.sample(RawButtonSample::from_pressed_bits(0));
        assert!(mask.is_pressed(ChannelId::C1));
        let mask = debouncer.sample(RawButtonSample::from_pressed_bits(0));
        assert!(!mask.is_pressed(ChannelId::C1));
    }

    #[test]
    fn bounce_faster_than_window_holds_the_bit() {
        let mut debouncer = Debouncer::new();
        debouncer.sample(RawButtonSample::from_pressed_bits(0b0001));

        // Oscillate released/pressed with fewer than DEBOUNCE_TICKS released
        // samples in a row; the bit must never drop.
        for _ in 0..10 {
            for _ in 0..DEBOUNCE_TICKS - 2 {
                let mask = debouncer.sample(RawButtonSample::from_pressed_bits(0));
                assert!(mask.is_pressed(ChannelId::C1));
            }
            let mask = debouncer.sample(RawButtonSample::from_pressed_bits(0b0001));
            assert!(mask.is_pressed(ChannelId::C1));
        }
    }

    #[test]
    fn active_low_levels_invert_into_pressed_bits() {
        let sample = RawButtonSample::from_levels(0b1110);
        assert!(sample.pressed(0));
        assert!(!sample.pressed(1));
    }

    #[test]
    fn edge_detector_reports_each_press_once() {
        let mut edges = EdgeDetector::new();
        let pressed = ButtonBitmask::from_bits(0b0100);

        let first = edges.rising(pressed);
        assert!(first.is_pressed(ChannelId::C3));

        // Held across further iterations: no new edge.
        for _ in 0..5 {
            assert_eq!(edges.rising(pressed), ButtonBitmask::EMPTY);
        }

        // Release then press again produces a fresh edge.
        edges.rising(ButtonBitmask::EMPTY);
        let again = edges.rising(pressed);
        assert!(again.is_pressed(ChannelId::C3));
    }
}
