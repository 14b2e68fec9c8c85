//! Board bindings for the relay bench and push-buttons.
//!
//! The pin assignments mirror the catalog in
//! [`switchbank_core::channels::ALL_CHANNELS`]; GPIO construction happens
//! once at init and everything after that goes through the typed
//! [`DriveBench`] seam.

use embassy_stm32::gpio::{Input, Output};

use switchbank_core::buttons::RawButtonSample;
use switchbank_core::channels::{CHANNEL_COUNT, ChannelId, DriveCoil};
use switchbank_core::controller::DriveBench;

/// Drive stage for the four channels: SET/RESET coil pairs plus indicators.
pub struct RelayBench {
    set_coils: [Output<'static>; CHANNEL_COUNT],
    reset_coils: [Output<'static>; CHANNEL_COUNT],
    indicators: [Output<'static>; CHANNEL_COUNT],
}

impl RelayBench {
    /// Wraps the already-configured outputs; all coils must start released.
    pub fn new(
        set_coils: [Output<'static>; CHANNEL_COUNT],
        reset_coils: [Output<'static>; CHANNEL_COUNT],
        indicators: [Output<'static>; CHANNEL_COUNT],
    ) -> Self {
        Self {
            set_coils,
            reset_coils,
            indicators,
        }
    }

    fn coil_mut(&mut self, channel: ChannelId, coil: DriveCoil) -> &mut Output<'static> {
        let index = channel.as_index();
        match coil {
            DriveCoil::Set => &mut self.set_coils[index],
            DriveCoil::Reset => &mut self.reset_coils[index],
        }
    }
}

impl DriveBench for RelayBench {
    fn energize(&mut self, channel: ChannelId, coil: DriveCoil) {
        self.coil_mut(channel, coil).set_high();
    }

    fn release(&mut self, channel: ChannelId, coil: DriveCoil) {
        self.coil_mut(channel, coil).set_low();
    }

    fn set_indicator(&mut self, channel: ChannelId, lit: bool) {
        let indicator = &mut self.indicators[channel.as_index()];
        if lit {
            indicator.set_high();
        } else {
            indicator.set_low();
        }
    }
}

/// The four push-button inputs, wired active-low with pull-ups.
pub struct ButtonBank {
    inputs: [Input<'static>; CHANNEL_COUNT],
}

impl ButtonBank {
    pub fn new(inputs: [Input<'static>; CHANNEL_COUNT]) -> Self {
        Self { inputs }
    }

    /// One raw electrical read of all four buttons.
    pub fn sample(&self) -> RawButtonSample {
        let mut pressed = 0u8;
        for (index, input) in self.inputs.iter().enumerate() {
            if input.is_low() {
                pressed |= 1 << index;
            }
        }
        RawButtonSample::from_pressed_bits(pressed)
    }
}
