//! Channel data structures shared by firmware and host targets.
//!
//! Each of the four controlled channels is a bistable electromechanical
//! switch latched by pulsing one half of a SET/RESET drive pair. Everything
//! in this module is `no_std` friendly so the same definitions can be
//! compiled for both the STM32 firmware and the host-side emulator.

/// Identifier for the logical channels exposed by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelId {
    C1,
    C2,
    C3,
    C4,
}

/// Number of channels in the bank.
pub const CHANNEL_COUNT: usize = 4;

impl ChannelId {
    /// Deterministic index for lookups into [`ALL_CHANNELS`].
    pub const fn as_index(self) -> usize {
        match self {
            ChannelId::C1 => 0,
            ChannelId::C2 => 1,
            ChannelId::C3 => 2,
            ChannelId::C4 => 3,
        }
    }

    /// Attempts to construct a [`ChannelId`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ChannelId::C1),
            1 => Some(ChannelId::C2),
            2 => Some(ChannelId::C3),
            3 => Some(ChannelId::C4),
            _ => None,
        }
    }

    /// Attempts to construct a [`ChannelId`] from the 1-based protocol number.
    ///
    /// Returns `None` for anything outside `1..=4`, which makes actuation
    /// requests against unknown channels a no-op by construction.
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(ChannelId::C1),
            2 => Some(ChannelId::C2),
            3 => Some(ChannelId::C3),
            4 => Some(ChannelId::C4),
            _ => None,
        }
    }

    /// The 1-based channel number used by the serial protocol.
    pub const fn number(self) -> u8 {
        self.as_index() as u8 + 1
    }

    /// Iterator over all channels in protocol order.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..CHANNEL_COUNT).filter_map(ChannelId::from_index)
    }
}

/// Committed logical state of a bistable channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelState {
    Set,
    Reset,
}

impl ChannelState {
    /// Converts the protocol boolean (`V != 0`) into a state.
    pub const fn from_bool(value: bool) -> Self {
        if value {
            ChannelState::Set
        } else {
            ChannelState::Reset
        }
    }

    /// Returns `true` when the channel is latched SET.
    pub const fn is_set(self) -> bool {
        matches!(self, ChannelState::Set)
    }

    /// The `0`/`1` digit reported over the serial protocol.
    pub const fn as_bit(self) -> u8 {
        match self {
            ChannelState::Set => 1,
            ChannelState::Reset => 0,
        }
    }

    /// The opposite state, used for button toggles.
    pub const fn toggled(self) -> Self {
        match self {
            ChannelState::Set => ChannelState::Reset,
            ChannelState::Reset => ChannelState::Set,
        }
    }

    /// The drive coil that latches a channel into this state.
    pub const fn coil(self) -> DriveCoil {
        match self {
            ChannelState::Set => DriveCoil::Set,
            ChannelState::Reset => DriveCoil::Reset,
        }
    }
}

/// Half of the H-bridge drive pair energized during a pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriveCoil {
    Set,
    Reset,
}

/// Metadata describing how a channel is routed on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelLine {
    pub id: ChannelId,
    pub name: &'static str,
    pub set_pin: &'static str,
    pub reset_pin: &'static str,
    pub indicator_pin: &'static str,
    pub button_pin: &'static str,
}

impl ChannelLine {
    pub const fn new(
        id: ChannelId,
        name: &'static str,
        set_pin: &'static str,
        reset_pin: &'static str,
        indicator_pin: &'static str,
        button_pin: &'static str,
    ) -> Self {
        Self {
            id,
            name,
            set_pin,
            reset_pin,
            indicator_pin,
            button_pin,
        }
    }
}

/// Compile-time catalog of every channel line.
pub const ALL_CHANNELS: [ChannelLine; CHANNEL_COUNT] = [
    ChannelLine::new(ChannelId::C1, "P1", "PA0", "PA1", "PB4", "PC6"),
    ChannelLine::new(ChannelId::C2, "P2", "PA6", "PA7", "PB5", "PC7"),
    ChannelLine::new(ChannelId::C3, "P3", "PB0", "PB1", "PB6", "PC8"),
    ChannelLine::new(ChannelId::C4, "P4", "PB2", "PB3", "PB7", "PC9"),
];

/// Retrieve channel metadata by identifier.
pub const fn channel_by_id(id: ChannelId) -> ChannelLine {
    ALL_CHANNELS[id.as_index()]
}

/// Committed state of the four channels.
///
/// Mutated only when a pulse completes; everything else reads it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelBank {
    states: [ChannelState; CHANNEL_COUNT],
}

impl ChannelBank {
    /// All channels start latched RESET at power-on.
    pub const fn new() -> Self {
        Self {
            states: [ChannelState::Reset; CHANNEL_COUNT],
        }
    }

    /// Returns the committed state of one channel.
    pub const fn state(&self, id: ChannelId) -> ChannelState {
        self.states[id.as_index()]
    }

    /// Records the new committed state after a pulse has finished.
    pub fn commit(&mut self, id: ChannelId, state: ChannelState) {
        self.states[id.as_index()] = state;
    }

    /// Snapshot of all four states in channel order.
    pub const fn states(&self) -> [ChannelState; CHANNEL_COUNT] {
        self.states
    }
}

impl Default for ChannelBank {
    fn default() -> Self {
        Self::new()
    }
}
