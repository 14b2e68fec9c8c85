//! Bounded event trace shared by firmware and host targets.
//!
//! The controller records a short history of what it did so the emulator can
//! replay a session and the firmware can count drops without heap
//! allocation. Recording never blocks the control path; when the ring is
//! full the oldest entry is evicted.

use heapless::Deque;

use crate::channels::{ChannelId, ChannelState};

/// Number of events retained before the oldest is evicted.
pub const EVENT_CAPACITY: usize = 16;

/// Classifies a recorded controller event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// A parsed command was accepted for dispatch.
    CommandAccepted,
    /// A completed line matched no keyword and was dropped.
    CommandIgnored,
    /// A drive coil was energized.
    PulseStarted,
    /// A pulse finished and the channel state was committed.
    PulseCompleted,
    /// A button press edge toggled a channel.
    ButtonToggle,
    /// An over-length line was rejected.
    LineOverflow,
    /// A transport fault was reported by the receiver.
    TransportFault,
}

/// One recorded event with optional channel context.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryEvent {
    pub kind: TelemetryEventKind,
    pub channel: Option<ChannelId>,
    pub state: Option<ChannelState>,
}

impl TelemetryEvent {
    pub const fn new(kind: TelemetryEventKind) -> Self {
        Self {
            kind,
            channel: None,
            state: None,
        }
    }

    pub const fn for_channel(kind: TelemetryEventKind, channel: ChannelId) -> Self {
        Self {
            kind,
            channel: Some(channel),
            state: None,
        }
    }

    pub const fn for_pulse(
        kind: TelemetryEventKind,
        channel: ChannelId,
        state: ChannelState,
    ) -> Self {
        Self {
            kind,
            channel: Some(channel),
            state: Some(state),
        }
    }
}

/// Drop-oldest ring of recent [`TelemetryEvent`]s.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Deque<TelemetryEvent, EVENT_CAPACITY>,
    evicted: u32,
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            evicted: 0,
        }
    }

    /// Appends an event, evicting the oldest entry when full.
    pub fn record(&mut self, event: TelemetryEvent) {
        if self.events.is_full() {
            let _ = self.events.pop_front();
            self.evicted = self.evicted.saturating_add(1);
        }
        // Cannot fail: a slot was just freed if the ring was full.
        let _ = self.events.push_back(event);
    }

    /// Iterates events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.events.iter()
    }

    /// Number of events currently retained.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when no events are retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Count of events evicted to make room since startup.
    pub const fn evicted(&self) -> u32 {
        self.evicted
    }
}
