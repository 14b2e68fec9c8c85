//! Dispatcher and control-cycle glue shared between firmware and emulator.
//!
//! [`Controller`] owns the committed channel state and drives a
//! [`DriveBench`] implementation, but defers all timing to its caller: an
//! actuation is expressed as a [`PulsePlan`] that the platform shell runs as
//! energize → timed hold → [`Controller::finish_pulse`]. The control task
//! awaits the hold inline, so at most one pulse is ever in flight and no
//! serial input is serviced while a coil is energized.

use core::fmt::{self, Write};

use heapless::Vec;

use crate::buttons::{ButtonBitmask, EdgeDetector};
use crate::channels::{CHANNEL_COUNT, ChannelBank, ChannelId, ChannelState, DriveCoil};
use crate::protocol::{
    BANNER_PRODUCT, BANNER_READY, CommandMode, Keyword, LineAssembler, LineEvent, TransportError,
    parse_line,
};
use crate::telemetry::{EventLog, TelemetryEvent, TelemetryEventKind};

/// Pulse duration applied until the first `SWITCHTIME=` assignment.
pub const DEFAULT_SWITCH_TIME_MS: u32 = 300;

/// Abstraction over the physical relay drive stage.
///
/// Implementations must be non-blocking; the timed hold between
/// [`DriveBench::energize`] and [`DriveBench::release`] belongs to the
/// platform shell.
pub trait DriveBench {
    /// Energizes one half of the channel's drive pair.
    fn energize(&mut self, channel: ChannelId, coil: DriveCoil);

    /// De-energizes one half of the channel's drive pair.
    fn release(&mut self, channel: ChannelId, coil: DriveCoil);

    /// Drives the channel's indicator line.
    fn set_indicator(&mut self, channel: ChannelId, lit: bool);
}

/// Drive bench that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopBench;

impl NoopBench {
    /// Creates a new no-op bench.
    pub const fn new() -> Self {
        Self
    }
}

impl DriveBench for NoopBench {
    fn energize(&mut self, _: ChannelId, _: DriveCoil) {}

    fn release(&mut self, _: ChannelId, _: DriveCoil) {}

    fn set_indicator(&mut self, _: ChannelId, _: bool) {}
}

/// Process-lifetime state owned by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerState {
    bank: ChannelBank,
    switch_time_ms: u32,
}

impl ControllerState {
    pub const fn new() -> Self {
        Self {
            bank: ChannelBank::new(),
            switch_time_ms: DEFAULT_SWITCH_TIME_MS,
        }
    }

    /// Committed channel states.
    pub const fn bank(&self) -> &ChannelBank {
        &self.bank
    }

    /// Current pulse duration in milliseconds.
    pub const fn switch_time_ms(&self) -> u32 {
        self.switch_time_ms
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// One planned actuation: energize the coil, hold, release, commit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulsePlan {
    pub channel: ChannelId,
    pub target: ChannelState,
    pub hold_ms: u32,
    /// Serial assignments report the new state once the pulse completes;
    /// button toggles stay silent.
    pub respond: bool,
}

impl PulsePlan {
    /// The coil this plan energizes.
    pub const fn coil(&self) -> DriveCoil {
        self.target.coil()
    }
}

/// What servicing one serial byte amounted to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SerialOutcome {
    /// Byte buffered; the line is still incomplete.
    Pending,
    /// A command was dispatched and its response written.
    Answered,
    /// The line matched no keyword; dropped without a response.
    Ignored,
    /// Terminator ended an over-length line that was already rejected.
    Discarded,
    /// The line exceeded the buffer; a diagnostic was written.
    Overflow,
    /// A value keyword arrived without `?` or `=`; nothing to do.
    NoOp,
    /// An assignment needs a pulse; run the plan, then the response follows.
    Pulse(PulsePlan),
}

/// Writes the two-line startup banner.
pub fn write_banner<W: Write>(out: &mut W) -> fmt::Result {
    write!(out, "{BANNER_PRODUCT}\r\n{BANNER_READY}\r\n")
}

/// Ties line assembly, parsing, dispatch, and button toggles to one bench.
pub struct Controller<B> {
    state: ControllerState,
    bench: B,
    assembler: LineAssembler,
    edges: EdgeDetector,
    telemetry: EventLog,
}

impl<B> Controller<B> {
    /// Creates a controller around the provided bench.
    pub fn new(bench: B) -> Self {
        Self {
            state: ControllerState::new(),
            bench,
            assembler: LineAssembler::new(),
            edges: EdgeDetector::new(),
            telemetry: EventLog::new(),
        }
    }

    /// Read access to the process-lifetime state.
    pub const fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Recent controller events.
    pub const fn telemetry(&self) -> &EventLog {
        &self.telemetry
    }

    /// Returns an immutable reference to the underlying bench.
    pub const fn bench(&self) -> &B {
        &self.bench
    }

    /// Returns a mutable reference to the underlying bench.
    pub const fn bench_mut(&mut self) -> &mut B {
        &mut self.bench
    }
}

impl<B: DriveBench> Controller<B> {
    /// Services one pending serial byte.
    ///
    /// Queries and reports are answered immediately through `out`; channel
    /// assignments come back as [`SerialOutcome::Pulse`] for the caller to
    /// run before anything else happens.
    pub fn on_serial_byte<W: Write>(
        &mut self,
        byte: u8,
        out: &mut W,
    ) -> Result<SerialOutcome, fmt::Error> {
        match self.assembler.push(byte) {
            LineEvent::Pending => Ok(SerialOutcome::Pending),
            LineEvent::Discarded => Ok(SerialOutcome::Discarded),
            LineEvent::Overflow => {
                self.telemetry
                    .record(TelemetryEvent::new(TelemetryEventKind::LineOverflow));
                out.write_str("ERR line too long\r\n")?;
                Ok(SerialOutcome::Overflow)
            }
            LineEvent::Completed => {
                let command = parse_line(self.assembler.line());
                self.assembler.reset();
                self.dispatch(command, out)
            }
        }
    }

    /// Reports a transport fault on the output channel.
    ///
    /// The byte that accompanied the fault is still processed by the caller;
    /// reception never stops.
    pub fn on_transport_error<W: Write>(
        &mut self,
        error: TransportError,
        out: &mut W,
    ) -> fmt::Result {
        self.telemetry
            .record(TelemetryEvent::new(TelemetryEventKind::TransportFault));
        write!(out, "ERR {}\r\n", error.label())
    }

    fn dispatch<W: Write>(
        &mut self,
        command: Option<crate::protocol::ParsedCommand>,
        out: &mut W,
    ) -> Result<SerialOutcome, fmt::Error> {
        let Some(command) = command else {
            self.telemetry
                .record(TelemetryEvent::new(TelemetryEventKind::CommandIgnored));
            return Ok(SerialOutcome::Ignored);
        };

        match (command.keyword, command.mode) {
            (Keyword::Channel(channel), CommandMode::Query) => {
                self.accept();
                write_channel_report(out, channel, self.state.bank.state(channel))?;
                Ok(SerialOutcome::Answered)
            }
            (Keyword::Channel(channel), CommandMode::Assign(value)) => {
                self.accept();
                Ok(SerialOutcome::Pulse(PulsePlan {
                    channel,
                    target: ChannelState::from_bool(value != 0),
                    hold_ms: self.state.switch_time_ms,
                    respond: true,
                }))
            }
            (Keyword::SwitchTime, CommandMode::Query) => {
                self.accept();
                write!(out, "SWITCHTIME={}\r\n", self.state.switch_time_ms)?;
                Ok(SerialOutcome::Answered)
            }
            (Keyword::SwitchTime, CommandMode::Assign(value)) => {
                self.accept();
                self.state.switch_time_ms = value;
                write!(out, "SWITCHTIME={value}\r\n")?;
                Ok(SerialOutcome::Answered)
            }
            (Keyword::Status, _) => {
                self.accept();
                let states = self.state.bank.states();
                write!(
                    out,
                    "{} {} {} {}\r\n",
                    states[0].as_bit(),
                    states[1].as_bit(),
                    states[2].as_bit(),
                    states[3].as_bit(),
                )?;
                Ok(SerialOutcome::Answered)
            }
            (Keyword::Init, _) => {
                self.accept();
                write_banner(out)?;
                Ok(SerialOutcome::Answered)
            }
            // Unreachable under the wire grammar; must not crash.
            (Keyword::Channel(_) | Keyword::SwitchTime, CommandMode::Bare) => {
                Ok(SerialOutcome::NoOp)
            }
        }
    }

    fn accept(&mut self) {
        self.telemetry
            .record(TelemetryEvent::new(TelemetryEventKind::CommandAccepted));
    }

    /// Energizes the coil for a plan. The caller holds for
    /// [`PulsePlan::hold_ms`] and then calls [`Controller::finish_pulse`].
    pub fn begin_pulse(&mut self, plan: PulsePlan) {
        self.telemetry.record(TelemetryEvent::for_pulse(
            TelemetryEventKind::PulseStarted,
            plan.channel,
            plan.target,
        ));
        self.bench.energize(plan.channel, plan.coil());
    }

    /// Releases the coil, commits the new state, lights the indicator, and
    /// writes the deferred response for serial assignments.
    pub fn finish_pulse<W: Write>(&mut self, plan: PulsePlan, out: &mut W) -> fmt::Result {
        self.bench.release(plan.channel, plan.coil());
        self.state.bank.commit(plan.channel, plan.target);
        self.bench
            .set_indicator(plan.channel, plan.target.is_set());
        self.telemetry.record(TelemetryEvent::for_pulse(
            TelemetryEventKind::PulseCompleted,
            plan.channel,
            plan.target,
        ));

        if plan.respond {
            write_channel_report(out, plan.channel, plan.target)?;
        }
        Ok(())
    }

    /// Computes the toggle pulses for buttons newly pressed since the last
    /// iteration's snapshot.
    pub fn on_buttons(&mut self, snapshot: ButtonBitmask) -> Vec<PulsePlan, CHANNEL_COUNT> {
        let edges = self.edges.rising(snapshot);
        let mut plans = Vec::new();

        for channel in ChannelId::all() {
            if edges.is_pressed(channel) {
                let target = self.state.bank.state(channel).toggled();
                self.telemetry.record(TelemetryEvent::for_pulse(
                    TelemetryEventKind::ButtonToggle,
                    channel,
                    target,
                ));
                // Capacity equals the channel count; this cannot overflow.
                let _ = plans.push(PulsePlan {
                    channel,
                    target,
                    hold_ms: self.state.switch_time_ms,
                    respond: false,
                });
            }
        }

        plans
    }

    /// Drives every indicator from the committed channel state.
    pub fn refresh_indicators(&mut self) {
        for channel in ChannelId::all() {
            let lit = self.state.bank.state(channel).is_set();
            self.bench.set_indicator(channel, lit);
        }
    }
}

fn write_channel_report<W: Write>(
    out: &mut W,
    channel: ChannelId,
    state: ChannelState,
) -> fmt::Result {
    write!(out, "P{}={}\r\n", channel.number(), state.as_bit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryEventKind;
    use heapless::String;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum BenchOp {
        Energize(ChannelId, DriveCoil),
        Release(ChannelId, DriveCoil),
        Indicator(ChannelId, bool),
    }

    // Tests run on the host; pull in std's Vec for unbounded recording.
    extern crate std;
    use std::vec;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct RecordingBench {
        ops: StdVec<BenchOp>,
    }

    impl DriveBench for RecordingBench {
        fn energize(&mut self, channel: ChannelId, coil: DriveCoil) {
            self.ops.push(BenchOp::Energize(channel, coil));
        }

        fn release(&mut self, channel: ChannelId, coil: DriveCoil) {
            self.ops.push(BenchOp::Release(channel, coil));
        }

        fn set_indicator(&mut self, channel: ChannelId, lit: bool) {
            self.ops.push(BenchOp::Indicator(channel, lit));
        }
    }

    fn feed(
        controller: &mut Controller<RecordingBench>,
        bytes: &[u8],
        out: &mut String<256>,
    ) -> SerialOutcome {
        let mut last = SerialOutcome::Pending;
        for byte in bytes {
            last = controller
                .on_serial_byte(*byte, out)
                .expect("formatting should not fail");
            if let SerialOutcome::Pulse(plan) = last {
                controller.begin_pulse(plan);
                controller
                    .finish_pulse(plan, out)
                    .expect("formatting should not fail");
            }
        }
        last
    }

    #[test]
    fn assignment_pulses_then_reports() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"P1=1\r", &mut out);

        assert_eq!(out.as_str(), "P1=1\r\n");
        assert_eq!(
            controller.state().bank().state(ChannelId::C1),
            ChannelState::Set
        );
        assert_eq!(
            controller.bench().ops,
            vec![
                BenchOp::Energize(ChannelId::C1, DriveCoil::Set),
                BenchOp::Release(ChannelId::C1, DriveCoil::Set),
                BenchOp::Indicator(ChannelId::C1, true),
            ]
        );
    }

    #[test]
    fn reassigning_same_state_still_pulses() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"P2=0\r", &mut out);
        let ops_after_first = controller.bench().ops.len();
        feed(&mut controller, b"P2=0\r", &mut out);

        assert_eq!(controller.bench().ops.len(), ops_after_first * 2);
    }

    #[test]
    fn query_reports_without_touching_the_bench() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        let outcome = feed(&mut controller, b"P3?\r", &mut out);

        assert_eq!(outcome, SerialOutcome::Answered);
        assert_eq!(out.as_str(), "P3=0\r\n");
        assert!(controller.bench().ops.is_empty());
    }

    #[test]
    fn status_reflects_committed_states_in_order() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"P1=1\r", &mut out);
        feed(&mut controller, b"P3=1\r", &mut out);
        out.clear();
        feed(&mut controller, b"STATUS\r", &mut out);

        assert_eq!(out.as_str(), "1 0 1 0\r\n");
    }

    #[test]
    fn switchtime_default_query_and_assignment() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"SWITCHTIME?\r", &mut out);
        assert_eq!(out.as_str(), "SWITCHTIME=300\r\n");

        out.clear();
        feed(&mut controller, b"SWITCHTIME=500\r", &mut out);
        assert_eq!(out.as_str(), "SWITCHTIME=500\r\n");
        assert_eq!(controller.state().switch_time_ms(), 500);
    }

    #[test]
    fn switchtime_governs_planned_hold() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"SWITCHTIME=500\r", &mut out);
        out.clear();

        let mut plan = None;
        for byte in b"P1=1\r" {
            if let SerialOutcome::Pulse(found) =
                controller.on_serial_byte(*byte, &mut out).unwrap()
            {
                plan = Some(found);
            }
        }

        assert_eq!(plan.map(|plan| plan.hold_ms), Some(500));
    }

    #[test]
    fn init_reemits_banner() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"INIT\r", &mut out);
        assert_eq!(
            out.as_str(),
            "SwitchBank SB-4 channel controller\r\nready.\r\n"
        );
    }

    #[test]
    fn unmatched_line_is_silent() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        let outcome = feed(&mut controller, b"FOO\r", &mut out);

        assert_eq!(outcome, SerialOutcome::Ignored);
        assert!(out.is_empty());
        assert!(controller.bench().ops.is_empty());
    }

    #[test]
    fn transport_error_is_reported_and_processing_continues() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        controller
            .on_transport_error(TransportError::Overrun, &mut out)
            .unwrap();
        feed(&mut controller, b"P1?\r", &mut out);

        assert_eq!(out.as_str(), "ERR overrun\r\nP1=0\r\n");
    }

    #[test]
    fn button_edge_toggles_once_per_press() {
        let mut controller = Controller::new(RecordingBench::default());
        let pressed = ButtonBitmask::from_bits(0b0001);

        let plans = controller.on_buttons(pressed);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].channel, ChannelId::C1);
        assert_eq!(plans[0].target, ChannelState::Set);
        assert!(!plans[0].respond);

        // Held button: no further toggles.
        for _ in 0..4 {
            assert!(controller.on_buttons(pressed).is_empty());
        }

        // Complete the pulse, release, press again: toggles back.
        let mut out: String<256> = String::new();
        controller.begin_pulse(plans[0]);
        controller.finish_pulse(plans[0], &mut out).unwrap();
        assert!(out.is_empty());

        controller.on_buttons(ButtonBitmask::EMPTY);
        let plans = controller.on_buttons(pressed);
        assert_eq!(plans[0].target, ChannelState::Reset);
    }

    #[test]
    fn refresh_drives_all_indicators_from_state() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();
        feed(&mut controller, b"P2=1\r", &mut out);
        controller.bench_mut().ops.clear();

        controller.refresh_indicators();

        assert_eq!(
            controller.bench().ops,
            vec![
                BenchOp::Indicator(ChannelId::C1, false),
                BenchOp::Indicator(ChannelId::C2, true),
                BenchOp::Indicator(ChannelId::C3, false),
                BenchOp::Indicator(ChannelId::C4, false),
            ]
        );
    }

    #[test]
    fn telemetry_traces_the_dispatch_path() {
        let mut controller = Controller::new(RecordingBench::default());
        let mut out: String<256> = String::new();

        feed(&mut controller, b"P1=1\r", &mut out);
        feed(&mut controller, b"FOO\r", &mut out);

        let kinds: StdVec<TelemetryEventKind> = controller
            .telemetry()
            .iter()
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TelemetryEventKind::CommandAccepted,
                TelemetryEventKind::PulseStarted,
                TelemetryEventKind::PulseCompleted,
                TelemetryEventKind::CommandIgnored,
            ]
        );
    }
}
