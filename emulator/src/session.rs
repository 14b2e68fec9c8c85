use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant as HostInstant};

use switchbank_core::buttons::{DEBOUNCE_TICKS, Debouncer, RawButtonSample};
use switchbank_core::channels::{ChannelId, ChannelState, DriveCoil, channel_by_id};
use switchbank_core::controller::{
    Controller, DriveBench, PulsePlan, SerialOutcome, write_banner,
};
use switchbank_core::telemetry::{TelemetryEvent, TelemetryEventKind};

const TRANSCRIPT_PATH: &str = "transcripts/emulator-session.log";

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "wire",
        "P<n>?, P<n>=<v>, STATUS, SWITCHTIME?, SWITCHTIME=<ms>, INIT - serial protocol",
    ),
    (
        "!press",
        "!press <1-4>              - simulate one debounced button press and release",
    ),
    (
        "!raw",
        "!raw <bits>               - feed one raw active-high sample (binary, e.g. 0101)",
    ),
    (
        "!events",
        "!events                   - dump the recent controller event trace",
    ),
    (
        "help",
        "help                      - show this summary",
    ),
];

/// Drives a [`Controller`] from typed lines the way the firmware drives it
/// from UART bytes, narrating coil and indicator transitions as it goes.
pub struct Session {
    controller: Controller<SimulatedBench>,
    debouncer: Debouncer,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            controller: Controller::new(SimulatedBench::default()),
            debouncer: Debouncer::new(),
            transcript: TranscriptLogger::new()?,
            started_at: HostInstant::now(),
        })
    }

    /// The banner the firmware emits at power-on.
    pub fn startup_lines(&mut self) -> io::Result<Vec<String>> {
        let mut banner = String::new();
        write_banner(&mut banner).expect("banner formatting");
        let lines = split_wire_text(&banner);
        self.record_output(self.started_at.elapsed(), &lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = if trimmed.eq_ignore_ascii_case("help") {
            help_lines()
        } else if let Some(directive) = trimmed.strip_prefix('!') {
            self.handle_directive(directive)
        } else {
            self.handle_wire_line(trimmed)
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    /// Feeds one protocol line through the controller byte by byte, running
    /// any resulting pulse with a real-time hold.
    fn handle_wire_line(&mut self, line: &str) -> Vec<String> {
        let mut response = String::new();
        let mut narration = Vec::new();

        for &byte in line.as_bytes().iter().chain(b"\r") {
            match self
                .controller
                .on_serial_byte(byte, &mut response)
                .expect("formatting into String cannot fail")
            {
                SerialOutcome::Pulse(plan) => {
                    self.run_pulse(plan, &mut response, &mut narration);
                }
                SerialOutcome::Ignored => {
                    narration.push("(no keyword matched; line dropped)".to_string());
                }
                _ => {}
            }
        }

        // Bench transitions happen before the deferred response is written.
        let mut lines = narration;
        lines.extend(split_wire_text(&response));
        lines
    }

    fn handle_directive(&mut self, directive: &str) -> Vec<String> {
        let mut parts = directive.split_whitespace();
        match parts.next() {
            Some(name) if name.eq_ignore_ascii_case("press") => {
                match parts.next().and_then(|arg| arg.parse::<u8>().ok()) {
                    Some(number) => match ChannelId::from_number(number) {
                        Some(channel) => self.simulate_press(channel),
                        None => vec![format!("ERR no such button {number}")],
                    },
                    None => vec!["ERR usage: !press <1-4>".to_string()],
                }
            }
            Some(name) if name.eq_ignore_ascii_case("raw") => match parts.next() {
                Some(bits) => match u8::from_str_radix(bits, 2) {
                    Ok(value) => self.feed_raw_sample(value),
                    Err(_) => vec![format!("ERR invalid bit pattern `{bits}`")],
                },
                None => vec!["ERR usage: !raw <bits>".to_string()],
            },
            Some(name) if name.eq_ignore_ascii_case("events") => self.dump_events(),
            Some(name) => vec![format!("ERR unknown directive `!{name}`")],
            None => vec!["ERR empty directive".to_string()],
        }
    }

    /// One full press and release as the firmware sampler would see it.
    fn simulate_press(&mut self, channel: ChannelId) -> Vec<String> {
        let mut lines = Vec::new();
        let mut response = String::new();

        let mask = self
            .debouncer
            .sample(RawButtonSample::from_pressed_bits(1 << channel.as_index()));
        for plan in self.controller.on_buttons(mask) {
            self.run_pulse(plan, &mut response, &mut lines);
        }

        // Release takes the full debounce window to register.
        for _ in 0..=DEBOUNCE_TICKS {
            let mask = self.debouncer.sample(RawButtonSample::from_pressed_bits(0));
            let _ = self.controller.on_buttons(mask);
        }

        lines.extend(split_wire_text(&response));
        lines
    }

    fn feed_raw_sample(&mut self, bits: u8) -> Vec<String> {
        let mask = self
            .debouncer
            .sample(RawButtonSample::from_pressed_bits(bits));
        let mut lines = vec![format!("buttons: debounced mask={:04b}", mask.bits())];

        let mut response = String::new();
        for plan in self.controller.on_buttons(mask) {
            self.run_pulse(plan, &mut response, &mut lines);
        }
        lines.extend(split_wire_text(&response));
        lines
    }

    fn run_pulse(&mut self, plan: PulsePlan, response: &mut String, narration: &mut Vec<String>) {
        self.controller.begin_pulse(plan);
        narration.append(&mut self.controller.bench_mut().drain());

        thread::sleep(Duration::from_millis(u64::from(plan.hold_ms)));

        self.controller
            .finish_pulse(plan, response)
            .expect("formatting into String cannot fail");
        narration.append(&mut self.controller.bench_mut().drain());
    }

    fn dump_events(&self) -> Vec<String> {
        let log = self.controller.telemetry();
        if log.is_empty() {
            return vec!["(no events recorded)".to_string()];
        }

        let mut lines: Vec<String> = log.iter().map(describe_event).collect();
        if log.evicted() > 0 {
            lines.push(format!("({} older events evicted)", log.evicted()));
        }
        lines
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help_lines() -> Vec<String> {
    let mut lines = vec!["Available commands:".to_string()];
    for (_, detail) in HELP_TOPICS {
        lines.push(format!("  {detail}"));
    }
    lines
}

/// Splits accumulated `\r\n`-terminated wire output into display lines.
fn split_wire_text(text: &str) -> Vec<String> {
    text.split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn describe_event(event: &TelemetryEvent) -> String {
    let kind = match event.kind {
        TelemetryEventKind::CommandAccepted => "command-accepted",
        TelemetryEventKind::CommandIgnored => "command-ignored",
        TelemetryEventKind::PulseStarted => "pulse-started",
        TelemetryEventKind::PulseCompleted => "pulse-completed",
        TelemetryEventKind::ButtonToggle => "button-toggle",
        TelemetryEventKind::LineOverflow => "line-overflow",
        TelemetryEventKind::TransportFault => "transport-fault",
    };

    match (event.channel, event.state) {
        (Some(channel), Some(state)) => format!(
            "{kind} {} -> {}",
            channel_by_id(channel).name,
            state_label(state)
        ),
        (Some(channel), None) => format!("{kind} {}", channel_by_id(channel).name),
        _ => kind.to_string(),
    }
}

fn state_label(state: ChannelState) -> &'static str {
    match state {
        ChannelState::Set => "SET",
        ChannelState::Reset => "RESET",
    }
}

/// Records coil and indicator transitions as human-readable narration.
#[derive(Default)]
struct SimulatedBench {
    pending: Vec<String>,
    indicators: [Option<bool>; 4],
}

impl SimulatedBench {
    fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }
}

impl DriveBench for SimulatedBench {
    fn energize(&mut self, channel: ChannelId, coil: DriveCoil) {
        let line = channel_by_id(channel);
        let pin = coil_pin(&line, coil);
        self.pending.push(format!(
            "[bench] {} {} coil energized ({pin} high)",
            line.name,
            coil_label(coil)
        ));
    }

    fn release(&mut self, channel: ChannelId, coil: DriveCoil) {
        let line = channel_by_id(channel);
        let pin = coil_pin(&line, coil);
        self.pending.push(format!(
            "[bench] {} {} coil released ({pin} low)",
            line.name,
            coil_label(coil)
        ));
    }

    fn set_indicator(&mut self, channel: ChannelId, lit: bool) {
        // Indicator refreshes repeat the same level; only narrate changes.
        let slot = &mut self.indicators[channel.as_index()];
        if *slot == Some(lit) {
            return;
        }
        *slot = Some(lit);

        let line = channel_by_id(channel);
        self.pending.push(format!(
            "[bench] {} indicator {} ({})",
            line.name,
            if lit { "on" } else { "off" },
            line.indicator_pin
        ));
    }
}

fn coil_label(coil: DriveCoil) -> &'static str {
    match coil {
        DriveCoil::Set => "SET",
        DriveCoil::Reset => "RESET",
    }
}

fn coil_pin(line: &switchbank_core::channels::ChannelLine, coil: DriveCoil) -> &'static str {
    match coil {
        DriveCoil::Set => line.set_pin,
        DriveCoil::Reset => line.reset_pin,
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new() -> io::Result<Self> {
        let path = Path::new(TRANSCRIPT_PATH);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# SwitchBank emulator session transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
