//! Byte-at-a-time command line assembly.
//!
//! One fixed-capacity buffer filled until a terminator arrives. A line longer
//! than the buffer is rejected outright rather than silently truncated; the
//! overflow is reported once and everything up to the next terminator is
//! discarded so a clipped payload can never dispatch.

use heapless::Vec;

/// Maximum number of bytes accepted on a single command line (excluding
/// terminator). Sized to hold the longest legal command (`SWITCHTIME=` plus
/// a full-width integer) with margin for tolerated surrounding characters.
pub const MAX_LINE_LEN: usize = 32;

/// Transport-level receive faults surfaced by the UART driver.
///
/// These are reported on the output channel but never stop the byte that
/// accompanied them from being processed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    Framing,
    Overrun,
}

impl TransportError {
    /// Short label used in the diagnostic line.
    pub const fn label(self) -> &'static str {
        match self {
            TransportError::Framing => "framing",
            TransportError::Overrun => "overrun",
        }
    }
}

/// Outcome of feeding one byte into the assembler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineEvent {
    /// Byte buffered; nothing to do yet.
    Pending,
    /// Terminator seen; [`LineAssembler::line`] holds the completed line.
    Completed,
    /// Buffer capacity exceeded; the line is poisoned and will be discarded.
    Overflow,
    /// Terminator seen on a poisoned line; nothing to dispatch.
    Discarded,
}

/// Accumulates serial bytes into one command line between terminators.
#[derive(Clone, Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    poisoned: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            poisoned: false,
        }
    }

    /// Feeds a single byte. `\r` terminates a line; `\n` is accepted as a
    /// terminator too so `\r\n` hosts do not leak a stray byte into the next
    /// line.
    pub fn push(&mut self, byte: u8) -> LineEvent {
        match byte {
            b'\r' | b'\n' => {
                if self.poisoned {
                    self.poisoned = false;
                    self.buffer.clear();
                    LineEvent::Discarded
                } else {
                    LineEvent::Completed
                }
            }
            value if self.poisoned => {
                let _ = value;
                LineEvent::Pending
            }
            value => {
                if self.buffer.push(value).is_err() {
                    self.poisoned = true;
                    self.buffer.clear();
                    LineEvent::Overflow
                } else {
                    LineEvent::Pending
                }
            }
        }
    }

    /// The completed line after [`LineEvent::Completed`].
    pub fn line(&self) -> &[u8] {
        &self.buffer
    }

    /// Clears the buffer once the completed line has been dispatched.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.poisoned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut LineAssembler, bytes: &[u8]) -> LineEvent {
        let mut last = LineEvent::Pending;
        for byte in bytes {
            last = assembler.push(*byte);
        }
        last
    }

    #[test]
    fn terminator_completes_the_line() {
        let mut assembler = LineAssembler::new();
        assert_eq!(feed(&mut assembler, b"P1?\r"), LineEvent::Completed);
        assert_eq!(assembler.line(), b"P1?");
        assembler.reset();
        assert_eq!(assembler.line(), b"");
    }

    #[test]
    fn linefeed_terminates_without_leaking_into_next_line() {
        let mut assembler = LineAssembler::new();
        assert_eq!(feed(&mut assembler, b"P2=1\r"), LineEvent::Completed);
        assembler.reset();
        assert_eq!(assembler.push(b'\n'), LineEvent::Completed);
        assert_eq!(assembler.line(), b"");
    }

    #[test]
    fn overflow_poisons_until_next_terminator() {
        let mut assembler = LineAssembler::new();
        let long = [b'A'; MAX_LINE_LEN + 1];
        assert_eq!(feed(&mut assembler, &long), LineEvent::Overflow);
        // Further bytes on the poisoned line are swallowed silently.
        assert_eq!(assembler.push(b'B'), LineEvent::Pending);
        // The terminator discards the poisoned line instead of completing it.
        assert_eq!(assembler.push(b'\r'), LineEvent::Discarded);
        // The next line assembles normally.
        assert_eq!(feed(&mut assembler, b"P1?\r"), LineEvent::Completed);
        assert_eq!(assembler.line(), b"P1?");
    }

    #[test]
    fn overflow_reports_exactly_once_per_line() {
        let mut assembler = LineAssembler::new();
        let mut overflows = 0;
        for _ in 0..3 * MAX_LINE_LEN {
            if assembler.push(b'A') == LineEvent::Overflow {
                overflows += 1;
            }
        }
        assert_eq!(overflows, 1);
    }
}
