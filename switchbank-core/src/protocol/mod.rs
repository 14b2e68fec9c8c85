//! Serial command protocol: line assembly and parsing.
//!
//! The protocol is line-oriented with `\r` as the terminator. Keywords are
//! matched case-insensitively as substrings, so surrounding noise on a line
//! is tolerated; precedence is fixed and the first match wins.

pub mod line;
pub mod parser;

pub use line::{LineAssembler, LineEvent, MAX_LINE_LEN, TransportError};
pub use parser::{CommandMode, Keyword, ParsedCommand, parse_line};

/// First banner line identifying the product.
pub const BANNER_PRODUCT: &str = "SwitchBank SB-4 channel controller";

/// Second banner line signalling readiness.
pub const BANNER_READY: &str = "ready.";
