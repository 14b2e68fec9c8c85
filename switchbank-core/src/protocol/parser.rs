//! Command keyword and mode extraction.
//!
//! A completed line is scanned for the known keywords by case-insensitive
//! substring match, in a fixed precedence order: `P1`..`P4`, then `STATUS`,
//! `SWITCHTIME`, then `INIT`. The first match wins; a line matching none
//! produces no command at all. Extra characters around a keyword are
//! tolerated by design.

use crate::channels::ChannelId;

/// Command keyword recognized on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Keyword {
    Channel(ChannelId),
    Status,
    SwitchTime,
    Init,
}

/// How the keyword is being used.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandMode {
    /// `KEY?` — report the current value.
    Query,
    /// `KEY=<integer>` — assign a new value.
    Assign(u32),
    /// Keyword without `?` or `=`; dispatches as a no-op for value keys.
    Bare,
}

/// Transient decode result for one completed line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParsedCommand {
    pub keyword: Keyword,
    pub mode: CommandMode,
}

/// Decodes a completed line, or `None` when no keyword matches.
pub fn parse_line(line: &[u8]) -> Option<ParsedCommand> {
    let keyword = match_keyword(line)?;

    let mode = match keyword {
        // STATUS and INIT carry no value; anything around them is ignored.
        Keyword::Status | Keyword::Init => CommandMode::Bare,
        Keyword::Channel(_) | Keyword::SwitchTime => {
            if line.contains(&b'?') {
                CommandMode::Query
            } else if let Some(at) = line.iter().position(|byte| *byte == b'=') {
                CommandMode::Assign(parse_value(&line[at + 1..]))
            } else {
                CommandMode::Bare
            }
        }
    };

    Some(ParsedCommand { keyword, mode })
}

/// Keyword tables in precedence order; first match wins.
fn match_keyword(line: &[u8]) -> Option<Keyword> {
    const CHANNEL_KEYS: [&[u8]; 4] = [b"P1", b"P2", b"P3", b"P4"];

    for (index, key) in CHANNEL_KEYS.iter().enumerate() {
        if contains_ignore_ascii_case(line, key) {
            return ChannelId::from_index(index).map(Keyword::Channel);
        }
    }

    if contains_ignore_ascii_case(line, b"STATUS") {
        return Some(Keyword::Status);
    }
    if contains_ignore_ascii_case(line, b"SWITCHTIME") {
        return Some(Keyword::SwitchTime);
    }
    if contains_ignore_ascii_case(line, b"INIT") {
        return Some(Keyword::Init);
    }

    None
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }

    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

/// atoi-style unsigned parse: skip leading spaces, accumulate digits until
/// the first non-digit, saturate on overflow. No digits yields 0.
fn parse_value(text: &[u8]) -> u32 {
    let mut value: u32 = 0;
    let mut seen_digit = false;

    for byte in text {
        match byte {
            b' ' if !seen_digit => {}
            b'0'..=b'9' => {
                seen_digit = true;
                value = value
                    .saturating_mul(10)
                    .saturating_add(u32::from(byte - b'0'));
            }
            _ => break,
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &[u8]) -> ParsedCommand {
        parse_line(line).expect("line should parse")
    }

    #[test]
    fn channel_query_and_assignment() {
        assert_eq!(
            parsed(b"P1?"),
            ParsedCommand {
                keyword: Keyword::Channel(ChannelId::C1),
                mode: CommandMode::Query,
            }
        );
        assert_eq!(
            parsed(b"P4=1"),
            ParsedCommand {
                keyword: Keyword::Channel(ChannelId::C4),
                mode: CommandMode::Assign(1),
            }
        );
    }

    #[test]
    fn keywords_match_case_insensitively_as_substrings() {
        assert_eq!(parsed(b"p2=0").keyword, Keyword::Channel(ChannelId::C2));
        assert_eq!(parsed(b" status ").keyword, Keyword::Status);
        assert_eq!(parsed(b"xxInItxx").keyword, Keyword::Init);
        assert_eq!(parsed(b"switchtime?").mode, CommandMode::Query);
    }

    #[test]
    fn channel_keys_take_precedence_over_later_keywords() {
        // A line containing both P1 and STATUS resolves to the channel.
        assert_eq!(
            parsed(b"P1STATUS").keyword,
            Keyword::Channel(ChannelId::C1)
        );
    }

    #[test]
    fn unmatched_line_yields_nothing() {
        assert_eq!(parse_line(b"FOO"), None);
        assert_eq!(parse_line(b""), None);
    }

    #[test]
    fn non_numeric_assignment_falls_back_to_zero() {
        assert_eq!(parsed(b"P3=abc").mode, CommandMode::Assign(0));
        assert_eq!(parsed(b"SWITCHTIME=").mode, CommandMode::Assign(0));
    }

    #[test]
    fn assignment_parses_leading_digits_only() {
        assert_eq!(parsed(b"SWITCHTIME=250ms").mode, CommandMode::Assign(250));
        assert_eq!(parsed(b"SWITCHTIME= 42").mode, CommandMode::Assign(42));
    }

    #[test]
    fn query_marker_wins_over_assignment() {
        // `?` anywhere marks a query even if `=` is also present.
        assert_eq!(parsed(b"P1?=1").mode, CommandMode::Query);
    }

    #[test]
    fn bare_value_keyword_is_reported_as_bare() {
        assert_eq!(parsed(b"P2").mode, CommandMode::Bare);
        assert_eq!(parsed(b"SWITCHTIME").mode, CommandMode::Bare);
    }
}
