//! Parser for the interactive command language.
//!
//! ```text
//! play            play from the current measure to the end
//! play N          play measure N
//! play A-B        play measures A through B
//! next | prev     step one measure
//! tempo N         set tempo (remembered)
//! hand X          left, right or both (remembered)
//! status | help | exit | quit
//! ```
//!
//! Keywords are case-insensitive and surrounding whitespace is ignored.

use crate::error::{Error, Result};
use crate::score::HandSelection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Inclusive measure range, unvalidated beyond being numbers.
    Play(Option<(usize, usize)>),
    Next,
    Prev,
    Tempo(u32),
    Hand(HandSelection),
    Status,
    Help,
    Exit,
    /// Anything else, kept for the error message.
    Unknown(String),
}

pub const HELP: &str = "\
Commands:
  play            play from the current measure to the end
  play N          play measure N
  play A-B        play measures A through B
  next, prev      step forward or back one measure
  tempo N         set the tempo in BPM (saved as your default)
  hand X          practice left, right or both hands (saved)
  status          show position, tempo and hands
  help            show this help
  exit, quit      leave the session";

/// Parse one non-empty input line.
pub fn parse(line: &str) -> Result<UserCommand> {
    let lowered = line.trim().to_ascii_lowercase();
    let mut words = lowered.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(UserCommand::Unknown(String::new()));
    };
    let args: Vec<&str> = words.collect();

    let command = match (keyword, args.as_slice()) {
        ("play", []) => UserCommand::Play(None),
        ("play", [range]) => UserCommand::Play(Some(parse_range(range)?)),
        ("next", []) => UserCommand::Next,
        ("prev", []) => UserCommand::Prev,
        ("tempo", [bpm]) => UserCommand::Tempo(bpm.parse().map_err(|_| {
            Error::invalid(format!("invalid tempo `{bpm}`. Use a whole number of BPM"))
        })?),
        ("hand", [hand]) => UserCommand::Hand(hand.parse()?),
        ("status", []) => UserCommand::Status,
        ("help", []) => UserCommand::Help,
        ("exit" | "quit", []) => UserCommand::Exit,
        ("play" | "next" | "prev" | "tempo" | "hand" | "status" | "help" | "exit" | "quit", _) => {
            return Err(Error::invalid(usage(keyword)));
        }
        _ => UserCommand::Unknown(keyword.to_owned()),
    };
    Ok(command)
}

fn parse_range(raw: &str) -> Result<(usize, usize)> {
    let number = |text: &str| {
        text.trim().parse::<usize>().map_err(|_| {
            Error::invalid(format!(
                "invalid measure range `{raw}`. Use `play N` or `play A-B`"
            ))
        })
    };
    match raw.split_once('-') {
        Some((start, end)) => Ok((number(start)?, number(end)?)),
        None => {
            let single = number(raw)?;
            Ok((single, single))
        }
    }
}

fn usage(keyword: &str) -> String {
    let form = match keyword {
        "play" => "play [N | A-B]",
        "tempo" => "tempo <bpm>",
        "hand" => "hand <left|right|both>",
        other => other,
    };
    format!("usage: {form}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_forms() {
        assert_eq!(parse("play").unwrap(), UserCommand::Play(None));
        assert_eq!(parse("play 4").unwrap(), UserCommand::Play(Some((4, 4))));
        assert_eq!(parse("  PLAY 2-3 ").unwrap(), UserCommand::Play(Some((2, 3))));
        assert_eq!(parse("play 5-2").unwrap(), UserCommand::Play(Some((5, 2))));
    }

    #[test]
    fn test_bad_ranges_are_invalid_input() {
        for line in ["play x", "play 1-", "play -3", "play 1-b", "play 1 2"] {
            assert!(parse(line).unwrap_err().is_invalid_input(), "{line}");
        }
    }

    #[test]
    fn test_tempo_and_hand() {
        assert_eq!(parse("tempo 90").unwrap(), UserCommand::Tempo(90));
        assert_eq!(parse("Hand LEFT").unwrap(), UserCommand::Hand(HandSelection::Left));
        assert!(parse("tempo fast").unwrap_err().is_invalid_input());
        assert!(parse("tempo -5").unwrap_err().is_invalid_input());
        assert!(parse("tempo").unwrap_err().is_invalid_input());
        assert!(parse("hand feet").unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse("next").unwrap(), UserCommand::Next);
        assert_eq!(parse("prev").unwrap(), UserCommand::Prev);
        assert_eq!(parse("status").unwrap(), UserCommand::Status);
        assert_eq!(parse("help").unwrap(), UserCommand::Help);
        assert_eq!(parse("exit").unwrap(), UserCommand::Exit);
        assert_eq!(parse("QUIT").unwrap(), UserCommand::Exit);
    }

    #[test]
    fn test_unknown_words_are_not_errors() {
        assert_eq!(
            parse("rewind 3").unwrap(),
            UserCommand::Unknown("rewind".to_owned())
        );
    }
}
