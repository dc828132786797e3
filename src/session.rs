//! Interactive read-eval loop around a [`PlaybackController`].
//!
//! Every error is reported to the user and the loop continues; only `exit`,
//! `quit` or end of input end the session.

use crate::commands::{self, UserCommand, HELP};
use crate::playback::{Outcome, PlaybackController};
use crate::render::AudioRenderer;
use log::{debug, warn};
use std::io::{self, BufRead, Write};

/// Run until exit or end of input. Only I/O errors on `input`/`output` abort.
pub fn run_session<R, I, W>(
    controller: &mut PlaybackController<R>,
    mut input: I,
    output: &mut W,
) -> io::Result<()>
where
    R: AudioRenderer,
    I: BufRead,
    W: Write,
{
    writeln!(
        output,
        "Interactive mode. {} measures, {} BPM. Type `help` for commands.",
        controller.total(),
        controller.tempo()
    )?;

    let mut buf = Vec::new();
    loop {
        write!(
            output,
            "(Measure {}/{}) > ",
            controller.position(),
            controller.total()
        )?;
        output.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            writeln!(output)?;
            debug!("End of input; leaving session");
            return Ok(());
        }
        // Undecodable bytes become U+FFFD and surface as an unknown command.
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }

        let command = match commands::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                writeln!(output, "Error: {err}")?;
                continue;
            }
        };
        debug!("Command: {command:?}");

        let result = match command {
            UserCommand::Exit => return Ok(()),
            UserCommand::Help => {
                writeln!(output, "{HELP}")?;
                continue;
            }
            UserCommand::Status => {
                writeln!(
                    output,
                    "Measure {}/{} at {} BPM, hands: {}",
                    controller.position(),
                    controller.total(),
                    controller.tempo(),
                    controller.hands().selection()
                )?;
                continue;
            }
            UserCommand::Unknown(word) => {
                writeln!(output, "Unknown command `{word}`. Type `help` for commands.")?;
                continue;
            }
            UserCommand::Play(range) => controller.play(range),
            UserCommand::Next => controller.next(),
            UserCommand::Prev => controller.prev(),
            UserCommand::Tempo(bpm) => controller.set_tempo(bpm),
            UserCommand::Hand(selection) => controller.set_hand(selection),
        };

        match result {
            Ok(outcome) => report(output, outcome)?,
            Err(err) => {
                warn!("Session command failed: {err}");
                writeln!(output, "Error: {err}")?;
            }
        }
    }
}

fn report<W: Write>(output: &mut W, outcome: Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Played(range) if range.len() == 1 => writeln!(output, "Played measure {range}."),
        Outcome::Played(range) => writeln!(output, "Played measures {range}."),
        Outcome::EndOfPiece => writeln!(output, "End of piece."),
        Outcome::AlreadyAtStart => writeln!(output, "Already at start."),
        Outcome::TempoSet(bpm) => writeln!(output, "Tempo set to {bpm} (preference saved)."),
        Outcome::HandSet(hand) => writeln!(output, "Hand set to {hand} (preference saved)."),
    }
}
