//! # Audio Rendering
//!
//! The playback controller never produces sound itself. It hands a
//! [`RenderRequest`] to an [`AudioRenderer`] and only moves its cursor when
//! the renderer reports success.
//!
//! Two renderers ship with the crate:
//!
//! - [`TranscriptRenderer`] writes a readable account of each measure (notes,
//!   durations, timing at the session tempo) to any writer. This is the default
//!   for the CLI and what the tests use.
//! - [`CommandRenderer`] pipes the request as JSON to an external synthesizer
//!   on its stdin.

use crate::config::CommandLine;
use crate::error::{Error, Result};
use crate::score::{Hand, Hands, Measure, MeasureRange, NoteEvent};
use log::{debug, info};
use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};

/// Everything a renderer needs to sound part of a score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RenderRequest<'a> {
    pub key: &'a str,
    /// Measures covered by `range`, in order.
    pub measures: &'a [Measure],
    pub hands: Hands,
    pub tempo: u32,
    pub range: MeasureRange,
}

impl RenderRequest<'_> {
    /// Length of the request in beats, taking the longer hand of each measure.
    #[must_use]
    pub fn beats(&self) -> f64 {
        self.measures
            .iter()
            .map(|measure| measure_beats(measure, self.hands))
            .sum()
    }

    /// Wall-clock length at the request tempo.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        beats_to_seconds(self.beats(), self.tempo)
    }
}

pub trait AudioRenderer {
    /// Sound the request. Blocking; an error leaves the caller's state as it was.
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()>;
}

impl<R: AudioRenderer + ?Sized> AudioRenderer for Box<R> {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        (**self).render(request)
    }
}

impl<R: AudioRenderer + ?Sized> AudioRenderer for &mut R {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        (**self).render(request)
    }
}

fn hand_beats(events: &[NoteEvent]) -> f64 {
    events
        .iter()
        .map(|event| event.duration.beats().unwrap_or(1.0))
        .sum()
}

fn measure_beats(measure: &Measure, hands: Hands) -> f64 {
    hands
        .iter()
        .map(|hand| hand_beats(measure.hand(hand)))
        .fold(0.0, f64::max)
}

fn beats_to_seconds(beats: f64, tempo: u32) -> f64 {
    if tempo == 0 {
        return 0.0;
    }
    beats * 60.0 / f64::from(tempo)
}

fn describe_events(events: &[NoteEvent]) -> String {
    if events.is_empty() {
        return "rest".to_owned();
    }
    events
        .iter()
        .map(|event| {
            let notes = event
                .notes
                .iter()
                .map(|pitch| pitch.as_str())
                .collect::<Vec<_>>()
                .join("+");
            format!("{notes} {}", event.duration)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes what would be played, measure by measure.
#[derive(Debug)]
pub struct TranscriptRenderer<W: Write> {
    out: W,
}

impl<W: Write> TranscriptRenderer<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_request(&mut self, request: &RenderRequest<'_>) -> std::io::Result<()> {
        let hands = request
            .hands
            .iter()
            .map(|hand| hand.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        writeln!(
            self.out,
            "♪ Measures {} in {} at {} BPM ({hands})",
            request.range, request.key, request.tempo
        )?;

        for (offset, measure) in request.measures.iter().enumerate() {
            let position = request.range.start + offset;
            let beats = measure_beats(measure, request.hands);
            write!(self.out, "  [{position}] #{}", measure.id)?;
            for hand in request.hands.iter() {
                let label = match hand {
                    Hand::Right => "RH",
                    Hand::Left => "LH",
                };
                write!(self.out, "  {label}: {}", describe_events(measure.hand(hand)))?;
            }
            writeln!(
                self.out,
                "  ({beats} beats, {:.2}s)",
                beats_to_seconds(beats, request.tempo)
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write> AudioRenderer for TranscriptRenderer<W> {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        self.write_request(request)
            .map_err(|e| Error::collaborator("renderer", format!("could not write transcript: {e}")))
    }
}

/// Pipes each request as one JSON document to an external program.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: CommandLine,
}

impl CommandRenderer {
    #[must_use]
    pub const fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

impl AudioRenderer for CommandRenderer {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| Error::collaborator("renderer", format!("could not encode request: {e}")))?;

        debug!("Spawning renderer `{}` for measures {}", self.command, request.range);
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::collaborator("renderer", format!("could not start `{}`: {e}", self.command))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .map_err(|e| Error::collaborator("renderer", format!("could not send request: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::collaborator("renderer", format!("renderer did not finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::collaborator(
                "renderer",
                format!("`{}` exited with {}: {}", self.command, output.status, stderr.trim()),
            ));
        }

        info!("Rendered measures {} at {} BPM", request.range, request.tempo);
        Ok(())
    }
}
