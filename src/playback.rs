//! # Playback Controller
//!
//! Cursor-based navigation over one score for one user.
//!
//! The controller owns a 1-based `position` in `[1, total]`, the set of hands
//! being practiced and an optional tempo override. Every operation either
//! succeeds completely or leaves all three untouched: the cursor only moves
//! after the renderer has reported success, and tempo/hand changes are
//! persisted as preferences before the session adopts them.
//!
//! ## Example
//!
//! ```no_run
//! use scorebook::db::Database;
//! use scorebook::playback::PlaybackController;
//! use scorebook::preferences::PreferenceStore;
//! use scorebook::render::TranscriptRenderer;
//! use scorebook::score::Score;
//! use std::sync::Arc;
//!
//! let score = Score::ingest(r#"{"key": "C Major", "tempo": 120, "measures": [{"id": 1}]}"#)?;
//! let prefs = PreferenceStore::new(Database::open_in_memory()?);
//! let mut controller =
//!     PlaybackController::new(Arc::new(score), "ada", prefs, TranscriptRenderer::new(std::io::stdout()));
//! controller.play(None)?;
//! # Ok::<(), scorebook::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::preferences::{PreferenceStore, DEFAULT_TEMPO, PREFERRED_HAND};
use crate::render::{AudioRenderer, RenderRequest};
use crate::score::{HandSelection, Hands, MeasureRange, Score};
use log::{debug, info};
use std::sync::Arc;

/// What a successful controller call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Played(MeasureRange),
    /// `next` at the last measure. Nothing was rendered.
    EndOfPiece,
    /// `prev` at the first measure. Nothing was rendered.
    AlreadyAtStart,
    TempoSet(u32),
    HandSet(HandSelection),
}

pub struct PlaybackController<R> {
    score: Arc<Score>,
    user_id: String,
    preferences: PreferenceStore,
    renderer: R,
    position: usize,
    tempo_override: Option<u32>,
    hands: Hands,
}

impl<R: AudioRenderer> PlaybackController<R> {
    /// New session positioned at the first measure, both hands, score tempo.
    pub fn new(
        score: Arc<Score>,
        user_id: impl Into<String>,
        preferences: PreferenceStore,
        renderer: R,
    ) -> Self {
        Self {
            score,
            user_id: user_id.into(),
            preferences,
            renderer,
            position: 1,
            tempo_override: None,
            hands: Hands::default(),
        }
    }

    /// Start with a hand selection without persisting it.
    #[must_use]
    pub fn with_hands(mut self, selection: HandSelection) -> Self {
        self.hands = selection.hands();
        self
    }

    /// Start with a tempo override without persisting it. Zero is ignored.
    #[must_use]
    pub fn with_tempo_override(mut self, tempo: Option<u32>) -> Self {
        self.tempo_override = tempo.filter(|bpm| *bpm > 0);
        self
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.score.total_measures()
    }

    /// Effective tempo: the override if set, else the score's.
    #[must_use]
    pub fn tempo(&self) -> u32 {
        self.tempo_override.unwrap_or(self.score.tempo)
    }

    #[must_use]
    pub const fn hands(&self) -> Hands {
        self.hands
    }

    #[must_use]
    pub fn score(&self) -> &Score {
        &self.score
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Play `start..=end`, or from the current position to the end.
    ///
    /// Both ends are clamped into `[1, total]`. A reversed range is rejected
    /// before clamping.
    pub fn play(&mut self, range: Option<(usize, usize)>) -> Result<Outcome> {
        let total = self.total();
        let (start, end) = range.unwrap_or((self.position, total));
        if start > end {
            return Err(Error::invalid(format!(
                "invalid range {start}-{end}: start is after end"
            )));
        }

        let range = MeasureRange {
            start: start.clamp(1, total),
            end: end.clamp(1, total),
        };
        self.render(range)?;
        self.position = range.end;
        Ok(Outcome::Played(range))
    }

    pub fn next(&mut self) -> Result<Outcome> {
        if self.position >= self.total() {
            debug!("next at measure {}: end of piece", self.position);
            return Ok(Outcome::EndOfPiece);
        }
        let target = self.position + 1;
        self.render(MeasureRange::single(target))?;
        self.position = target;
        Ok(Outcome::Played(MeasureRange::single(target)))
    }

    pub fn prev(&mut self) -> Result<Outcome> {
        if self.position <= 1 {
            debug!("prev at measure {}: already at start", self.position);
            return Ok(Outcome::AlreadyAtStart);
        }
        let target = self.position - 1;
        self.render(MeasureRange::single(target))?;
        self.position = target;
        Ok(Outcome::Played(MeasureRange::single(target)))
    }

    /// Change the session tempo and remember it as the user's default.
    pub fn set_tempo(&mut self, bpm: u32) -> Result<Outcome> {
        if bpm == 0 {
            return Err(Error::invalid("tempo must be a positive number of BPM"));
        }
        self.preferences.update(&self.user_id, DEFAULT_TEMPO, bpm)?;
        self.tempo_override = Some(bpm);
        info!("Tempo set to {bpm} for {}", self.user_id);
        Ok(Outcome::TempoSet(bpm))
    }

    /// Change the practiced hands and remember the choice.
    pub fn set_hand(&mut self, selection: HandSelection) -> Result<Outcome> {
        self.preferences
            .update(&self.user_id, PREFERRED_HAND, selection.as_str())?;
        self.hands = selection.hands();
        info!("Hand set to {selection} for {}", self.user_id);
        Ok(Outcome::HandSet(selection))
    }

    fn render(&mut self, range: MeasureRange) -> Result<()> {
        let request = RenderRequest {
            key: &self.score.key,
            measures: self.score.slice(range),
            hands: self.hands,
            tempo: self.tempo_override.unwrap_or(self.score.tempo),
            range,
        };
        debug!(
            "Rendering measures {range} ({} hands) at {} BPM",
            request.hands.selection(),
            request.tempo
        );
        self.renderer.render(&request)
    }
}
