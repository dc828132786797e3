//! # Library Workflow
//!
//! Glue for the `open` pipeline:
//!
//! ```text
//! sheet ──fingerprint──► cache hit? ──yes──────────────┐
//!                            │ no                      │
//!                            ▼                         ▼
//!                        extractor ──put──► cache   review ──► learner
//!                                                      │
//!                                                      ▼
//!                            preferences ──► playback session
//! ```
//!
//! [`Library`] bundles the stores over one database so the binary and the
//! integration tests construct everything in one place.

use crate::corrections::{CorrectionLog, CorrectionRecord};
use crate::correct::Corrector;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::evaluation::EvaluationLog;
use crate::extract::Extractor;
use crate::fingerprint::{source_label, Fingerprint};
use crate::learner::{CorrectionLearner, LearnerConfig};
use crate::playback::PlaybackController;
use crate::preferences::{PreferenceStore, Preferences};
use crate::render::AudioRenderer;
use crate::score::{HandSelection, Score};
use crate::store::ScoreStore;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// A score ready for review.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScore {
    pub fingerprint: Fingerprint,
    pub score: Score,
    pub from_cache: bool,
}

/// Result of the review step.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewedScore {
    /// Extraction with the reviewer's edits laid over it.
    pub score: Score,
    /// Present when the edits changed something.
    pub record: Option<CorrectionRecord>,
}

/// Session settings after stored preferences were consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDefaults {
    pub tempo: Option<u32>,
    pub hand: HandSelection,
    pub tempo_from_preferences: bool,
    pub hand_from_preferences: bool,
}

/// Fill unspecified session settings from `preferences`.
///
/// An explicit tempo always wins. A stored hand only replaces `both`, which is
/// also what the command line passes when no hand was given.
#[must_use]
pub fn session_defaults(
    preferences: &Preferences,
    tempo: Option<u32>,
    hand: HandSelection,
) -> SessionDefaults {
    let stored_tempo = tempo.is_none().then(|| preferences.default_tempo()).flatten();
    let stored_hand = (hand == HandSelection::Both)
        .then(|| preferences.preferred_hand())
        .flatten()
        .filter(|preferred| *preferred != HandSelection::Both);

    SessionDefaults {
        tempo: tempo.or(stored_tempo),
        hand: stored_hand.unwrap_or(hand),
        tempo_from_preferences: stored_tempo.is_some(),
        hand_from_preferences: stored_hand.is_some(),
    }
}

#[derive(Debug, Clone)]
pub struct Library {
    scores: ScoreStore,
    preferences: PreferenceStore,
    corrections: CorrectionLog,
    learner: CorrectionLearner,
    evaluations: EvaluationLog,
}

impl Library {
    pub fn open(path: &Path, config: LearnerConfig) -> Result<Self> {
        Ok(Self::from_database(Database::open(path)?, config))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(
            Database::open_in_memory()?,
            LearnerConfig::default(),
        ))
    }

    #[must_use]
    pub fn from_database(db: Database, config: LearnerConfig) -> Self {
        let preferences = PreferenceStore::new(db.clone());
        let corrections = CorrectionLog::new(db.clone());
        Self {
            scores: ScoreStore::new(db.clone()),
            learner: CorrectionLearner::new(preferences.clone(), corrections.clone(), config),
            preferences,
            corrections,
            evaluations: EvaluationLog::new(db),
        }
    }

    #[must_use]
    pub const fn scores(&self) -> &ScoreStore {
        &self.scores
    }

    #[must_use]
    pub const fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    #[must_use]
    pub const fn corrections(&self) -> &CorrectionLog {
        &self.corrections
    }

    #[must_use]
    pub const fn learner(&self) -> &CorrectionLearner {
        &self.learner
    }

    #[must_use]
    pub const fn evaluations(&self) -> &EvaluationLog {
        &self.evaluations
    }

    /// Cached score for the sheet at `path`, extracting it on a miss.
    ///
    /// An unreadable cache entry is logged and replaced by a fresh extraction.
    pub fn load_or_extract(
        &self,
        path: &Path,
        user_id: &str,
        extractor: &dyn Extractor,
    ) -> Result<LoadedScore> {
        let fingerprint = Fingerprint::for_file(path)?;

        match self.scores.lookup(&fingerprint) {
            Ok(Some(score)) => {
                info!("Loaded {} from the library", path.display());
                return Ok(LoadedScore {
                    fingerprint,
                    score,
                    from_cache: true,
                });
            }
            Ok(None) => {}
            Err(Error::Storage(reason)) => {
                warn!(
                    "Cached entry {} is unusable ({reason}); extracting again",
                    fingerprint.short()
                );
            }
            Err(err) => return Err(err),
        }

        info!("Extracting {}", path.display());
        let score = extractor.extract(path, user_id)?;
        let source = source_label(path);
        self.scores
            .put_with_source(&fingerprint, &score, Some(&source.to_string_lossy()))?;

        Ok(LoadedScore {
            fingerprint,
            score,
            from_cache: false,
        })
    }

    /// Seed the cache with a score produced elsewhere.
    pub fn import(&self, path: &Path, score: &Score) -> Result<Fingerprint> {
        let fingerprint = Fingerprint::for_file(path)?;
        let source = source_label(path);
        self.scores
            .put_with_source(&fingerprint, score, Some(&source.to_string_lossy()))?;
        Ok(fingerprint)
    }

    /// Let `corrector` review `original`, learn from any change, and return
    /// the corrected score for playback. The cache keeps the extraction.
    pub fn review_and_learn(
        &self,
        original: &Score,
        corrector: &dyn Corrector,
        user_id: &str,
    ) -> Result<ReviewedScore> {
        let draft = corrector.review(original)?;
        let record = self.learner.learn_draft(original, &draft, user_id)?;

        let corrected = draft.overlay(original);
        let score = match corrected.check() {
            Ok(()) => corrected,
            Err(err) => {
                warn!("Corrected score is unplayable ({err}); keeping the extraction");
                original.clone()
            }
        };
        Ok(ReviewedScore { score, record })
    }

    /// Playback controller with the user's stored preferences applied.
    pub fn start_session<R: AudioRenderer>(
        &self,
        score: Score,
        user_id: &str,
        renderer: R,
        tempo: Option<u32>,
        hand: HandSelection,
    ) -> PlaybackController<R> {
        let preferences = match self.preferences.get_preferences(user_id) {
            Ok(preferences) => preferences,
            Err(err) => {
                warn!("Could not read preferences for {user_id}: {err}");
                Preferences::default()
            }
        };
        let defaults = session_defaults(&preferences, tempo, hand);
        if defaults.tempo_from_preferences {
            info!("Using preferred tempo {:?} for {user_id}", defaults.tempo);
        }
        if defaults.hand_from_preferences {
            info!("Using preferred hand {} for {user_id}", defaults.hand);
        }

        PlaybackController::new(Arc::new(score), user_id, self.preferences.clone(), renderer)
            .with_tempo_override(defaults.tempo)
            .with_hands(defaults.hand)
    }
}
