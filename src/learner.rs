//! # Correction Learner
//!
//! Turns human corrections into durable preferences.
//!
//! ## Signals
//!
//! - **Tempo**: a corrected tempo is taken as the user's preferred tempo and
//!   written to `default_tempo`.
//! - **Hand**: when the edits in one correction are concentrated in one hand
//!   (at least [`LearnerConfig::hand_threshold`] of the edited measures touch
//!   that hand, and at most the complement touch the other) the user is
//!   working on that hand, and `preferred_hand` is set to it.
//!
//! The record is appended first and preferences are written after it, so a
//! failed append changes nothing. Preference writes are best effort: a failed
//! write is logged and the correction stays recorded.

use crate::corrections::{CorrectionLog, CorrectionRecord, Signal};
use crate::diff::{diff, ScoreDiff};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::preferences::{PreferenceStore, DEFAULT_TEMPO, PREFERRED_HAND};
use crate::score::{Hand, HandSelection, Score, ScoreDraft};
use chrono::Utc;
use log::{debug, info, warn};

/// Tuning for signal derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnerConfig {
    /// Fraction of edited measures that must touch one hand.
    pub hand_threshold: f64,
    /// Fewer edited measures than this never produce a hand signal.
    pub min_changed_measures: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            hand_threshold: 0.8,
            min_changed_measures: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionLearner {
    preferences: PreferenceStore,
    log: CorrectionLog,
    config: LearnerConfig,
}

impl CorrectionLearner {
    #[must_use]
    pub const fn new(preferences: PreferenceStore, log: CorrectionLog, config: LearnerConfig) -> Self {
        Self {
            preferences,
            log,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Learn from a complete corrected score. Identical scores are a no-op
    /// and return `None`.
    pub fn learn(
        &self,
        original: &Score,
        corrected: &Score,
        user_id: &str,
    ) -> Result<Option<CorrectionRecord>> {
        if original == corrected {
            debug!("Correction identical to extraction; nothing to learn");
            return Ok(None);
        }
        self.learn_draft(original, &ScoreDraft::from(corrected), user_id)
    }

    /// Learn from a possibly partial correction. Only present fields count.
    pub fn learn_draft(
        &self,
        original: &Score,
        corrected: &ScoreDraft,
        user_id: &str,
    ) -> Result<Option<CorrectionRecord>> {
        let changes = diff(original, corrected);
        if changes.is_empty() {
            debug!("Correction changes nothing; nothing to learn");
            return Ok(None);
        }

        let signals = self.derive_signals(&changes);
        let mut record = CorrectionRecord {
            id: None,
            user_id: user_id.to_owned(),
            original_ref: Fingerprint::of_json(original)?,
            corrected_ref: Fingerprint::of_json(corrected)?,
            corrected: corrected.clone(),
            diff: changes,
            signals,
            timestamp: Utc::now(),
        };
        record.id = Some(self.log.append(&record)?);

        // Preferences only move once the record backing them exists.
        for signal in &record.signals {
            self.apply(user_id, *signal);
        }

        info!(
            "Learned from correction by {user_id}: {} signal(s)",
            record.signals.len()
        );
        Ok(Some(record))
    }

    /// Signals implied by one diff.
    #[must_use]
    pub fn derive_signals(&self, changes: &ScoreDiff) -> Vec<Signal> {
        let mut signals = Vec::new();

        if let Some(tempo) = &changes.tempo {
            signals.push(Signal::PreferredTempo(tempo.to));
        }
        if let Some(hand) = self.concentrated_hand(changes) {
            signals.push(Signal::PreferredHand(hand.into()));
        }

        signals
    }

    fn concentrated_hand(&self, changes: &ScoreDiff) -> Option<Hand> {
        let edited = changes.modified_measures();
        if edited == 0 || edited < self.config.min_changed_measures {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let share = |hand: Hand| changes.hand_edits(hand) as f64 / edited as f64;
        let threshold = self.config.hand_threshold;

        [Hand::Right, Hand::Left].into_iter().find(|&hand| {
            let other = match hand {
                Hand::Right => Hand::Left,
                Hand::Left => Hand::Right,
            };
            share(hand) >= threshold && share(other) <= 1.0 - threshold
        })
    }

    fn apply(&self, user_id: &str, signal: Signal) {
        let result = match signal {
            Signal::PreferredTempo(bpm) => self.preferences.update(user_id, DEFAULT_TEMPO, bpm),
            Signal::PreferredHand(hand) => {
                self.preferences
                    .update(user_id, PREFERRED_HAND, hand.as_str())
            }
        };
        match result {
            Ok(()) => debug!("Applied {signal:?} for {user_id}"),
            Err(err) => warn!("Could not store {signal:?} for {user_id}: {err}"),
        }
    }
}
