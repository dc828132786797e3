//! Append-only correction history.
//!
//! Every time a human edit changes an extracted score, one
//! [`CorrectionRecord`] is written. Records are never updated or deleted;
//! they are the learning signal history for [`CorrectionLog::patterns`].

use crate::db::Database;
use crate::diff::ScoreDiff;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::score::{Hand, HandSelection, ScoreDraft};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// A preference the learner derived from a correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "value", rename_all = "snake_case")]
pub enum Signal {
    PreferredTempo(u32),
    PreferredHand(HandSelection),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionRecord {
    /// Row id; `None` until appended.
    pub id: Option<i64>,
    pub user_id: String,
    /// Content hash of the score as extracted.
    pub original_ref: Fingerprint,
    /// Content hash of the correction as submitted.
    pub corrected_ref: Fingerprint,
    pub corrected: ScoreDraft,
    pub diff: ScoreDiff,
    pub signals: Vec<Signal>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate view over a user's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionPatterns {
    pub total: usize,
    pub tempo_changes: usize,
    pub key_changes: usize,
    pub right_hand_edits: usize,
    pub left_hand_edits: usize,
    pub inserted_measures: usize,
    pub removed_measures: usize,
}

impl CorrectionPatterns {
    /// Hand that received most edits, if one clearly did.
    #[must_use]
    pub fn busiest_hand(&self) -> Option<Hand> {
        use std::cmp::Ordering;
        match self.right_hand_edits.cmp(&self.left_hand_edits) {
            Ordering::Greater => Some(Hand::Right),
            Ordering::Less => Some(Hand::Left),
            Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionLog {
    db: Database,
}

impl CorrectionLog {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append `record` and return its row id.
    pub fn append(&self, record: &CorrectionRecord) -> Result<i64> {
        let corrected = serde_json::to_string(&record.corrected)?;
        let diff = serde_json::to_string(&record.diff)?;
        let signals = serde_json::to_string(&record.signals)?;

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO corrections
                     (user_id, original_ref, corrected_ref, corrected_score, diff, signals, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    &record.user_id,
                    record.original_ref.as_str(),
                    record.corrected_ref.as_str(),
                    &corrected,
                    &diff,
                    &signals,
                    record.timestamp,
                ),
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!(
            "Recorded correction #{id} for {} ({} measure changes)",
            record.user_id,
            record.diff.measures.len()
        );
        Ok(id)
    }

    /// A user's records, oldest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<CorrectionRecord>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, original_ref, corrected_ref, corrected_score, diff, signals, created_at
                 FROM corrections WHERE user_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(RawRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        original_ref: row.get(2)?,
                        corrected_ref: row.get(3)?,
                        corrected: row.get(4)?,
                        diff: row.get(5)?,
                        signals: row.get(6)?,
                        timestamp: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(RawRecord::decode).collect()
    }

    pub fn count(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM corrections WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
        })?;
        usize::try_from(count).map_err(|e| Error::Storage(e.to_string()))
    }

    pub fn patterns(&self, user_id: &str) -> Result<CorrectionPatterns> {
        let history = self.history(user_id)?;
        Ok(history
            .iter()
            .fold(CorrectionPatterns::default(), |mut acc, record| {
                acc.total += 1;
                acc.tempo_changes += usize::from(record.diff.tempo.is_some());
                acc.key_changes += usize::from(record.diff.key.is_some());
                acc.right_hand_edits += record.diff.hand_edits(Hand::Right);
                acc.left_hand_edits += record.diff.hand_edits(Hand::Left);
                acc.inserted_measures += record.diff.inserted();
                acc.removed_measures += record.diff.removed();
                acc
            }))
    }
}

struct RawRecord {
    id: i64,
    user_id: String,
    original_ref: String,
    corrected_ref: String,
    corrected: String,
    diff: String,
    signals: String,
    timestamp: DateTime<Utc>,
}

impl RawRecord {
    fn decode(self) -> Result<CorrectionRecord> {
        let corrected_value: serde_json::Value = serde_json::from_str(&self.corrected)?;
        Ok(CorrectionRecord {
            id: Some(self.id),
            user_id: self.user_id,
            original_ref: Fingerprint::parse(&self.original_ref)?,
            corrected_ref: Fingerprint::parse(&self.corrected_ref)?,
            corrected: ScoreDraft::from_value(&corrected_value),
            diff: serde_json::from_str(&self.diff)?,
            signals: serde_json::from_str(&self.signals)?,
            timestamp: self.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::score::tests::sample_score;
    use crate::score::Score;

    fn record_for(user_id: &str, corrected: &Score) -> CorrectionRecord {
        let original = sample_score();
        let draft = ScoreDraft::from(corrected);
        CorrectionRecord {
            id: None,
            user_id: user_id.to_owned(),
            original_ref: Fingerprint::of_json(&original).expect("hash"),
            corrected_ref: Fingerprint::of_json(&draft).expect("hash"),
            diff: diff(&original, &draft),
            corrected: draft,
            signals: vec![Signal::PreferredTempo(corrected.tempo)],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_read_back() -> Result<()> {
        let log = CorrectionLog::new(Database::open_in_memory()?);
        let mut corrected = sample_score();
        corrected.tempo = 140;
        let record = record_for("ada", &corrected);

        let id = log.append(&record)?;
        let history = log.history("ada")?;

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, Some(id));
        assert_eq!(history[0].diff, record.diff);
        assert_eq!(history[0].corrected, record.corrected);
        assert_eq!(history[0].signals, vec![Signal::PreferredTempo(140)]);
        Ok(())
    }

    #[test]
    fn test_history_is_per_user_and_append_only() -> Result<()> {
        let log = CorrectionLog::new(Database::open_in_memory()?);
        let mut corrected = sample_score();
        corrected.key = "D Major".to_owned();

        log.append(&record_for("ada", &corrected))?;
        log.append(&record_for("ada", &corrected))?;
        log.append(&record_for("bo", &corrected))?;

        assert_eq!(log.count("ada")?, 2);
        assert_eq!(log.count("bo")?, 1);
        assert_eq!(log.count("cy")?, 0);
        Ok(())
    }

    #[test]
    fn test_patterns_aggregate_history() -> Result<()> {
        let log = CorrectionLog::new(Database::open_in_memory()?);

        let mut tempo_fix = sample_score();
        tempo_fix.tempo = 100;
        log.append(&record_for("ada", &tempo_fix))?;

        let mut left_fix = sample_score();
        left_fix.measures[0].left_hand.clear();
        left_fix.measures[2].left_hand.clear();
        log.append(&record_for("ada", &left_fix))?;

        let patterns = log.patterns("ada")?;
        assert_eq!(patterns.total, 2);
        assert_eq!(patterns.tempo_changes, 1);
        assert_eq!(patterns.key_changes, 0);
        assert_eq!(patterns.left_hand_edits, 2);
        assert_eq!(patterns.right_hand_edits, 0);
        assert_eq!(patterns.busiest_hand(), Some(Hand::Left));
        Ok(())
    }

    #[test]
    fn test_signal_serialization() {
        let json = serde_json::to_string(&Signal::PreferredHand(HandSelection::Right))
            .expect("serialize");
        assert_eq!(json, r#"{"signal":"preferred_hand","value":"right"}"#);
    }
}
