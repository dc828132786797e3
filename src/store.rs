//! # Score Cache
//!
//! Content-addressed cache of extracted scores. A sheet is only ever sent to
//! the extractor once; every later open is a [`ScoreStore::lookup`] hit.
//!
//! Writes go through [`Score::check`], so a score that fails validation never
//! lands in the cache. Entries are never evicted.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::score::Score;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::OptionalExtension;
use serde::Serialize;

/// A cached score with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    /// Where the sheet was when it was first extracted, if known.
    pub source: Option<String>,
    pub score: Score,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScoreStore {
    db: Database,
}

impl ScoreStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Cached score for `fingerprint`, or `None` on a miss.
    ///
    /// A hit refreshes `last_accessed_at`. An undecodable row is reported as
    /// [`Error::Storage`] so the caller can fall back to re-extraction.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Score>> {
        let Some(json) = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT score FROM scores WHERE fingerprint = ?1",
                [fingerprint.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?
        else {
            debug!("Cache miss for {}", fingerprint.short());
            return Ok(None);
        };

        let score: Score = serde_json::from_str(&json)?;

        if let Err(err) = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE scores SET last_accessed_at = ?1 WHERE fingerprint = ?2",
                (Utc::now(), fingerprint.as_str()),
            )
        }) {
            warn!("Could not refresh access time for {}: {err}", fingerprint.short());
        }

        debug!("Cache hit for {}", fingerprint.short());
        Ok(Some(score))
    }

    /// Insert or replace. The last write for a fingerprint wins; `created_at`
    /// of an existing entry is kept.
    pub fn put(&self, fingerprint: &Fingerprint, score: &Score) -> Result<()> {
        self.put_with_source(fingerprint, score, None)
    }

    pub fn put_with_source(
        &self,
        fingerprint: &Fingerprint,
        score: &Score,
        source: Option<&str>,
    ) -> Result<()> {
        score.check()?;
        let json = serde_json::to_string(score)?;
        let now = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scores (fingerprint, source, score, created_at, last_accessed_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                     source = COALESCE(excluded.source, scores.source),
                     score = excluded.score,
                     last_accessed_at = excluded.last_accessed_at",
                (fingerprint.as_str(), source, &json, now),
            )
        })?;

        info!(
            "Cached score {} ({} measures)",
            fingerprint.short(),
            score.measures.len()
        );
        Ok(())
    }

    /// Full entry without touching the access time.
    pub fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT fingerprint, source, score, created_at, last_accessed_at
                 FROM scores WHERE fingerprint = ?1",
                [fingerprint.as_str()],
                raw_entry,
            )
            .optional()
        })?;
        row.map(RawEntry::decode).transpose()
    }

    /// Every entry, most recently used first.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fingerprint, source, score, created_at, last_accessed_at
                 FROM scores ORDER BY last_accessed_at DESC",
            )?;
            let rows = stmt
                .query_map([], raw_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(RawEntry::decode).collect()
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM scores", [], |row| row.get(0)))?;
        usize::try_from(count).map_err(|e| Error::Storage(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

struct RawEntry {
    fingerprint: String,
    source: Option<String>,
    score: String,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

fn raw_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        fingerprint: row.get(0)?,
        source: row.get(1)?,
        score: row.get(2)?,
        created_at: row.get(3)?,
        last_accessed_at: row.get(4)?,
    })
}

impl RawEntry {
    fn decode(self) -> Result<CacheEntry> {
        Ok(CacheEntry {
            fingerprint: Fingerprint::parse(&self.fingerprint)
                .map_err(|e| Error::Storage(format!("corrupt fingerprint in cache: {e}")))?,
            source: self.source,
            score: serde_json::from_str(&self.score)?,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::tests::sample_score;

    fn store() -> ScoreStore {
        ScoreStore::new(Database::open_in_memory().expect("in-memory db"))
    }

    #[test]
    fn test_put_then_lookup_round_trips() -> Result<()> {
        let store = store();
        let fp = Fingerprint::from_bytes(b"page one");
        let score = sample_score();

        store.put(&fp, &score)?;
        assert_eq!(store.lookup(&fp)?, Some(score));
        Ok(())
    }

    #[test]
    fn test_unknown_fingerprint_is_a_miss() -> Result<()> {
        let store = store();
        store.put(&Fingerprint::from_bytes(b"a"), &sample_score())?;
        assert_eq!(store.lookup(&Fingerprint::from_bytes(b"b"))?, None);
        Ok(())
    }

    #[test]
    fn test_last_put_wins_and_keeps_created_at() -> Result<()> {
        let store = store();
        let fp = Fingerprint::from_bytes(b"sheet");
        let first = sample_score();
        let mut second = sample_score();
        second.tempo = 96;

        store.put_with_source(&fp, &first, Some("/sheets/a.png"))?;
        let created = store.entry(&fp)?.expect("entry").created_at;
        store.put(&fp, &first)?;
        store.put(&fp, &second)?;

        let entry = store.entry(&fp)?.expect("entry");
        assert_eq!(entry.score, second);
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.source.as_deref(), Some("/sheets/a.png"));
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[test]
    fn test_invalid_score_is_rejected_and_prior_value_kept() -> Result<()> {
        let store = store();
        let fp = Fingerprint::from_bytes(b"sheet");
        store.put(&fp, &sample_score())?;

        let mut broken = sample_score();
        broken.tempo = 0;
        assert!(store.put(&fp, &broken).unwrap_err().is_invalid_input());
        assert_eq!(store.lookup(&fp)?, Some(sample_score()));
        Ok(())
    }

    #[test]
    fn test_corrupt_row_is_storage_error() -> Result<()> {
        let db = Database::open_in_memory()?;
        let store = ScoreStore::new(db.clone());
        let fp = Fingerprint::from_bytes(b"sheet");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scores VALUES (?1, NULL, '{not json', ?2, ?2)",
                (fp.as_str(), Utc::now()),
            )
        })?;

        assert!(matches!(store.lookup(&fp), Err(Error::Storage(_))));
        Ok(())
    }

    #[test]
    fn test_entries_lists_everything() -> Result<()> {
        let store = store();
        assert!(store.is_empty()?);
        for name in [b"one".as_slice(), b"two", b"three"] {
            store.put(&Fingerprint::from_bytes(name), &sample_score())?;
        }
        assert_eq!(store.entries()?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_store_is_shared_between_handles() -> Result<()> {
        let db = Database::open_in_memory()?;
        let writer = ScoreStore::new(db.clone());
        let reader = ScoreStore::new(db);
        let fp = Fingerprint::from_bytes(b"shared");

        let handle = std::thread::spawn(move || writer.put(&fp, &sample_score()));
        handle.join().expect("writer thread")?;

        assert!(reader.lookup(&Fingerprint::from_bytes(b"shared"))?.is_some());
        Ok(())
    }
}
