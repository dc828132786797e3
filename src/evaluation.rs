//! Ratings of extraction quality, collected after review.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use chrono::Utc;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub count: usize,
    /// `None` until something has been rated.
    pub average_rating: Option<f64>,
    pub per_user: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct EvaluationLog {
    db: Database,
}

impl EvaluationLog {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a 1 to 5 rating for the extraction of `fingerprint`.
    pub fn record(
        &self,
        fingerprint: &Fingerprint,
        user_id: &str,
        rating: u8,
        notes: Option<&str>,
    ) -> Result<i64> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(Error::invalid(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
            )));
        }

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO evaluations (fingerprint, user_id, rating, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (fingerprint.as_str(), user_id, rating, notes, Utc::now()),
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!("Recorded rating {rating} for {} by {user_id}", fingerprint.short());
        Ok(id)
    }

    pub fn summary(&self) -> Result<EvaluationSummary> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, COUNT(*), SUM(rating) FROM evaluations GROUP BY user_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut summary = EvaluationSummary::default();
        let mut total_rating = 0_i64;
        for (user_id, count, rating_sum) in rows {
            let count = usize::try_from(count).map_err(|e| Error::Storage(e.to_string()))?;
            summary.count += count;
            total_rating += rating_sum;
            summary.per_user.insert(user_id, count);
        }

        #[allow(clippy::cast_precision_loss)]
        let average = (summary.count > 0).then(|| total_rating as f64 / summary.count as f64);
        summary.average_rating = average;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> EvaluationLog {
        EvaluationLog::new(Database::open_in_memory().expect("in-memory db"))
    }

    #[test]
    fn test_empty_summary() -> Result<()> {
        let summary = log().summary()?;
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_rating, None);
        Ok(())
    }

    #[test]
    fn test_summary_averages_and_counts_per_user() -> Result<()> {
        let log = log();
        let fp = Fingerprint::from_bytes(b"sheet");
        log.record(&fp, "ada", 5, Some("perfect"))?;
        log.record(&fp, "ada", 3, None)?;
        log.record(&fp, "bo", 4, None)?;

        let summary = log.summary()?;
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, Some(4.0));
        assert_eq!(summary.per_user.get("ada"), Some(&2));
        assert_eq!(summary.per_user.get("bo"), Some(&1));
        Ok(())
    }

    #[test]
    fn test_out_of_range_rating_is_rejected() -> Result<()> {
        let log = log();
        let fp = Fingerprint::from_bytes(b"sheet");
        assert!(log.record(&fp, "ada", 0, None).unwrap_err().is_invalid_input());
        assert!(log.record(&fp, "ada", 6, None).unwrap_err().is_invalid_input());
        assert_eq!(log.summary()?.count, 0);
        Ok(())
    }
}
