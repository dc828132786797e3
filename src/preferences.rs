//! Per-user playback preferences.
//!
//! Values are stored as JSON so unknown keys round-trip untouched. Known keys
//! get typed accessors on [`Preferences`]; missing keys are simply absent and
//! defaulting is left to the caller.

use crate::db::Database;
use crate::error::Result;
use crate::score::HandSelection;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_TEMPO: &str = "default_tempo";
pub const PREFERRED_HAND: &str = "preferred_hand";

/// One stored preference with its write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preference {
    pub user_id: String,
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a user's preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Preferences(BTreeMap<String, Value>);

impl Preferences {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn default_tempo(&self) -> Option<u32> {
        let value = self.get(DEFAULT_TEMPO)?;
        let tempo = value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|tempo| *tempo > 0);
        if tempo.is_none() {
            warn!("Ignoring unusable {DEFAULT_TEMPO} preference: {value}");
        }
        tempo
    }

    #[must_use]
    pub fn preferred_hand(&self) -> Option<HandSelection> {
        self.get(PREFERRED_HAND)?.as_str()?.parse().ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    db: Database,
}

impl PreferenceStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get_preferences(&self, user_id: &str) -> Result<Preferences> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM preferences WHERE user_id = ?1")?;
            let rows = stmt
                .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut values = BTreeMap::new();
        for (key, raw) in rows {
            values.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(Preferences(values))
    }

    /// Upsert a single key. Visible to the very next read.
    pub fn update(&self, user_id: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let raw = serde_json::to_string(&value)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO preferences (user_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                (user_id, key, &raw, Utc::now()),
            )
        })?;

        debug!("Preference {key} = {raw} for user {user_id}");
        Ok(())
    }

    /// Stored rows with timestamps, for display.
    pub fn entries(&self, user_id: &str) -> Result<Vec<Preference>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value, updated_at FROM preferences WHERE user_id = ?1 ORDER BY key",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(key, raw, updated_at)| {
                Ok(Preference {
                    user_id: user_id.to_owned(),
                    key,
                    value: serde_json::from_str(&raw)?,
                    updated_at,
                })
            })
            .collect()
    }
}

/// Interpret a command-line value: JSON if it parses, plain text otherwise.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}
