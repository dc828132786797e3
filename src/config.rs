//! # Configuration Module
//!
//! Data directory setup and runtime settings for Scorebook.
//!
//! ## Data Storage
//!
//! The library database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/scorebook/library.db`
//! - macOS: `~/Library/Application Support/scorebook/library.db`
//! - Windows: `%APPDATA%\scorebook\library.db`
//!
//! Every setting can be overridden from the command line or the environment
//! (`SCOREBOOK_DB`, `SCOREBOOK_USER`, `SCOREBOOK_EXTRACTOR`,
//! `SCOREBOOK_RENDERER`, `EDITOR`); see [`crate::cli`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// User id used when none is configured.
pub const DEFAULT_USER: &str = "default";

/// Returns the platform-appropriate database file path, creating the
/// `scorebook` directory if needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the
/// `scorebook` subdirectory cannot be created.
///
/// # Examples
///
/// ```no_run
/// use scorebook::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Library location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Pass --db or set SCOREBOOK_DB instead."
        )
    })?;

    let scorebook_dir = data_dir.join("scorebook");
    fs::create_dir_all(&scorebook_dir).with_context(|| {
        format!(
            "Failed to create Scorebook data directory at {}. Please check file permissions.",
            scorebook_dir.display()
        )
    })?;

    Ok(scorebook_dir.join("library.db"))
}

/// An external program plus its fixed leading arguments, as configured in
/// one string such as `"omr-extract --format json"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split on whitespace. No shell quoting is interpreted.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let mut parts = raw.split_whitespace().map(str::to_owned);
        let program = parts
            .next()
            .ok_or_else(|| crate::Error::invalid("empty command line"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Settings for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the library database.
    pub db_path: PathBuf,
    /// Whose preferences and corrections apply.
    pub user_id: String,
    /// Extraction program; without one only `.json` scores can be opened.
    pub extractor: Option<CommandLine>,
    /// Synthesizer fed render requests; without one playback is transcribed.
    pub renderer: Option<CommandLine>,
    /// Editor for reviewing extractions.
    pub editor: Option<CommandLine>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::with_db_path(get_db_path().unwrap_or_else(|_| PathBuf::from("library.db")))
    }
}

impl RuntimeConfig {
    /// Configuration rooted at the platform data directory.
    pub fn new() -> Result<Self> {
        Ok(Self::with_db_path(get_db_path()?))
    }

    #[must_use]
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            user_id: DEFAULT_USER.to_owned(),
            extractor: None,
            renderer: None,
            editor: None,
        }
    }
}
