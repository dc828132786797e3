//! Human review of an extraction.
//!
//! A [`Corrector`] shows the extracted score to a person and returns what
//! they submitted as a [`ScoreDraft`]. Drafts are read leniently: a field the
//! reviewer broke or deleted is treated as not reviewed.

use crate::config::CommandLine;
use crate::error::{Error, Result};
use crate::score::{Score, ScoreDraft};
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

pub trait Corrector {
    fn review(&self, original: &Score) -> Result<ScoreDraft>;
}

impl<C: Corrector + ?Sized> Corrector for Box<C> {
    fn review(&self, original: &Score) -> Result<ScoreDraft> {
        (**self).review(original)
    }
}

/// Accepts the extraction as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl Corrector for NoCorrection {
    fn review(&self, original: &Score) -> Result<ScoreDraft> {
        Ok(ScoreDraft::from(original))
    }
}

/// A correction prepared ahead of time in a JSON file.
#[derive(Debug, Clone)]
pub struct FileCorrector {
    path: PathBuf,
}

impl FileCorrector {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Corrector for FileCorrector {
    fn review(&self, _original: &Score) -> Result<ScoreDraft> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            Error::collaborator("corrector", format!("could not read {}: {e}", self.path.display()))
        })?;
        Ok(ScoreDraft::from_json(&raw))
    }
}

/// Opens the score in the user's editor and reads it back on exit.
#[derive(Debug, Clone)]
pub struct EditorCorrector {
    editor: CommandLine,
}

impl EditorCorrector {
    #[must_use]
    pub const fn new(editor: CommandLine) -> Self {
        Self { editor }
    }
}

impl Corrector for EditorCorrector {
    fn review(&self, original: &Score) -> Result<ScoreDraft> {
        let io_failure = |e: std::io::Error| {
            Error::collaborator("corrector", format!("could not prepare review file: {e}"))
        };

        let mut file = tempfile::Builder::new()
            .prefix("scorebook-review-")
            .suffix(".json")
            .tempfile()
            .map_err(io_failure)?;
        file.write_all(original.to_json_pretty()?.as_bytes())
            .map_err(io_failure)?;
        file.flush().map_err(io_failure)?;

        debug!("Opening {} in `{}`", file.path().display(), self.editor);
        let status = Command::new(&self.editor.program)
            .args(&self.editor.args)
            .arg(file.path())
            .status()
            .map_err(|e| {
                Error::collaborator("corrector", format!("could not start `{}`: {e}", self.editor))
            })?;
        if !status.success() {
            return Err(Error::collaborator(
                "corrector",
                format!("`{}` exited with {status}; correction abandoned", self.editor),
            ));
        }

        let raw = fs::read_to_string(file.path()).map_err(io_failure)?;
        info!("Review finished");
        Ok(ScoreDraft::from_json(&raw))
    }
}
