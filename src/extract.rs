//! Score extraction collaborators.
//!
//! An [`Extractor`] turns a sheet on disk into a [`Score`] or fails with
//! [`Error::Collaborator`]. It never returns a partial score: whatever it
//! produces goes through [`Score::ingest`] first.

use crate::config::CommandLine;
use crate::error::{Error, Result};
use crate::score::Score;
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

pub trait Extractor {
    fn extract(&self, path: &Path, user_id: &str) -> Result<Score>;
}

impl<E: Extractor + ?Sized> Extractor for Box<E> {
    fn extract(&self, path: &Path, user_id: &str) -> Result<Score> {
        (**self).extract(path, user_id)
    }
}

/// Treats the sheet itself as score JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extract(&self, path: &Path, _user_id: &str) -> Result<Score> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::collaborator("extractor", format!("could not read {}: {e}", path.display()))
        })?;
        Score::ingest(&raw).map_err(|e| {
            Error::collaborator("extractor", format!("{} is not a usable score: {e}", path.display()))
        })
    }
}

/// Runs `<program> [args..] <file> <user>` and reads score JSON from stdout.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    command: CommandLine,
}

impl CommandExtractor {
    #[must_use]
    pub const fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

impl Extractor for CommandExtractor {
    fn extract(&self, path: &Path, user_id: &str) -> Result<Score> {
        debug!("Running extractor `{}` on {}", self.command, path.display());
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(path)
            .arg(user_id)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::collaborator("extractor", format!("could not start `{}`: {e}", self.command))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::collaborator(
                "extractor",
                format!("`{}` exited with {}: {}", self.command, output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let score = Score::ingest(&stdout).map_err(|e| {
            Error::collaborator("extractor", format!("`{}` produced an unusable score: {e}", self.command))
        })?;
        info!(
            "Extracted {} measures from {}",
            score.measures.len(),
            path.display()
        );
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SHEET: &str = r#"{"key": "G Major", "tempo": "96", "measures": [
        {"id": 2, "right_hand": [{"notes": ["G4"], "duration": "half"}]},
        {"id": 1, "left_hand": [{"notes": ["G2", "D3"], "duration": "whole"}]}
    ]}"#;

    fn sheet(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_json_extractor_ingests_and_normalizes() -> Result<()> {
        let file = sheet(SHEET);
        let score = JsonExtractor.extract(file.path(), "ada")?;
        assert_eq!(score.tempo, 96);
        assert_eq!(score.measures[0].id, 1);
        Ok(())
    }

    #[test]
    fn test_json_extractor_rejects_garbage() {
        let file = sheet("not a score");
        assert!(matches!(
            JsonExtractor.extract(file.path(), "ada"),
            Err(Error::Collaborator { collaborator: "extractor", .. })
        ));
    }

    #[test]
    fn test_missing_sheet_is_collaborator_failure() {
        let err = JsonExtractor
            .extract(Path::new("/definitely/not/here.json"), "ada")
            .unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_extractor_reads_stdout() -> Result<()> {
        // sh -c binds the appended file and user to $0 and $1.
        let file = sheet(SHEET);
        let script = format!("cat {}", file.path().display());
        let extractor = CommandExtractor::new(CommandLine {
            program: "sh".to_owned(),
            args: vec!["-c".to_owned(), script],
        });
        let score = extractor.extract(file.path(), "ada")?;
        assert_eq!(score.key, "G Major");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_command_extractor_failure_is_reported() {
        let extractor = CommandExtractor::new(CommandLine::parse("false").expect("command"));
        assert!(matches!(
            extractor.extract(Path::new("sheet.png"), "ada"),
            Err(Error::Collaborator { collaborator: "extractor", .. })
        ));
    }
}
