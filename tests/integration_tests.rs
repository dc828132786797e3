//! # Integration Tests for Scorebook
//!
//! End-to-end tests through the public library API and the built binary:
//! cache behaviour across opens, learning from corrections, and scripted
//! interactive sessions.

use anyhow::Result;
use scorebook::correct::{FileCorrector, NoCorrection};
use scorebook::extract::{Extractor, JsonExtractor};
use scorebook::learner::LearnerConfig;
use scorebook::playback::Outcome;
use scorebook::preferences::{DEFAULT_TEMPO, PREFERRED_HAND};
use scorebook::render::{AudioRenderer, RenderRequest};
use scorebook::score::{HandSelection, MeasureRange, Score};
use scorebook::session::run_session;
use scorebook::workflow::Library;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const SCORE_JSON: &str = r#"{
    "key": "C Major",
    "tempo": "120",
    "measures": [
        {"id": 1,
         "right_hand": [{"notes": ["C4", "E4"], "duration": "quarter"}, {"notes": ["G4"], "duration": "quarter"}],
         "left_hand": [{"notes": ["C3"], "duration": "half"}]},
        {"id": 2,
         "right_hand": [{"notes": ["D4", "F4"], "duration": "quarter"}, {"notes": ["A4"], "duration": "quarter"}],
         "left_hand": [{"notes": ["D3"], "duration": "half"}]},
        {"id": 3,
         "right_hand": [{"notes": ["E4", "G4"], "duration": "half"}],
         "left_hand": [{"notes": ["C3", "G3"], "duration": "half"}]}
    ]
}"#;

/// Renderer that remembers which ranges were played.
#[derive(Default)]
struct Recorder {
    played: Vec<(MeasureRange, u32)>,
}

impl AudioRenderer for Recorder {
    fn render(&mut self, request: &RenderRequest<'_>) -> scorebook::Result<()> {
        self.played.push((request.range, request.tempo));
        Ok(())
    }
}

/// Test helper: a temp dir holding a sheet (score JSON) and a library path.
fn create_workspace() -> Result<(TempDir, PathBuf, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let sheet = temp_dir.path().join("etude.json");
    fs::write(&sheet, SCORE_JSON)?;
    let db_path = temp_dir.path().join("library.db");
    Ok((temp_dir, sheet, db_path))
}

#[cfg(test)]
mod workflow_tests {
    use super::*;

    #[test]
    fn test_library_persists_across_reopen() -> Result<()> {
        let (_dir, sheet, db_path) = create_workspace()?;

        {
            let library = Library::open(&db_path, LearnerConfig::default())?;
            let loaded = library.load_or_extract(&sheet, "ada", &JsonExtractor)?;
            assert!(!loaded.from_cache);
        }

        let library = Library::open(&db_path, LearnerConfig::default())?;
        let loaded = library.load_or_extract(&sheet, "ada", &JsonExtractor)?;
        assert!(loaded.from_cache);
        assert_eq!(loaded.score.measures.len(), 3);
        assert_eq!(library.scores().len()?, 1);
        Ok(())
    }

    #[test]
    fn test_cache_hit_skips_extractor() -> Result<()> {
        struct Refusing;
        impl Extractor for Refusing {
            fn extract(&self, _path: &Path, _user_id: &str) -> scorebook::Result<Score> {
                Err(scorebook::Error::collaborator("extractor", "should not run"))
            }
        }

        let (_dir, sheet, db_path) = create_workspace()?;
        let library = Library::open(&db_path, LearnerConfig::default())?;
        library.import(&sheet, &Score::ingest(SCORE_JSON)?)?;

        let loaded = library.load_or_extract(&sheet, "ada", &Refusing)?;
        assert!(loaded.from_cache);
        Ok(())
    }

    #[test]
    fn test_correction_teaches_tempo_and_hand() -> Result<()> {
        let (dir, sheet, db_path) = create_workspace()?;
        let library = Library::open(&db_path, LearnerConfig::default())?;
        let loaded = library.load_or_extract(&sheet, "ada", &JsonExtractor)?;

        // Slow it down and rewrite the right hand of every measure.
        let mut corrected: serde_json::Value = serde_json::from_str(SCORE_JSON)?;
        corrected["tempo"] = serde_json::json!(96);
        for measure in corrected["measures"].as_array_mut().into_iter().flatten() {
            measure["right_hand"] = serde_json::json!([{"notes": ["C5"], "duration": "whole"}]);
        }
        let fix = dir.path().join("fix.json");
        fs::write(&fix, corrected.to_string())?;

        let reviewed = library.review_and_learn(&loaded.score, &FileCorrector::new(&fix), "ada")?;
        assert_eq!(reviewed.score.tempo, 96);

        let prefs = library.preferences().get_preferences("ada")?;
        assert_eq!(prefs.default_tempo(), Some(96));
        assert_eq!(prefs.preferred_hand(), Some(HandSelection::Right));
        assert_eq!(library.corrections().count("ada")?, 1);

        // Next session picks both up.
        let controller =
            library.start_session(reviewed.score, "ada", Recorder::default(), None, HandSelection::Both);
        assert_eq!(controller.tempo(), 96);
        assert_eq!(controller.hands().selection(), HandSelection::Right);
        Ok(())
    }

    #[test]
    fn test_unchanged_review_learns_nothing() -> Result<()> {
        let (_dir, sheet, db_path) = create_workspace()?;
        let library = Library::open(&db_path, LearnerConfig::default())?;
        let loaded = library.load_or_extract(&sheet, "ada", &JsonExtractor)?;

        let reviewed = library.review_and_learn(&loaded.score, &NoCorrection, "ada")?;
        assert!(reviewed.record.is_none());
        assert!(library.preferences().get_preferences("ada")?.is_empty());
        Ok(())
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn test_three_measure_walkthrough() -> Result<()> {
        let library = Library::open_in_memory()?;
        let score = Score::ingest(SCORE_JSON)?;
        let mut c = library.start_session(score, "ada", Recorder::default(), None, HandSelection::Both);
        assert_eq!(c.position(), 1);

        assert_eq!(c.play(Some((2, 3)))?, Outcome::Played(MeasureRange { start: 2, end: 3 }));
        assert_eq!(c.position(), 3);

        assert_eq!(c.next()?, Outcome::EndOfPiece);
        assert_eq!(c.position(), 3);

        assert_eq!(c.prev()?, Outcome::Played(MeasureRange::single(2)));
        assert_eq!(c.position(), 2);

        c.set_tempo(90)?;
        let prefs = library.preferences().get_preferences("ada")?;
        assert_eq!(prefs.get(DEFAULT_TEMPO), Some(&serde_json::json!(90)));

        let played: Vec<MeasureRange> = c.renderer().played.iter().map(|(r, _)| *r).collect();
        assert_eq!(
            played,
            vec![MeasureRange { start: 2, end: 3 }, MeasureRange::single(2)]
        );
        Ok(())
    }

    #[test]
    fn test_scripted_session_survives_bad_input() -> Result<()> {
        let library = Library::open_in_memory()?;
        let score = Score::ingest(SCORE_JSON)?;
        let mut c = library.start_session(score, "ada", Recorder::default(), None, HandSelection::Both);

        let script = "play 9-1\nfly away\nhand left\nplay 2\ntempo 0\nnext\n";
        let mut out = Vec::new();
        run_session(&mut c, script.as_bytes(), &mut out)?;
        let out = String::from_utf8(out)?;

        assert!(out.contains("start is after end"));
        assert!(out.contains("Unknown command `fly`"));
        assert!(out.contains("Hand set to left"));
        assert!(out.contains("(Measure 3/3) > "));
        assert_eq!(c.position(), 3);
        assert_eq!(
            library.preferences().get_preferences("ada")?.get(PREFERRED_HAND),
            Some(&serde_json::json!("left"))
        );
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn scorebook(db_path: &Path, args: &[&str], stdin: &str) -> Result<Output> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_scorebook"))
            .arg("--db")
            .arg(db_path)
            .args(args)
            .env_remove("SCOREBOOK_USER")
            .env_remove("SCOREBOOK_EXTRACTOR")
            .env_remove("SCOREBOOK_RENDERER")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut input) = child.stdin.take() {
            input.write_all(stdin.as_bytes())?;
        }
        Ok(child.wait_with_output()?)
    }

    #[test]
    fn test_cli_help_displays_correctly() -> Result<()> {
        let (_dir, _, db_path) = create_workspace()?;
        let output = scorebook(&db_path, &["--help"], "")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success());
        for command in ["open", "import", "list", "show", "prefs", "history", "eval-summary"] {
            assert!(stdout.contains(command), "help is missing {command}");
        }
        Ok(())
    }

    #[test]
    fn test_completion_generation() -> Result<()> {
        let (_dir, _, db_path) = create_workspace()?;
        let output = scorebook(&db_path, &["completion", "bash"], "")?;

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_scorebook"));
        assert!(stdout.contains("complete"));
        Ok(())
    }

    #[test]
    fn test_open_plays_and_caches() -> Result<()> {
        let (_dir, sheet, db_path) = create_workspace()?;
        let sheet = sheet.to_string_lossy().into_owned();

        let first = scorebook(&db_path, &["open", &sheet, "--no-correct"], "")?;
        assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
        let stdout = String::from_utf8_lossy(&first.stdout);
        assert!(stdout.contains("Extraction complete"));
        assert!(stdout.contains("Measures 1-3 in C Major at 120 BPM"));

        let second = scorebook(&db_path, &["open", &sheet, "--no-correct"], "")?;
        assert!(String::from_utf8_lossy(&second.stdout).contains("Loaded from library"));

        let list = scorebook(&db_path, &["list"], "")?;
        assert!(String::from_utf8_lossy(&list.stdout).contains("C Major"));

        let show = scorebook(&db_path, &["show", &sheet], "")?;
        let stdout = String::from_utf8_lossy(&show.stdout);
        assert!(stdout.contains("Measures:     3"));
        assert!(stdout.contains("C3 C4 D3"));
        Ok(())
    }

    #[test]
    fn test_interactive_session_saves_tempo() -> Result<()> {
        let (_dir, sheet, db_path) = create_workspace()?;
        let sheet = sheet.to_string_lossy().into_owned();

        let output = scorebook(
            &db_path,
            &["--user", "ada", "open", &sheet, "--no-correct", "--interactive"],
            "play 2-3\nnext\nprev\ntempo 90\nexit\n",
        )?;
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("End of piece."));
        assert!(stdout.contains("Tempo set to 90 (preference saved)."));

        let prefs = scorebook(&db_path, &["--user", "ada", "prefs"], "")?;
        let stdout = String::from_utf8_lossy(&prefs.stdout);
        assert!(stdout.contains("default_tempo"));
        assert!(stdout.contains("90"));
        Ok(())
    }

    #[test]
    fn test_open_without_extractor_fails_cleanly() -> Result<()> {
        let (dir, _, db_path) = create_workspace()?;
        let image = dir.path().join("scan.png");
        fs::write(&image, b"\x89PNG not really")?;

        let output = scorebook(&db_path, &["open", &image.to_string_lossy()], "")?;
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("No extractor configured"));
        Ok(())
    }

    #[test]
    fn test_prefs_set_and_eval_summary() -> Result<()> {
        let (_dir, _, db_path) = create_workspace()?;

        let output = scorebook(&db_path, &["prefs", "--set", "preferred_hand=left"], "")?;
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("preferred_hand"));

        let summary = scorebook(&db_path, &["eval-summary"], "")?;
        assert!(String::from_utf8_lossy(&summary.stdout).contains("Evaluations:    0"));
        Ok(())
    }
}
