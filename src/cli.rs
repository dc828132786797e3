//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `scorebook` binary.
//!
//! ## Commands
//!
//! - `open`: Load (or extract) a sheet, review it, learn, and play it
//! - `import`: Seed the library with a score produced elsewhere
//! - `list`: Show every cached score
//! - `show`: Statistics for one cached sheet
//! - `prefs`: Show or set the current user's preferences
//! - `history`: Correction history and patterns
//! - `eval-summary`: Extraction ratings summary
//!
//! ## Examples
//!
//! ```bash
//! scorebook open nocturne.png --interactive
//! scorebook --user ada prefs --set default_tempo=92
//! SCOREBOOK_EXTRACTOR="omr-extract --json" scorebook open etude.pdf --hand left
//! ```

use crate::score::HandSelection;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Hand choice as accepted on the command line.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum HandArg {
    Left,
    Right,
    #[default]
    Both,
}

impl From<HandArg> for HandSelection {
    fn from(hand: HandArg) -> Self {
        match hand {
            HandArg::Left => Self::Left,
            HandArg::Right => Self::Right,
            HandArg::Both => Self::Both,
        }
    }
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "scorebook")]
#[command(about = "Scorebook: digitized sheet music that learns how you practice")]
#[command(version)]
pub struct Args {
    /// Library database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "SCOREBOOK_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Whose preferences and corrections to use
    #[arg(long, global = true, env = "SCOREBOOK_USER", default_value = crate::config::DEFAULT_USER)]
    pub user: String,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a sheet: extract or load from the library, review, and play
    ///
    /// The sheet's content hash is looked up in the library first. On a miss
    /// the configured extractor runs once and its result is cached. The
    /// extraction is then offered for review; any correction is learned from
    /// and the corrected score is played.
    Open {
        /// Sheet to open (image, PDF, or a score `.json`)
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Tempo in BPM (defaults to your stored preference, then the score)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        tempo: Option<u32>,

        /// Hands to play (a stored preference replaces `both`)
        #[arg(long, value_enum, default_value_t = HandArg::Both)]
        hand: HandArg,

        /// Start an interactive practice session instead of playing once
        #[arg(short, long)]
        interactive: bool,

        /// Take the correction from this JSON file instead of an editor
        #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
        corrected: Option<PathBuf>,

        /// Skip the review step
        #[arg(long, conflicts_with = "corrected")]
        no_correct: bool,

        /// Rate the extraction after review
        #[arg(long)]
        evaluate: bool,

        /// Extraction program, run as `<cmd> <file> <user>`
        #[arg(long, env = "SCOREBOOK_EXTRACTOR")]
        extractor: Option<String>,

        /// Synthesizer that receives JSON render requests on stdin
        #[arg(long, env = "SCOREBOOK_RENDERER")]
        renderer: Option<String>,

        /// Editor used for review
        #[arg(long, env = "EDITOR")]
        editor: Option<String>,
    },

    /// Add a score produced elsewhere to the library under a sheet's hash
    Import {
        /// The sheet the score belongs to
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Score JSON
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        score: PathBuf,
    },

    /// List every score in the library
    List,

    /// Show statistics for a sheet's cached score
    Show {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Show or set preferences for the current user
    Prefs {
        /// Store `KEY=VALUE`; VALUE is read as JSON when it parses
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Show the current user's correction history and patterns
    History,

    /// Summarize extraction ratings
    EvalSummary,

    /// Generate shell completions
    ///
    /// Usage: scorebook completion bash > ~/.local/share/bash-completion/completions/scorebook
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
