//! Digitized sheet music that learns how you practice.
//!
//! Scorebook caches the result of extracting a score from a sheet, lets a
//! person correct the extraction, learns durable preferences from those
//! corrections, and drives an interactive measure-by-measure playback session.
//!
//! Core modules:
//! - [`score`] - Score data model, validation and lenient correction drafts
//! - [`store`] - Content-addressed score cache
//! - [`preferences`] - Per-user preference store
//! - [`diff`] / [`learner`] - Structural diff and correction learning
//! - [`playback`] / [`session`] - Playback controller and interactive loop
//!
//! ### Supporting Modules
//!
//! - [`db`] - `SQLite` schema and shared connection handle
//! - [`corrections`] / [`evaluation`] - Append-only history logs
//! - [`extract`] / [`correct`] / [`render`] - External collaborators
//! - [`workflow`] - The `open` pipeline tying everything together
//! - [`config`] / [`cli`] / [`completion`] - Binary plumbing
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use scorebook::correct::NoCorrection;
//! use scorebook::extract::JsonExtractor;
//! use scorebook::learner::LearnerConfig;
//! use scorebook::render::TranscriptRenderer;
//! use scorebook::score::HandSelection;
//! use scorebook::workflow::Library;
//! use std::path::Path;
//!
//! let library = Library::open(Path::new("library.db"), LearnerConfig::default())?;
//! let loaded = library.load_or_extract(Path::new("etude.json"), "ada", &JsonExtractor)?;
//! let reviewed = library.review_and_learn(&loaded.score, &NoCorrection, "ada")?;
//!
//! let mut session = library.start_session(
//!     reviewed.score,
//!     "ada",
//!     TranscriptRenderer::new(std::io::stdout()),
//!     None,
//!     HandSelection::Both,
//! );
//! session.play(Some((1, 4)))?;
//! session.next()?;
//! # Ok::<(), scorebook::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`Result`] with one of four [`Error`] categories:
//! not found, invalid input, collaborator failure and storage failure. None
//! of them ends an interactive session.

pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod correct;
pub mod corrections;
pub mod db;
pub mod diff;
pub mod error;
pub mod evaluation;
pub mod extract;
pub mod fingerprint;
pub mod learner;
pub mod playback;
pub mod preferences;
pub mod render;
pub mod score;
pub mod session;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
