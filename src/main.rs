//! # Scorebook
//!
//! Binary entry point. Parses the command line, opens the library and routes
//! each subcommand to the library crate.
//!
//! Logging goes through `env_logger` and is controlled by `RUST_LOG`:
//! - `RUST_LOG=debug scorebook open sheet.png` - everything
//! - `RUST_LOG=scorebook::learner=debug scorebook open sheet.png` - one module

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use scorebook::cli::{self, Command};
use scorebook::completion;
use scorebook::config::{CommandLine, RuntimeConfig};
use scorebook::correct::{Corrector, EditorCorrector, FileCorrector, NoCorrection};
use scorebook::extract::{CommandExtractor, Extractor, JsonExtractor};
use scorebook::fingerprint::Fingerprint;
use scorebook::learner::LearnerConfig;
use scorebook::preferences::parse_value;
use scorebook::render::{AudioRenderer, CommandRenderer, TranscriptRenderer};
use scorebook::score::{HandSelection, Score};
use scorebook::session::run_session;
use scorebook::workflow::Library;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

/// Options of the `open` subcommand.
struct OpenOptions {
    file: PathBuf,
    tempo: Option<u32>,
    hand: HandSelection,
    interactive: bool,
    corrected: Option<PathBuf>,
    no_correct: bool,
    evaluate: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let mut config = match args.db {
        Some(path) => RuntimeConfig::with_db_path(path),
        None => RuntimeConfig::new()?,
    };
    config.user_id = args.user;
    debug!("Using library {}", config.db_path.display());

    match args.command {
        Command::Open {
            file,
            tempo,
            hand,
            interactive,
            corrected,
            no_correct,
            evaluate,
            extractor,
            renderer,
            editor,
        } => {
            config.extractor = parse_command(extractor.as_deref())?;
            config.renderer = parse_command(renderer.as_deref())?;
            config.editor = parse_command(editor.as_deref())?;
            let options = OpenOptions {
                file,
                tempo,
                hand: hand.into(),
                interactive,
                corrected,
                no_correct,
                evaluate,
            };
            open(&config, &options)?;
        }
        Command::Import { file, score } => import(&config, &file, &score)?,
        Command::List => list(&config)?,
        Command::Show { file } => show(&config, &file)?,
        Command::Prefs { set } => prefs(&config, &set)?,
        Command::History => history(&config)?,
        Command::EvalSummary => eval_summary(&config)?,
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
    }

    Ok(())
}

fn parse_command(raw: Option<&str>) -> Result<Option<CommandLine>> {
    raw.filter(|raw| !raw.trim().is_empty())
        .map(CommandLine::parse)
        .transpose()
        .context("Invalid external command")
}

fn open_library(config: &RuntimeConfig) -> Result<Library> {
    Library::open(&config.db_path, LearnerConfig::default())
        .with_context(|| format!("Failed to open library at {}", config.db_path.display()))
}

fn choose_extractor(config: &RuntimeConfig, file: &Path) -> Result<Box<dyn Extractor>> {
    let is_json = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return Ok(Box::new(JsonExtractor));
    }
    match &config.extractor {
        Some(command) => Ok(Box::new(CommandExtractor::new(command.clone()))),
        None => bail!(
            "No extractor configured for {}. Pass --extractor or set SCOREBOOK_EXTRACTOR.",
            file.display()
        ),
    }
}

fn choose_corrector(config: &RuntimeConfig, options: &OpenOptions) -> Box<dyn Corrector> {
    if options.no_correct {
        return Box::new(NoCorrection);
    }
    if let Some(path) = &options.corrected {
        return Box::new(FileCorrector::new(path));
    }
    match &config.editor {
        Some(editor) if io::stdin().is_terminal() => Box::new(EditorCorrector::new(editor.clone())),
        _ => {
            info!("No editor available; skipping review");
            Box::new(NoCorrection)
        }
    }
}

fn open(config: &RuntimeConfig, options: &OpenOptions) -> Result<()> {
    let library = open_library(config)?;
    let user = config.user_id.as_str();
    println!("Processing file: {}", options.file.display());

    let extractor = choose_extractor(config, &options.file)?;
    let loaded = library
        .load_or_extract(&options.file, user, extractor.as_ref())
        .with_context(|| format!("Failed to load {}", options.file.display()))?;
    if loaded.from_cache {
        println!("Loaded from library ({}).", loaded.fingerprint.short());
    } else {
        println!("Extraction complete ({}).", loaded.fingerprint.short());
    }

    let corrector = choose_corrector(config, options);
    let reviewed = library
        .review_and_learn(&loaded.score, corrector.as_ref(), user)
        .context("Review failed")?;
    if let Some(record) = &reviewed.record {
        println!(
            "Correction recorded: {} measure change(s), {} preference signal(s).",
            record.diff.measures.len(),
            record.signals.len()
        );
    }

    if options.evaluate {
        evaluate(&library, &loaded.fingerprint, user)?;
    }

    let renderer: Box<dyn AudioRenderer> = match &config.renderer {
        Some(command) => Box::new(CommandRenderer::new(command.clone())),
        None => Box::new(TranscriptRenderer::new(io::stdout())),
    };
    let mut controller =
        library.start_session(reviewed.score, user, renderer, options.tempo, options.hand);
    println!(
        "Tempo {} BPM, hands: {}.",
        controller.tempo(),
        controller.hands().selection()
    );

    if options.interactive {
        let stdin = io::stdin();
        run_session(&mut controller, stdin.lock(), &mut io::stdout())
            .context("Interactive session failed")?;
    } else {
        controller.play(None).context("Playback failed")?;
    }
    Ok(())
}

fn evaluate(library: &Library, fingerprint: &Fingerprint, user: &str) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let rating = loop {
        print!("Rate this extraction (1-5, blank to skip): ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            return Ok(());
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match line.parse::<u8>() {
            Ok(rating) if (1..=5).contains(&rating) => break rating,
            _ => println!("Please enter a number from 1 to 5."),
        }
    };

    print!("Notes (optional): ");
    io::stdout().flush()?;
    let notes = lines.next().transpose()?.filter(|n| !n.trim().is_empty());

    library
        .evaluations()
        .record(fingerprint, user, rating, notes.as_deref())
        .context("Failed to record evaluation")?;
    println!("Thanks, rating saved.");
    Ok(())
}

fn import(config: &RuntimeConfig, file: &Path, score_path: &Path) -> Result<()> {
    let raw = fs::read_to_string(score_path)
        .with_context(|| format!("Failed to read {}", score_path.display()))?;
    let score = Score::ingest(&raw)
        .with_context(|| format!("{} is not a valid score", score_path.display()))?;

    let library = open_library(config)?;
    let fingerprint = library
        .import(file, &score)
        .with_context(|| format!("Failed to import score for {}", file.display()))?;
    println!(
        "Imported {} ({} measures) as {}",
        file.display(),
        score.measures.len(),
        fingerprint
    );
    Ok(())
}

fn list(config: &RuntimeConfig) -> Result<()> {
    let library = open_library(config)?;
    let entries = library.scores().entries()?;
    if entries.is_empty() {
        println!("The library is empty.");
        return Ok(());
    }

    println!(
        "{:<10} {:<14} {:>5} {:>8}  {:<20} Source",
        "Hash", "Key", "BPM", "Measures", "Last opened"
    );
    for entry in entries {
        println!(
            "{:<10} {:<14} {:>5} {:>8}  {:<20} {}",
            entry.fingerprint.short(),
            entry.score.key,
            entry.score.tempo,
            entry.score.measures.len(),
            entry.last_accessed_at.format("%Y-%m-%d %H:%M"),
            entry.source.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn show(config: &RuntimeConfig, file: &Path) -> Result<()> {
    let fingerprint = Fingerprint::for_file(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let library = open_library(config)?;
    let Some(entry) = library.scores().entry(&fingerprint)? else {
        bail!("{} is not in the library. Open it first.", file.display());
    };

    let stats = entry.score.statistics();
    println!("Sheet:        {}", file.display());
    println!("Fingerprint:  {}", entry.fingerprint);
    println!("Key:          {}", stats.key);
    println!("Tempo:        {} BPM", stats.tempo);
    println!("Measures:     {} ({} rests)", stats.measure_count, stats.rest_measures);
    println!("Note events:  {}", stats.note_event_count);
    println!("Pitches:      {}", stats.unique_pitches.join(" "));
    println!("Cached:       {}", entry.created_at.format("%Y-%m-%d %H:%M"));

    for warning in entry.score.validate().warnings {
        println!("Warning:      {warning}");
    }
    Ok(())
}

fn prefs(config: &RuntimeConfig, assignments: &[String]) -> Result<()> {
    let library = open_library(config)?;
    let user = config.user_id.as_str();

    for assignment in assignments {
        let Some((key, value)) = assignment.split_once('=') else {
            bail!("Expected KEY=VALUE, got `{assignment}`");
        };
        library
            .preferences()
            .update(user, key.trim(), parse_value(value.trim()))
            .with_context(|| format!("Failed to store preference {key}"))?;
    }

    let entries = library.preferences().entries(user)?;
    if entries.is_empty() {
        println!("No preferences stored for {user}.");
    }
    for preference in entries {
        println!(
            "{:<16} {:<12} (updated {})",
            preference.key,
            preference.value,
            preference.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn history(config: &RuntimeConfig) -> Result<()> {
    let library = open_library(config)?;
    let user = config.user_id.as_str();
    let records = library.corrections().history(user)?;

    if records.is_empty() {
        println!("No corrections recorded for {user}.");
        return Ok(());
    }
    for record in &records {
        let signals = serde_json::to_string(&record.signals)?;
        println!(
            "#{:<4} {}  {} -> {}  {} measure change(s)  signals {signals}",
            record.id.unwrap_or_default(),
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.original_ref.short(),
            record.corrected_ref.short(),
            record.diff.measures.len(),
        );
    }

    let patterns = library.corrections().patterns(user)?;
    println!();
    println!("Corrections:      {}", patterns.total);
    println!("Tempo changes:    {}", patterns.tempo_changes);
    println!("Key changes:      {}", patterns.key_changes);
    println!(
        "Hand edits:       right {}, left {}",
        patterns.right_hand_edits, patterns.left_hand_edits
    );
    println!(
        "Measures:         {} inserted, {} removed",
        patterns.inserted_measures, patterns.removed_measures
    );
    if let Some(hand) = patterns.busiest_hand() {
        println!("Most edited hand: {hand}");
    }
    Ok(())
}

fn eval_summary(config: &RuntimeConfig) -> Result<()> {
    let library = open_library(config)?;
    let summary = library.evaluations().summary()?;

    println!("Evaluations:    {}", summary.count);
    match summary.average_rating {
        Some(average) => println!("Average rating: {average:.2}"),
        None => println!("Average rating: -"),
    }
    for (user, count) in &summary.per_user {
        println!("  {user}: {count}");
    }
    Ok(())
}
