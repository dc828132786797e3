//! # Score Data Model
//!
//! Typed representation of a digitized score. Extractors hand us loosely
//! shaped JSON (`"tempo": "120"`, unknown duration names, measures out of
//! order); everything is parsed into [`Score`] and checked by
//! [`Score::validate`] before it reaches the cache.
//!
//! ```text
//! Score ─┬─ key      "C Major"
//!        ├─ tempo    120
//!        └─ measures [Measure { id, right_hand: [NoteEvent], left_hand: [NoteEvent] }]
//! ```
//!
//! Measures are addressed by 1-based *position* during playback. Their `id` is
//! payload carried over from the sheet and may have gaps.
//!
//! [`ScoreDraft`] is the forgiving twin of [`Score`] used for human
//! corrections: every field is optional, and anything unreadable is treated
//! as absent rather than as an error.

use crate::error::{Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A complete, validated score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Score {
    /// Key signature as written by the extractor, e.g. `"C Major"`.
    pub key: String,
    /// Beats per minute. Accepts `120` or `"120"` on input.
    #[serde(deserialize_with = "deserialize_tempo")]
    pub tempo: u32,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Measure {
    pub id: u32,
    #[serde(default)]
    pub right_hand: Vec<NoteEvent>,
    #[serde(default)]
    pub left_hand: Vec<NoteEvent>,
}

/// One or more pitches sounding together for one duration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoteEvent {
    pub notes: Vec<Pitch>,
    pub duration: DurationSymbol,
}

/// Scientific pitch name such as `C4`, `F#3` or `Bb5`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pitch(String);

impl Pitch {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Letter `A`–`G`, optional accidentals, then an octave number.
    /// `rest` is accepted as well.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let name = self.0.trim();
        if name.eq_ignore_ascii_case("rest") {
            return true;
        }

        let mut chars = name.chars().peekable();
        match chars.next() {
            Some(letter) if ('A'..='G').contains(&letter.to_ascii_uppercase()) => {}
            _ => return false,
        }
        while matches!(chars.peek(), Some('#' | 'b' | 'x' | '♯' | '♭' | '♮')) {
            chars.next();
        }
        if chars.peek() == Some(&'-') {
            chars.next();
        }
        let octave: String = chars.collect();
        !octave.is_empty() && octave.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pitch {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Note value. Unknown names survive ingestion as [`DurationSymbol::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DurationSymbol {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    Other(String),
}

impl DurationSymbol {
    /// Length in quarter-note beats. Handles a `dotted` prefix on known names.
    #[must_use]
    pub fn beats(&self) -> Option<f64> {
        match self {
            Self::Whole => Some(4.0),
            Self::Half => Some(2.0),
            Self::Quarter => Some(1.0),
            Self::Eighth => Some(0.5),
            Self::Sixteenth => Some(0.25),
            Self::ThirtySecond => Some(0.125),
            Self::Other(name) => {
                let lowered = name.to_ascii_lowercase();
                let base = lowered
                    .strip_prefix("dotted")
                    .map(|rest| rest.trim_start_matches([' ', '-', '_']))?;
                Self::from(base.to_owned()).beats().map(|beats| beats * 1.5)
            }
        }
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for DurationSymbol {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "whole" => Self::Whole,
            "half" => Self::Half,
            "quarter" => Self::Quarter,
            "eighth" => Self::Eighth,
            "sixteenth" | "16th" => Self::Sixteenth,
            "thirty-second" | "thirtysecond" | "32nd" => Self::ThirtySecond,
            _ => Self::Other(name),
        }
    }
}

impl From<DurationSymbol> for String {
    fn from(symbol: DurationSymbol) -> Self {
        symbol.to_string()
    }
}

impl fmt::Display for DurationSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => f.write_str("whole"),
            Self::Half => f.write_str("half"),
            Self::Quarter => f.write_str("quarter"),
            Self::Eighth => f.write_str("eighth"),
            Self::Sixteenth => f.write_str("sixteenth"),
            Self::ThirtySecond => f.write_str("thirty-second"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// What the user asks for with `hand left|right|both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSelection {
    Left,
    Right,
    #[default]
    Both,
}

impl HandSelection {
    #[must_use]
    pub const fn hands(self) -> Hands {
        match self {
            Self::Left => Hands {
                left: true,
                right: false,
            },
            Self::Right => Hands {
                left: false,
                right: true,
            },
            Self::Both => Hands {
                left: true,
                right: true,
            },
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
        }
    }
}

impl From<Hand> for HandSelection {
    fn from(hand: Hand) -> Self {
        match hand {
            Hand::Left => Self::Left,
            Hand::Right => Self::Right,
        }
    }
}

impl FromStr for HandSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "both" => Ok(Self::Both),
            other => Err(Error::invalid(format!(
                "invalid hand `{other}`. Use left, right, or both"
            ))),
        }
    }
}

impl fmt::Display for HandSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty subset of {left, right}. Only constructible from a
/// [`HandSelection`], so it can never be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hands {
    left: bool,
    right: bool,
}

impl Hands {
    #[must_use]
    pub const fn contains(self, hand: Hand) -> bool {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }

    #[must_use]
    pub const fn selection(self) -> HandSelection {
        match (self.left, self.right) {
            (true, false) => HandSelection::Left,
            (false, true) => HandSelection::Right,
            _ => HandSelection::Both,
        }
    }

    /// Right hand first, matching how the extractor lists them.
    pub fn iter(self) -> impl Iterator<Item = Hand> {
        [Hand::Right, Hand::Left]
            .into_iter()
            .filter(move |hand| self.contains(*hand))
    }
}

impl Default for Hands {
    fn default() -> Self {
        HandSelection::Both.hands()
    }
}

/// Inclusive, 1-based range of measure positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureRange {
    pub start: usize,
    pub end: usize,
}

impl MeasureRange {
    #[must_use]
    pub const fn single(position: usize) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for MeasureRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl Measure {
    #[must_use]
    pub fn hand(&self, hand: Hand) -> &[NoteEvent] {
        match hand {
            Hand::Left => &self.left_hand,
            Hand::Right => &self.right_hand,
        }
    }

    #[must_use]
    pub fn is_rest(&self) -> bool {
        self.right_hand.is_empty() && self.left_hand.is_empty()
    }
}

/// Outcome of [`Score::validate`]. Errors block ingestion, warnings are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreStatistics {
    pub key: String,
    pub tempo: u32,
    pub measure_count: usize,
    pub note_event_count: usize,
    pub rest_measures: usize,
    pub unique_pitches: Vec<String>,
}

impl Score {
    /// Parse extractor JSON without validating it.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::invalid(format!("malformed score JSON: {e}")))
    }

    /// Parse, sort and validate. This is the only way extractor output
    /// enters the library.
    pub fn ingest(json: &str) -> Result<Self> {
        let score = Self::from_json(json)?.normalized();
        score.check()?;
        Ok(score)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Measures sorted by ascending id. Stable, so duplicate ids keep their order.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.measures.sort_by_key(|measure| measure.id);
        self
    }

    /// Validate and turn errors into [`Error::InvalidInput`]. Warnings are logged.
    pub fn check(&self) -> Result<()> {
        let report = self.validate();
        for warning in &report.warnings {
            warn!("Score warning: {warning}");
        }
        if report.is_valid() {
            Ok(())
        } else {
            Err(Error::invalid(report.errors.join("; ")))
        }
    }

    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.tempo == 0 {
            report.errors.push("tempo must be a positive integer".to_owned());
        }
        if self.key.trim().is_empty() {
            report.warnings.push("key signature is empty".to_owned());
        }
        if self.measures.is_empty() {
            report.warnings.push("score has no measures".to_owned());
        }

        let mut seen = HashSet::new();
        let mut previous = 0;
        for measure in &self.measures {
            if measure.id == 0 {
                report.errors.push("measure ids must start at 1".to_owned());
            }
            if !seen.insert(measure.id) {
                report.errors.push(format!("duplicate measure id {}", measure.id));
            }
            if measure.id < previous {
                report
                    .errors
                    .push(format!("measure {} is out of order", measure.id));
            }
            previous = measure.id;

            for hand in [Hand::Right, Hand::Left] {
                for (index, event) in measure.hand(hand).iter().enumerate() {
                    if event.notes.is_empty() {
                        report.errors.push(format!(
                            "measure {} {hand} hand event {} has no notes",
                            measure.id,
                            index + 1
                        ));
                    }
                    for pitch in event.notes.iter().filter(|p| !p.is_well_formed()) {
                        report.warnings.push(format!(
                            "measure {} {hand} hand: unrecognised pitch `{pitch}`",
                            measure.id
                        ));
                    }
                    if !event.duration.is_known() && event.duration.beats().is_none() {
                        report.warnings.push(format!(
                            "measure {} {hand} hand: unknown duration `{}`",
                            measure.id, event.duration
                        ));
                    }
                }
            }
        }

        report
    }

    /// Number of navigable positions. An empty score still has one, so
    /// navigation stays well defined.
    #[must_use]
    pub fn total_measures(&self) -> usize {
        self.measures.len().max(1)
    }

    #[must_use]
    pub fn measure_at(&self, position: usize) -> Option<&Measure> {
        position.checked_sub(1).and_then(|index| self.measures.get(index))
    }

    /// Measures covered by `range`, clipped to what exists.
    #[must_use]
    pub fn slice(&self, range: MeasureRange) -> &[Measure] {
        let len = self.measures.len();
        let start = range.start.saturating_sub(1).min(len);
        let end = range.end.min(len).max(start);
        &self.measures[start..end]
    }

    #[must_use]
    pub fn statistics(&self) -> ScoreStatistics {
        let mut pitches = BTreeSet::new();
        let mut note_event_count = 0;

        for measure in &self.measures {
            for event in measure.right_hand.iter().chain(&measure.left_hand) {
                note_event_count += 1;
                pitches.extend(event.notes.iter().map(|p| p.as_str().to_owned()));
            }
        }

        ScoreStatistics {
            key: self.key.clone(),
            tempo: self.tempo,
            measure_count: self.measures.len(),
            note_event_count,
            rest_measures: self.measures.iter().filter(|m| m.is_rest()).count(),
            unique_pitches: pitches.into_iter().collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TempoRepr {
    Number(u64),
    Float(f64),
    Text(String),
}

fn parse_tempo(repr: TempoRepr) -> Option<u32> {
    match repr {
        TempoRepr::Number(n) => u32::try_from(n).ok(),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        TempoRepr::Float(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
            Some(f as u32)
        }
        TempoRepr::Float(_) => None,
        TempoRepr::Text(text) => {
            let lowered = text.trim().to_ascii_lowercase();
            lowered
                .strip_suffix("bpm")
                .unwrap_or(&lowered)
                .trim()
                .parse()
                .ok()
        }
    }
}

fn deserialize_tempo<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = TempoRepr::deserialize(deserializer)?;
    parse_tempo(repr).ok_or_else(|| serde::de::Error::custom("tempo is not a whole number of BPM"))
}

/// A human-corrected score. Absent fields mean "not reviewed", never "deleted".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measures: Option<Vec<MeasureDraft>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeasureDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_hand: Option<Vec<NoteEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_hand: Option<Vec<NoteEvent>>,
}

impl MeasureDraft {
    #[must_use]
    pub fn hand(&self, hand: Hand) -> Option<&[NoteEvent]> {
        match hand {
            Hand::Left => self.left_hand.as_deref(),
            Hand::Right => self.right_hand.as_deref(),
        }
    }
}

impl From<&Measure> for MeasureDraft {
    fn from(measure: &Measure) -> Self {
        Self {
            id: Some(measure.id),
            right_hand: Some(measure.right_hand.clone()),
            left_hand: Some(measure.left_hand.clone()),
        }
    }
}

impl From<&Score> for ScoreDraft {
    fn from(score: &Score) -> Self {
        Self {
            key: Some(score.key.clone()),
            tempo: Some(score.tempo),
            measures: Some(score.measures.iter().map(MeasureDraft::from).collect()),
        }
    }
}

impl ScoreDraft {
    /// Read a correction. Never fails: unreadable input becomes an empty
    /// draft, unreadable fields become absent fields.
    #[must_use]
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(value) => Self::from_value(&value),
            Err(err) => {
                warn!("Corrected score is not JSON ({err}); treating it as unchanged");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            warn!("Corrected score is not a JSON object; treating it as unchanged");
            return Self::default();
        };

        let key = object
            .get("key")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        let tempo = object
            .get("tempo")
            .and_then(|raw| serde_json::from_value::<TempoRepr>(raw.clone()).ok())
            .and_then(parse_tempo)
            .filter(|tempo| *tempo > 0);
        let measures = object
            .get("measures")
            .and_then(serde_json::Value::as_array)
            .map(|items| items.iter().filter_map(measure_draft_from_value).collect());

        Self {
            key,
            tempo,
            measures,
        }
    }

    /// True when every measure on both sides carries an id and no id repeats.
    /// Otherwise corrections pair with the original by position.
    #[must_use]
    pub fn aligns_by_id(&self, original: &Score) -> bool {
        let Some(drafts) = &self.measures else {
            return true;
        };
        let mut seen = HashSet::new();
        let original_unique = original.measures.iter().all(|m| seen.insert(m.id));

        let mut seen = HashSet::new();
        let drafts_unique = drafts
            .iter()
            .all(|d| d.id.is_some_and(|id| seen.insert(id)));

        original_unique && drafts_unique
    }

    /// Lay the present fields over `original`, pairing measures the same way
    /// [`crate::diff::diff`] does.
    #[must_use]
    pub fn overlay(&self, original: &Score) -> Score {
        let measures = match &self.measures {
            None => original.measures.clone(),
            Some(drafts) if self.aligns_by_id(original) => {
                let by_id: HashMap<u32, &Measure> =
                    original.measures.iter().map(|m| (m.id, m)).collect();
                drafts
                    .iter()
                    .filter_map(|draft| {
                        let id = draft.id?;
                        Some(draft.merge(id, by_id.get(&id).copied()))
                    })
                    .collect()
            }
            Some(drafts) => {
                let mut used_ids = HashSet::new();
                drafts
                    .iter()
                    .enumerate()
                    .filter_map(|(index, draft)| {
                        let base = original.measures.get(index);
                        let preferred = base
                            .map(|m| m.id)
                            .or(draft.id)
                            .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX));
                        let Some(id) = claim_id(&mut used_ids, preferred) else {
                            warn!("No free measure id after {preferred}; dropping corrected measure");
                            return None;
                        };
                        Some(draft.merge(id, base))
                    })
                    .collect()
            }
        };

        Score {
            key: self.key.clone().unwrap_or_else(|| original.key.clone()),
            tempo: self.tempo.unwrap_or(original.tempo),
            measures,
        }
        .normalized()
    }
}

impl MeasureDraft {
    fn merge(&self, id: u32, base: Option<&Measure>) -> Measure {
        Measure {
            id,
            right_hand: self
                .right_hand
                .clone()
                .or_else(|| base.map(|m| m.right_hand.clone()))
                .unwrap_or_default(),
            left_hand: self
                .left_hand
                .clone()
                .or_else(|| base.map(|m| m.left_hand.clone()))
                .unwrap_or_default(),
        }
    }
}

/// First id at or above `preferred` not yet taken. `None` once ids run out.
fn claim_id(used: &mut HashSet<u32>, preferred: u32) -> Option<u32> {
    let mut id = preferred;
    while !used.insert(id) {
        id = id.checked_add(1)?;
    }
    Some(id)
}

fn measure_draft_from_value(value: &serde_json::Value) -> Option<MeasureDraft> {
    let object = value.as_object()?;
    let id = object
        .get("id")
        .and_then(serde_json::Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .filter(|id| *id > 0);

    let hand = |name: &str| -> Option<Vec<NoteEvent>> {
        let raw = object.get(name)?;
        match serde_json::from_value::<Vec<NoteEvent>>(raw.clone()) {
            Ok(events) if events.iter().any(|event| event.notes.is_empty()) => {
                debug!("Ignoring `{name}` in corrected measure: an event has no notes");
                None
            }
            Ok(events) => Some(events),
            Err(err) => {
                debug!("Ignoring unreadable `{name}` in corrected measure: {err}");
                None
            }
        }
    };

    Some(MeasureDraft {
        id,
        right_hand: hand("right_hand"),
        left_hand: hand("left_hand"),
    })
}
