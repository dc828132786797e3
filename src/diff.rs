//! Structural diff between an extracted score and its human correction.
//!
//! ## Alignment
//!
//! Measures are paired **by id** when both sides carry a unique id on every
//! measure. If the correction drops ids, or either side repeats one, pairing
//! falls back to **position**. Only fields present in the correction are
//! compared; an absent hand or tempo is "not reviewed", never a change.

use crate::score::{Hand, Measure, MeasureDraft, NoteEvent, Score, ScoreDraft};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    pub from: T,
    pub to: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    ById,
    ByPosition,
}

/// Edit summary for one hand of one measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandEdit {
    /// Positions whose event differs, counting added and removed events.
    pub changed_events: usize,
    pub from_len: usize,
    pub to_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum MeasureChange {
    Modified {
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right_hand: Option<HandEdit>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        left_hand: Option<HandEdit>,
    },
    Inserted {
        id: u32,
    },
    Removed {
        id: u32,
    },
}

impl MeasureChange {
    #[must_use]
    pub const fn hand_edit(&self, hand: Hand) -> Option<HandEdit> {
        match self {
            Self::Modified {
                right_hand,
                left_hand,
                ..
            } => match hand {
                Hand::Right => *right_hand,
                Hand::Left => *left_hand,
            },
            Self::Inserted { .. } | Self::Removed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<FieldChange<u32>>,
    pub alignment: Alignment,
    #[serde(default)]
    pub measures: Vec<MeasureChange>,
}

impl ScoreDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.tempo.is_none() && self.measures.is_empty()
    }

    /// Measures with at least one edited hand.
    #[must_use]
    pub fn modified_measures(&self) -> usize {
        self.measures
            .iter()
            .filter(|m| matches!(m, MeasureChange::Modified { .. }))
            .count()
    }

    /// Measures whose `hand` was edited.
    #[must_use]
    pub fn hand_edits(&self, hand: Hand) -> usize {
        self.measures
            .iter()
            .filter(|m| m.hand_edit(hand).is_some())
            .count()
    }

    #[must_use]
    pub fn inserted(&self) -> usize {
        self.measures
            .iter()
            .filter(|m| matches!(m, MeasureChange::Inserted { .. }))
            .count()
    }

    #[must_use]
    pub fn removed(&self) -> usize {
        self.measures
            .iter()
            .filter(|m| matches!(m, MeasureChange::Removed { .. }))
            .count()
    }
}

/// Compare `original` against the fields present in `corrected`.
#[must_use]
pub fn diff(original: &Score, corrected: &ScoreDraft) -> ScoreDiff {
    let key = corrected
        .key
        .as_ref()
        .filter(|key| **key != original.key)
        .map(|key| FieldChange {
            from: original.key.clone(),
            to: key.clone(),
        });
    let tempo = corrected
        .tempo
        .filter(|tempo| *tempo != original.tempo)
        .map(|tempo| FieldChange {
            from: original.tempo,
            to: tempo,
        });

    let (alignment, measures) = match &corrected.measures {
        None => (Alignment::ById, Vec::new()),
        Some(drafts) if corrected.aligns_by_id(original) => {
            (Alignment::ById, diff_by_id(&original.measures, drafts))
        }
        Some(drafts) => (Alignment::ByPosition, diff_by_position(&original.measures, drafts)),
    };

    ScoreDiff {
        key,
        tempo,
        alignment,
        measures,
    }
}

fn diff_by_id(original: &[Measure], drafts: &[MeasureDraft]) -> Vec<MeasureChange> {
    // Both sides keyed by id; BTreeMap keeps the output in id order.
    let mut slots: BTreeMap<u32, (Option<&Measure>, Option<&MeasureDraft>)> = BTreeMap::new();
    for measure in original {
        slots.entry(measure.id).or_default().0 = Some(measure);
    }
    for draft in drafts {
        if let Some(id) = draft.id {
            slots.entry(id).or_default().1 = Some(draft);
        }
    }

    slots
        .into_iter()
        .filter_map(|(id, pair)| match pair {
            (Some(measure), Some(draft)) => compare_measure(id, measure, draft),
            (None, Some(_)) => Some(MeasureChange::Inserted { id }),
            (Some(_), None) => Some(MeasureChange::Removed { id }),
            (None, None) => None,
        })
        .collect()
}

fn diff_by_position(original: &[Measure], drafts: &[MeasureDraft]) -> Vec<MeasureChange> {
    let longest = original.len().max(drafts.len());
    (0..longest)
        .filter_map(|index| match (original.get(index), drafts.get(index)) {
            (Some(measure), Some(draft)) => compare_measure(measure.id, measure, draft),
            (None, Some(draft)) => Some(MeasureChange::Inserted {
                id: draft
                    .id
                    .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX)),
            }),
            (Some(measure), None) => Some(MeasureChange::Removed { id: measure.id }),
            (None, None) => None,
        })
        .collect()
}

fn compare_measure(id: u32, measure: &Measure, draft: &MeasureDraft) -> Option<MeasureChange> {
    let right_hand = compare_hand(&measure.right_hand, draft.right_hand.as_deref());
    let left_hand = compare_hand(&measure.left_hand, draft.left_hand.as_deref());

    (right_hand.is_some() || left_hand.is_some()).then_some(MeasureChange::Modified {
        id,
        right_hand,
        left_hand,
    })
}

fn compare_hand(original: &[NoteEvent], corrected: Option<&[NoteEvent]>) -> Option<HandEdit> {
    let corrected = corrected?;
    if original == corrected {
        return None;
    }

    let longest = original.len().max(corrected.len());
    let changed_events = (0..longest)
        .filter(|&i| original.get(i) != corrected.get(i))
        .count();

    Some(HandEdit {
        changed_events,
        from_len: original.len(),
        to_len: corrected.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::tests::{event, sample_score};
    use crate::score::DurationSymbol;

    #[test]
    fn test_identical_scores_have_empty_diff() {
        let score = sample_score();
        let result = diff(&score, &ScoreDraft::from(&score));
        assert!(result.is_empty());
        assert_eq!(result.alignment, Alignment::ById);
    }

    #[test]
    fn test_key_and_tempo_changes() {
        let score = sample_score();
        let mut corrected = score.clone();
        corrected.key = "A Minor".to_owned();
        corrected.tempo = 140;

        let result = diff(&score, &ScoreDraft::from(&corrected));
        assert_eq!(
            result.tempo,
            Some(FieldChange { from: 120, to: 140 })
        );
        assert_eq!(result.key.map(|k| k.to), Some("A Minor".to_owned()));
        assert!(result.measures.is_empty());
    }

    #[test]
    fn test_hand_edit_counts_changed_positions() {
        let score = sample_score();
        let mut corrected = score.clone();
        corrected.measures[1].right_hand[1] = event(&["A4"], DurationSymbol::Quarter);
        corrected.measures[1]
            .right_hand
            .push(event(&["B4"], DurationSymbol::Eighth));

        let result = diff(&score, &ScoreDraft::from(&corrected));
        assert_eq!(
            result.measures,
            vec![MeasureChange::Modified {
                id: 2,
                right_hand: Some(HandEdit {
                    changed_events: 2,
                    from_len: 2,
                    to_len: 3
                }),
                left_hand: None,
            }]
        );
        assert_eq!(result.hand_edits(Hand::Right), 1);
        assert_eq!(result.hand_edits(Hand::Left), 0);
    }

    #[test]
    fn test_id_alignment_detects_insert_and_remove() {
        let score = sample_score();
        let mut corrected = score.clone();
        corrected.measures.remove(0);
        corrected.measures.push(Measure {
            id: 4,
            right_hand: vec![],
            left_hand: vec![],
        });

        let result = diff(&score, &ScoreDraft::from(&corrected));
        assert_eq!(result.alignment, Alignment::ById);
        assert_eq!(
            result.measures,
            vec![MeasureChange::Removed { id: 1 }, MeasureChange::Inserted { id: 4 }]
        );
        assert_eq!(result.inserted(), 1);
        assert_eq!(result.removed(), 1);
    }

    #[test]
    fn test_missing_ids_fall_back_to_position() {
        let score = sample_score();
        let mut draft = ScoreDraft::from(&score);
        let measures = draft.measures.as_mut().expect("measures");
        for measure in measures.iter_mut() {
            measure.id = None;
        }
        measures[2].left_hand = Some(vec![event(&["G2"], DurationSymbol::Whole)]);

        let result = diff(&score, &draft);
        assert_eq!(result.alignment, Alignment::ByPosition);
        assert_eq!(result.hand_edits(Hand::Left), 1);
        assert_eq!(result.measures.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_fall_back_to_position() {
        let score = sample_score();
        let mut draft = ScoreDraft::from(&score);
        if let Some(measures) = draft.measures.as_mut() {
            measures[1].id = Some(1);
        }
        let result = diff(&score, &draft);
        assert_eq!(result.alignment, Alignment::ByPosition);
        assert!(result.is_empty());
    }

    #[test]
    fn test_absent_fields_are_not_corrections() {
        let score = sample_score();
        let draft = ScoreDraft {
            key: None,
            tempo: None,
            measures: Some(vec![MeasureDraft {
                id: Some(1),
                right_hand: None,
                left_hand: None,
            }]),
        };

        let result = diff(&score, &draft);
        // Measures 2 and 3 are missing from a present list, so they were removed.
        assert_eq!(result.removed(), 2);
        assert_eq!(result.modified_measures(), 0);
        assert!(result.key.is_none() && result.tempo.is_none());

        assert!(diff(&score, &ScoreDraft::default()).is_empty());
    }

    #[test]
    fn test_diff_serializes_compactly() {
        let change = MeasureChange::Inserted { id: 9 };
        let json = serde_json::to_value(&change).expect("serialize");
        assert_eq!(json, serde_json::json!({"change": "inserted", "id": 9}));
    }
}
