use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::Verdict;
use crate::model::answer::{Answer, AnswerSet};
use crate::model::ids::{AnswerId, QuestionId};
use crate::model::question::Question;
use crate::model::session::SessionTarget;

/// Bumped whenever the persisted trail layout changes.
pub const TRAIL_SCHEMA_VERSION: u32 = 1;

/// What the user submitted for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TrailSelection {
    Choices(Vec<AnswerId>),
    Text(String),
}

impl TrailSelection {
    #[must_use]
    pub fn includes(&self, answer: AnswerId) -> bool {
        match self {
            TrailSelection::Choices(ids) => ids.contains(&answer),
            TrailSelection::Text(_) => false,
        }
    }
}

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub question: Question,
    pub answers: AnswerSet,
    pub selection: TrailSelection,
    pub verdict: Verdict,
}

impl TrailEntry {
    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question.id
    }

    /// Selected candidates, in the order the user picked them.
    #[must_use]
    pub fn selected_answers(&self) -> Vec<&Answer> {
        match &self.selection {
            TrailSelection::Choices(ids) => ids
                .iter()
                .filter_map(|id| self.answers.get(*id))
                .collect(),
            TrailSelection::Text(_) => Vec::new(),
        }
    }
}

/// Append-only history of a session, keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTrail {
    entries: Vec<TrailEntry>,
}

impl SessionTrail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` unless its question is already recorded.
    ///
    /// Returns whether the entry was appended.
    pub fn record(&mut self, entry: TrailEntry) -> bool {
        if self.contains(entry.question_id()) {
            log::debug!("trail already holds question {}", entry.question_id());
            return false;
        }
        self.entries.push(entry);
        true
    }

    #[must_use]
    pub fn contains(&self, question: QuestionId) -> bool {
        self.entries.iter().any(|e| e.question_id() == question)
    }

    #[must_use]
    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TrailEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Persisted form of a finished session's trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailRecord {
    pub schema_version: u32,
    pub target: SessionTarget,
    pub recorded_at: DateTime<Utc>,
    pub trail: SessionTrail,
}

impl TrailRecord {
    #[must_use]
    pub fn new(target: SessionTarget, recorded_at: DateTime<Utc>, trail: SessionTrail) -> Self {
        Self {
            schema_version: TRAIL_SCHEMA_VERSION,
            target,
            recorded_at,
            trail,
        }
    }

    #[must_use]
    pub fn is_current_schema(&self) -> bool {
        self.schema_version == TRAIL_SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TopicId;
    use crate::time::fixed_now;

    fn entry(question: u64) -> TrailEntry {
        let qid = QuestionId::new(question);
        let answers = AnswerSet::new(
            qid,
            vec![
                Answer::new(AnswerId::new(1), qid, "yes", true),
                Answer::new(AnswerId::new(2), qid, "no", false),
            ],
        )
        .unwrap();
        TrailEntry {
            question: Question::new(qid, TopicId::new(1), "Q", fixed_now()),
            answers,
            selection: TrailSelection::Choices(vec![AnswerId::new(2)]),
            verdict: Verdict::Incorrect,
        }
    }

    #[test]
    fn record_is_idempotent_per_question() {
        let mut trail = SessionTrail::new();
        assert!(trail.record(entry(1)));
        assert!(!trail.record(entry(1)));
        assert!(trail.record(entry(2)));
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn selected_answers_resolve_against_the_set() {
        let e = entry(1);
        let selected = e.selected_answers();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].text, "no");
    }

    #[test]
    fn record_carries_schema_version() {
        let record = TrailRecord::new(
            SessionTarget::Topic(TopicId::new(3)),
            fixed_now(),
            SessionTrail::new(),
        );
        assert!(record.is_current_schema());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["schema_version"], TRAIL_SCHEMA_VERSION);
    }
}
