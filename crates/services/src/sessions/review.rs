use std::sync::Arc;

use quiz_core::grading::Verdict;
use quiz_core::model::{
    Answer, ExpectedAnswer, Question, QuestionKind, TrailEntry, TrailRecord, TrailSelection,
};
use storage::repository::TrailStore;

use crate::error::SessionError;

/// How one candidate is highlighted on the review screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMark {
    SelectedCorrect,
    MissedCorrect,
    SelectedIncorrect,
    Neutral,
}

impl AnswerMark {
    #[must_use]
    pub fn for_answer(answer: &Answer, selected: bool) -> Self {
        match (selected, answer.is_correct) {
            (true, true) => AnswerMark::SelectedCorrect,
            (false, true) => AnswerMark::MissedCorrect,
            (true, false) => AnswerMark::SelectedIncorrect,
            (false, false) => AnswerMark::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkedAnswer {
    pub answer: Answer,
    pub mark: AnswerMark,
}

/// One answered question as shown after the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    /// 0-based position in the session.
    pub index: usize,
    pub question: Question,
    pub verdict: Verdict,
    pub answers: Vec<MarkedAnswer>,
    /// What the player typed, for free-text questions.
    pub typed_text: Option<String>,
    pub expected: ExpectedAnswer,
}

impl ReviewItem {
    #[must_use]
    pub fn from_entry(index: usize, entry: &TrailEntry) -> Self {
        let free_text = entry.answers.kind() == QuestionKind::FreeText;
        let answers = entry
            .answers
            .answers()
            .iter()
            .map(|answer| {
                let selected = if free_text {
                    entry.verdict.is_correct()
                } else {
                    entry.selection.includes(answer.id)
                };
                MarkedAnswer {
                    answer: answer.clone(),
                    mark: AnswerMark::for_answer(answer, selected),
                }
            })
            .collect();
        let typed_text = match &entry.selection {
            TrailSelection::Text(text) => Some(text.clone()),
            TrailSelection::Choices(_) => None,
        };

        Self {
            index,
            question: entry.question.clone(),
            verdict: entry.verdict,
            answers,
            typed_text,
            expected: entry.answers.expected(),
        }
    }
}

/// Review items for every entry of a stored trail, in answer order.
#[must_use]
pub fn review_items(record: &TrailRecord) -> Vec<ReviewItem> {
    record
        .trail
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| ReviewItem::from_entry(index, entry))
        .collect()
}

/// Reads back the trail of the last finished session.
#[derive(Clone)]
pub struct TrailReviewService {
    trails: Arc<dyn TrailStore>,
}

impl TrailReviewService {
    #[must_use]
    pub fn new(trails: Arc<dyn TrailStore>) -> Self {
        Self { trails }
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the trail cannot be read,
    /// including records written by another schema version.
    pub async fn load(&self) -> Result<Option<TrailRecord>, SessionError> {
        Ok(self.trails.load_trail().await?)
    }

    /// Loads the stored trail and marks every answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the trail cannot be read.
    pub async fn items(&self) -> Result<Vec<ReviewItem>, SessionError> {
        Ok(self
            .load()
            .await?
            .map(|record| review_items(&record))
            .unwrap_or_default())
    }

    /// Forget the stored trail when the results view is left.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on backend failures.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.trails.clear_trail().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        AnswerId, AnswerSet, QuestionId, SessionTarget, SessionTrail, TopicId,
    };
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn choice_entry() -> TrailEntry {
        let qid = QuestionId::new(1);
        let answers = AnswerSet::new(
            qid,
            vec![
                Answer::new(AnswerId::new(1), qid, "Danube", true),
                Answer::new(AnswerId::new(2), qid, "Vah", true),
                Answer::new(AnswerId::new(3), qid, "Rhine", false),
                Answer::new(AnswerId::new(4), qid, "Volga", false),
            ],
        )
        .unwrap();
        TrailEntry {
            question: Question::new(qid, TopicId::new(1), "Rivers of Slovakia?", fixed_now()),
            answers,
            selection: TrailSelection::Choices(vec![AnswerId::new(1), AnswerId::new(3)]),
            verdict: Verdict::Incorrect,
        }
    }

    #[test]
    fn marks_cover_all_four_cases() {
        let item = ReviewItem::from_entry(0, &choice_entry());
        let marks: Vec<AnswerMark> = item.answers.iter().map(|a| a.mark).collect();
        assert_eq!(
            marks,
            vec![
                AnswerMark::SelectedCorrect,
                AnswerMark::MissedCorrect,
                AnswerMark::SelectedIncorrect,
                AnswerMark::Neutral,
            ]
        );
        assert_eq!(
            item.expected,
            ExpectedAnswer::Multiple(vec!["Danube".into(), "Vah".into()])
        );
        assert!(item.typed_text.is_none());
    }

    #[test]
    fn free_text_entry_keeps_typed_input() {
        let qid = QuestionId::new(2);
        let entry = TrailEntry {
            question: Question::new(qid, TopicId::new(1), "Capital?", fixed_now())
                .with_text_answer(),
            answers: AnswerSet::new(
                qid,
                vec![Answer::new(AnswerId::new(5), qid, "Bratislava", true)],
            )
            .unwrap(),
            selection: TrailSelection::Text("Kosice".into()),
            verdict: Verdict::Incorrect,
        };
        let item = ReviewItem::from_entry(3, &entry);
        assert_eq!(item.index, 3);
        assert_eq!(item.typed_text.as_deref(), Some("Kosice"));
        assert_eq!(item.answers[0].mark, AnswerMark::MissedCorrect);
        assert_eq!(item.expected, ExpectedAnswer::Single("Bratislava".into()));
    }

    #[tokio::test]
    async fn items_come_from_stored_trail_and_clear_removes_it() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = TrailReviewService::new(repo.clone());
        assert!(service.items().await.unwrap().is_empty());

        let mut trail = SessionTrail::new();
        trail.record(choice_entry());
        repo.save_trail(&TrailRecord::new(
            SessionTarget::Topic(TopicId::new(1)),
            fixed_now(),
            trail,
        ))
        .await
        .unwrap();

        assert_eq!(service.items().await.unwrap().len(), 1);
        service.clear().await.unwrap();
        assert!(service.load().await.unwrap().is_none());
    }
}
