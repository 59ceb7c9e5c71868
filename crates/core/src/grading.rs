use serde::{Deserialize, Serialize};

use crate::model::{AnswerSet, QuestionKind, Selection};

//
// ─── VERDICT ───────────────────────────────────────────────────────────────────
//

/// Binary outcome of validating one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    #[must_use]
    pub fn from_bool(correct: bool) -> Self {
        if correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Canonical form used to compare typed answers: trimmed, case-folded.
#[must_use]
pub fn normalize_free_text(input: &str) -> String {
    input.trim().to_uppercase()
}

#[must_use]
pub fn free_text_matches(expected: &str, input: &str) -> bool {
    normalize_free_text(expected) == normalize_free_text(input)
}

/// Grades `selection` against the ground truth in `answers`.
///
/// The validation path comes from `answers.kind()` alone. Choice questions are
/// correct only when the selected set equals the correct set exactly; there is
/// no partial credit and an empty selection is always incorrect.
#[must_use]
pub fn grade(answers: &AnswerSet, selection: &Selection) -> Verdict {
    match answers.kind() {
        QuestionKind::FreeText => {
            let expected = answers.expected_text().unwrap_or_default();
            Verdict::from_bool(free_text_matches(expected, selection.free_text()))
        }
        QuestionKind::Unscorable => {
            log::warn!(
                "question {} has no correct answer among {} candidates; grading as incorrect",
                answers.question_id(),
                answers.len()
            );
            Verdict::Incorrect
        }
        QuestionKind::SingleChoice | QuestionKind::MultipleChoice => {
            let chosen = selection.chosen_set();
            if chosen.is_empty() {
                return Verdict::Incorrect;
            }
            Verdict::from_bool(chosen == answers.correct_ids())
        }
    }
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// Points awarded per correct answer before dividing by elapsed time.
pub const POINTS_PER_CORRECT: f64 = 100.0;

/// Elapsed time below this is scored as if it took this long.
pub const MIN_SCORED_SECONDS: u64 = 1;

/// Challenge score: `correct * 100 / elapsed_seconds`.
///
/// Instant completion is clamped to [`MIN_SCORED_SECONDS`], so the ceiling
/// is `correct * 100` and the result is always finite.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn challenge_score(correct: u32, elapsed_seconds: u64) -> f64 {
    let seconds = elapsed_seconds.max(MIN_SCORED_SECONDS);
    f64::from(correct) * POINTS_PER_CORRECT / seconds as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, AnswerId, QuestionId};

    fn set(flags: &[bool]) -> AnswerSet {
        let answers = flags
            .iter()
            .enumerate()
            .map(|(i, correct)| {
                Answer::new(AnswerId::new(i as u64 + 1), QuestionId::new(1), format!("A{i}"), *correct)
            })
            .collect();
        AnswerSet::new(QuestionId::new(1), answers).unwrap()
    }

    fn select(set: &AnswerSet, ids: &[u64]) -> Selection {
        let mut sel = Selection::new(set.kind());
        for id in ids {
            sel.toggle(AnswerId::new(*id)).unwrap();
        }
        sel
    }

    #[test]
    fn empty_selection_is_incorrect_in_every_choice_mode() {
        for flags in [&[true, false][..], &[true, true, false][..]] {
            let answers = set(flags);
            assert_eq!(grade(&answers, &Selection::new(answers.kind())), Verdict::Incorrect);
        }
    }

    #[test]
    fn exact_set_is_correct() {
        let answers = set(&[true, false, true, false]);
        assert_eq!(grade(&answers, &select(&answers, &[3, 1])), Verdict::Correct);
    }

    #[test]
    fn subset_and_superset_are_incorrect() {
        let answers = set(&[true, false, true, false]);
        assert_eq!(grade(&answers, &select(&answers, &[1])), Verdict::Incorrect);
        assert_eq!(grade(&answers, &select(&answers, &[1, 2, 3])), Verdict::Incorrect);
    }

    #[test]
    fn single_choice_wrong_pick_is_incorrect() {
        let answers = set(&[false, true, false, false]);
        assert_eq!(grade(&answers, &select(&answers, &[1])), Verdict::Incorrect);
        assert_eq!(grade(&answers, &select(&answers, &[2])), Verdict::Correct);
    }

    #[test]
    fn free_text_is_trimmed_and_case_insensitive() {
        assert!(free_text_matches("paris", "  Paris "));
        assert!(free_text_matches(" Bratislava", "bratislava"));
        assert!(!free_text_matches("Bratislava", "Bratislav"));
    }

    #[test]
    fn free_text_question_grades_typed_input() {
        let answers = AnswerSet::new(
            QuestionId::new(1),
            vec![Answer::new(AnswerId::new(1), QuestionId::new(1), "Bratislava", true)],
        )
        .unwrap();
        let mut sel = Selection::new(answers.kind());
        sel.set_free_text("bratislava").unwrap();
        assert_eq!(grade(&answers, &sel), Verdict::Correct);
    }

    #[test]
    fn unscorable_question_is_always_incorrect() {
        let answers = set(&[false, false, false]);
        assert_eq!(grade(&answers, &select(&answers, &[1])), Verdict::Incorrect);
        assert_eq!(grade(&answers, &Selection::new(answers.kind())), Verdict::Incorrect);
    }

    #[test]
    fn challenge_score_divides_by_elapsed_seconds() {
        let score = challenge_score(4, 60);
        assert!((score - 400.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn zero_seconds_is_clamped_to_one() {
        assert!((challenge_score(3, 0) - 300.0).abs() < f64::EPSILON);
        assert!(challenge_score(0, 0).is_finite());
    }
}
