//! Leaderboard helpers: ranking lookups and the compact window shown around
//! the current user.

use serde::{Deserialize, Serialize};

use crate::model::UserId;

/// Places shown in the podium block.
pub const PODIUM_SIZE: usize = 3;

/// Places shown below the podium when the user is already on it.
const FOLLOW_UP_PLACES: usize = 2;

/// One leaderboard row, ordered best first by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: String,
    pub points: f64,
    pub user: UserId,
    pub username: String,
    pub course_name: String,
}

/// Row plus its 1-based place in the full leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry<'a> {
    pub place: usize,
    pub entry: &'a ScoreEntry,
}

/// Ordered leaderboard for one course.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scoreboard {
    entries: Vec<ScoreEntry>,
}

impl Scoreboard {
    #[must_use]
    pub fn new(entries: Vec<ScoreEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_of(&self, user: &UserId) -> Option<usize> {
        self.entries.iter().position(|e| &e.user == user)
    }

    /// 1-based place of `user`, or `None` when they have no entry.
    #[must_use]
    pub fn position_of(&self, user: &UserId) -> Option<usize> {
        self.index_of(user).map(|idx| idx + 1)
    }

    /// Whether `user` already used this period's scoring attempt.
    #[must_use]
    pub fn has_attempt(&self, user: &UserId) -> bool {
        self.index_of(user).is_some()
    }

    #[must_use]
    pub fn podium(&self) -> Vec<RankedEntry<'_>> {
        self.ranked(0, PODIUM_SIZE)
    }

    /// Whether a full leaderboard view has anything beyond the podium to show.
    #[must_use]
    pub fn has_more_than_podium(&self) -> bool {
        self.entries.len() >= PODIUM_SIZE
    }

    /// Rows shown under the podium for `user`.
    ///
    /// A user on the podium sees places 4 and 5. Anyone else sees the place
    /// right above them followed by their own row. Users without an entry get
    /// nothing beyond the podium.
    #[must_use]
    pub fn window_for(&self, user: &UserId) -> Vec<RankedEntry<'_>> {
        match self.index_of(user) {
            Some(idx) if idx < PODIUM_SIZE => self.ranked(PODIUM_SIZE, FOLLOW_UP_PLACES),
            Some(idx) => self.ranked(idx - 1, 2),
            None => Vec::new(),
        }
    }

    fn ranked(&self, start: usize, count: usize) -> Vec<RankedEntry<'_>> {
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .take(count)
            .map(|(idx, entry)| RankedEntry {
                place: idx + 1,
                entry,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: usize) -> UserId {
        UserId::new(format!("u{id}")).unwrap()
    }

    fn board(n: usize) -> Scoreboard {
        Scoreboard::new(
            (0..n)
                .map(|i| ScoreEntry {
                    id: i.to_string(),
                    points: 100.0 - i as f64,
                    user: user(i),
                    username: format!("User {i}"),
                    course_name: "Geo".into(),
                })
                .collect(),
        )
    }

    fn places(rows: &[RankedEntry<'_>]) -> Vec<usize> {
        rows.iter().map(|r| r.place).collect()
    }

    #[test]
    fn position_is_one_based() {
        let b = board(5);
        assert_eq!(b.position_of(&user(0)), Some(1));
        assert_eq!(b.position_of(&user(4)), Some(5));
        assert_eq!(b.position_of(&user(9)), None);
        assert!(b.has_attempt(&user(2)));
        assert!(!b.has_attempt(&user(9)));
    }

    #[test]
    fn podium_user_sees_fourth_and_fifth() {
        let b = board(8);
        assert_eq!(places(&b.window_for(&user(1))), vec![4, 5]);
    }

    #[test]
    fn other_users_see_place_above_and_their_own() {
        let b = board(8);
        assert_eq!(places(&b.window_for(&user(5))), vec![5, 6]);
        assert_eq!(places(&b.window_for(&user(3))), vec![3, 4]);
    }

    #[test]
    fn absent_user_sees_no_window() {
        let b = board(8);
        assert!(b.window_for(&user(42)).is_empty());
        assert!(Scoreboard::default().window_for(&user(1)).is_empty());
    }

    #[test]
    fn short_boards_are_not_padded() {
        let b = board(2);
        assert_eq!(places(&b.podium()), vec![1, 2]);
        assert!(b.window_for(&user(0)).is_empty());
        assert!(!b.has_more_than_podium());
    }
}
