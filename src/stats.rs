use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    iter::Sum,
    ops::Add,
};

use crate::models::Submission;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct QuizStatistics {
    pub participant_count: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
}

impl Add for QuizStatistics {
    type Output = QuizStatistics;

    fn add(self, other: QuizStatistics) -> QuizStatistics {
        QuizStatistics {
            participant_count: self.participant_count + other.participant_count,
            correct_count: self.correct_count + other.correct_count,
            incorrect_count: self.incorrect_count + other.incorrect_count,
        }
    }
}

impl Sum for QuizStatistics {
    fn sum<I: Iterator<Item = QuizStatistics>>(iter: I) -> QuizStatistics {
        iter.fold(QuizStatistics::default(), Add::add)
    }
}

pub fn aggregate<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> QuizStatistics {
    let (participant_count, correct_count) = submissions
        .into_iter()
        .fold((0u32, 0u32), |(total, correct), submission| {
            (total + 1, correct + submission.is_correct as u32)
        });

    QuizStatistics {
        participant_count,
        correct_count,
        incorrect_count: participant_count - correct_count,
    }
}

/// Global view: every quiz is re-aggregated from its own submissions and the
/// per-quiz results are summed.
pub fn aggregate_global<'a, I>(per_quiz: impl IntoIterator<Item = I>) -> QuizStatistics
where
    I: IntoIterator<Item = &'a Submission>,
{
    per_quiz
        .into_iter()
        .map(|submissions| aggregate(submissions))
        .sum()
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CongregationStanding {
    pub rank: u32,
    pub congregation: String,
    pub participants: u32,
    pub correct_answers: u32,
    /// Whole percent of correct answers.
    pub success_rate: u32,
}

pub fn congregations_count<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> usize {
    tally_congregations(submissions).len()
}

/// Ranks congregations by participants, then correct answers, then name.
/// Submissions without a congregation are not ranked.
pub fn congregation_leaderboard<'a>(
    submissions: impl IntoIterator<Item = &'a Submission>,
    limit: Option<usize>,
) -> Vec<CongregationStanding> {
    let mut tally = tally_congregations(submissions)
        .into_iter()
        .map(|(_key, tally)| tally)
        .collect::<Vec<_>>();

    tally.sort_by(|a, b| {
        b.participants
            .cmp(&a.participants)
            .then(b.correct_answers.cmp(&a.correct_answers))
            .then_with(|| a.name.cmp(&b.name))
    });

    tally
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(index, tally)| CongregationStanding {
            rank: index as u32 + 1,
            success_rate: success_rate(tally.correct_answers, tally.participants),
            congregation: tally.name,
            participants: tally.participants,
            correct_answers: tally.correct_answers,
        })
        .collect()
}

struct CongregationTally {
    name: String,
    participants: u32,
    correct_answers: u32,
}

fn tally_congregations<'a>(
    submissions: impl IntoIterator<Item = &'a Submission>,
) -> BTreeMap<String, CongregationTally> {
    let mut tally = BTreeMap::new();

    for submission in submissions {
        let name = match submission.congregation.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };

        let entry = tally
            .entry(name.to_lowercase())
            .or_insert_with(|| CongregationTally {
                name: name.into(),
                participants: 0,
                correct_answers: 0,
            });
        entry.participants += 1;
        entry.correct_answers += submission.is_correct as u32;
    }

    tally
}

fn success_rate(correct: u32, participants: u32) -> u32 {
    if participants == 0 {
        return 0;
    }
    (correct * 200 + participants) / (participants * 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerOption, QuizId};
    use chrono::{TimeZone, Utc};

    fn submission(quiz: u32, who: &str, congregation: Option<&str>, is_correct: bool) -> Submission {
        Submission {
            quiz_id: QuizId(quiz),
            participant_identity: who.into(),
            congregation: congregation.map(Into::into),
            selected_option: if is_correct { AnswerOption::B } else { AnswerOption::D },
            is_correct,
            submitted_at: Utc.ymd(2026, 10, 18).and_hms(10, 15, 0),
        }
    }

    #[test]
    fn empty_set_is_all_zero() {
        let none: [Submission; 0] = [];
        let stats = aggregate(&none);
        assert_eq!(stats, QuizStatistics::default());
        assert_eq!(stats.participant_count, 0);
    }

    #[test]
    fn counts_add_up() {
        let submissions = vec![
            submission(1, "Ama", None, true),
            submission(1, "Kofi", None, false),
            submission(1, "Esi", None, true),
            submission(1, "Yaw", None, false),
            submission(1, "Akua", None, false),
        ];
        let stats = aggregate(&submissions);
        assert_eq!(stats.participant_count, 5);
        assert_eq!(stats.correct_count, 2);
        assert_eq!(stats.incorrect_count, 3);
        assert_eq!(stats.correct_count + stats.incorrect_count, stats.participant_count);
    }

    #[test]
    fn global_view_sums_per_quiz_aggregates() {
        let first = vec![submission(1, "Ama", None, true), submission(1, "Kofi", None, false)];
        let second = vec![submission(2, "Ama", None, true)];
        let third: Vec<Submission> = Vec::new();

        let global = aggregate_global(vec![&first, &second, &third]);
        assert_eq!(global, aggregate(&first) + aggregate(&second) + aggregate(&third));
        assert_eq!(
            global,
            QuizStatistics {
                participant_count: 3,
                correct_count: 2,
                incorrect_count: 1,
            }
        );
    }

    #[test]
    fn leaderboard_orders_and_ranks() {
        let submissions = vec![
            submission(1, "a", Some("Bethel"), true),
            submission(1, "b", Some("bethel "), false),
            submission(1, "c", Some("Ebenezer"), true),
            submission(1, "d", Some("Ebenezer"), true),
            submission(1, "e", Some("Zion"), false),
            submission(1, "f", Some("Calvary"), true),
            submission(1, "g", None, true),
            submission(1, "h", Some("   "), true),
        ];

        let board = congregation_leaderboard(&submissions, None);
        let names = board.iter().map(|s| s.congregation.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Ebenezer", "Bethel", "Calvary", "Zion"]);
        assert_eq!(board.iter().map(|s| s.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        assert_eq!(board[0].success_rate, 100);
        assert_eq!(board[1].participants, 2);
        assert_eq!(board[1].correct_answers, 1);
        assert_eq!(board[1].success_rate, 50);
        assert_eq!(board[3].success_rate, 0);

        assert_eq!(congregation_leaderboard(&submissions, Some(3)).len(), 3);
        assert_eq!(congregations_count(&submissions), 4);
    }

    #[test]
    fn success_rate_rounds_to_nearest_percent() {
        assert_eq!(success_rate(1, 3), 33);
        assert_eq!(success_rate(2, 3), 67);
        assert_eq!(success_rate(1, 8), 13);
        assert_eq!(success_rate(0, 0), 0);
    }
}
