use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AnswerOption, Quiz, QuizId, Submission};
use crate::phase::Phase;
use crate::stats::{self, CongregationStanding, QuizStatistics};

/// Number of congregations shown on a single quiz's results.
pub const RESULTS_LEADERBOARD_SIZE: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeRemaining {
    pub minutes: i64,
    pub label: String,
}

impl TimeRemaining {
    /// Time left until `end_time`, floored to whole minutes and clamped to zero.
    pub fn until(now: DateTime<Utc>, end_time: DateTime<Utc>) -> TimeRemaining {
        let minutes = (end_time - now).num_minutes().max(0);
        let label = if end_time <= now {
            "Ended".to_string()
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        };

        TimeRemaining { minutes, label }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OptionView<'a> {
    pub code: AnswerOption,
    pub text: &'a str,
}

/// Participant-facing view of a quiz.
///
/// Never carries the password. `correct_option` and `statistics` are only
/// filled in once the quiz has ended.
#[derive(Clone, Debug, Serialize)]
pub struct QuizView<'a> {
    pub id: QuizId,
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub question: &'a str,
    pub options: Vec<OptionView<'a>>,
    pub phase: Phase,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<TimeRemaining>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<AnswerOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<QuizStatistics>,
}

impl<'a> QuizView<'a> {
    pub fn new(quiz: &'a Quiz, submissions: &[Submission], now: DateTime<Utc>) -> QuizView<'a> {
        let phase = quiz.phase(now);
        let options = AnswerOption::ALL
            .iter()
            .map(|&code| OptionView {
                code,
                text: quiz.option_text(code),
            })
            .collect();

        let (time_remaining, correct_option, statistics) = match phase {
            Phase::Upcoming => (None, None, None),
            Phase::Active => (Some(TimeRemaining::until(now, quiz.end_time)), None, None),
            Phase::Ended => (
                None,
                Some(quiz.correct_option),
                Some(stats::aggregate(submissions)),
            ),
        };

        QuizView {
            id: quiz.id,
            title: &quiz.title,
            description: quiz.description.as_deref(),
            question: &quiz.question,
            options,
            phase,
            start_time: quiz.start_time,
            end_time: quiz.end_time,
            time_remaining,
            correct_option,
            statistics,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnResult {
    pub selected_option: AnswerOption,
    pub is_correct: bool,
}

/// Results of an ended quiz. Only constructible through [`QuizResults::new`],
/// which refuses quizzes that have not ended.
#[derive(Clone, Debug, Serialize)]
pub struct QuizResults<'a> {
    pub id: QuizId,
    pub quiz_title: &'a str,
    pub question: &'a str,
    pub end_time: DateTime<Utc>,
    pub correct_option: AnswerOption,
    pub correct_answer: &'a str,
    pub statistics: QuizStatistics,
    pub congregations_count: usize,
    pub congregation_leaderboard: Vec<CongregationStanding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_result: Option<OwnResult>,
}

impl<'a> QuizResults<'a> {
    /// `participant` is the identity key of the requester, when known.
    pub fn new(
        quiz: &'a Quiz,
        submissions: &[Submission],
        participant: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<QuizResults<'a>> {
        if quiz.phase(now) != Phase::Ended {
            return None;
        }

        let own_result = participant.and_then(|participant| {
            submissions
                .iter()
                .find(|submission| {
                    crate::models::identity_key(&submission.participant_identity) == participant
                })
                .map(|submission| OwnResult {
                    selected_option: submission.selected_option,
                    is_correct: submission.is_correct,
                })
        });

        Some(QuizResults {
            id: quiz.id,
            quiz_title: &quiz.title,
            question: &quiz.question,
            end_time: quiz.end_time,
            correct_option: quiz.correct_option,
            correct_answer: quiz.option_text(quiz.correct_option),
            statistics: stats::aggregate(submissions),
            congregations_count: stats::congregations_count(submissions),
            congregation_leaderboard: stats::congregation_leaderboard(
                submissions,
                Some(RESULTS_LEADERBOARD_SIZE),
            ),
            own_result,
        })
    }
}
