use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::QuizError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub quiz: Vec<Quiz>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct QuizId(pub u32);

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One of the four answer codes a quiz question offers.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 4] = [
        AnswerOption::A,
        AnswerOption::B,
        AnswerOption::C,
        AnswerOption::D,
    ];

    pub fn code(self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

/// Codes are matched exactly: `"b"` or `" B"` are `InvalidOption`, where the
/// old site upper-cased the answer before comparing.
impl FromStr for AnswerOption {
    type Err = QuizError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "A" => Ok(AnswerOption::A),
            "B" => Ok(AnswerOption::B),
            "C" => Ok(AnswerOption::C),
            "D" => Ok(AnswerOption::D),
            _ => Err(QuizError::InvalidOption),
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A published single-question quiz. Holds the password and the correct
/// option, so it must never be serialized towards participants directly.
#[derive(Clone, Debug, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: AnswerOption,
    pub password: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Quiz {
    /// Checks the invariants a quiz must hold before it is stored.
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.start_time < self.end_time {
            Ok(())
        } else {
            Err(QuizError::InvalidWindow)
        }
    }

    pub fn option_text(&self, option: AnswerOption) -> &str {
        match option {
            AnswerOption::A => &self.option_a,
            AnswerOption::B => &self.option_b,
            AnswerOption::C => &self.option_c,
            AnswerOption::D => &self.option_d,
        }
    }
}

/// A scored answer, frozen at submission time.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Submission {
    pub quiz_id: QuizId,
    pub participant_identity: String,
    pub congregation: Option<String>,
    pub selected_option: AnswerOption,
    pub is_correct: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Normalized key used to detect repeat submissions from one participant.
pub fn identity_key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [[quiz]]
        id = 1
        title = "Books of the Law"
        description = "Weekly quiz"
        question = "Which book follows Genesis?"
        option_a = "Leviticus"
        option_b = "Exodus"
        option_c = "Numbers"
        option_d = "Deuteronomy"
        correct_option = "B"
        password = "abc"
        start_time = "2026-10-18T10:00:00Z"
        end_time = "2026-10-18T10:30:00Z"

        [[quiz]]
        id = 2
        title = "Prophets"
        question = "Who was swallowed by a great fish?"
        option_a = "Jonah"
        option_b = "Amos"
        option_c = "Hosea"
        option_d = "Micah"
        correct_option = "A"
        password = "fish"
        start_time = "2026-10-19T10:00:00Z"
        end_time = "2026-10-19T09:00:00Z"
    "#;

    #[test]
    fn parses_quiz_catalog() {
        let config: Config = toml::de::from_str(CONFIG).unwrap();
        assert_eq!(config.quiz.len(), 2);

        let first = &config.quiz[0];
        assert_eq!(first.id, QuizId(1));
        assert_eq!(first.correct_option, AnswerOption::B);
        assert_eq!(first.option_text(AnswerOption::B), "Exodus");
        assert!(first.validate().is_ok());

        let second = &config.quiz[1];
        assert!(second.description.is_none());
        assert_eq!(second.validate(), Err(QuizError::InvalidWindow));
    }

    #[test]
    fn empty_window_is_invalid() {
        let mut config: Config = toml::de::from_str(CONFIG).unwrap();
        let mut quiz = config.quiz.remove(0);
        quiz.end_time = quiz.start_time;
        assert_eq!(quiz.validate(), Err(QuizError::InvalidWindow));
    }

    #[test]
    fn answer_codes_are_exact() {
        assert_eq!("C".parse::<AnswerOption>(), Ok(AnswerOption::C));
        assert_eq!("c".parse::<AnswerOption>(), Err(QuizError::InvalidOption));
        assert_eq!("E".parse::<AnswerOption>(), Err(QuizError::InvalidOption));
        assert_eq!("".parse::<AnswerOption>(), Err(QuizError::InvalidOption));
    }

    #[test]
    fn identity_keys_ignore_case_and_padding() {
        assert_eq!(identity_key("  Ama Mensah "), identity_key("ama mensah"));
    }
}
