use chrono::{DateTime, Utc};
use ring::constant_time;

use crate::error::QuizError;
use crate::models::Quiz;
use crate::phase::Phase;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    Allowed,
    Denied(QuizError),
}

impl Access {
    pub fn into_result(self) -> Result<(), QuizError> {
        match self {
            Access::Allowed => Ok(()),
            Access::Denied(reason) => Err(reason),
        }
    }
}

/// Decides whether `password` opens `quiz` for submission at `now`.
///
/// The window is checked first: outside of it the password is never compared,
/// so a correct password cannot open a quiz that is upcoming or ended.
pub fn authorize(quiz: &Quiz, password: &str, now: DateTime<Utc>) -> Access {
    if quiz.phase(now) != Phase::Active {
        return Access::Denied(QuizError::NotActive);
    }

    match constant_time::verify_slices_are_equal(quiz.password.as_bytes(), password.as_bytes()) {
        Ok(()) => Access::Allowed,
        Err(_) => Access::Denied(QuizError::WrongPassword),
    }
}

/// Constant-time comparison of an admin token against the configured one.
pub fn verify_token(expected: &str, supplied: &str) -> bool {
    constant_time::verify_slices_are_equal(expected.as_bytes(), supplied.as_bytes()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerOption, QuizId};
    use chrono::{Duration, TimeZone};

    fn quiz() -> Quiz {
        Quiz {
            id: QuizId(1),
            title: "Gospels".into(),
            description: None,
            question: "Which gospel is the shortest?".into(),
            option_a: "Matthew".into(),
            option_b: "Mark".into(),
            option_c: "Luke".into(),
            option_d: "John".into(),
            correct_option: AnswerOption::B,
            password: "abc".into(),
            start_time: Utc.ymd(2026, 10, 18).and_hms(10, 0, 0),
            end_time: Utc.ymd(2026, 10, 18).and_hms(10, 30, 0),
        }
    }

    #[test]
    fn allows_correct_password_while_active() {
        let quiz = quiz();
        let now = Utc.ymd(2026, 10, 18).and_hms(10, 15, 0);
        assert_eq!(authorize(&quiz, "abc", now), Access::Allowed);
        assert_eq!(authorize(&quiz, "abc", quiz.start_time), Access::Allowed);
    }

    #[test]
    fn password_is_case_sensitive() {
        let quiz = quiz();
        let now = Utc.ymd(2026, 10, 18).and_hms(10, 15, 0);
        assert_eq!(authorize(&quiz, "xyz", now), Access::Denied(QuizError::WrongPassword));
        assert_eq!(authorize(&quiz, "ABC", now), Access::Denied(QuizError::WrongPassword));
        assert_eq!(authorize(&quiz, "abc ", now), Access::Denied(QuizError::WrongPassword));
        assert_eq!(authorize(&quiz, "", now), Access::Denied(QuizError::WrongPassword));
    }

    #[test]
    fn never_allows_outside_the_window() {
        let quiz = quiz();
        let mut now = quiz.start_time - Duration::hours(1);
        while now < quiz.end_time + Duration::hours(1) {
            for password in &["abc", "xyz"] {
                if quiz.phase(now) != Phase::Active {
                    assert_eq!(authorize(&quiz, password, now), Access::Denied(QuizError::NotActive));
                }
            }
            now = now + Duration::minutes(1);
        }
        assert_eq!(authorize(&quiz, "abc", quiz.end_time), Access::Denied(QuizError::NotActive));
    }

    #[test]
    fn admin_tokens_compare_exactly() {
        assert!(verify_token("s3cret", "s3cret"));
        assert!(!verify_token("s3cret", "s3cre"));
        assert!(!verify_token("s3cret", "S3CRET"));
    }
}
