use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;

/// Structured rejection reported back to the caller of a quiz operation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QuizError {
    /// The supplied password does not match the quiz password.
    WrongPassword,
    /// Submission attempted outside the quiz's active window.
    NotActive,
    /// Results requested before the quiz has ended.
    NotEnded,
    /// The selected option is not one of `A`, `B`, `C` or `D`.
    InvalidOption,
    /// The participant identity is blank.
    InvalidParticipant,
    /// The quiz window does not satisfy `start_time < end_time`.
    InvalidWindow,
    /// The participant has already submitted an answer for this quiz.
    DuplicateSubmission,
    QuizNotFound,
    QuizExists,
    /// Bad admin token or participant receipt.
    Unauthorized,
    /// Admin edit whose body names a different quiz than its path.
    QuizIdMismatch,
    /// Unrecoverable storage error. Details are logged, never returned.
    Fatal,
    /// No route matches the request path.
    UnknownRoute,
    MethodNotAllowed,
    /// Request body or headers could not be parsed.
    MalformedRequest,
}

impl QuizError {
    pub fn status(&self) -> StatusCode {
        match self {
            QuizError::QuizNotFound => StatusCode::NOT_FOUND,
            QuizError::WrongPassword | QuizError::NotActive | QuizError::NotEnded => {
                StatusCode::FORBIDDEN
            }
            QuizError::InvalidOption
            | QuizError::InvalidParticipant
            | QuizError::InvalidWindow
            | QuizError::QuizIdMismatch
            | QuizError::MalformedRequest => StatusCode::BAD_REQUEST,
            QuizError::DuplicateSubmission | QuizError::QuizExists => StatusCode::CONFLICT,
            QuizError::Unauthorized => StatusCode::UNAUTHORIZED,
            QuizError::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
            QuizError::UnknownRoute => StatusCode::NOT_FOUND,
            QuizError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            QuizError::WrongPassword => "incorrect quiz password",
            QuizError::NotActive => "quiz is not accepting submissions",
            QuizError::NotEnded => "quiz results are not available yet",
            QuizError::InvalidOption => "selected option must be one of A, B, C or D",
            QuizError::InvalidParticipant => "participant identity must not be blank",
            QuizError::InvalidWindow => "quiz start time must be before its end time",
            QuizError::DuplicateSubmission => "participant has already submitted this quiz",
            QuizError::QuizNotFound => "quiz not found",
            QuizError::QuizExists => "a quiz with this id already exists",
            QuizError::Unauthorized => "unauthorized",
            QuizError::QuizIdMismatch => "quiz id in the body does not match the path",
            QuizError::Fatal => "internal error",
            QuizError::UnknownRoute => "no such endpoint",
            QuizError::MethodNotAllowed => "method not allowed",
            QuizError::MalformedRequest => "malformed request",
        };
        f.write_str(message)
    }
}

impl std::error::Error for QuizError {}

impl warp::reject::Reject for QuizError {}
