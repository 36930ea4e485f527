use crate::error::QuizError;
use crate::models::{AnswerOption, Quiz};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Score {
    pub selected_option: AnswerOption,
    pub is_correct: bool,
}

/// Scores `selected` against the quiz's current correct option.
///
/// Phase is not checked here; callers must have passed [`crate::gate::authorize`].
pub fn score(quiz: &Quiz, selected: &str) -> Result<Score, QuizError> {
    let selected_option: AnswerOption = selected.parse()?;

    Ok(Score {
        selected_option,
        is_correct: selected_option == quiz.correct_option,
    })
}
