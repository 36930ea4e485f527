use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::QuizError;
use crate::gate;
use crate::models::{identity_key, Quiz, QuizId, Submission};
use crate::phase::Phase;
use crate::presentation::{QuizResults, QuizView};
use crate::scoring;
use crate::stats::{self, CongregationStanding, QuizStatistics};
use crate::store::{QuizCatalog, SubmissionLedger};

/// Proof that a participant submitted to a quiz, handed back as a signed token.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Receipt {
    pub quiz_id: QuizId,
    pub participant_identity: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubmitRequest {
    pub quiz_id: QuizId,
    pub password: String,
    pub participant_identity: String,
    #[serde(default)]
    pub congregation: Option<String>,
    pub selected_option: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Accepted {
    pub is_correct: bool,
    pub receipt: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct GlobalStatistics {
    pub quiz_count: usize,
    pub statistics: QuizStatistics,
}

/// Owned results of one quiz, ready to serialize.
pub struct ResultsPage {
    quiz: Quiz,
    submissions: Vec<Submission>,
    participant: Option<String>,
    now: DateTime<Utc>,
}

impl ResultsPage {
    pub fn view(&self) -> Option<QuizResults<'_>> {
        QuizResults::new(&self.quiz, &self.submissions, self.participant.as_deref(), self.now)
    }
}

/// Owned quiz plus submissions; borrowed into a [`QuizView`] for replies.
pub struct QuizPage {
    quiz: Quiz,
    submissions: Vec<Submission>,
    now: DateTime<Utc>,
}

impl QuizPage {
    pub fn view(&self) -> QuizView<'_> {
        QuizView::new(&self.quiz, &self.submissions, self.now)
    }
}

#[derive(Clone, Debug)]
pub struct QuizController {
    secret_key: Arc<hmac::Key>,
    catalog: QuizCatalog,
    ledger: SubmissionLedger,
}

impl QuizController {
    pub fn new(secret_key: hmac::Key, catalog: QuizCatalog, ledger: SubmissionLedger) -> QuizController {
        QuizController {
            secret_key: Arc::new(secret_key),
            catalog,
            ledger,
        }
    }

    pub fn decode_receipt(&self, token: &str) -> Result<Receipt> {
        let mut parts = token.splitn(2, ':');
        let receipt = parts.next().ok_or_else(|| anyhow!("bad receipt token"))?;
        let receipt = base64::decode_config(receipt, base64::URL_SAFE_NO_PAD)?;

        let signature = parts.next().ok_or_else(|| anyhow!("bad receipt token"))?;
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)?;

        hmac::verify(&self.secret_key, &receipt, &signature)
            .map_err(|_err| anyhow!("invalid signature"))?;

        let receipt = bincode::deserialize(&receipt)?;
        Ok(receipt)
    }

    pub fn encode_receipt(&self, receipt: &Receipt) -> Result<String> {
        let receipt = bincode::serialize(receipt)?;

        let signature = hmac::sign(&self.secret_key, &receipt);

        let token = format!(
            "{}:{}",
            base64::encode_config(receipt, base64::URL_SAFE_NO_PAD),
            base64::encode_config(signature, base64::URL_SAFE_NO_PAD),
        );

        Ok(token)
    }

    fn page(&self, quiz: Quiz, now: DateTime<Utc>) -> Result<QuizPage, QuizError> {
        let submissions = match quiz.phase(now) {
            Phase::Ended => self.ledger.for_quiz(quiz.id)?,
            _ => Vec::new(),
        };

        Ok(QuizPage {
            quiz,
            submissions,
            now,
        })
    }

    pub fn list_quizzes(&self, now: DateTime<Utc>) -> Result<Vec<QuizPage>, QuizError> {
        self.catalog
            .all()?
            .into_iter()
            .map(|quiz| self.page(quiz, now))
            .collect()
    }

    pub fn quiz(&self, id: QuizId, now: DateTime<Utc>) -> Result<QuizPage, QuizError> {
        let quiz = self.catalog.get(id)?;
        self.page(quiz, now)
    }

    /// The active quiz closing soonest.
    pub fn active_quiz(&self, now: DateTime<Utc>) -> Result<QuizPage, QuizError> {
        let quiz = self
            .catalog
            .all()?
            .into_iter()
            .filter(|quiz| quiz.phase(now) == Phase::Active)
            .min_by_key(|quiz| (quiz.end_time, quiz.id))
            .ok_or(QuizError::QuizNotFound)?;
        self.page(quiz, now)
    }

    pub fn verify_password(&self, id: QuizId, password: &str, now: DateTime<Utc>) -> Result<(), QuizError> {
        let quiz = self.catalog.get(id)?;
        gate::authorize(&quiz, password, now).into_result()
    }

    pub async fn submit(&self, request: SubmitRequest, now: DateTime<Utc>) -> Result<Accepted, QuizError> {
        let quiz = self.catalog.get(request.quiz_id)?;

        if let Err(reason) = gate::authorize(&quiz, &request.password, now).into_result() {
            warn!("rejected submission for quiz {}: {:?}", quiz.id, reason);
            return Err(reason);
        }

        let score = scoring::score(&quiz, &request.selected_option)?;

        let participant_identity = request.participant_identity.trim().to_string();
        if participant_identity.is_empty() {
            return Err(QuizError::InvalidParticipant);
        }

        let congregation = request
            .congregation
            .map(|congregation| congregation.trim().to_string())
            .filter(|congregation| !congregation.is_empty());

        let submission = Submission {
            quiz_id: quiz.id,
            participant_identity: participant_identity.clone(),
            congregation,
            selected_option: score.selected_option,
            is_correct: score.is_correct,
            submitted_at: now,
        };

        let ledger = self.ledger.clone();
        let blocking_task = tokio::task::spawn_blocking(move || ledger.append(submission));
        blocking_task.await.map_err(|_err| QuizError::Fatal)??;

        info!("accepted submission for quiz {}", quiz.id);

        let receipt = self
            .encode_receipt(&Receipt {
                quiz_id: quiz.id,
                participant_identity,
            })
            .map_err(|_err| QuizError::Fatal)?;

        Ok(Accepted {
            is_correct: score.is_correct,
            receipt,
        })
    }

    /// Results of an ended quiz. A receipt for another quiz is ignored.
    pub fn results(
        &self,
        id: QuizId,
        receipt: Option<&Receipt>,
        now: DateTime<Utc>,
    ) -> Result<ResultsPage, QuizError> {
        let quiz = self.catalog.get(id)?;
        if quiz.phase(now) != Phase::Ended {
            return Err(QuizError::NotEnded);
        }

        let participant = receipt
            .filter(|receipt| receipt.quiz_id == id)
            .map(|receipt| identity_key(&receipt.participant_identity));

        Ok(ResultsPage {
            submissions: self.ledger.for_quiz(id)?,
            quiz,
            participant,
            now,
        })
    }

    /// Results of every ended quiz, most recently ended first.
    pub fn all_results(&self, now: DateTime<Utc>) -> Result<Vec<ResultsPage>, QuizError> {
        let mut ended = self
            .catalog
            .all()?
            .into_iter()
            .filter(|quiz| quiz.phase(now) == Phase::Ended)
            .collect::<Vec<_>>();
        ended.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(a.id.cmp(&b.id)));

        ended
            .into_iter()
            .map(|quiz| -> Result<ResultsPage, QuizError> {
                Ok(ResultsPage {
                    submissions: self.ledger.for_quiz(quiz.id)?,
                    quiz,
                    participant: None,
                    now,
                })
            })
            .collect()
    }

    /// Totals across every ended quiz. Running quizzes stay out so their
    /// counts cannot be recovered by subtraction.
    pub fn global_statistics(&self, now: DateTime<Utc>) -> Result<GlobalStatistics, QuizError> {
        let per_quiz = self
            .catalog
            .all()?
            .into_iter()
            .filter(|quiz| quiz.phase(now) == Phase::Ended)
            .map(|quiz| self.ledger.for_quiz(quiz.id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GlobalStatistics {
            quiz_count: per_quiz.len(),
            statistics: stats::aggregate_global(&per_quiz),
        })
    }

    /// Congregation standings across every ended quiz.
    pub fn congregation_leaderboard(&self, now: DateTime<Utc>) -> Result<Vec<CongregationStanding>, QuizError> {
        let mut submissions = Vec::new();
        for quiz in self.catalog.all()? {
            if quiz.phase(now) == Phase::Ended {
                submissions.extend(self.ledger.for_quiz(quiz.id)?);
            }
        }
        Ok(stats::congregation_leaderboard(&submissions, None))
    }

    pub fn create_quiz(&self, quiz: Quiz) -> Result<(), QuizError> {
        let id = quiz.id;
        self.catalog.create(quiz)?;
        info!("created quiz {}", id);
        Ok(())
    }

    pub fn update_quiz(&self, id: QuizId, quiz: Quiz) -> Result<(), QuizError> {
        if quiz.id != id {
            return Err(QuizError::QuizIdMismatch);
        }
        self.catalog.update(quiz)?;
        info!("updated quiz {}", id);
        Ok(())
    }

    /// Closes the quiz immediately; its results become visible from `now`.
    pub fn end_quiz(&self, id: QuizId, now: DateTime<Utc>) -> Result<(), QuizError> {
        let quiz = self.catalog.end(id, now)?;
        info!("quiz {} ended at {}", id, quiz.end_time);
        Ok(())
    }

    /// Drops the quiz from the catalog. Its submissions stay in the ledger.
    pub fn delete_quiz(&self, id: QuizId) -> Result<(), QuizError> {
        self.catalog.remove(id)?;
        info!("deleted quiz {}", id);
        Ok(())
    }
}
