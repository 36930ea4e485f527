use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use crate::error::QuizError;
use crate::models::{identity_key, Quiz, QuizId, Submission};
use crate::phase::Phase;

/// Quiz definitions, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct QuizCatalog {
    quizzes: Arc<RwLock<BTreeMap<QuizId, Quiz>>>,
}

impl QuizCatalog {
    pub fn new<'a>(quizzes: impl Iterator<Item = &'a Quiz>) -> Result<QuizCatalog> {
        let catalog = QuizCatalog::default();
        for quiz in quizzes {
            catalog
                .create(quiz.clone())
                .map_err(|err| anyhow!("quiz {}: {}", quiz.id, err))?;
        }
        Ok(catalog)
    }

    pub fn get(&self, id: QuizId) -> Result<Quiz, QuizError> {
        let quizzes = self.quizzes.read().map_err(|_err| QuizError::Fatal)?;
        quizzes.get(&id).cloned().ok_or(QuizError::QuizNotFound)
    }

    pub fn all(&self) -> Result<Vec<Quiz>, QuizError> {
        let quizzes = self.quizzes.read().map_err(|_err| QuizError::Fatal)?;
        Ok(quizzes.values().cloned().collect())
    }

    pub fn create(&self, quiz: Quiz) -> Result<(), QuizError> {
        quiz.validate()?;

        let mut quizzes = self.quizzes.write().map_err(|_err| QuizError::Fatal)?;
        if quizzes.contains_key(&quiz.id) {
            return Err(QuizError::QuizExists);
        }
        quizzes.insert(quiz.id, quiz);
        Ok(())
    }

    /// Replaces an existing quiz. Stored submissions keep the correctness they
    /// were scored with.
    pub fn update(&self, quiz: Quiz) -> Result<(), QuizError> {
        quiz.validate()?;

        let mut quizzes = self.quizzes.write().map_err(|_err| QuizError::Fatal)?;
        match quizzes.get_mut(&quiz.id) {
            None => Err(QuizError::QuizNotFound),
            Some(existing) => {
                *existing = quiz;
                Ok(())
            }
        }
    }

    /// Closes an active quiz at `now`. Ending a quiz that already ended leaves
    /// it unchanged; an upcoming quiz fails the window check.
    pub fn end(&self, id: QuizId, now: DateTime<Utc>) -> Result<Quiz, QuizError> {
        let mut quizzes = self.quizzes.write().map_err(|_err| QuizError::Fatal)?;
        let existing = quizzes.get_mut(&id).ok_or(QuizError::QuizNotFound)?;
        if existing.phase(now) == Phase::Ended {
            return Ok(existing.clone());
        }

        let mut ended = existing.clone();
        ended.end_time = now;
        ended.validate()?;
        *existing = ended.clone();
        Ok(ended)
    }

    pub fn remove(&self, id: QuizId) -> Result<Quiz, QuizError> {
        let mut quizzes = self.quizzes.write().map_err(|_err| QuizError::Fatal)?;
        quizzes.remove(&id).ok_or(QuizError::QuizNotFound)
    }
}

/// Append handle on the CSV ledger file. Each record is encoded in memory and
/// written in one go, so a failed write never lingers in a buffer.
#[derive(Debug)]
struct LedgerFile {
    path: PathBuf,
    file: File,
}

impl LedgerFile {
    fn open(path: &Path) -> io::Result<LedgerFile> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(LedgerFile {
            path: path.to_path_buf(),
            file,
        })
    }

    fn append(&mut self, submission: &Submission) -> Result<()> {
        let mut record = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        record.serialize(submission)?;
        let record = record
            .into_inner()
            .map_err(|err| anyhow!("couldn't encode submission: {}", err.error()))?;

        let len = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(&record)
            .and_then(|()| self.file.flush());

        if let Err(err) = written {
            self.rollback(len);
            return Err(err.into());
        }
        Ok(())
    }

    /// Cuts the file back to `len` and reopens the append handle.
    fn rollback(&mut self, len: u64) {
        let truncated = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|file| file.set_len(len));
        if let Err(err) = truncated {
            error!("couldn't truncate {} to {} bytes: {}", self.path.display(), len, err);
        }

        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => self.file = file,
            Err(err) => error!("couldn't reopen {}: {}", self.path.display(), err),
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    submissions: BTreeMap<QuizId, Vec<Submission>>,
    participants: BTreeSet<(QuizId, String)>,
    file: Option<LedgerFile>,
}

impl LedgerState {
    fn insert(&mut self, submission: Submission) -> bool {
        let key = (submission.quiz_id, identity_key(&submission.participant_identity));
        if !self.participants.insert(key) {
            return false;
        }
        self.submissions
            .entry(submission.quiz_id)
            .or_default()
            .push(submission);
        true
    }
}

/// Append-only submission store. Enforces one submission per participant and
/// quiz; the uniqueness check and the append happen under the same lock.
#[derive(Clone, Debug, Default)]
pub struct SubmissionLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl SubmissionLedger {
    pub fn in_memory() -> SubmissionLedger {
        SubmissionLedger::default()
    }

    /// Opens a CSV ledger, replaying any submissions already in the file.
    pub fn open(path: impl AsRef<Path>) -> Result<SubmissionLedger> {
        let path = path.as_ref();
        let mut state = LedgerState::default();

        if path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_path(path)?;

            for record in reader.deserialize() {
                let submission: Submission = record?;
                if !state.insert(submission.clone()) {
                    warn!(
                        "skipping repeated submission by {:?} for quiz {}",
                        submission.participant_identity, submission.quiz_id
                    );
                }
            }
        }

        state.file = Some(LedgerFile::open(path)?);

        let count: usize = state.submissions.values().map(Vec::len).sum();
        info!("loaded {} submissions from {}", count, path.display());

        Ok(SubmissionLedger {
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn append(&self, submission: Submission) -> Result<(), QuizError> {
        let mut state = self.state.lock().map_err(|_err| {
            error!("submission ledger lock poisoned");
            QuizError::Fatal
        })?;

        let key = (submission.quiz_id, identity_key(&submission.participant_identity));
        if state.participants.contains(&key) {
            return Err(QuizError::DuplicateSubmission);
        }

        if let Some(file) = state.file.as_mut() {
            file.append(&submission).map_err(|err| {
                error!("couldn't write submission for quiz {}: {}", submission.quiz_id, err);
                QuizError::Fatal
            })?;
        }

        state.insert(submission);
        Ok(())
    }

    pub fn for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Submission>, QuizError> {
        let state = self.state.lock().map_err(|_err| QuizError::Fatal)?;
        Ok(state.submissions.get(&quiz_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerOption;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn submission(quiz: u32, who: &str, is_correct: bool) -> Submission {
        Submission {
            quiz_id: QuizId(quiz),
            participant_identity: who.into(),
            congregation: Some("Bethel".into()),
            selected_option: AnswerOption::B,
            is_correct,
            submitted_at: Utc.ymd(2026, 10, 18).and_hms(10, 15, 0),
        }
    }

    fn quiz(id: u32) -> Quiz {
        Quiz {
            id: QuizId(id),
            title: "Judges".into(),
            description: None,
            question: "Who defeated the Midianites with 300 men?".into(),
            option_a: "Samson".into(),
            option_b: "Gideon".into(),
            option_c: "Deborah".into(),
            option_d: "Ehud".into(),
            correct_option: AnswerOption::B,
            password: "trumpet".into(),
            start_time: Utc.ymd(2026, 10, 18).and_hms(10, 0, 0),
            end_time: Utc.ymd(2026, 10, 18).and_hms(10, 30, 0),
        }
    }

    #[test]
    fn rejects_duplicate_participants() {
        let ledger = SubmissionLedger::in_memory();
        ledger.append(submission(1, "Ama", true)).unwrap();
        assert_eq!(
            ledger.append(submission(1, " ama ", false)),
            Err(QuizError::DuplicateSubmission)
        );
        ledger.append(submission(2, "Ama", false)).unwrap();

        assert_eq!(ledger.for_quiz(QuizId(1)).unwrap().len(), 1);
        assert_eq!(ledger.for_quiz(QuizId(2)).unwrap().len(), 1);
        assert!(ledger.for_quiz(QuizId(3)).unwrap().is_empty());
    }

    #[test]
    fn replays_submissions_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("submissions.csv");

        {
            let ledger = SubmissionLedger::open(&path).unwrap();
            ledger.append(submission(1, "Ama", true)).unwrap();
            ledger.append(submission(1, "Kofi", false)).unwrap();
        }

        let ledger = SubmissionLedger::open(&path).unwrap();
        let stored = ledger.for_quiz(QuizId(1)).unwrap();
        assert_eq!(stored, vec![submission(1, "Ama", true), submission(1, "Kofi", false)]);
        assert_eq!(
            ledger.append(submission(1, "Kofi", true)),
            Err(QuizError::DuplicateSubmission)
        );
    }

    #[test]
    fn failed_write_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("submissions.csv");

        {
            let ledger = SubmissionLedger::open(&path).unwrap();
            ledger.append(submission(1, "Kofi", false)).unwrap();

            // A read-only handle makes the next write fail.
            ledger.state.lock().unwrap().file.as_mut().unwrap().file = File::open(&path).unwrap();
            assert_eq!(
                ledger.append(submission(1, "Ama", false)),
                Err(QuizError::Fatal)
            );
            assert_eq!(ledger.for_quiz(QuizId(1)).unwrap().len(), 1);

            ledger.append(submission(1, "Ama", true)).unwrap();
        }

        let ledger = SubmissionLedger::open(&path).unwrap();
        assert_eq!(
            ledger.for_quiz(QuizId(1)).unwrap(),
            vec![submission(1, "Kofi", false), submission(1, "Ama", true)]
        );
    }

    #[test]
    fn rollback_truncates_partial_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("submissions.csv");

        let ledger = SubmissionLedger::open(&path).unwrap();
        ledger.append(submission(1, "Kofi", false)).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"1,Ama,Beth")
            .unwrap();
        ledger.state.lock().unwrap().file.as_mut().unwrap().rollback(len);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);

        ledger.append(submission(1, "Ama", true)).unwrap();
        let ledger = SubmissionLedger::open(&path).unwrap();
        assert_eq!(ledger.for_quiz(QuizId(1)).unwrap().len(), 2);
    }

    #[test]
    fn ending_and_removing_quizzes() {
        let catalog = QuizCatalog::new(vec![quiz(1), quiz(2)].iter()).unwrap();
        let at = |hour, minute| Utc.ymd(2026, 10, 18).and_hms(hour, minute, 0);

        assert_eq!(catalog.end(QuizId(1), at(9, 0)).unwrap_err(), QuizError::InvalidWindow);

        let ended = catalog.end(QuizId(1), at(10, 10)).unwrap();
        assert_eq!(ended.end_time, at(10, 10));
        assert_eq!(catalog.get(QuizId(1)).unwrap().phase(at(10, 10)), Phase::Ended);

        // Already ended: the recorded end time stays put.
        assert_eq!(catalog.end(QuizId(1), at(10, 20)).unwrap().end_time, at(10, 10));

        assert_eq!(catalog.remove(QuizId(2)).unwrap().id, QuizId(2));
        assert_eq!(catalog.remove(QuizId(2)).unwrap_err(), QuizError::QuizNotFound);
        assert_eq!(catalog.end(QuizId(2), at(10, 10)).unwrap_err(), QuizError::QuizNotFound);
        assert_eq!(catalog.all().unwrap().len(), 1);
    }

    #[test]
    fn catalog_validates_windows() {
        let catalog = QuizCatalog::default();
        catalog.create(quiz(1)).unwrap();
        assert_eq!(catalog.create(quiz(1)), Err(QuizError::QuizExists));

        let mut inverted = quiz(2);
        inverted.end_time = inverted.start_time;
        assert_eq!(catalog.create(inverted.clone()), Err(QuizError::InvalidWindow));

        inverted.id = QuizId(1);
        assert_eq!(catalog.update(inverted), Err(QuizError::InvalidWindow));
        assert_eq!(catalog.update(quiz(9)), Err(QuizError::QuizNotFound));
        assert_eq!(catalog.get(QuizId(2)).unwrap_err(), QuizError::QuizNotFound);
    }

    #[test]
    fn catalog_edits_replace_definition() {
        let catalog = QuizCatalog::new(vec![quiz(1), quiz(2)].iter()).unwrap();
        let mut edited = quiz(1);
        edited.correct_option = AnswerOption::D;
        catalog.update(edited).unwrap();

        assert_eq!(catalog.get(QuizId(1)).unwrap().correct_option, AnswerOption::D);
        assert_eq!(catalog.all().unwrap().len(), 2);
    }
}
