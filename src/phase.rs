use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Quiz;

/// Lifecycle phase of a quiz, derived from the clock on every read.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Upcoming,
    Active,
    Ended,
}

/// Resolves the phase for the half-open window `[start_time, end_time)`.
pub fn resolve(now: DateTime<Utc>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Phase {
    if now < start_time {
        Phase::Upcoming
    } else if now < end_time {
        Phase::Active
    } else {
        Phase::Ended
    }
}

impl Quiz {
    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        resolve(now, self.start_time, self.end_time)
    }
}
