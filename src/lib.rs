//! Time-windowed quiz service for the youth ministry site.
//!
//! A quiz is open for submissions between its start and end time, guarded by a
//! shared password. Submissions are scored when they arrive and the correct
//! option stays hidden until the quiz has ended.

pub mod controllers;
pub mod error;
pub mod filters;
pub mod gate;
pub mod models;
pub mod phase;
pub mod presentation;
pub mod routes;
pub mod scoring;
pub mod stats;
pub mod store;

pub use controllers::QuizController;
pub use error::QuizError;
pub use phase::{resolve, Phase};
