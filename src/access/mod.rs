//! Access layer over the document store.
//!
//! Each repository owns a clone of the [`DocumentStore`] handle. [`Backend`]
//! bundles them so the server and CLI construct everything once at startup
//! and pass it down explicitly.

mod groups;
mod quizzes;
mod users;

pub use groups::GroupRepository;
pub use quizzes::{QuizRepository, Subscription};
pub use users::UserRepository;

use thiserror::Error;

use quizdeck_core::QuizError;

use crate::db::{DocumentStore, StoreError};

/// Errors returned by the access layer.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(#[from] QuizError),

    #[error("Group not found: {0}")]
    GroupNotFound(String),
}

/// All repositories over one store.
#[derive(Clone)]
pub struct Backend {
    pub quizzes: QuizRepository,
    pub groups: GroupRepository,
    pub users: UserRepository,
}

impl Backend {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            quizzes: QuizRepository::new(store.clone()),
            groups: GroupRepository::new(store.clone()),
            users: UserRepository::new(store),
        }
    }
}
