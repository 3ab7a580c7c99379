//! QuizDeck Core Library
//!
//! Record types shared by the QuizDeck store, server and CLI.

pub mod collection;
pub mod models;

pub use collection::Collection;
pub use models::{
    AuthUser, DragAndDropQuestion, Group, GroupDoc, GroupMember, MultipleChoiceQuestion,
    ProviderInfo, ProviderUser, Quiz, QuizError, QuizKind, QuizStatus, TrueOrFalseQuestion,
    UserData, UserMetadata,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
