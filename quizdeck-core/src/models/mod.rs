mod group;
mod quiz;
mod status;
mod user;

pub use group::{Group, GroupDoc, GroupMember};
pub use quiz::{
    DragAndDropQuestion, MultipleChoiceQuestion, Quiz, QuizError, QuizKind, TrueOrFalseQuestion,
};
pub use status::QuizStatus;
pub use user::{AuthUser, ProviderInfo, ProviderUser, UserData, UserMetadata};
