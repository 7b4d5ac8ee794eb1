//! Data models
//!
//! Database entities, input types and pagination containers.

mod category;
mod group;
mod log_message;
mod pagination;
mod person;
mod poll;
mod post;

pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use group::{CreateGroupInput, Group, GroupWithMemberCount};
pub use log_message::{LogMessage, LOG_MESSAGE_MAX_LEN};
pub use pagination::{ListParams, PagedResult};
pub use person::{
    CreatePersonInput, Person, PersonStatus, PersonSummary, PersonWithPostCount, PostCount,
};
pub use poll::{Choice, CreateQuestionInput, Question, QuestionWithChoices};
pub use post::{
    CreatePostInput, Post, PostAuthorEmail, UpdatePostInput, POST_SLUG_MAX_LEN, POST_TITLE_MAX_LEN,
};
