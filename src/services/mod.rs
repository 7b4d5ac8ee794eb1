//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - enforcing business rules (slug assignment, name/email uniqueness)
//! - validating input and reporting typed errors
//! - caching reads where it pays off

pub mod category;
pub mod forms;
pub mod group;
pub mod log_message;
pub mod period;
pub mod person;
pub mod poll;
pub mod post;
pub mod slug;

pub use category::{CategoryService, CategoryServiceError};
pub use forms::{ContactForm, ContactMessage, ContactSubject, FormErrors, LogMessageForm, SearchForm};
pub use group::{GroupService, GroupServiceError};
pub use log_message::{LogMessageService, LogMessageServiceError};
pub use person::{PeopleByYear, PersonService, PersonServiceError};
pub use poll::{PollService, PollServiceError};
pub use post::{PostService, PostServiceError};
pub use slug::slugify;
