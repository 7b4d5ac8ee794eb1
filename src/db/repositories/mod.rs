//! Database repositories
//!
//! One repository trait plus a sqlx implementation per entity. Each
//! implementation dispatches on the pool's driver to a SQLite or MySQL
//! flavour of the query.

pub mod category;
pub mod group;
pub mod log_message;
pub mod person;
pub mod poll;
pub mod post;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use group::{GroupRepository, SqlxGroupRepository};
pub use log_message::{LogMessageRepository, SqlxLogMessageRepository};
pub use person::{PersonRepository, SqlxPersonRepository};
pub use poll::{PollRepository, SqlxPollRepository};
pub use post::{NewPost, PostRepository, SqlxPostRepository};

use chrono::{DateTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

/// Positional bind value for queries whose shape is shared between backends
#[derive(Debug, Clone)]
pub(crate) enum Bind {
    Text(String),
    Int(i64),
    Time(DateTime<Utc>),
}

pub(crate) fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[Bind],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    binds.iter().fold(query, |query, bind| match bind {
        Bind::Text(value) => query.bind(value.clone()),
        Bind::Int(value) => query.bind(*value),
        Bind::Time(value) => query.bind(*value),
    })
}

pub(crate) fn bind_mysql<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    binds: &[Bind],
) -> Query<'q, MySql, MySqlArguments> {
    binds.iter().fold(query, |query, bind| match bind {
        Bind::Text(value) => query.bind(value.clone()),
        Bind::Int(value) => query.bind(*value),
        Bind::Time(value) => query.bind(*value),
    })
}

/// `LIKE` pattern for a case-insensitive substring match.
///
/// Compare against `LOWER(column)` with `ESCAPE '!'`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '!' | '%' | '_') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Whether `err` was caused by a UNIQUE constraint failure
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern() {
        assert_eq!(contains_pattern("Django"), "%django%");
        assert_eq!(contains_pattern(""), "%%");
        assert_eq!(contains_pattern("50%_off!"), "%50!%!_off!!%");
    }
}
