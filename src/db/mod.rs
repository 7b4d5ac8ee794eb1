//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through configuration.
//! Repositories receive a `DynDatabasePool` and dispatch on `driver()`.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
