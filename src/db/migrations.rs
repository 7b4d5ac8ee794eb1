//! Embedded schema migrations
//!
//! Every migration carries SQL for both SQLite and MySQL and is applied at
//! most once; applied versions are recorded in the `_migrations` table.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All schema migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_person",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS polls_person (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name VARCHAR(50) NOT NULL CHECK (first_name <> ''),
                last_name VARCHAR(50) NOT NULL,
                email VARCHAR(254) NOT NULL UNIQUE,
                status VARCHAR(2) NOT NULL DEFAULT 'AC' CHECK (status IN ('AC', 'IN', 'PE')),
                birth_date DATE,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS person_name_idx ON polls_person(last_name, first_name);
            CREATE INDEX IF NOT EXISTS person_status_idx ON polls_person(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS polls_person (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                first_name VARCHAR(50) NOT NULL,
                last_name VARCHAR(50) NOT NULL,
                email VARCHAR(254) NOT NULL UNIQUE,
                status VARCHAR(2) NOT NULL DEFAULT 'AC',
                birth_date DATE NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                CONSTRAINT first_name_not_blank CHECK (first_name <> ''),
                CONSTRAINT person_status_valid CHECK (status IN ('AC', 'IN', 'PE'))
            );
            CREATE INDEX person_name_idx ON polls_person(last_name, first_name);
            CREATE INDEX person_status_idx ON polls_person(status);
        "#,
    },
    Migration {
        version: 2,
        name: "create_category",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS polls_category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS polls_category (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT NOT NULL,
                created_at DATETIME(6) NOT NULL
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_post",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS polls_post (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(80) NOT NULL UNIQUE,
                content TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                category_id INTEGER,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (author_id) REFERENCES polls_person(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES polls_category(id) ON DELETE SET NULL,
                CONSTRAINT uniq_author_title UNIQUE (author_id, title)
            );
            CREATE INDEX IF NOT EXISTS post_author_created_idx ON polls_post(author_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS polls_post (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(80) NOT NULL UNIQUE,
                content TEXT NOT NULL,
                author_id BIGINT NOT NULL,
                category_id BIGINT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (author_id) REFERENCES polls_person(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES polls_category(id) ON DELETE SET NULL,
                CONSTRAINT uniq_author_title UNIQUE (author_id, title)
            );
            CREATE INDEX post_author_created_idx ON polls_post(author_id, created_at);
        "#,
    },
    Migration {
        version: 4,
        name: "create_question_and_choice",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS polls_question (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_text VARCHAR(255) NOT NULL,
                pub_date TIMESTAMP NOT NULL
            );
            CREATE TABLE IF NOT EXISTS polls_choice (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL,
                choice_text VARCHAR(255) NOT NULL,
                votes INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (question_id) REFERENCES polls_question(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS choice_question_idx ON polls_choice(question_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS polls_question (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                question_text VARCHAR(255) NOT NULL,
                pub_date DATETIME(6) NOT NULL
            );
            CREATE TABLE IF NOT EXISTS polls_choice (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                question_id BIGINT NOT NULL,
                choice_text VARCHAR(255) NOT NULL,
                votes INT NOT NULL DEFAULT 0,
                FOREIGN KEY (question_id) REFERENCES polls_question(id) ON DELETE CASCADE
            );
            CREATE INDEX choice_question_idx ON polls_choice(question_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_group",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS polls_group (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(80) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS polls_group_members (
                group_id INTEGER NOT NULL,
                person_id INTEGER NOT NULL,
                PRIMARY KEY (group_id, person_id),
                FOREIGN KEY (group_id) REFERENCES polls_group(id) ON DELETE CASCADE,
                FOREIGN KEY (person_id) REFERENCES polls_person(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS group_members_person_idx ON polls_group_members(person_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS polls_group (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(80) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS polls_group_members (
                group_id BIGINT NOT NULL,
                person_id BIGINT NOT NULL,
                PRIMARY KEY (group_id, person_id),
                FOREIGN KEY (group_id) REFERENCES polls_group(id) ON DELETE CASCADE,
                FOREIGN KEY (person_id) REFERENCES polls_person(id) ON DELETE CASCADE
            );
            CREATE INDEX group_members_person_idx ON polls_group_members(person_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_logmessage",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS polls_logmessage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message VARCHAR(300) NOT NULL,
                log_date TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS logmessage_date_idx ON polls_logmessage(log_date);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS polls_logmessage (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                message VARCHAR(300) NOT NULL,
                log_date DATETIME(6) NOT NULL
            );
            CREATE INDEX logmessage_date_idx ON polls_logmessage(log_date);
        "#,
    },
    // Raw SQL view; the same statement works on both backends apart from IF NOT EXISTS
    Migration {
        version: 7,
        name: "create_post_counts_view",
        up_sqlite: r#"
            CREATE VIEW IF NOT EXISTS polls_post_counts AS
            SELECT p.author_id AS person_id, COUNT(p.id) AS total_posts
            FROM polls_post p
            GROUP BY p.author_id;
        "#,
        up_mysql: r#"
            CREATE OR REPLACE VIEW polls_post_counts AS
            SELECT p.author_id AS person_id, COUNT(p.id) AS total_posts
            FROM polls_post p
            GROUP BY p.author_id;
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at DATETIME(6) NOT NULL
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.sqlite()?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.mysql()?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.sqlite()?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool.mysql()?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start migration")?;

    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to record migration")?;

    tx.commit().await.context("Failed to commit migration")?;
    Ok(())
}

// MySQL commits DDL implicitly, so statements run one by one without a transaction
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record migration")?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_person(pool: &SqlitePool, first: &str, email: &str, status: &str) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO polls_person (first_name, last_name, email, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(first)
        .bind("Tester")
        .bind(email)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("Failed to insert person")
        .last_insert_rowid()
    }

    async fn insert_post(pool: &SqlitePool, title: &str, slug: &str, author_id: i64) -> sqlx::Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO polls_post (title, slug, content, author_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(slug)
        .bind("body")
        .bind(author_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pending_count() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let pending = pending_count(&pool).await.expect("Failed to check");
        assert_eq!(pending, MIGRATIONS.len());

        run_migrations(&pool).await.expect("Failed to run migrations");
        let pending = pending_count(&pool).await.expect("Failed to check");
        assert_eq!(pending, 0);
    }

    #[tokio::test]
    async fn test_post_counts_view_created() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        let row = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'view' AND name = 'polls_post_counts'",
        )
        .fetch_optional(sqlite)
        .await
        .expect("Failed to query sqlite_master");
        assert!(row.is_some());

        let author = insert_person(sqlite, "A", "a@example.com", "AC").await;
        insert_post(sqlite, "One", "one", author).await.unwrap();
        insert_post(sqlite, "Two", "two", author).await.unwrap();

        let row = sqlx::query("SELECT person_id, total_posts FROM polls_post_counts")
            .fetch_one(sqlite)
            .await
            .expect("Failed to read view");
        assert_eq!(row.get::<i64, _>("person_id"), author);
        assert_eq!(row.get::<i64, _>("total_posts"), 2);
    }

    #[tokio::test]
    async fn test_person_constraints() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        insert_person(sqlite, "A", "dup@example.com", "AC").await;

        let now = Utc::now();
        let insert = |first: &'static str, email: &'static str, status: &'static str| {
            sqlx::query(
                "INSERT INTO polls_person (first_name, last_name, email, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(first)
            .bind("X")
            .bind(email)
            .bind(status)
            .bind(now)
            .bind(now)
            .execute(sqlite)
        };

        // Duplicate email
        assert!(insert("B", "dup@example.com", "AC").await.is_err());
        // Blank first name
        assert!(insert("", "blank@example.com", "AC").await.is_err());
        // Unknown status code
        assert!(insert("C", "status@example.com", "XX").await.is_err());
        assert!(insert("D", "ok@example.com", "PE").await.is_ok());
    }

    #[tokio::test]
    async fn test_post_foreign_keys_and_unique_title() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        // Unknown author
        assert!(insert_post(sqlite, "Orphan", "orphan", 999).await.is_err());

        let author = insert_person(sqlite, "A", "a@example.com", "AC").await;
        insert_post(sqlite, "Title", "title", author).await.unwrap();
        // Same author and title
        assert!(insert_post(sqlite, "Title", "title-2", author).await.is_err());
        // Same slug
        assert!(insert_post(sqlite, "Other", "title", author).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_person_cascades_to_posts() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        let author = insert_person(sqlite, "A", "a@example.com", "AC").await;
        insert_post(sqlite, "Title", "title", author).await.unwrap();

        sqlx::query("DELETE FROM polls_person WHERE id = ?")
            .bind(author)
            .execute(sqlite)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls_post")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_delete_category_sets_post_category_null() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        let author = insert_person(sqlite, "A", "a@example.com", "AC").await;
        let category = sqlx::query(
            "INSERT INTO polls_category (name, description, created_at) VALUES (?, ?, ?)",
        )
        .bind("Django")
        .bind("")
        .bind(Utc::now())
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        let post = insert_post(sqlite, "Title", "title", author).await.unwrap();
        sqlx::query("UPDATE polls_post SET category_id = ? WHERE id = ?")
            .bind(category)
            .bind(post)
            .execute(sqlite)
            .await
            .unwrap();

        sqlx::query("DELETE FROM polls_category WHERE id = ?")
            .bind(category)
            .execute(sqlite)
            .await
            .unwrap();

        let category_id: Option<i64> =
            sqlx::query_scalar("SELECT category_id FROM polls_post WHERE id = ?")
                .bind(post)
                .fetch_one(sqlite)
                .await
                .unwrap();
        assert_eq!(category_id, None);
    }

    #[test]
    fn test_get_migration() {
        assert_eq!(get_migration(1).map(|m| m.name), Some("create_person"));
        assert_eq!(
            get_migration(7).map(|m| m.name),
            Some("create_post_counts_view")
        );
        assert!(get_migration(999).is_none());
    }

    #[test]
    fn test_migration_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as i32 + 1);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);

        assert_eq!(split_sql_statements(MIGRATIONS[6].up_sqlite).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
        let long = "x".repeat(150);
        assert_eq!(truncate_sql(&long).len(), 103);
    }
}
