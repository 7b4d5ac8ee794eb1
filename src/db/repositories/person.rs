//! Person repository
//!
//! Query helpers for people: status filters, name search, post-count
//! annotation, year filtering and the `polls_post_counts` view.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreatePersonInput, Person, PersonStatus, PersonWithPostCount, PostCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::{bind_mysql, bind_sqlite, contains_pattern, Bind};

/// Person repository trait
#[async_trait]
pub trait PersonRepository: Send + Sync {
    /// Insert a person; `created_at` and `updated_at` are set to now
    async fn create(&self, input: &CreatePersonInput) -> Result<Person>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Person>>;

    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// All people in default order (last name, first name, status)
    async fn list(&self) -> Result<Vec<Person>>;

    /// People with the given status, default order
    async fn list_by_status(&self, status: PersonStatus, limit: i64) -> Result<Vec<Person>>;

    /// Case-insensitive substring match on first or last name, ordered by last name
    async fn search(&self, term: &str, limit: i64) -> Result<Vec<Person>>;

    /// Every person annotated with their number of posts
    async fn with_post_counts(&self) -> Result<Vec<PersonWithPostCount>>;

    /// People that belong to no group, ordered by last name
    async fn without_groups(&self, limit: i64) -> Result<Vec<Person>>;

    /// People created in `[start, end)`, ordered by id
    async fn created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Person>>;

    async fn count_created_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64>;

    /// Rows of the `polls_post_counts` view
    async fn post_counts(&self) -> Result<Vec<PostCount>>;

    async fn update_status(&self, id: i64, status: PersonStatus) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based person repository
pub struct SqlxPersonRepository {
    pool: DynDatabasePool,
}

impl SqlxPersonRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PersonRepository> {
        Arc::new(Self::new(pool))
    }
}

const PERSON_COLUMNS: &str =
    "p.id, p.first_name, p.last_name, p.email, p.status, p.birth_date, p.created_at, p.updated_at";

const DEFAULT_ORDER: &str = "ORDER BY p.last_name, p.first_name, p.status";

fn select_people(tail: &str) -> String {
    format!("SELECT {} FROM polls_person p {}", PERSON_COLUMNS, tail)
}

#[async_trait]
impl PersonRepository for SqlxPersonRepository {
    async fn create(&self, input: &CreatePersonInput) -> Result<Person> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_person_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_person_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Person>> {
        let sql = select_people("WHERE p.id = ?");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get person by ID")?;
                row.as_ref().map(row_to_person_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get person by ID")?;
                row.as_ref().map(row_to_person_mysql).transpose()
            }
        }
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM polls_person WHERE LOWER(email) = LOWER(?)";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(email)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check person email")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(email)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check person email")?,
        };
        Ok(count > 0)
    }

    async fn list(&self) -> Result<Vec<Person>> {
        let sql = select_people(DEFAULT_ORDER);
        let people = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_people_sqlite(self.pool.sqlite()?, &sql, &[]).await,
            DatabaseDriver::Mysql => fetch_people_mysql(self.pool.mysql()?, &sql, &[]).await,
        };
        people.context("Failed to list people")
    }

    async fn list_by_status(&self, status: PersonStatus, limit: i64) -> Result<Vec<Person>> {
        let sql = select_people(&format!("WHERE p.status = ? {} LIMIT ?", DEFAULT_ORDER));
        let binds = [Bind::Text(status.as_str().to_string()), Bind::Int(limit)];
        let people = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_people_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_people_mysql(self.pool.mysql()?, &sql, &binds).await,
        };
        people.context("Failed to list people by status")
    }

    async fn search(&self, term: &str, limit: i64) -> Result<Vec<Person>> {
        let sql = select_people(
            "WHERE LOWER(p.first_name) LIKE ? ESCAPE '!' OR LOWER(p.last_name) LIKE ? ESCAPE '!' \
             ORDER BY p.last_name, p.id LIMIT ?",
        );
        let pattern = contains_pattern(term);
        let binds = [
            Bind::Text(pattern.clone()),
            Bind::Text(pattern),
            Bind::Int(limit),
        ];
        let people = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_people_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_people_mysql(self.pool.mysql()?, &sql, &binds).await,
        };
        people.context("Failed to search people")
    }

    async fn with_post_counts(&self) -> Result<Vec<PersonWithPostCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => with_post_counts_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => with_post_counts_mysql(self.pool.mysql()?).await,
        }
    }

    async fn without_groups(&self, limit: i64) -> Result<Vec<Person>> {
        let sql = select_people(
            "WHERE NOT EXISTS (SELECT 1 FROM polls_group_members gm WHERE gm.person_id = p.id) \
             ORDER BY p.last_name, p.id LIMIT ?",
        );
        let binds = [Bind::Int(limit)];
        let people = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_people_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_people_mysql(self.pool.mysql()?, &sql, &binds).await,
        };
        people.context("Failed to list people without groups")
    }

    async fn created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Person>> {
        let sql = select_people("WHERE p.created_at >= ? AND p.created_at < ? ORDER BY p.id LIMIT ?");
        let binds = [Bind::Time(start), Bind::Time(end), Bind::Int(limit)];
        let people = match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_people_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_people_mysql(self.pool.mysql()?, &sql, &binds).await,
        };
        people.context("Failed to list people by creation date")
    }

    async fn count_created_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM polls_person WHERE created_at >= ? AND created_at < ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(start)
                .bind(end)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count people by creation date")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(start)
                .bind(end)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count people by creation date")?,
        };
        Ok(count)
    }

    async fn post_counts(&self) -> Result<Vec<PostCount>> {
        let sql = "SELECT person_id, total_posts FROM polls_post_counts ORDER BY person_id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to read post counts view")?;
                Ok(rows
                    .iter()
                    .map(|row| PostCount {
                        person_id: row.get("person_id"),
                        total_posts: row.get("total_posts"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to read post counts view")?;
                Ok(rows
                    .iter()
                    .map(|row| PostCount {
                        person_id: row.get("person_id"),
                        total_posts: row.get("total_posts"),
                    })
                    .collect())
            }
        }
    }

    async fn update_status(&self, id: i64, status: PersonStatus) -> Result<bool> {
        let sql = "UPDATE polls_person SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update person status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update person status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM polls_person WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete person")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete person")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_person_sqlite(pool: &SqlitePool, input: &CreatePersonInput) -> Result<Person> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO polls_person (first_name, last_name, email, status, birth_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(input.status.as_str())
    .bind(input.birth_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create person")?;

    Ok(person_from_input(result.last_insert_rowid(), input, now))
}

async fn fetch_people_sqlite(pool: &SqlitePool, sql: &str, binds: &[Bind]) -> Result<Vec<Person>> {
    let rows = bind_sqlite(sqlx::query(sql), binds).fetch_all(pool).await?;
    rows.iter().map(row_to_person_sqlite).collect()
}

async fn with_post_counts_sqlite(pool: &SqlitePool) -> Result<Vec<PersonWithPostCount>> {
    let rows = sqlx::query(WITH_POST_COUNTS_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to annotate people with post counts")?;

    rows.iter()
        .map(|row| {
            Ok(PersonWithPostCount {
                person: row_to_person_sqlite(row)?,
                post_count: row.get("post_count"),
            })
        })
        .collect()
}

fn row_to_person_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Person> {
    let status: String = row.get("status");
    Ok(Person {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        status: parse_status(&status)?,
        birth_date: row.get("birth_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_person_mysql(pool: &MySqlPool, input: &CreatePersonInput) -> Result<Person> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO polls_person (first_name, last_name, email, status, birth_date, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(input.status.as_str())
    .bind(input.birth_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create person")?;

    Ok(person_from_input(result.last_insert_id() as i64, input, now))
}

async fn fetch_people_mysql(pool: &MySqlPool, sql: &str, binds: &[Bind]) -> Result<Vec<Person>> {
    let rows = bind_mysql(sqlx::query(sql), binds).fetch_all(pool).await?;
    rows.iter().map(row_to_person_mysql).collect()
}

async fn with_post_counts_mysql(pool: &MySqlPool) -> Result<Vec<PersonWithPostCount>> {
    let rows = sqlx::query(WITH_POST_COUNTS_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to annotate people with post counts")?;

    rows.iter()
        .map(|row| {
            Ok(PersonWithPostCount {
                person: row_to_person_mysql(row)?,
                post_count: row.get("post_count"),
            })
        })
        .collect()
}

fn row_to_person_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Person> {
    let status: String = row.get("status");
    Ok(Person {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        status: parse_status(&status)?,
        birth_date: row.get("birth_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// Shared helpers
// ============================================================================

const WITH_POST_COUNTS_SQL: &str = r#"
    SELECT p.id, p.first_name, p.last_name, p.email, p.status, p.birth_date,
           p.created_at, p.updated_at, COUNT(po.id) AS post_count
    FROM polls_person p
    LEFT JOIN polls_post po ON po.author_id = p.id
    GROUP BY p.id, p.first_name, p.last_name, p.email, p.status, p.birth_date,
             p.created_at, p.updated_at
    ORDER BY p.last_name, p.first_name, p.status
"#;

fn parse_status(code: &str) -> Result<PersonStatus> {
    PersonStatus::from_code(code).with_context(|| format!("Unknown person status '{}'", code))
}

fn person_from_input(id: i64, input: &CreatePersonInput, now: DateTime<Utc>) -> Person {
    Person {
        id,
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        email: input.email.clone(),
        status: input.status,
        birth_date: input.birth_date,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{NaiveDate, TimeZone};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPersonRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxPersonRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create(repo: &SqlxPersonRepository, first: &str, last: &str, status: PersonStatus) -> Person {
        let email = format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase());
        repo.create(&CreatePersonInput::new(first, last, email).with_status(status))
            .await
            .expect("Failed to create person")
    }

    #[tokio::test]
    async fn test_create_and_get_person() {
        let (_pool, repo) = setup_test_repo().await;
        let input = CreatePersonInput {
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
            ..CreatePersonInput::new("Ada", "Lovelace", "ada@example.com")
        };

        let created = repo.create(&input).await.expect("Failed to create person");
        assert!(created.id > 0);
        assert_eq!(created.status, PersonStatus::Active);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get person")
            .expect("Person not found");
        assert_eq!(found.first_name, "Ada");
        assert_eq!(found.birth_date, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(found.created_at, created.created_at);

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_by_email_is_case_insensitive() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&CreatePersonInput::new("A", "One", "a1@example.com"))
            .await
            .unwrap();

        assert!(repo.exists_by_email("A1@Example.com").await.unwrap());
        assert!(!repo.exists_by_email("b2@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_default_order() {
        let (_pool, repo) = setup_test_repo().await;
        create(&repo, "Zed", "Brown", PersonStatus::Active).await;
        create(&repo, "Amy", "Brown", PersonStatus::Active).await;
        create(&repo, "Bob", "Adams", PersonStatus::Active).await;

        let names: Vec<String> = repo.list().await.unwrap().iter().map(|p| p.full_name()).collect();
        assert_eq!(names, vec!["Bob Adams", "Amy Brown", "Zed Brown"]);
    }

    #[tokio::test]
    async fn test_list_by_status_returns_only_matching() {
        let (_pool, repo) = setup_test_repo().await;
        create(&repo, "A", "One", PersonStatus::Active).await;
        create(&repo, "B", "Two", PersonStatus::Inactive).await;
        create(&repo, "C", "Three", PersonStatus::Pending).await;

        let active = repo.list_by_status(PersonStatus::Active, 50).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active.iter().all(|p| p.status == PersonStatus::Active));

        let inactive = repo.list_by_status(PersonStatus::Inactive, 50).await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].first_name, "B");
    }

    #[tokio::test]
    async fn test_search_matches_either_name_case_insensitively() {
        let (_pool, repo) = setup_test_repo().await;
        create(&repo, "Maria", "Zeller", PersonStatus::Active).await;
        create(&repo, "John", "Marino", PersonStatus::Active).await;
        create(&repo, "Paul", "Smith", PersonStatus::Active).await;

        let found = repo.search("MAR", 50).await.unwrap();
        let last_names: Vec<&str> = found.iter().map(|p| p.last_name.as_str()).collect();
        assert_eq!(last_names, vec!["Marino", "Zeller"]);

        assert!(repo.search("xyz", 50).await.unwrap().is_empty());
        assert_eq!(repo.search("", 50).await.unwrap().len(), 3);
        assert_eq!(repo.search("", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (_pool, repo) = setup_test_repo().await;
        create(&repo, "Al", "Plain", PersonStatus::Active).await;
        create(&repo, "Per_cent", "Odd", PersonStatus::Active).await;

        assert!(repo.search("%", 50).await.unwrap().is_empty());
        let underscored = repo.search("_", 50).await.unwrap();
        assert_eq!(underscored.len(), 1);
        assert_eq!(underscored[0].first_name, "Per_cent");
    }

    #[tokio::test]
    async fn test_created_between() {
        let (pool, repo) = setup_test_repo().await;
        let old = create(&repo, "Old", "Timer", PersonStatus::Active).await;
        create(&repo, "New", "Comer", PersonStatus::Active).await;

        let in_2020 = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
        sqlx::query("UPDATE polls_person SET created_at = ? WHERE id = ?")
            .bind(in_2020)
            .bind(old.id)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();

        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let found = repo.created_between(start, end, 50).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, old.id);
        assert_eq!(repo.count_created_between(start, end).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_status_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let p = create(&repo, "A", "One", PersonStatus::Pending).await;

        assert!(repo.update_status(p.id, PersonStatus::Inactive).await.unwrap());
        let found = repo.get_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(found.status, PersonStatus::Inactive);

        assert!(repo.delete(p.id).await.unwrap());
        assert!(!repo.delete(p.id).await.unwrap());
        assert!(!repo.update_status(p.id, PersonStatus::Active).await.unwrap());
    }
}
