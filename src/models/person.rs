//! Person model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::slug::slugify;

/// Membership status of a person, stored as a two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PersonStatus {
    #[default]
    #[serde(rename = "AC")]
    Active,
    #[serde(rename = "IN")]
    Inactive,
    #[serde(rename = "PE")]
    Pending,
}

impl PersonStatus {
    pub const ALL: [PersonStatus; 3] = [Self::Active, Self::Inactive, Self::Pending];

    /// Two-letter database code
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonStatus::Active => "AC",
            PersonStatus::Inactive => "IN",
            PersonStatus::Pending => "PE",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            PersonStatus::Active => "Active",
            PersonStatus::Inactive => "Inactive",
            PersonStatus::Pending => "Pending",
        }
    }

    /// Parse a database code (`AC`, `IN`, `PE`)
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == code)
    }
}

impl std::fmt::Display for PersonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A person who can author posts and belong to groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: PersonStatus,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// URL-safe form of the full name
    pub fn slug(&self) -> String {
        slugify(&self.full_name())
    }

    pub fn is_active(&self) -> bool {
        self.status == PersonStatus::Active
    }
}

impl std::fmt::Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Compact JSON shape used by the people endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: PersonStatus,
    pub slug: String,
}

impl From<&Person> for PersonSummary {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id,
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            status: person.status,
            slug: person.slug(),
        }
    }
}

/// A person annotated with the number of posts they authored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonWithPostCount {
    #[serde(flatten)]
    pub person: Person,
    pub post_count: i64,
}

/// Row of the `polls_post_counts` view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostCount {
    pub person_id: i64,
    pub total_posts: i64,
}

/// Input for creating a person
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePersonInput {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: String,
    #[validate(length(max = 50, message = "Last name must be at most 50 characters"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub status: PersonStatus,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl CreatePersonInput {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            status: PersonStatus::default(),
            birth_date: None,
        }
    }

    pub fn with_status(mut self, status: PersonStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(first: &str, last: &str) -> Person {
        Person {
            id: 1,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: "p@example.com".to_string(),
            status: PersonStatus::Active,
            birth_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PersonStatus::default(), PersonStatus::Active);
        for status in PersonStatus::ALL {
            assert_eq!(PersonStatus::from_code(status.as_str()), Some(status));
        }
        assert_eq!(PersonStatus::from_code("ac"), None);
        assert_eq!(serde_json::to_string(&PersonStatus::Inactive).unwrap(), "\"IN\"");
    }

    #[test]
    fn test_display_and_slug() {
        let p = person("Ada", "Lovelace");
        assert_eq!(p.to_string(), "Ada Lovelace");
        assert_eq!(p.slug(), "ada-lovelace");
    }

    #[test]
    fn test_summary_shape() {
        let p = person("Nguyễn", "Tiến");
        let json = serde_json::to_value(PersonSummary::from(&p)).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["status"], "AC");
        assert_eq!(json["slug"], "nguyễn-tiến");
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
}
