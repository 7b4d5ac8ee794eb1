//! Question and Choice models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A poll question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

impl Question {
    /// Published within the last day. Future dates do not count.
    pub fn was_published_recently(&self) -> bool {
        self.was_published_recently_at(Utc::now())
    }

    pub fn was_published_recently_at(&self, now: DateTime<Utc>) -> bool {
        self.pub_date >= now - Duration::days(1) && self.pub_date <= now
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.question_text)
    }
}

/// One answer option of a question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i32,
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.choice_text)
    }
}

/// A question together with its choices
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}

impl QuestionWithChoices {
    pub fn total_votes(&self) -> i64 {
        self.choices.iter().map(|c| c.votes as i64).sum()
    }
}

/// Input for creating a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionInput {
    pub question_text: String,
    /// Defaults to now
    #[serde(default)]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(pub_date: DateTime<Utc>) -> Question {
        Question {
            id: 1,
            question_text: "What's new?".to_string(),
            pub_date,
        }
    }

    #[test]
    fn test_recent_question() {
        let now = Utc::now();
        assert!(question(now - Duration::hours(23)).was_published_recently_at(now));
        assert!(question(now).was_published_recently_at(now));
    }

    #[test]
    fn test_old_question_is_not_recent() {
        let now = Utc::now();
        let q = question(now - Duration::days(1) - Duration::seconds(1));
        assert!(!q.was_published_recently_at(now));
    }

    #[test]
    fn test_future_question_is_not_recent() {
        let now = Utc::now();
        assert!(!question(now + Duration::days(30)).was_published_recently_at(now));
    }

    #[test]
    fn test_total_votes() {
        let q = QuestionWithChoices {
            question: question(Utc::now()),
            choices: vec![
                Choice { id: 1, question_id: 1, choice_text: "a".into(), votes: 2 },
                Choice { id: 2, question_id: 1, choice_text: "b".into(), votes: 3 },
            ],
        };
        assert_eq!(q.total_votes(), 5);
    }
}
