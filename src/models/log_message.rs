//! LogMessage model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored message length
pub const LOG_MESSAGE_MAX_LEN: usize = 300;

/// A short timestamped message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogMessage {
    pub id: i64,
    pub message: String,
    pub log_date: DateTime<Utc>,
}

impl std::fmt::Display for LogMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' logged on {}",
            self.message,
            self.log_date.format("%A, %d %B, %Y at %X")
        )
    }
}
