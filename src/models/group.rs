//! Group model

use serde::{Deserialize, Serialize};

/// A named set of people.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A group annotated with its member count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupWithMemberCount {
    pub name: String,
    pub slug: String,
    pub members: i64,
}

/// Input for creating a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}
