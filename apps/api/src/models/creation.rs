use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of output a creation holds. Stored as text in `creations.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreationType {
    Article,
    BlogTitle,
    Image,
    ResumeReview,
}

impl CreationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationType::Article => "article",
            CreationType::BlogTitle => "blog-title",
            CreationType::Image => "image",
            CreationType::ResumeReview => "resume-review",
        }
    }
}

/// One completed action. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CreationRow {
    pub id: Uuid,
    pub user_id: String,
    pub prompt: String,
    pub content: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub publish: bool,
    pub created_at: DateTime<Utc>,
}

/// A creation about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCreation {
    pub user_id: String,
    pub prompt: String,
    pub content: String,
    pub kind: CreationType,
    pub publish: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_match_serde() {
        for kind in [
            CreationType::Article,
            CreationType::BlogTitle,
            CreationType::Image,
            CreationType::ResumeReview,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }
}
