use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub address_line1: Option<String>,
    pub region: Option<String>,
    pub capacity: Option<i32>,
    pub description: Option<String>,
    pub naver_map_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionStatus {
    New,
    InReview,
    Approved,
    Rejected,
}

text_enum!(SuggestionStatus, "suggestion status", {
    New => "NEW",
    InReview => "IN_REVIEW",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

/// A user-submitted venue awaiting curation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VenueSuggestion {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub naver_map_url: Option<String>,
    pub notes: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: SuggestionStatus,
    pub submitted_by_id: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVenueSuggestion {
    pub name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub naver_map_url: Option<String>,
    pub notes: Option<String>,
    pub submitted_by_id: Option<Uuid>,
}
