use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::NewTicketType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Approved,
    Published,
    Closed,
    Rejected,
}

text_enum!(EventStatus, "event status", {
    Pending => "PENDING",
    Approved => "APPROVED",
    Published => "PUBLISHED",
    Closed => "CLOSED",
    Rejected => "REJECTED",
});

impl EventStatus {
    /// PENDING -> APPROVED | REJECTED, APPROVED -> PUBLISHED, PUBLISHED -> CLOSED.
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Pending, EventStatus::Approved)
                | (EventStatus::Pending, EventStatus::Rejected)
                | (EventStatus::Approved, EventStatus::Published)
                | (EventStatus::Published, EventStatus::Closed)
        )
    }

    /// Statuses shown in public listings.
    pub fn is_listed(&self) -> bool {
        matches!(self, EventStatus::Approved | EventStatus::Published)
    }

    pub fn is_on_sale(&self) -> bool {
        matches!(self, EventStatus::Published)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub genre: Option<String>,
    pub age_limit: Option<String>,
    pub ticket_note: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub owner_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub band_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated event ready to be written together with its ticket types.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub genre: Option<String>,
    pub age_limit: Option<String>,
    pub ticket_note: Option<String>,
    pub owner_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub band_id: Option<Uuid>,
    pub ticket_types: Vec<NewTicketType>,
}

/// Editable fields of an event. `None` leaves the stored value untouched.
/// For the optional text fields an empty string clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub genre: Option<String>,
    pub age_limit: Option<String>,
    pub ticket_note: Option<String>,
}

fn patch_text(field: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *field = Some(value.clone()).filter(|v| !v.is_empty());
    }
}

impl EventPatch {
    pub fn apply(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        patch_text(&mut event.summary, &self.summary);
        patch_text(&mut event.description, &self.description);
        patch_text(&mut event.cover_image, &self.cover_image);
        if let Some(starts_at) = self.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = self.ends_at {
            event.ends_at = Some(ends_at);
        }
        patch_text(&mut event.genre, &self.genre);
        patch_text(&mut event.age_limit, &self.age_limit);
        patch_text(&mut event.ticket_note, &self.ticket_note);
    }
}

/// Listing row: an event plus the names and cheapest price shown on cards.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub starts_at: DateTime<Utc>,
    pub genre: Option<String>,
    pub venue_name: Option<String>,
    pub band_name: Option<String>,
    pub lowest_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateWindow {
    Today,
    Week,
    Month,
}

impl DateWindow {
    /// Half-open `[start, end)` range, starting at midnight UTC of `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(now);
        let days = match self {
            DateWindow::Today => 1,
            DateWindow::Week => 7,
            DateWindow::Month => 30,
        };
        (start, start + Duration::days(days))
    }
}

pub const DEFAULT_LISTING_LIMIT: i64 = 20;

#[derive(Debug, Clone)]
pub struct EventFilter {
    pub starts_from: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub genre: Option<String>,
    pub query: Option<String>,
    pub venue_id: Option<Uuid>,
    pub band_id: Option<Uuid>,
    pub limit: i64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            starts_from: None,
            starts_before: None,
            region: None,
            genre: None,
            query: None,
            venue_id: None,
            band_id: None,
            limit: DEFAULT_LISTING_LIMIT,
        }
    }
}
