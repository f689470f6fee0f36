use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "KRW";
pub const DEFAULT_PER_USER_LIMIT: i32 = 4;

/// Largest price a `NUMERIC(12, 2)` column holds.
pub const MAX_TICKET_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);
/// Prices are whole won with at most two decimal places.
pub const PRICE_SCALE: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub remaining: i32,
    pub per_user_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    /// Upper bound for a single selection: `min(per_user_limit, remaining)`.
    pub fn max_selectable(&self) -> i32 {
        self.per_user_limit.min(self.remaining).max(0)
    }

    pub fn is_sold_out(&self) -> bool {
        self.remaining <= 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketTypeView {
    #[serde(flatten)]
    pub ticket_type: TicketType,
    pub max_selectable: i32,
    pub sold_out: bool,
}

impl From<TicketType> for TicketTypeView {
    fn from(ticket_type: TicketType) -> Self {
        Self {
            max_selectable: ticket_type.max_selectable(),
            sold_out: ticket_type.is_sold_out(),
            ticket_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTicketType {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub per_user_limit: i32,
}

/// One admission issued for a confirmed order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub user_id: Uuid,
    pub qr_code: String,
    pub issued_at: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(order_id: Uuid, ticket_type_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            order_id,
            ticket_type_id,
            user_id,
            qr_code: format!("BANDSTAGE:{}:{}", order_id.simple(), id.simple()),
            issued_at: now,
        }
    }
}

/// A ticket joined with what the buyer needs to see at the door.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MyTicket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub qr_code: String,
    pub issued_at: DateTime<Utc>,
    pub ticket_type_name: String,
    pub event_title: String,
    pub event_slug: String,
    pub starts_at: DateTime<Utc>,
    pub venue_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_type(remaining: i32, per_user_limit: i32) -> TicketType {
        let now = Utc::now();
        TicketType {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "General Admission".into(),
            description: None,
            price: Decimal::new(35000, 0),
            currency: DEFAULT_CURRENCY.into(),
            quantity: 100,
            remaining,
            per_user_limit,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_max_selectable_is_bounded_by_limit_and_remaining() {
        assert_eq!(ticket_type(100, 4).max_selectable(), 4);
        assert_eq!(ticket_type(2, 4).max_selectable(), 2);
        assert_eq!(ticket_type(0, 4).max_selectable(), 0);
        assert!(ticket_type(0, 4).is_sold_out());
    }

    #[test]
    fn test_issued_qr_code_is_unique_per_ticket() {
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let a = Ticket::issue(order_id, Uuid::new_v4(), Uuid::new_v4(), now);
        let b = Ticket::issue(order_id, a.ticket_type_id, a.user_id, now);
        assert_ne!(a.qr_code, b.qr_code);
        assert!(a.qr_code.starts_with("BANDSTAGE:"));
    }
}
