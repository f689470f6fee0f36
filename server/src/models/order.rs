use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Paid,
    Confirmed,
    Cancelled,
    Expired,
}

text_enum!(OrderStatus, "order status", {
    Created => "CREATED",
    Paid => "PAID",
    Confirmed => "CONFIRMED",
    Cancelled => "CANCELLED",
    Expired => "EXPIRED",
});

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::Paid)
                | (OrderStatus::Created, OrderStatus::Cancelled)
                | (OrderStatus::Created, OrderStatus::Expired)
                | (OrderStatus::Paid, OrderStatus::Confirmed)
        )
    }

    /// Orders that still hold inventory and count against purchase limits.
    pub fn holds_inventory(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::Paid | OrderStatus::Confirmed
        )
    }

    /// Statuses reached by giving the reservation back.
    pub fn is_release(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Expired)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub payment_reference: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Largest total a `NUMERIC(14, 2)` column holds.
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Sums `unit_price * quantity` per line. `None` when the sum overflows or
/// exceeds [`MAX_ORDER_TOTAL`].
pub fn order_total<I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, (unit_price, quantity)| {
            unit_price
                .checked_mul(Decimal::from(quantity))
                .and_then(|line| total.checked_add(line))
        })
        .filter(|total| *total <= MAX_ORDER_TOTAL)
}

impl Order {
    pub fn hold_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Created && self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
}

/// A reservation request. Lines are merged per ticket type and sorted by id.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub lines: Vec<OrderLineRequest>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_state_machine() {
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Expired));
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Cancelled));

        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Expired.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Created));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_order_total_sums_lines() {
        let total = order_total([(Decimal::new(30000, 0), 2), (Decimal::new(1550, 2), 3)]);
        assert_eq!(total, Some(Decimal::new(6004650, 2)));
        assert_eq!(order_total(Vec::new()), Some(Decimal::ZERO));
    }

    #[test]
    fn test_order_total_rejects_overflow() {
        assert_eq!(order_total([(Decimal::MAX, 2)]), None);
        assert_eq!(order_total([(MAX_ORDER_TOTAL, 1), (Decimal::new(1, 2), 1)]), None);
        assert_eq!(order_total([(MAX_ORDER_TOTAL, 1)]), Some(MAX_ORDER_TOTAL));
    }

    #[test]
    fn test_order_total_limit_matches_column() {
        assert_eq!(MAX_ORDER_TOTAL.to_string(), "999999999999.99");
    }

    #[test]
    fn test_released_orders_do_not_hold_inventory() {
        assert!(OrderStatus::Created.holds_inventory());
        assert!(OrderStatus::Confirmed.holds_inventory());
        assert!(!OrderStatus::Expired.holds_inventory());
        assert!(!OrderStatus::Cancelled.holds_inventory());
    }
}
