//! Ticket selection, order holds and payment confirmation.
//!
//! An order reserves inventory the moment it is placed (`CREATED`) and keeps
//! it for the hold window. Payment moves it to `PAID` and ticket issue to
//! `CONFIRMED`. A buyer cancel or an elapsed hold gives the reservation back.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{
    NewOrder, Order, OrderLineRequest, OrderStatus, OrderWithLines, Ticket, TicketType,
};
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};
use crate::utils::non_blank;
use crate::utils::validate::{check_length, is_valid_email};

/// Upper bound on orders expired per sweep.
pub const SWEEP_BATCH: i64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub event_id: Uuid,
    pub lines: Vec<OrderLineRequest>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    #[serde(default)]
    pub agree_terms: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub payment_reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedOrder {
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

/// Folds duplicate ticket types together and drops zero quantities.
/// The result is sorted by ticket type id.
pub fn merge_lines(lines: &[OrderLineRequest]) -> AppResult<Vec<OrderLineRequest>> {
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in lines {
        if line.quantity < 0 {
            return Err(AppError::ValidationError(
                "Ticket quantities cannot be negative".to_string(),
            ));
        }
        let total = merged.entry(line.ticket_type_id).or_insert(0);
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            AppError::ValidationError("Ticket quantity is too large".to_string())
        })?;
    }

    let merged: Vec<OrderLineRequest> = merged
        .into_iter()
        .filter(|(_, quantity)| *quantity > 0)
        .map(|(ticket_type_id, quantity)| OrderLineRequest {
            ticket_type_id,
            quantity,
        })
        .collect();

    if merged.is_empty() {
        return Err(AppError::ValidationError(
            "Select at least one ticket".to_string(),
        ));
    }
    Ok(merged)
}

/// Rejects any line outside `0..=max_selectable` of its ticket type.
///
/// This is an early answer for the buyer; the store re-checks both bounds
/// atomically when the order is placed.
pub fn check_selection(ticket_types: &[TicketType], lines: &[OrderLineRequest]) -> AppResult<()> {
    for line in lines {
        let ticket_type = ticket_types
            .iter()
            .find(|t| t.id == line.ticket_type_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Ticket type '{}' does not belong to this event",
                    line.ticket_type_id
                ))
            })?;

        if line.quantity <= ticket_type.max_selectable() {
            continue;
        }
        if line.quantity > ticket_type.remaining {
            return Err(AppError::SoldOut(format!(
                "Only {} '{}' tickets left",
                ticket_type.remaining.max(0),
                ticket_type.name
            )));
        }
        return Err(AppError::LimitExceeded(format!(
            "At most {} '{}' tickets per person",
            ticket_type.per_user_limit, ticket_type.name
        )));
    }
    Ok(())
}

pub async fn place_order(
    store: &dyn Store,
    actor: &AuthUser,
    input: CheckoutInput,
    now: DateTime<Utc>,
    hold_window: Duration,
) -> AppResult<OrderWithLines> {
    if !input.agree_terms {
        return Err(AppError::ValidationError(
            "You must agree to the terms to continue".to_string(),
        ));
    }
    let buyer_name = input.buyer_name.trim().to_string();
    check_length("Buyer name", &buyer_name, 1, 100)?;
    let buyer_email = input.buyer_email.trim().to_string();
    if !is_valid_email(&buyer_email) {
        return Err(AppError::ValidationError(
            "Enter a valid email address".to_string(),
        ));
    }
    let lines = merge_lines(&input.lines)?;

    let event = store
        .find_event(input.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !event.status.is_on_sale() {
        return Err(AppError::Conflict(
            "Tickets for this event are not on sale".to_string(),
        ));
    }

    let ticket_types = store.list_ticket_types(event.id).await?;
    check_selection(&ticket_types, &lines)?;

    let placed = store
        .place_order(NewOrder {
            user_id: actor.id,
            event_id: event.id,
            lines,
            buyer_name,
            buyer_email,
            buyer_phone: non_blank(input.buyer_phone),
            created_at: now,
            expires_at: now + hold_window,
        })
        .await?;

    info!(
        order_id = %placed.order.id,
        event_id = %event.id,
        user_id = %actor.id,
        total = %placed.order.total_amount,
        expires_at = %placed.order.expires_at,
        "Order placed, inventory held"
    );
    Ok(placed)
}

/// Loads an order visible to `actor`: the buyer, or an admin.
pub async fn find_order_for(
    store: &dyn Store,
    actor: &AuthUser,
    order_id: Uuid,
) -> AppResult<OrderWithLines> {
    let order = store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    if order.order.user_id != actor.id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "This order belongs to another account".to_string(),
        ));
    }
    Ok(order)
}

async fn buyer_order(store: &dyn Store, actor: &AuthUser, order_id: Uuid) -> AppResult<Order> {
    let order = find_order_for(store, actor, order_id).await?.order;
    if order.user_id != actor.id {
        return Err(AppError::Forbidden(
            "Only the buyer can change this order".to_string(),
        ));
    }
    Ok(order)
}

async fn confirm(store: &dyn Store, order_id: Uuid, now: DateTime<Utc>) -> AppResult<ConfirmedOrder> {
    let (order, tickets) = store
        .confirm_order(order_id, now)
        .await?
        .ok_or_else(|| AppError::OrderState("Order is no longer awaiting confirmation".to_string()))?;

    info!(
        order_id = %order.id,
        user_id = %order.user_id,
        tickets = tickets.len(),
        "Order confirmed, tickets issued"
    );
    Ok(ConfirmedOrder { order, tickets })
}

/// Records the payment and issues tickets.
///
/// A `PAID` order is one whose confirmation did not finish; paying again
/// only completes the confirmation.
pub async fn pay_order(
    store: &dyn Store,
    actor: &AuthUser,
    order_id: Uuid,
    input: PaymentInput,
    now: DateTime<Utc>,
) -> AppResult<ConfirmedOrder> {
    let reference = input.payment_reference.trim().to_string();
    check_length("Payment reference", &reference, 1, 120)?;

    let order = buyer_order(store, actor, order_id).await?;

    match order.status {
        OrderStatus::Created if order.hold_elapsed(now) => {
            if store
                .release_order(order.id, OrderStatus::Expired, now)
                .await?
                .is_some()
            {
                info!(order_id = %order.id, "Hold elapsed before payment, order expired");
            }
            Err(AppError::HoldExpired(
                "The hold on these tickets has expired".to_string(),
            ))
        }
        OrderStatus::Created => {
            let paid = store
                .mark_order_paid(order.id, &reference, now)
                .await?
                .ok_or_else(|| {
                    AppError::OrderState("Order is no longer awaiting payment".to_string())
                })?;
            info!(order_id = %paid.id, user_id = %actor.id, "Payment recorded");

            confirm(store, paid.id, now).await
        }
        OrderStatus::Paid => confirm(store, order.id, now).await,
        OrderStatus::Expired => Err(AppError::HoldExpired(
            "The hold on these tickets has expired".to_string(),
        )),
        OrderStatus::Confirmed | OrderStatus::Cancelled => Err(AppError::OrderState(format!(
            "Order is already {}",
            order.status
        ))),
    }
}

pub async fn cancel_order(
    store: &dyn Store,
    actor: &AuthUser,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<Order> {
    let order = buyer_order(store, actor, order_id).await?;
    if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(AppError::OrderState(format!(
            "Only unpaid orders can be cancelled; this order is {}",
            order.status
        )));
    }

    let cancelled = store
        .release_order(order.id, OrderStatus::Cancelled, now)
        .await?
        .ok_or_else(|| AppError::OrderState("Order is no longer awaiting payment".to_string()))?;

    info!(order_id = %cancelled.id, user_id = %actor.id, "Order cancelled, inventory released");
    Ok(cancelled)
}

/// Expires every `CREATED` order whose hold closed at or before `now`.
/// Returns how many this call released.
pub async fn expire_due_holds(store: &dyn Store, now: DateTime<Utc>) -> AppResult<usize> {
    let due = store.find_expired_holds(now, SWEEP_BATCH).await?;
    let mut released = 0;

    for order_id in due {
        match store.release_order(order_id, OrderStatus::Expired, now).await {
            Ok(Some(_)) => {
                info!(order_id = %order_id, "Hold expired, inventory released");
                released += 1;
            }
            Ok(None) => debug!(order_id = %order_id, "Order left CREATED before the sweep"),
            Err(e) => warn!(order_id = %order_id, error = ?e, "Failed to expire order"),
        }
    }

    Ok(released)
}
