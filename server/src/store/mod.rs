//! Data access for the marketplace.
//!
//! Every request handler talks to storage through [`Store`]. `PgStore` is the
//! production backend; `MemoryStore` keeps the same guarantees in process and
//! backs the test suite.
//!
//! Inventory rules both backends uphold:
//! - `place_order` is all-or-nothing. It re-checks `remaining` per line under
//!   a lock, decrements it, and writes the order and its lines, or changes
//!   nothing.
//! - `release_order` only acts on a `CREATED` order, so the reserved quantity
//!   goes back to `remaining` exactly once however many callers race on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Band, Event, EventFilter, EventPatch, EventStatus, EventSummary, MyTicket, NewEvent,
    NewOrder, NewUser, NewVenueSuggestion, Order, OrderStatus, OrderWithLines,
    SuggestionStatus, Ticket, TicketType, User, Venue, VenueSuggestion,
};
use crate::utils::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> AppResult<()>;

    // Users

    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    // Events

    async fn slug_exists(&self, slug: &str) -> AppResult<bool>;
    /// Writes the event and its ticket types in one transaction.
    /// Fails with `Conflict` when the slug is taken.
    async fn insert_event(&self, event: NewEvent) -> AppResult<(Event, Vec<TicketType>)>;
    async fn find_event(&self, id: Uuid) -> AppResult<Option<Event>>;
    async fn find_event_by_slug(&self, slug: &str) -> AppResult<Option<Event>>;
    /// Listed (APPROVED or PUBLISHED) events matching `filter`, soonest first.
    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<EventSummary>>;
    async fn list_events_by_status(&self, status: EventStatus) -> AppResult<Vec<Event>>;
    async fn list_events_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Event>>;
    async fn update_event(&self, id: Uuid, patch: &EventPatch) -> AppResult<Option<Event>>;
    /// Moves `id` from `from` to `to`; `None` if the event is no longer in `from`.
    async fn transition_event_status(
        &self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> AppResult<Option<Event>>;
    async fn list_ticket_types(&self, event_id: Uuid) -> AppResult<Vec<TicketType>>;

    // Venues and bands

    async fn list_venues(&self) -> AppResult<Vec<Venue>>;
    async fn find_venue(&self, id: Uuid) -> AppResult<Option<Venue>>;
    async fn list_bands(&self) -> AppResult<Vec<Band>>;
    async fn find_band(&self, id: Uuid) -> AppResult<Option<Band>>;

    // Venue suggestions

    async fn insert_venue_suggestion(
        &self,
        suggestion: NewVenueSuggestion,
    ) -> AppResult<VenueSuggestion>;
    async fn update_venue_suggestion_status(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Option<VenueSuggestion>>;
    async fn list_venue_suggestions(
        &self,
        status: Option<SuggestionStatus>,
    ) -> AppResult<Vec<VenueSuggestion>>;

    // Orders

    /// Reserves inventory and records a `CREATED` order.
    /// Fails with `SoldOut`, `LimitExceeded` or `NotFound` without side effects.
    async fn place_order(&self, order: NewOrder) -> AppResult<OrderWithLines>;
    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithLines>>;
    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<OrderWithLines>>;
    /// CREATED -> PAID while the hold is still open; `None` otherwise.
    async fn mark_order_paid(
        &self,
        id: Uuid,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Order>>;
    /// PAID -> CONFIRMED, issuing one ticket per unit; `None` if not PAID.
    async fn confirm_order(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<(Order, Vec<Ticket>)>>;
    /// CREATED -> `to` (CANCELLED or EXPIRED), restoring inventory.
    /// `None` if the order had already left CREATED.
    async fn release_order(
        &self,
        id: Uuid,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Order>>;
    /// Ids of CREATED orders whose hold window closed at or before `now`.
    async fn find_expired_holds(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Uuid>>;

    // Tickets

    async fn list_tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<MyTicket>>;
}
