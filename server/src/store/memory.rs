use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Store;
use crate::models::ticket::DEFAULT_CURRENCY;
use crate::models::{
    order_total, Band, Event, EventFilter, EventPatch, EventStatus, EventSummary, MyTicket,
    NewEvent, NewOrder, NewUser, NewVenueSuggestion, Order, OrderLine, OrderStatus,
    OrderWithLines, SuggestionStatus, Ticket, TicketType, User, Venue, VenueSuggestion,
};
use crate::utils::error::{AppError, AppResult};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    venues: HashMap<Uuid, Venue>,
    bands: HashMap<Uuid, Band>,
    suggestions: HashMap<Uuid, VenueSuggestion>,
    orders: HashMap<Uuid, Order>,
    order_lines: Vec<OrderLine>,
    tickets: Vec<Ticket>,
}

impl Inner {
    fn lines_of(&self, order_id: Uuid) -> Vec<OrderLine> {
        let mut lines: Vec<OrderLine> = self
            .order_lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.ticket_type_id);
        lines
    }

    fn with_lines(&self, order: &Order) -> OrderWithLines {
        OrderWithLines {
            order: order.clone(),
            lines: self.lines_of(order.id),
        }
    }

    /// Units of `ticket_type_id` that `user_id` holds in live orders.
    fn held_by(&self, user_id: Uuid, ticket_type_id: Uuid) -> i64 {
        self.order_lines
            .iter()
            .filter(|line| line.ticket_type_id == ticket_type_id)
            .filter(|line| {
                self.orders
                    .get(&line.order_id)
                    .is_some_and(|o| o.user_id == user_id && o.status.holds_inventory())
            })
            .map(|line| i64::from(line.quantity))
            .sum()
    }

    fn summary(&self, event: &Event) -> EventSummary {
        let lowest_price = self
            .ticket_types
            .values()
            .filter(|t| t.event_id == event.id)
            .map(|t| t.price)
            .min();
        EventSummary {
            id: event.id,
            slug: event.slug.clone(),
            title: event.title.clone(),
            status: event.status,
            starts_at: event.starts_at,
            genre: event.genre.clone(),
            venue_name: event
                .venue_id
                .and_then(|id| self.venues.get(&id))
                .map(|v| v.name.clone()),
            band_name: event
                .band_id
                .and_then(|id| self.bands.get(&id))
                .map(|b| b.name.clone()),
            lowest_price,
        }
    }

    fn matches(&self, event: &Event, filter: &EventFilter) -> bool {
        if !event.status.is_listed() {
            return false;
        }
        if filter.starts_from.is_some_and(|from| event.starts_at < from) {
            return false;
        }
        if filter.starts_before.is_some_and(|before| event.starts_at >= before) {
            return false;
        }
        if filter.venue_id.is_some() && event.venue_id != filter.venue_id {
            return false;
        }
        if filter.band_id.is_some() && event.band_id != filter.band_id {
            return false;
        }
        if let Some(genre) = &filter.genre {
            if !event
                .genre
                .as_deref()
                .is_some_and(|g| g.eq_ignore_ascii_case(genre))
            {
                return false;
            }
        }
        if let Some(region) = &filter.region {
            let venue_region = event
                .venue_id
                .and_then(|id| self.venues.get(&id))
                .and_then(|v| v.region.as_deref());
            if !venue_region.is_some_and(|r| r.to_lowercase() == region.to_lowercase()) {
                return false;
            }
        }
        if let Some(query) = &filter.query {
            let needle = query.to_lowercase();
            let band_name = event
                .band_id
                .and_then(|id| self.bands.get(&id))
                .map(|b| b.name.to_lowercase())
                .unwrap_or_default();
            if !event.title.to_lowercase().contains(&needle) && !band_name.contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// In-process `Store`. A single lock makes every operation atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Venues and bands are operator-managed; this stands in for SQL seeds.
    pub async fn insert_venue(&self, venue: Venue) {
        self.inner.lock().await.venues.insert(venue.id, venue);
    }

    pub async fn insert_band(&self, band: Band) {
        self.inner.lock().await.bands.insert(band.id, band);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(
                "Email is already registered".to_string(),
            ));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: Some(user.password_hash),
            display_name: Some(user.name.clone()),
            name: user.name,
            role: user.role,
            oauth_provider: None,
            oauth_subject: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.events.values().any(|e| e.slug == slug))
    }

    async fn insert_event(&self, event: NewEvent) -> AppResult<(Event, Vec<TicketType>)> {
        let mut inner = self.inner.lock().await;
        if inner.events.values().any(|e| e.slug == event.slug) {
            return Err(AppError::Conflict(format!(
                "Slug '{}' is already taken",
                event.slug
            )));
        }

        let now = Utc::now();
        let created = Event {
            id: Uuid::new_v4(),
            slug: event.slug,
            title: event.title,
            summary: event.summary,
            description: event.description,
            cover_image: event.cover_image,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            genre: event.genre,
            age_limit: event.age_limit,
            ticket_note: event.ticket_note,
            status: EventStatus::Pending,
            owner_id: event.owner_id,
            venue_id: event.venue_id,
            band_id: event.band_id,
            created_at: now,
            updated_at: now,
        };

        let ticket_types: Vec<TicketType> = event
            .ticket_types
            .into_iter()
            .map(|t| TicketType {
                id: Uuid::new_v4(),
                event_id: created.id,
                name: t.name,
                description: t.description,
                price: t.price,
                currency: DEFAULT_CURRENCY.to_string(),
                quantity: t.quantity,
                remaining: t.quantity,
                per_user_limit: t.per_user_limit,
                created_at: now,
                updated_at: now,
            })
            .collect();

        for ticket_type in &ticket_types {
            inner.ticket_types.insert(ticket_type.id, ticket_type.clone());
        }
        inner.events.insert(created.id, created.clone());
        Ok((created, ticket_types))
    }

    async fn find_event(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.inner.lock().await.events.get(&id).cloned())
    }

    async fn find_event_by_slug(&self, slug: &str) -> AppResult<Option<Event>> {
        let inner = self.inner.lock().await;
        Ok(inner.events.values().find(|e| e.slug == slug).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<EventSummary>> {
        let inner = self.inner.lock().await;
        let mut events: Vec<&Event> = inner
            .events
            .values()
            .filter(|e| inner.matches(e, filter))
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events
            .into_iter()
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .map(|e| inner.summary(e))
            .collect())
    }

    async fn list_events_by_status(&self, status: EventStatus) -> AppResult<Vec<Event>> {
        let inner = self.inner.lock().await;
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    async fn list_events_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Event>> {
        let inner = self.inner.lock().await;
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(events)
    }

    async fn update_event(&self, id: Uuid, patch: &EventPatch) -> AppResult<Option<Event>> {
        let mut inner = self.inner.lock().await;
        let Some(event) = inner.events.get_mut(&id) else {
            return Ok(None);
        };
        if event.status == EventStatus::Published {
            return Ok(None);
        }
        patch.apply(event);
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }

    async fn transition_event_status(
        &self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> AppResult<Option<Event>> {
        let mut inner = self.inner.lock().await;
        match inner.events.get_mut(&id) {
            Some(event) if event.status == from => {
                event.status = to;
                event.updated_at = Utc::now();
                Ok(Some(event.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> AppResult<Vec<TicketType>> {
        let inner = self.inner.lock().await;
        let mut ticket_types: Vec<TicketType> = inner
            .ticket_types
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        ticket_types.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(ticket_types)
    }

    async fn list_venues(&self) -> AppResult<Vec<Venue>> {
        let inner = self.inner.lock().await;
        let mut venues: Vec<Venue> = inner.venues.values().cloned().collect();
        venues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(venues)
    }

    async fn find_venue(&self, id: Uuid) -> AppResult<Option<Venue>> {
        Ok(self.inner.lock().await.venues.get(&id).cloned())
    }

    async fn list_bands(&self) -> AppResult<Vec<Band>> {
        let inner = self.inner.lock().await;
        let mut bands: Vec<Band> = inner.bands.values().cloned().collect();
        bands.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bands)
    }

    async fn find_band(&self, id: Uuid) -> AppResult<Option<Band>> {
        Ok(self.inner.lock().await.bands.get(&id).cloned())
    }

    async fn insert_venue_suggestion(
        &self,
        suggestion: NewVenueSuggestion,
    ) -> AppResult<VenueSuggestion> {
        let now = Utc::now();
        let created = VenueSuggestion {
            id: Uuid::new_v4(),
            name: suggestion.name,
            address: suggestion.address,
            contact: suggestion.contact,
            naver_map_url: suggestion.naver_map_url,
            notes: suggestion.notes,
            status: SuggestionStatus::New,
            submitted_by_id: suggestion.submitted_by_id,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .suggestions
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_venue_suggestion_status(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Option<VenueSuggestion>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.suggestions.get_mut(&id).map(|suggestion| {
            suggestion.status = status;
            suggestion.reviewed_at = Some(reviewed_at);
            suggestion.updated_at = reviewed_at;
            suggestion.clone()
        }))
    }

    async fn list_venue_suggestions(
        &self,
        status: Option<SuggestionStatus>,
    ) -> AppResult<Vec<VenueSuggestion>> {
        let inner = self.inner.lock().await;
        let mut suggestions: Vec<VenueSuggestion> = inner
            .suggestions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        suggestions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(suggestions)
    }

    async fn place_order(&self, order: NewOrder) -> AppResult<OrderWithLines> {
        let mut inner = self.inner.lock().await;

        match inner.events.get(&order.event_id) {
            Some(event) if event.status.is_on_sale() => {}
            Some(_) => {
                return Err(AppError::Conflict(
                    "Tickets for this event are not on sale".to_string(),
                ))
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "Event '{}' was not found",
                    order.event_id
                )))
            }
        }

        let mut lines = order.lines.clone();
        lines.sort_by_key(|line| line.ticket_type_id);

        // Validate every line before touching inventory.
        let mut priced = Vec::with_capacity(lines.len());
        for line in &lines {
            let ticket_type = inner
                .ticket_types
                .get(&line.ticket_type_id)
                .filter(|t| t.event_id == order.event_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Ticket type '{}' does not belong to this event",
                        line.ticket_type_id
                    ))
                })?;
            if ticket_type.remaining < line.quantity {
                return Err(AppError::SoldOut(format!(
                    "Not enough tickets left for {}",
                    line.ticket_type_id
                )));
            }
            let held = inner.held_by(order.user_id, line.ticket_type_id);
            if held + i64::from(line.quantity) > i64::from(ticket_type.per_user_limit) {
                return Err(AppError::LimitExceeded(format!(
                    "At most {} '{}' tickets per person",
                    ticket_type.per_user_limit, ticket_type.name
                )));
            }
            priced.push((*line, ticket_type.price, ticket_type.currency.clone()));
        }
        let total = order_total(priced.iter().map(|(line, price, _)| (*price, line.quantity)))
            .ok_or_else(|| AppError::ValidationError("Order total is too large".to_string()))?;

        let order_id = Uuid::new_v4();
        let mut order_lines = Vec::with_capacity(priced.len());
        let mut currency = DEFAULT_CURRENCY.to_string();
        for (line, unit_price, line_currency) in priced {
            if let Some(ticket_type) = inner.ticket_types.get_mut(&line.ticket_type_id) {
                ticket_type.remaining -= line.quantity;
                ticket_type.updated_at = order.created_at;
            }
            currency = line_currency;
            order_lines.push(OrderLine {
                id: Uuid::new_v4(),
                order_id,
                ticket_type_id: line.ticket_type_id,
                quantity: line.quantity,
                unit_price,
            });
        }

        let created = Order {
            id: order_id,
            user_id: order.user_id,
            event_id: order.event_id,
            status: OrderStatus::Created,
            total_amount: total,
            currency,
            buyer_name: order.buyer_name,
            buyer_email: order.buyer_email,
            buyer_phone: order.buyer_phone,
            payment_reference: None,
            expires_at: order.expires_at,
            paid_at: None,
            confirmed_at: None,
            released_at: None,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        inner.orders.insert(order_id, created.clone());
        inner.order_lines.extend(order_lines.iter().cloned());

        Ok(OrderWithLines {
            order: created,
            lines: order_lines,
        })
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithLines>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&id).map(|order| inner.with_lines(order)))
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<OrderWithLines>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders.into_iter().map(|o| inner.with_lines(o)).collect())
    }

    async fn mark_order_paid(
        &self,
        id: Uuid,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Order>> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Created && order.expires_at > now => {
                order.status = OrderStatus::Paid;
                order.payment_reference = Some(payment_reference.to_string());
                order.paid_at = Some(now);
                order.updated_at = now;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn confirm_order(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<(Order, Vec<Ticket>)>> {
        let mut inner = self.inner.lock().await;
        let confirmed = match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Paid => {
                order.status = OrderStatus::Confirmed;
                order.confirmed_at = Some(now);
                order.updated_at = now;
                order.clone()
            }
            _ => return Ok(None),
        };

        let mut tickets = Vec::new();
        for line in inner.lines_of(id) {
            for _ in 0..line.quantity {
                tickets.push(Ticket::issue(
                    confirmed.id,
                    line.ticket_type_id,
                    confirmed.user_id,
                    now,
                ));
            }
        }
        inner.tickets.extend(tickets.iter().cloned());
        Ok(Some((confirmed, tickets)))
    }

    async fn release_order(
        &self,
        id: Uuid,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Order>> {
        if !to.is_release() {
            return Err(AppError::InternalServerError(format!(
                "{to} does not release inventory"
            )));
        }

        let mut inner = self.inner.lock().await;
        let released = match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Created => {
                order.status = to;
                order.released_at = Some(now);
                order.updated_at = now;
                order.clone()
            }
            _ => return Ok(None),
        };

        for line in inner.lines_of(id) {
            if let Some(ticket_type) = inner.ticket_types.get_mut(&line.ticket_type_id) {
                ticket_type.remaining += line.quantity;
                ticket_type.updated_at = now;
            }
        }
        Ok(Some(released))
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.lock().await;
        let mut expired: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| o.hold_elapsed(now))
            .collect();
        expired.sort_by_key(|o| o.expires_at);
        Ok(expired
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|o| o.id)
            .collect())
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<MyTicket>> {
        let inner = self.inner.lock().await;
        let mut tickets: Vec<MyTicket> = inner
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter_map(|t| {
                let ticket_type = inner.ticket_types.get(&t.ticket_type_id)?;
                let event = inner.events.get(&ticket_type.event_id)?;
                Some(MyTicket {
                    id: t.id,
                    order_id: t.order_id,
                    qr_code: t.qr_code.clone(),
                    issued_at: t.issued_at,
                    ticket_type_name: ticket_type.name.clone(),
                    event_title: event.title.clone(),
                    event_slug: event.slug.clone(),
                    starts_at: event.starts_at,
                    venue_name: event
                        .venue_id
                        .and_then(|id| inner.venues.get(&id))
                        .map(|v| v.name.clone()),
                })
            })
            .collect();
        tickets.sort_by(|a, b| {
            a.starts_at
                .cmp(&b.starts_at)
                .then_with(|| a.issued_at.cmp(&b.issued_at))
        });
        Ok(tickets)
    }
}
