use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::Store;
use crate::models::ticket::DEFAULT_CURRENCY;
use crate::models::{
    order_total, Band, Event, EventFilter, EventPatch, EventStatus, EventSummary, MyTicket, NewEvent,
    NewOrder, NewUser, NewVenueSuggestion, Order, OrderLine, OrderStatus, OrderWithLines,
    SuggestionStatus, Ticket, TicketType, User, Venue, VenueSuggestion,
};
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a lazily connecting pool so the server starts even while the
    /// database is down; `/health` reports the outage instead.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("migrations failed: {e}")))?;
        info!("Migrations run successfully");
        Ok(())
    }

    async fn lines_for(&self, order_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<OrderLine>>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = ANY($1) ORDER BY ticket_type_id",
        )
        .bind(order_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id).or_default().push(line);
        }
        Ok(by_order)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Gives each reserved unit back to its ticket type.
async fn restore_inventory(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE ticket_types t
        SET remaining = t.remaining + l.quantity,
            updated_at = NOW()
        FROM order_lines l
        WHERE l.order_id = $1 AND l.ticket_type_id = t.id
        "#,
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, display_name, role)
            VALUES ($1, $2, $3, $4, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(
                "Email is already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_event(&self, event: NewEvent) -> AppResult<(Event, Vec<TicketType>)> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, slug, title, summary, description, cover_image, starts_at, ends_at,
                genre, age_limit, ticket_note, status, owner_id, venue_id, band_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.slug)
        .bind(&event.title)
        .bind(&event.summary)
        .bind(&event.description)
        .bind(&event.cover_image)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(&event.genre)
        .bind(&event.age_limit)
        .bind(&event.ticket_note)
        .bind(EventStatus::Pending.as_str())
        .bind(event.owner_id)
        .bind(event.venue_id)
        .bind(event.band_id)
        .fetch_one(&mut *tx)
        .await;

        let created = match inserted {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Err(AppError::Conflict(format!(
                    "Slug '{}' is already taken",
                    event.slug
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut ticket_types = Vec::with_capacity(event.ticket_types.len());
        for ticket_type in &event.ticket_types {
            let row = sqlx::query_as::<_, TicketType>(
                r#"
                INSERT INTO ticket_types (
                    id, event_id, name, description, price, currency,
                    quantity, remaining, per_user_limit
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(&ticket_type.name)
            .bind(&ticket_type.description)
            .bind(ticket_type.price)
            .bind(DEFAULT_CURRENCY)
            .bind(ticket_type.quantity)
            .bind(ticket_type.per_user_limit)
            .fetch_one(&mut *tx)
            .await?;
            ticket_types.push(row);
        }

        tx.commit().await?;
        Ok((created, ticket_types))
    }

    async fn find_event(&self, id: Uuid) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn find_event_by_slug(&self, slug: &str) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<EventSummary>> {
        let events = sqlx::query_as::<_, EventSummary>(
            r#"
            SELECT e.id, e.slug, e.title, e.status, e.starts_at, e.genre,
                   v.name AS venue_name,
                   b.name AS band_name,
                   (SELECT MIN(t.price) FROM ticket_types t WHERE t.event_id = e.id)
                       AS lowest_price
            FROM events e
            LEFT JOIN venues v ON v.id = e.venue_id
            LEFT JOIN bands b ON b.id = e.band_id
            WHERE e.status IN ('PUBLISHED', 'APPROVED')
              AND ($1::timestamptz IS NULL OR e.starts_at >= $1)
              AND ($2::timestamptz IS NULL OR e.starts_at < $2)
              AND ($3::text IS NULL OR lower(v.region) = lower($3))
              AND ($4::text IS NULL OR lower(e.genre) = lower($4))
              AND ($5::text IS NULL
                   OR strpos(lower(e.title), lower($5)) > 0
                   OR strpos(lower(coalesce(b.name, '')), lower($5)) > 0)
              AND ($6::uuid IS NULL OR e.venue_id = $6)
              AND ($7::uuid IS NULL OR e.band_id = $7)
            ORDER BY e.starts_at ASC
            LIMIT $8
            "#,
        )
        .bind(filter.starts_from)
        .bind(filter.starts_before)
        .bind(&filter.region)
        .bind(&filter.genre)
        .bind(&filter.query)
        .bind(filter.venue_id)
        .bind(filter.band_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn list_events_by_status(&self, status: EventStatus) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn list_events_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE owner_id = $1 ORDER BY starts_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn update_event(&self, id: Uuid, patch: &EventPatch) -> AppResult<Option<Event>> {
        // Published events are frozen; the status guard closes the window
        // between the permission check and this write. An empty string
        // clears an optional column.
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                summary = CASE WHEN $3::TEXT IS NULL THEN summary ELSE NULLIF($3, '') END,
                description = CASE WHEN $4::TEXT IS NULL THEN description ELSE NULLIF($4, '') END,
                cover_image = CASE WHEN $5::TEXT IS NULL THEN cover_image ELSE NULLIF($5, '') END,
                starts_at = COALESCE($6, starts_at),
                ends_at = COALESCE($7, ends_at),
                genre = CASE WHEN $8::TEXT IS NULL THEN genre ELSE NULLIF($8, '') END,
                age_limit = CASE WHEN $9::TEXT IS NULL THEN age_limit ELSE NULLIF($9, '') END,
                ticket_note = CASE WHEN $10::TEXT IS NULL THEN ticket_note ELSE NULLIF($10, '') END,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'PUBLISHED'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.summary)
        .bind(&patch.description)
        .bind(&patch.cover_image)
        .bind(patch.starts_at)
        .bind(patch.ends_at)
        .bind(&patch.genre)
        .bind(&patch.age_limit)
        .bind(&patch.ticket_note)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn transition_event_status(
        &self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> AppResult<Vec<TicketType>> {
        let ticket_types = sqlx::query_as::<_, TicketType>(
            "SELECT * FROM ticket_types WHERE event_id = $1 ORDER BY price ASC, name ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ticket_types)
    }

    async fn list_venues(&self) -> AppResult<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>("SELECT * FROM venues ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(venues)
    }

    async fn find_venue(&self, id: Uuid) -> AppResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>("SELECT * FROM venues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(venue)
    }

    async fn list_bands(&self) -> AppResult<Vec<Band>> {
        let bands = sqlx::query_as::<_, Band>("SELECT * FROM bands ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(bands)
    }

    async fn find_band(&self, id: Uuid) -> AppResult<Option<Band>> {
        let band = sqlx::query_as::<_, Band>("SELECT * FROM bands WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(band)
    }

    async fn insert_venue_suggestion(
        &self,
        suggestion: NewVenueSuggestion,
    ) -> AppResult<VenueSuggestion> {
        let created = sqlx::query_as::<_, VenueSuggestion>(
            r#"
            INSERT INTO venue_suggestions (
                id, name, address, contact, naver_map_url, notes, status, submitted_by_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&suggestion.name)
        .bind(&suggestion.address)
        .bind(&suggestion.contact)
        .bind(&suggestion.naver_map_url)
        .bind(&suggestion.notes)
        .bind(SuggestionStatus::New.as_str())
        .bind(suggestion.submitted_by_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_venue_suggestion_status(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Option<VenueSuggestion>> {
        let updated = sqlx::query_as::<_, VenueSuggestion>(
            r#"
            UPDATE venue_suggestions
            SET status = $2, reviewed_at = $3, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(reviewed_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn list_venue_suggestions(
        &self,
        status: Option<SuggestionStatus>,
    ) -> AppResult<Vec<VenueSuggestion>> {
        let suggestions = sqlx::query_as::<_, VenueSuggestion>(
            r#"
            SELECT * FROM venue_suggestions
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(suggestions)
    }

    async fn place_order(&self, order: NewOrder) -> AppResult<OrderWithLines> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE keeps the event from being closed while we sell.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM events WHERE id = $1 FOR SHARE")
                .bind(order.event_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status.as_deref().map(str::parse::<EventStatus>) {
            Some(Ok(EventStatus::Published)) => {}
            Some(_) => {
                tx.rollback().await?;
                return Err(AppError::Conflict(
                    "Tickets for this event are not on sale".to_string(),
                ));
            }
            None => {
                tx.rollback().await?;
                return Err(AppError::NotFound(format!(
                    "Event '{}' was not found",
                    order.event_id
                )));
            }
        }

        let mut lines = order.lines.clone();
        lines.sort_by_key(|line| line.ticket_type_id);

        let mut priced = Vec::with_capacity(lines.len());
        let mut currency = DEFAULT_CURRENCY.to_string();
        for line in &lines {
            // Conditional decrement: the row lock it takes serializes buyers of
            // the same ticket type until commit.
            let reserved: Option<(String, Decimal, i32, String)> = sqlx::query_as(
                r#"
                UPDATE ticket_types
                SET remaining = remaining - $3, updated_at = NOW()
                WHERE id = $1 AND event_id = $2 AND remaining >= $3
                RETURNING name, price, per_user_limit, currency
                "#,
            )
            .bind(line.ticket_type_id)
            .bind(order.event_id)
            .bind(line.quantity)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((name, price, per_user_limit, line_currency)) = reserved else {
                let known: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM ticket_types WHERE id = $1 AND event_id = $2)",
                )
                .bind(line.ticket_type_id)
                .bind(order.event_id)
                .fetch_one(&mut *tx)
                .await?;
                tx.rollback().await?;
                return Err(if known {
                    AppError::SoldOut(format!(
                        "Not enough tickets left for {}",
                        line.ticket_type_id
                    ))
                } else {
                    AppError::NotFound(format!(
                        "Ticket type '{}' does not belong to this event",
                        line.ticket_type_id
                    ))
                });
            };

            let already_held: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(l.quantity), 0)::BIGINT
                FROM order_lines l
                JOIN orders o ON o.id = l.order_id
                WHERE o.user_id = $1
                  AND l.ticket_type_id = $2
                  AND o.status IN ('CREATED', 'PAID', 'CONFIRMED')
                "#,
            )
            .bind(order.user_id)
            .bind(line.ticket_type_id)
            .fetch_one(&mut *tx)
            .await?;

            if already_held + i64::from(line.quantity) > i64::from(per_user_limit) {
                tx.rollback().await?;
                return Err(AppError::LimitExceeded(format!(
                    "At most {} '{}' tickets per person",
                    per_user_limit, name
                )));
            }

            currency = line_currency;
            priced.push((*line, price));
        }

        let Some(total) = order_total(priced.iter().map(|(line, price)| (*price, line.quantity)))
        else {
            tx.rollback().await?;
            return Err(AppError::ValidationError(
                "Order total is too large".to_string(),
            ));
        };

        let created = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, user_id, event_id, status, total_amount, currency,
                buyer_name, buyer_email, buyer_phone, expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.user_id)
        .bind(order.event_id)
        .bind(OrderStatus::Created.as_str())
        .bind(total)
        .bind(&currency)
        .bind(&order.buyer_name)
        .bind(&order.buyer_email)
        .bind(&order.buyer_phone)
        .bind(order.expires_at)
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let mut order_lines = Vec::with_capacity(priced.len());
        for (line, unit_price) in priced {
            let row = sqlx::query_as::<_, OrderLine>(
                r#"
                INSERT INTO order_lines (id, order_id, ticket_type_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(line.ticket_type_id)
            .bind(line.quantity)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await?;
            order_lines.push(row);
        }

        tx.commit().await?;
        debug!(order_id = %created.id, total = %created.total_amount, "Order placed");

        Ok(OrderWithLines {
            order: created,
            lines: order_lines,
        })
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithLines>> {
        let Some(order) = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let lines = self
            .lines_for(&[order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();
        Ok(Some(OrderWithLines { order, lines }))
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<OrderWithLines>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut lines = self.lines_for(&ids).await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderWithLines {
                lines: lines.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    async fn mark_order_paid(
        &self,
        id: Uuid,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'PAID', payment_reference = $2, paid_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'CREATED' AND expires_at > $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payment_reference)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn confirm_order(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<(Order, Vec<Ticket>)>> {
        let mut tx = self.pool.begin().await?;

        let Some(order) = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'CONFIRMED', confirmed_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'PAID'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY ticket_type_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut tickets = Vec::new();
        for line in &lines {
            for _ in 0..line.quantity {
                let ticket = Ticket::issue(order.id, line.ticket_type_id, order.user_id, now);
                sqlx::query(
                    r#"
                    INSERT INTO tickets (id, order_id, ticket_type_id, user_id, qr_code, issued_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(ticket.id)
                .bind(ticket.order_id)
                .bind(ticket.ticket_type_id)
                .bind(ticket.user_id)
                .bind(&ticket.qr_code)
                .bind(ticket.issued_at)
                .execute(&mut *tx)
                .await?;
                tickets.push(ticket);
            }
        }

        tx.commit().await?;
        Ok(Some((order, tickets)))
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

        let mut tx = self.pool.begin().await?;

        let Some(order) = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $2, released_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'CREATED'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        restore_inventory(&mut tx, order.id).await?;
        tx.commit().await?;
        Ok(Some(order))
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM orders
            WHERE status = 'CREATED' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<MyTicket>> {
        let tickets = sqlx::query_as::<_, MyTicket>(
            r#"
            SELECT t.id, t.order_id, t.qr_code, t.issued_at,
                   tt.name AS ticket_type_name,
                   e.title AS event_title,
                   e.slug AS event_slug,
                   e.starts_at,
                   v.name AS venue_name
            FROM tickets t
            JOIN ticket_types tt ON tt.id = t.ticket_type_id
            JOIN events e ON e.id = tt.event_id
            LEFT JOIN venues v ON v.id = e.venue_id
            WHERE t.user_id = $1
            ORDER BY e.starts_at ASC, t.issued_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }
}
