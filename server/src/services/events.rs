use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::ticket::{DEFAULT_PER_USER_LIMIT, MAX_TICKET_PRICE, PRICE_SCALE};
use crate::models::{
    Band, DateWindow, Event, EventFilter, EventPatch, EventStatus, EventSummary, NewEvent,
    NewTicketType, TicketTypeView, Venue,
};
use crate::services::slug;
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};
use crate::utils::non_blank;
use crate::utils::validate::check_length;

/// Insert attempts before giving up on a slug that keeps losing races.
const MAX_SLUG_ATTEMPTS: usize = 5;

const TITLE_MAX: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct TicketTypeInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    /// Absent or 0 means the default limit.
    pub per_user_limit: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub genre: Option<String>,
    pub age_limit: Option<String>,
    pub ticket_note: Option<String>,
    pub venue_id: Option<Uuid>,
    pub band_id: Option<Uuid>,
    #[serde(default)]
    pub ticket_types: Vec<TicketTypeInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedEvent {
    pub slug: String,
    pub event_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventInput {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    Unauthenticated,
    NotFound,
    NotOwner,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditDecision {
    pub can_edit: bool,
    pub reason: Option<DenyReason>,
}

impl EditDecision {
    fn allow() -> Self {
        Self {
            can_edit: true,
            reason: None,
        }
    }

    fn deny(reason: DenyReason) -> Self {
        Self {
            can_edit: false,
            reason: Some(reason),
        }
    }

    fn into_result(self) -> AppResult<()> {
        match self.reason {
            None => Ok(()),
            Some(DenyReason::Unauthenticated) => {
                Err(AppError::AuthError("Sign in to edit events".to_string()))
            }
            Some(DenyReason::NotFound) => Err(AppError::NotFound("Event not found".to_string())),
            Some(DenyReason::NotOwner) => Err(AppError::Forbidden(
                "Only the event owner or an admin can edit this event".to_string(),
            )),
            Some(DenyReason::Published) => Err(AppError::Conflict(
                "Published events can no longer be edited".to_string(),
            )),
        }
    }
}

/// Checked in order: session, existence, ownership, then the publish lock.
/// The publish lock binds admins too.
pub fn edit_decision(actor: Option<&AuthUser>, event: Option<&Event>) -> EditDecision {
    let Some(actor) = actor else {
        return EditDecision::deny(DenyReason::Unauthenticated);
    };
    let Some(event) = event else {
        return EditDecision::deny(DenyReason::NotFound);
    };
    if event.owner_id != actor.id && !actor.is_admin() {
        return EditDecision::deny(DenyReason::NotOwner);
    }
    if event.status == EventStatus::Published {
        return EditDecision::deny(DenyReason::Published);
    }
    EditDecision::allow()
}

pub async fn can_edit_event(
    store: &dyn Store,
    actor: Option<&AuthUser>,
    event_id: Uuid,
) -> AppResult<EditDecision> {
    if actor.is_none() {
        return Ok(EditDecision::deny(DenyReason::Unauthenticated));
    }
    let event = store.find_event(event_id).await?;
    Ok(edit_decision(actor, event.as_ref()))
}

fn validate_ticket_type(index: usize, input: TicketTypeInput) -> AppResult<NewTicketType> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Ticket type #{} needs a name",
            index + 1
        )));
    }
    if input.price.is_sign_negative() {
        return Err(AppError::ValidationError(format!(
            "Ticket type '{name}' cannot have a negative price"
        )));
    }
    if input.price > MAX_TICKET_PRICE || input.price.normalize().scale() > PRICE_SCALE {
        return Err(AppError::ValidationError(format!(
            "Ticket type '{name}' needs a price of at most {MAX_TICKET_PRICE} with two decimal places"
        )));
    }
    if input.quantity < 1 {
        return Err(AppError::ValidationError(format!(
            "Ticket type '{name}' needs at least one ticket"
        )));
    }
    let per_user_limit = match input.per_user_limit {
        None | Some(0) => DEFAULT_PER_USER_LIMIT,
        Some(limit) if limit < 0 => {
            return Err(AppError::ValidationError(format!(
                "Ticket type '{name}' has a negative per-person limit"
            )))
        }
        Some(limit) => limit,
    };

    Ok(NewTicketType {
        name,
        description: non_blank(input.description),
        price: input.price,
        quantity: input.quantity,
        per_user_limit,
    })
}

fn check_schedule(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> AppResult<()> {
    match ends_at {
        Some(ends_at) if ends_at < starts_at => Err(AppError::ValidationError(
            "The event cannot end before it starts".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validates `input` into a `NewEvent` whose slug is still unassigned.
fn validate_new_event(owner_id: Uuid, input: CreateEventInput) -> AppResult<NewEvent> {
    let title = input.title.trim().to_string();
    check_length("Title", &title, 1, TITLE_MAX)?;
    check_schedule(input.starts_at, input.ends_at)?;

    if input.ticket_types.is_empty() {
        return Err(AppError::ValidationError(
            "Add at least one ticket type".to_string(),
        ));
    }
    let ticket_types = input
        .ticket_types
        .into_iter()
        .enumerate()
        .map(|(index, ticket_type)| validate_ticket_type(index, ticket_type))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(NewEvent {
        slug: String::new(),
        title,
        summary: non_blank(input.summary),
        description: non_blank(input.description),
        cover_image: non_blank(input.cover_image),
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        genre: non_blank(input.genre),
        age_limit: non_blank(input.age_limit),
        ticket_note: non_blank(input.ticket_note),
        owner_id,
        venue_id: input.venue_id,
        band_id: input.band_id,
        ticket_types,
    })
}

async fn first_free_slug(store: &dyn Store, base: &str) -> AppResult<String> {
    for candidate in slug::candidates(base) {
        if !store.slug_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::InternalServerError(
        "Slug candidates exhausted".to_string(),
    ))
}

/// Creates a PENDING event with its ticket types.
///
/// The slug is the first free candidate in sequence. A concurrent creation
/// can still take the same slug between the lookup and the insert; the
/// unique index rejects the loser, which tries the next free one.
pub async fn create_event(
    store: &dyn Store,
    actor: Option<&AuthUser>,
    input: CreateEventInput,
) -> AppResult<CreatedEvent> {
    let actor =
        actor.ok_or_else(|| AppError::AuthError("Sign in to create an event".to_string()))?;
    if !actor.role.can_create_events() {
        return Err(AppError::Forbidden(
            "Only artists and admins can create events".to_string(),
        ));
    }

    let mut event = validate_new_event(actor.id, input)?;

    if let Some(venue_id) = event.venue_id {
        if store.find_venue(venue_id).await?.is_none() {
            return Err(AppError::ValidationError(format!(
                "Venue '{venue_id}' does not exist"
            )));
        }
    }
    if let Some(band_id) = event.band_id {
        if store.find_band(band_id).await?.is_none() {
            return Err(AppError::ValidationError(format!(
                "Band '{band_id}' does not exist"
            )));
        }
    }

    let base = slug::slugify(&event.title);
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        event.slug = first_free_slug(store, &base).await?;

        match store.insert_event(event.clone()).await {
            Ok((created, ticket_types)) => {
                info!(
                    event_id = %created.id,
                    slug = %created.slug,
                    user_id = %actor.id,
                    ticket_types = ticket_types.len(),
                    "Event created"
                );
                return Ok(CreatedEvent {
                    slug: created.slug,
                    event_id: created.id,
                });
            }
            Err(AppError::Conflict(_)) => {
                warn!(slug = %event.slug, attempt, "Slug taken concurrently, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Conflict(
        "Could not reserve a unique URL for this event, please retry".to_string(),
    ))
}

/// Blank stays `Some("")` so the patch clears the field.
fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Applies an owner's edit. Absent fields are kept; an empty string clears
/// an optional text field.
pub async fn update_event(
    store: &dyn Store,
    actor: &AuthUser,
    event_id: Uuid,
    input: UpdateEventInput,
) -> AppResult<Event> {
    let event = store.find_event(event_id).await?;
    edit_decision(Some(actor), event.as_ref()).into_result()?;
    let Some(event) = event else {
        return Err(AppError::NotFound("Event not found".to_string()));
    };

    let title = match input.title {
        Some(title) => {
            let title = title.trim().to_string();
            check_length("Title", &title, 1, TITLE_MAX)?;
            Some(title)
        }
        None => None,
    };
    check_schedule(
        input.starts_at.unwrap_or(event.starts_at),
        input.ends_at.or(event.ends_at),
    )?;

    let patch = EventPatch {
        title,
        summary: trimmed(input.summary),
        description: trimmed(input.description),
        cover_image: trimmed(input.cover_image),
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        genre: trimmed(input.genre),
        age_limit: trimmed(input.age_limit),
        ticket_note: trimmed(input.ticket_note),
    };

    // `None` here means the event was published after the permission check.
    let updated = store.update_event(event_id, &patch).await?.ok_or_else(|| {
        AppError::Conflict("Published events can no longer be edited".to_string())
    })?;

    info!(event_id = %updated.id, user_id = %actor.id, "Event updated");
    Ok(updated)
}

/// Admin moderation along the event status machine.
pub async fn set_event_status(
    store: &dyn Store,
    actor: &AuthUser,
    event_id: Uuid,
    to: EventStatus,
) -> AppResult<Event> {
    actor.require_admin()?;

    let event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !event.status.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move an event from {} to {}",
            event.status, to
        )));
    }

    let updated = store
        .transition_event_status(event_id, event.status, to)
        .await?
        .ok_or_else(|| AppError::Conflict("Event status changed concurrently".to_string()))?;

    info!(
        event_id = %updated.id,
        from = %event.status,
        to = %updated.status,
        user_id = %actor.id,
        "Event status changed"
    );
    Ok(updated)
}

pub async fn list_for_review(
    store: &dyn Store,
    actor: &AuthUser,
    status: EventStatus,
) -> AppResult<Vec<Event>> {
    actor.require_admin()?;
    store.list_events_by_status(status).await
}

/// Query string of the public listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEventsQuery {
    pub date: Option<DateWindow>,
    pub region: Option<String>,
    pub genre: Option<String>,
    pub q: Option<String>,
}

impl ListEventsQuery {
    pub fn into_filter(self, now: DateTime<Utc>) -> EventFilter {
        let (starts_from, starts_before) = match self.date {
            Some(window) => {
                let (start, end) = window.bounds(now);
                (Some(start), Some(end))
            }
            None => (None, None),
        };

        EventFilter {
            starts_from,
            starts_before,
            region: non_blank(self.region),
            genre: non_blank(self.genre),
            query: non_blank(self.q),
            ..EventFilter::default()
        }
    }
}

pub async fn list_events(
    store: &dyn Store,
    query: ListEventsQuery,
    now: DateTime<Utc>,
) -> AppResult<Vec<EventSummary>> {
    store.list_events(&query.into_filter(now)).await
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub venue: Option<Venue>,
    pub band: Option<Band>,
    pub ticket_types: Vec<TicketTypeView>,
}

/// Public detail page. Unlisted events are only visible to their owner and admins.
pub async fn event_detail(
    store: &dyn Store,
    viewer: Option<&AuthUser>,
    slug: &str,
) -> AppResult<EventDetail> {
    let not_found = || AppError::NotFound(format!("Event '{slug}' was not found"));

    let event = store.find_event_by_slug(slug).await?.ok_or_else(not_found)?;
    let privileged = viewer.is_some_and(|v| v.is_admin() || v.id == event.owner_id);
    if !event.status.is_listed() && !privileged {
        return Err(not_found());
    }

    let venue = match event.venue_id {
        Some(id) => store.find_venue(id).await?,
        None => None,
    };
    let band = match event.band_id {
        Some(id) => store.find_band(id).await?,
        None => None,
    };
    let ticket_types = store
        .list_ticket_types(event.id)
        .await?
        .into_iter()
        .map(TicketTypeView::from)
        .collect();

    Ok(EventDetail {
        event,
        venue,
        band,
        ticket_types,
    })
}

pub async fn list_owned_events(store: &dyn Store, actor: &AuthUser) -> AppResult<Vec<Event>> {
    store.list_events_by_owner(actor.id).await
}
