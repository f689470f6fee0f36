use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{EventStatus, SuggestionStatus};
use crate::services::events;
use crate::services::venue_suggestions::{self, ReviewInput};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{JsonBody, PathParam, QueryParams};
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct EventQueueQuery {
    pub status: Option<EventStatus>,
}

#[derive(Debug, Deserialize)]
pub struct EventStatusInput {
    pub status: EventStatus,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQueueQuery {
    pub status: Option<SuggestionStatus>,
}

/// Defaults to the PENDING approval queue.
pub async fn list_events(
    State(state): State<AppState>,
    actor: AuthUser,
    QueryParams(query): QueryParams<EventQueueQuery>,
) -> AppResult<Response> {
    let status = query.status.unwrap_or(EventStatus::Pending);
    let events = events::list_for_review(state.store.as_ref(), &actor, status).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn set_event_status(
    State(state): State<AppState>,
    actor: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<EventStatusInput>,
) -> AppResult<Response> {
    let event = events::set_event_status(state.store.as_ref(), &actor, id, input.status).await?;
    Ok(success(event, "Event status updated"))
}

pub async fn list_venue_suggestions(
    State(state): State<AppState>,
    actor: AuthUser,
    QueryParams(query): QueryParams<SuggestionQueueQuery>,
) -> AppResult<Response> {
    let suggestions =
        venue_suggestions::list(state.store.as_ref(), &actor, query.status).await?;
    Ok(success(suggestions, "Venue suggestions retrieved"))
}

pub async fn review_venue_suggestion(
    State(state): State<AppState>,
    actor: Option<AuthUser>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<ReviewInput>,
) -> AppResult<Response> {
    let suggestion = venue_suggestions::review(
        state.store.as_ref(),
        actor.as_ref(),
        id,
        input.status,
        Utc::now(),
    )
    .await?;
    Ok(success(suggestion, "Venue suggestion updated"))
}
