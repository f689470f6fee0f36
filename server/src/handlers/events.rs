use axum::extract::State;
use axum::response::Response;
use chrono::Utc;

use crate::auth::AuthUser;
use crate::services::events::{self, CreateEventInput, ListEventsQuery};
use crate::services::venue_suggestions::{self, VenueSuggestionInput};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{JsonBody, PathParam, QueryParams};
use crate::utils::response::{created, success};

pub async fn list_events(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListEventsQuery>,
) -> AppResult<Response> {
    let events = events::list_events(state.store.as_ref(), query, Utc::now()).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn event_detail(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    PathParam(slug): PathParam<String>,
) -> AppResult<Response> {
    let detail = events::event_detail(state.store.as_ref(), viewer.as_ref(), &slug).await?;
    Ok(success(detail, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    actor: Option<AuthUser>,
    JsonBody(input): JsonBody<CreateEventInput>,
) -> AppResult<Response> {
    let event = events::create_event(state.store.as_ref(), actor.as_ref(), input).await?;
    Ok(created(event, "Event submitted for review"))
}

pub async fn suggest_venue(
    State(state): State<AppState>,
    actor: Option<AuthUser>,
    JsonBody(input): JsonBody<VenueSuggestionInput>,
) -> AppResult<Response> {
    let suggestion =
        venue_suggestions::submit(state.store.as_ref(), actor.as_ref(), input).await?;
    Ok(created(suggestion, "Thanks! We will review this venue"))
}
