use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::events::{self, UpdateEventInput};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{JsonBody, PathParam};
use crate::utils::response::success;

pub async fn profile(State(state): State<AppState>, actor: AuthUser) -> AppResult<Response> {
    let user = state
        .store
        .find_user_by_id(actor.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
    Ok(success(user, "Profile retrieved"))
}

pub async fn my_orders(State(state): State<AppState>, actor: AuthUser) -> AppResult<Response> {
    let orders = state.store.list_orders_for_user(actor.id).await?;
    Ok(success(orders, "Orders retrieved"))
}

pub async fn my_tickets(State(state): State<AppState>, actor: AuthUser) -> AppResult<Response> {
    let tickets = state.store.list_tickets_for_user(actor.id).await?;
    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn my_events(State(state): State<AppState>, actor: AuthUser) -> AppResult<Response> {
    let events = events::list_owned_events(state.store.as_ref(), &actor).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn event_permissions(
    State(state): State<AppState>,
    actor: Option<AuthUser>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Response> {
    let decision = events::can_edit_event(state.store.as_ref(), actor.as_ref(), id).await?;
    Ok(success(decision, "Permission checked"))
}

pub async fn update_event(
    State(state): State<AppState>,
    actor: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<UpdateEventInput>,
) -> AppResult<Response> {
    let event = events::update_event(state.store.as_ref(), &actor, id, input).await?;
    Ok(success(event, "Event updated"))
}
