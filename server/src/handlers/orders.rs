use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::checkout::{self, CheckoutInput, PaymentInput};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{JsonBody, PathParam};
use crate::utils::response::{created, success};

pub async fn place_order(
    State(state): State<AppState>,
    actor: AuthUser,
    JsonBody(input): JsonBody<CheckoutInput>,
) -> AppResult<Response> {
    let order = checkout::place_order(
        state.store.as_ref(),
        &actor,
        input,
        Utc::now(),
        state.config.hold_window(),
    )
    .await?;
    Ok(created(order, "Tickets held, complete payment before the hold expires"))
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Response> {
    let order = checkout::find_order_for(state.store.as_ref(), &actor, id).await?;
    Ok(success(order, "Order retrieved"))
}

pub async fn pay_order(
    State(state): State<AppState>,
    actor: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<PaymentInput>,
) -> AppResult<Response> {
    let confirmed =
        checkout::pay_order(state.store.as_ref(), &actor, id, input, Utc::now()).await?;
    Ok(success(confirmed, "Payment confirmed, tickets issued"))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    actor: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Response> {
    let order = checkout::cancel_order(state.store.as_ref(), &actor, id, Utc::now()).await?;
    Ok(success(order, "Order cancelled"))
}
