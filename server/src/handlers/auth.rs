use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::services::accounts::{self, LoginInput, SignupInput};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::JsonBody;
use crate::utils::response::{created, success};

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<SignupInput>,
) -> AppResult<Response> {
    let signed_up = accounts::signup(state.store.as_ref(), input).await?;
    Ok(created(signed_up, "Account created"))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> AppResult<Response> {
    let session = accounts::login(state.store.as_ref(), &state.jwt, input).await?;
    Ok(success(session, "Signed in"))
}

#[derive(Serialize)]
struct SessionPayload {
    session: Option<AuthUser>,
}

/// The caller's session, or `null` when anonymous.
pub async fn session(user: Option<AuthUser>) -> Response {
    success(SessionPayload { session: user }, "Session")
}
