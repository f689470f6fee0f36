use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Band, EventFilter, EventSummary, Venue};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::PathParam;
use crate::utils::response::success;

#[derive(Serialize)]
struct VenueDetail {
    #[serde(flatten)]
    venue: Venue,
    upcoming_events: Vec<EventSummary>,
}

#[derive(Serialize)]
struct BandDetail {
    #[serde(flatten)]
    band: Band,
    events: Vec<EventSummary>,
}

pub async fn list_venues(State(state): State<AppState>) -> AppResult<Response> {
    let venues = state.store.list_venues().await?;
    Ok(success(venues, "Venues retrieved"))
}

pub async fn venue_detail(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Response> {
    let venue = state
        .store
        .find_venue(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Venue '{id}' was not found")))?;

    let filter = EventFilter {
        venue_id: Some(id),
        starts_from: Some(Utc::now()),
        ..EventFilter::default()
    };
    let upcoming_events = state.store.list_events(&filter).await?;

    Ok(success(
        VenueDetail {
            venue,
            upcoming_events,
        },
        "Venue retrieved",
    ))
}

pub async fn list_bands(State(state): State<AppState>) -> AppResult<Response> {
    let bands = state.store.list_bands().await?;
    Ok(success(bands, "Bands retrieved"))
}

pub async fn band_detail(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Response> {
    let band = state
        .store
        .find_band(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Band '{id}' was not found")))?;

    let filter = EventFilter {
        band_id: Some(id),
        ..EventFilter::default()
    };
    let events = state.store.list_events(&filter).await?;

    Ok(success(BandDetail { band, events }, "Band retrieved"))
}
