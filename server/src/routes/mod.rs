use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{authenticate, route_gate};
use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{admin, auth, catalog, events, health, me, orders};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(health::health_check))
        // Sessions
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/session", get(auth::session))
        // Public catalogue
        .route("/events", get(events::list_events))
        .route("/events/new", post(events::create_event))
        .route("/events/:slug", get(events::event_detail))
        .route("/venues", get(catalog::list_venues))
        .route("/venues/:id", get(catalog::venue_detail))
        .route("/bands", get(catalog::list_bands))
        .route("/bands/:id", get(catalog::band_detail))
        .route("/venue-suggestions", post(events::suggest_venue))
        // Checkout
        .route("/orders", post(orders::place_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/pay", post(orders::pay_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        // Account
        .route("/me", get(me::profile))
        .route("/me/orders", get(me::my_orders))
        .route("/me/tickets", get(me::my_tickets))
        .route("/me/events", get(me::my_events))
        .route("/me/events/:id", axum::routing::patch(me::update_event))
        .route("/me/events/:id/permissions", get(me::event_permissions))
        // Moderation
        .route("/admin/events", get(admin::list_events))
        .route("/admin/events/:id/status", post(admin::set_event_status))
        .route("/admin/venue-suggestions", get(admin::list_venue_suggestions))
        .route(
            "/admin/venue-suggestions/:id/status",
            post(admin::review_venue_suggestion),
        )
        // The gate must run after `authenticate` has resolved the session.
        .layer(from_fn(route_gate))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(&config))
        .layer(create_cors_layer(&config))
        .with_state(state)
}
