use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use bandstage_server::config::Config;
use bandstage_server::models::{NewUser, Role};
use bandstage_server::routes::create_routes;
use bandstage_server::state::AppState;
use bandstage_server::store::{MemoryStore, Store};

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(store, Config::from_lookup(|_| None));
        Self {
            router: create_routes(state.clone()),
            state,
        }
    }

    /// Registers a user with `role` directly and returns a bearer token.
    async fn token_for(&self, role: Role) -> String {
        let user = self
            .state
            .store
            .create_user(NewUser {
                email: format!("{}@bandstage.kr", uuid::Uuid::new_v4().simple()),
                password_hash: "unused".into(),
                name: role.as_str().to_string(),
                role,
            })
            .await
            .unwrap();
        self.state.jwt.create_token(&user).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

fn event_body(title: &str) -> Value {
    json!({
        "title": title,
        "summary": "Three bands, one night",
        "starts_at": (Utc::now() + chrono::Duration::days(10)).to_rfc3339(),
        "genre": "rock",
        "ticket_types": [
            { "name": "General Admission", "price": "35000", "quantity": 3, "per_user_limit": 2 }
        ]
    })
}

#[tokio::test]
async fn health_reports_healthy_store() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new();
    for (method, uri) in [
        (Method::GET, "/me"),
        (Method::GET, "/me/tickets"),
        (Method::POST, "/events/new"),
        (Method::GET, "/admin/venue-suggestions"),
        (Method::POST, "/orders"),
    ] {
        let (status, body) = app.send(method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"]["code"], "AUTH_ERROR");
    }

    let (status, _) = app
        .send(Method::GET, "/me", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::GET, "/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn signup_login_and_session() {
    let app = TestApp::new();
    let signup = json!({ "email": "fan@bandstage.kr", "password": "password123", "name": "Fan" });

    let (status, body) = app
        .send(Method::POST, "/auth/signup", None, Some(signup.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["data"]["user_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::POST, "/auth/signup", None, Some(signup))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "x@bandstage.kr", "password": "short", "name": "X" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "fan@bandstage.kr", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("password_hash").is_none());
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (_, body) = app.send(Method::GET, "/auth/session", Some(&token), None).await;
    assert_eq!(body["data"]["session"]["id"], user_id.as_str());
    assert_eq!(body["data"]["session"]["role"], "FAN");

    let (_, body) = app.send(Method::GET, "/auth/session", None, None).await;
    assert!(body["data"]["session"].is_null());

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "fan@bandstage.kr", "password": "password124" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn fans_cannot_create_events() {
    let app = TestApp::new();
    let fan = app.token_for(Role::Fan).await;
    let (status, body) = app
        .send(Method::POST, "/events/new", Some(&fan), Some(event_body("Indie Pulse")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn event_lifecycle_from_submission_to_tickets() {
    let app = TestApp::new();
    let artist = app.token_for(Role::Artist).await;
    let admin = app.token_for(Role::Admin).await;
    let fan = app.token_for(Role::Fan).await;

    let (status, body) = app
        .send(Method::POST, "/events/new", Some(&artist), Some(event_body("Indie Pulse!")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["slug"], "indie-pulse");
    let event_id = body["data"]["event_id"].as_str().unwrap().to_string();

    // Pending events wait in the admin queue, not in the public listing.
    let (_, body) = app.send(Method::GET, "/events", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let (_, body) = app.send(Method::GET, "/admin/events", Some(&admin), None).await;
    assert_eq!(body["data"][0]["id"], event_id.as_str());
    let (status, _) = app.send(Method::GET, "/admin/events", Some(&fan), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/me/events/{event_id}/permissions"),
            Some(&artist),
            None,
        )
        .await;
    assert_eq!(body["data"]["can_edit"], true);

    for status in ["APPROVED", "PUBLISHED"] {
        let (code, _) = app
            .send(
                Method::POST,
                &format!("/admin/events/{event_id}/status"),
                Some(&admin),
                Some(json!({ "status": status })),
            )
            .await;
        assert_eq!(code, StatusCode::OK);
    }

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/me/events/{event_id}/permissions"),
            Some(&artist),
            None,
        )
        .await;
    assert_eq!(body["data"]["can_edit"], false);
    assert_eq!(body["data"]["reason"], "PUBLISHED");

    let (_, body) = app.send(Method::GET, "/events?q=indie", None, None).await;
    assert_eq!(body["data"][0]["slug"], "indie-pulse");
    assert_eq!(body["data"][0]["lowest_price"], "35000");

    let (_, body) = app.send(Method::GET, "/events/indie-pulse", None, None).await;
    let ticket_type = &body["data"]["ticket_types"][0];
    assert_eq!(ticket_type["max_selectable"], 2);
    let ticket_type_id = ticket_type["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/orders",
            Some(&fan),
            Some(json!({
                "event_id": event_id,
                "lines": [{ "ticket_type_id": ticket_type_id, "quantity": 2 }],
                "buyer_name": "Kim Fan",
                "buyer_email": "fan@bandstage.kr",
                "agree_terms": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "CREATED");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/orders/{order_id}/pay"),
            Some(&fan),
            Some(json!({ "payment_reference": "pay_0001" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "CONFIRMED");
    assert_eq!(body["data"]["tickets"].as_array().unwrap().len(), 2);

    let (_, body) = app.send(Method::GET, "/me/tickets", Some(&fan), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["event_slug"], "indie-pulse");

    let (_, body) = app.send(Method::GET, "/events/indie-pulse", None, None).await;
    assert_eq!(body["data"]["ticket_types"][0]["remaining"], 1);
    assert_eq!(body["data"]["ticket_types"][0]["max_selectable"], 1);
}

#[tokio::test]
async fn venue_suggestions_are_reviewed_by_admins() {
    let app = TestApp::new();
    let admin = app.token_for(Role::Admin).await;
    let fan = app.token_for(Role::Fan).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/venue-suggestions",
            None,
            Some(json!({ "name": "Rolling Hall", "address": "", "naver_map_url": "https://naver.me/abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "NEW");
    assert!(body["data"]["address"].is_null());
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            Method::POST,
            "/venue-suggestions",
            None,
            Some(json!({ "name": "Rolling Hall", "naver_map_url": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/admin/venue-suggestions/{id}/status");
    let (status, _) = app
        .send(Method::POST, &uri, Some(&fan), Some(json!({ "status": "APPROVED" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, &uri, Some(&admin), Some(json!({ "status": "IN_REVIEW" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IN_REVIEW");
    assert!(!body["data"]["reviewed_at"].is_null());

    let (_, body) = app
        .send(
            Method::GET,
            "/admin/venue-suggestions?status=IN_REVIEW",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_ids_use_the_error_envelope() {
    let app = TestApp::new();
    let fan = app.token_for(Role::Fan).await;
    let (status, body) = app
        .send(Method::GET, "/orders/not-a-uuid", Some(&fan), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn event_titled_like_a_route_segment_stays_reachable() {
    let app = TestApp::new();
    let artist = app.token_for(Role::Artist).await;
    let admin = app.token_for(Role::Admin).await;

    let (status, body) = app
        .send(Method::POST, "/events/new", Some(&artist), Some(event_body("New")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let slug = body["data"]["slug"].as_str().unwrap().to_string();
    assert_eq!(slug, "new-1");
    let event_id = body["data"]["event_id"].as_str().unwrap().to_string();

    for status in ["APPROVED", "PUBLISHED"] {
        let (code, _) = app
            .send(
                Method::POST,
                &format!("/admin/events/{event_id}/status"),
                Some(&admin),
                Some(json!({ "status": status })),
            )
            .await;
        assert_eq!(code, StatusCode::OK);
    }

    let (status, body) = app
        .send(Method::GET, &format!("/events/{slug}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "New");
}
