#![allow(dead_code)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use bandstage_server::auth::AuthUser;
use bandstage_server::models::{EventStatus, NewUser, Role, TicketType};
use bandstage_server::services::checkout::CheckoutInput;
use bandstage_server::services::events::{self, CreateEventInput, TicketTypeInput};
use bandstage_server::store::Store;

pub fn user(role: Role) -> AuthUser {
    let id = Uuid::new_v4();
    AuthUser {
        id,
        email: format!("{}@bandstage.kr", id.simple()),
        role,
    }
}

/// A user row for stores that enforce foreign keys.
pub async fn persisted_user(store: &dyn Store, role: Role) -> AuthUser {
    let email = format!("{}@bandstage.kr", Uuid::new_v4().simple());
    let created = store
        .create_user(NewUser {
            email,
            password_hash: "not-a-real-hash".into(),
            name: "Test User".into(),
            role,
        })
        .await
        .unwrap();
    AuthUser {
        id: created.id,
        email: created.email,
        role: created.role,
    }
}

pub struct Seeded {
    pub event_id: Uuid,
    pub slug: String,
    pub ticket_types: Vec<TicketType>,
}

/// One ticket type per `(quantity, limit)`, named "Tier N".
pub fn tiers(tickets: &[(i32, i32)]) -> Vec<TicketTypeInput> {
    tickets
        .iter()
        .enumerate()
        .map(|(i, (quantity, limit))| TicketTypeInput {
            name: format!("Tier {}", i + 1),
            description: None,
            price: Decimal::new(30000 + 10000 * i as i64, 0),
            quantity: *quantity,
            per_user_limit: Some(*limit),
        })
        .collect()
}

pub fn event_input(title: &str, ticket_types: Vec<TicketTypeInput>) -> CreateEventInput {
    CreateEventInput {
        title: title.to_string(),
        summary: None,
        description: None,
        cover_image: None,
        starts_at: Utc::now() + Duration::days(14),
        ends_at: None,
        genre: Some("rock".into()),
        age_limit: None,
        ticket_note: None,
        venue_id: None,
        band_id: None,
        ticket_types,
    }
}

/// Creates and publishes an event with one ticket type per `(quantity, limit)`.
pub async fn published_event(store: &dyn Store, title: &str, tickets: &[(i32, i32)]) -> Seeded {
    publish(
        store,
        &user(Role::Artist),
        &user(Role::Admin),
        event_input(title, tiers(tickets)),
    )
    .await
}

/// Creates `input` as `artist`, then has `admin` approve and publish it.
pub async fn publish(
    store: &dyn Store,
    artist: &AuthUser,
    admin: &AuthUser,
    input: CreateEventInput,
) -> Seeded {
    let created = events::create_event(store, Some(artist), input).await.unwrap();

    events::set_event_status(store, admin, created.event_id, EventStatus::Approved)
        .await
        .unwrap();
    events::set_event_status(store, admin, created.event_id, EventStatus::Published)
        .await
        .unwrap();

    let mut ticket_types = store.list_ticket_types(created.event_id).await.unwrap();
    ticket_types.sort_by(|a, b| a.name.cmp(&b.name));

    Seeded {
        event_id: created.event_id,
        slug: created.slug,
        ticket_types,
    }
}

pub fn checkout(event_id: Uuid, lines: &[(Uuid, i32)]) -> CheckoutInput {
    CheckoutInput {
        event_id,
        lines: lines
            .iter()
            .map(|(ticket_type_id, quantity)| bandstage_server::models::OrderLineRequest {
                ticket_type_id: *ticket_type_id,
                quantity: *quantity,
            })
            .collect(),
        buyer_name: "Kim Fan".into(),
        buyer_email: "fan@bandstage.kr".into(),
        buyer_phone: None,
        agree_terms: true,
    }
}

pub async fn remaining(store: &dyn Store, event_id: Uuid, ticket_type_id: Uuid) -> i32 {
    store
        .list_ticket_types(event_id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.id == ticket_type_id)
        .map(|t| t.remaining)
        .unwrap()
}
