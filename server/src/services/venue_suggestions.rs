use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{NewVenueSuggestion, SuggestionStatus, VenueSuggestion};
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};
use crate::utils::non_blank;
use crate::utils::validate::{check_length, is_http_url};

/// Every field but `name` may be omitted or left empty.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueSuggestionInput {
    pub name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub naver_map_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReviewInput {
    pub status: SuggestionStatus,
}

fn validate(
    input: VenueSuggestionInput,
    submitted_by_id: Option<Uuid>,
) -> AppResult<NewVenueSuggestion> {
    let name = input.name.trim().to_string();
    check_length("Venue name", &name, 2, 120)?;

    let address = non_blank(input.address);
    if let Some(address) = &address {
        check_length("Address", address, 3, 200)?;
    }
    let contact = non_blank(input.contact);
    if let Some(contact) = &contact {
        check_length("Contact", contact, 0, 120)?;
    }
    let naver_map_url = non_blank(input.naver_map_url);
    if let Some(url) = &naver_map_url {
        if !is_http_url(url) {
            return Err(AppError::ValidationError(
                "Map link must be a valid URL".to_string(),
            ));
        }
    }
    let notes = non_blank(input.notes);
    if let Some(notes) = &notes {
        check_length("Notes", notes, 0, 500)?;
    }

    Ok(NewVenueSuggestion {
        name,
        address,
        contact,
        naver_map_url,
        notes,
        submitted_by_id,
    })
}

/// Anyone may suggest a venue; signed-in submitters are recorded.
pub async fn submit(
    store: &dyn Store,
    actor: Option<&AuthUser>,
    input: VenueSuggestionInput,
) -> AppResult<VenueSuggestion> {
    let suggestion = validate(input, actor.map(|a| a.id))?;
    let created = store.insert_venue_suggestion(suggestion).await?;

    info!(
        suggestion_id = %created.id,
        user_id = ?created.submitted_by_id,
        "Venue suggestion submitted"
    );
    Ok(created)
}

pub async fn review(
    store: &dyn Store,
    actor: Option<&AuthUser>,
    id: Uuid,
    status: SuggestionStatus,
    now: DateTime<Utc>,
) -> AppResult<VenueSuggestion> {
    let actor = actor.ok_or_else(|| AppError::AuthError("Sign in to continue".to_string()))?;
    actor.require_admin()?;

    let updated = store
        .update_venue_suggestion_status(id, status, now)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Venue suggestion '{id}' was not found")))?;

    info!(suggestion_id = %id, status = %status, user_id = %actor.id, "Venue suggestion reviewed");
    Ok(updated)
}

pub async fn list(
    store: &dyn Store,
    actor: &AuthUser,
    status: Option<SuggestionStatus>,
) -> AppResult<Vec<VenueSuggestion>> {
    actor.require_admin()?;
    store.list_venue_suggestions(status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;

    fn input(name: &str) -> VenueSuggestionInput {
        VenueSuggestionInput {
            name: name.to_string(),
            address: Some(String::new()),
            contact: Some("".into()),
            naver_map_url: None,
            notes: Some("  ".into()),
        }
    }

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "someone@bandstage.kr".into(),
            role,
        }
    }

    #[test]
    fn test_empty_optional_fields_become_null() {
        let suggestion = validate(input("Rolling Hall"), None).unwrap();
        assert_eq!(suggestion.address, None);
        assert_eq!(suggestion.contact, None);
        assert_eq!(suggestion.notes, None);
    }

    #[test]
    fn test_field_bounds() {
        assert!(validate(input("R"), None).is_err());

        let mut short_address = input("Rolling Hall");
        short_address.address = Some("ab".into());
        assert!(validate(short_address, None).is_err());

        let mut long_notes = input("Rolling Hall");
        long_notes.notes = Some("n".repeat(501));
        assert!(validate(long_notes, None).is_err());

        let mut bad_url = input("Rolling Hall");
        bad_url.naver_map_url = Some("not a url".into());
        assert!(validate(bad_url, None).is_err());

        let mut ftp_url = input("Rolling Hall");
        ftp_url.naver_map_url = Some("ftp://naver.me/xyz".into());
        assert!(validate(ftp_url, None).is_err());

        assert!(validate(input(&"홀".repeat(121)), None).is_err());
        assert!(validate(input(&"홀".repeat(120)), None).is_ok());

        let mut long_contact = input("Rolling Hall");
        long_contact.contact = Some("0".repeat(121));
        assert!(validate(long_contact, None).is_err());

        let mut good_url = input("Rolling Hall");
        good_url.naver_map_url = Some("https://naver.me/xyz".into());
        assert!(validate(good_url, None).is_ok());
    }

    #[tokio::test]
    async fn test_anonymous_submission_starts_new() {
        let store = MemoryStore::new();
        let created = submit(&store, None, input("Rolling Hall")).await.unwrap();
        assert_eq!(created.status, SuggestionStatus::New);
        assert_eq!(created.submitted_by_id, None);
        assert_eq!(created.reviewed_at, None);
    }

    #[tokio::test]
    async fn test_review_is_admin_only() {
        let store = MemoryStore::new();
        let fan = user(Role::Fan);
        let created = submit(&store, Some(&fan), input("Rolling Hall")).await.unwrap();
        assert_eq!(created.submitted_by_id, Some(fan.id));

        let now = Utc::now();
        assert!(matches!(
            review(&store, None, created.id, SuggestionStatus::Approved, now).await,
            Err(AppError::AuthError(_))
        ));
        assert!(matches!(
            review(&store, Some(&fan), created.id, SuggestionStatus::Approved, now).await,
            Err(AppError::Forbidden(_))
        ));

        let admin = user(Role::Admin);
        let reviewed = review(&store, Some(&admin), created.id, SuggestionStatus::InReview, now)
            .await
            .unwrap();
        assert_eq!(reviewed.status, SuggestionStatus::InReview);
        assert_eq!(reviewed.reviewed_at, Some(now));

        assert!(matches!(
            review(&store, Some(&admin), Uuid::new_v4(), SuggestionStatus::Rejected, now).await,
            Err(AppError::NotFound(_))
        ));
    }
}
