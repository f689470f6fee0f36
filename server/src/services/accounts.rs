use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::JwtService;
use crate::models::{NewUser, Role, User};
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validate::{check_length, is_valid_email};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;
const NAME_MAX: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedUp {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registers a FAN account. A taken email is a validation failure.
pub async fn signup(store: &dyn Store, input: SignupInput) -> AppResult<SignedUp> {
    let email = normalize_email(&input.email);
    if !is_valid_email(&email) {
        return Err(AppError::ValidationError(
            "Enter a valid email address".to_string(),
        ));
    }
    check_length("Password", &input.password, PASSWORD_MIN, PASSWORD_MAX)?;
    let name = input.name.trim().to_string();
    check_length("Name", &name, 1, NAME_MAX)?;

    let password = input.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::InternalServerError(format!("hashing task failed: {e}")))??;

    let user = store
        .create_user(NewUser {
            email,
            password_hash,
            name,
            role: Role::Fan,
        })
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => {
                AppError::ValidationError("This email is already registered".to_string())
            }
            other => other,
        })?;

    info!(user_id = %user.id, "Account created");
    Ok(SignedUp { user_id: user.id })
}

pub async fn login(store: &dyn Store, jwt: &JwtService, input: LoginInput) -> AppResult<Session> {
    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let user = store
        .find_user_by_email(&normalize_email(&input.email))
        .await?
        .ok_or_else(invalid)?;
    let stored_hash = user.password_hash.clone().ok_or_else(invalid)?;

    let password = input.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::InternalServerError(format!("verification task failed: {e}")))?;
    if !verified {
        return Err(invalid());
    }

    let token = jwt
        .create_token(&user)
        .map_err(|e| AppError::InternalServerError(format!("token signing failed: {e}")))?;

    info!(user_id = %user.id, "Signed in");
    Ok(Session { token, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn input(email: &str, password: &str, name: &str) -> SignupInput {
        SignupInput {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let store = MemoryStore::new();
        let jwt = JwtService::new("test_secret", "bandstage", 1);

        let created = signup(&store, input(" Fan@BandStage.kr ", "password123", "Fan"))
            .await
            .unwrap();
        let user = store.find_user_by_id(created.user_id).await.unwrap().unwrap();
        assert_eq!(user.email, "fan@bandstage.kr");
        assert_eq!(user.role, Role::Fan);

        let session = login(
            &store,
            &jwt,
            LoginInput {
                email: "fan@bandstage.kr".into(),
                password: "password123".into(),
            },
        )
        .await
        .unwrap();
        let claims = jwt.verify_token(&session.token).unwrap();
        assert_eq!(claims.user_id, created.user_id);
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let store = MemoryStore::new();
        for bad in [
            input("not-an-email", "password123", "Fan"),
            input("fan@bandstage.kr", "short", "Fan"),
            input("fan@bandstage.kr", "password123", "   "),
            input("fan@bandstage.kr", &"p".repeat(129), "Fan"),
            input("fan@bandstage.kr", "password123", &"n".repeat(101)),
        ] {
            assert!(matches!(
                signup(&store, bad).await,
                Err(AppError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_signup_accepts_upper_bounds() {
        let store = MemoryStore::new();
        let long = input("long@bandstage.kr", &"p".repeat(128), &"n".repeat(100));
        assert!(signup(&store, long).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_validation_error() {
        let store = MemoryStore::new();
        signup(&store, input("fan@bandstage.kr", "password123", "Fan"))
            .await
            .unwrap();
        assert!(matches!(
            signup(&store, input("FAN@bandstage.kr", "password456", "Other")).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let store = MemoryStore::new();
        let jwt = JwtService::new("test_secret", "bandstage", 1);
        signup(&store, input("fan@bandstage.kr", "password123", "Fan"))
            .await
            .unwrap();

        for (email, password) in [("fan@bandstage.kr", "password124"), ("nobody@bandstage.kr", "password123")] {
            let result = login(
                &store,
                &jwt,
                LoginInput {
                    email: email.into(),
                    password: password.into(),
                },
            )
            .await;
            assert!(matches!(result, Err(AppError::AuthError(_))));
        }
    }
}
