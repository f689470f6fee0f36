use chrono::{Duration, Utc};
use jsonwebtoken::errors::Result as JwtResult;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_TOKEN_TTL_HOURS;
use crate::models::{Role, User};

/// JWT Claims - data stored in the session token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtService {
    /// A `ttl_hours` that is not positive or does not fit a duration falls
    /// back to the default lifetime.
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_hours: i64) -> Self {
        let ttl = Duration::try_hours(ttl_hours)
            .filter(|ttl| *ttl > Duration::zero())
            .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_TTL_HOURS));

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn create_token(&self, user: &User) -> JwtResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Returns the claims if the token is signed by us, unexpired and ours.
    pub fn verify_token(&self, token: &str) -> JwtResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "artist@example.com".into(),
            password_hash: None,
            name: "Artist".into(),
            display_name: None,
            role,
            oauth_provider: None,
            oauth_subject: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_and_verify_token() {
        let service = JwtService::new("test_secret_key", "test_issuer", 24);
        let user = user(Role::Artist);

        let token = service.create_token(&user).unwrap();
        let claims = service.verify_token(&token).unwrap();

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, Role::Artist);
        assert_eq!(claims.iss, "test_issuer");
        let expires_in = claims.exp - Utc::now().timestamp();
        assert!(expires_in > 23 * 3600);
        assert!(expires_in <= 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtService::new("secret1", "test_issuer", 24);
        let verifier = JwtService::new("secret2", "test_issuer", 24);

        let token = issuer.create_token(&user(Role::Fan)).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let issuer = JwtService::new("secret", "someone-else", 24);
        let verifier = JwtService::new("secret", "bandstage", 24);

        let token = issuer.create_token(&user(Role::Admin)).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtService::new("secret", "bandstage", 24);
        let user = user(Role::Fan);
        // Past the default 60s leeway.
        let issued = Utc::now() - Duration::hours(2);
        let claims = Claims {
            sub: user.id.to_string(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: (issued + Duration::hours(1)).timestamp(),
            iat: issued.timestamp(),
            iss: "bandstage".into(),
            jti: Uuid::new_v4().to_string(),
        };
        let token =
            encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn test_unusable_ttl_falls_back_to_default() {
        for ttl_hours in [0, -1, i64::MAX] {
            let service = JwtService::new("secret", "bandstage", ttl_hours);
            assert_eq!(service.ttl, Duration::hours(DEFAULT_TOKEN_TTL_HOURS));
            let token = service.create_token(&user(Role::Fan)).unwrap();
            assert!(service.verify_token(&token).is_ok());
        }
    }
}
