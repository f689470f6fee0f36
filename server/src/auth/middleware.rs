use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::{AuthUser, JwtService};
use crate::state::AppState;
use crate::utils::error::AppError;

/// Path prefixes that require a signed-in session.
pub const PROTECTED_PREFIXES: &[&str] = &["/me", "/events/new", "/admin", "/orders"];

/// Resolves the bearer token into an [`AuthUser`] request extension.
/// Missing or invalid tokens leave the request anonymous.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match extract_auth_user(&request, &state.jwt) {
        Some(user) => {
            debug!(user_id = %user.id, role = %user.role, "Authenticated request");
            request.extensions_mut().insert(user);
        }
        None => debug!("Anonymous request"),
    }

    next.run(request).await
}

/// Rejects anonymous requests to [`PROTECTED_PREFIXES`].
pub async fn route_gate(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if is_protected(path) && request.extensions().get::<AuthUser>().is_none() {
        debug!(path, "Blocked anonymous request to protected route");
        return AppError::AuthError("Sign in to continue".to_string()).into_response();
    }

    next.run(request).await
}

fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn extract_auth_user(request: &Request, jwt: &JwtService) -> Option<AuthUser> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let claims = jwt.verify_token(token).ok()?;

    Some(AuthUser {
        id: claims.user_id,
        email: claims.email,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{Role, User};

    fn token_for(jwt: &JwtService, role: Role) -> (Uuid, String) {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "fan@example.com".into(),
            password_hash: None,
            name: "Fan".into(),
            display_name: None,
            role,
            oauth_provider: None,
            oauth_subject: None,
            created_at: now,
            updated_at: now,
        };
        (user.id, jwt.create_token(&user).unwrap())
    }

    #[test]
    fn test_protected_prefixes_match_whole_segments() {
        assert!(is_protected("/me"));
        assert!(is_protected("/me/tickets"));
        assert!(is_protected("/events/new"));
        assert!(is_protected("/admin/venue-suggestions"));
        assert!(is_protected("/orders/abc/pay"));

        assert!(!is_protected("/events"));
        assert!(!is_protected("/events/indie-pulse"));
        assert!(!is_protected("/events/newcomers-night"));
        assert!(!is_protected("/merch"));
        assert!(!is_protected("/health"));
    }

    #[test]
    fn test_extract_token_with_bearer() {
        let jwt = JwtService::new("test_secret", "test_issuer", 24);
        let (id, token) = token_for(&jwt, Role::Artist);

        let request = Request::builder()
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let user = extract_auth_user(&request, &jwt).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Artist);
    }

    #[test]
    fn test_no_header_or_bad_token_is_anonymous() {
        let jwt = JwtService::new("test_secret", "test_issuer", 24);

        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_auth_user(&request, &jwt).is_none());

        let request = Request::builder()
            .header("authorization", "Bearer invalid_token")
            .body(Body::empty())
            .unwrap();
        assert!(extract_auth_user(&request, &jwt).is_none());
    }
}
