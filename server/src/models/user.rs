use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Fan,
    Artist,
    Venue,
    Admin,
}

text_enum!(Role, "role", {
    Fan => "FAN",
    Artist => "ARTIST",
    Venue => "VENUE",
    Admin => "ADMIN",
});

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Only artists and admins may list new events.
    pub fn can_create_events(&self) -> bool {
        matches!(self, Role::Artist | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub display_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub oauth_provider: Option<String>,
    pub oauth_subject: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        for role in [Role::Fan, Role::Artist, Role::Venue, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("SUPERUSER".parse::<Role>().is_err());
    }

    #[test]
    fn test_event_creation_roles() {
        assert!(Role::Artist.can_create_events());
        assert!(Role::Admin.can_create_events());
        assert!(!Role::Fan.can_create_events());
        assert!(!Role::Venue.can_create_events());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "fan@example.com".into(),
            password_hash: Some("$argon2id$secret".into()),
            name: "Fan".into(),
            display_name: None,
            role: Role::Fan,
            oauth_provider: None,
            oauth_subject: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "FAN");
    }
}
