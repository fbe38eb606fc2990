use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Opaque bearer credential for the current session.
///
/// Structurally a signed claim set (`header.claims.signature`), but this crate
/// treats it as opaque everywhere except the advisory claims decode in
/// [`claims`](crate::claims). Owned by the [`CredentialStore`](crate::store::CredentialStore);
/// the middleware mirrors it into a cookie for the route guard.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Bearer credentials must not leak into logs.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Kamus user identifier (opaque string, chosen by the API).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Role claim carried in the session token.
///
/// Compared by exact string equality; the guard never interprets unknown roles.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    /// The privileged role accepted by the route guard by default.
    #[must_use]
    pub fn admin() -> Self {
        Self("admin".into())
    }

    /// The default role assigned to registered users.
    #[must_use]
    pub fn member() -> Self {
        Self("member".into())
    }
}

/// In-memory projection of the verified identity.
///
/// Rebuilt from `verify_session` whenever the stored token changes; never
/// persisted independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    pub nick: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl User {
    /// Create a `User` with only the required fields.
    #[must_use]
    pub fn new(id: UserId, nick: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            nick: nick.into(),
            role,
            email: None,
            avatar_url: None,
            bio: None,
        }
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the avatar URL.
    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Set the profile bio.
    #[must_use]
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }
}

/// Token + user pair returned by the exchange and provider-login endpoints.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct AuthPayload {
    pub token: SessionToken,
    pub user: User,
}

/// Identity fields relayed by the external provider's popup callback.
///
/// Only these two fields are forwarded to the API; the provider's own token is
/// checked for presence but never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub email: String,
    pub name: String,
}

/// Payload for `register`.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct NewRegistration {
    pub nick: String,
    pub email: String,
    pub password: String,
}

impl NewRegistration {
    #[must_use]
    pub fn new(
        nick: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            nick: nick.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Result of `register`.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct RegistrationOutcome {
    /// When `true`, the account stays inactive until `verify_email` succeeds.
    #[serde(default)]
    pub requires_verification: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_debug_is_redacted() {
        let token = SessionToken("hdr.claims.sig".into());
        assert_eq!(format!("{token:?}"), "SessionToken(..)");
    }

    #[test]
    fn session_token_serde_is_transparent() {
        let token = SessionToken("abc".into());
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc\"");
        let parsed: SessionToken = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn user_deserializes_without_optional_fields() {
        let user: User =
            serde_json::from_str(r#"{"id":"u1","nick":"ayse","role":"member"}"#).unwrap();
        assert_eq!(user.id, UserId("u1".into()));
        assert_eq!(user.role, Role::member());
        assert!(user.email.is_none());
    }

    #[test]
    fn user_builder() {
        let user = User::new(UserId("u2".into()), "kerem", Role::admin())
            .with_email("kerem@example.com")
            .with_bio("editor");
        assert_eq!(user.email.as_deref(), Some("kerem@example.com"));
        assert_eq!(user.bio.as_deref(), Some("editor"));
    }

    #[test]
    fn roles_compare_by_value() {
        assert_eq!(Role::admin(), Role("admin".into()));
        assert_ne!(Role::admin(), Role::member());
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_user_id(_: &UserId) {}
        fn takes_role(_: &Role) {}

        let id = UserId::from("id".to_string());
        let role = Role::from("id".to_string());

        takes_user_id(&id);
        takes_role(&role);
        // takes_user_id(&role);  // Compile error!
    }
}
