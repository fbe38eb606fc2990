use std::sync::Mutex;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::config::AuthSettings;
use crate::store::CredentialStore;
use crate::types::SessionToken;

pub(super) const STATE_COOKIE_NAME: &str = "__kamus_state";
pub(super) const RETURN_COOKIE_NAME: &str = "__kamus_return";

/// Create a short-lived flow cookie (nonce or return path), scoped to the
/// auth path.
fn flow_cookie(
    name: &'static str,
    value: &str,
    secure: bool,
    auth_path: &str,
) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_string())
        .max_age(Duration::minutes(5))
        .build()
}

/// Name + path pair identifying a flow cookie for removal.
fn flow_cookie_id(name: &'static str, auth_path: &str) -> Cookie<'static> {
    Cookie::build((name, "")).path(auth_path.to_string()).build()
}

/// Create the token mirror cookie.
///
/// Deliberately not encrypted: the route guard decodes the claims segment of
/// the raw token. HttpOnly and Lax still apply.
fn token_cookie(name: &str, token: &SessionToken, ttl_days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(ttl_days))
        .build()
}

/// Name + path pair identifying the token cookie for removal.
fn token_cookie_id(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .build()
}

/// [`CredentialStore`] over a request's cookie jar.
///
/// The per-request adapter the auth routes hand to the flow functions: reads
/// come from the incoming jar, writes become outgoing `Set-Cookie` headers.
/// Because the jar *is* the store here, the token cookie the route guard reads
/// can never diverge from the canonical credential.
pub(super) struct CookieCredentialStore {
    jar: Mutex<CookieJar>,
    token_cookie_name: String,
    session_ttl_days: i64,
    secure: bool,
    auth_path: String,
}

impl CookieCredentialStore {
    pub(super) fn new(jar: CookieJar, settings: &AuthSettings) -> Self {
        Self {
            jar: Mutex::new(jar),
            token_cookie_name: settings.token_cookie_name.clone(),
            session_ttl_days: settings.session_ttl_days,
            secure: settings.secure_cookies,
            auth_path: settings.auth_path.clone(),
        }
    }

    /// Recover the jar with all accumulated cookie changes.
    pub(super) fn into_jar(self) -> CookieJar {
        self.jar
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(CookieJar) -> CookieJar) {
        let mut guard = self.jar.lock().unwrap_or_else(|p| p.into_inner());
        *guard = f(guard.clone());
    }

    fn get(&self, name: &str) -> Option<String> {
        self.jar
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl CredentialStore for CookieCredentialStore {
    fn token(&self) -> Option<SessionToken> {
        self.get(&self.token_cookie_name).map(SessionToken)
    }

    fn set_token(&self, token: &SessionToken) {
        let cookie = token_cookie(
            &self.token_cookie_name,
            token,
            self.session_ttl_days,
            self.secure,
        );
        self.update(|jar| jar.add(cookie));
    }

    fn clear_token(&self) {
        let cookie = token_cookie_id(&self.token_cookie_name);
        self.update(|jar| jar.remove(cookie));
    }

    fn set_nonce(&self, nonce: &str) {
        let cookie = flow_cookie(STATE_COOKIE_NAME, nonce, self.secure, &self.auth_path);
        self.update(|jar| jar.add(cookie));
    }

    fn take_nonce(&self) -> Option<String> {
        let value = self.get(STATE_COOKIE_NAME);
        self.update(|jar| jar.remove(flow_cookie_id(STATE_COOKIE_NAME, &self.auth_path)));
        value
    }

    fn set_return_path(&self, path: &str) {
        let cookie = flow_cookie(RETURN_COOKIE_NAME, path, self.secure, &self.auth_path);
        self.update(|jar| jar.add(cookie));
    }

    fn take_return_path(&self) -> Option<String> {
        let value = self.get(RETURN_COOKIE_NAME);
        self.update(|jar| jar.remove(flow_cookie_id(RETURN_COOKIE_NAME, &self.auth_path)));
        value
    }
}
