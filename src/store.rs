use std::sync::Mutex;

use crate::types::SessionToken;

/// Persistent holder of the session credential and the transient flow slots,
/// shared by every context of the same origin.
///
/// This is the single shared mutable resource of the session core. Only the
/// OAuth callback handler and the popup handshake write the token; everything
/// else reads it. The nonce and return-path slots are consume-once: `take_*`
/// removes the value, so a stale callback URL can never be replayed.
///
/// Implementations map the three slots onto whatever storage the host has:
/// [`MemoryStore`] for tests and non-browser hosts, a cookie jar in the axum
/// integration.
pub trait CredentialStore: Send + Sync {
    /// Current session token, if any.
    fn token(&self) -> Option<SessionToken>;

    /// Replace the session token.
    fn set_token(&self, token: &SessionToken);

    /// Remove the session token (logout / teardown).
    fn clear_token(&self);

    /// Persist the anti-forgery nonce for an in-flight authorization.
    fn set_nonce(&self, nonce: &str);

    /// Remove and return the persisted nonce. Must be called exactly once per
    /// callback, regardless of outcome.
    fn take_nonce(&self) -> Option<String>;

    /// Persist the path to return to after a successful login.
    fn set_return_path(&self, path: &str);

    /// Remove and return the persisted return path.
    fn take_return_path(&self) -> Option<String>;
}

#[derive(Debug, Default)]
struct Slots {
    token: Option<SessionToken>,
    nonce: Option<String>,
    return_path: Option<String>,
}

/// In-process [`CredentialStore`] backed by a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<Slots>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn token(&self) -> Option<SessionToken> {
        self.slots.lock().unwrap().token.clone()
    }

    fn set_token(&self, token: &SessionToken) {
        self.slots.lock().unwrap().token = Some(token.clone());
    }

    fn clear_token(&self) {
        self.slots.lock().unwrap().token = None;
    }

    fn set_nonce(&self, nonce: &str) {
        self.slots.lock().unwrap().nonce = Some(nonce.to_string());
    }

    fn take_nonce(&self) -> Option<String> {
        self.slots.lock().unwrap().nonce.take()
    }

    fn set_return_path(&self, path: &str) {
        self.slots.lock().unwrap().return_path = Some(path.to_string());
    }

    fn take_return_path(&self) -> Option<String> {
        self.slots.lock().unwrap().return_path.take()
    }
}
