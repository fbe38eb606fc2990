//! Silent session verification and cross-context re-arming.
//!
//! The verifier is the single source of truth for "who is logged in": it never
//! trusts event payloads and always re-asks the API. Hosts render immediately
//! and observe [`AuthStatus`] through a watch channel; verification runs in the
//! background and corrects the optimistic UI once it resolves.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use crate::api::AuthBackend;
use crate::event::AuthEvent;
use crate::store::CredentialStore;
use crate::types::User;

/// Observable authentication state of this context.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    /// A verification round-trip is in flight.
    Loading,
    /// The stored token was verified against the API.
    Authenticated(User),
    /// Resolved: no token, or the API rejected the stored one.
    Anonymous,
}

/// Verifies the stored credential against the API and keeps the in-memory
/// user snapshot fresh across popup completions.
pub struct SessionVerifier<B> {
    backend: Arc<B>,
    store: Arc<dyn CredentialStore>,
    status: watch::Sender<AuthStatus>,
}

// Manual Clone: avoid derive adding a `B: Clone` bound.
impl<B> Clone for SessionVerifier<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            store: self.store.clone(),
            status: self.status.clone(),
        }
    }
}

impl<B: AuthBackend> SessionVerifier<B> {
    #[must_use]
    pub fn new(backend: Arc<B>, store: Arc<dyn CredentialStore>) -> Self {
        let (status, _) = watch::channel(AuthStatus::Loading);
        Self {
            backend,
            store,
            status,
        }
    }

    /// Subscribe to the authentication state.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    /// Run one verification pass.
    ///
    /// No stored token resolves to [`AuthStatus::Anonymous`] without any
    /// network call. A rejected token also resolves to `Anonymous`: logged,
    /// never retried automatically, and the token is left in place (only the
    /// callback and popup flows write the store; staleness self-corrects on
    /// the next pass).
    ///
    /// Safe to call any number of times; callers may race freely.
    pub async fn verify(&self) {
        let Some(token) = self.store.token() else {
            self.status.send_replace(AuthStatus::Anonymous);
            return;
        };

        self.status.send_replace(AuthStatus::Loading);

        match self.backend.verify_session(&token).await {
            Ok(user) => {
                self.status.send_replace(AuthStatus::Authenticated(user));
            }
            Err(e) => {
                tracing::warn!(error = %e, "session verification failed");
                self.status.send_replace(AuthStatus::Anonymous);
            }
        }
    }

    /// Bootstrap and keep re-verifying for the lifetime of the bus.
    ///
    /// Runs an initial [`verify`](Self::verify), then re-verifies on every
    /// success event. Error events leave the current state untouched. A lagged
    /// receiver re-verifies unconditionally: missed success events are
    /// harmless because verification is idempotent.
    ///
    /// Pass `bus.subscribe()`, taken at the moment the host starts (before any
    /// popup can complete). Intended to be spawned; returns when every bus
    /// handle is dropped.
    pub async fn run(&self, mut events: tokio::sync::broadcast::Receiver<AuthEvent>) {
        self.verify().await;

        loop {
            match events.recv().await {
                Ok(AuthEvent::Success { .. }) => self.verify().await,
                Ok(AuthEvent::Error { .. }) => {}
                Err(RecvError::Lagged(_)) => self.verify().await,
                Err(RecvError::Closed) => break,
            }
        }
    }
}
