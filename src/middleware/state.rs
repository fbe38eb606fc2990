use std::sync::Arc;

use super::config::AuthSettings;
use crate::event::SessionEventBus;
use crate::flow::OAuthConfig;

/// Shared state for auth route handlers.
pub(super) struct AuthState<B> {
    pub(super) backend: Arc<B>,
    pub(super) bus: SessionEventBus,
    pub(super) oauth: Arc<OAuthConfig>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding a `B: Clone` bound.
impl<B> Clone for AuthState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            bus: self.bus.clone(),
            oauth: self.oauth.clone(),
            settings: self.settings.clone(),
        }
    }
}
