//! The three session-establishing flows: OAuth initiation, OAuth callback, and
//! the provider popup handshake.
//!
//! Every outcome here is terminal for the attempt; there is no retry loop.
//! The user can always restart via [`begin_login`].

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::api::AuthBackend;
use crate::error::Error;
use crate::event::{AuthEvent, EventTransport};
use crate::nonce;
use crate::store::CredentialStore;
use crate::types::{ProviderProfile, User};

/// Terminal failures of a single flow attempt.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FlowError {
    /// The user or the provider aborted at the provider's screen.
    #[error("the provider denied the authorization request")]
    ProviderDenied,
    /// State mismatch or absent code. Treated as a potential forgery and never
    /// retried automatically.
    #[error("state mismatch or missing authorization code")]
    ForgeryOrMissingCode,
    /// The API rejected the code or the exchange request failed.
    #[error("authorization code exchange failed")]
    ExchangeFailed(#[source] Error),
    /// The popup callback arrived without the required provider fields.
    #[error("provider callback is missing required parameters")]
    InvalidCallbackParameters,
    /// The API refused the create-or-login request.
    #[error("provider login rejected: {message}")]
    BackendRejected { message: String },
}

impl FlowError {
    /// Stable short code carried in error redirects (`/?error=<code>`).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderDenied => "provider_denied",
            Self::ForgeryOrMissingCode => "state_mismatch",
            Self::ExchangeFailed(_) => "exchange_failed",
            Self::InvalidCallbackParameters => "invalid_callback",
            Self::BackendRejected { .. } => "backend_rejected",
        }
    }
}

/// Authorization-endpoint configuration for the code flow.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) authorize_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new configuration. Required fields are parameters.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri,
            authorize_url: "https://id.kamus.example/oauth/authorize"
                .parse()
                .expect("valid default URL"),
            scopes: vec!["openid".into(), "profile".into()],
        }
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_authorize_url(mut self, url: Url) -> Self {
        self.authorize_url = url;
        self
    }

    /// Override the requested scopes (default: `["openid", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

/// Query parameters delivered to the OAuth callback route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Query parameters delivered by the provider to the popup callback route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCallbackParams {
    pub email: Option<String>,
    pub name: Option<String>,
    pub token: Option<String>,
}

/// Successful end of the code flow.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    /// Sanitized destination consumed from the return-path slot (`/` default).
    pub redirect_to: String,
    pub user: User,
}

/// Begin an authorization-code flow.
///
/// Generates a fresh nonce, persists `{nonce, return_path}`, and returns the
/// authorization URL the host must navigate to. The nonce is written before
/// the URL is handed back, so the callback can always find it. No local
/// failure mode; failures surface at the provider or the callback.
#[must_use]
pub fn begin_login(
    config: &OAuthConfig,
    store: &dyn CredentialStore,
    return_path: Option<&str>,
) -> Url {
    let state = nonce::generate_nonce();
    store.set_nonce(&state);
    store.set_return_path(&nonce::sanitize_return_path(return_path));

    let scope = config.scopes.join(" ");
    let mut url = config.authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", config.redirect_uri.as_str())
        .append_pair("scope", &scope)
        .append_pair("state", &state);
    url
}

/// Complete an authorization-code flow from callback query parameters.
///
/// The persisted nonce is consumed exactly once, whatever the outcome, so a
/// replayed callback URL always fails. On success the token is stored and the
/// return path is consumed.
///
/// # Errors
///
/// Returns the terminal [`FlowError`] for this attempt; the caller redirects
/// to a neutral page and the user may re-initiate.
pub async fn complete_login<B: AuthBackend>(
    backend: &B,
    store: &dyn CredentialStore,
    params: CallbackParams,
) -> Result<LoginSuccess, FlowError> {
    if let Some(error) = &params.error {
        tracing::warn!(error = %error, "provider denied the authorization request");
        store.take_nonce();
        return Err(FlowError::ProviderDenied);
    }

    // Consumed up front: mismatching callbacks must still burn the nonce.
    let stored_nonce = store.take_nonce();

    let (Some(code), Some(received_state)) = (params.code, params.state) else {
        tracing::warn!("callback missing code or state");
        return Err(FlowError::ForgeryOrMissingCode);
    };

    match stored_nonce {
        Some(nonce) if nonce == received_state => {}
        _ => {
            tracing::warn!("OAuth state mismatch");
            return Err(FlowError::ForgeryOrMissingCode);
        }
    }

    let payload = backend.exchange_code(&code).await.map_err(|e| {
        tracing::error!(error = %e, "code exchange failed");
        FlowError::ExchangeFailed(e)
    })?;

    store.set_token(&payload.token);
    let redirect_to = nonce::sanitize_return_path(store.take_return_path().as_deref());

    Ok(LoginSuccess {
        redirect_to,
        user: payload.user,
    })
}

/// Complete the popup side of the provider handshake.
///
/// Validates the provider's callback parameters, performs create-or-login
/// through the API, stores the returned token, and delivers the resulting
/// [`AuthEvent`] over every configured transport (best effort). The returned
/// event lets the host render the popup's terminal page.
pub async fn complete_provider_callback<B: AuthBackend>(
    backend: &B,
    store: &dyn CredentialStore,
    transports: &[Arc<dyn EventTransport>],
    params: ProviderCallbackParams,
) -> AuthEvent {
    let event = match provider_login(backend, store, params).await {
        Ok(user) => {
            tracing::info!(nick = %user.nick, "provider login successful");
            AuthEvent::Success { user }
        }
        Err(e) => {
            tracing::warn!(error = %e, "provider handshake failed");
            AuthEvent::Error {
                error: e.to_string(),
            }
        }
    };

    for transport in transports {
        transport.deliver(&event);
    }
    event
}

async fn provider_login<B: AuthBackend>(
    backend: &B,
    store: &dyn CredentialStore,
    params: ProviderCallbackParams,
) -> Result<User, FlowError> {
    let present = |v: Option<String>| v.filter(|s| !s.is_empty());

    let (Some(email), Some(name), Some(_provider_token)) = (
        present(params.email),
        present(params.name),
        present(params.token),
    ) else {
        return Err(FlowError::InvalidCallbackParameters);
    };

    let profile = ProviderProfile { email, name };
    match backend.provider_login(&profile).await {
        Ok(payload) => {
            store.set_token(&payload.token);
            Ok(payload.user)
        }
        Err(Error::Api { detail, .. }) if !detail.is_empty() => {
            Err(FlowError::BackendRejected { message: detail })
        }
        Err(e) => {
            tracing::error!(error = %e, "provider login request failed");
            Err(FlowError::BackendRejected {
                message: "could not complete provider sign-in".into(),
            })
        }
    }
}

/// Tear down the local session.
///
/// Client-side only: the API contract has no revocation endpoint, and the
/// token self-invalidates server-side on expiry.
pub fn logout(store: &dyn CredentialStore) {
    store.clear_token();
}
