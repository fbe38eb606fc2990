use url::Url;

use super::error::AuthError;
use crate::flow::OAuthConfig;

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) token_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
    /// External identity provider the popup navigates to. Popup routes are
    /// only registered when this is set.
    pub(crate) provider_url: Option<Url>,
    /// Delay before the popup closes itself, leaving time for the auth event
    /// to reach the opener.
    pub(crate) popup_grace_ms: u64,
}

impl AuthSettings {
    pub(crate) fn defaults() -> Self {
        Self {
            token_cookie_name: "kamus_token".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            auth_path: "/auth".into(),
            logout_redirect: "/".into(),
            error_redirect: "/".into(),
            provider_url: None,
            popup_grace_ms: 400,
        }
    }
}

/// Configuration for the auth routes.
///
/// Required OAuth fields are constructor parameters; everything else has a
/// default and a `with_*` override. Use [`from_env()`](SessionAuthConfig::from_env)
/// for convention-based setup.
pub struct SessionAuthConfig {
    pub(super) oauth: OAuthConfig,
    pub(super) settings: AuthSettings,
}

impl SessionAuthConfig {
    /// Create config with the required OAuth client settings.
    #[must_use]
    pub fn new(oauth: OAuthConfig) -> Self {
        Self {
            oauth,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `KAMUS_CLIENT_ID`: OAuth2 client ID
    /// - `KAMUS_REDIRECT_URI`: OAuth2 callback URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `KAMUS_AUTHORIZE_URL`: Override the authorization endpoint
    /// - `KAMUS_SCOPES`: Comma-separated OAuth2 scopes
    /// - `KAMUS_PROVIDER_URL`: External provider URL for the popup handshake
    ///   (popup routes are registered only when set)
    /// - `KAMUS_DEV`: Set to `"1"` or `"true"` to disable secure cookies
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or URLs
    /// are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        let client_id = std::env::var("KAMUS_CLIENT_ID")
            .map_err(|_| AuthError::Config("KAMUS_CLIENT_ID is required".into()))?;
        let redirect_uri: Url = std::env::var("KAMUS_REDIRECT_URI")
            .map_err(|_| AuthError::Config("KAMUS_REDIRECT_URI is required".into()))?
            .parse()
            .map_err(|e| AuthError::Config(format!("KAMUS_REDIRECT_URI: {e}")))?;

        let mut oauth = OAuthConfig::new(client_id, redirect_uri);

        if let Ok(url_str) = std::env::var("KAMUS_AUTHORIZE_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| AuthError::Config(format!("KAMUS_AUTHORIZE_URL: {e}")))?;
            oauth = oauth.with_authorize_url(url);
        }
        if let Ok(scopes) = std::env::var("KAMUS_SCOPES") {
            oauth = oauth.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }

        let mut config = Self::new(oauth);

        if let Ok(url_str) = std::env::var("KAMUS_PROVIDER_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| AuthError::Config(format!("KAMUS_PROVIDER_URL: {e}")))?;
            config = config.with_provider_url(url);
        }

        let dev = matches!(std::env::var("KAMUS_DEV").as_deref(), Ok("1") | Ok("true"));

        Ok(config.with_secure_cookies(!dev))
    }

    #[must_use]
    pub fn with_token_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.token_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_provider_url(mut self, url: Url) -> Self {
        self.settings.provider_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_popup_grace_ms(mut self, ms: u64) -> Self {
        self.settings.popup_grace_ms = ms;
        self
    }
}
