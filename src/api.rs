use std::future::Future;

use crate::error::Error;
use crate::types::{AuthPayload, ProviderProfile, SessionToken, User};

#[cfg(feature = "client")]
pub use client::{ApiClient, ApiConfig};

/// Backend operations the session core depends on.
///
/// The flows and the verifier are written against this trait so tests (and
/// non-HTTP hosts) can substitute their own backend. [`ApiClient`] is the
/// reqwest implementation.
pub trait AuthBackend: Send + Sync + 'static {
    /// Exchange an authorization code for a session token and user snapshot.
    fn exchange_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<AuthPayload, Error>> + Send;

    /// Verify a stored token and return the current user snapshot.
    fn verify_session(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Result<User, Error>> + Send;

    /// Create-or-login a user from an external provider's identity.
    fn provider_login(
        &self,
        profile: &ProviderProfile,
    ) -> impl Future<Output = Result<AuthPayload, Error>> + Send;
}

#[cfg(feature = "client")]
mod client {
    use serde::Serialize;
    use url::Url;

    use super::AuthBackend;
    use crate::error::Error;
    use crate::types::{
        AuthPayload, NewRegistration, ProviderProfile, RegistrationOutcome, SessionToken, User,
    };

    /// Kamus API endpoints used by the session core.
    ///
    /// All endpoints derive from the base URL; override individual ones with
    /// the `with_*` methods when the deployment splits them.
    #[derive(Debug, Clone)]
    #[non_exhaustive]
    pub struct ApiConfig {
        pub(crate) token_url: Url,
        pub(crate) session_url: Url,
        pub(crate) social_login_url: Url,
        pub(crate) register_url: Url,
        pub(crate) verify_email_url: Url,
        pub(crate) resend_verification_url: Url,
        pub(crate) password_forgot_url: Url,
        pub(crate) password_reset_url: Url,
    }

    impl ApiConfig {
        /// Derive all endpoints from an API base URL.
        ///
        /// # Panics
        ///
        /// Panics if `base_url` cannot be a base (e.g. `mailto:`); any
        /// `http(s)` URL is fine.
        #[must_use]
        pub fn new(base_url: &Url) -> Self {
            let at = |path: &str| -> Url {
                base_url
                    .join(path)
                    .expect("endpoint path is valid relative to an http(s) base URL")
            };
            Self {
                token_url: at("v1/auth/token"),
                session_url: at("v1/auth/session"),
                social_login_url: at("v1/auth/social"),
                register_url: at("v1/users"),
                verify_email_url: at("v1/users/verify-email"),
                resend_verification_url: at("v1/users/verify-email/resend"),
                password_forgot_url: at("v1/users/password/forgot"),
                password_reset_url: at("v1/users/password/reset"),
            }
        }

        /// Create config from the `KAMUS_API_URL` environment variable.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Config`] if the variable is missing or not a valid
        /// base URL.
        pub fn from_env() -> Result<Self, Error> {
            let base = std::env::var("KAMUS_API_URL")
                .map_err(|_| Error::Config("KAMUS_API_URL is required".into()))?;
            let base: Url = base
                .parse()
                .map_err(|e| Error::Config(format!("KAMUS_API_URL: {e}")))?;
            if base.cannot_be_a_base() {
                return Err(Error::Config("KAMUS_API_URL: not a base URL".into()));
            }
            Ok(Self::new(&base))
        }

        /// Override the code-exchange endpoint.
        #[must_use]
        pub fn with_token_url(mut self, url: Url) -> Self {
            self.token_url = url;
            self
        }

        /// Override the session-verification endpoint.
        #[must_use]
        pub fn with_session_url(mut self, url: Url) -> Self {
            self.session_url = url;
            self
        }

        /// Override the provider create-or-login endpoint.
        #[must_use]
        pub fn with_social_login_url(mut self, url: Url) -> Self {
            self.social_login_url = url;
            self
        }
    }

    /// HTTP client for the Kamus API.
    pub struct ApiClient {
        config: ApiConfig,
        http: reqwest::Client,
    }

    impl ApiClient {
        #[must_use]
        pub fn new(config: ApiConfig) -> Self {
            Self {
                config,
                http: reqwest::Client::new(),
            }
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        /// Register a new account.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Http`] on network failure, or [`Error::Api`] if
        /// the API rejects the registration (nick taken, weak password, ...).
        pub async fn register(
            &self,
            registration: &NewRegistration,
        ) -> Result<RegistrationOutcome, Error> {
            let response = self
                .http
                .post(self.config.register_url.clone())
                .json(registration)
                .send()
                .await?;
            let response = Self::ensure_success(response, "registration").await?;
            response
                .json::<RegistrationOutcome>()
                .await
                .map_err(Into::into)
        }

        /// Confirm an email address with the code sent at registration.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Http`] on network failure, or [`Error::Api`] if
        /// the code is wrong or expired.
        pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), Error> {
            self.post_command(
                self.config.verify_email_url.clone(),
                "email verification",
                &serde_json::json!({ "email": email, "code": code }),
            )
            .await
        }

        /// Re-send the email verification code.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Http`] on network failure, or [`Error::Api`] on
        /// rejection.
        pub async fn resend_verification(&self, email: &str) -> Result<(), Error> {
            self.post_command(
                self.config.resend_verification_url.clone(),
                "verification resend",
                &serde_json::json!({ "email": email }),
            )
            .await
        }

        /// Ask the API to mail a password-reset code.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Http`] on network failure, or [`Error::Api`] on
        /// rejection.
        pub async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
            self.post_command(
                self.config.password_forgot_url.clone(),
                "password reset request",
                &serde_json::json!({ "email": email }),
            )
            .await
        }

        /// Set a new password using a previously mailed reset code.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Http`] on network failure, or [`Error::Api`] if
        /// the code is wrong or expired.
        pub async fn reset_password(
            &self,
            email: &str,
            code: &str,
            new_password: &str,
        ) -> Result<(), Error> {
            self.post_command(
                self.config.password_reset_url.clone(),
                "password reset",
                &serde_json::json!({
                    "email": email,
                    "code": code,
                    "new_password": new_password,
                }),
            )
            .await
        }

        async fn post_command<T: Serialize + ?Sized>(
            &self,
            url: Url,
            operation: &'static str,
            body: &T,
        ) -> Result<(), Error> {
            let response = self.http.post(url).json(body).send().await?;
            Self::ensure_success(response, operation).await?;
            Ok(())
        }

        /// Checks HTTP response status; returns the response on success or an
        /// error with details.
        async fn ensure_success(
            response: reqwest::Response,
            operation: &'static str,
        ) -> Result<reqwest::Response, Error> {
            if response.status().is_success() {
                return Ok(response);
            }
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            Err(Error::Api {
                operation,
                status: Some(status),
                detail,
            })
        }
    }

    impl AuthBackend for ApiClient {
        async fn exchange_code(&self, code: &str) -> Result<AuthPayload, Error> {
            let response = self
                .http
                .post(self.config.token_url.clone())
                .json(&serde_json::json!({ "code": code }))
                .send()
                .await?;
            let response = Self::ensure_success(response, "code exchange").await?;
            response.json::<AuthPayload>().await.map_err(Into::into)
        }

        async fn verify_session(&self, token: &SessionToken) -> Result<User, Error> {
            let response = self
                .http
                .get(self.config.session_url.clone())
                .bearer_auth(token.as_str())
                .send()
                .await?;
            let response = Self::ensure_success(response, "session verification").await?;
            response.json::<User>().await.map_err(Into::into)
        }

        async fn provider_login(&self, profile: &ProviderProfile) -> Result<AuthPayload, Error> {
            let response = self
                .http
                .post(self.config.social_login_url.clone())
                .json(profile)
                .send()
                .await?;
            let response = Self::ensure_success(response, "provider login").await?;
            response.json::<AuthPayload>().await.map_err(Into::into)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn endpoints_derive_from_base() {
            let config = ApiConfig::new(&"https://api.kamus.example/".parse().unwrap());
            assert_eq!(
                config.token_url.as_str(),
                "https://api.kamus.example/v1/auth/token"
            );
            assert_eq!(
                config.session_url.as_str(),
                "https://api.kamus.example/v1/auth/session"
            );
            assert_eq!(
                config.password_reset_url.as_str(),
                "https://api.kamus.example/v1/users/password/reset"
            );
        }

        #[test]
        fn endpoint_overrides() {
            let config = ApiConfig::new(&"https://api.kamus.example/".parse().unwrap())
                .with_token_url("https://auth.kamus.example/token".parse().unwrap());
            assert_eq!(
                config.token_url.as_str(),
                "https://auth.kamus.example/token"
            );
            assert_eq!(
                config.session_url.as_str(),
                "https://api.kamus.example/v1/auth/session"
            );
        }
    }
}
