use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use crate::claims;
use crate::types::Role;

/// Role gate for a privileged path prefix.
///
/// Inspects the role claim of the mirrored token cookie before serving any
/// request under the guarded prefix; anything short of the required role is
/// redirected home. The claims decode never checks the signature; this is a
/// UX-level gate keeping logged-out or non-privileged users off privileged
/// screens, and every privileged API call re-authorizes independently. Never
/// rely on it as the sole authorization mechanism.
///
/// # Example
///
/// ```rust,ignore
/// let guard = RouteGuard::new(Role::admin());
/// let app = Router::new()
///     .nest("/admin", admin_routes)
///     .layer(axum::middleware::from_fn_with_state(guard, require_role));
/// ```
#[derive(Debug, Clone)]
pub struct RouteGuard {
    pub(super) token_cookie_name: String,
    pub(super) required_role: Role,
    pub(super) redirect_to: String,
}

impl RouteGuard {
    /// Guard requiring `required_role`, reading the default token cookie and
    /// redirecting to the site root.
    #[must_use]
    pub fn new(required_role: Role) -> Self {
        Self {
            token_cookie_name: "kamus_token".into(),
            required_role,
            redirect_to: "/".into(),
        }
    }

    /// Override the cookie holding the mirrored token.
    #[must_use]
    pub fn with_token_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.token_cookie_name = name.into();
        self
    }

    /// Override where denied requests are sent.
    #[must_use]
    pub fn with_redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }
}

/// Middleware function for [`RouteGuard`]; mount with
/// `axum::middleware::from_fn_with_state`.
pub async fn require_role(
    State(guard): State<RouteGuard>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let denied = || Redirect::to(&guard.redirect_to).into_response();

    let Some(cookie) = jar.get(&guard.token_cookie_name) else {
        return denied();
    };

    match claims::decode_unverified(cookie.value()) {
        Ok(claims) if claims.role == guard.required_role => next.run(request).await,
        Ok(claims) => {
            tracing::debug!(role = %claims.role, "role not permitted for guarded path");
            denied()
        }
        Err(e) => {
            tracing::debug!(error = %e, "could not decode token claims");
            denied()
        }
    }
}
