//! Axum integration: mounted auth routes, cookie-backed credential storage,
//! and the advisory role guard.
//!
//! [`auth_routes`] serves the whole session surface under a configurable path
//! prefix (default `/auth`):
//!
//! - `GET /auth/login` begins the OAuth code flow
//! - `GET /auth/callback` finishes it and mirrors the token into a cookie
//! - `GET /auth/popup` and `GET /auth/popup/callback` drive the provider popup
//!   handshake (registered only when a provider URL is configured)
//! - `GET|POST /auth/logout` tears down the local session
//!
//! [`RouteGuard`] with [`require_role`] gates privileged path prefixes on the
//! token's role claim. The claim is decoded without signature verification, so
//! treat the guard as navigation hygiene, not authorization.

mod config;
mod cookies;
mod error;
mod guard;
mod routes;
mod state;

pub use config::SessionAuthConfig;
pub use error::AuthError;
pub use guard::{require_role, RouteGuard};
pub use routes::auth_routes;
