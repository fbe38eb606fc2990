#![doc = include_str!("../README.md")]

pub mod api;
pub mod claims;
pub mod error;
pub mod event;
pub mod flow;
pub mod nonce;
pub mod store;
pub mod types;
pub mod verify;

#[cfg(feature = "middleware")]
pub mod middleware;

// Re-exports for convenient access
pub use api::AuthBackend;
#[cfg(feature = "client")]
pub use api::{ApiClient, ApiConfig};
pub use error::Error;
pub use event::{AuthEvent, SessionEventBus, AUTH_CHANNEL};
pub use flow::{FlowError, OAuthConfig};
#[cfg(feature = "middleware")]
pub use middleware::{auth_routes, require_role, RouteGuard, SessionAuthConfig};
pub use store::{CredentialStore, MemoryStore};
pub use types::{AuthPayload, Role, SessionToken, User, UserId};
pub use verify::{AuthStatus, SessionVerifier};
