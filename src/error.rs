#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The Kamus API answered with a non-success status.
    #[error("API error during {operation}: {detail}")]
    Api {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token decode error: {0}")]
    Token(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
