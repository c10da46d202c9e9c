//! Data server client error types.

/// Errors from fetching one query against the data server.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the server
    #[error("rate limited by the weather data server")]
    RateLimited,

    /// Failure injected by the mock source
    #[error("mock failure: {0}")]
    Mock(String),
}
