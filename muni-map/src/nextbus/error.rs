//! Feed client error types.

/// Errors from the NextBus feed client.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed returned a non-success status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected schema
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// Feed answered with its own `Error` object and no vehicle data
    #[error("feed error: {content}")]
    Feed { content: String, should_retry: bool },
}

impl FeedError {
    /// Whether the feed advised retrying.
    ///
    /// Only the feed's own `Error` object carries this advice. It is exposed
    /// for callers but nothing in the engine consults it.
    pub fn should_retry(&self) -> bool {
        matches!(
            self,
            FeedError::Feed {
                should_retry: true,
                ..
            }
        )
    }

    /// Whether the request failed before a well-formed response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Http(_) | FeedError::Api { .. })
    }
}
