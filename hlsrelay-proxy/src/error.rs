use thiserror::Error;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid target URL {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("Upstream request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid redirect location {location:?} from {url}")]
    InvalidRedirect { url: String, location: String },

    #[error("Failed to read upstream body from {url}: {source}")]
    UpstreamBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Concurrency gate closed")]
    GateClosed,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ProxyError {
    /// Whether the failure happened on the origin side of the relay
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::InvalidTarget { .. }
                | Self::Upstream { .. }
                | Self::InvalidRedirect { .. }
                | Self::UpstreamBody { .. }
        )
    }
}
