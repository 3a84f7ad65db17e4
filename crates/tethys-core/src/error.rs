use thiserror::Error;

/// Application-wide error types.
///
/// Every fallible operation in the sync engine returns this enum. Errors
/// from upstream HTTP calls and store requests are mapped into the
/// transport variants by the client crates; local parsing and I/O errors
/// convert automatically through `#[from]`.
///
/// # Error Conversion
///
/// - `std::io::Error` → `AppError::Io`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use tethys_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// A remote endpoint answered with a non-success status code.
    ///
    /// Used for both the upstream catalog and the target store. The URL is
    /// kept so failures can be traced back to the exact page or link.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// HTTP client request failed for a reason other than status or timeout.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// Network or connection error.
    ///
    /// DNS failures, refused connections and the remote host being
    /// unreachable all land here.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The target store rejected a query or returned an unusable answer.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Statement content could not be parsed.
    ///
    /// Raised for malformed Turtle in fetched primary content or in a
    /// durable local copy read back during supersede.
    #[error("Content parse error: {0}")]
    ParseError(String),

    /// Local filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if the error originated on the wire rather than locally.
    ///
    /// Transport errors come from the upstream catalog or the target store;
    /// everything else (parse, I/O, config) is a local failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::HttpStatus { .. }
                | AppError::ClientError(_)
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::StoreError(_)
        )
    }

    /// Returns a short message suitable for an HTTP response body.
    pub fn user_message(&self) -> String {
        match self {
            AppError::HttpStatus { status, url } => {
                format!("Upstream request to {} failed with status {}", url, status)
            }
            AppError::Timeout(secs) => {
                format!("Upstream request timed out after {} seconds", secs)
            }
            AppError::NetworkError(msg) => format!("Cannot reach upstream: {}", msg),
            AppError::StoreError(msg) => format!("Target store error: {}", msg),
            _ => self.to_string(),
        }
    }
}
