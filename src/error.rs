//! Error types shared by detection, sinks and configuration.

/// Errors raised while detecting or notifying about deprecations.
#[derive(Debug, thiserror::Error)]
pub enum DeprecationError {
    #[error("path {path} not found in the OpenAPI specification")]
    PathNotFound { path: String },

    #[error("method {method} for path {path} not found in the OpenAPI specification")]
    MethodNotFound { path: String, method: String },

    #[error("no parameters found for {path} with method {method} in the OpenAPI specification")]
    ParametersNotFound { path: String, method: String },

    #[error("HTTP request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: u16,
        url: String,
        operation: &'static str,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("YAML error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("invalid timestamp `{value}`: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl DeprecationError {
    /// Whether the error means the OpenAPI document lacks the requested
    /// path, method or parameter list.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound { .. }
                | Self::MethodNotFound { .. }
                | Self::ParametersNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DeprecationError>;
