//! OpenAPI Deprecation Notify
//!
//! Detects calls to deprecated OpenAPI operations and query parameters from
//! the client side, and reports each deprecation once per notification sink.
//!
//! # Features
//!
//! - **Operation Detection**: `deprecated: true` on the called operation
//! - **Parameter Detection**: deprecated query parameters actually sent
//! - **Header Timestamps**: Deprecation (RFC 9745) and Sunset (RFC 8594) dates
//! - **Log Sink**: One alert line per detection in a log file
//! - **Slack Sink**: Webhook message, de-duplicated via a local history
//! - **Jira Sink**: One open issue per deprecation, merging new parameters
//!
//! # Example Configuration
//!
//! ```yaml
//! detection:
//!   enabled: true
//!   custom_headers: [x-api-warn]
//! log:
//!   file: deprecation.log
//! slack:
//!   webhook_url: https://hooks.slack.com/services/T000/B000/XXXX
//!   history_file: slack_messages.json
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod event;
pub mod headers;
pub mod http;
pub mod metrics;
pub mod monitor;
pub mod openapi;
pub mod sinks;

pub use config::DeprecationConfig;
pub use detection::{are_parameters_deprecated, is_operation_deprecated};
pub use error::{DeprecationError, Result};
pub use event::DeprecationEvent;
pub use monitor::{DeprecationMonitor, ObservedRequest};
pub use openapi::OpenApiDocument;
pub use sinks::Notifier;
