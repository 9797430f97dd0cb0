//! Deprecation monitor: checks observed requests against an OpenAPI
//! document and notifies the configured sinks.

use crate::config::DeprecationConfig;
use crate::detection::{are_parameters_deprecated, is_operation_deprecated};
use crate::error::{DeprecationError, Result};
use crate::event::DeprecationEvent;
use crate::headers::DeprecationHeaders;
use crate::http::HttpClient;
use crate::metrics::DeprecationMetrics;
use crate::openapi::OpenApiDocument;
use crate::sinks::{NotificationReport, Notifier};
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A request/response pair as seen by the HTTP client.
#[derive(Debug, Clone)]
pub struct ObservedRequest {
    /// URL reported in notifications, without query string
    pub url: String,
    pub method: String,
    /// Path key looked up in the OpenAPI document
    pub path: String,
    /// Names of the query parameters sent
    pub query_params: Vec<String>,
    pub response_headers: Vec<(String, String)>,
}

impl ObservedRequest {
    /// Split an absolute URL into the parts needed for detection.
    ///
    /// `base_path` is removed from the front of the URL path before lookup.
    pub fn from_url(
        method: &str,
        url: &str,
        response_headers: Vec<(String, String)>,
        base_path: Option<&str>,
    ) -> Result<Self> {
        let mut parsed = Url::parse(url).map_err(|e| DeprecationError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut query_params: Vec<String> = Vec::new();
        for (name, _) in parsed.query_pairs() {
            let name = name.into_owned();
            if !query_params.contains(&name) {
                query_params.push(name);
            }
        }

        let full_path = parsed.path().to_string();
        let path = match base_path.map(|b| b.trim_end_matches('/')) {
            Some(base) if !base.is_empty() => match full_path.strip_prefix(base) {
                Some("") => "/".to_string(),
                Some(rest) if rest.starts_with('/') => rest.to_string(),
                _ => full_path.clone(),
            },
            _ => full_path.clone(),
        };

        parsed.set_query(None);
        parsed.set_fragment(None);

        Ok(Self {
            url: parsed.to_string(),
            method: method.to_uppercase(),
            path,
            query_params,
            response_headers,
        })
    }
}

/// A detection together with the sink outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    #[serde(skip)]
    pub event: DeprecationEvent,
    pub report: NotificationReport,
}

/// Checks requests for deprecated operations and parameters.
pub struct DeprecationMonitor {
    config: DeprecationConfig,
    document: OpenApiDocument,
    notifier: Notifier,
    metrics: Arc<DeprecationMetrics>,
}

impl DeprecationMonitor {
    /// Create a monitor. The notifier reports its outcomes to the monitor's
    /// metrics.
    pub fn new(config: DeprecationConfig, document: OpenApiDocument, notifier: Notifier) -> Self {
        let metrics = Arc::new(DeprecationMetrics::new(&config.metrics.prefix));
        let notifier = notifier.with_metrics(metrics.clone());

        info!(
            paths = document.paths.len(),
            enabled = config.detection_enabled(),
            "Deprecation monitor initialized"
        );

        Self {
            config,
            document,
            notifier,
            metrics,
        }
    }

    /// Create a monitor with sinks built from the configuration.
    pub fn from_config(
        config: DeprecationConfig,
        document: OpenApiDocument,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let notifier = Notifier::from_config(&config, client)?;
        Ok(Self::new(config, document, notifier))
    }

    pub fn config(&self) -> &DeprecationConfig {
        &self.config
    }

    /// Get the metrics collector.
    pub fn metrics(&self) -> &DeprecationMetrics {
        &self.metrics
    }

    /// Build an [`ObservedRequest`] using the configured base path.
    pub fn observe(
        &self,
        method: &str,
        url: &str,
        response_headers: Vec<(String, String)>,
    ) -> Result<ObservedRequest> {
        ObservedRequest::from_url(
            method,
            url,
            response_headers,
            self.config.detection.base_path.as_deref(),
        )
    }

    /// Detect deprecations for a request. Returns `None` when detection is
    /// disabled or nothing used by the request is deprecated.
    pub fn inspect(&self, request: &ObservedRequest) -> Result<Option<DeprecationEvent>> {
        if !self.config.detection_enabled() {
            return Ok(None);
        }

        let path = request.path.as_str();
        let method = request.method.as_str();

        let operation_deprecated = is_operation_deprecated(&self.document, path, method)?;
        if operation_deprecated {
            self.metrics.record_detection(method, path, "operation");
        }

        let declares_parameters = self
            .document
            .find_operation(path, method)?
            .parameters
            .is_some();
        let mut parameters = Vec::new();
        if declares_parameters && !request.query_params.is_empty() {
            let (deprecated, names) =
                are_parameters_deprecated(&self.document, path, method, request.query_params.as_slice())?;
            if deprecated {
                self.metrics.record_detection(method, path, "parameter");
                parameters = names;
            }
        }

        if !operation_deprecated && parameters.is_empty() {
            debug!(path = %path, method = %method, "No deprecation detected");
            return Ok(None);
        }

        let headers = DeprecationHeaders::from_response(&request.response_headers, &self.config.detection);
        let event = DeprecationEvent::new(
            request.url.clone(),
            method,
            Some(parameters),
            headers.deprecation,
            headers.sunset,
        );

        info!(
            url = %event.url(),
            method = %event.method(),
            parameters = ?event.parameters(),
            "Deprecated API usage detected"
        );
        Ok(Some(event))
    }

    /// Detect and notify.
    pub async fn process(&self, request: &ObservedRequest) -> Result<Option<Notification>> {
        let Some(event) = self.inspect(request)? else {
            return Ok(None);
        };
        let report = self.notifier.notify(&event).await?;
        Ok(Some(Notification { event, report }))
    }
}
