//! Deprecation events and their persisted history form.
//!
//! A [`DeprecationEvent`] is the identity used for de-duplication by every
//! sink: two events are equal when URL, method, the sorted set of deprecated
//! parameters and both timestamps match.

use crate::error::{DeprecationError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A detected deprecation, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationEvent {
    url: String,
    method: String,
    parameters: Option<Vec<String>>,
    deprecation: Option<DateTime<FixedOffset>>,
    sunset: Option<DateTime<FixedOffset>>,
}

impl DeprecationEvent {
    /// Build an event. The method is upper-cased, parameters are sorted and
    /// de-duplicated, and an empty parameter list is stored as `None`.
    pub fn new<I, S>(
        url: impl Into<String>,
        method: &str,
        parameters: Option<I>,
        deprecation: Option<DateTime<FixedOffset>>,
        sunset: Option<DateTime<FixedOffset>>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parameters = parameters.and_then(|params| {
            let mut params: Vec<String> = params.into_iter().map(Into::into).collect();
            params.sort();
            params.dedup();
            (!params.is_empty()).then_some(params)
        });

        Self {
            url: url.into(),
            method: method.to_uppercase(),
            parameters,
            deprecation,
            sunset,
        }
    }

    /// Event for a deprecated operation without parameter details.
    pub fn for_operation(url: impl Into<String>, method: &str) -> Self {
        Self::new(url, method, None::<Vec<String>>, None, None)
    }

    /// Attach the deprecation and sunset instants.
    pub fn with_timestamps(
        mut self,
        deprecation: Option<DateTime<FixedOffset>>,
        sunset: Option<DateTime<FixedOffset>>,
    ) -> Self {
        self.deprecation = deprecation;
        self.sunset = sunset;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }

    pub fn has_parameters(&self) -> bool {
        self.parameters.is_some()
    }

    pub fn deprecation(&self) -> Option<DateTime<FixedOffset>> {
        self.deprecation
    }

    pub fn sunset(&self) -> Option<DateTime<FixedOffset>> {
        self.sunset
    }

    /// Parameters rendered as a list literal, e.g. `['limit', 'sort']`.
    pub fn parameters_display(&self) -> Option<String> {
        self.parameters.as_ref().map(|params| {
            let quoted: Vec<String> = params.iter().map(|p| format!("'{}'", p)).collect();
            format!("[{}]", quoted.join(", "))
        })
    }
}

/// Plain-field form of an event as stored in the Slack history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub url: String,

    #[serde(rename = "http-method")]
    pub http_method: String,

    #[serde(rename = "deprecated-parameter", default)]
    pub deprecated_parameter: Option<Vec<String>>,

    #[serde(rename = "deprecation-header", default)]
    pub deprecation_header: Option<String>,

    #[serde(rename = "sunset-header", default)]
    pub sunset_header: Option<String>,
}

impl From<&DeprecationEvent> for HistoryRecord {
    fn from(event: &DeprecationEvent) -> Self {
        Self {
            url: event.url.clone(),
            http_method: event.method.clone(),
            deprecated_parameter: event.parameters.clone(),
            deprecation_header: event.deprecation.map(|ts| ts.to_rfc3339()),
            sunset_header: event.sunset.map(|ts| ts.to_rfc3339()),
        }
    }
}

impl TryFrom<HistoryRecord> for DeprecationEvent {
    type Error = DeprecationError;

    fn try_from(record: HistoryRecord) -> Result<Self> {
        Ok(Self::new(
            record.url,
            &record.http_method,
            record.deprecated_parameter,
            record.deprecation_header.as_deref().map(parse_timestamp).transpose()?,
            record.sunset_header.as_deref().map(parse_timestamp).transpose()?,
        ))
    }
}

/// Parse an ISO 8601 timestamp with offset.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).map_err(|e| DeprecationError::InvalidTimestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
