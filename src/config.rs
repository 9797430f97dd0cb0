//! Configuration for deprecation detection and notification sinks.
//!
//! A single [`DeprecationConfig`] is built at startup (usually from YAML) and
//! handed to the components that need it.

use crate::headers::{DEPRECATION_HEADER, SUNSET_HEADER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeprecationConfig {
    /// Detection settings
    #[serde(default)]
    pub detection: DetectionSettings,

    /// Log file sink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,

    /// Slack webhook sink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,

    /// Jira issue sink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira: Option<JiraConfig>,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DeprecationConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(log) = &self.log {
            log.validate()?;
        }
        if let Some(slack) = &self.slack {
            slack.validate()?;
        }
        if let Some(jira) = &self.jira {
            jira.validate()?;
        }
        Ok(())
    }

    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.detection.enabled = enabled;
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection.enabled
    }

    /// Replace the custom deprecation header names.
    pub fn set_custom_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detection.custom_headers = headers.into_iter().map(Into::into).collect();
    }

    /// Add custom deprecation header names to the existing ones.
    pub fn add_custom_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detection
            .custom_headers
            .extend(headers.into_iter().map(Into::into));
    }

    /// All header names consulted for deprecation signals.
    pub fn deprecation_headers(&self) -> Vec<String> {
        self.detection.deprecation_headers()
    }

    /// Update sink configurations. A `None` argument leaves that sink as is.
    pub fn set_sinks(
        &mut self,
        log: Option<LogConfig>,
        slack: Option<SlackConfig>,
        jira: Option<JiraConfig>,
    ) {
        if log.is_some() {
            self.log = log;
        }
        if slack.is_some() {
            self.slack = slack;
        }
        if jira.is_some() {
            self.jira = jira;
        }
    }

    pub fn log(&self) -> Option<&LogConfig> {
        self.log.as_ref()
    }

    pub fn slack(&self) -> Option<&SlackConfig> {
        self.slack.as_ref()
    }

    pub fn jira(&self) -> Option<&JiraConfig> {
        self.jira.as_ref()
    }
}

/// Detection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionSettings {
    /// Whether deprecation detection runs at all (default: off)
    #[serde(default)]
    pub enabled: bool,

    /// Extra header names that carry deprecation information.
    /// `sunset` and `deprecation` are always consulted.
    #[serde(default)]
    pub custom_headers: Vec<String>,

    /// Prefix stripped from request paths before looking them up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

impl DetectionSettings {
    /// Base header names followed by the custom ones, lower-cased and
    /// without duplicates.
    pub fn deprecation_headers(&self) -> Vec<String> {
        let mut names = vec![SUNSET_HEADER.to_string(), DEPRECATION_HEADER.to_string()];
        for header in &self.custom_headers {
            let header = header.trim().to_lowercase();
            if !header.is_empty() && !names.contains(&header) {
                names.push(header);
            }
        }
        names
    }
}

/// Log file sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// File the alerts are appended to
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Logger name written into each line
    #[serde(default = "default_logger_name")]
    pub logger_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            logger_name: default_logger_name(),
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.file.as_os_str().is_empty() {
            anyhow::bail!("Log file path cannot be empty");
        }
        Ok(())
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("deprecation.log")
}

fn default_logger_name() -> String {
    "deprecation_logger".to_string()
}

/// Slack webhook sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook_url: String,

    /// Color bar of the message attachment
    #[serde(default = "default_attachment_color")]
    pub attachment_color: String,

    /// JSON file recording the notifications already sent
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

impl SlackConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            attachment_color: default_attachment_color(),
            history_file: default_history_file(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.webhook_url.is_empty() {
            anyhow::bail!("Slack webhook_url cannot be empty");
        }
        if self.history_file.as_os_str().is_empty() {
            anyhow::bail!("Slack history_file cannot be empty");
        }
        Ok(())
    }
}

fn default_attachment_color() -> String {
    "#fca103".to_string()
}

fn default_history_file() -> PathBuf {
    PathBuf::from("slack_messages.json")
}

/// Jira issue sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraConfig {
    /// REST API base, e.g. https://example.atlassian.net/rest/api
    pub api_url: String,

    pub user_email: String,

    pub api_token: String,

    /// Issue type used for deprecation issues
    pub issue_type: JiraKeyId,

    pub project: JiraKeyId,

    /// Custom fields holding the event data
    pub fields: JiraFields,

    /// Cached `base64(email:token)`
    #[serde(skip)]
    basic_auth: Option<String>,
}

impl JiraConfig {
    pub fn new(
        api_url: impl Into<String>,
        user_email: impl Into<String>,
        api_token: impl Into<String>,
        issue_type: JiraKeyId,
        project: JiraKeyId,
        fields: JiraFields,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            user_email: user_email.into(),
            api_token: api_token.into(),
            issue_type,
            project,
            fields,
            basic_auth: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("Jira api_url cannot be empty");
        }
        if self.user_email.is_empty() || self.api_token.is_empty() {
            anyhow::bail!("Jira user_email and api_token are required");
        }
        if self.issue_type.key.is_empty() || self.project.key.is_empty() {
            anyhow::bail!("Jira issue_type and project keys cannot be empty");
        }
        for (label, field) in self.fields.all() {
            if field.id.is_empty() || field.name.is_empty() {
                anyhow::bail!("Jira field '{}' needs both an id and a name", label);
            }
        }
        Ok(())
    }

    /// Compute and cache the Basic auth credential.
    pub fn create_basic_auth(&mut self) -> &str {
        use base64::Engine;

        let auth_string = format!("{}:{}", self.user_email, self.api_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(auth_string);
        self.basic_auth.insert(encoded).as_str()
    }

    /// The cached credential, if computed.
    pub fn basic_auth(&self) -> Option<&str> {
        self.basic_auth.as_deref()
    }

    /// API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// A Jira entity referenced by key and numeric id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraKeyId {
    pub key: String,
    #[serde(default)]
    pub id: String,
}

/// A Jira custom field: `id` is used in payloads, `name` in JQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraField {
    pub id: String,
    pub name: String,
}

impl JiraField {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Custom fields for each part of a deprecation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraFields {
    pub url: JiraField,
    pub deprecation: JiraField,
    pub sunset: JiraField,
    pub http_method: JiraField,
    pub parameters: JiraField,
}

impl JiraFields {
    fn all(&self) -> [(&'static str, &JiraField); 5] {
        [
            ("url", &self.url),
            ("deprecation", &self.deprecation),
            ("sunset", &self.sunset),
            ("http_method", &self.http_method),
            ("parameters", &self.parameters),
        ]
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Prefix for metric names
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: default_metrics_prefix(),
        }
    }
}

fn default_metrics_prefix() -> String {
    "openapi_deprecation".to_string()
}
