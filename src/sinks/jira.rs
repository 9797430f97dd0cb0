//! Jira sink: one open issue per deprecation, found through a JQL search.
//!
//! The remote tracker is the de-duplication store. An issue matches an
//! event when issue type, project, URL and HTTP method agree, it is not
//! done, and (when the event carries them) the deprecation and sunset
//! instants fall in the same minute. Parameter-level events that match an
//! existing issue get their missing parameters merged into its label field.

use crate::config::JiraConfig;
use crate::error::{DeprecationError, Result};
use crate::event::DeprecationEvent;
use crate::http::{HttpClient, HttpRequest};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

const SERVER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const JQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    server_time: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Identifiers of a newly created issue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

/// Creates and updates deprecation issues through the Jira REST API.
pub struct JiraSink {
    config: JiraConfig,
    client: Arc<dyn HttpClient>,
}

impl JiraSink {
    /// Computes the Basic auth credential unless the configuration already
    /// carries one.
    pub fn new(mut config: JiraConfig, client: Arc<dyn HttpClient>) -> Self {
        if config.basic_auth().is_none() {
            config.create_basic_auth();
        }
        Self { config, client }
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    /// Recompute the cached credential, e.g. after rotating the API token.
    pub fn refresh_auth(&mut self) {
        self.config.create_basic_auth();
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
            (
                "Authorization".to_string(),
                format!("Basic {}", self.config.basic_auth().unwrap_or_default()),
            ),
        ]
    }

    /// Offset of the Jira server clock.
    async fn server_offset(&self) -> Result<FixedOffset> {
        let url = format!("{}/3/serverInfo", self.config.api_base());
        let response = self
            .client
            .request(HttpRequest::get(&url).with_headers(&self.headers()))
            .await?
            .error_for_status(&url, "jira server info")?;

        let info: ServerInfo = response.json()?;
        let server_time = DateTime::parse_from_str(&info.server_time, SERVER_TIME_FORMAT)
            .map_err(|e| DeprecationError::InvalidTimestamp {
                value: info.server_time.clone(),
                reason: e.to_string(),
            })?;
        Ok(*server_time.offset())
    }

    /// Whether an open issue already tracks `event`.
    ///
    /// When the event has parameters and an issue matches, parameters missing
    /// from the first matching issue are added to it in one update.
    pub async fn issue_exists(&self, event: &DeprecationEvent) -> Result<bool> {
        let offset = self.server_offset().await?;
        let jql = build_search_jql(&self.config, event, &offset);
        debug!(jql = %jql, "Searching Jira for deprecation issue");

        let url = format!("{}/3/search/jql", self.config.api_base());
        let response = self
            .client
            .request(
                HttpRequest::get(&url)
                    .with_headers(&self.headers())
                    .with_query("jql", jql)
                    .with_query("fields", "*all"),
            )
            .await?
            .error_for_status(&url, "jira search")?;

        let search: SearchResponse = response.json()?;
        let method_field = &self.config.fields.http_method.id;
        let issues: Vec<Issue> = search
            .issues
            .into_iter()
            .filter(|issue| method_matches(issue, method_field, event.method()))
            .collect();

        let Some(issue) = issues.first() else {
            return Ok(false);
        };

        if let Some(params) = event.parameters() {
            let existing = issue_labels(issue, &self.config.fields.parameters.id);
            let missing: Vec<&String> = params.iter().filter(|p| !existing.contains(p)).collect();
            if !missing.is_empty() {
                self.add_parameters(&issue.id, &missing).await?;
            }
        }

        Ok(true)
    }

    async fn add_parameters(&self, issue_id: &str, params: &[&String]) -> Result<()> {
        let url = format!("{}/3/issue/{}", self.config.api_base(), issue_id);
        let additions: Vec<Value> = params.iter().map(|p| json!({ "add": p })).collect();

        let mut update = Map::new();
        update.insert(
            self.config.fields.parameters.id.clone(),
            Value::Array(additions),
        );

        self.client
            .request(
                HttpRequest::put(&url)
                    .with_headers(&self.headers())
                    .with_json(json!({ "update": update })),
            )
            .await?
            .error_for_status(&url, "jira issue update")?;

        info!(issue_id = %issue_id, parameters = ?params, "Added deprecated parameters to Jira issue");
        Ok(())
    }

    /// Create an issue for `event`. Does not check for duplicates.
    pub async fn create_issue(&self, event: &DeprecationEvent) -> Result<CreatedIssue> {
        let url = format!("{}/3/issue", self.config.api_base());
        let response = self
            .client
            .request(
                HttpRequest::post(&url)
                    .with_headers(&self.headers())
                    .with_json(build_issue_payload(&self.config, event)),
            )
            .await?
            .error_for_status(&url, "jira issue create")?;

        let created: CreatedIssue = response.json()?;
        info!(key = %created.key, url = %event.url(), "Created Jira deprecation issue");
        Ok(created)
    }
}

fn method_matches(issue: &Issue, field_id: &str, method: &str) -> bool {
    issue
        .fields
        .get(field_id)
        .and_then(Value::as_str)
        .map(|value| value.trim().eq_ignore_ascii_case(method))
        .unwrap_or(false)
}

fn issue_labels(issue: &Issue, field_id: &str) -> Vec<String> {
    issue
        .fields
        .get(field_id)
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Escape a value for use inside a double-quoted JQL string.
fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// JQL selecting open issues that track `event`.
///
/// The method clause uses `~`, the only operator Jira accepts on short
/// text fields; exact matching happens after the search.
pub fn build_search_jql(
    config: &JiraConfig,
    event: &DeprecationEvent,
    server_offset: &FixedOffset,
) -> String {
    let fields = &config.fields;
    let mut jql = format!(
        "type = {} AND project = {} AND \"{}[url field]\" = \"{}\" AND \"{}[short text]\" ~ \"{}\" AND status != Done",
        config.issue_type.key,
        config.project.key,
        fields.url.name.to_lowercase(),
        escape_jql(event.url()),
        fields.http_method.name.to_lowercase(),
        escape_jql(event.method()),
    );

    let windows = [
        (event.deprecation(), &fields.deprecation.name),
        (event.sunset(), &fields.sunset.name),
    ];
    for (instant, name) in windows {
        if let Some(instant) = instant {
            let at = instant.with_timezone(server_offset).format(JQL_TIME_FORMAT);
            let clause = format!("\"{}[time stamp]\"", name.to_lowercase());
            jql.push_str(&format!(
                " AND {clause} >= \"{at}\" AND {clause} <= \"{at}\""
            ));
        }
    }

    if !event.has_parameters() {
        jql.push_str(&format!(
            " AND \"{}[labels]\" is EMPTY",
            fields.parameters.name.to_lowercase()
        ));
    }

    jql
}

/// Create-issue payload for `event`.
pub fn build_issue_payload(config: &JiraConfig, event: &DeprecationEvent) -> Value {
    let summary = if event.has_parameters() {
        format!(
            "At least one parameter of the API endpoint {} is deprecated.",
            event.url()
        )
    } else {
        format!("The API endpoint {} is deprecated.", event.url())
    };

    let fields = &config.fields;
    let mut payload = Map::new();
    payload.insert(fields.url.id.clone(), json!(event.url()));
    payload.insert(
        fields.deprecation.id.clone(),
        json!(event.deprecation().map(|ts| ts.to_rfc3339())),
    );
    payload.insert(
        fields.sunset.id.clone(),
        json!(event.sunset().map(|ts| ts.to_rfc3339())),
    );
    payload.insert(fields.http_method.id.clone(), json!(event.method()));
    payload.insert(fields.parameters.id.clone(), json!(event.parameters()));
    payload.insert("issuetype".to_string(), json!({ "name": config.issue_type.key }));
    payload.insert("project".to_string(), json!({ "key": config.project.key }));
    payload.insert("summary".to_string(), json!(summary));

    json!({ "fields": payload })
}
