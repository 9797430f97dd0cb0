//! Deprecation and sunset timestamps from HTTP response headers.
//!
//! Understands the common encodings of these headers:
//! - Deprecation header (RFC 9745): `@<unix seconds>` or the legacy `true`
//! - Sunset header (RFC 8594): an HTTP-date
//! - RFC 3339 timestamps, which some servers send instead

use crate::config::DetectionSettings;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Name of the standard deprecation header.
pub const DEPRECATION_HEADER: &str = "deprecation";

/// Name of the standard sunset header.
pub const SUNSET_HEADER: &str = "sunset";

/// Deprecation signals read from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationHeaders {
    pub deprecation: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
}

impl DeprecationHeaders {
    /// Read deprecation headers from a response.
    ///
    /// Header names are compared case-insensitively. The deprecation instant
    /// comes from the `deprecation` header and then from each configured
    /// custom header in turn; the first parseable value wins.
    pub fn from_response<K, V>(headers: &[(K, V)], settings: &DetectionSettings) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut result = Self::default();

        if let Some(value) = find_header(headers, SUNSET_HEADER) {
            result.sunset = parse_http_date(value);
            if result.sunset.is_none() {
                debug!(value = %value, "Ignoring unparseable sunset header");
            }
        }

        for name in settings.deprecation_headers() {
            if name == SUNSET_HEADER {
                continue;
            }
            let Some(value) = find_header(headers, &name) else {
                continue;
            };
            if result.deprecation.is_none() {
                result.deprecation = parse_deprecation_value(value);
                if result.deprecation.is_none() && !value.trim().eq_ignore_ascii_case("true") {
                    debug!(header = %name, value = %value, "Ignoring unparseable deprecation header");
                }
            }
        }

        result
    }
}

fn find_header<'a, K, V>(headers: &'a [(K, V)], name: &str) -> Option<&'a str>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .iter()
        .find(|(k, _)| k.as_ref().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_ref())
}

fn structured_timestamp() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^@(-?\d+)$").expect("valid structured timestamp pattern"))
}

/// Parse a deprecation header value.
///
/// Accepts `@<unix seconds>`, an HTTP-date or RFC 3339. Returns `None` for
/// `true` and for anything unparseable.
pub fn parse_deprecation_value(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Some(captures) = structured_timestamp().captures(value) {
        let seconds: i64 = captures[1].parse().ok()?;
        return DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| dt.fixed_offset());
    }

    parse_http_date(value)
}

/// Parse an HTTP date (RFC 7231), falling back to RFC 3339.
/// Example: Sun, 06 Nov 1994 08:49:37 GMT
pub fn parse_http_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Some(without_tz) = s.strip_suffix(" GMT") {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_tz, "%a, %d %b %Y %H:%M:%S") {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    DateTime::parse_from_rfc3339(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DetectionSettings {
        DetectionSettings {
            enabled: true,
            custom_headers: vec!["X-API-Warn".to_string()],
            base_path: None,
        }
    }

    #[test]
    fn test_structured_deprecation_value() {
        let parsed = parse_deprecation_value("@1688169599").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2023-06-30T23:59:59+00:00");
    }

    #[test]
    fn test_legacy_true_has_no_instant() {
        assert!(parse_deprecation_value("true").is_none());
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Sun, 01 Jun 2025 12:00:00 GMT").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T12:00:00+00:00");

        // Also works with ISO 8601
        let parsed_iso = parse_http_date("2025-06-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed_iso.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_from_response_standard_headers() {
        let headers = vec![
            ("Deprecation", "@1688169599"),
            ("Sunset", "Sun, 01 Jun 2025 12:00:00 GMT"),
            ("Content-Type", "application/json"),
        ];
        let parsed = DeprecationHeaders::from_response(&headers, &settings());
        assert!(parsed.deprecation.is_some());
        assert_eq!(parsed.sunset.unwrap().to_rfc3339(), "2025-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_custom_header_fallback() {
        let headers = vec![
            ("deprecation", "true".to_string()),
            ("x-api-warn", "2024-03-01T00:00:00Z".to_string()),
        ];
        let parsed = DeprecationHeaders::from_response(&headers, &settings());
        assert_eq!(
            parsed.deprecation.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert!(parsed.sunset.is_none());
    }

    #[test]
    fn test_no_deprecation_headers() {
        let headers: Vec<(String, String)> = vec![("Server".to_string(), "nginx".to_string())];
        let parsed = DeprecationHeaders::from_response(&headers, &settings());
        assert_eq!(parsed, DeprecationHeaders::default());
    }

    #[test]
    fn test_garbage_values_ignored() {
        let headers = vec![("Sunset", "soon"), ("Deprecation", "@abc")];
        let parsed = DeprecationHeaders::from_response(&headers, &settings());
        assert!(parsed.deprecation.is_none());
        assert!(parsed.sunset.is_none());
    }
}
