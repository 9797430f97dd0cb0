//! Log file sink. Every event is written, no de-duplication.
//!
//! The sink owns a private `tracing` dispatcher whose only layer formats
//! events as `<time> - <logger name> - <LEVEL> - <message>` into the
//! configured file. Alerts never reach the process-wide subscriber.

use crate::config::LogConfig;
use crate::error::{DeprecationError, Result};
use crate::event::DeprecationEvent;
use chrono::Local;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn, Dispatch, Event, Level, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Formats one line per event: `<time> - <logger name> - <LEVEL> - <message>`.
#[derive(Debug, Clone)]
struct AlertFormat {
    logger_name: String,
}

impl<S, N> FormatEvent<S, N> for AlertFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - {} - ",
            Local::now().format(TIME_FORMAT),
            self.logger_name,
            level_name(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Open (or create) the log file as a non-rotating appender.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DeprecationError::Configuration {
            reason: format!("log file path {:?} has no file name", path),
        })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| DeprecationError::Configuration {
            reason: format!("failed to open log file {:?}: {}", path, e),
        })
}

/// Appends one alert line per event to the configured file.
#[derive(Debug)]
pub struct LogSink {
    config: LogConfig,
    dispatch: Dispatch,
}

impl LogSink {
    /// Open (or create) the log file for appending.
    pub fn open(config: LogConfig) -> Result<Self> {
        let appender = file_appender(&config.file)?;
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .event_format(AlertFormat {
                logger_name: config.logger_name.clone(),
            });
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(layer));
        Ok(Self { config, dispatch })
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Write the alert for `event`.
    pub fn write(&self, event: &DeprecationEvent) -> Result<()> {
        let message = alert_message(event);
        tracing::dispatcher::with_default(&self.dispatch, || warn!("{}", message));
        debug!(
            url = %event.url(),
            method = %event.method(),
            file = ?self.config.file,
            "Deprecation alert written"
        );
        Ok(())
    }
}

/// The alert text embedding all event fields.
pub fn alert_message(event: &DeprecationEvent) -> String {
    format!(
        "Deprecation Alert: URL={}, HTTP Method={}, Deprecated Parameters={}, Deprecation Date={}, Sunset Date={}",
        event.url(),
        event.method(),
        event.parameters_display().unwrap_or_else(|| "None".to_string()),
        event
            .deprecation()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "None".to_string()),
        event
            .sunset()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "None".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_alert_message_with_none_tokens() {
        let event = DeprecationEvent::for_operation("https://api.example.com/users", "get");
        assert_eq!(
            alert_message(&event),
            "Deprecation Alert: URL=https://api.example.com/users, HTTP Method=GET, \
             Deprecated Parameters=None, Deprecation Date=None, Sunset Date=None"
        );
    }

    #[test]
    fn test_alert_message_all_fields() {
        let event = DeprecationEvent::new(
            "https://api.example.com/users",
            "GET",
            Some(["sort", "limit"]),
            Some(DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap()),
            Some(DateTime::parse_from_rfc3339("2025-06-01T00:00:00+02:00").unwrap()),
        );
        let message = alert_message(&event);
        assert!(message.contains("Deprecated Parameters=['limit', 'sort']"));
        assert!(message.contains("Deprecation Date=2024-01-01T00:00:00+00:00"));
        assert!(message.contains("Sunset Date=2025-06-01T00:00:00+02:00"));
    }

    #[test]
    fn test_write_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file: dir.path().join("deprecation.log"),
            logger_name: "deprecation_logger".to_string(),
        };
        let sink = LogSink::open(config.clone()).unwrap();
        let event = DeprecationEvent::for_operation("https://api.example.com/users", "GET");

        sink.write(&event).unwrap();
        sink.write(&event).unwrap();

        let content = std::fs::read_to_string(&config.file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" - deprecation_logger - WARNING - Deprecation Alert: URL="));
    }

    #[test]
    fn test_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, "").unwrap();
        let config = LogConfig {
            file: not_a_dir.join("deprecation.log"),
            logger_name: "deprecation_logger".to_string(),
        };
        assert!(LogSink::open(config).is_err());
    }

    #[test]
    fn test_level_comes_from_event() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file: dir.path().join("deprecation.log"),
            logger_name: "api_logger".to_string(),
        };
        let sink = LogSink::open(config.clone()).unwrap();

        tracing::dispatcher::with_default(&sink.dispatch, || {
            tracing::error!("first");
            tracing::info!("second");
        });

        let content = std::fs::read_to_string(&config.file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - api_logger - ERROR - first"));
        assert!(lines[1].ends_with(" - api_logger - INFO - second"));
    }

    #[test]
    fn test_open_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file: dir.path().join("deprecation.log"),
            logger_name: "deprecation_logger".to_string(),
        };
        std::fs::write(&config.file, "earlier line\n").unwrap();

        let sink = LogSink::open(config.clone()).unwrap();
        sink.write(&DeprecationEvent::for_operation("https://api.example.com/users", "GET"))
            .unwrap();

        let content = std::fs::read_to_string(&config.file).unwrap();
        assert!(content.starts_with("earlier line\n"));
        assert_eq!(content.lines().count(), 2);
    }
}
