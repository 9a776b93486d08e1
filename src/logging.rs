//! Logger factory: one process-wide `tracing` subscriber, selected by environment.
//!
//! `LOCAL` gets a human-readable console line:
//! `2024-05-01 12:00:00 | ingestion_service | INFO | message key=value`.
//! `CLOUD` gets one JSON object per line on stdout, in the shape Google Cloud
//! Logging ingests as structured entries (`severity`, `message`, labels).
//!
//! `init` is idempotent: the first call installs the subscriber, later calls
//! return the sink that was chosen without attaching anything again.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Local, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::{self, AppEnv};

/// Cloud Logging promotes this key to entry labels.
const LABELS_KEY: &str = "logging.googleapis.com/labels";

/// Which output the process logs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Console,
    CloudJson,
}

impl LogSink {
    pub fn for_env(env: AppEnv) -> Self {
        match env {
            AppEnv::Local => Self::Console,
            AppEnv::Cloud => Self::CloudJson,
        }
    }
}

static INSTALLED: OnceLock<LogSink> = OnceLock::new();

/// Install the process-wide subscriber for `service` and return its sink.
///
/// An unparseable `APP_ENV` falls back to the console sink; configuration
/// validation reports it properly once settings are loaded.
pub fn init(service: &str) -> LogSink {
    *INSTALLED.get_or_init(|| {
        let env = AppEnv::from_lookup(&|key: &str| std::env::var(key).ok())
            .unwrap_or(AppEnv::Local);
        let sink = LogSink::for_env(env);
        install(service, sink);
        sink
    })
}

fn install(service: &str, sink: LogSink) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // A subscriber installed by the embedding process (or a test harness) wins.
    let _ = match sink {
        LogSink::Console => builder.event_format(ConsoleFormat::new(service)).try_init(),
        LogSink::CloudJson => builder
            .with_ansi(false)
            .with_writer(std::io::stdout)
            .event_format(CloudJsonFormat::new(service))
            .try_init(),
    };
}

// ═══════════════════════════════════════════════════════════
// Console format
// ═══════════════════════════════════════════════════════════

pub struct ConsoleFormat {
    service: String,
}

impl ConsoleFormat {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormat
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
            "{} | {} | {} | ",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.service,
            event.metadata().level()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// ═══════════════════════════════════════════════════════════
// Cloud Logging JSON format
// ═══════════════════════════════════════════════════════════

pub struct CloudJsonFormat {
    service: String,
}

impl CloudJsonFormat {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

/// Map a `tracing` level onto Cloud Logging's `LogSeverity` names.
pub fn severity(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG | Level::TRACE => "DEBUG",
    }
}

impl<S, N> FormatEvent<S, N> for CloudJsonFormat
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
        let meta = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut entry = Map::new();
        entry.insert("severity".into(), Value::from(severity(meta.level())));
        entry.insert(
            "message".into(),
            Value::from(fields.message.take().unwrap_or_default()),
        );
        entry.insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
        entry.insert("target".into(), Value::from(meta.target()));
        entry.insert(
            LABELS_KEY.into(),
            serde_json::json!({ "service": self.service }),
        );
        if let Some(scope) = ctx.event_scope() {
            let spans: Vec<Value> = scope.from_root().map(|s| Value::from(s.name())).collect();
            entry.insert("spans".into(), Value::Array(spans));
        }
        for (key, value) in fields.values {
            entry.entry(key).or_insert(value);
        }

        let line = serde_json::to_string(&Value::Object(entry)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Map<String, Value>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.values.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::from(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }
}

// ═══════════════════════════════════════════════════════════
// Test support
// ═══════════════════════════════════════════════════════════

/// Capture everything logged on the current thread while `f` runs.
#[cfg(test)]
pub(crate) fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .with_writer(move || writer.clone())
        .event_format(ConsoleFormat::new("test"))
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = capture.0.lock().unwrap().clone();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}
