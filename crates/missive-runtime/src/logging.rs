//! Logging setup for Missive applications.
//!
//! The dispatch core only emits `tracing` events and spans; this module
//! installs a `tracing-subscriber` to render them. Every `send` runs in a
//! `send` span with one child span per chain link, and every `publish` runs in
//! a `publish` span with one child span per notification handler, so span
//! events are the easiest way to watch a pipeline execute.
//!
//! ```rust,ignore
//! use missive_runtime::logging::{self, LoggingBuilder, SpanEvents};
//!
//! // From the `[logging]` section of the configuration
//! logging::init_from_config(&config.logging);
//!
//! // Or by hand
//! LoggingBuilder::new()
//!     .directive("missive_core=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::borrow::Cow;
use std::ops::BitOr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "missive.log";

// =============================================================================
// Span events
// =============================================================================

/// The span transitions written as log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents(u8);

impl SpanEvents {
    /// No span events; only regular events are logged.
    pub const NONE: Self = Self(0);
    /// A span was created.
    pub const NEW: Self = Self(1);
    /// A span was entered. Fires on every poll of an instrumented future.
    pub const ENTER: Self = Self(1 << 1);
    /// A span was exited.
    pub const EXIT: Self = Self(1 << 2);
    /// A span was closed, with its busy and idle time.
    pub const CLOSE: Self = Self(1 << 3);

    /// One line when a call or chain link starts and one, with busy/idle
    /// timings, when it completes.
    pub const LIFECYCLE: Self = Self::NEW.and(Self::CLOSE);
    /// Every enter and exit. Noisy, since async spans are re-entered on each
    /// poll.
    pub const ACTIVE: Self = Self::ENTER.and(Self::EXIT);
    /// All four events.
    pub const FULL: Self = Self::LIFECYCLE.and(Self::ACTIVE);

    /// The union of both sets.
    pub const fn and(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every event in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn to_fmt_span(self) -> FmtSpan {
        [
            (Self::NEW, FmtSpan::NEW),
            (Self::ENTER, FmtSpan::ENTER),
            (Self::EXIT, FmtSpan::EXIT),
            (Self::CLOSE, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(event, _)| self.contains(*event))
        .fold(FmtSpan::NONE, |span, (_, flag)| span | flag)
    }
}

impl BitOr for SpanEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        [
            (config.new, Self::NEW),
            (config.enter, Self::ENTER),
            (config.exit, Self::EXIT),
            (config.close, Self::CLOSE),
        ]
        .into_iter()
        .filter_map(|(enabled, event)| enabled.then_some(event))
        .fold(Self::NONE, Self::and)
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    LoggingBuilder::from_config(config).init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builds and installs the global `tracing` subscriber.
///
/// The base level is replaced by `RUST_LOG` when that variable is set.
/// Directives added with [`directive`](Self::directive), or taken from the
/// config's `filters` table, always apply on top.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    span_events: SpanEvents,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    max_files: usize,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact output to stdout at `INFO`, without span events.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEvents::NONE,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: 5,
        }
    }

    /// Builder mirroring the `[logging]` section of the configuration.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.level.to_tracing_level())
            .format(config.format)
            .output(config.output)
            .span_events(SpanEvents::from(&config.span_events))
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location)
            .rotation(config.rotation)
            .max_files(config.max_files as usize);
        builder.file_path.clone_from(&config.file_path);

        // Map order would make the filter differ between runs.
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        filters
            .into_iter()
            .fold(builder, |builder, (module, level)| {
                builder.directive(&format!("{module}={level}"))
            })
    }

    /// Base level, used when `RUST_LOG` is unset.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `missive_core=trace`. Directives that
    /// fail to parse are ignored.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_owned());
        self
    }

    /// Span transitions to log, see [`SpanEvents`].
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Line format. [`LogFormat::Json`] needs the `json-log` feature.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Destination; [`LogOutput::File`] also needs
    /// [`file_path`](Self::file_path).
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Prefix each line with its module path.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include the id of the thread that emitted each event.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Include the source file of each event.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// Include the source line of each event.
    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Log file used with [`LogOutput::File`]. Rotated files are named after
    /// it, in the same directory.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// How often the log file is rotated. Ignored for stdout and stderr.
    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// How many rotated files to keep; at least one is always kept.
    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    /// Installs the subscriber, ignoring one that is already installed.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    ///
    /// File output that cannot be opened falls back to stdout; the reason is
    /// logged once the subscriber is in place.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (writer, fallback) = self.writer();
        let ansi = !matches!(self.output, LogOutput::File) || fallback.is_some();

        tracing_subscriber::registry()
            .with(self.fmt_layer(writer, ansi))
            .with(self.filter())
            .try_init()?;

        if let Some(reason) = fallback {
            warn!(%reason, "Log file unavailable, writing to stdout");
        }
        #[cfg(not(feature = "json-log"))]
        if matches!(self.format, LogFormat::Json) {
            warn!("JSON logs need the `json-log` feature, using the full format");
        }
        Ok(())
    }

    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_ascii_lowercase()));

        self.directives
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(base, EnvFilter::add_directive)
    }

    fn fmt_layer(
        &self,
        writer: BoxMakeWriter,
        ansi: bool,
    ) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => layer.boxed(),
            LogFormat::Full => layer.boxed(),
        }
    }

    /// The configured sink, or stdout and the reason the sink was unusable.
    fn writer(&self) -> (BoxMakeWriter, Option<String>) {
        let stdout = || BoxMakeWriter::new(std::io::stdout);

        match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stdout, _) => (stdout(), None),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), None),
            (LogOutput::File, None) => (stdout(), Some("no log file path configured".to_owned())),
            (LogOutput::File, Some(path)) => match self.file_appender(path) {
                Ok(appender) => (BoxMakeWriter::new(appender), None),
                Err(err) => (stdout(), Some(format!("{}: {err}", path.display()))),
            },
        }
    }

    fn file_appender(&self, path: &Path) -> Result<RollingFileAppender, InitError> {
        let directory = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .map_or(Cow::Borrowed(DEFAULT_LOG_FILE), |name| name.to_string_lossy());

        RollingFileAppender::builder()
            .rotation(self.rotation.into())
            .filename_prefix(prefix)
            .max_log_files(self.max_files.max(1))
            .build(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_event_presets() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(SpanEvents::LIFECYCLE.to_fmt_span(), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(SpanEvents::ACTIVE.to_fmt_span(), FmtSpan::ACTIVE);
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
        assert_eq!(SpanEvents::NEW | SpanEvents::CLOSE, SpanEvents::LIFECYCLE);
        assert!(SpanEvents::FULL.contains(SpanEvents::ACTIVE));
        assert!(!SpanEvents::ACTIVE.contains(SpanEvents::CLOSE));
    }

    #[test]
    fn test_span_events_from_config() {
        let config = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(SpanEvents::from(&config), SpanEvents::LIFECYCLE);
        assert_eq!(
            SpanEvents::from(&SpanEventConfig::default()),
            SpanEvents::NONE
        );
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(Rotation::from(LogRotation::Never), Rotation::NEVER);
        assert_eq!(Rotation::from(LogRotation::Daily), Rotation::DAILY);
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            thread_ids: true,
            file_location: true,
            ..Default::default()
        };
        config
            .filters
            .insert("missive_core".into(), LogLevel::Trace);
        config.filters.insert("hyper".into(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config);

        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.with_thread_ids);
        assert!(builder.with_line_number);
        assert_eq!(builder.directives, ["hyper=warn", "missive_core=trace"]);
    }

    #[test]
    fn test_missing_file_path_falls_back_to_stdout() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        let (_, fallback) = builder.writer();
        assert!(fallback.is_some());

        let (_, fallback) = LoggingBuilder::new().output(LogOutput::Stderr).writer();
        assert!(fallback.is_none());
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        LoggingBuilder::new().init();
        init_from_config(&LoggingConfig::default());
    }
}
