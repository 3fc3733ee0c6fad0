//! Logging setup built on `tracing-subscriber`.
//!
//! `RUST_LOG` wins over the configured level when it is set; per-target
//! filters from the configuration are added on top.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! LoggingBuilder::new()
//!     .with_level(Level::DEBUG)
//!     .directive("bronze_transport=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Which span lifecycle events are logged.
///
/// The dispatcher wraps each event in a `dispatch` span, so
/// [`LIFECYCLE`](Self::LIFECYCLE) shows when every dispatch starts and ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from configuration. Returns false when a global
/// subscriber was already installed.
pub fn init_from_config(config: &LoggingConfig) -> bool {
    LoggingBuilder::from_config(config).try_init().is_ok()
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A builder for the global subscriber.
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: tracing::Level,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            level: tracing::Level::INFO,
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            file_path: None,
            rotation: LogRotation::Never,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.level.to_tracing_level())
            .format(config.format)
            .output(config.output)
            .span_events(SpanEvents::from(&config.span_events))
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location)
            .rotation(config.rotation);

        builder.file_path.clone_from(&config.file_path);
        for (target, level) in &config.filters {
            builder = builder.directive(&format!("{target}={level}"));
        }
        builder
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `bronze_onebot=trace`. Invalid
    /// directives are skipped.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Log file for [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base_filter = self.level.to_string().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }

        filter
    }

    fn file_appender(&self, path: &Path) -> tracing_appender::rolling::RollingFileAppender {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| OsStr::new("bronze.log"));
        match self.rotation {
            LogRotation::Never => tracing_appender::rolling::never(dir, name),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, name),
            LogRotation::Daily => tracing_appender::rolling::daily(dir, name),
        }
    }

    fn writer(&self) -> BoxMakeWriter {
        match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => BoxMakeWriter::new(self.file_appender(path)),
            (LogOutput::Stdout | LogOutput::File, _) => BoxMakeWriter::new(std::io::stdout),
        }
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(self.writer())
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
            // Without `json-log`, JSON falls back to the full format.
            _ => layer.boxed(),
        }
    }

    /// Installs the subscriber, ignoring the error if one already exists.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(self.fmt_layer())
            .with(self.build_filter())
            .try_init()?;

        if self.output == LogOutput::File && self.file_path.is_none() {
            warn!("File output requested but no file path configured, logging to stdout");
        }
        Ok(())
    }
}
