//! Subscriber installation.
//!
//! The engine only emits `tracing` events and never installs a subscriber on
//! its own. Hosts either mirror a [`LoggingConfig`]:
//!
//! ```rust,ignore
//! let config = blockbot_runtime::config::load_config()?;
//! blockbot_runtime::logging::init_from_config(&config.logging);
//! ```
//!
//! or assemble one by hand:
//!
//! ```rust,ignore
//! use blockbot_runtime::{config::SpanEventConfig, logging::LoggingBuilder};
//!
//! LoggingBuilder::new()
//!     .directive("blockbot_framework=trace")
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .init();
//! ```
//!
//! `RUST_LOG`, when set, replaces the base level. Directives apply on top of
//! either.

use std::path::PathBuf;

use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn fmt_span(events: SpanEventConfig) -> FmtSpan {
    let mut span = FmtSpan::NONE;
    for (on, flag) in [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ] {
        if on {
            span |= flag;
        }
    }
    span
}

/// Installs a global subscriber mirroring `config`.
///
/// A subscriber installed earlier is left in place.
pub fn init_from_config(config: &LoggingConfig) {
    LoggingBuilder::from_config(config).init();
}

/// Where the formatted lines end up once the file setting is resolved.
enum Sink {
    Stdout,
    Stderr,
    File(tracing_appender::rolling::RollingFileAppender),
}

/// Builder for the global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    directives: Vec<String>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact lines on stdout at `info`.
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .collect();
        // HashMap iteration order is unstable.
        directives.sort();

        Self {
            config: config.clone(),
            directives,
        }
    }

    pub fn level(mut self, level: crate::config::LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Adds a filter directive such as `blockbot_runtime=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.config.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Sends lines to `path`, creating it if needed.
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self
    }

    pub fn stderr(mut self) -> Self {
        self.config.output = LogOutput::Stderr;
        self
    }

    fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));
        for directive in self.directives.iter().filter_map(|d| d.parse().ok()) {
            filter = filter.add_directive(directive);
        }
        filter
    }

    /// Resolves the output. `false` means a file was requested without a path.
    fn sink(&self) -> (Sink, bool) {
        match (self.config.output, &self.config.file_path) {
            (LogOutput::Stdout, _) => (Sink::Stdout, true),
            (LogOutput::Stderr, _) => (Sink::Stderr, true),
            (LogOutput::File, Some(path)) => {
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or(std::path::Path::new("."));
                match path.file_name() {
                    Some(name) => (
                        Sink::File(tracing_appender::rolling::never(dir, name)),
                        true,
                    ),
                    None => (Sink::Stdout, false),
                }
            }
            (LogOutput::File, None) => (Sink::Stdout, false),
        }
    }

    fn layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(fmt_span(self.config.span_events))
            .with_thread_ids(self.config.thread_ids)
            .with_file(self.config.file_location)
            .with_line_number(self.config.file_location);

        match self.config.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }

    /// Installs the subscriber unless one is already installed.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (sink, resolved) = self.sink();
        let layer = match sink {
            Sink::Stdout => self.layer(std::io::stdout),
            Sink::Stderr => self.layer(std::io::stderr),
            Sink::File(appender) => self.layer(appender),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(self.filter())
            .try_init()?;

        if !resolved {
            warn!(path = ?self.config.file_path, "Log file unusable, logging to stdout");
        }
        Ok(())
    }
}
