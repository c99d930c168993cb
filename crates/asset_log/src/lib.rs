//! `asset_log` is a structured logging facade which attaches request-scoped context values to
//! every record it emits.
//!
//! It offers:
//! - An [`AssetLog`] logger with one plain and one formatting entry point per [`Severity`].
//! - Direct construction ([`AssetLog::new`]) and construction from a YAML configuration file
//!   keyed by [`Environment`] ([`AssetLog::from_config_file`]).
//! - Output to the standard streams and to rotating files, fanned out by a [`FanOutWriter`].
//!
//! Records are written as single-line JSON objects. The [`LogContext`] values named in the
//! logger's configuration are attached to each record as string fields.

mod config;
mod context;
mod encoder;
mod level;
mod logger;
mod sink;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub use self::{
    config::{Environment, LoggerConfig, LoggerConfigs},
    context::{ContextFieldMap, LogContext},
    level::Severity,
    logger::{FatalAction, Logger},
    sink::{FanOutWriter, OutputDestination, RotationPolicy, STDERR, STDOUT},
};

mod keys {
    use std::sync::LazyLock;

    use rustc_hash::FxHashSet;

    pub(crate) const MESSAGE: &str = "message";
    pub(crate) const LEVEL: &str = "level";
    pub(crate) const TIME: &str = "time";
    pub(crate) const HOSTNAME: &str = "hostname";
    pub(crate) const PID: &str = "pid";

    pub(crate) static IMPLICIT_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
        [MESSAGE, LEVEL, TIME, HOSTNAME, PID]
            .iter()
            .copied()
            .collect()
    });
}

/// Errors that can occur while constructing a logger.
///
/// Once constructed, an [`AssetLog`] never reports errors: failures to encode or write a record
/// are swallowed.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The severity name is not one of `DEBUG`, `INFO`, `WARN`, `ERROR` or `FATAL`.
    #[error("Unsupported log level: `{0}`")]
    UnsupportedLevel(String),

    /// No environment name was provided.
    #[error("Environment not set")]
    MissingEnvironment,

    /// The configuration file could not be read.
    #[error("Failed to read logger configuration file `{}`: {source}", .path.display())]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse logger configuration file `{}`: {source}", .path.display())]
    ConfigParse {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The configuration file has no entry for the environment.
    #[error("Logger configuration file has no entry for environment `{0}`")]
    ConfigMissingForEnvironment(Environment),

    /// Represents an error during JSON serialization.
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// A structured logger attaching configured [`LogContext`] values to every record.
///
/// Clones are cheap and write to the same destinations.
///
/// Every severity has two entry points: a plain one taking any [`Display`][fmt::Display] message
/// and a formatting one (suffixed with `f`) taking [`format_args!`] output. The context may be
/// `&LogContext` or `None`.
///
/// # Example
///
/// ```
/// use asset_log::{AssetLog, LogContext};
///
/// let logger = AssetLog::new("info", ["stdout"], ["request_id", "user_id"])?;
/// let ctx = LogContext::new().record("request_id", "abc123");
///
/// // {"message":"hello","level":"INFO",...,"request_id":"abc123","user_id":""}
/// logger.info(&ctx, "hello");
/// logger.infof(&ctx, format_args!("served {} bytes", 512));
///
/// // Below the threshold: nothing is written.
/// logger.debug(&ctx, "not written");
///
/// // Without a context, no fields are attached.
/// logger.warn(None, "no context");
/// # Ok::<(), asset_log::LoggerError>(())
/// ```
///
/// # Fatal records
///
/// Records logged with [`AssetLog::fatal`] or [`AssetLog::fatalf`] are written and then the
/// process exits with status code 1, unless another [`FatalAction`] was chosen with
/// [`AssetLog::with_fatal_action`].
#[derive(Clone, Debug)]
pub struct AssetLog {
    logger: Logger,
    config: Arc<LoggerConfig>,
}

impl AssetLog {
    /// Constructs a logger from a severity name, output identifiers and context field names.
    ///
    /// Output identifiers are `"stdout"`, `"stderr"`, or file paths. Files are rotated with the
    /// default [`RotationPolicy`] and are only opened once the first record is written.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::UnsupportedLevel`] if `level` is not a valid severity name.
    pub fn new(
        level: impl Into<String>,
        output_paths: impl IntoIterator<Item = impl Into<String>>,
        appends: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, LoggerError> {
        Self::from_config(LoggerConfig::new(level, output_paths, appends))
    }

    /// Constructs a logger from the entry of a configuration file selected by `environment`.
    ///
    /// Environment names other than `prod` and `test` select the `dev` entry.
    ///
    /// # Errors
    ///
    /// Returns
    /// - [`LoggerError::MissingEnvironment`] if `environment` is empty, before reading the file,
    /// - [`LoggerError::ConfigRead`] or [`LoggerError::ConfigParse`] if the file cannot be read or
    ///   parsed,
    /// - [`LoggerError::ConfigMissingForEnvironment`] if the file has no entry for the
    ///   environment,
    /// - [`LoggerError::UnsupportedLevel`] if the entry's level is invalid.
    pub fn from_config_file(
        environment: &str,
        path: impl AsRef<Path>,
    ) -> Result<Self, LoggerError> {
        let environment = Environment::from_name(environment)?;
        let config = LoggerConfigs::from_path(path)?.take(environment)?;
        Self::from_config(config)
    }

    /// Constructs a logger from a [`LoggerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::UnsupportedLevel`] if the configured level is invalid.
    pub fn from_config(config: LoggerConfig) -> Result<Self, LoggerError> {
        let threshold = config.level.parse()?;
        let policy = config.rotation_policy();
        let sink = FanOutWriter::from_destinations(
            config
                .output_paths
                .iter()
                .map(|identifier| OutputDestination::resolve(identifier, policy)),
        );

        Ok(Self {
            logger: Logger::new(threshold, sink),
            config: Arc::new(config),
        })
    }

    /// Constructs a logger writing to caller-provided writers instead of resolved output paths.
    ///
    /// The bound configuration has no output paths.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::UnsupportedLevel`] if `level` is not a valid severity name.
    pub fn with_writers(
        level: impl Into<String>,
        writers: impl IntoIterator<Item = BoxMakeWriter>,
        appends: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, LoggerError> {
        let config = LoggerConfig::new(level, Vec::<String>::new(), appends);
        let threshold = config.level.parse()?;

        Ok(Self {
            logger: Logger::new(threshold, FanOutWriter::new(writers)),
            config: Arc::new(config),
        })
    }

    /// Returns a logger ending fatal records with `action` instead of exiting the process.
    #[must_use]
    pub fn with_fatal_action(self, action: FatalAction) -> Self {
        Self {
            logger: self.logger.with_fatal_action(action),
            config: self.config,
        }
    }

    /// The configuration bound to this logger.
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// The minimum severity emitted.
    pub fn level(&self) -> Severity {
        self.logger.threshold()
    }

    /// Derives the view of the underlying logger used for a call with `ctx`.
    ///
    /// The view carries the configured context fields; without a context it carries none.
    pub fn with_context<'c>(&self, ctx: impl Into<Option<&'c LogContext>>) -> Logger {
        self.logger
            .with_fields(ContextFieldMap::from_context(ctx.into(), &self.config.appends))
    }

    fn emit<'c>(
        &self,
        ctx: impl Into<Option<&'c LogContext>>,
        severity: Severity,
        message: fmt::Arguments<'_>,
    ) {
        self.with_context(ctx).log(severity, message);
    }

    /// Logs `message` at [`Severity::Debug`].
    pub fn debug<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, message: impl fmt::Display) {
        self.emit(ctx, Severity::Debug, format_args!("{message}"));
    }

    /// Logs formatted arguments at [`Severity::Debug`].
    pub fn debugf<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, args: fmt::Arguments<'_>) {
        self.emit(ctx, Severity::Debug, args);
    }

    /// Logs `message` at [`Severity::Info`].
    pub fn info<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, message: impl fmt::Display) {
        self.emit(ctx, Severity::Info, format_args!("{message}"));
    }

    /// Logs formatted arguments at [`Severity::Info`].
    pub fn infof<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, args: fmt::Arguments<'_>) {
        self.emit(ctx, Severity::Info, args);
    }

    /// Logs `message` at [`Severity::Warn`].
    pub fn warn<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, message: impl fmt::Display) {
        self.emit(ctx, Severity::Warn, format_args!("{message}"));
    }

    /// Logs formatted arguments at [`Severity::Warn`].
    pub fn warnf<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, args: fmt::Arguments<'_>) {
        self.emit(ctx, Severity::Warn, args);
    }

    /// Logs `message` at [`Severity::Error`].
    pub fn error<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, message: impl fmt::Display) {
        self.emit(ctx, Severity::Error, format_args!("{message}"));
    }

    /// Logs formatted arguments at [`Severity::Error`].
    pub fn errorf<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, args: fmt::Arguments<'_>) {
        self.emit(ctx, Severity::Error, args);
    }

    /// Logs `message` at [`Severity::Fatal`], then runs the [`FatalAction`].
    ///
    /// By default this exits the process.
    pub fn fatal<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, message: impl fmt::Display) {
        self.emit(ctx, Severity::Fatal, format_args!("{message}"));
    }

    /// Logs formatted arguments at [`Severity::Fatal`], then runs the [`FatalAction`].
    ///
    /// By default this exits the process.
    pub fn fatalf<'c>(&self, ctx: impl Into<Option<&'c LogContext>>, args: fmt::Arguments<'_>) {
        self.emit(ctx, Severity::Fatal, args);
    }
}
