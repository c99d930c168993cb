//! The leveled logger underneath [`AssetLog`][crate::AssetLog].

use std::{fmt, sync::Arc};

use super::{encoder::JsonEncoder, level::Severity, sink::FanOutWriter};

/// What happens once a [`Severity::Fatal`] record has been written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FatalAction {
    /// Exit the process with status code 1.
    #[default]
    Exit,

    /// Panic on the calling thread.
    Panic,
}

impl FatalAction {
    fn run(self) {
        match self {
            Self::Exit => std::process::exit(1),
            #[allow(clippy::panic)]
            Self::Panic => panic!("fatal log record emitted"),
        }
    }
}

/// State shared by a logger and every view derived from it.
#[derive(Debug)]
struct Core {
    threshold: Severity,
    encoder: JsonEncoder,
    sink: FanOutWriter,
}

/// A leveled logger writing JSON records to a [`FanOutWriter`].
///
/// Cloning a logger, or deriving a view with [`Logger::with_fields`], is cheap: all of them write
/// through the same shared sink, and each carries its own set of fields.
#[derive(Clone, Debug)]
pub struct Logger {
    core: Arc<Core>,
    fields: Vec<(String, String)>,
    fatal_action: FatalAction,
}

impl Logger {
    /// Creates a logger emitting records of `threshold` severity or higher to `sink`.
    pub fn new(threshold: Severity, sink: FanOutWriter) -> Self {
        Self {
            core: Arc::new(Core {
                threshold,
                encoder: JsonEncoder::new(),
                sink,
            }),
            fields: Vec::new(),
            fatal_action: FatalAction::default(),
        }
    }

    /// The minimum severity emitted.
    pub fn threshold(&self) -> Severity {
        self.core.threshold
    }

    /// Whether records of `severity` are emitted.
    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.core.threshold
    }

    /// Derives a view with additional fields attached to every record.
    ///
    /// A field named like one already attached replaces its value in the view. The original
    /// logger is left untouched.
    #[must_use]
    pub fn with_fields<K, V>(&self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut view = self.clone();
        for (key, value) in fields {
            let (key, value) = (key.into(), value.into());
            match view.fields.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, existing)) => *existing = value,
                None => view.fields.push((key, value)),
            }
        }
        view
    }

    /// Derives a view ending [`Severity::Fatal`] records with `action`.
    #[must_use]
    pub fn with_fatal_action(mut self, action: FatalAction) -> Self {
        self.fatal_action = action;
        self
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &FanOutWriter {
        &self.core.sink
    }

    /// The fields attached to every record of this view.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Emits a record, if `severity` is at or above the threshold.
    ///
    /// Encoding and write failures are not reported to the caller. After a
    /// [`Severity::Fatal`] record, the configured [`FatalAction`] runs.
    pub fn log(&self, severity: Severity, message: fmt::Arguments<'_>) {
        if self.enabled(severity) {
            let message = message
                .as_str()
                .map_or_else(|| message.to_string(), ToOwned::to_owned);

            match self.core.encoder.encode(severity, &message, &self.fields) {
                Ok(record) => {
                    let _ = self.core.sink.write_record(&record);
                }
                Err(error) => tracing::debug!("Failed to encode log record: {error}"),
            }
        }

        if severity == Severity::Fatal {
            self.fatal_action.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;

    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    use super::*;
    use crate::sink::tests::SharedBuffer;

    fn capturing(threshold: Severity) -> (Logger, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let sink = FanOutWriter::new([BoxMakeWriter::new(buffer.clone())]);
        (Logger::new(threshold, sink), buffer)
    }

    #[test]
    fn suppresses_records_below_threshold() {
        let (logger, buffer) = capturing(Severity::Warn);

        logger.log(Severity::Debug, format_args!("debug"));
        logger.log(Severity::Info, format_args!("info"));
        logger.log(Severity::Warn, format_args!("warn"));
        logger.log(Severity::Error, format_args!("error {}", 42));

        let records = buffer.lines();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["level"], "WARN");
        assert_eq!(records[1]["level"], "ERROR");
        assert_eq!(records[1]["message"], "error 42");
    }

    #[test]
    fn views_do_not_alter_the_original() {
        let (logger, buffer) = capturing(Severity::Debug);

        let view = logger.with_fields([("request_id", "abc123")]);
        view.log(Severity::Info, format_args!("from view"));
        logger.log(Severity::Info, format_args!("from original"));

        assert_eq!(logger.fields().count(), 0);
        assert_eq!(view.fields().collect::<Vec<_>>(), vec![("request_id", "abc123")]);

        let records = buffer.lines();
        assert_eq!(records[0]["request_id"], "abc123");
        assert!(records[1].get("request_id").is_none());
    }

    #[test]
    fn later_fields_replace_earlier_ones() {
        let (logger, _) = capturing(Severity::Debug);

        let view = logger
            .with_fields([("request_id", "first")])
            .with_fields([("request_id", "second"), ("user_id", "u1")]);

        assert_eq!(
            view.fields().collect::<Vec<_>>(),
            vec![("request_id", "second"), ("user_id", "u1")]
        );
    }

    #[test]
    #[should_panic(expected = "fatal log record emitted")]
    fn fatal_runs_the_fatal_action() {
        let (logger, _) = capturing(Severity::Debug);
        logger
            .with_fatal_action(FatalAction::Panic)
            .log(Severity::Fatal, format_args!("goodbye"));
    }

    #[test]
    fn fatal_is_written_before_the_fatal_action() {
        let (logger, buffer) = capturing(Severity::Fatal);
        let logger = logger.with_fatal_action(FatalAction::Panic);

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            logger.log(Severity::Fatal, format_args!("bye"));
        }));

        assert!(result.is_err());
        let records = buffer.lines();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "FATAL");
        assert_eq!(records[0]["message"], "bye");
    }
}
