//! Severity levels and their resolution from configuration strings.

use std::{fmt, str::FromStr};

use super::LoggerError;

/// Ordered severity of a log record.
///
/// `Debug < Info < Warn < Error < Fatal`. A logger configured with a threshold suppresses
/// every record whose severity is lower than the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Diagnostic detail.
    Debug,

    /// Routine operational messages.
    Info,

    /// Something unexpected that the application recovered from.
    Warn,

    /// A failed operation.
    Error,

    /// An unrecoverable condition. Emitting at this level terminates the process.
    Fatal,
}

impl Severity {
    /// All severities, from least to most severe.
    pub const ALL: [Self; 5] = [Self::Debug, Self::Info, Self::Warn, Self::Error, Self::Fatal];

    /// The canonical, upper-case name of the severity.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LoggerError;

    /// Resolves a severity name, ignoring letter case.
    ///
    /// Only `DEBUG`, `INFO`, `WARN`, `ERROR` and `FATAL` are accepted. Any other input fails
    /// with [`LoggerError::UnsupportedLevel`]; no fallback level is returned.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            _ => Err(LoggerError::UnsupportedLevel(name.to_owned())),
        }
    }
}
