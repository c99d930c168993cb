//! Encodes log records as single-line JSON objects.

use serde::ser::{SerializeMap, Serializer};
use time::format_description::well_known::Iso8601;

use super::{keys, level::Severity, LoggerError};

/// Produces the fixed, machine-parseable record format shared by every destination.
///
/// Each record is a compact JSON object carrying the implicit keys (`message`, `level`, `time`,
/// `hostname`, `pid`) followed by the record's fields, terminated by a newline.
#[derive(Clone, Debug)]
pub(crate) struct JsonEncoder {
    pid: u32,
    hostname: String,
}

impl JsonEncoder {
    pub(crate) fn new() -> Self {
        Self {
            pid: std::process::id(),
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    /// Serializes one record, including the trailing newline.
    ///
    /// Fields whose names collide with an implicit key are skipped.
    pub(crate) fn encode(
        &self,
        severity: Severity,
        message: &str,
        fields: &[(String, String)],
    ) -> Result<Vec<u8>, LoggerError> {
        let mut buffer = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut buffer,
            serde_json::ser::CompactFormatter,
        );
        let mut map_serializer = serializer.serialize_map(None)?;

        map_serializer.serialize_entry(keys::MESSAGE, message)?;
        map_serializer.serialize_entry(keys::LEVEL, severity.as_str())?;
        if let Ok(time) = time::UtcDateTime::now().format(&Iso8601::DEFAULT) {
            map_serializer.serialize_entry(keys::TIME, &time)?;
        }
        map_serializer.serialize_entry(keys::HOSTNAME, &self.hostname)?;
        map_serializer.serialize_entry(keys::PID, &self.pid)?;

        for (key, value) in fields {
            if keys::IMPLICIT_KEYS.contains(key.as_str()) {
                tracing::warn!(
                    "Attempting to log a reserved key `{key}` (value: `{value}`) as a field. \
                     Skipping."
                );
            } else {
                map_serializer.serialize_entry(key, value)?;
            }
        }

        map_serializer.end()?;
        buffer.push(b'\n');
        Ok(buffer)
    }
}
