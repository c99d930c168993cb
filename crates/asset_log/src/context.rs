//! Request-scoped context values and their conversion into log fields.

use std::fmt;

use rustc_hash::FxHashMap;

/// A request-scoped carrier of named string values.
///
/// A [`LogContext`] is built by the caller (typically once per request) and passed by reference
/// to the logging methods of [`AssetLog`][crate::AssetLog]. The logger only ever reads from it.
///
/// Values are stored as strings. Values of other types must be formatted before they are
/// recorded, either by the caller or through [`LogContext::record_display`].
///
/// ```
/// use asset_log::LogContext;
///
/// let ctx = LogContext::new()
///     .record("request_id", "req-123")
///     .record_display("attempt", 2);
///
/// assert_eq!(ctx.get("request_id"), Some("req-123"));
/// assert_eq!(ctx.get("attempt"), Some("2"));
/// assert_eq!(ctx.get("user_id"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogContext {
    values: FxHashMap<String, String>,
}

impl LogContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value under `key`, replacing any previous value.
    #[must_use]
    pub fn record(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Records the [`Display`][fmt::Display] representation of `value` under `key`.
    #[must_use]
    pub fn record_display(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.record(key, value.to_string())
    }

    /// Inserts a value under `key` in place, returning the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Looks up the value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LogContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Fields extracted from a [`LogContext`] for a single log call.
///
/// Built fresh on every call and dropped once the record has been emitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextFieldMap {
    fields: Vec<(String, String)>,
}

impl ContextFieldMap {
    /// Extracts the configured `names` from `ctx`.
    ///
    /// Without a context, the map is empty. With a context, every configured name is present,
    /// in configured order, and names with no value in the context map to an empty string.
    pub fn from_context(ctx: Option<&LogContext>, names: &[String]) -> Self {
        let Some(ctx) = ctx else {
            return Self::default();
        };

        let fields = names
            .iter()
            .map(|name| (name.clone(), ctx.get(name).unwrap_or_default().to_owned()))
            .collect();

        Self { fields }
    }

    /// Looks up the value extracted for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of extracted fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was extracted.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the extracted `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl IntoIterator for ContextFieldMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
