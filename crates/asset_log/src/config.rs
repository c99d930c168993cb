//! Logger configuration, either constructed directly or loaded from a YAML file.

use std::{collections::HashMap, fmt, path::Path};

use serde::Deserialize;

use super::{sink::RotationPolicy, LoggerError};

/// Configuration bound to an [`AssetLog`][crate::AssetLog] for its whole lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LoggerConfig {
    /// Name of the minimum severity emitted, in any letter case.
    pub level: String,

    /// Output identifiers: `"stdout"`, `"stderr"`, or file paths.
    #[serde(default)]
    pub output_paths: Vec<String>,

    /// Names of the [`LogContext`][crate::LogContext] values attached to every record.
    #[serde(default)]
    pub appends: Vec<String>,

    /// Rotation policy for file outputs. The default policy applies if unset.
    #[serde(default)]
    pub rotation: Option<RotationPolicy>,
}

impl LoggerConfig {
    /// Creates a configuration with the default rotation policy.
    pub fn new(
        level: impl Into<String>,
        output_paths: impl IntoIterator<Item = impl Into<String>>,
        appends: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            level: level.into(),
            output_paths: output_paths.into_iter().map(Into::into).collect(),
            appends: appends.into_iter().map(Into::into).collect(),
            rotation: None,
        }
    }

    /// The rotation policy applied to file outputs.
    pub fn rotation_policy(&self) -> RotationPolicy {
        self.rotation.unwrap_or_default()
    }
}

/// The deployment environment used to select a [`LoggerConfig`] from a configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Production.
    Prod,

    /// Test.
    Test,

    /// Development. Selected for every name other than `prod` and `test`.
    Dev,
}

impl Environment {
    /// Resolves an environment name.
    ///
    /// An empty name is rejected with [`LoggerError::MissingEnvironment`]. Names other than
    /// `prod` and `test` resolve to [`Environment::Dev`].
    pub fn from_name(name: &str) -> Result<Self, LoggerError> {
        match name {
            "" => Err(LoggerError::MissingEnvironment),
            "prod" => Ok(Self::Prod),
            "test" => Ok(Self::Test),
            _ => Ok(Self::Dev),
        }
    }

    /// The key of this environment in a configuration file.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logger configurations keyed by environment name, as found in a configuration file.
///
/// ```yaml
/// prod:
///   level: INFO
///   output_paths: ["stdout", "/var/log/app/app.log"]
///   appends: ["request_id"]
/// dev:
///   level: debug
///   output_paths: ["stdout"]
///   appends: ["request_id", "user_id"]
///   rotation:
///     max_size_mb: 10
///     max_backups: 3
///     max_age_days: 7
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LoggerConfigs {
    configs: HashMap<String, LoggerConfig>,
}

impl LoggerConfigs {
    /// Reads and parses a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoggerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| LoggerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents, path)
    }

    /// Parses configurations from a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self, LoggerError> {
        Self::parse(contents, Path::new(""))
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, LoggerError> {
        serde_yaml::from_str(contents).map_err(|source| LoggerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Selects the configuration of an environment.
    pub fn get(&self, environment: Environment) -> Option<&LoggerConfig> {
        self.configs.get(environment.as_str())
    }

    /// Removes and returns the configuration of an environment.
    pub fn take(&mut self, environment: Environment) -> Result<LoggerConfig, LoggerError> {
        self.configs
            .remove(environment.as_str())
            .ok_or(LoggerError::ConfigMissingForEnvironment(environment))
    }
}
