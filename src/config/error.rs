//! Configuration error types.

use std::fmt;

/// Error type for configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// One or more fields failed validation. Every bad field is listed.
    Invalid { fields: Vec<String> },
    /// Failed to parse a raw value.
    Parse {
        key: String,
        value: String,
        error: String,
    },
    /// IO error (e.g., preparing the upload directory).
    Io { path: String, error: std::io::Error },
}

impl ConfigError {
    /// Build an `Invalid` error from field names.
    pub fn invalid<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigError::Invalid {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Names of the invalid fields; empty for other variants.
    pub fn fields(&self) -> &[String] {
        match self {
            ConfigError::Invalid { fields } => fields,
            _ => &[],
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { fields } => {
                write!(f, "invalid argument(s): [ {} ]", fields.join(" "))
            }
            ConfigError::Parse { key, value, error } => {
                write!(f, "failed to parse {}='{}': {}", key, value, error)
            }
            ConfigError::Io { path, error } => {
                write!(f, "IO error for '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}
