//! Environment variable utilities for safe and validated access.
//!
//! Values are trimmed and must be non-empty; typed accessors report values that
//! do not parse instead of silently falling back to a default.

use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when accessing environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvVarError {
    /// Environment variable is not set
    #[error("Environment variable '{name}' not found")]
    NotFound { name: String },

    /// Environment variable contains invalid UTF-8 characters
    #[error("Environment variable '{name}' contains invalid UTF-8 characters")]
    InvalidUtf8 { name: String },

    /// Environment variable is set but contains only whitespace or is empty
    #[error("Environment variable '{name}' is empty")]
    Empty { name: String },

    /// Environment variable is set but does not parse as the expected type
    #[error("Environment variable '{name}' has invalid value '{value}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Utility functions for safe environment variable handling.
///
/// # Examples
///
/// ```no_run
/// use tablekit::utils::EnvUtils;
///
/// let endpoint = EnvUtils::get_optional_var("TABLEKIT_ENDPOINT")
///     .unwrap_or_else(|| "http://localhost:8000".to_string());
///
/// let timeout: Option<u64> = EnvUtils::get_optional_parsed("TABLEKIT_REQUEST_TIMEOUT_SECS")?;
/// # Ok::<(), tablekit::utils::EnvVarError>(())
/// ```
pub struct EnvUtils;

impl EnvUtils {
    /// Checks if an environment variable exists and has a non-empty value.
    pub fn has_non_empty_var(name: &str) -> bool {
        match std::env::var(name) {
            Ok(value) => !value.trim().is_empty(),
            Err(_) => false,
        }
    }

    /// Gets an environment variable, trimmed and validated as non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`EnvVarError`] if:
    /// - The variable is not set ([`EnvVarError::NotFound`])
    /// - The variable is empty or contains only whitespace ([`EnvVarError::Empty`])
    /// - The variable contains invalid UTF-8 ([`EnvVarError::InvalidUtf8`])
    pub fn get_validated_var(name: &str) -> Result<String, EnvVarError> {
        match std::env::var(name) {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Err(EnvVarError::Empty {
                        name: name.to_string(),
                    })
                } else {
                    Ok(trimmed.to_string())
                }
            }
            Err(std::env::VarError::NotPresent) => Err(EnvVarError::NotFound {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(EnvVarError::InvalidUtf8 {
                name: name.to_string(),
            }),
        }
    }

    /// Gets an optional environment variable; missing, empty or invalid values are `None`.
    pub fn get_optional_var(name: &str) -> Option<String> {
        Self::get_validated_var(name).ok()
    }

    /// Gets and parses an optional environment variable.
    ///
    /// A missing or empty variable is `Ok(None)`; a value that does not parse is
    /// [`EnvVarError::Invalid`].
    pub fn get_optional_parsed<T>(name: &str) -> Result<Option<T>, EnvVarError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::get_validated_var(name) {
            Ok(value) => Self::parse_value(name, &value).map(Some),
            Err(EnvVarError::NotFound { .. } | EnvVarError::Empty { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Gets an optional boolean (`true/false`, `1/0`, `yes/no`, `on/off`)
    pub fn get_optional_bool(name: &str) -> Result<Option<bool>, EnvVarError> {
        match Self::get_validated_var(name) {
            Ok(value) => Self::parse_bool(name, &value).map(Some),
            Err(EnvVarError::NotFound { .. } | EnvVarError::Empty { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parse an already-read value, naming the variable in the error
    pub fn parse_value<T>(name: &str, value: &str) -> Result<T, EnvVarError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value.trim().parse::<T>().map_err(|e| EnvVarError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn parse_bool(name: &str, value: &str) -> Result<bool, EnvVarError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(EnvVarError::Invalid {
                name: name.to_string(),
                value: value.to_string(),
                reason: "expected a boolean".to_string(),
            }),
        }
    }
}
