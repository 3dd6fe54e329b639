//! Errors produced while reading bridge settings.

use thiserror::Error;

/// Why a bridge setting was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A known key held a value of the wrong shape or range.
    #[error("{section}.{field}: {reason}")]
    InvalidField {
        /// Settings group, such as `bridge`.
        section: String,
        /// Key within the group.
        field: String,
        /// Rejected input, when it can be shown.
        value: Option<String>,
        /// Short description of the expectation that was not met.
        reason: &'static str,
    },
    /// A key that the bridge does not understand.
    #[error("{section}.{field}: not a recognised setting")]
    UnknownField {
        /// Settings group, such as `bridge`.
        section: String,
        /// Offending key.
        field: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &str,
        field: &str,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section: section.to_owned(),
            field: field.to_owned(),
            value,
            reason,
        }
    }

    /// Key the error refers to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidField { field, .. } | Self::UnknownField { field, .. } => field,
        }
    }
}

/// Result alias for settings parsing.
pub type ConfigResult<T> = Result<T, ConfigError>;
