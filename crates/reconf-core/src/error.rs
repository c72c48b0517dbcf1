//! Error types for the reconf core.
//!
//! Halt states of the acceptance protocol (reload required, policy rejection)
//! are not errors; they are reported through [`Outcome`](crate::Outcome).

use thiserror::Error;

// =============================================================================
// Core Errors
// =============================================================================

/// Errors that can occur while comparing or editing configuration objects.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// The two snapshots handed to the change detector are of different types.
    #[error("malformed snapshot pair: expected '{expected}', found '{found}'")]
    MalformedSnapshot {
        /// Type name of the current snapshot.
        expected: &'static str,
        /// Type name of the pending snapshot.
        found: &'static str,
    },

    /// No catalog member with the given name.
    #[error("'{aggregate}' has no member named '{member}'")]
    UnknownMember {
        /// Type name of the aggregate.
        aggregate: &'static str,
        /// Requested member name.
        member: String,
    },

    /// The member is excluded from editing and persistence.
    #[error("member '{member}' is ignored and cannot be edited")]
    IgnoredMember {
        /// Requested member name.
        member: String,
    },

    /// A JSON value could not be written into a member.
    #[error(transparent)]
    Value(#[from] ValueError),
}

// =============================================================================
// Value Errors
// =============================================================================

/// Errors raised when assigning a JSON value into an inspectable value.
///
/// `path` is the dotted member path from the outermost aggregate, empty when
/// the failing value is the root itself.
#[derive(Debug, Clone, Error)]
pub enum ValueError {
    /// The JSON value has the wrong shape.
    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Dotted member path.
        path: String,
        /// Expected JSON shape.
        expected: &'static str,
        /// Offending JSON value.
        found: String,
    },

    /// The JSON value has the right shape but could not be converted.
    #[error("invalid value at '{path}': {reason}")]
    Invalid {
        /// Dotted member path.
        path: String,
        /// Conversion failure.
        reason: String,
    },
}

impl ValueError {
    /// Creates a type mismatch error for the current value.
    pub fn mismatch(expected: &'static str, found: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            path: String::new(),
            expected,
            found: found.to_string(),
        }
    }

    /// Creates a conversion error for the current value.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: String::new(),
            reason: reason.into(),
        }
    }

    /// Prefixes the error path with an enclosing member or element name.
    pub fn within(mut self, segment: &str) -> Self {
        let path = match &mut self {
            Self::TypeMismatch { path, .. } | Self::Invalid { path, .. } => path,
        };
        *path = if path.is_empty() {
            segment.to_string()
        } else {
            format!("{segment}.{path}")
        };
        self
    }

    /// Returns the dotted member path of the failure.
    pub fn path(&self) -> &str {
        match self {
            Self::TypeMismatch { path, .. } | Self::Invalid { path, .. } => path,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for value assignment.
pub type ValueResult<T> = Result<T, ValueError>;
