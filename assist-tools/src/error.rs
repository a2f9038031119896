//! The single error type surfaced by tool declaration, lookup, and invocation.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::validation::ParamType;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, PluginError>;

/// Discriminant describing which rule or lookup produced a [`PluginError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required parameter was absent from the call.
    MissingParameter,
    /// An argument had the wrong JSON type.
    TypeMismatch,
    /// A string argument did not match the declared pattern.
    PatternMismatch,
    /// A numeric argument fell outside the declared range.
    RangeViolation,
    /// An argument was not among the declared allowed values.
    InvalidChoice,
    /// A named custom predicate rejected the argument.
    CustomValidationFailure,
    /// No tool is registered under the requested name.
    ToolNotFound,
    /// A tool declaration was inconsistent.
    InvalidSpec,
    /// The tool body itself failed.
    Execution,
}

/// Which side of an inclusive range was violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    /// The value was below the declared minimum.
    Min,
    /// The value was above the declared maximum.
    Max,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "min",
            Self::Max => "max",
        })
    }
}

/// A single failed parameter rule.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Violation {
    /// Required parameter absent.
    #[error("required parameter is missing")]
    Missing,

    /// Runtime type differs from the declared type.
    #[error("expected type {expected}, got {actual}")]
    TypeMismatch {
        /// Declared parameter type.
        expected: ParamType,
        /// JSON type of the supplied value.
        actual: &'static str,
    },

    /// String value failed the declared regular expression.
    #[error("value {value:?} does not match pattern `{pattern}`")]
    PatternMismatch {
        /// Declared pattern source.
        pattern: String,
        /// Offending value.
        value: String,
    },

    /// Numeric value outside the inclusive range.
    #[error("value {value} {} {bound} {limit}", range_verb(.bound))]
    RangeViolation {
        /// Violated side of the range.
        bound: Bound,
        /// Declared limit for that side.
        limit: f64,
        /// Offending value.
        value: f64,
    },

    /// Value not in the allowed set.
    #[error("value {value} is not one of: {}", join_values(.allowed))]
    InvalidChoice {
        /// Offending value.
        value: Value,
        /// Declared allowed values.
        allowed: Vec<Value>,
    },

    /// Named predicate rejected the value.
    #[error("{message}")]
    CustomValidationFailure {
        /// Name of the predicate that failed.
        predicate: String,
        /// Message declared alongside the predicate.
        message: String,
    },
}

impl Violation {
    /// Returns the error kind corresponding to this violation.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing => ErrorKind::MissingParameter,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::PatternMismatch { .. } => ErrorKind::PatternMismatch,
            Self::RangeViolation { .. } => ErrorKind::RangeViolation,
            Self::InvalidChoice { .. } => ErrorKind::InvalidChoice,
            Self::CustomValidationFailure { .. } => ErrorKind::CustomValidationFailure,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn range_verb(bound: &Bound) -> &'static str {
    match bound {
        Bound::Min => "is below",
        Bound::Max => "exceeds",
    }
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors produced by tool declaration, registry lookup, and invocation.
#[derive(Debug, Error)]
pub enum PluginError {
    /// An argument failed one of its declared rules.
    #[error("[{tool}] parameter `{parameter}`: {violation}")]
    Validation {
        /// Tool whose arguments were rejected.
        tool: String,
        /// Offending parameter name.
        parameter: String,
        /// The rule that failed.
        violation: Violation,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    ToolNotFound {
        /// Name of the missing tool.
        name: String,
    },

    /// Tool declaration failed validation.
    #[error("invalid tool declaration: {reason}")]
    InvalidSpec {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },
}

impl PluginError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates a declaration error from the supplied reason.
    #[must_use]
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(
        tool: impl Into<String>,
        parameter: impl Into<String>,
        violation: Violation,
    ) -> Self {
        Self::Validation {
            tool: tool.into(),
            parameter: parameter.into(),
            violation,
        }
    }

    /// Returns the discriminating kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { violation, .. } => violation.kind(),
            Self::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Self::InvalidSpec { .. } => ErrorKind::InvalidSpec,
            Self::Execution { .. } => ErrorKind::Execution,
        }
    }

    /// Returns the offending parameter for validation failures.
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::Validation { parameter, .. } => Some(parameter),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn range_messages_name_the_bound() {
        let max = Violation::RangeViolation {
            bound: Bound::Max,
            limit: 150.0,
            value: 200.0,
        };
        assert_eq!(max.to_string(), "value 200 exceeds max 150");

        let min = Violation::RangeViolation {
            bound: Bound::Min,
            limit: 0.0,
            value: -1.0,
        };
        assert_eq!(min.to_string(), "value -1 is below min 0");
    }

    #[test]
    fn validation_error_identifies_tool_and_parameter() {
        let err = PluginError::validation(
            "register_user",
            "role",
            Violation::InvalidChoice {
                value: json!("root"),
                allowed: vec![json!("admin"), json!("guest")],
            },
        );

        assert_eq!(err.kind(), ErrorKind::InvalidChoice);
        assert_eq!(err.parameter(), Some("role"));
        assert_eq!(
            err.to_string(),
            r#"[register_user] parameter `role`: value "root" is not one of: "admin", "guest""#
        );
    }

    #[test]
    fn custom_failure_carries_message_verbatim() {
        let violation = Violation::CustomValidationFailure {
            predicate: "even".into(),
            message: "Value must be even".into(),
        };
        assert_eq!(violation.to_string(), "Value must be even");
        assert_eq!(violation.kind(), ErrorKind::CustomValidationFailure);
    }
}
