//! Rule bundle error types

use thiserror::Error;

use crate::ql::QlError;

/// Errors that can occur while registering or realizing rules
#[derive(Error, Debug)]
pub enum RuleError {
    /// An expression could not be built
    #[error("Expression error: {0}")]
    Ql(#[from] QlError),

    /// Two rules in one bundle share a name
    #[error("Duplicate rule name: {0}")]
    DuplicateRule(String),

    /// A rule was registered without a name
    #[error("Rule name must not be empty")]
    EmptyName,

    /// A rule's expression cannot be evaluated as a rule
    #[error("Invalid expression for rule '{rule}': {reason}")]
    InvalidExpression { rule: String, reason: String },

    /// The manifest could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RuleError {
    fn from(err: serde_yaml::Error) -> Self {
        RuleError::Serialization(err.to_string())
    }
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ql_errors_convert() {
        let err: RuleError = QlError::InvalidName("'5xx' is not a valid metric name".into()).into();
        assert!(matches!(err, RuleError::Ql(QlError::InvalidName(_))));
        assert_eq!(
            err.to_string(),
            "Expression error: Invalid name: '5xx' is not a valid metric name"
        );
    }

    #[test]
    fn test_error_display() {
        let err = RuleError::InvalidExpression {
            rule: "HighLatency".to_string(),
            reason: "expression is a range vector".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid expression for rule 'HighLatency': expression is a range vector"
        );
        assert_eq!(RuleError::DuplicateRule("a".into()).to_string(), "Duplicate rule name: a");
    }
}
