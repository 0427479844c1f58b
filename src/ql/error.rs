//! Expression construction error types
//!
//! Every error here is raised while a tree is being built. Rendering never
//! fails: a tree that made it through the builder surface is always renderable.

use thiserror::Error;

/// Errors that can occur while building an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QlError {
    /// The operator cannot combine these two operands
    #[error("Operator '{op}' is not supported between {left} and {right}")]
    OperatorNotSupported {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// A constructor received the wrong number or kind of arguments
    #[error("Type mismatch in {function}: {detail}")]
    TypeMismatch { function: String, detail: String },

    /// A modifier cannot be attached to this node
    #[error("Cannot apply {modifier} to {target}: {reason}")]
    IllegalModifier {
        modifier: &'static str,
        target: &'static str,
        reason: String,
    },

    /// A duration string could not be parsed
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// A metric or label name does not match the query grammar
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// No constructor is registered under this function name
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
}

impl QlError {
    pub(crate) fn illegal_modifier(
        modifier: &'static str,
        target: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        QlError::IllegalModifier {
            modifier,
            target,
            reason: reason.into(),
        }
    }
}

/// Result type for expression construction
pub type QlResult<T> = Result<T, QlError>;
