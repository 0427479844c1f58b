//! Query expression algebra
//!
//! This module builds PromQL/MetricsQL expression trees and renders them as
//! query text:
//!
//! - **duration**: Millisecond durations with canonical `10m5s` rendering
//! - **ast**: The closed set of expression nodes and operator table
//! - **builder**: Validating builder methods (labels, slicing, modifiers, operators)
//! - **render**: Precedence-aware rendering and whitespace normalization
//! - **functions**: Typed function and aggregation constructors
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust
//! use rulesmith::ql::{self, MINUTE};
//!
//! fn main() -> Result<(), ql::QlError> {
//!     let requests = ql::metric("http_requests_total")?.with_labels([("job", "api")])?;
//!     let rate = ql::rate(requests.sliced(5 * MINUTE)?)?;
//!     let by_host = ql::sum(rate)?.by(["host"])?;
//!
//!     assert_eq!(
//!         ql::format(&by_host),
//!         r#"sum(rate(http_requests_total{job="api"}[5m])) by(host)"#
//!     );
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod builder;
pub mod duration;
pub mod error;
pub mod functions;
pub mod render;

// Re-export commonly used types
pub use ast::{
    literal, metric, AggregateOp, AtTarget, BinaryOp, BinopCategory, BinopKind, Call, CallArg,
    DerivedInstantVector, Expr, GroupModifier, GroupSide, Grouping, GroupingKind, LabelMatcher,
    MatchingKind, Modifier, Operand, Precedence, RangeVector, ScalarLiteral, SelectedInstantVector,
    Subquery, ValueKind, VectorMatching,
};
pub use builder::binop;
pub use duration::{Duration, DAY, HOUR, MILLISECOND, MINUTE, SECOND, WEEK};
pub use error::{QlError, QlResult};
pub use functions::*;
pub use render::format;
