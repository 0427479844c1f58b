//! Expression node algebra
//!
//! Defines the closed set of expression nodes for the query language:
//!
//! - `ScalarLiteral`: a bare number (`42.0`)
//! - `SelectedInstantVector`: a metric selector (`up{job="api"}`)
//! - `DerivedInstantVector`: an expression under `offset` or `@`
//! - `RangeVector`: a selector sliced over a window (`up[5m]`)
//! - `Subquery`: an expression evaluated over a window at a step (`(a * b)[4m:1s]`)
//! - `Call`: a function call (`rate(x[5m])`)
//! - `BinaryOp`: an operator applied to two operands
//! - `AggregateOp`: an aggregation, optionally grouped (`avg(x) by(host)`)
//!
//! Nodes are immutable. Children are reference counted so a subtree can be
//! shared by many parents and rendered from any thread. Fields are private to
//! the crate: the builder methods in [`crate::ql::builder`] are the only way to
//! construct composite nodes, which keeps every tree renderable.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::ql::duration::Duration;
use crate::ql::error::{QlError, QlResult};

/// What an expression evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    Instant,
    Range,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Scalar => write!(f, "scalar"),
            ValueKind::Instant => write!(f, "instant vector"),
            ValueKind::Range => write!(f, "range vector"),
        }
    }
}

/// Binding strength of a node's outermost syntax, loosest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Or,
    AndUnless,
    Comparison,
    Additive,
    Multiplicative,
    /// Negative literals: `-2 ^ 2` parses as `-(2 ^ 2)`
    Unary,
    Power,
    /// `offset` and `@`
    Modifier,
    /// Selectors, calls, literals and anything already bracketed
    Atom,
}

/// Operator families, used by the legality rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinopCategory {
    Arithmetic,
    Comparison,
    Set,
    /// Float-capable, but only reachable as a method on a node
    WrapperOnly,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinopKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Unless,
    Atan2,
}

impl BinopKind {
    /// Every operator, in declaration order
    pub const ALL: [BinopKind; 16] = [
        BinopKind::Add,
        BinopKind::Sub,
        BinopKind::Mul,
        BinopKind::Div,
        BinopKind::Mod,
        BinopKind::Pow,
        BinopKind::Eq,
        BinopKind::Ne,
        BinopKind::Gt,
        BinopKind::Ge,
        BinopKind::Lt,
        BinopKind::Le,
        BinopKind::And,
        BinopKind::Or,
        BinopKind::Unless,
        BinopKind::Atan2,
    ];

    /// Text of the operator in rendered queries
    pub fn symbol(&self) -> &'static str {
        match self {
            BinopKind::Add => "+",
            BinopKind::Sub => "-",
            BinopKind::Mul => "*",
            BinopKind::Div => "/",
            BinopKind::Mod => "%",
            BinopKind::Pow => "^",
            BinopKind::Eq => "==",
            BinopKind::Ne => "!=",
            BinopKind::Gt => ">",
            BinopKind::Ge => ">=",
            BinopKind::Lt => "<",
            BinopKind::Le => "<=",
            BinopKind::And => "and",
            BinopKind::Or => "or",
            BinopKind::Unless => "unless",
            BinopKind::Atan2 => "atan2",
        }
    }

    pub fn category(&self) -> BinopCategory {
        match self {
            BinopKind::Add
            | BinopKind::Sub
            | BinopKind::Mul
            | BinopKind::Div
            | BinopKind::Mod
            | BinopKind::Pow => BinopCategory::Arithmetic,
            BinopKind::Eq
            | BinopKind::Ne
            | BinopKind::Gt
            | BinopKind::Ge
            | BinopKind::Lt
            | BinopKind::Le => BinopCategory::Comparison,
            BinopKind::And | BinopKind::Or | BinopKind::Unless => BinopCategory::Set,
            BinopKind::Atan2 => BinopCategory::WrapperOnly,
        }
    }

    pub fn precedence(&self) -> Precedence {
        match self {
            BinopKind::Pow => Precedence::Power,
            BinopKind::Mul | BinopKind::Div | BinopKind::Mod | BinopKind::Atan2 => {
                Precedence::Multiplicative
            }
            BinopKind::Add | BinopKind::Sub => Precedence::Additive,
            BinopKind::Eq
            | BinopKind::Ne
            | BinopKind::Gt
            | BinopKind::Ge
            | BinopKind::Lt
            | BinopKind::Le => Precedence::Comparison,
            BinopKind::And | BinopKind::Unless => Precedence::AndUnless,
            BinopKind::Or => Precedence::Or,
        }
    }

    /// Only `^` groups right to left
    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinopKind::Pow)
    }

    /// Whether this operator may combine the two operands.
    ///
    /// Arithmetic accepts any pair, including a raw number on the left.
    /// Every other family rejects a raw number on the left, since there is no
    /// node to dispatch on. Range-valued operands are never accepted.
    pub fn is_legal(&self, left: &Operand, right: &Operand) -> bool {
        if left.value_kind() == ValueKind::Range || right.value_kind() == ValueKind::Range {
            return false;
        }
        match self.category() {
            BinopCategory::Arithmetic => true,
            BinopCategory::Comparison | BinopCategory::Set | BinopCategory::WrapperOnly => {
                !left.is_raw()
            }
        }
    }
}

impl std::fmt::Display for BinopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One side of a binary operation before dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A host number, promoted to a `ScalarLiteral` once the operation is legal
    Raw(f64),
    Node(Expr),
}

impl Operand {
    pub fn is_raw(&self) -> bool {
        matches!(self, Operand::Raw(_))
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            Operand::Raw(_) => ValueKind::Scalar,
            Operand::Node(expr) => expr.value_kind(),
        }
    }

    /// Name used in error messages
    pub fn variant_name(&self) -> &'static str {
        match self {
            Operand::Raw(_) => "float",
            Operand::Node(expr) => expr.variant_name(),
        }
    }

    pub fn into_expr(self) -> Expr {
        match self {
            Operand::Raw(value) => Expr::Scalar(ScalarLiteral::new(value)),
            Operand::Node(expr) => expr,
        }
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Raw(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Raw(f64::from(value))
    }
}

impl From<Expr> for Operand {
    fn from(expr: Expr) -> Self {
        Operand::Node(expr)
    }
}

impl From<&Expr> for Operand {
    fn from(expr: &Expr) -> Self {
        Operand::Node(expr.clone())
    }
}

/// A number literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarLiteral {
    pub(crate) value: f64,
}

impl ScalarLiteral {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// An exact-match label constraint, `name="value"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl LabelMatcher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A metric selector with optional label matchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedInstantVector {
    pub(crate) name: String,
    /// `None` renders bare, `Some(vec![])` renders `name{}`
    pub(crate) matchers: Option<Vec<LabelMatcher>>,
}

impl SelectedInstantVector {
    /// Create a selector for a metric, validating the metric name
    pub fn new(name: impl Into<String>) -> QlResult<Self> {
        let name = name.into();
        validate_metric_name(&name)?;
        Ok(Self {
            name,
            matchers: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label matchers in the order they were attached
    pub fn matchers(&self) -> &[LabelMatcher] {
        self.matchers.as_deref().unwrap_or(&[])
    }

    /// Same selector with explicit, empty braces
    pub(crate) fn with_empty_selector(mut self) -> Self {
        self.matchers.get_or_insert_with(Vec::new);
        self
    }
}

/// Evaluation-time modifiers that wrap another expression
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Offset(Duration),
    At(AtTarget),
}

impl Modifier {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Modifier::Offset(_) => "offset",
            Modifier::At(_) => "@",
        }
    }
}

/// Right-hand side of an `@` modifier
#[derive(Debug, Clone, PartialEq)]
pub enum AtTarget {
    /// Unix timestamp in seconds
    Timestamp(f64),
    Expr(Arc<Expr>),
}

impl From<f64> for AtTarget {
    fn from(seconds: f64) -> Self {
        AtTarget::Timestamp(seconds)
    }
}

impl From<i64> for AtTarget {
    fn from(seconds: i64) -> Self {
        AtTarget::Timestamp(seconds as f64)
    }
}

impl From<i32> for AtTarget {
    fn from(seconds: i32) -> Self {
        AtTarget::Timestamp(f64::from(seconds))
    }
}

impl From<chrono::DateTime<chrono::Utc>> for AtTarget {
    fn from(time: chrono::DateTime<chrono::Utc>) -> Self {
        AtTarget::Timestamp(time.timestamp_millis() as f64 / 1000.0)
    }
}

impl From<Expr> for AtTarget {
    fn from(expr: Expr) -> Self {
        AtTarget::Expr(Arc::new(expr))
    }
}

impl From<&Expr> for AtTarget {
    fn from(expr: &Expr) -> Self {
        AtTarget::Expr(Arc::new(expr.clone()))
    }
}

/// An expression under an `offset` or `@` modifier
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedInstantVector {
    pub(crate) inner: Arc<Expr>,
    pub(crate) modifier: Modifier,
}

impl DerivedInstantVector {
    pub fn inner(&self) -> &Expr {
        &self.inner
    }

    pub fn modifier(&self) -> &Modifier {
        &self.modifier
    }
}

/// A selector sliced over a trailing window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeVector {
    pub(crate) vector: SelectedInstantVector,
    pub(crate) range: Duration,
}

impl RangeVector {
    pub fn vector(&self) -> &SelectedInstantVector {
        &self.vector
    }

    pub fn range(&self) -> Duration {
        self.range
    }
}

/// An instant expression evaluated over a window at a fixed step
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub(crate) inner: Arc<Expr>,
    pub(crate) range: Duration,
    /// `None` uses the engine's default evaluation step (`[5m:]`)
    pub(crate) step: Option<Duration>,
}

impl Subquery {
    pub fn inner(&self) -> &Expr {
        &self.inner
    }

    pub fn range(&self) -> Duration {
        self.range
    }

    pub fn step(&self) -> Option<Duration> {
        self.step
    }
}

/// A checked argument of a function or aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Expr(Arc<Expr>),
    Str(String),
}

/// A non-aggregating function call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub(crate) function: String,
    pub(crate) args: Vec<CallArg>,
    pub(crate) returns: ValueKind,
}

impl Call {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn args(&self) -> &[CallArg] {
        &self.args
    }
}

/// `on(...)` or `ignoring(...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingKind {
    On,
    Ignoring,
}

impl MatchingKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            MatchingKind::On => "on",
            MatchingKind::Ignoring => "ignoring",
        }
    }
}

/// `group_left(...)` or `group_right(...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSide {
    Left,
    Right,
}

impl GroupSide {
    pub fn keyword(&self) -> &'static str {
        match self {
            GroupSide::Left => "group_left",
            GroupSide::Right => "group_right",
        }
    }
}

/// Many-to-one matching extension of a vector matching clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupModifier {
    pub(crate) side: GroupSide,
    pub(crate) labels: Vec<String>,
}

/// Label-matching clause of a binary operation between vectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMatching {
    pub(crate) kind: MatchingKind,
    pub(crate) labels: Vec<String>,
    pub(crate) group: Option<GroupModifier>,
}

/// An operator applied to two operands
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    pub(crate) kind: BinopKind,
    pub(crate) left: Arc<Expr>,
    pub(crate) right: Arc<Expr>,
    pub(crate) matching: Option<VectorMatching>,
    /// Comparison returns 0/1 instead of filtering
    pub(crate) return_bool: bool,
}

impl BinaryOp {
    pub fn kind(&self) -> BinopKind {
        self.kind
    }

    pub fn left(&self) -> &Expr {
        &self.left
    }

    pub fn right(&self) -> &Expr {
        &self.right
    }
}

/// `by(...)` or `without(...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingKind {
    By,
    Without,
}

impl GroupingKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            GroupingKind::By => "by",
            GroupingKind::Without => "without",
        }
    }
}

/// Grouping clause of an aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub(crate) kind: GroupingKind,
    pub(crate) labels: Vec<String>,
}

impl Grouping {
    pub fn kind(&self) -> GroupingKind {
        self.kind
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// An aggregation over an instant vector
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOp {
    pub(crate) function: String,
    pub(crate) args: Vec<CallArg>,
    pub(crate) grouping: Option<Grouping>,
}

impl AggregateOp {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn grouping(&self) -> Option<&Grouping> {
        self.grouping.as_ref()
    }
}

/// A query expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Scalar(ScalarLiteral),
    Selected(SelectedInstantVector),
    Derived(DerivedInstantVector),
    Range(RangeVector),
    Subquery(Subquery),
    Call(Call),
    Binary(BinaryOp),
    Aggregate(AggregateOp),
}

impl Expr {
    /// Node kind, as named in error messages
    pub fn variant_name(&self) -> &'static str {
        match self {
            Expr::Scalar(_) => "ScalarLiteral",
            Expr::Selected(_) => "SelectedInstantVector",
            Expr::Derived(_) => "DerivedInstantVector",
            Expr::Range(_) => "RangeVector",
            Expr::Subquery(_) => "Subquery",
            Expr::Call(_) => "Call",
            Expr::Binary(_) => "BinaryOp",
            Expr::Aggregate(_) => "AggregateOp",
        }
    }

    /// The type of value this expression evaluates to
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Expr::Scalar(_) => ValueKind::Scalar,
            Expr::Selected(_) | Expr::Aggregate(_) => ValueKind::Instant,
            Expr::Derived(derived) => derived.inner.value_kind(),
            Expr::Range(_) | Expr::Subquery(_) => ValueKind::Range,
            Expr::Call(call) => call.returns,
            Expr::Binary(op) => {
                if op.left.value_kind() == ValueKind::Scalar
                    && op.right.value_kind() == ValueKind::Scalar
                {
                    ValueKind::Scalar
                } else {
                    ValueKind::Instant
                }
            }
        }
    }

    /// Binding strength of this node's unbracketed text
    pub fn precedence(&self) -> Precedence {
        match self {
            Expr::Scalar(literal)
                if literal.value.is_sign_negative() && !literal.value.is_nan() =>
            {
                Precedence::Unary
            }
            Expr::Derived(_) => Precedence::Modifier,
            Expr::Binary(op) => op.kind.precedence(),
            _ => Precedence::Atom,
        }
    }
}

impl From<ScalarLiteral> for Expr {
    fn from(literal: ScalarLiteral) -> Self {
        Expr::Scalar(literal)
    }
}

impl From<SelectedInstantVector> for Expr {
    fn from(vector: SelectedInstantVector) -> Self {
        Expr::Selected(vector)
    }
}

/// Start a selector for `name`
pub fn metric(name: impl Into<String>) -> QlResult<Expr> {
    SelectedInstantVector::new(name).map(Expr::Selected)
}

/// A number literal node
pub fn literal(value: f64) -> Expr {
    Expr::Scalar(ScalarLiteral::new(value))
}

fn metric_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("metric name pattern is valid")
    })
}

fn label_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name pattern is valid")
    })
}

pub(crate) fn validate_metric_name(name: &str) -> QlResult<()> {
    if metric_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(QlError::InvalidName(format!("'{}' is not a valid metric name", name)))
    }
}

pub(crate) fn validate_label_name(name: &str) -> QlResult<()> {
    if label_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(QlError::InvalidName(format!("'{}' is not a valid label name", name)))
    }
}
