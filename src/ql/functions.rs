//! Function and aggregation constructors
//!
//! Every function the builder knows is described by a [`FunctionSpec`]: its
//! name, its family and the kinds of its parameters. [`call`] checks the
//! arguments against that signature and builds a `Call` or `AggregateOp`
//! node. The typed wrappers below (`rate`, `avg`, `label_replace`, ...) are
//! thin shortcuts over [`call`].
//!
//! ```rust,ignore
//! let errors = ql::rate(ql::metric("http_errors_total")?.sliced(5 * ql::MINUTE)?)?;
//! let by_job = ql::sum(errors)?.by(["job"])?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::ql::ast::{AggregateOp, Call, CallArg, Expr, ScalarLiteral, ValueKind};
use crate::ql::error::{QlError, QlResult};

/// Function families, following the query engine's documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Takes a range vector, returns one sample per series
    Rollup,
    /// Collapses series; accepts a `by`/`without` grouping
    Aggregate,
    /// Per-sample transformation
    Transform,
    /// Rewrites series labels
    LabelManipulation,
}

/// Kind of value a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    RangeVector,
    InstantVector,
    Scalar,
    String,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::RangeVector => write!(f, "range vector"),
            ParamKind::InstantVector => write!(f, "instant vector"),
            ParamKind::Scalar => write!(f, "scalar"),
            ParamKind::String => write!(f, "string"),
        }
    }
}

/// Signature of a builtin function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub kind: FunctionKind,
    pub params: &'static [ParamKind],
    /// Kind of any trailing arguments beyond `params`
    pub variadic: Option<ParamKind>,
    pub returns: ValueKind,
}

const RANGE: &[ParamKind] = &[ParamKind::RangeVector];
const INSTANT: &[ParamKind] = &[ParamKind::InstantVector];
const SCALAR_INSTANT: &[ParamKind] = &[ParamKind::Scalar, ParamKind::InstantVector];
const INSTANT_SCALAR: &[ParamKind] = &[ParamKind::InstantVector, ParamKind::Scalar];
const LABEL_REGEX: &[ParamKind] = &[
    ParamKind::InstantVector,
    ParamKind::String,
    ParamKind::String,
];

const fn rollup(name: &'static str) -> FunctionSpec {
    FunctionSpec {
        name,
        kind: FunctionKind::Rollup,
        params: RANGE,
        variadic: None,
        returns: ValueKind::Instant,
    }
}

const fn aggregate(name: &'static str, params: &'static [ParamKind]) -> FunctionSpec {
    FunctionSpec {
        name,
        kind: FunctionKind::Aggregate,
        params,
        variadic: None,
        returns: ValueKind::Instant,
    }
}

const fn transform(
    name: &'static str,
    params: &'static [ParamKind],
    returns: ValueKind,
) -> FunctionSpec {
    FunctionSpec {
        name,
        kind: FunctionKind::Transform,
        params,
        variadic: None,
        returns,
    }
}

const fn label_fn(
    name: &'static str,
    params: &'static [ParamKind],
    variadic: Option<ParamKind>,
) -> FunctionSpec {
    FunctionSpec {
        name,
        kind: FunctionKind::LabelManipulation,
        params,
        variadic,
        returns: ValueKind::Instant,
    }
}

/// Every function the builder can construct
pub static FUNCTIONS: &[FunctionSpec] = &[
    // Rollup functions
    rollup("rate"),
    rollup("irate"),
    rollup("increase"),
    rollup("delta"),
    rollup("idelta"),
    rollup("deriv"),
    rollup("changes"),
    rollup("resets"),
    rollup("avg_over_time"),
    rollup("min_over_time"),
    rollup("max_over_time"),
    rollup("sum_over_time"),
    rollup("count_over_time"),
    rollup("last_over_time"),
    rollup("stddev_over_time"),
    rollup("stdvar_over_time"),
    rollup("present_over_time"),
    rollup("absent_over_time"),
    FunctionSpec {
        name: "quantile_over_time",
        kind: FunctionKind::Rollup,
        params: &[ParamKind::Scalar, ParamKind::RangeVector],
        variadic: None,
        returns: ValueKind::Instant,
    },
    FunctionSpec {
        name: "predict_linear",
        kind: FunctionKind::Rollup,
        params: &[ParamKind::RangeVector, ParamKind::Scalar],
        variadic: None,
        returns: ValueKind::Instant,
    },
    // Aggregate functions
    aggregate("sum", INSTANT),
    aggregate("avg", INSTANT),
    aggregate("min", INSTANT),
    aggregate("max", INSTANT),
    aggregate("count", INSTANT),
    aggregate("group", INSTANT),
    aggregate("stddev", INSTANT),
    aggregate("stdvar", INSTANT),
    aggregate("topk", SCALAR_INSTANT),
    aggregate("bottomk", SCALAR_INSTANT),
    aggregate("limitk", SCALAR_INSTANT),
    aggregate("quantile", SCALAR_INSTANT),
    aggregate("count_values", &[ParamKind::String, ParamKind::InstantVector]),
    // Transform functions
    transform("abs", INSTANT, ValueKind::Instant),
    transform("absent", INSTANT, ValueKind::Instant),
    transform("ceil", INSTANT, ValueKind::Instant),
    transform("floor", INSTANT, ValueKind::Instant),
    transform("round", INSTANT, ValueKind::Instant),
    transform("exp", INSTANT, ValueKind::Instant),
    transform("ln", INSTANT, ValueKind::Instant),
    transform("log2", INSTANT, ValueKind::Instant),
    transform("log10", INSTANT, ValueKind::Instant),
    transform("sqrt", INSTANT, ValueKind::Instant),
    transform("sgn", INSTANT, ValueKind::Instant),
    transform("sort", INSTANT, ValueKind::Instant),
    transform("sort_desc", INSTANT, ValueKind::Instant),
    transform("timestamp", INSTANT, ValueKind::Instant),
    transform("clamp_min", INSTANT_SCALAR, ValueKind::Instant),
    transform("clamp_max", INSTANT_SCALAR, ValueKind::Instant),
    transform(
        "clamp",
        &[ParamKind::InstantVector, ParamKind::Scalar, ParamKind::Scalar],
        ValueKind::Instant,
    ),
    transform("histogram_quantile", SCALAR_INSTANT, ValueKind::Instant),
    transform("scalar", INSTANT, ValueKind::Scalar),
    transform("vector", &[ParamKind::Scalar], ValueKind::Instant),
    transform("time", &[], ValueKind::Scalar),
    // Label manipulation functions
    label_fn(
        "label_replace",
        &[
            ParamKind::InstantVector,
            ParamKind::String,
            ParamKind::String,
            ParamKind::String,
            ParamKind::String,
        ],
        None,
    ),
    label_fn("label_join", LABEL_REGEX, Some(ParamKind::String)),
    label_fn("label_match", LABEL_REGEX, None),
    label_fn("label_mismatch", LABEL_REGEX, None),
    label_fn("label_del", INSTANT, Some(ParamKind::String)),
    label_fn("label_keep", INSTANT, Some(ParamKind::String)),
];

/// Find the signature registered under `name`
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|spec| spec.name == name)
}

/// An unchecked function argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Expr(Expr),
    Number(f64),
    Str(String),
}

impl Arg {
    fn describe(&self) -> String {
        match self {
            Arg::Expr(expr) => format!("{} ({})", expr.value_kind(), expr.variant_name()),
            Arg::Number(_) => "number".to_string(),
            Arg::Str(_) => "string".to_string(),
        }
    }
}

impl From<Expr> for Arg {
    fn from(expr: Expr) -> Self {
        Arg::Expr(expr)
    }
}

impl From<&Expr> for Arg {
    fn from(expr: &Expr) -> Self {
        Arg::Expr(expr.clone())
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Number(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Number(f64::from(value))
    }
}

impl From<&str> for Arg {
    fn from(text: &str) -> Self {
        Arg::Str(text.to_string())
    }
}

impl From<String> for Arg {
    fn from(text: String) -> Self {
        Arg::Str(text)
    }
}

impl FunctionSpec {
    /// Check `args` against this signature and build the node
    pub fn build(&self, args: Vec<Arg>) -> QlResult<Expr> {
        let arity_ok = match self.variadic {
            None => args.len() == self.params.len(),
            Some(_) => args.len() >= self.params.len(),
        };
        if !arity_ok {
            let qualifier = if self.variadic.is_some() { "at least " } else { "" };
            return Err(self.mismatch(format!(
                "expected {}{} argument(s), got {}",
                qualifier,
                self.params.len(),
                args.len()
            )));
        }

        let checked = args
            .into_iter()
            .enumerate()
            .map(|(position, arg)| {
                let expected = self
                    .params
                    .get(position)
                    .copied()
                    .or(self.variadic)
                    .ok_or_else(|| self.mismatch(format!("unexpected argument {}", position + 1)))?;
                self.check_arg(position, expected, arg)
            })
            .collect::<QlResult<Vec<_>>>()?;

        Ok(match self.kind {
            FunctionKind::Aggregate => Expr::Aggregate(AggregateOp {
                function: self.name.to_string(),
                args: checked,
                grouping: None,
            }),
            _ => Expr::Call(Call {
                function: self.name.to_string(),
                args: checked,
                returns: self.returns,
            }),
        })
    }

    fn check_arg(&self, position: usize, expected: ParamKind, arg: Arg) -> QlResult<CallArg> {
        let accepted = match (expected, &arg) {
            (ParamKind::String, Arg::Str(_)) => true,
            (ParamKind::Scalar, Arg::Number(_)) => true,
            (ParamKind::Scalar, Arg::Expr(expr)) => expr.value_kind() == ValueKind::Scalar,
            (ParamKind::InstantVector, Arg::Expr(expr)) => expr.value_kind() == ValueKind::Instant,
            (ParamKind::RangeVector, Arg::Expr(expr)) => expr.value_kind() == ValueKind::Range,
            _ => false,
        };
        if !accepted {
            return Err(self.mismatch(format!(
                "argument {} expected {}, got {}",
                position + 1,
                expected,
                arg.describe()
            )));
        }

        Ok(match arg {
            Arg::Str(text) => CallArg::Str(text),
            Arg::Number(value) => CallArg::Expr(Arc::new(Expr::Scalar(ScalarLiteral::new(value)))),
            Arg::Expr(expr) => CallArg::Expr(Arc::new(expr)),
        })
    }

    fn mismatch(&self, detail: String) -> QlError {
        QlError::TypeMismatch {
            function: self.name.to_string(),
            detail,
        }
    }
}

/// Build a call to any registered function by name
pub fn call(name: &str, args: Vec<Arg>) -> QlResult<Expr> {
    let spec = lookup(name).ok_or_else(|| QlError::UnknownFunction(name.to_string()))?;
    spec.build(args)
}

macro_rules! functions {
    ($($name:ident($($param:ident),*);)*) => {
        $(
            #[doc = concat!("Build a `", stringify!($name), "` expression")]
            pub fn $name($($param: impl Into<Arg>),*) -> QlResult<Expr> {
                call(stringify!($name), vec![$($param.into()),*])
            }
        )*
    };
}

functions! {
    rate(series);
    irate(series);
    increase(series);
    delta(series);
    idelta(series);
    deriv(series);
    changes(series);
    resets(series);
    avg_over_time(series);
    min_over_time(series);
    max_over_time(series);
    sum_over_time(series);
    count_over_time(series);
    last_over_time(series);
    stddev_over_time(series);
    stdvar_over_time(series);
    present_over_time(series);
    absent_over_time(series);
    quantile_over_time(phi, series);
    predict_linear(series, seconds);

    sum(series);
    avg(series);
    min(series);
    max(series);
    count(series);
    group(series);
    stddev(series);
    stdvar(series);
    topk(k, series);
    bottomk(k, series);
    limitk(k, series);
    quantile(phi, series);
    count_values(label, series);

    abs(series);
    absent(series);
    ceil(series);
    floor(series);
    round(series);
    exp(series);
    ln(series);
    log2(series);
    log10(series);
    sqrt(series);
    sgn(series);
    sort(series);
    sort_desc(series);
    timestamp(series);
    clamp_min(series, min);
    clamp_max(series, max);
    clamp(series, min, max);
    histogram_quantile(phi, buckets);
    scalar(series);
    vector(value);
    time();

    label_replace(series, dst_label, replacement, src_label, regex);
    label_match(series, label, regex);
    label_mismatch(series, label, regex);
}

/// `label_join(series, dst_label, separator, src_labels...)`
pub fn label_join(
    series: impl Into<Arg>,
    dst_label: &str,
    separator: &str,
    src_labels: &[&str],
) -> QlResult<Expr> {
    let mut args = vec![series.into(), dst_label.into(), separator.into()];
    args.extend(src_labels.iter().map(|label| Arg::from(*label)));
    call("label_join", args)
}

/// `label_del(series, labels...)`
pub fn label_del(series: impl Into<Arg>, labels: &[&str]) -> QlResult<Expr> {
    let mut args = vec![series.into()];
    args.extend(labels.iter().map(|label| Arg::from(*label)));
    call("label_del", args)
}

/// `label_keep(series, labels...)`
pub fn label_keep(series: impl Into<Arg>, labels: &[&str]) -> QlResult<Expr> {
    let mut args = vec![series.into()];
    args.extend(labels.iter().map(|label| Arg::from(*label)));
    call("label_keep", args)
}
