//! Builder surface for expression trees
//!
//! Every method takes `&self` and returns a new node, so existing trees are
//! never modified. All legality checks happen here: an illegal combination is
//! rejected with [`QlError`] at construction time, never at render time.
//!
//! Arithmetic is also available through the standard operators. They return
//! `QlResult<Expr>` like the named methods:
//!
//! ```rust,ignore
//! let errors = (ql::rate(ql::metric("http_errors_total")?.sliced(5 * ql::MINUTE)?)? * 100)?;
//! let ratio = errors.div(&total)?.on(["job"])?;
//! ```

use std::sync::Arc;

use crate::ql::ast::*;
use crate::ql::duration::Duration;
use crate::ql::error::{QlError, QlResult};

/// Combine two operands with a binary operator.
///
/// Raw numbers are promoted to scalar literals. A raw number on the left is
/// only accepted by arithmetic operators.
pub fn binop(
    left: impl Into<Operand>,
    kind: BinopKind,
    right: impl Into<Operand>,
) -> QlResult<Expr> {
    let left = left.into();
    let right = right.into();

    if !kind.is_legal(&left, &right) {
        return Err(QlError::OperatorNotSupported {
            op: kind.symbol(),
            left: left.variant_name(),
            right: right.variant_name(),
        });
    }

    Ok(Expr::Binary(BinaryOp {
        kind,
        left: Arc::new(left.into_expr()),
        right: Arc::new(right.into_expr()),
        matching: None,
        return_bool: false,
    }))
}

macro_rules! binop_methods {
    ($($(#[$doc:meta])* $method:ident => $kind:ident;)*) => {
        impl Expr {
            $(
                $(#[$doc])*
                pub fn $method(&self, rhs: impl Into<Operand>) -> QlResult<Expr> {
                    binop(self.clone(), BinopKind::$kind, rhs)
                }
            )*
        }
    };
}

binop_methods! {
    /// `self + rhs`
    add => Add;
    /// `self - rhs`
    sub => Sub;
    /// `self * rhs`
    mul => Mul;
    /// `self / rhs`
    div => Div;
    /// `self % rhs`
    rem => Mod;
    /// `self ^ rhs`
    pow => Pow;
    /// `self == rhs`
    compare_eq => Eq;
    /// `self != rhs`
    compare_ne => Ne;
    /// `self > rhs`
    compare_gt => Gt;
    /// `self >= rhs`
    compare_ge => Ge;
    /// `self < rhs`
    compare_lt => Lt;
    /// `self <= rhs`
    compare_le => Le;
    /// `self and rhs`
    and => And;
    /// `self or rhs`
    or => Or;
    /// `self unless rhs`
    unless => Unless;
    /// `self atan2 rhs`
    atan2 => Atan2;
}

macro_rules! arithmetic_operator {
    ($op:ident, $method:ident, $kind:ident) => {
        impl<R: Into<Operand>> std::ops::$op<R> for Expr {
            type Output = QlResult<Expr>;

            fn $method(self, rhs: R) -> QlResult<Expr> {
                binop(self, BinopKind::$kind, rhs)
            }
        }

        impl<R: Into<Operand>> std::ops::$op<R> for &Expr {
            type Output = QlResult<Expr>;

            fn $method(self, rhs: R) -> QlResult<Expr> {
                binop(self.clone(), BinopKind::$kind, rhs)
            }
        }

        impl std::ops::$op<Expr> for f64 {
            type Output = QlResult<Expr>;

            fn $method(self, rhs: Expr) -> QlResult<Expr> {
                binop(self, BinopKind::$kind, rhs)
            }
        }

        impl std::ops::$op<&Expr> for f64 {
            type Output = QlResult<Expr>;

            fn $method(self, rhs: &Expr) -> QlResult<Expr> {
                binop(self, BinopKind::$kind, rhs)
            }
        }
    };
}

arithmetic_operator!(Add, add, Add);
arithmetic_operator!(Sub, sub, Sub);
arithmetic_operator!(Mul, mul, Mul);
arithmetic_operator!(Div, div, Div);
arithmetic_operator!(Rem, rem, Mod);

fn collect_labels<I, S>(labels: I) -> QlResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels
        .into_iter()
        .map(|label| {
            let label = label.into();
            validate_label_name(&label)?;
            Ok(label)
        })
        .collect()
}

impl Expr {
    /// Attach exact-match label matchers to a selector.
    ///
    /// Existing matchers are kept; a repeated label name takes the new value
    /// in its original position.
    pub fn with_labels<I, K, V>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let Expr::Selected(vector) = self else {
            return Err(QlError::illegal_modifier(
                "label selector",
                self.variant_name(),
                "only a selected instant vector accepts label matchers",
            ));
        };

        let mut matchers = vector.matchers.clone().unwrap_or_default();
        for (name, value) in labels {
            let name = name.into();
            validate_label_name(&name)?;
            let value = value.into();

            match matchers.iter_mut().find(|m| m.name == name) {
                Some(existing) => existing.value = value,
                None => matchers.push(LabelMatcher { name, value }),
            }
        }

        Ok(Expr::Selected(SelectedInstantVector {
            name: vector.name.clone(),
            matchers: Some(matchers),
        }))
    }

    /// Slice a selector over a trailing window: `up[5m]`
    pub fn sliced(&self, range: Duration) -> QlResult<Expr> {
        match self {
            Expr::Selected(vector) => {
                if range <= Duration::ZERO {
                    return Err(QlError::illegal_modifier(
                        "range selector",
                        self.variant_name(),
                        format!("range must be positive, got {}", range),
                    ));
                }
                Ok(Expr::Range(RangeVector {
                    vector: vector.clone(),
                    range,
                }))
            }
            Expr::Range(_) => Err(QlError::illegal_modifier(
                "range selector",
                self.variant_name(),
                "a range vector cannot be sliced again",
            )),
            _ => Err(QlError::illegal_modifier(
                "range selector",
                self.variant_name(),
                "only a selected instant vector can be range-sliced, use a subquery instead",
            )),
        }
    }

    /// Evaluate this expression over a window: `(a * b)[4m:1s]`.
    ///
    /// Passing `None` as the step leaves it to the engine: `(a * b)[4m:]`.
    pub fn subqueried(&self, range: Duration, step: impl Into<Option<Duration>>) -> QlResult<Expr> {
        let step = step.into();

        let kind = self.value_kind();
        if kind != ValueKind::Instant {
            return Err(QlError::illegal_modifier(
                "subquery",
                self.variant_name(),
                format!("only an instant vector can be subqueried, got a {}", kind),
            ));
        }
        if range <= Duration::ZERO {
            return Err(QlError::illegal_modifier(
                "subquery",
                self.variant_name(),
                format!("range must be positive, got {}", range),
            ));
        }
        if let Some(step) = step.filter(|step| *step <= Duration::ZERO) {
            return Err(QlError::illegal_modifier(
                "subquery",
                self.variant_name(),
                format!("step must be positive, got {}", step),
            ));
        }

        Ok(Expr::Subquery(Subquery {
            inner: Arc::new(self.clone()),
            range,
            step,
        }))
    }

    /// Shift evaluation time back: `x offset 5m`
    pub fn offset_by(&self, offset: Duration) -> QlResult<Expr> {
        self.with_modifier(Modifier::Offset(offset))
    }

    /// Pin evaluation time: `x @ 1700000000.0` or `x @ other_expr`
    pub fn at(&self, target: impl Into<AtTarget>) -> QlResult<Expr> {
        let target = target.into();

        if let AtTarget::Expr(expr) = &target {
            if expr.value_kind() == ValueKind::Range {
                return Err(QlError::TypeMismatch {
                    function: "@".to_string(),
                    detail: format!(
                        "timestamp expected scalar or instant vector, got {} ({})",
                        ValueKind::Range,
                        expr.variant_name()
                    ),
                });
            }
        }

        self.with_modifier(Modifier::At(target))
    }

    fn with_modifier(&self, modifier: Modifier) -> QlResult<Expr> {
        let keyword = modifier.keyword();

        if self.value_kind() == ValueKind::Scalar {
            return Err(QlError::illegal_modifier(
                keyword,
                self.variant_name(),
                "scalar expressions have no evaluation time to modify",
            ));
        }

        // Walk the chain of modifiers directly wrapping the target.
        let mut current = self;
        while let Expr::Derived(derived) = current {
            if derived.modifier.keyword() == keyword {
                return Err(QlError::illegal_modifier(
                    keyword,
                    self.variant_name(),
                    format!("'{}' is already applied to this expression", keyword),
                ));
            }
            current = &derived.inner;
        }

        Ok(Expr::Derived(DerivedInstantVector {
            inner: Arc::new(self.clone()),
            modifier,
        }))
    }

    /// Group an aggregation by the given labels: `sum(x) by(job)`
    pub fn by<I, S>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_grouping(GroupingKind::By, collect_labels(labels)?)
    }

    /// Aggregate away the given labels: `sum(x) without(instance)`
    pub fn without<I, S>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_grouping(GroupingKind::Without, collect_labels(labels)?)
    }

    fn with_grouping(&self, kind: GroupingKind, labels: Vec<String>) -> QlResult<Expr> {
        match self {
            Expr::Aggregate(aggregate) if aggregate.grouping.is_some() => {
                Err(QlError::illegal_modifier(
                    kind.keyword(),
                    self.variant_name(),
                    "a grouping is already attached",
                ))
            }
            Expr::Aggregate(aggregate) => Ok(Expr::Aggregate(AggregateOp {
                function: aggregate.function.clone(),
                args: aggregate.args.clone(),
                grouping: Some(Grouping { kind, labels }),
            })),
            _ => Err(QlError::illegal_modifier(
                kind.keyword(),
                self.variant_name(),
                "grouping is only legal on aggregation operators",
            )),
        }
    }

    /// Match series only on these labels: `a * on(job) b`
    pub fn on<I, S>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_matching(MatchingKind::On, collect_labels(labels)?)
    }

    /// Match series on all but these labels: `a * ignoring(instance) b`
    pub fn ignoring<I, S>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_matching(MatchingKind::Ignoring, collect_labels(labels)?)
    }

    /// Many-to-one matching, copying `labels` from the right side
    pub fn group_left<I, S>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_group(GroupSide::Left, collect_labels(labels)?)
    }

    /// One-to-many matching, copying `labels` from the left side
    pub fn group_right<I, S>(&self, labels: I) -> QlResult<Expr>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_group(GroupSide::Right, collect_labels(labels)?)
    }

    /// Make a comparison return 0/1 instead of filtering: `a > bool b`
    pub fn as_bool(&self) -> QlResult<Expr> {
        let op = self.as_binary("bool")?;

        if op.kind.category() != BinopCategory::Comparison {
            return Err(QlError::illegal_modifier(
                "bool",
                self.variant_name(),
                format!("'{}' is not a comparison operator", op.kind),
            ));
        }
        if op.return_bool {
            return Err(QlError::illegal_modifier(
                "bool",
                self.variant_name(),
                "'bool' is already applied",
            ));
        }

        Ok(Expr::Binary(BinaryOp {
            return_bool: true,
            ..op.clone()
        }))
    }

    fn as_binary(&self, modifier: &'static str) -> QlResult<&BinaryOp> {
        match self {
            Expr::Binary(op) => Ok(op),
            _ => Err(QlError::illegal_modifier(
                modifier,
                self.variant_name(),
                "vector matching is only legal on binary operations",
            )),
        }
    }

    fn with_matching(&self, kind: MatchingKind, labels: Vec<String>) -> QlResult<Expr> {
        let op = self.as_binary(kind.keyword())?;

        if op.matching.is_some() {
            return Err(QlError::illegal_modifier(
                kind.keyword(),
                self.variant_name(),
                "vector matching is already specified",
            ));
        }

        Ok(Expr::Binary(BinaryOp {
            matching: Some(VectorMatching {
                kind,
                labels,
                group: None,
            }),
            ..op.clone()
        }))
    }

    fn with_group(&self, side: GroupSide, labels: Vec<String>) -> QlResult<Expr> {
        let op = self.as_binary(side.keyword())?;

        if op.kind.category() == BinopCategory::Set {
            return Err(QlError::illegal_modifier(
                side.keyword(),
                self.variant_name(),
                format!("set operator '{}' is always many-to-many", op.kind),
            ));
        }
        let Some(matching) = &op.matching else {
            return Err(QlError::illegal_modifier(
                side.keyword(),
                self.variant_name(),
                "requires on() or ignoring() first",
            ));
        };
        if matching.group.is_some() {
            return Err(QlError::illegal_modifier(
                side.keyword(),
                self.variant_name(),
                "a group modifier is already attached",
            ));
        }

        Ok(Expr::Binary(BinaryOp {
            matching: Some(VectorMatching {
                group: Some(GroupModifier { side, labels }),
                ..matching.clone()
            }),
            ..op.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ql::duration::{MINUTE, SECOND};

    fn vector(name: &str) -> Expr {
        metric(name).unwrap()
    }

    #[test]
    fn test_builders_do_not_mutate() {
        let base = vector("up");
        let selected = base.with_labels([("job", "api")]).unwrap();
        let _ = base.offset_by(5 * MINUTE).unwrap();

        assert_eq!(base, vector("up"));
        assert_ne!(base, selected);
    }

    #[test]
    fn test_with_labels_merges() {
        let expr = vector("up")
            .with_labels([("job", "api"), ("env", "prod")])
            .unwrap()
            .with_labels([("job", "web")])
            .unwrap();

        let Expr::Selected(selected) = expr else {
            panic!("expected a selector");
        };
        let pairs: Vec<_> = selected
            .matchers()
            .iter()
            .map(|m| (m.name(), m.value()))
            .collect();
        assert_eq!(pairs, vec![("job", "web"), ("env", "prod")]);
    }

    #[test]
    fn test_with_labels_illegal_on_range_and_subquery() {
        let range = vector("up").sliced(5 * MINUTE).unwrap();
        let err = range.with_labels([("a", "b")]).unwrap_err();
        assert!(matches!(err, QlError::IllegalModifier { target: "RangeVector", .. }));

        let subquery = vector("up").subqueried(5 * MINUTE, SECOND).unwrap();
        let err = subquery.with_labels([("a", "b")]).unwrap_err();
        assert!(matches!(err, QlError::IllegalModifier { target: "Subquery", .. }));
    }

    #[test]
    fn test_with_labels_rejects_bad_label_name() {
        let err = vector("up").with_labels([("bad-name", "x")]).unwrap_err();
        assert!(matches!(err, QlError::InvalidName(_)));
    }

    #[test]
    fn test_reslicing_range_is_illegal() {
        let range = vector("up").sliced(5 * MINUTE).unwrap();
        let err = range.sliced(MINUTE).unwrap_err();
        assert!(matches!(
            err,
            QlError::IllegalModifier {
                modifier: "range selector",
                target: "RangeVector",
                ..
            }
        ));
    }

    #[test]
    fn test_slicing_requires_selector_and_positive_range() {
        let sum = vector("a").add(vector("b")).unwrap();
        assert!(sum.sliced(MINUTE).is_err());
        assert!(vector("up").sliced(Duration::ZERO).is_err());
    }

    #[test]
    fn test_subquery_rules() {
        let product = vector("left").mul(vector("right")).unwrap();
        assert!(matches!(
            product.subqueried(4 * MINUTE, SECOND).unwrap(),
            Expr::Subquery(_)
        ));
        assert!(product.subqueried(4 * MINUTE, None).is_ok());

        let range = vector("up").sliced(MINUTE).unwrap();
        assert!(range.subqueried(4 * MINUTE, SECOND).is_err());

        let subquery = product.subqueried(4 * MINUTE, SECOND).unwrap();
        assert!(subquery.subqueried(10 * MINUTE, SECOND).is_err());
        assert!(product.subqueried(4 * MINUTE, Duration::ZERO).is_err());
    }

    #[test]
    fn test_subquery_rejects_scalars() {
        let err = literal(1.0).subqueried(5 * MINUTE, None).unwrap_err();
        assert!(matches!(
            err,
            QlError::IllegalModifier {
                modifier: "subquery",
                target: "ScalarLiteral",
                ..
            }
        ));

        let scalar_sum = literal(1.0).add(2.0).unwrap();
        assert!(scalar_sum.subqueried(5 * MINUTE, SECOND).is_err());

        let pinned = vector("up").offset_by(MINUTE).unwrap();
        assert!(pinned.subqueried(5 * MINUTE, SECOND).is_ok());
    }

    #[test]
    fn test_binop_promotes_raw_numbers() {
        let expr = binop(vector("up"), BinopKind::Mul, 42).unwrap();
        let Expr::Binary(op) = expr else {
            panic!("expected a binary op");
        };
        assert_eq!(*op.right(), literal(42.0));
    }

    #[test]
    fn test_raw_left_rejected_for_non_arithmetic() {
        for kind in BinopKind::ALL {
            let result = binop(5.0, kind, vector("right"));
            if kind.category() == BinopCategory::Arithmetic {
                assert!(result.is_ok(), "{kind}");
            } else {
                assert_eq!(
                    result.unwrap_err(),
                    QlError::OperatorNotSupported {
                        op: kind.symbol(),
                        left: "float",
                        right: "SelectedInstantVector",
                    }
                );
            }
        }
    }

    #[test]
    fn test_range_operands_rejected() {
        let range = vector("up").sliced(MINUTE).unwrap();
        let err = range.add(1.0).unwrap_err();
        assert!(matches!(
            err,
            QlError::OperatorNotSupported {
                left: "RangeVector",
                ..
            }
        ));
    }

    #[test]
    fn test_operator_overloads() {
        let up = vector("up");
        assert_eq!((&up * 2).unwrap(), up.mul(2.0).unwrap());
        assert_eq!((2.0 - &up).unwrap(), binop(2.0, BinopKind::Sub, &up).unwrap());
        assert!((up % 3.0).is_ok());
    }

    #[test]
    fn test_offset_and_at_stacking() {
        let up = vector("up");
        let shifted = up.offset_by(5 * MINUTE).unwrap();
        assert!(shifted.offset_by(MINUTE).is_err());

        let pinned = shifted.at(1_700_000_000).unwrap();
        assert!(pinned.at(10).is_err());
        assert!(pinned.offset_by(MINUTE).is_err());

        // A call in between starts a fresh evaluation context
        let range = up.sliced(MINUTE).unwrap().offset_by(MINUTE).unwrap();
        assert_eq!(range.value_kind(), ValueKind::Range);
    }

    #[test]
    fn test_modifiers_rejected_on_scalars() {
        assert!(literal(1.0).offset_by(MINUTE).is_err());
        assert!(literal(1.0).at(7).is_err());
    }

    #[test]
    fn test_at_rejects_range_target() {
        let range = vector("ts").sliced(MINUTE).unwrap();
        let err = vector("up").at(range).unwrap_err();
        match err {
            QlError::TypeMismatch { function, detail } => {
                assert_eq!(function, "@");
                assert!(detail.contains("range vector"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_grouping_only_on_aggregates() {
        let err = vector("up").by(["job"]).unwrap_err();
        assert!(matches!(
            err,
            QlError::IllegalModifier {
                modifier: "by",
                target: "SelectedInstantVector",
                ..
            }
        ));
    }

    #[test]
    fn test_grouping_reattachment_is_illegal() {
        let aggregate = Expr::Aggregate(AggregateOp {
            function: "sum".to_string(),
            args: vec![CallArg::Expr(Arc::new(vector("up")))],
            grouping: None,
        });
        let grouped = aggregate.by(["job"]).unwrap();
        assert!(grouped.without(["instance"]).is_err());
        assert!(grouped.by(["env"]).is_err());
    }

    #[test]
    fn test_vector_matching_rules() {
        let product = vector("a").mul(vector("b")).unwrap();

        let matched = product.on(["job"]).unwrap();
        assert!(matched.ignoring(["instance"]).is_err());
        assert!(matched.group_left(["team"]).unwrap().group_right(["x"]).is_err());

        assert!(product.group_left(["team"]).is_err());
        assert!(vector("a").on(["job"]).is_err());

        let set = vector("a").and(vector("b")).unwrap().on(["job"]).unwrap();
        assert!(set.group_left(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_bool_only_on_comparisons() {
        let cmp = vector("a").compare_gt(1.0).unwrap();
        let boolean = cmp.as_bool().unwrap();
        assert!(boolean.as_bool().is_err());
        assert!(vector("a").add(1.0).unwrap().as_bool().is_err());
    }
}
