//! Expression renderer
//!
//! Turns a node tree into query text. Two passes share one walker:
//!
//! - [`Expr::render`] gives the raw fragment for a node. Binary operations
//!   always bracket themselves, so `a + b` renders as `(a + b)`.
//! - [`format`] gives the final query text: the same walk with only the
//!   brackets the precedence table requires, followed by whitespace
//!   normalization.
//!
//! Modifiers are printed in the order they were applied. Nothing is reordered.

use std::fmt;

use crate::ql::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Raw,
    Minimal,
}

impl Expr {
    /// Raw text of this node, binary operations bracketed.
    ///
    /// A negative literal on the left of `^` keeps its own brackets as well,
    /// so `-2.0 ^ 2.0` renders as `((-2.0) ^ 2.0)` rather than `(-2.0 ^ 2.0)`,
    /// which the engine would read as `-(2.0 ^ 2.0)`.
    pub fn render(&self) -> String {
        render_node(self, Style::Raw)
    }

    /// Final query text with minimal brackets and normalized whitespace
    pub fn format(&self) -> String {
        normalize_whitespace(&render_node(self, Style::Minimal))
    }
}

/// Render `expr` as the exact text the query engine accepts
pub fn format(expr: &Expr) -> String {
    expr.format()
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn render_node(expr: &Expr, style: Style) -> String {
    match expr {
        Expr::Scalar(literal) => format_float(literal.value),
        Expr::Selected(vector) => render_selector(vector),
        Expr::Derived(derived) => {
            let inner = render_child(&derived.inner, Precedence::Modifier, false, style);
            match &derived.modifier {
                Modifier::Offset(offset) => format!("{} offset {}", inner, offset),
                Modifier::At(AtTarget::Timestamp(seconds)) => {
                    format!("{} @ {}", inner, format_float(*seconds))
                }
                Modifier::At(AtTarget::Expr(target)) => {
                    let target = render_child(target, Precedence::Atom, false, style);
                    format!("{} @ {}", inner, target)
                }
            }
        }
        Expr::Range(range) => format!("{}[{}]", render_selector(&range.vector), range.range),
        Expr::Subquery(subquery) => {
            let inner = render_child(&subquery.inner, Precedence::Atom, false, style);
            let step = subquery.step.map(|step| step.to_string()).unwrap_or_default();
            format!("{}[{}:{}]", inner, subquery.range, step)
        }
        Expr::Call(call) => format!("{}({})", call.function, render_args(&call.args, style)),
        Expr::Aggregate(aggregate) => {
            let mut out = format!(
                "{}({})",
                aggregate.function,
                render_args(&aggregate.args, style)
            );
            if let Some(grouping) = &aggregate.grouping {
                out.push_str(&format!(
                    " {}({})",
                    grouping.kind.keyword(),
                    grouping.labels.join(",")
                ));
            }
            out
        }
        Expr::Binary(op) => {
            let body = render_binary(op, style);
            match style {
                Style::Raw => format!("({})", body),
                Style::Minimal => body,
            }
        }
    }
}

fn render_binary(op: &BinaryOp, style: Style) -> String {
    let tier = op.kind.precedence();
    let right_assoc = op.kind.is_right_associative();

    let left = render_child(&op.left, tier, right_assoc, style);
    let right = render_child(&op.right, tier, !right_assoc, style);

    let mut operator = op.kind.symbol().to_string();
    if op.return_bool {
        operator.push_str(" bool");
    }
    if let Some(matching) = &op.matching {
        operator.push_str(&format!(
            " {}({})",
            matching.kind.keyword(),
            matching.labels.join(",")
        ));
        if let Some(group) = &matching.group {
            operator.push_str(&format!(
                " {}({})",
                group.side.keyword(),
                group.labels.join(",")
            ));
        }
    }

    format!("{} {} {}", left, operator, right)
}

/// Render a child in a position that requires at least `required` binding.
///
/// `bracket_on_tie` brackets a child of exactly `required` strength, for the
/// non-associative side of a binary operator.
fn render_child(child: &Expr, required: Precedence, bracket_on_tie: bool, style: Style) -> String {
    let text = render_node(child, style);
    let binding = effective_precedence(child, style);

    if binding < required || (bracket_on_tie && binding == required) {
        format!("({})", text)
    } else {
        text
    }
}

/// Raw binary operations carry their own brackets
fn effective_precedence(expr: &Expr, style: Style) -> Precedence {
    match (expr, style) {
        (Expr::Binary(_), Style::Raw) => Precedence::Atom,
        _ => expr.precedence(),
    }
}

fn render_args(args: &[CallArg], style: Style) -> String {
    args.iter()
        .map(|arg| match arg {
            CallArg::Expr(expr) => render_child(expr, Precedence::Or, false, style),
            CallArg::Str(text) => quote(text),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_selector(vector: &SelectedInstantVector) -> String {
    match &vector.matchers {
        None => vector.name.clone(),
        Some(matchers) => {
            let body = matchers
                .iter()
                .map(|m| format!("{}={}", m.name, quote(&m.value)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{}{{{}}}", vector.name, body)
        }
    }
}

/// Quote a string literal: backslashes first, then double quotes
pub(crate) fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Print a number the way the engine reads it back; integral values keep a
/// fractional part (`42.0`)
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Inf" } else { "-Inf" };
        text.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Collapse whitespace runs outside string literals to one space and trim
pub(crate) fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_space = false;

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;

        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ql::builder::binop;
    use crate::ql::duration::{MINUTE, SECOND};
    use crate::ql::functions::{avg, label_match, label_replace, rate, sum};
    use pretty_assertions::assert_eq;

    fn vector(name: &str) -> Expr {
        metric(name).unwrap()
    }

    fn example_vector() -> Expr {
        vector("example_vector")
            .with_labels([("instance", "foo")])
            .unwrap()
    }

    #[test]
    fn test_arithmetic_render_brackets_each_operation() {
        let operands = [literal(42.0), literal(5.0), vector("left"), vector("right")];

        for kind in BinopKind::ALL {
            for left in &operands {
                for right in &operands {
                    let result = binop(left, kind, right).unwrap();
                    assert_eq!(
                        result.render(),
                        format!("({} {} {})", left.render(), kind.symbol(), right.render())
                    );
                }
            }
        }
    }

    #[test]
    fn test_raw_operand_renders_as_float() {
        let expr = binop(5.0, BinopKind::Add, vector("test")).unwrap();
        assert_eq!(expr.render(), "(5.0 + test)");

        let expr = binop(vector("left"), BinopKind::Gt, 42.0).unwrap();
        assert_eq!(expr.render(), "(left > 42.0)");
    }

    #[test]
    fn test_selectors() {
        assert_eq!(format(&example_vector()), r#"example_vector{instance="foo"}"#);
        assert_eq!(
            format(&example_vector().sliced(4 * MINUTE).unwrap()),
            r#"example_vector{instance="foo"}[4m]"#
        );
        assert_eq!(
            format(
                &vector("up")
                    .with_labels([("job", "api"), ("env", "prod")])
                    .unwrap()
            ),
            r#"up{job="api",env="prod"}"#
        );
    }

    #[test]
    fn test_label_value_escaping() {
        let expr = vector("example_vector")
            .with_labels([("instance", r#""fo\.o"#)])
            .unwrap();
        assert_eq!(format(&expr), r#"example_vector{instance="\"fo\\.o"}"#);
    }

    #[test]
    fn test_rate_times_scalar() {
        let rated = rate(example_vector().sliced(4 * MINUTE).unwrap()).unwrap();
        assert_eq!(format(&rated), r#"rate(example_vector{instance="foo"}[4m])"#);

        let expected = r#"rate(example_vector{instance="foo"}[4m]) * 42.0"#;
        assert_eq!(format(&(&rated * 42).unwrap()), expected);
        assert_eq!(format(&rated.mul(literal(42.0)).unwrap()), expected);
    }

    #[test]
    fn test_vector_matching() {
        let rated = rate(example_vector().sliced(4 * MINUTE).unwrap()).unwrap();
        let expr = rated.mul(literal(42.0)).unwrap().on(["hostname"]).unwrap();
        assert_eq!(
            format(&expr),
            r#"rate(example_vector{instance="foo"}[4m]) * on(hostname) 42.0"#
        );

        let expr = vector("a")
            .div(vector("b"))
            .unwrap()
            .ignoring(["instance"])
            .unwrap()
            .group_left(["team", "owner"])
            .unwrap();
        assert_eq!(format(&expr), "a / ignoring(instance) group_left(team,owner) b");

        let expr = vector("a").compare_gt(1.0).unwrap().as_bool().unwrap();
        assert_eq!(format(&expr), "a > bool 1.0");
    }

    #[test]
    fn test_grouping() {
        let averaged = avg(example_vector()).unwrap();
        assert_eq!(
            format(&averaged.by(["hostname", "colo"]).unwrap()),
            r#"avg(example_vector{instance="foo"}) by(hostname,colo)"#
        );
        assert_eq!(
            format(&averaged.without(["hostname", "colo"]).unwrap()),
            r#"avg(example_vector{instance="foo"}) without(hostname,colo)"#
        );
        assert_eq!(
            avg(vector("V")).unwrap().by(["hostname", "colo"]).unwrap().render(),
            "avg(V) by(hostname,colo)"
        );
    }

    #[test]
    fn test_subquery_of_binary() {
        let product = vector("left")
            .with_labels([("instance", "foo")])
            .unwrap()
            .mul(vector("right"))
            .unwrap();
        let expr = rate(product.subqueried(4 * MINUTE, SECOND).unwrap()).unwrap();
        assert_eq!(format(&expr), r#"rate((left{instance="foo"} * right)[4m:1s])"#);

        let expr = product.subqueried(4 * MINUTE, None).unwrap();
        assert_eq!(format(&expr), r#"(left{instance="foo"} * right)[4m:]"#);
    }

    #[test]
    fn test_at_modifier() {
        assert_eq!(format(&vector("test").at(7).unwrap()), "test @ 7.0");

        let offset_vector = vector("offset_vector")
            .with_labels([("something", "foo")])
            .unwrap();
        assert_eq!(
            format(&vector("test").at(&offset_vector).unwrap()),
            r#"test @ offset_vector{something="foo"}"#
        );
    }

    #[test]
    fn test_modifier_nesting_follows_build_order() {
        let offset_vector = vector("offset_vector")
            .with_labels([("something", "foo")])
            .unwrap();
        let pinned = vector("test").at(offset_vector).unwrap();
        let rated = rate(pinned.subqueried(4 * MINUTE, SECOND).unwrap()).unwrap();
        assert_eq!(
            format(&rated),
            r#"rate((test @ offset_vector{something="foo"})[4m:1s])"#
        );

        let shifted = rated.offset_by(10 * MINUTE + 5 * SECOND).unwrap();
        assert_eq!(
            format(&shifted),
            r#"rate((test @ offset_vector{something="foo"})[4m:1s]) offset 10m5s"#
        );
        assert_eq!(
            shifted.render(),
            r#"rate((test @ offset_vector{something="foo"})[4m:1s]) offset 10m5s"#
        );
    }

    #[test]
    fn test_offset() {
        assert_eq!(format(&vector("test").offset_by(7 * SECOND).unwrap()), "test offset 7s");
        assert_eq!(
            format(&vector("up").sliced(5 * MINUTE).unwrap().offset_by(MINUTE).unwrap()),
            "up[5m] offset 1m"
        );
        let sum_offset = vector("a").add(vector("b")).unwrap().offset_by(MINUTE).unwrap();
        assert_eq!(format(&sum_offset), "(a + b) offset 1m");
    }

    #[test]
    fn test_string_arguments() {
        let expr = label_replace(vector("test"), "dest", "bar", "source", ".*").unwrap();
        assert_eq!(format(&expr), r#"label_replace(test, "dest", "bar", "source", ".*")"#);

        let expr = label_match(vector("test"), "foo", r"foo\|bar").unwrap();
        assert_eq!(format(&expr), r#"label_match(test, "foo", "foo\\|bar")"#);
    }

    #[test]
    fn test_minimal_brackets_follow_precedence() {
        let (a, b, c) = (vector("a"), vector("b"), vector("c"));

        let expr = a.add(&b).unwrap().mul(&c).unwrap();
        assert_eq!(expr.render(), "((a + b) * c)");
        assert_eq!(format(&expr), "(a + b) * c");

        let expr = a.add(b.mul(&c).unwrap()).unwrap();
        assert_eq!(format(&expr), "a + b * c");

        // Left-associative operators keep brackets on the right
        let expr = a.sub(b.sub(&c).unwrap()).unwrap();
        assert_eq!(format(&expr), "a - (b - c)");
        let expr = a.sub(&b).unwrap().sub(&c).unwrap();
        assert_eq!(format(&expr), "a - b - c");

        // Power is right-associative
        let expr = a.pow(b.pow(&c).unwrap()).unwrap();
        assert_eq!(format(&expr), "a ^ b ^ c");
        let expr = a.pow(&b).unwrap().pow(&c).unwrap();
        assert_eq!(format(&expr), "(a ^ b) ^ c");

        // `and` binds tighter than `or`
        let expr = a.or(&b).unwrap().and(&c).unwrap();
        assert_eq!(format(&expr), "(a or b) and c");
        let expr = a.or(b.and(&c).unwrap()).unwrap();
        assert_eq!(format(&expr), "a or b and c");

        let expr = binop(-2.0, BinopKind::Pow, 2.0).unwrap();
        assert_eq!(format(&expr), "(-2.0) ^ 2.0");
        assert_eq!(expr.render(), "((-2.0) ^ 2.0)");
    }

    #[test]
    fn test_aggregate_arguments_are_unbracketed() {
        let expr = sum(vector("a").add(vector("b")).unwrap()).unwrap();
        assert_eq!(expr.render(), "sum((a + b))");
        assert_eq!(format(&expr), "sum(a + b)");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(42.0), "42.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::INFINITY), "Inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a  *\n 42.0 "), "a * 42.0");
        assert_eq!(
            normalize_whitespace(r#"up{job="a  \"  b"}   > 1"#),
            r#"up{job="a  \"  b"} > 1"#
        );
    }

    #[test]
    fn test_display_matches_format() {
        let expr = vector("a").add(1.0).unwrap();
        assert_eq!(expr.to_string(), "a + 1.0");
    }
}
