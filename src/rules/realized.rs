//! Realized rules: the serialized form of a rule
//!
//! Expressions are stored as their final query text. Optional fields that
//! the author did not supply are left out of the output entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ql::ast::validate_label_name;
use crate::ql::{Duration, Expr, ValueKind};
use crate::rules::definition::{SimpleAlert, SimpleRecording};
use crate::rules::error::{RuleError, RuleResult};

/// An alerting rule ready for a rule file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedAlert {
    pub alert: String,
    pub expr: String,
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_for: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// A recording rule ready for a rule file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedRecording {
    pub record: String,
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Either kind of realized rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RealizedRule {
    Alert(RealizedAlert),
    Recording(RealizedRecording),
}

impl RealizedRule {
    /// The alert or record name
    pub fn name(&self) -> &str {
        match self {
            RealizedRule::Alert(alert) => &alert.alert,
            RealizedRule::Recording(recording) => &recording.record,
        }
    }

    pub fn expr(&self) -> &str {
        match self {
            RealizedRule::Alert(alert) => &alert.expr,
            RealizedRule::Recording(recording) => &recording.expr,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, RealizedRule::Alert(_))
    }
}

impl SimpleAlert {
    /// Render into the serialized form under `name`
    pub fn realize(self, name: &str) -> RuleResult<RealizedAlert> {
        let expr = realize_expr(name, &self.expr)?;
        check_labels(self.labels.as_ref())?;

        Ok(RealizedAlert {
            alert: name.to_string(),
            expr,
            for_: self.for_,
            fire_for: self.fire_for,
            labels: self.labels,
            annotations: self.annotations,
        })
    }
}

impl SimpleRecording {
    /// Render into the serialized form under `name`
    pub fn realize(self, name: &str) -> RuleResult<RealizedRecording> {
        let expr = realize_expr(name, &self.expr)?;
        check_labels(self.labels.as_ref())?;

        Ok(RealizedRecording {
            record: name.to_string(),
            expr,
            labels: self.labels,
        })
    }
}

fn realize_expr(rule: &str, expr: &Expr) -> RuleResult<String> {
    if expr.value_kind() == ValueKind::Range {
        return Err(RuleError::InvalidExpression {
            rule: rule.to_string(),
            reason: format!(
                "{} evaluates to a range vector; wrap it in a function such as rate()",
                expr.variant_name()
            ),
        });
    }
    Ok(expr.format())
}

fn check_labels(labels: Option<&BTreeMap<String, String>>) -> RuleResult<()> {
    for name in labels.into_iter().flat_map(|labels| labels.keys()) {
        validate_label_name(name)?;
    }
    Ok(())
}
