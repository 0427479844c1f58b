//! Rule bundle: an ordered registry of alert and recording rules
//!
//! Rules are registered as zero-argument producers. Nothing is built until
//! [`RuleBundle::dump`] runs, so a producer can refer to any vector the bundle
//! hands out, and an authoring error surfaces when the bundle is dumped.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::ql::{metric, Duration, Expr, SelectedInstantVector};
use crate::rules::definition::{SimpleAlert, SimpleRecording};
use crate::rules::error::{RuleError, RuleResult};
use crate::rules::manifest::RuleGroup;
use crate::rules::naming::{rename_alert_rule, rename_recording_rule};
use crate::rules::realized::RealizedRule;

type AlertProducer = Box<dyn Fn() -> RuleResult<SimpleAlert> + Send + Sync>;
type RecordingProducer = Box<dyn Fn() -> RuleResult<SimpleRecording> + Send + Sync>;

enum Producer {
    Alert(AlertProducer),
    Recording(RecordingProducer),
}

struct Entry {
    name: String,
    producer: Producer,
}

impl Entry {
    fn realize(&self) -> RuleResult<RealizedRule> {
        let rule = match &self.producer {
            Producer::Alert(produce) => RealizedRule::Alert(produce()?.realize(&self.name)?),
            Producer::Recording(produce) => {
                RealizedRule::Recording(produce()?.realize(&self.name)?)
            }
        };
        debug!(rule = %self.name, expr = %rule.expr(), "Realized rule");
        Ok(rule)
    }
}

/// A named, insertion-ordered collection of rules
pub struct RuleBundle {
    name: String,
    interval: Option<Duration>,
    entries: Vec<Entry>,
    names: HashSet<String>,
}

impl RuleBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: None,
            entries: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Builder: evaluation interval for the bundle's rule group
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A plain selector for `name`, for use inside producers
    pub fn vector(&self, name: &str) -> RuleResult<Expr> {
        Ok(metric(name)?)
    }

    /// Register an alert producer under `identifier`.
    ///
    /// The rule is named by [`rename_alert_rule`]. Returns the series the alert
    /// fires as: `ALERTS{alertname="<Name>"}`.
    pub fn register_alert<F>(&mut self, identifier: &str, producer: F) -> RuleResult<Expr>
    where
        F: Fn() -> RuleResult<SimpleAlert> + Send + Sync + 'static,
    {
        self.register_alert_named(&rename_alert_rule(identifier), producer)
    }

    /// Register a recording producer under `identifier`.
    ///
    /// The rule is named by [`rename_recording_rule`]. Returns the recorded
    /// series with an empty selector: `name{}`.
    pub fn register_recording<F>(&mut self, identifier: &str, producer: F) -> RuleResult<Expr>
    where
        F: Fn() -> RuleResult<SimpleRecording> + Send + Sync + 'static,
    {
        self.register_recording_named(&rename_recording_rule(identifier), producer)
    }

    /// Register an alert producer named exactly `name`
    pub fn register_alert_named<F>(&mut self, name: &str, producer: F) -> RuleResult<Expr>
    where
        F: Fn() -> RuleResult<SimpleAlert> + Send + Sync + 'static,
    {
        self.insert(name.to_string(), Producer::Alert(Box::new(producer)))
    }

    /// Register a recording producer named exactly `name`, such as
    /// `job:http_requests:rate5m`
    pub fn register_recording_named<F>(&mut self, name: &str, producer: F) -> RuleResult<Expr>
    where
        F: Fn() -> RuleResult<SimpleRecording> + Send + Sync + 'static,
    {
        self.insert(name.to_string(), Producer::Recording(Box::new(producer)))
    }

    /// Register an alert on `expr` named exactly `name`
    pub fn alert(&mut self, expr: Expr, name: &str) -> RuleResult<Expr> {
        let rule = SimpleAlert::new(expr);
        self.insert(
            name.to_string(),
            Producer::Alert(Box::new(move || Ok::<_, RuleError>(rule.clone()))),
        )
    }

    /// Register a recording of `expr` named exactly `name`
    pub fn record(&mut self, expr: Expr, name: &str) -> RuleResult<Expr> {
        let rule = SimpleRecording::new(expr);
        self.insert(
            name.to_string(),
            Producer::Recording(Box::new(move || Ok::<_, RuleError>(rule.clone()))),
        )
    }

    fn insert(&mut self, name: String, producer: Producer) -> RuleResult<Expr> {
        if name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if self.names.contains(&name) {
            return Err(RuleError::DuplicateRule(name));
        }

        let output = match &producer {
            Producer::Alert(_) => metric("ALERTS")?.with_labels([("alertname", name.as_str())])?,
            Producer::Recording(_) => {
                Expr::Selected(SelectedInstantVector::new(name.as_str())?.with_empty_selector())
            }
        };

        debug!(bundle = %self.name, rule = %name, "Registered rule");
        self.names.insert(name.clone());
        self.entries.push(Entry { name, producer });
        Ok(output)
    }

    /// Realize every rule in registration order.
    ///
    /// Producers run as the iterator advances. The first error a producer
    /// returns is yielded as-is.
    pub fn dump(&self) -> impl Iterator<Item = RuleResult<RealizedRule>> + '_ {
        self.entries.iter().map(Entry::realize)
    }

    /// Realize the bundle as a rule group
    pub fn to_group(&self) -> RuleResult<RuleGroup> {
        let rules = self.dump().collect::<RuleResult<Vec<_>>>()?;
        Ok(RuleGroup {
            name: self.name.clone(),
            interval: self.interval,
            rules,
        })
    }
}

impl fmt::Debug for RuleBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<&str> = self.entries.iter().map(|entry| entry.name.as_str()).collect();
        f.debug_struct("RuleBundle")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("rules", &rules)
            .finish()
    }
}
