//! Rule definitions returned by producers

use std::collections::BTreeMap;

use crate::ql::{Duration, Expr};

/// An alerting rule as authored
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleAlert {
    pub expr: Expr,
    /// How long the condition must hold before the alert fires
    pub for_: Option<Duration>,
    /// How long the alert keeps firing after the condition clears
    pub fire_for: Option<Duration>,
    pub labels: Option<BTreeMap<String, String>>,
    pub annotations: Option<BTreeMap<String, String>>,
}

impl SimpleAlert {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            for_: None,
            fire_for: None,
            labels: None,
            annotations: None,
        }
    }

    /// Builder: set `for`
    pub fn for_(mut self, duration: Duration) -> Self {
        self.for_ = Some(duration);
        self
    }

    /// Builder: set `fire_for`
    pub fn fire_for(mut self, duration: Duration) -> Self {
        self.fire_for = Some(duration);
        self
    }

    /// Builder: add a label
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Builder: add an annotation
    pub fn annotation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

/// A recording rule as authored
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleRecording {
    pub expr: Expr,
    pub labels: Option<BTreeMap<String, String>>,
}

impl SimpleRecording {
    pub fn new(expr: Expr) -> Self {
        Self { expr, labels: None }
    }

    /// Builder: add a label
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ql::{metric, MINUTE};

    #[test]
    fn test_alert_builder() {
        let alert = SimpleAlert::new(metric("up").unwrap())
            .for_(5 * MINUTE)
            .label("severity", "page")
            .label("severity", "warning")
            .annotation("summary", "Target down");

        assert_eq!(alert.for_, Some(5 * MINUTE));
        assert_eq!(alert.fire_for, None);
        let labels = alert.labels.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels["severity"], "warning");
        assert_eq!(alert.annotations.unwrap()["summary"], "Target down");
    }

    #[test]
    fn test_optionals_start_absent() {
        let recording = SimpleRecording::new(metric("up").unwrap());
        assert!(recording.labels.is_none());
        assert!(recording.label("a", "b").labels.is_some());
    }
}
