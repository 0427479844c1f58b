//! Alerting and recording rules
//!
//! This module turns expressions into rule manifests:
//!
//! - **definition**: `SimpleAlert` / `SimpleRecording`, the rules as authored
//! - **realized**: the serialized rule records
//! - **naming**: identifier → rule name transforms
//! - **bundle**: `RuleBundle`, an ordered registry of rule producers
//! - **manifest**: rule groups and rule files (YAML/JSON)
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust
//! use rulesmith::ql::{self, MINUTE};
//! use rulesmith::rules::{RuleBundle, RuleResult, SimpleAlert};
//!
//! fn main() -> RuleResult<()> {
//!     let mut rules = RuleBundle::new("api");
//!
//!     rules.register_alert("high_error_rate", || {
//!         let errors = ql::rate(ql::metric("http_errors_total")?.sliced(5 * MINUTE)?)?;
//!         Ok(SimpleAlert::new(errors.compare_gt(0.5)?).for_(10 * MINUTE))
//!     })?;
//!
//!     for rule in rules.dump() {
//!         let rule = rule?;
//!         assert_eq!(rule.name(), "HighErrorRate");
//!         assert_eq!(rule.expr(), "rate(http_errors_total[5m]) > 0.5");
//!     }
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod definition;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod realized;

// Re-export commonly used types
pub use bundle::RuleBundle;
pub use definition::{SimpleAlert, SimpleRecording};
pub use error::{RuleError, RuleResult};
pub use manifest::{build_rule_file, render_manifest, OutputFormat, RuleFile, RuleGroup};
pub use naming::{rename_alert_rule, rename_recording_rule};
pub use realized::{RealizedAlert, RealizedRecording, RealizedRule};
