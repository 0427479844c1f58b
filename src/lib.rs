//! # Rulesmith
//!
//! Typed construction of PromQL/MetricsQL expressions and alerting/recording
//! rule manifests.
//!
//! ## Features
//!
//! - **Well-formed by construction**: every illegal operator, modifier or
//!   argument is rejected while the tree is built, so rendering never fails
//! - **Exact query text**: precedence-aware bracketing, escaping and
//!   canonical durations (`10m5s`)
//! - **Rule bundles**: ordered registries of alert and recording rules that
//!   dump to YAML or JSON rule files
//!
//! ## Modules
//!
//! - [`ql`]: Expression algebra, builders, renderer and function constructors
//! - [`rules`]: Rule bundles, naming transforms and manifests
//! - [`config`]: Configuration loading
//!
//! ## Quick Start
//!
//! ```rust
//! use rulesmith::ql::{self, MINUTE};
//! use rulesmith::rules::{RuleBundle, SimpleRecording};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut rules = RuleBundle::new("example");
//!
//!     // Record the per-job request rate
//!     let rate = rules.register_recording("job_requests_rate5m", || {
//!         let requests = ql::metric("http_requests_total")?.sliced(5 * MINUTE)?;
//!         Ok(SimpleRecording::new(ql::sum(ql::rate(requests)?)?.by(["job"])?))
//!     })?;
//!     assert_eq!(rate.to_string(), "job:requests:rate5m{}");
//!
//!     // Dump the realized rules in registration order
//!     for rule in rules.dump() {
//!         let rule = rule?;
//!         println!("{}: {}", rule.name(), rule.expr());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod ql;
pub mod rules;

// Re-export top-level types for convenience
pub use ql::{Duration, Expr, QlError, QlResult};

pub use rules::{
    RealizedAlert, RealizedRecording, RealizedRule, RuleBundle, RuleError, RuleResult, SimpleAlert,
    SimpleRecording,
};

pub use config::{Config, ConfigError, LoggingConfig, OutputConfig};
