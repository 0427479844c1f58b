//! Rule file manifests
//!
//! A rule file is a list of groups, one per bundle, in the layout the
//! monitoring system loads:
//!
//! ```yaml
//! groups:
//! - name: api
//!   interval: 1m
//!   rules:
//!   - alert: HighErrorRate
//!     expr: rate(http_errors_total[5m]) > 0.5
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::OutputConfig;
use crate::ql::Duration;
use crate::rules::bundle::RuleBundle;
use crate::rules::error::RuleResult;
use crate::rules::realized::RealizedRule;

/// Manifest serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (expected yaml or json)", other)),
        }
    }
}

/// One bundle's rules, evaluated together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    pub rules: Vec<RealizedRule>,
}

/// A complete rule file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFile {
    pub groups: Vec<RuleGroup>,
}

impl RuleFile {
    pub fn to_yaml(&self) -> RuleResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> RuleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn serialize(&self, format: OutputFormat) -> RuleResult<String> {
        match format {
            OutputFormat::Yaml => self.to_yaml(),
            OutputFormat::Json => self.to_json(),
        }
    }

    /// Total number of rules across groups
    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(|group| group.rules.len()).sum()
    }
}

/// Realize `bundles` into one rule file.
///
/// Bundles without their own interval take `config.default_interval`.
pub fn build_rule_file<'a, I>(bundles: I, config: &OutputConfig) -> RuleResult<RuleFile>
where
    I: IntoIterator<Item = &'a RuleBundle>,
{
    let groups = bundles
        .into_iter()
        .map(|bundle| {
            let mut group = bundle.to_group()?;
            if group.interval.is_none() {
                group.interval = config.default_interval;
            }
            Ok(group)
        })
        .collect::<RuleResult<Vec<_>>>()?;

    Ok(RuleFile { groups })
}

/// Realize `bundles` and serialize them in the configured format
pub fn render_manifest<'a, I>(bundles: I, config: &OutputConfig) -> RuleResult<String>
where
    I: IntoIterator<Item = &'a RuleBundle>,
{
    let file = build_rule_file(bundles, config)?;
    let text = file.serialize(config.format)?;
    info!(
        groups = file.groups.len(),
        rules = file.rule_count(),
        format = %config.format,
        "Rendered rule manifest"
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ql::{metric, rate, MINUTE};
    use crate::rules::definition::SimpleAlert;
    use crate::rules::error::RuleError;
    use pretty_assertions::assert_eq;

    fn bundle() -> RuleBundle {
        let mut rules = RuleBundle::new("api");
        rules
            .register_alert("high_error_rate", || {
                let errors = rate(metric("http_errors_total")?.sliced(5 * MINUTE)?)?;
                Ok(SimpleAlert::new(errors.compare_gt(0.5)?)
                    .for_(10 * MINUTE)
                    .label("severity", "page"))
            })
            .unwrap();
        rules
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("toml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Yaml);
    }

    #[test]
    fn test_render_yaml() {
        let config = OutputConfig {
            default_interval: Some(MINUTE),
            ..OutputConfig::default()
        };
        let text = render_manifest([&bundle()], &config).unwrap();

        let expected = "\
groups:
- name: api
  interval: 1m
  rules:
  - alert: HighErrorRate
    expr: rate(http_errors_total[5m]) > 0.5
    for: 10m
    labels:
      severity: page
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_json_round_trips() {
        let config = OutputConfig {
            format: OutputFormat::Json,
            ..OutputConfig::default()
        };
        let text = render_manifest([&bundle()], &config).unwrap();
        let file: RuleFile = serde_json::from_str(&text).unwrap();

        assert_eq!(file.rule_count(), 1);
        assert_eq!(file.groups[0].interval, None);
        assert_eq!(file.groups[0].rules[0].name(), "HighErrorRate");
    }

    #[test]
    fn test_bundle_interval_wins_over_default() {
        let config = OutputConfig {
            default_interval: Some(MINUTE),
            ..OutputConfig::default()
        };
        let fast = bundle().with_interval(crate::ql::SECOND * 30);
        let file = build_rule_file([&fast], &config).unwrap();
        assert_eq!(file.groups[0].interval, Some(crate::ql::SECOND * 30));
    }

    #[test]
    fn test_producer_error_aborts_manifest() {
        let mut broken = RuleBundle::new("broken");
        broken
            .register_alert("bad", || Ok(SimpleAlert::new(metric("up")?.sliced(MINUTE)?)))
            .unwrap();

        let err = render_manifest([&bundle(), &broken], &OutputConfig::default()).unwrap_err();
        assert!(matches!(err, RuleError::InvalidExpression { .. }));
    }
}
