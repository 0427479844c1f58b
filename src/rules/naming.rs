//! Rule naming transforms
//!
//! Rule producers are registered under snake_case identifiers. Alert rules are
//! conventionally CamelCase and recording rules use `level:metric:operation`
//! colon-delimited names, so both registration forms derive the final name
//! from the identifier with these functions.

/// `high_error_rate` → `HighErrorRate`
///
/// Each underscore-delimited segment gets an upper-cased first letter and the
/// underscores are dropped, so a name that is already CamelCase is unchanged.
pub fn rename_alert_rule(name: &str) -> String {
    name.split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `job_http_errors` → `job:http:errors`
pub fn rename_recording_rule(name: &str) -> String {
    name.replace('_', ":")
}
