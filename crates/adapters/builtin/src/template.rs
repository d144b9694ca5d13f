//! `{{key}}` placeholder substitution from an action's emitted data.

use serde_json::Value;

use areaflow_domain::execution::EventData;

/// Replace every `{{key}}` in `content` whose key passes `allowed` by the
/// textual form of `data[key]`.
///
/// Only scalar values are substituted; placeholders for arrays, objects,
/// nulls or unknown keys are left as is.
pub fn fill(content: &str, data: &EventData, allowed: impl Fn(&str) -> bool) -> String {
    data.iter()
        .filter(|(key, _)| allowed(key))
        .fold(content.to_string(), |acc, (key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return acc,
            };
            acc.replace(&format!("{{{{{key}}}}}"), &text)
        })
}

/// Keys allowed in a URL: those mentioning `url` past their first character.
#[must_use]
pub fn url_key(key: &str) -> bool {
    key.match_indices("url").any(|(index, _)| index > 0)
}
