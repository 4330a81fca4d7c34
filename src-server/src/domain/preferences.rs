//! Settings / Profile
//!
//! Flat key-value preference bags stored per user. Settings and profile
//! share the same shape and storage, separated by scope.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{DomainError, DomainResult};

pub type Preferences = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceScope {
    Settings,
    Profile,
}

impl PreferenceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceScope::Settings => "settings",
            PreferenceScope::Profile => "profile",
        }
    }
}

fn key_pattern() -> DomainResult<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]{0,63}$"))
        .as_ref()
        .map_err(|e| DomainError::Internal(format!("preference key pattern: {}", e)))
}

/// Keys are short identifiers like `theme` or `notifications.email`
pub fn validate_key(key: &str) -> DomainResult<()> {
    if key_pattern()?.is_match(key) {
        Ok(())
    } else {
        Err(DomainError::InvalidInput(format!("invalid preference key '{}'", key)))
    }
}

/// Apply `patch` onto `current`; `null` values remove keys
pub fn merge(current: &mut Preferences, patch: Preferences) -> DomainResult<()> {
    for key in patch.keys() {
        validate_key(key)?;
    }
    for (key, value) in patch {
        if value.is_null() {
            current.remove(&key);
        } else {
            current.insert(key, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Preferences {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_sets_and_removes() {
        let mut current = bag(json!({"theme": "dark", "language": "en"}));
        merge(&mut current, bag(json!({"theme": "light", "language": null, "weekStart": 1}))).unwrap();

        assert_eq!(Value::Object(current), json!({"theme": "light", "weekStart": 1}));
    }

    #[test]
    fn test_merge_rejects_bad_keys_atomically() {
        let mut current = bag(json!({"theme": "dark"}));
        let result = merge(&mut current, bag(json!({"theme": "light", "bad key": true})));

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert_eq!(current["theme"], "dark");
    }

    #[test]
    fn test_dotted_keys_allowed() {
        assert!(validate_key("notifications.email").is_ok());
        assert!(matches!(validate_key("9lives"), Err(DomainError::InvalidInput(_))));
        assert!(matches!(validate_key(&"k".repeat(65)), Err(DomainError::InvalidInput(_))));
    }
}
