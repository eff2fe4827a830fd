//! Modular configuration loader.
//!
//! Service sections live next to `config.json` in their own files
//! (e.g. `scanner.json`). A section file may be partial; missing keys fall
//! back to the section's serde defaults.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result, ResultExt};

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
pub fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).context(format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&content).context(format!("parsing {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load `<name>.json` from `dir` into a typed section.
///
/// Priority (lowest to highest):
/// 1. `T::default()` serialized
/// 2. Values from the section file
///
/// Environment overrides are applied by the caller afterwards.
pub fn load_section<T>(dir: &Path, name: &str) -> Result<T>
where
    T: DeserializeOwned + serde::Serialize + Default,
{
    let mut merged = serde_json::to_value(T::default())?;

    let path = dir.join(format!("{}.json", name));
    match load_json_file(&path)? {
        Some(section) => {
            if !section.is_object() {
                return Err(Error::Config(format!(
                    "{} must contain a JSON object",
                    path.display()
                )));
            }
            merge_json(&mut merged, section);
            tracing::debug!(path = %path.display(), "Loaded config section");
        }
        None => {
            tracing::debug!(path = %path.display(), "Config section not found, using defaults");
        }
    }

    serde_json::from_value(merged).context(format!("decoding section {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Section {
        threshold: f64,
        nested: Nested,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Nested {
        a: u32,
        b: String,
    }

    impl Default for Section {
        fn default() -> Self {
            Self {
                threshold: 1.0,
                nested: Nested { a: 1, b: "x".into() },
            }
        }
    }

    #[test]
    fn test_merge_json_nested() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": 3});
        merge_json(&mut target, json!({"a": {"b": 10}, "e": 5}));
        assert_eq!(target, json!({"a": {"b": 10, "c": 2}, "d": 3, "e": 5}));
    }

    #[test]
    fn test_load_section_missing_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let section: Section = load_section(dir.path(), "scanner").unwrap();
        assert_eq!(section, Section::default());
    }

    #[test]
    fn test_load_section_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scanner.json"),
            r#"{"nested": {"b": "override"}}"#,
        )
        .unwrap();

        let section: Section = load_section(dir.path(), "scanner").unwrap();
        assert_eq!(section.threshold, 1.0);
        assert_eq!(section.nested.a, 1);
        assert_eq!(section.nested.b, "override");
    }

    #[test]
    fn test_load_section_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scanner.json"), "[1, 2]").unwrap();

        let err = load_section::<Section>(dir.path(), "scanner").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_section_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scanner.json"), "{not json").unwrap();

        let err = load_section::<Section>(dir.path(), "scanner").unwrap_err();
        assert!(matches!(err, Error::WithContext { .. }));
    }
}
