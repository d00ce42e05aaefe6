// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small validation helpers shared by the property-directory read-modify-write
//! path in `bya-storage` (spec §4.1, §9's "static schema" redesign note).

use serde_json::Value;

use crate::error::ModelError;

/// Check that `value` is one of `choices`, mirroring `StrChoiceProperty`'s
/// validator from the source. `field` is only used for the error message.
pub fn validate_choice(field: &str, value: &str, choices: &[&str]) -> Result<(), ModelError> {
    if choices.contains(&value) {
        Ok(())
    } else {
        Err(ModelError::validation(format!(
            "Invalid value for \"{field}\": {value}. Must be one of: {choices:?}"
        )))
    }
}

/// Merge `overrides` into `base`, the read-modify-write step of
/// `PropsDir.update()` (spec §4.1). Unknown keys in `overrides` are kept —
/// callers validate the merged result afterward.
pub fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (k, v) in override_map {
                base_map.insert(k, v);
            }
        }
        (base_slot, overrides) => *base_slot = overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn choice_validation_accepts_member() {
        assert!(validate_choice("status", "QUEUED", &["QUEUED", "RUNNING"]).is_ok());
    }

    #[test]
    fn choice_validation_rejects_non_member() {
        assert!(validate_choice("status", "BOGUS", &["QUEUED", "RUNNING"]).is_err());
    }

    #[test]
    fn merge_overwrites_only_given_keys() {
        let mut base = json!({"a": 1, "b": 2});
        merge_json(&mut base, json!({"b": 3, "c": 4}));
        assert_eq!(base, json!({"a": 1, "b": 3, "c": 4}));
    }
}
