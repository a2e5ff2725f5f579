//! Checks on JSON values before `Object.assign(scope, values)`.
//!
//! Scope values land on live framework objects, so keys that reach the
//! prototype chain are refused outright instead of stripped.

use crate::error::{ContextError, Result};
use serde_json::Value;

const MAX_DEPTH: usize = 32;

const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Validate scope values and hand them back unchanged.
///
/// Fails when `values` is not an object, when any key at any depth is one
/// of `__proto__`, `constructor` or `prototype`, or when nesting exceeds
/// 32 levels. The error names the offending path.
pub fn sanitize_scope_values(values: Value) -> Result<Value> {
    if !values.is_object() {
        return Err(ContextError::Sanitize(
            "scope values must be a JSON object".to_string(),
        ));
    }
    check(&values, &mut Vec::new())?;
    Ok(values)
}

fn check(value: &Value, path: &mut Vec<String>) -> Result<()> {
    if path.len() > MAX_DEPTH {
        return Err(ContextError::Sanitize(format!(
            "nesting too deep at '{}' (max {} levels)",
            path.join("."),
            MAX_DEPTH
        )));
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    return Err(ContextError::Sanitize(format!(
                        "forbidden key '{}' at '{}'",
                        key,
                        path.join(".")
                    )));
                }
                check(child, path)?;
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(index.to_string());
                check(child, path)?;
                path.pop();
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_values_pass_through() {
        let values = json!({
            "greeting": "hello",
            "user": { "name": "Alice", "roles": ["admin", "dev"] },
            "count": 3
        });
        assert_eq!(sanitize_scope_values(values.clone()).unwrap(), values);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = sanitize_scope_values(json!("hello")).unwrap_err();
        assert!(matches!(err, ContextError::Sanitize(_)));
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_reports_path_of_forbidden_key() {
        let err = sanitize_scope_values(json!({
            "user": { "profile": { "constructor": {} } }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("user.profile.constructor"));
    }

    #[test]
    fn test_checks_inside_arrays() {
        let err = sanitize_scope_values(json!({
            "rows": [{ "ok": true }, { "__proto__": { "polluted": true } }]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("rows.1.__proto__"));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!(1);
        for _ in 0..40 {
            value = json!({ "next": value });
        }
        let err = sanitize_scope_values(value).unwrap_err();
        assert!(err.to_string().contains("too deep"));
    }

    #[test]
    fn test_prototype_as_value_is_fine() {
        let values = json!({ "label": "prototype" });
        assert!(sanitize_scope_values(values).is_ok());
    }
}
