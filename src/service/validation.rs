//! Request validation against form schemas.

use crate::config::{FormSchema, ValidationRule};
use crate::error::AppError;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate body against the form. Every failing field is reported, in form order.
    pub fn validate(body: &HashMap<String, Value>, form: &FormSchema) -> Result<(), AppError> {
        let errors: Vec<String> = form
            .fields
            .iter()
            .filter_map(|(field, rule)| validate_field(body, field, rule).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors.join("; ")))
        }
    }
}

/// Present means non-null and, for strings, not blank.
fn is_present(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn validate_field(body: &HashMap<String, Value>, field: &str, rule: &ValidationRule) -> Result<(), String> {
    let val = body.get(field);
    if !is_present(val) {
        if rule.required {
            return Err(format!("{} is required", field));
        }
        if val.is_none() || val == Some(&Value::Null) {
            return Ok(());
        }
    }
    let Some(s) = val.and_then(Value::as_str) else {
        return Err(format!("{} must be a string", field));
    };
    let len = s.chars().count();
    if let Some(min) = rule.min_length {
        if len < min as usize {
            return Err(format!("{} must be at least {} characters", field, min));
        }
    }
    if let Some(max) = rule.max_length {
        if len > max as usize {
            return Err(format!("{} must be at most {} characters", field, max));
        }
    }
    if let Some(other) = &rule.equal_to {
        if body.get(other.as_str()) != val {
            return Err(format!("{} must match {}", field, other));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::registration_form;
    use serde_json::json;

    fn body(v: Value) -> HashMap<String, Value> {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    fn message(v: Value) -> String {
        match RequestValidator::validate(&body(v), &registration_form()) {
            Err(AppError::Validation(m)) => m,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        let b = body(json!({
            "username": "ganemone", "password": "secret1", "confirm": "secret1", "email": "g@x.com"
        }));
        RequestValidator::validate(&b, &registration_form()).unwrap();
    }

    #[test]
    fn password_must_match_confirm() {
        let m = message(json!({"username": "ganemone", "password": "secret1", "confirm": "mismatch"}));
        assert_eq!(m, "password must match confirm");
        let m = message(json!({"username": "ganemone", "password": "secret1"}));
        assert_eq!(m, "password must match confirm");
    }

    #[test]
    fn username_length_bounds() {
        for name in ["abc", "a".repeat(26).as_str()] {
            let m = message(json!({"username": name, "password": "secret1", "confirm": "secret1"}));
            assert!(m.starts_with("username must be"), "{m}");
        }
        for name in ["abcd", "a".repeat(25).as_str()] {
            let b = body(json!({"username": name, "password": "secret1", "confirm": "secret1"}));
            RequestValidator::validate(&b, &registration_form()).unwrap();
        }
    }

    #[test]
    fn lengths_count_characters() {
        let b = body(json!({"username": "ñoño", "password": "secret1", "confirm": "secret1"}));
        RequestValidator::validate(&b, &registration_form()).unwrap();
    }

    #[test]
    fn required_fields_reject_blank() {
        let m = message(json!({"username": "   ", "confirm": ""}));
        assert_eq!(m, "username is required; password is required");
    }

    #[test]
    fn email_is_optional_but_bounded() {
        let b = body(json!({"username": "ganemone", "password": "secret1", "confirm": "secret1", "email": null}));
        RequestValidator::validate(&b, &registration_form()).unwrap();
        let m = message(json!({"username": "ganemone", "password": "secret1", "confirm": "secret1", "email": "a@b"}));
        assert_eq!(m, "email must be at least 6 characters");
        let m = message(json!({"username": "ganemone", "password": "secret1", "confirm": "secret1", "email": 7}));
        assert_eq!(m, "email must be a string");
    }
}
