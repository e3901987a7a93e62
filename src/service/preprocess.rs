//! Ordered preprocessor chains run against a request payload before it reaches storage.

use crate::config::Preprocessor;
use crate::error::AppError;
use crate::service::password::hash_password;
use crate::service::RequestValidator;
use serde_json::Value;
use std::collections::HashMap;
use tokio::task;

impl Preprocessor {
    pub async fn apply(&self, body: &mut HashMap<String, Value>) -> Result<(), AppError> {
        match self {
            Preprocessor::Validate(form) => RequestValidator::validate(body, form),
            Preprocessor::RemoveFields(fields) => {
                for field in fields {
                    body.remove(field);
                }
                Ok(())
            }
            Preprocessor::HashPassword { field } => {
                let Some(plain) = body.get(field).and_then(Value::as_str).map(str::to_owned) else {
                    return Err(AppError::Validation(format!("{} is required", field)));
                };
                // Argon2 is CPU and memory bound; keep it off the async workers.
                let hashed = task::spawn_blocking(move || hash_password(&plain))
                    .await
                    .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))??;
                body.insert(field.clone(), Value::String(hashed));
                Ok(())
            }
        }
    }
}

/// Run every step in declared order; the first failure aborts and the payload is discarded.
pub async fn run_chain(path: &str, chain: &[Preprocessor], body: &mut HashMap<String, Value>) -> Result<(), AppError> {
    for step in chain {
        if let Err(e) = step.apply(body).await {
            tracing::warn!(entity = %path, step = %step.name(), error = %e, "preprocessor rejected payload");
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{exposure_policy, Operation};
    use crate::service::password::verify_password;
    use serde_json::json;

    fn user_chain() -> Vec<Preprocessor> {
        exposure_policy()
            .into_iter()
            .find(|a| a.path_segment == "users")
            .and_then(|mut a| a.preprocessors.remove(&Operation::Create))
            .unwrap()
    }

    fn body(v: Value) -> HashMap<String, Value> {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[tokio::test]
    async fn strips_confirm_and_hashes_password() {
        let mut b = body(json!({
            "username": "ganemone", "password": "secret1", "confirm": "secret1", "email": "g@x.com"
        }));
        run_chain("users", &user_chain(), &mut b).await.unwrap();
        assert!(!b.contains_key("confirm"));
        let stored = b["password"].as_str().unwrap();
        assert!(verify_password("secret1", stored).unwrap());
    }

    #[tokio::test]
    async fn validation_failure_leaves_payload_untouched() {
        let original = body(json!({"username": "ganemone", "password": "secret1", "confirm": "mismatch"}));
        let mut b = original.clone();
        let err = run_chain("users", &user_chain(), &mut b).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(b, original);
    }

    #[tokio::test]
    async fn removing_an_absent_field_is_a_no_op() {
        let mut b = body(json!({"label": "rust"}));
        Preprocessor::RemoveFields(vec!["confirm".into()]).apply(&mut b).await.unwrap();
        assert_eq!(b, body(json!({"label": "rust"})));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_runs_on_the_blocking_pool() {
        let mut b = body(json!({"password": "secret1"}));
        let step = Preprocessor::HashPassword { field: "password".into() };
        let ticker = tokio::spawn(async { tokio::task::yield_now().await });
        step.apply(&mut b).await.unwrap();
        assert!(ticker.is_finished());
        assert!(verify_password("secret1", b["password"].as_str().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn hashing_requires_a_string() {
        let mut b = body(json!({"password": 7}));
        let err = Preprocessor::HashPassword { field: "password".into() }
            .apply(&mut b)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
