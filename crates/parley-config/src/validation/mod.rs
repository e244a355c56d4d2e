//! Configuration validation.
//!
//! Every check pushes onto a shared error list so a bad config reports all
//! of its problems at once in a single `ConfigError`.

mod helpers;


use crate::schema::ParleyConfig;
use parley_common::ConfigError;

use helpers::{validate_non_empty, validate_range, validate_range_f64};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ParleyConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_model(&mut errors, config);
    validate_provider(&mut errors, config);
    validate_chat(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_model(errors: &mut Vec<String>, config: &ParleyConfig) {
    let model = &config.model;
    if !(model.base_url.starts_with("http://") || model.base_url.starts_with("https://")) {
        errors.push(format!(
            "model.base_url = {:?} must start with http:// or https://",
            model.base_url
        ));
    }
    validate_non_empty(errors, "model.model", &model.model);
    validate_range(errors, "model.max_tokens", model.max_tokens as u64, 1, 200_000);
    validate_range_f64(errors, "model.temperature", model.temperature, 0.0, 2.0);
    validate_range(
        errors,
        "model.connect_timeout_secs",
        model.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "model.request_timeout_secs",
        model.request_timeout_secs,
        1,
        900,
    );
    validate_range(errors, "model.max_retries", model.max_retries as u64, 0, 10);
    validate_range(errors, "model.retry_backoff_ms", model.retry_backoff_ms, 0, 60_000);
}

fn validate_provider(errors: &mut Vec<String>, config: &ParleyConfig) {
    let provider = &config.provider;
    validate_non_empty(errors, "provider.python", &provider.python);
    validate_non_empty(errors, "provider.node", &provider.node);
    validate_non_empty(errors, "provider.shell", &provider.shell);
    validate_range(
        errors,
        "provider.request_timeout_secs",
        provider.request_timeout_secs,
        1,
        600,
    );
    validate_range(
        errors,
        "provider.shutdown_grace_ms",
        provider.shutdown_grace_ms,
        0,
        30_000,
    );
}

fn validate_chat(errors: &mut Vec<String>, config: &ParleyConfig) {
    let chat = &config.chat;
    if chat.exit_keywords.iter().all(|k| k.trim().is_empty()) {
        errors.push("chat.exit_keywords must contain at least one keyword".into());
    }
}
