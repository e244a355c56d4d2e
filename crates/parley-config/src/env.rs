//! Environment overlay applied on top of the file configuration.

use tracing::debug;

use crate::schema::ParleyConfig;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_VAR: &str = "OPENAI_MODEL";

/// Overwrite model settings from environment variables that `lookup` resolves.
///
/// Empty values are treated as unset.
pub fn apply_env(config: &mut ParleyConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(key) = get(API_KEY_VAR) {
        config.model.api_key = Some(key);
    }
    if let Some(url) = get(BASE_URL_VAR) {
        debug!(base_url = %url, "model base URL from environment");
        config.model.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(model) = get(MODEL_VAR) {
        debug!(model = %model, "model id from environment");
        config.model.model = model;
    }
}
