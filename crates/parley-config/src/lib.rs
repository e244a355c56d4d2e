//! Parley configuration.
//!
//! One explicit `ParleyConfig` value is built at startup and handed to the
//! session and model client constructors. Sources, lowest priority first:
//!
//! 1. built-in defaults (every section is `#[serde(default)]`)
//! 2. `config.toml` from the OS config directory, or `--config <PATH>`
//! 3. environment variables (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`)
//!
//! The merged result is validated before it is returned.

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{ChatConfig, ModelConfig, ParleyConfig, ProviderConfig};

use std::path::Path;

use parley_common::ConfigError;

/// Load, overlay the process environment, and validate.
///
/// With `path` set the file must exist; without it a missing default file
/// just means defaults.
pub fn load_config(path: Option<&Path>) -> Result<ParleyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };

    env::apply_env(&mut config, |key| std::env::var(key).ok());
    validation::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_with_explicit_missing_path_fails() {
        let err = load_config(Some(Path::new("/tmp/parley_no_such_config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_config_with_explicit_path_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[model]
temperature = 9.0
"#,
        )
        .unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("model.temperature"));
    }
}
