//! Tests for TOML config loading and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_parley_config.toml"));
    assert!(matches!(
        result.unwrap_err(),
        parley_common::ConfigError::FileNotFound(_)
    ));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[model]
model = "gpt-4o"
system_prompt = "Answer briefly."

[provider]
python = "python3.12"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.model.model, "gpt-4o");
    assert_eq!(config.model.system_prompt.as_deref(), Some("Answer briefly."));
    assert_eq!(config.provider.python, "python3.12");
    // Defaults preserved
    assert_eq!(config.model.base_url, "https://api.openai.com/v1");
    assert_eq!(config.provider.node, "node");
    assert!(config.chat.streaming);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, parley_common::ConfigError::ParseError(_)));
}

#[test]
fn load_wrong_type_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[model]\nmax_tokens = \"lots\"\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse TOML"));
}

#[test]
fn default_config_path_is_reasonable() {
    // May not resolve in every CI sandbox
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("parley"));
        assert!(path_str.ends_with("config.toml"));
    }
}
