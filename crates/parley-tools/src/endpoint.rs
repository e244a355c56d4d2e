//! Mapping a provider path to the command that runs it.

use std::fmt;
use std::path::{Path, PathBuf};

use parley_common::ToolError;
use parley_config::ProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Python,
    Node,
    Shell,
}

impl EndpointKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "js" | "mjs" => Some(Self::Node),
            "sh" => Some(Self::Shell),
            _ => None,
        }
    }
}

/// How to launch one tool provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub kind: EndpointKind,
    pub program: String,
    pub args: Vec<String>,
    pub path: PathBuf,
}

impl EndpointDescriptor {
    /// Resolve with the default interpreters.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        Self::resolve(path, &ProviderConfig::default())
    }

    /// Resolve using the interpreters configured in `config`.
    pub fn resolve(path: impl AsRef<Path>, config: &ProviderConfig) -> Result<Self, ToolError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let kind = EndpointKind::from_extension(ext).ok_or_else(|| {
            ToolError::Transport(format!(
                "unsupported provider type for {}: expected .py, .js, .mjs or .sh",
                path.display()
            ))
        })?;

        if !path.is_file() {
            return Err(ToolError::Transport(format!(
                "provider not found: {}",
                path.display()
            )));
        }

        let program = match kind {
            EndpointKind::Python => &config.python,
            EndpointKind::Node => &config.node,
            EndpointKind::Shell => &config.shell,
        };

        Ok(Self {
            kind,
            program: program.clone(),
            args: vec![path.to_string_lossy().into_owned()],
            path: path.to_path_buf(),
        })
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}
