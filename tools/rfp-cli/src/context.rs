//! CLI execution context.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use rfp_core::AdapterConfig;

use crate::output::Output;

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// Execution context for CLI commands.
pub struct Context {
    /// Adapter configuration. Not yet validated.
    pub config: AdapterConfig,
    /// Where `config` was loaded from.
    pub source: ConfigSource,
    /// Output handler.
    pub output: Output,
}

impl Context {
    /// Load from an explicit file, an `rfp.toml` in the directory tree, or
    /// the environment.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let (config, source) = match config_path {
            Some(path) => (load_file(Path::new(path))?, ConfigSource::File(path.into())),
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                match find_config(&cwd) {
                    Some(path) => (load_file(&path)?, ConfigSource::File(path)),
                    None => (
                        AdapterConfig::from_env().context("Invalid environment configuration")?,
                        ConfigSource::Environment,
                    ),
                }
            }
        };

        output.debug(&format!("Loaded configuration from {}", source));
        Ok(Self {
            config,
            source,
            output,
        })
    }
}

/// Parse a config file without validating it.
pub fn load_file(path: &Path) -> Result<AdapterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

/// Find a config file in the directory tree.
fn find_config(start: &Path) -> Option<PathBuf> {
    const NAMES: [&str; 3] = ["rfp.toml", ".rfp.toml", "rfp.json"];

    start
        .ancestors()
        .flat_map(|dir| NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}
