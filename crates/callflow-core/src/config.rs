//! Compile options
//!
//! Options are read from `callflow.yaml` at a project root. Every field has a
//! default, so an empty file (or no file, via [`CompileOptions::default`]) is
//! valid.
//!
//! ```yaml
//! version: "2019-10-30"   # document version written to every flow
//! strict: false           # treat warnings as failures
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Document version used when none is configured
pub const DEFAULT_VERSION: &str = "2019-10-30";

/// Options file looked up inside a project directory
pub const CONFIG_FILE: &str = "callflow.yaml";

/// Options shared by every flow build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Document version
    #[serde(default = "default_version")]
    pub version: String,

    /// Fail builds that produce warnings
    #[serde(default)]
    pub strict: bool,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            version: default_version(),
            strict: false,
        }
    }
}

impl CompileOptions {
    /// Parse options from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load options from a project directory or an options file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let options = CompileOptions::load("./ivr")?;
    /// println!("Version: {}", options.version);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILE)
        } else {
            path.to_path_buf()
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let options = Self::from_yaml(&contents)?;
        tracing::debug!(
            "Loaded compile options from {} (version {}, strict {})",
            config_path.display(),
            options.version,
            options.strict
        );
        Ok(options)
    }

    /// Same options with strict mode set
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Same options with another document version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::from_yaml("").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert_eq!(options.version, "2019-10-30");
        assert!(!options.strict);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let options = CompileOptions::from_yaml("strict: true\n").unwrap();
        assert!(options.strict);
        assert_eq!(options.version, DEFAULT_VERSION);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "version: \"2020-01-01\"\n").unwrap();

        let options = CompileOptions::load(dir.path()).unwrap();
        assert_eq!(options.version, "2020-01-01");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CompileOptions::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = CompileOptions::from_yaml("strict: [not, a, bool]").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
