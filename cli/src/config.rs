use anyhow::{anyhow, bail, Context, Result};
use authz::BuildMode;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Identifier of the console configuration section
pub const CONSOLE_CONFIG_ID: &str = "console";

/// Configuration definition as stored in `config.console*.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDefinition {
    /// Unique identifier for this configuration
    pub id: String,
    /// Human-readable name for this configuration
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The module or crate that provides this configuration
    pub provider: String,
    pub version: String,
    #[serde(default)]
    pub values: HashMap<String, Value>,
}

/// Console settings: default input files, log directory and build mode
#[derive(Debug, Clone)]
pub struct ConsoleConfiguration {
    definition: ConfigurationDefinition,
    source: Option<PathBuf>,
}

impl Default for ConsoleConfiguration {
    fn default() -> Self {
        Self {
            definition: ConfigurationDefinition {
                id: CONSOLE_CONFIG_ID.to_string(),
                name: "Console Configuration".to_string(),
                description: None,
                provider: "console-cli".to_string(),
                version: "1.0.0".to_string(),
                values: HashMap::new(),
            },
            source: None,
        }
    }
}

impl ConsoleConfiguration {
    /// Create from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: ConfigurationDefinition =
            serde_yaml::from_str(content).context("Configuration parse error")?;
        Ok(Self {
            definition,
            source: None,
        })
    }

    /// Load from file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {:?}", path))?;
        let mut config = Self::from_yaml(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load the console configuration for `env` from `dir`.
    ///
    /// `config.console.<env>.yaml` wins over `config.console.yaml`. When
    /// neither exists the defaults are returned.
    pub fn load(dir: &Path, env: &str) -> Result<Self> {
        let candidates = [
            dir.join(format!("config.{}.{}.yaml", CONSOLE_CONFIG_ID, env)),
            dir.join(format!("config.{}.yaml", CONSOLE_CONFIG_ID)),
        ];

        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => {
                let config = Self::from_file(path)?;
                config.validate()?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn definition(&self) -> &ConfigurationDefinition {
        &self.definition
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    /// The file this configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.definition.values.get(key)
    }

    pub fn get_all_values(&self) -> &HashMap<String, Value> {
        &self.definition.values
    }

    fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_value(key).and_then(|v| v.as_str()).map(PathBuf::from)
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.get_path("snapshot_path")
    }

    pub fn principal_path(&self) -> Option<PathBuf> {
        self.get_path("principal_path")
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.get_path("log_dir")
    }

    pub fn default_mode(&self) -> Result<BuildMode> {
        match self.get_value("default_mode") {
            None => Ok(BuildMode::default()),
            Some(Value::String(mode)) => mode.parse().map_err(|e| anyhow!("{}", e)),
            Some(other) => bail!("default_mode must be a string, got {:?}", other),
        }
    }

    /// A flag value, falling back to the configured snapshot file
    pub fn snapshot_or(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        flag.or_else(|| self.snapshot_path()).ok_or_else(|| {
            anyhow!("No snapshot file given. Pass --snapshot or set values.snapshot_path")
        })
    }

    /// A flag value, falling back to the configured principal file
    pub fn principal_or(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        flag.or_else(|| self.principal_path()).ok_or_else(|| {
            anyhow!("No principal file given. Pass --principal or set values.principal_path")
        })
    }

    /// Validate the configuration values
    pub fn validate(&self) -> Result<()> {
        if self.definition.id.is_empty() {
            bail!("Configuration validation error: Configuration ID cannot be empty");
        }
        if self.definition.provider.is_empty() {
            bail!("Configuration validation error: Configuration provider cannot be empty");
        }
        self.default_mode()
            .context("Configuration validation error: invalid default_mode")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONSOLE_YAML: &str = r#"id: console
name: Console Configuration
description: Test console configuration
provider: console-cli
version: 1.0.0
values:
  snapshot_path: "data/permissions.json"
  default_mode: permission-edit
"#;

    #[test]
    fn test_from_yaml() {
        let config = ConsoleConfiguration::from_yaml(CONSOLE_YAML).unwrap();
        assert_eq!(config.id(), "console");
        assert_eq!(
            config.snapshot_path(),
            Some(PathBuf::from("data/permissions.json"))
        );
        assert_eq!(config.principal_path(), None);
        assert_eq!(config.default_mode().unwrap(), BuildMode::PermissionEdit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let config = ConsoleConfiguration::load(dir.path(), "dev").unwrap();
        assert!(config.source().is_none());
        assert!(config.get_all_values().is_empty());
        assert_eq!(config.default_mode().unwrap(), BuildMode::MenuRender);
    }

    #[test]
    fn test_environment_file_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.console.yaml"), CONSOLE_YAML).unwrap();
        fs::write(
            dir.path().join("config.console.staging.yaml"),
            CONSOLE_YAML.replace("data/permissions.json", "staging.json"),
        )
        .unwrap();

        let config = ConsoleConfiguration::load(dir.path(), "staging").unwrap();
        assert_eq!(config.snapshot_path(), Some(PathBuf::from("staging.json")));

        let config = ConsoleConfiguration::load(dir.path(), "dev").unwrap();
        assert_eq!(
            config.snapshot_path(),
            Some(PathBuf::from("data/permissions.json"))
        );
        assert_eq!(
            config.source(),
            Some(dir.path().join("config.console.yaml").as_path())
        );
    }

    #[test]
    fn test_validation() {
        let config =
            ConsoleConfiguration::from_yaml(&CONSOLE_YAML.replace("provider: console-cli", "provider: \"\""))
                .unwrap();
        assert!(config.validate().is_err());

        let config = ConsoleConfiguration::from_yaml(
            &CONSOLE_YAML.replace("default_mode: permission-edit", "default_mode: sideways"),
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.console.yaml"), "id: [unterminated").unwrap();
        assert!(ConsoleConfiguration::load(dir.path(), "dev").is_err());
    }

    #[test]
    fn test_flag_overrides_config() {
        let config = ConsoleConfiguration::from_yaml(CONSOLE_YAML).unwrap();
        assert_eq!(
            config.snapshot_or(Some(PathBuf::from("other.json"))).unwrap(),
            PathBuf::from("other.json")
        );
        assert_eq!(
            config.snapshot_or(None).unwrap(),
            PathBuf::from("data/permissions.json")
        );
        assert!(config.principal_or(None).is_err());
    }
}
