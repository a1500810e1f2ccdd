use crate::error::{Error, Result};
use crate::options::ListSpec;
use crate::providers::{ProviderParams, QuerySelector, RegistryArgs};
use crate::settings::Settings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub workspaces: IndexMap<String, WorkspaceConfig>,
    pub discovery: DiscoveryConfig,
    pub settings: Settings,
}

/// Provider registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Primary query provider name
    pub query_provider: Option<String>,
    /// Plain list, or `+name`/`-name` modifiers of the default providers
    pub providers: Option<Vec<String>>,
    /// `ProviderName_paramName` parameters
    pub params: IndexMap<String, Value>,
}

/// Query workspace connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub tenant_id: Option<String>,
    pub workspace_id: Option<String>,
}

/// Extra notebooklet roots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub paths: Vec<PathBuf>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            query_provider: Some("MSSentinel".to_string()),
            providers: None,
            params: IndexMap::new(),
        }
    }
}

impl WorkspaceConfig {
    /// Connection string for the workspace, if both ids are present
    pub fn connection_str(&self) -> Option<String> {
        match (&self.tenant_id, &self.workspace_id) {
            (Some(tenant), Some(workspace)) => Some(format!(
                "loganalytics://code().tenant(\"{}\").workspace(\"{}\")",
                tenant, workspace
            )),
            _ => None,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file or return defaults
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(
        &mut self,
        query_provider: Option<String>,
        providers: Vec<String>,
        paths: Vec<PathBuf>,
        verbose: bool,
    ) {
        if let Some(qp) = query_provider {
            self.providers.query_provider = Some(qp);
        }

        if !providers.is_empty() {
            self.providers.providers = Some(providers);
        }

        if !paths.is_empty() {
            self.discovery.paths.extend(paths);
        }

        if verbose {
            self.settings.verbose = true;
            self.settings.debug = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(providers) = &self.providers.providers {
            ListSpec::parse(providers)
                .map_err(|e| Error::config_validation(format!("providers: {}", e)))?;
        }

        if let Some(qp) = &self.providers.query_provider {
            if qp.trim().is_empty() {
                return Err(Error::config_validation("query_provider cannot be empty"));
            }
        }

        if self.discovery.paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(Error::config_validation("discovery paths cannot be empty"));
        }

        Ok(())
    }

    /// Provider registry construction arguments described by this config
    pub fn registry_args(&self) -> RegistryArgs {
        let selector = match &self.providers.query_provider {
            Some(name) => QuerySelector::Name(name.clone()),
            None => QuerySelector::None,
        };
        let params: ProviderParams = self
            .providers
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        RegistryArgs {
            query_provider: selector,
            providers: self.providers.providers.clone(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.providers.query_provider.as_deref(), Some("MSSentinel"));
        assert!(config.providers.providers.is_none());
        assert!(config.discovery.paths.is_empty());
        assert!(config.settings.verbose);
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[providers]
query_provider = "LocalData"
providers = ["+ipstacklookup", "-geolitelookup"]

[providers.params]
LocalData_data_paths = ["./data"]
ipstacklookup_api_key = "abc"

[workspaces.Default]
tenant_id = "tid"
workspace_id = "wid"

[discovery]
paths = ["./custom_nb"]

[settings]
silent = true
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.providers.query_provider.as_deref(), Some("LocalData"));
        assert_eq!(config.providers.providers.as_ref().unwrap().len(), 2);
        assert_eq!(config.providers.params.len(), 2);
        assert_eq!(
            config.workspaces["Default"].connection_str().unwrap(),
            "loganalytics://code().tenant(\"tid\").workspace(\"wid\")"
        );
        assert_eq!(config.discovery.paths, vec![PathBuf::from("./custom_nb")]);
        assert!(config.settings.silent);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/notebooklets.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_mixed_providers() {
        let mut config = Config::default();
        config.providers.providers = Some(vec!["tilookup".into(), "+geolitelookup".into()]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("providers"));
    }

    #[test]
    fn test_validation_empty_query_provider() {
        let mut config = Config::default();
        config.providers.query_provider = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_cli() {
        let mut config = Config::default();
        config.merge_cli(
            Some("LocalData".into()),
            vec!["tilookup".into()],
            vec![PathBuf::from("/custom")],
            true,
        );
        assert_eq!(config.providers.query_provider.as_deref(), Some("LocalData"));
        assert_eq!(config.providers.providers, Some(vec!["tilookup".to_string()]));
        assert_eq!(config.discovery.paths, vec![PathBuf::from("/custom")]);
        assert!(config.settings.debug);
    }

    #[test]
    fn test_registry_args() {
        let mut config = Config::default();
        config
            .providers
            .params
            .insert("LocalData_data_paths".into(), Value::from("./data"));
        let args = config.registry_args();
        assert_eq!(args.query_provider, QuerySelector::Name("MSSentinel".into()));
        assert_eq!(args.params.get_str("LocalData_data_paths"), Some("./data"));
    }

    #[test]
    fn test_workspace_without_ids() {
        assert!(WorkspaceConfig::default().connection_str().is_none());
    }
}
