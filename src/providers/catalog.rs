// Known provider definitions
//
// The catalog is configuration data: which names exist, how each one is
// built, which names alias which canonical provider, which query providers
// may stand in for any other, and which providers load by default.

use crate::config::WorkspaceConfig;
use crate::error::{Error, Result};
use crate::providers::lookup::{AzureData, GeoLiteLookup, IpStackLookup, TiLookup};
use crate::providers::provider::{ProviderHandle, ProviderParams};
use crate::providers::query::{LocalDataBackend, QueryProvider, RemoteBackend};
use indexmap::IndexMap;
use std::sync::Arc;

/// Builds a provider from its name and provider-scoped parameters
pub type ProviderFactory = fn(&str, &ProviderParams) -> Result<ProviderHandle>;

/// Derives connect arguments from stored configuration when none are supplied
pub type ConfigResolver =
    fn(&ProviderParams, &IndexMap<String, WorkspaceConfig>) -> Result<ProviderParams>;

/// How to construct one provider
#[derive(Clone, Copy)]
pub struct ProviderDefinition {
    pub factory: ProviderFactory,
    /// Needs an explicit connect step after construction
    pub connect_required: bool,
    pub config_resolver: Option<ConfigResolver>,
}

impl ProviderDefinition {
    pub fn query(factory: ProviderFactory, config_resolver: Option<ConfigResolver>) -> Self {
        Self {
            factory,
            connect_required: true,
            config_resolver,
        }
    }

    pub fn enrichment(factory: ProviderFactory) -> Self {
        Self {
            factory,
            connect_required: false,
            config_resolver: None,
        }
    }
}

impl std::fmt::Debug for ProviderDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDefinition")
            .field("connect_required", &self.connect_required)
            .field("config_resolver", &self.config_resolver.is_some())
            .finish()
    }
}

/// Provider definitions plus alias, stand-in and default tables
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    definitions: IndexMap<String, ProviderDefinition>,
    /// lowercase alias -> canonical name
    aliases: IndexMap<String, String>,
    stand_ins: Vec<String>,
    defaults: Vec<String>,
    workspaces: IndexMap<String, WorkspaceConfig>,
}

impl ProviderCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the bundled providers
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            "MSSentinel",
            ProviderDefinition::query(remote_query, Some(sentinel_connect_args)),
        );
        catalog.register("LocalData", ProviderDefinition::query(local_data, None));
        catalog.register("Splunk", ProviderDefinition::query(remote_query, None));
        catalog.register("MDE", ProviderDefinition::query(remote_query, None));
        catalog.register("Kusto", ProviderDefinition::query(remote_query, None));
        catalog.register("tilookup", ProviderDefinition::enrichment(ti_lookup));
        catalog.register("geolitelookup", ProviderDefinition::enrichment(geolite_lookup));
        catalog.register("ipstacklookup", ProviderDefinition::enrichment(ipstack_lookup));
        catalog.register("azuredata", ProviderDefinition::enrichment(azure_data));

        catalog.add_alias("AzureSentinel", "MSSentinel");
        catalog.add_alias("LogAnalytics", "MSSentinel");
        catalog.add_alias("MDATP", "MDE");

        catalog.add_stand_in("LocalData");
        catalog.set_defaults(["tilookup", "geolitelookup"]);
        catalog
    }

    /// Add or replace a provider definition
    pub fn register(&mut self, name: impl Into<String>, definition: ProviderDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    /// Make `alias` resolve to `canonical`
    pub fn add_alias(&mut self, alias: &str, canonical: impl Into<String>) {
        self.aliases.insert(alias.to_lowercase(), canonical.into());
    }

    /// Let a registered query provider satisfy any missing query-provider requirement
    pub fn add_stand_in(&mut self, name: impl Into<String>) {
        self.stand_ins.push(name.into());
    }

    pub fn set_defaults<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaults = names.into_iter().map(Into::into).collect();
    }

    pub fn with_workspaces(mut self, workspaces: IndexMap<String, WorkspaceConfig>) -> Self {
        self.workspaces = workspaces;
        self
    }

    pub fn workspaces(&self) -> &IndexMap<String, WorkspaceConfig> {
        &self.workspaces
    }

    /// Canonical spelling of a known name or alias (case-insensitive)
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        if let Some((canonical, _)) = self
            .definitions
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
        {
            return Some(canonical.as_str());
        }
        let target = self.aliases.get(&name.to_lowercase())?;
        self.definitions
            .keys()
            .find(|known| known.eq_ignore_ascii_case(target))
            .map(String::as_str)
    }

    pub fn definition(&self, name: &str) -> Option<(&str, &ProviderDefinition)> {
        let canonical = self.canonical_name(name)?;
        self.definitions
            .get_key_value(canonical)
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.canonical_name(name).is_some()
    }

    /// Known provider requiring a connect step
    pub fn is_query_provider(&self, name: &str) -> bool {
        self.definition(name)
            .map(|(_, def)| def.connect_required)
            .unwrap_or(false)
    }

    pub fn stand_ins(&self) -> &[String] {
        &self.stand_ins
    }

    pub fn default_providers(&self) -> &[String] {
        &self.defaults
    }

    /// Every accepted name: canonical names followed by aliases
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.keys().cloned().collect();
        for (alias, canonical) in &self.aliases {
            names.push(format!("{} (alias of {})", alias, canonical));
        }
        names
    }
}

fn remote_query(name: &str, _params: &ProviderParams) -> Result<ProviderHandle> {
    Ok(Arc::new(QueryProvider::new(
        name,
        Box::new(RemoteBackend::new(name)),
    )))
}

fn local_data(name: &str, _params: &ProviderParams) -> Result<ProviderHandle> {
    Ok(Arc::new(QueryProvider::new(
        name,
        Box::new(LocalDataBackend::new()),
    )))
}

fn ti_lookup(name: &str, params: &ProviderParams) -> Result<ProviderHandle> {
    Ok(Arc::new(TiLookup::new(name, params)))
}

fn geolite_lookup(name: &str, _params: &ProviderParams) -> Result<ProviderHandle> {
    Ok(Arc::new(GeoLiteLookup::new(name)))
}

fn ipstack_lookup(name: &str, params: &ProviderParams) -> Result<ProviderHandle> {
    Ok(Arc::new(IpStackLookup::new(name, params)?))
}

fn azure_data(name: &str, _params: &ProviderParams) -> Result<ProviderHandle> {
    Ok(Arc::new(AzureData::new(name)))
}

/// Resolve Sentinel connect arguments.
///
/// Order: an explicit `workspace` name, then `tenant_id` + `workspace_id`
/// parameters, then the `Default` workspace from configuration.
fn sentinel_connect_args(
    params: &ProviderParams,
    workspaces: &IndexMap<String, WorkspaceConfig>,
) -> Result<ProviderParams> {
    let ws_config = if let Some(ws_name) = params.get_str("workspace") {
        workspaces
            .get(ws_name)
            .cloned()
            .ok_or_else(|| Error::other(format!("workspace {} not found in config", ws_name)))?
    } else if let (Some(tenant), Some(workspace)) =
        (params.get_str("tenant_id"), params.get_str("workspace_id"))
    {
        WorkspaceConfig {
            tenant_id: Some(tenant.to_string()),
            workspace_id: Some(workspace.to_string()),
        }
    } else {
        workspaces.get("Default").cloned().unwrap_or_default()
    };

    let conn = ws_config.connection_str().ok_or_else(|| {
        Error::other(
            "Could not find valid Microsoft Sentinel configuration. Supply \
             MSSentinel_workspace_id and MSSentinel_tenant_id or a [workspaces] entry.",
        )
    })?;
    Ok(ProviderParams::new().with("connection_str", conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_and_aliases() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.canonical_name("mssentinel"), Some("MSSentinel"));
        assert_eq!(catalog.canonical_name("LogAnalytics"), Some("MSSentinel"));
        assert_eq!(catalog.canonical_name("azuresentinel"), Some("MSSentinel"));
        assert_eq!(catalog.canonical_name("MDATP"), Some("MDE"));
        assert!(catalog.canonical_name("bad_provider").is_none());
    }

    #[test]
    fn test_query_classification() {
        let catalog = ProviderCatalog::builtin();
        assert!(catalog.is_query_provider("LocalData"));
        assert!(catalog.is_query_provider("AzureSentinel"));
        assert!(!catalog.is_query_provider("tilookup"));
        assert!(!catalog.is_query_provider("unknown"));
    }

    #[test]
    fn test_default_providers() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.default_providers(), ["tilookup", "geolitelookup"]);
    }

    #[test]
    fn test_list_providers_includes_aliases() {
        let names = ProviderCatalog::builtin().list_providers();
        assert!(names.contains(&"LocalData".to_string()));
        assert!(names.iter().any(|n| n.starts_with("loganalytics (alias of MSSentinel")));
    }

    #[test]
    fn test_sentinel_args_from_params() {
        let params = ProviderParams::new()
            .with("tenant_id", "t1")
            .with("workspace_id", "w1");
        let args = sentinel_connect_args(&params, &IndexMap::new()).unwrap();
        assert!(args.get_str("connection_str").unwrap().contains("t1"));
    }

    #[test]
    fn test_sentinel_args_from_default_workspace() {
        let mut workspaces = IndexMap::new();
        workspaces.insert(
            "Default".to_string(),
            WorkspaceConfig {
                tenant_id: Some("t".into()),
                workspace_id: Some("w".into()),
            },
        );
        let args = sentinel_connect_args(&ProviderParams::new(), &workspaces).unwrap();
        assert!(args.get_str("connection_str").unwrap().contains("workspace(\"w\")"));
    }

    #[test]
    fn test_sentinel_args_missing_config() {
        assert!(sentinel_connect_args(&ProviderParams::new(), &IndexMap::new()).is_err());
    }
}
