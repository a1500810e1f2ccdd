// Provider registry: the set of live provider handles for a session

use crate::error::{Error, Result};
use crate::options::ListSpec;
use crate::providers::catalog::ProviderCatalog;
use crate::providers::provider::{ProviderHandle, ProviderKind, ProviderParams};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Primary query provider selector
#[derive(Clone, Default)]
pub enum QuerySelector {
    /// No primary query provider
    #[default]
    None,
    /// Build the named provider and make it the default query handle
    Name(String),
    /// Register an already-built handle
    Handle(ProviderHandle),
}

impl PartialEq for QuerySelector {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (QuerySelector::None, QuerySelector::None) => true,
            (QuerySelector::Name(a), QuerySelector::Name(b)) => a == b,
            (QuerySelector::Handle(a), QuerySelector::Handle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for QuerySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerySelector::None => write!(f, "None"),
            QuerySelector::Name(name) => write!(f, "Name({})", name),
            QuerySelector::Handle(handle) => write!(f, "Handle({})", handle.name()),
        }
    }
}

/// Construction arguments; also the registry's identity key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryArgs {
    pub query_provider: QuerySelector,
    pub providers: Option<Vec<String>>,
    pub params: ProviderParams,
}

impl RegistryArgs {
    pub fn new(query_provider: impl Into<String>) -> Self {
        Self {
            query_provider: QuerySelector::Name(query_provider.into()),
            ..Self::default()
        }
    }

    pub fn with_handle(handle: ProviderHandle) -> Self {
        Self {
            query_provider: QuerySelector::Handle(handle),
            ..Self::default()
        }
    }

    pub fn providers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }
}

/// Result of checking a list of required providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCheck {
    /// Requirements not satisfied by any registered provider
    pub missing: Vec<String>,
    /// Subset of `missing` that are not recognized provider names at all
    pub unknown: Vec<String>,
}

impl ProviderCheck {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Live provider handles keyed by the name they were requested under
pub struct ProviderRegistry {
    key: RegistryArgs,
    catalog: Arc<ProviderCatalog>,
    provider_names: Vec<String>,
    providers: RwLock<IndexMap<String, ProviderHandle>>,
    query_provider: Option<ProviderHandle>,
}

impl ProviderRegistry {
    /// Build every requested provider.
    ///
    /// Individual provider failures are logged and skipped. Mixing plain
    /// names with `+`/`-` entries in `args.providers` fails.
    pub fn new(args: RegistryArgs, catalog: Arc<ProviderCatalog>) -> Result<Self> {
        let mut provider_names = resolve_provider_names(
            args.providers.as_deref(),
            catalog.default_providers(),
        )?;

        let mut registry = Self {
            key: args.clone(),
            catalog,
            provider_names: Vec::new(),
            providers: RwLock::new(IndexMap::new()),
            query_provider: None,
        };

        match &args.query_provider {
            QuerySelector::Handle(handle) => {
                registry.insert(handle.name().to_string(), handle.clone());
                registry.query_provider = Some(handle.clone());
            }
            QuerySelector::Name(name) => {
                if !provider_names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    provider_names.insert(0, name.clone());
                }
            }
            QuerySelector::None => {}
        }

        for name in &provider_names {
            if let Err(e) = registry.add_provider(name, &args.params) {
                warn!("Provider {} could not be loaded and will be unavailable: {}", name, e);
            }
        }

        if let QuerySelector::Name(name) = &args.query_provider {
            registry.query_provider = registry.get_provider(name).ok();
            if registry.query_provider.is_none() {
                warn!("Default query provider {} is not available", name);
            }
        }

        registry.provider_names = provider_names;
        info!(
            "Loaded providers: {}",
            registry.registered_names().join(", ")
        );
        Ok(registry)
    }

    /// Arguments this registry was built with
    pub fn key(&self) -> &RegistryArgs {
        &self.key
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Names that were requested at construction
    pub fn requested_names(&self) -> &[String] {
        &self.provider_names
    }

    /// Names of successfully registered providers
    pub fn registered_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of the registered handles
    pub fn providers(&self) -> IndexMap<String, ProviderHandle> {
        self.read().clone()
    }

    /// Default query provider, if one was built
    pub fn query_provider(&self) -> Option<ProviderHandle> {
        self.query_provider.clone()
    }

    /// Registered under `name` (case-insensitive) or under one of its aliases
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Provider for `name`, matching case-insensitively and through aliases
    pub fn get_provider(&self, name: &str) -> Result<ProviderHandle> {
        self.find(name)
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))
    }

    fn find(&self, name: &str) -> Option<ProviderHandle> {
        let providers = self.read();
        if let Some((_, handle)) = providers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            return Some(handle.clone());
        }
        let canonical = self.catalog.canonical_name(name)?;
        providers
            .iter()
            .find(|(key, _)| self.catalog.canonical_name(key) == Some(canonical))
            .map(|(_, handle)| handle.clone())
    }

    /// Construct and register `name`; a no-op if it is already present.
    ///
    /// `params` are the session-wide parameters; only the entries prefixed
    /// with the provider name are used. Connect failures are logged and the
    /// unconnected handle is still registered.
    pub fn add_provider(&self, name: &str, params: &ProviderParams) -> Result<()> {
        if self.contains(name) {
            debug!("Provider {} already loaded", name);
            return Ok(());
        }
        let (canonical, definition) = self
            .catalog
            .definition(name)
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))?;

        let mut scoped = params.scoped(canonical);
        if !canonical.eq_ignore_ascii_case(name) {
            scoped = scoped.merged(&params.scoped(name));
        }

        let handle = (definition.factory)(name, &scoped)?;
        let needs_connect = definition.connect_required
            || (handle.kind() == ProviderKind::Enrichment
                && !handle.connect_params().is_empty()
                && !scoped.filtered(handle.connect_params()).is_empty());

        if needs_connect && !handle.connected() {
            let explicit = scoped.filtered(handle.connect_params());
            let connect_args = if !explicit.is_empty() {
                Ok(explicit)
            } else if let Some(resolver) = definition.config_resolver {
                resolver(&scoped, self.catalog.workspaces())
            } else {
                Ok(ProviderParams::new())
            };
            match connect_args.and_then(|args| handle.connect(&args)) {
                Ok(()) => debug!("Connected provider {}", name),
                Err(e) => warn!("Connection to provider {} failed: {}", name, e),
            }
        }

        self.insert(name.to_string(), handle);
        Ok(())
    }

    /// Check `required` against the registered providers.
    ///
    /// Each entry is a provider name or an `A|B|...` group satisfied by any
    /// member. A name is satisfied through its aliases, or by a registered
    /// stand-in when it names a query provider. Empty group members are
    /// ignored.
    pub fn has_required_providers<S: AsRef<str>>(&self, required: &[S]) -> ProviderCheck {
        let mut check = ProviderCheck::default();
        for req in required {
            let req = req.as_ref().trim();
            let members: Vec<&str> = req.split('|').map(str::trim).filter(|m| !m.is_empty()).collect();
            if members.is_empty() {
                continue;
            }
            let satisfied = members
                .iter()
                .any(|member| self.contains(member) || self.satisfied_by_stand_in(member));
            if satisfied {
                continue;
            }
            check.missing.push(req.to_string());
            if !members.iter().any(|member| self.catalog.is_known(member)) {
                check.unknown.push(req.to_string());
            }
        }
        check
    }

    fn satisfied_by_stand_in(&self, name: &str) -> bool {
        self.catalog.is_query_provider(name)
            && self
                .catalog
                .stand_ins()
                .iter()
                .any(|stand_in| self.contains(stand_in))
    }

    /// Every provider name the catalog accepts
    pub fn list_providers(&self) -> Vec<String> {
        self.catalog.list_providers()
    }

    /// Providers loaded when no explicit list is given
    pub fn get_def_providers(&self) -> Vec<String> {
        self.catalog.default_providers().to_vec()
    }

    fn insert(&self, name: String, handle: ProviderHandle) {
        self.write().insert(name, handle);
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, ProviderHandle>> {
        match self.providers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, ProviderHandle>> {
        match self.providers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("key", &self.key)
            .field("providers", &self.registered_names())
            .finish()
    }
}

/// Requested provider names: the defaults, a replacement list, or the
/// defaults adjusted by `+`/`-` entries.
pub fn resolve_provider_names<S: AsRef<str>>(
    requested: Option<&[S]>,
    defaults: &[String],
) -> Result<Vec<String>> {
    match requested {
        None => Ok(defaults.to_vec()),
        Some(list) => Ok(ListSpec::parse(list)?.apply(defaults)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::catalog::ProviderDefinition;
    use crate::providers::query::{LocalDataBackend, QueryProvider};
    use serde_json::json;
    use tempfile::TempDir;

    fn catalog() -> Arc<ProviderCatalog> {
        Arc::new(ProviderCatalog::builtin())
    }

    fn local_args(dir: &TempDir) -> RegistryArgs {
        RegistryArgs::new("LocalData")
            .param("LocalData_data_paths", json!([dir.path().to_str().unwrap()]))
    }

    #[test]
    fn test_resolve_names_default_and_modifiers() {
        let defaults = vec!["default1".to_string(), "default2".to_string()];
        assert_eq!(resolve_provider_names::<&str>(None, &defaults).unwrap(), defaults);
        let names = resolve_provider_names(Some(&["+extra", "-default1"][..]), &defaults).unwrap();
        assert_eq!(names, vec!["default2".to_string(), "extra".to_string()]);
        assert!(resolve_provider_names(Some(&["x", "+y"][..]), &defaults).is_err());
    }

    #[test]
    fn test_default_construction() {
        let dir = TempDir::new().unwrap();
        let registry = ProviderRegistry::new(local_args(&dir), catalog()).unwrap();
        let names = registry.registered_names();
        assert_eq!(names, vec!["LocalData", "tilookup", "geolitelookup"]);
        let qp = registry.query_provider().unwrap();
        assert_eq!(qp.name(), "LocalData");
        assert!(qp.connected());
    }

    #[test]
    fn test_explicit_list_replaces_defaults() {
        let dir = TempDir::new().unwrap();
        let registry =
            ProviderRegistry::new(local_args(&dir).providers(["tilookup"]), catalog()).unwrap();
        assert!(registry.contains("tilookup"));
        assert!(!registry.contains("geolitelookup"));
        assert!(registry.contains("LocalData"));
    }

    #[test]
    fn test_add_and_remove_from_defaults() {
        let dir = TempDir::new().unwrap();
        let args = local_args(&dir)
            .providers(["+ipstacklookup", "-geolitelookup"])
            .param("ipstacklookup_api_key", "key");
        let registry = ProviderRegistry::new(args, catalog()).unwrap();
        assert!(registry.contains("ipstacklookup"));
        assert!(registry.contains("tilookup"));
        assert!(!registry.contains("geolitelookup"));
    }

    #[test]
    fn test_mixed_list_fails_fast() {
        let args = RegistryArgs::new("LocalData").providers(["tilookup", "-geolitelookup"]);
        let err = ProviderRegistry::new(args, catalog()).unwrap_err();
        assert!(matches!(err, Error::ConfigurationConflict(_)));
    }

    #[test]
    fn test_failed_provider_is_skipped() {
        let dir = TempDir::new().unwrap();
        let args = local_args(&dir).providers(["ipstacklookup", "tilookup", "nosuchprovider"]);
        let registry = ProviderRegistry::new(args, catalog()).unwrap();
        assert!(!registry.contains("ipstacklookup"));
        assert!(!registry.contains("nosuchprovider"));
        assert!(registry.contains("tilookup"));
    }

    #[test]
    fn test_unconnected_query_provider_still_registered() {
        let registry = ProviderRegistry::new(
            RegistryArgs::new("MSSentinel").providers(Vec::<String>::new()),
            catalog(),
        )
        .unwrap();
        let qp = registry.get_provider("MSSentinel").unwrap();
        assert!(!qp.connected());
    }

    #[test]
    fn test_sentinel_connects_from_params() {
        let args = RegistryArgs::new("MSSentinel")
            .providers(Vec::<String>::new())
            .param("MSSentinel_tenant_id", "t")
            .param("MSSentinel_workspace_id", "w");
        let registry = ProviderRegistry::new(args, catalog()).unwrap();
        assert!(registry.query_provider().unwrap().connected());
    }

    #[test]
    fn test_handle_selector_registers_directly() {
        let handle: ProviderHandle = Arc::new(QueryProvider::new(
            "MyData",
            Box::new(LocalDataBackend::new()),
        ));
        let args = RegistryArgs::with_handle(handle.clone()).providers(Vec::<String>::new());
        let registry = ProviderRegistry::new(args, catalog()).unwrap();
        assert!(Arc::ptr_eq(&registry.query_provider().unwrap(), &handle));
        assert_eq!(registry.registered_names(), vec!["MyData"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_alias_aware() {
        let registry = ProviderRegistry::new(
            RegistryArgs::new("LogAnalytics").providers(Vec::<String>::new()),
            catalog(),
        )
        .unwrap();
        assert!(registry.contains("loganalytics"));
        assert!(registry.contains("MSSentinel"));
        assert_eq!(registry.registered_names(), vec!["LogAnalytics"]);
    }

    #[test]
    fn test_add_provider_is_noop_when_present() {
        let dir = TempDir::new().unwrap();
        let registry = ProviderRegistry::new(local_args(&dir), catalog()).unwrap();
        let before = registry.get_provider("tilookup").unwrap();
        registry.add_provider("TILookup", &ProviderParams::new()).unwrap();
        let after = registry.get_provider("tilookup").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(registry.registered_names().len(), 3);
    }

    #[test]
    fn test_required_plain_and_unknown() {
        let dir = TempDir::new().unwrap();
        let registry = ProviderRegistry::new(local_args(&dir), catalog()).unwrap();
        let check = registry.has_required_providers(&["tilookup", "ipstacklookup", "bad_provider"]);
        assert_eq!(check.missing, vec!["ipstacklookup", "bad_provider"]);
        assert_eq!(check.unknown, vec!["bad_provider"]);
    }

    #[test]
    fn test_required_alternatives() {
        let dir = TempDir::new().unwrap();
        let registry = ProviderRegistry::new(
            local_args(&dir).providers(["geolitelookup"]),
            catalog(),
        )
        .unwrap();
        assert!(registry
            .has_required_providers(&["ipstacklookup|geolitelookup"])
            .is_satisfied());
        let check = registry.has_required_providers(&["ipstacklookup|tilookup"]);
        assert_eq!(check.missing, vec!["ipstacklookup|tilookup"]);
        assert!(check.unknown.is_empty());
    }

    #[test]
    fn test_stand_in_satisfies_query_requirement() {
        let dir = TempDir::new().unwrap();
        let registry = ProviderRegistry::new(local_args(&dir), catalog()).unwrap();
        assert!(registry.has_required_providers(&["AzureSentinel"]).is_satisfied());
        assert!(!registry.has_required_providers(&["azuredata"]).is_satisfied());
    }

    #[test]
    fn test_alias_satisfies_requirement() {
        let registry = ProviderRegistry::new(
            RegistryArgs::new("LogAnalytics").providers(Vec::<String>::new()),
            catalog(),
        )
        .unwrap();
        assert!(!registry.contains("LocalData"));
        assert!(registry.has_required_providers(&["AzureSentinel"]).is_satisfied());
        assert!(registry
            .has_required_providers(&["AzureSentinel|nonesuch"])
            .is_satisfied());
        assert!(registry.has_required_providers(&["nonesuch|MSSentinel"]).is_satisfied());
    }

    #[test]
    fn test_trailing_separator_in_requirement() {
        let dir = TempDir::new().unwrap();
        let registry = ProviderRegistry::new(local_args(&dir), catalog()).unwrap();
        assert!(registry.has_required_providers(&["tilookup|"]).is_satisfied());
        assert!(registry.has_required_providers(&["|tilookup"]).is_satisfied());
        assert!(registry.has_required_providers(&["|"]).is_satisfied());

        let check = registry.has_required_providers(&["ipstacklookup|"]);
        assert_eq!(check.missing, vec!["ipstacklookup|"]);
        assert!(check.unknown.is_empty());
    }

    #[test]
    fn test_custom_catalog_definition() {
        fn factory(name: &str, _p: &ProviderParams) -> Result<ProviderHandle> {
            Ok(Arc::new(QueryProvider::new(name, Box::new(LocalDataBackend::new()))))
        }
        let mut catalog = ProviderCatalog::new();
        catalog.register("extra", ProviderDefinition::enrichment(factory));
        catalog.set_defaults(["extra"]);
        let registry =
            ProviderRegistry::new(RegistryArgs::default(), Arc::new(catalog)).unwrap();
        assert!(registry.contains("extra"));
        assert!(registry.query_provider().is_none());
    }
}
