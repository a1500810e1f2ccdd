// Service locator holding the current provider registry

use crate::error::Result;
use crate::providers::catalog::ProviderCatalog;
use crate::providers::registry::{ProviderRegistry, RegistryArgs};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Keeps exactly one current [`ProviderRegistry`].
///
/// Asking for a registry with the same arguments as the current one
/// returns the current instance; different arguments build a new registry
/// that replaces it.
#[derive(Debug)]
pub struct ProviderHub {
    catalog: Arc<ProviderCatalog>,
    current: Option<Arc<ProviderRegistry>>,
}

impl ProviderHub {
    pub fn new(catalog: ProviderCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            current: None,
        }
    }

    pub fn catalog(&self) -> &Arc<ProviderCatalog> {
        &self.catalog
    }

    /// Swap the catalog used for future registries
    pub fn set_catalog(&mut self, catalog: ProviderCatalog) {
        self.catalog = Arc::new(catalog);
    }

    /// Current registry if its key equals `args`, otherwise a new one
    pub fn get_or_create(&mut self, args: RegistryArgs) -> Result<Arc<ProviderRegistry>> {
        if let Some(current) = &self.current {
            if current.key() == &args {
                debug!("Reusing current provider registry");
                return Ok(current.clone());
            }
        }
        let registry = Arc::new(ProviderRegistry::new(args, self.catalog.clone())?);
        self.current = Some(registry.clone());
        Ok(registry)
    }

    /// Most recently constructed registry
    pub fn current(&self) -> Option<Arc<ProviderRegistry>> {
        self.current.clone()
    }
}

impl Default for ProviderHub {
    fn default() -> Self {
        Self::new(ProviderCatalog::builtin())
    }
}

fn global() -> &'static Mutex<ProviderHub> {
    static HUB: OnceLock<Mutex<ProviderHub>> = OnceLock::new();
    HUB.get_or_init(|| Mutex::new(ProviderHub::default()))
}

/// Get or create the process-wide registry for `args`
pub fn init(args: RegistryArgs) -> Result<Arc<ProviderRegistry>> {
    match global().lock() {
        Ok(mut hub) => hub.get_or_create(args),
        Err(poisoned) => poisoned.into_inner().get_or_create(args),
    }
}

/// Replace the catalog of the process-wide hub
pub fn set_catalog(catalog: ProviderCatalog) {
    match global().lock() {
        Ok(mut hub) => hub.set_catalog(catalog),
        Err(poisoned) => poisoned.into_inner().set_catalog(catalog),
    }
}

/// Process-wide current registry
pub fn current() -> Option<Arc<ProviderRegistry>> {
    match global().lock() {
        Ok(hub) => hub.current(),
        Err(poisoned) => poisoned.into_inner().current(),
    }
}
