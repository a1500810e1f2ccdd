//! Notebooklet discovery: the class tree, the flat dotted-path index and
//! filesystem loading of user-supplied unit definitions.

pub mod container;
pub mod loader;
pub mod registry;

pub use container::{Container, Entry};
pub use loader::load_root;
pub use registry::UnitRegistry;

use crate::error::{Error, Result};
use crate::nb;
use crate::notebooklet::{Notebooklet, UnitInfo};
use crate::providers::{hub, ProviderParams, ProviderRegistry};
use std::fmt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{info, warn};

/// Constructs a notebooklet instance for a class
pub type UnitFactory =
    fn(Arc<UnitInfo>, Arc<ProviderRegistry>, &ProviderParams) -> Result<Box<dyn Notebooklet>>;

/// A registered notebooklet class
pub struct UnitClass {
    path: String,
    info: Arc<UnitInfo>,
    factory: UnitFactory,
}

impl UnitClass {
    pub fn new(path: impl Into<String>, info: UnitInfo, factory: UnitFactory) -> Self {
        Self {
            path: path.into(),
            info: Arc::new(info),
            factory,
        }
    }

    /// Dotted path in the registry index
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn info(&self) -> &UnitInfo {
        &self.info
    }

    pub fn class_name(&self) -> &str {
        &self.info.class_name
    }

    pub fn match_terms(&self, search_terms: &str) -> (bool, usize) {
        self.info.match_terms(search_terms)
    }

    /// Construct an instance against `providers`
    pub fn create(
        &self,
        providers: Arc<ProviderRegistry>,
        params: &ProviderParams,
    ) -> Result<Box<dyn Notebooklet>> {
        (self.factory)(self.info.clone(), providers, params)
    }

    /// Construct an instance against the process-wide current registry
    pub fn create_with_current(&self, params: &ProviderParams) -> Result<Box<dyn Notebooklet>> {
        let providers = hub::current().ok_or_else(|| {
            Error::other("No current provider registry was found. Please initialize providers first.")
        })?;
        self.create(providers, params)
    }
}

impl fmt::Debug for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitClass")
            .field("path", &self.path)
            .field("class_name", &self.info.class_name)
            .finish()
    }
}

/// Namespace holding every user-supplied root
pub const CUSTOM_NAMESPACE: &str = "custom";

/// Build a registry of the built-in notebooklets plus every unit found under `roots`.
///
/// Classes from each root are placed under `custom.<root folder name>`,
/// with a numeric suffix when an earlier root already took that name. A
/// missing root is an error; files that fail to load are recorded and
/// skipped.
pub fn build_registry(roots: &[PathBuf]) -> Result<UnitRegistry> {
    let mut registry = UnitRegistry::new();
    nb::register_builtins(&mut registry)?;
    let mut used: HashSet<String> = HashSet::new();
    for root in roots {
        let prefix = root_prefix(root, &mut used);
        let count = load_root(&mut registry, root, Some(&prefix))?;
        info!("Loaded {} notebooklets from {} as {}", count, root.display(), prefix);
    }
    Ok(registry)
}

/// Unique `custom.<name>` prefix for `root`
fn root_prefix(root: &Path, used: &mut HashSet<String>) -> String {
    let name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().replace('.', "_")))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "root".to_string());

    let mut candidate = name.clone();
    let mut suffix = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}_{}", name, suffix);
        suffix += 1;
    }
    if candidate != name {
        warn!(
            "Discovery root {} shares the name '{}' with an earlier root, using '{}'",
            root.display(),
            name,
            candidate
        );
    }
    format!("{}.{}", CUSTOM_NAMESPACE, candidate)
}

fn global() -> &'static RwLock<Option<Arc<UnitRegistry>>> {
    static UNITS: OnceLock<RwLock<Option<Arc<UnitRegistry>>>> = OnceLock::new();
    UNITS.get_or_init(|| RwLock::new(None))
}

/// Rebuild the process-wide registry from the built-ins and `roots`
pub fn discover_modules(roots: &[PathBuf]) -> Result<Arc<UnitRegistry>> {
    let registry = Arc::new(build_registry(roots)?);
    match global().write() {
        Ok(mut guard) => *guard = Some(registry.clone()),
        Err(poisoned) => *poisoned.into_inner() = Some(registry.clone()),
    }
    Ok(registry)
}

/// Process-wide registry, discovering the built-ins on first use
pub fn nblts() -> Result<Arc<UnitRegistry>> {
    let current = match global().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    match current {
        Some(registry) => Ok(registry),
        None => discover_modules(&[]),
    }
}
