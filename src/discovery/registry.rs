// Dual-indexed notebooklet class registry

use crate::discovery::container::{Container, Entry};
use crate::discovery::{UnitClass, UnitFactory};
use crate::notebooklet::UnitInfo;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Notebooklet classes as a folder tree and a flat dotted-path index
#[derive(Debug, Default)]
pub struct UnitRegistry {
    tree: Container,
    index: IndexMap<String, Arc<UnitClass>>,
    /// Files that failed to load (path -> error message)
    load_errors: IndexMap<PathBuf, String>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class in folder `folder` (dotted, may be empty).
    ///
    /// The class is reachable through the tree and through the index under
    /// `folder.ClassName`. A class already at that path is replaced.
    pub fn register(&mut self, folder: &str, info: UnitInfo, factory: UnitFactory) -> Arc<UnitClass> {
        let folders: Vec<&str> = folder.split('.').filter(|f| !f.is_empty()).collect();
        let mut path = folders.join(".");
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&info.class_name);

        let unit = Arc::new(UnitClass::new(path.clone(), info, factory));
        self.tree.insert_unit(&folders, unit.clone());
        if self.index.insert(path.clone(), unit.clone()).is_some() {
            warn!("Notebooklet {} replaced an earlier definition", path);
        }
        unit
    }

    pub(crate) fn record_load_error(&mut self, path: &Path, message: String) {
        warn!("Could not load notebooklet definition {}: {}", path.display(), message);
        self.load_errors.insert(path.to_path_buf(), message);
    }

    /// Class by exact dotted path
    pub fn get(&self, path: &str) -> Option<&Arc<UnitClass>> {
        self.index.get(path)
    }

    /// Folder or class at a dotted path in the tree
    pub fn get_path(&self, path: &str) -> Option<Entry<'_>> {
        self.tree.get_path(path)
    }

    pub fn tree(&self) -> &Container {
        &self.tree
    }

    pub fn index(&self) -> &IndexMap<String, Arc<UnitClass>> {
        &self.index
    }

    /// `(dotted path, class)` for every registered class
    pub fn iter_classes(&self) -> impl Iterator<Item = (&String, &Arc<UnitClass>)> {
        self.index.iter()
    }

    pub fn load_errors(&self) -> &IndexMap<PathBuf, String> {
        &self.load_errors
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Classes matching any of `keywords`, best matches first.
    ///
    /// Ordering is by (all terms matched, number of terms matched),
    /// descending. With `full_match` only classes matching every term
    /// are returned.
    pub fn find(&self, keywords: &str, full_match: bool) -> Vec<(String, Arc<UnitClass>)> {
        let mut scored: Vec<((bool, usize), &Arc<UnitClass>)> = self
            .index
            .values()
            .map(|unit| (unit.match_terms(keywords), unit))
            .filter(|((all, count), _)| *count > 0 && (*all || !full_match))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .map(|(_, unit)| (unit.class_name().to_string(), unit.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::notebooklet::Notebooklet;
    use crate::providers::{ProviderParams, ProviderRegistry};

    fn no_factory(
        _info: Arc<UnitInfo>,
        _providers: Arc<ProviderRegistry>,
        _params: &ProviderParams,
    ) -> Result<Box<dyn Notebooklet>> {
        Err(Error::other("not constructible"))
    }

    fn info(class_name: &str, keywords: &[&str]) -> UnitInfo {
        let yaml = format!(
            "metadata:\n  name: {}\n  description: {} test\n  keywords: [{}]\n",
            class_name,
            class_name,
            keywords.join(", ")
        );
        UnitInfo::from_yaml(class_name, "test", &yaml, &[]).unwrap()
    }

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.register("a.b", info("FooClass", &["host", "windows"]), no_factory);
        registry.register("a", info("BarClass", &["host"]), no_factory);
        registry.register("", info("TopClass", &["account"]), no_factory);
        registry
    }

    #[test]
    fn test_tree_and_index_agree() {
        let registry = registry();
        let by_index = registry.get("a.b.FooClass").unwrap();
        let by_tree = registry.get_path("a.b.FooClass").unwrap().as_unit().unwrap();
        assert!(Arc::ptr_eq(by_index, by_tree));
        assert_eq!(by_index.path(), "a.b.FooClass");
        assert!(registry.get_path("a.b").unwrap().as_container().is_some());
        assert!(registry.get("TopClass").is_some());
        assert!(registry.get_path("a.missing").is_none());
    }

    #[test]
    fn test_iter_classes() {
        let registry = registry();
        let paths: Vec<&String> = registry.iter_classes().map(|(p, _)| p).collect();
        assert_eq!(paths, ["a.b.FooClass", "a.BarClass", "TopClass"]);
        assert_eq!(registry.tree().iter_classes().len(), 3);
    }

    #[test]
    fn test_register_replaces_same_path() {
        let mut registry = registry();
        registry.register("a.b", info("FooClass", &["linux"]), no_factory);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("a.b.FooClass").unwrap().info().keywords(), ["linux"]);
    }

    #[test]
    fn test_find_orders_by_match() {
        let registry = registry();
        let found = registry.find("host windows", false);
        let names: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["FooClass", "BarClass"]);

        let full = registry.find("host windows", true);
        assert_eq!(full.len(), 1);
        assert!(registry.find("monkey stew", false).is_empty());
    }

    #[test]
    fn test_display_tree() {
        let text = registry().tree().to_string();
        assert!(text.contains("a/"));
        assert!(text.contains("    FooClass: FooClass test"));
    }
}
