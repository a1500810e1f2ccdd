// Hierarchical container of notebooklet classes mirroring folder layout

use crate::discovery::UnitClass;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Child of a [`Container`]: a sub-folder or a notebooklet class
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Container(&'a Container),
    Unit(&'a Arc<UnitClass>),
}

impl<'a> Entry<'a> {
    pub fn as_container(&self) -> Option<&'a Container> {
        match *self {
            Entry::Container(c) => Some(c),
            Entry::Unit(_) => None,
        }
    }

    pub fn as_unit(&self) -> Option<&'a Arc<UnitClass>> {
        match *self {
            Entry::Unit(u) => Some(u),
            Entry::Container(_) => None,
        }
    }
}

/// A folder node
#[derive(Debug, Clone, Default)]
pub struct Container {
    folders: IndexMap<String, Container>,
    units: IndexMap<String, Arc<UnitClass>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child folder or class; folders shadow classes of the same name
    pub fn get(&self, name: &str) -> Option<Entry<'_>> {
        if let Some(folder) = self.folders.get(name) {
            return Some(Entry::Container(folder));
        }
        self.units.get(name).map(Entry::Unit)
    }

    /// Follow a dotted path such as `azsent.host.HostSummary`
    pub fn get_path(&self, path: &str) -> Option<Entry<'_>> {
        let mut parts = path.split('.').filter(|p| !p.is_empty());
        let mut entry = self.get(parts.next()?)?;
        for part in parts {
            entry = entry.as_container()?.get(part)?;
        }
        Some(entry)
    }

    /// Sub-container at `folders`, created on demand
    pub fn container_mut(&mut self, folders: &[&str]) -> &mut Container {
        match folders.split_first() {
            None => self,
            Some((first, rest)) => self
                .folders
                .entry(first.to_string())
                .or_default()
                .container_mut(rest),
        }
    }

    /// Add `unit` under `folders`, replacing any class of the same name
    pub fn insert_unit(&mut self, folders: &[&str], unit: Arc<UnitClass>) {
        let name = unit.info().class_name.clone();
        self.container_mut(folders).units.insert(name, unit);
    }

    pub fn folders(&self) -> impl Iterator<Item = (&String, &Container)> {
        self.folders.iter()
    }

    pub fn units(&self) -> impl Iterator<Item = (&String, &Arc<UnitClass>)> {
        self.units.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.units.is_empty()
    }

    /// Every class below this node with its dotted path
    pub fn iter_classes(&self) -> Vec<(String, Arc<UnitClass>)> {
        let mut found = Vec::new();
        self.collect_classes("", &mut found);
        found
    }

    fn collect_classes(&self, prefix: &str, found: &mut Vec<(String, Arc<UnitClass>)>) {
        let join = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", prefix, name)
            }
        };
        for (name, unit) in &self.units {
            found.push((join(name), unit.clone()));
        }
        for (name, child) in &self.folders {
            child.collect_classes(&join(name), found);
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        for (name, unit) in &self.units {
            writeln!(f, "{}{}: {}", indent, name, unit.info().description())?;
        }
        for (name, child) in &self.folders {
            writeln!(f, "{}{}/", indent, name)?;
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
