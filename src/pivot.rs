//! Entity pivot functions backed by notebooklets.
//!
//! Every notebooklet that accepts a `value` input and declares a pivotable
//! entity type is exposed as a function on that entity, named after the
//! snake-cased class name.

use crate::discovery::{UnitClass, UnitRegistry};
use crate::error::Result;
use crate::notebooklet::RunArgs;
use crate::providers::{ProviderParams, ProviderRegistry};
use crate::result::NotebookletResult;
use crate::timespan::TimeSpan;
use std::sync::Arc;

/// Declared entity type -> (pivot entity, entity attribute passed as `value`)
const ENTITY_MAP: &[(&str, &str, &str)] = &[
    ("host", "Host", "HostName"),
    ("account", "Account", "Name"),
    ("ip_address", "IpAddress", "Address"),
    ("alert", "Alert", "AlertType"),
];

const EXCLUDED: &[&str] = &["TemplateNB"];

/// A notebooklet run exposed on an entity
#[derive(Debug, Clone)]
pub struct PivotFunction {
    pub entity: &'static str,
    /// Entity attribute supplied as the run value
    pub attribute: &'static str,
    pub func_name: String,
    pub unit: Arc<UnitClass>,
}

impl PivotFunction {
    /// Construct the notebooklet and run it for `value` over `timespan`
    pub fn run(
        &self,
        providers: Arc<ProviderRegistry>,
        params: &ProviderParams,
        value: &str,
        timespan: TimeSpan,
    ) -> Result<NotebookletResult> {
        let mut nb = self.unit.create(providers, params)?;
        nb.run(RunArgs::new().value(value).timespan(timespan))
    }
}

/// All pivot functions derived from a unit registry
#[derive(Debug, Clone, Default)]
pub struct PivotTable {
    functions: Vec<PivotFunction>,
}

impl PivotTable {
    pub fn from_registry(registry: &UnitRegistry) -> Self {
        let mut functions = Vec::new();
        for (_, unit) in registry.iter_classes() {
            let metadata = &unit.info().metadata;
            if EXCLUDED.contains(&unit.class_name()) || !metadata.inputs.iter().any(|i| i == "value") {
                continue;
            }
            let func_name = to_snake_case(unit.class_name());
            for entity_type in &metadata.entity_types {
                let Some(&(_, entity, attribute)) = ENTITY_MAP
                    .iter()
                    .find(|(declared, _, _)| *declared == entity_type.as_str())
                else {
                    continue;
                };
                functions.push(PivotFunction {
                    entity,
                    attribute,
                    func_name: func_name.clone(),
                    unit: unit.clone(),
                });
            }
        }
        Self { functions }
    }

    /// Functions registered on `entity`
    pub fn for_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a PivotFunction> {
        self.functions.iter().filter(move |f| f.entity == entity)
    }

    pub fn get(&self, entity: &str, func_name: &str) -> Option<&PivotFunction> {
        self.functions
            .iter()
            .find(|f| f.entity == entity && f.func_name == func_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PivotFunction> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// `HostSummary` -> `host_summary`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_lowercase() {
            out.push(c);
        } else {
            out.push('_');
            out.extend(c.to_lowercase());
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::build_registry;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("HostSummary"), "host_summary");
        assert_eq!(to_snake_case("IpSummary"), "ip_summary");
        assert_eq!(to_snake_case("TemplateNB"), "template_n_b");
    }

    #[test]
    fn test_builtin_pivots() {
        let registry = build_registry(&[]).unwrap();
        let table = PivotTable::from_registry(&registry);
        let host = table.get("Host", "host_summary").unwrap();
        assert_eq!(host.attribute, "HostName");
        assert_eq!(host.unit.path(), "azsent.host.HostSummary");
        assert!(table.get("IpAddress", "ip_summary").is_some());
        assert!(table.iter().all(|f| f.unit.class_name() != "TemplateNB"));
        assert_eq!(table.for_entity("Host").count(), 1);
    }

    #[test]
    fn test_units_without_value_input_skipped() {
        let mut registry = UnitRegistry::new();
        let yaml = "metadata:\n  name: NoValue\n  inputs: [data]\n  entity_types: [host]\n";
        let info = crate::notebooklet::UnitInfo::from_yaml("NoValue", "x", yaml, &[]).unwrap();
        registry.register("x", info, crate::nb::declarative::create);
        assert!(PivotTable::from_registry(&registry).is_empty());
    }
}
