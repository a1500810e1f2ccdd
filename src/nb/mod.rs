//! Built-in notebooklets and the implementations available to definition files.
//!
//! Built-in classes are listed in an explicit manifest; each pairs a YAML
//! metadata document compiled into the binary with a factory.

pub mod azsent;
pub mod declarative;
pub mod template;

use crate::discovery::{UnitFactory, UnitRegistry};
use crate::error::{Error, Result};
use crate::notebooklet::{NotebookletCore, UnitInfo};
use crate::providers::{Lookup, ProviderHandle, ProviderParams, Record};
use serde_json::Value;
use tracing::debug;

/// One entry of the built-in manifest
#[derive(Debug, Clone, Copy)]
pub struct BuiltinUnit {
    /// Dotted folder path
    pub folder: &'static str,
    pub class_name: &'static str,
    /// YAML metadata document
    pub definition: &'static str,
    pub doc: &'static str,
    /// Result attributes: (name, type, description)
    pub attributes: &'static [(&'static str, &'static str, &'static str)],
    pub factory: UnitFactory,
}

/// Every built-in notebooklet class
pub fn manifest() -> Vec<BuiltinUnit> {
    vec![
        template::UNIT,
        azsent::host::UNIT,
        azsent::network::UNIT,
    ]
}

/// Register the built-in manifest
pub fn register_builtins(registry: &mut UnitRegistry) -> Result<()> {
    for unit in manifest() {
        let mod_name = unit.folder.rsplit('.').next().unwrap_or(unit.folder);
        let info = UnitInfo::from_yaml(unit.class_name, mod_name, unit.definition, unit.attributes)
            .map_err(|e| Error::other(format!("built-in {}: {}", unit.class_name, e)))?
            .with_doc(unit.doc);
        registry.register(unit.folder, info, unit.factory);
    }
    Ok(())
}

/// Factory for an implementation named in a definition file
pub fn implementation(name: &str) -> Option<UnitFactory> {
    match name.to_lowercase().as_str() {
        "declarative" => Some(declarative::create),
        "template" => Some(template::UNIT.factory),
        "host_summary" => Some(azsent::host::UNIT.factory),
        "ip_summary" => Some(azsent::network::UNIT.factory),
        _ => None,
    }
}

/// Rows as a JSON table
pub(crate) fn table(rows: Vec<Record>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

/// Run a query on the default query provider, scoped to the current timespan
pub(crate) fn query_rows(
    core: &NotebookletCore,
    query: &str,
    params: ProviderParams,
) -> Result<Vec<Record>> {
    let handle = core.query_provider().ok_or_else(|| {
        Error::provider_unavailable(["query provider"], Some(core.info().class_name.as_str()))
    })?;
    let provider = handle
        .as_query()
        .ok_or_else(|| Error::query(format!("{} cannot run queries", handle.name())))?;
    let timespan = core.timespan();
    let params = params
        .with("start", timespan.start.to_rfc3339())
        .with("end", timespan.end.to_rfc3339());
    let rows = provider.exec_query(query, &params)?;
    debug!("{} returned {} rows", query, rows.len());
    Ok(rows)
}

/// First registered provider among `names` that offers lookups
pub(crate) fn first_lookup(core: &NotebookletCore, names: &[&str]) -> Option<ProviderHandle> {
    names
        .iter()
        .filter_map(|name| core.get_provider(name).ok())
        .find(|handle| handle.as_lookup().is_some())
}

/// Look `value` up with `handle`, if it is a lookup provider
pub(crate) fn lookup_value(handle: &ProviderHandle, value: &str) -> Result<Value> {
    let lookup: &dyn Lookup = handle
        .as_lookup()
        .ok_or_else(|| Error::query(format!("{} does not support lookups", handle.name())))?;
    lookup.lookup(value)
}
