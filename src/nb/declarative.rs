//! Notebooklets defined entirely by a YAML document.
//!
//! Each entry of the document's `queries` section becomes a result
//! attribute holding the rows of that query. Entries with an `option`
//! only run when the option is active; entries with a `param` bind the
//! run value to that field and so need a value.

use crate::error::Result;
use crate::nb::{query_rows, table};
use crate::notebooklet::{Notebooklet, NotebookletCore, RunArgs, UnitInfo};
use crate::providers::{ProviderParams, ProviderRegistry};
use crate::result::NotebookletResult;
use std::sync::Arc;
use tracing::debug;

pub struct DeclarativeNB {
    core: NotebookletCore,
}

pub fn create(
    info: Arc<UnitInfo>,
    providers: Arc<ProviderRegistry>,
    params: &ProviderParams,
) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(DeclarativeNB {
        core: NotebookletCore::new(info, providers, params)?,
    }))
}

impl Notebooklet for DeclarativeNB {
    fn core(&self) -> &NotebookletCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NotebookletCore {
        &mut self.core
    }

    fn execute(&mut self, args: &RunArgs) -> Result<NotebookletResult> {
        let mut result = self.core.new_result();
        if let Some(value) = &args.value {
            result.set("value", value.clone());
        }

        for (attribute, spec) in &self.core.info().queries {
            if let Some(option) = &spec.option {
                if !self.core.option_enabled(option) {
                    debug!("Skipping {}: option {} not active", attribute, option);
                    continue;
                }
            }
            let mut params = ProviderParams::new();
            if let Some(field) = &spec.param {
                params.insert(field.clone(), args.require_value()?);
            }
            for (key, value) in &args.extra {
                params.insert(key.clone(), value.clone());
            }
            let rows = query_rows(&self.core, &spec.query, params)?;
            result.set(attribute.clone(), table(rows));
        }
        Ok(result)
    }
}
