//! Template notebooklet.
//!
//! A minimal notebooklet to copy when writing a new one: it fetches the
//! events for a host, summarises them per hour and optionally returns some
//! metadata about the run.

use crate::error::Result;
use crate::nb::{query_rows, table, BuiltinUnit};
use crate::notebooklet::{Notebooklet, NotebookletCore, RunArgs, UnitInfo};
use crate::providers::{ProviderParams, ProviderRegistry, Record};
use crate::result::NotebookletResult;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;

pub const UNIT: BuiltinUnit = BuiltinUnit {
    folder: "template",
    class_name: "TemplateNB",
    definition: include_str!("template.yaml"),
    doc: "Template Notebooklet class.\n\nDetailed description of things this notebooklet does:\n\n- Fetches all events from XYZ\n- Plots interesting stuff\n- Returns extended metadata about the thing\n",
    attributes: &[
        ("all_events", "Table", "Table of all raw events retrieved."),
        ("plot", "Table", "Count of events per hour, in time order."),
        ("additional_info", "dict", "Additional information for my notebooklet."),
    ],
    factory: create,
};

const EVENTS_QUERY: &str = "SecurityEvent.list_host_events";

pub struct TemplateNB {
    core: NotebookletCore,
}

fn create(
    info: Arc<UnitInfo>,
    providers: Arc<ProviderRegistry>,
    params: &ProviderParams,
) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(TemplateNB {
        core: NotebookletCore::new(info, providers, params)?,
    }))
}

impl Notebooklet for TemplateNB {
    fn core(&self) -> &NotebookletCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NotebookletCore {
        &mut self.core
    }

    fn execute(&mut self, args: &RunArgs) -> Result<NotebookletResult> {
        let host = args.require_value()?;
        let mut result = self.core.new_result();

        let mut events = Vec::new();
        if self.core.option_enabled("all_events") {
            events = query_rows(
                &self.core,
                EVENTS_QUERY,
                ProviderParams::new().with("Computer", host),
            )?;
        }
        if self.core.option_enabled("plot_events") && !events.is_empty() {
            result.set("plot", events_per_hour(&events));
        }
        if self.core.option_enabled("all_events") {
            result.set("all_events", table(events));
        }
        if self.core.option_enabled("get_metadata") {
            result.set(
                "additional_info",
                json!({
                    "host": host,
                    "options": self.core.options(),
                    "timespan": self.core.timespan().to_string(),
                }),
            );
        }
        Ok(result)
    }
}

/// `TimeGenerated` truncated to the hour -> count
fn events_per_hour(events: &[Record]) -> Value {
    let mut buckets: IndexMap<String, u64> = IndexMap::new();
    for event in events {
        let hour = event
            .get("TimeGenerated")
            .and_then(Value::as_str)
            .and_then(|ts| ts.get(..13))
            .unwrap_or("unknown");
        *buckets.entry(hour.to_string()).or_default() += 1;
    }
    buckets.sort_keys();
    Value::Array(
        buckets
            .into_iter()
            .map(|(hour, count)| json!({"Hour": hour, "Count": count}))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::metadata::NbMetadata;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_events_per_hour() {
        let events = vec![
            record(json!({"TimeGenerated": "2024-01-01T11:05:00Z"})),
            record(json!({"TimeGenerated": "2024-01-01T10:59:00Z"})),
            record(json!({"TimeGenerated": "2024-01-01T10:01:00Z"})),
            record(json!({"EventID": 4624})),
        ];
        let plot = events_per_hour(&events);
        assert_eq!(plot[0], json!({"Hour": "2024-01-01T10", "Count": 2}));
        assert_eq!(plot[1], json!({"Hour": "2024-01-01T11", "Count": 1}));
        assert_eq!(plot[2], json!({"Hour": "unknown", "Count": 1}));
    }

    #[test]
    fn test_template_metadata() {
        let md: NbMetadata = crate::metadata::UnitDocument::parse(UNIT.definition)
            .unwrap()
            .metadata;
        assert_eq!(md.default_option_names(), ["all_events", "plot_events"]);
        assert_eq!(md.all_options().len(), 3);
    }

    #[test]
    fn test_missing_value() {
        let registry = Arc::new(
            ProviderRegistry::new(
                crate::providers::RegistryArgs::new("LocalData").providers(Vec::<String>::new()),
                Arc::new(crate::providers::ProviderCatalog::builtin()),
            )
            .unwrap(),
        );
        let info = Arc::new(
            UnitInfo::from_yaml("TemplateNB", "template", UNIT.definition, UNIT.attributes).unwrap(),
        );
        let mut nb = create(info, registry, &ProviderParams::new()).unwrap();
        let err = nb.run(RunArgs::new()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref p) if p == "value"));
        assert!(nb.result().is_none());
    }
}
