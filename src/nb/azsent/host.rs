//! Host summary notebooklet.

use crate::error::{Error, Result};
use crate::nb::{first_lookup, lookup_value, query_rows, table, BuiltinUnit};
use crate::notebooklet::{Notebooklet, NotebookletCore, RunArgs, UnitInfo};
use crate::providers::{ProviderParams, ProviderRegistry, Record};
use crate::result::NotebookletResult;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const UNIT: BuiltinUnit = BuiltinUnit {
    folder: "azsent.host",
    class_name: "HostSummary",
    definition: include_str!("host_summary.yaml"),
    doc: "HostSummary Notebooklet class.\n\nQueries and displays information about a host including:\n\n- IP address assignment\n- Related alerts\n- Related hunting/investigation bookmarks\n- Azure subscription/resource data.\n",
    attributes: &[
        (
            "host_entity",
            "Host",
            "The host entity object contains data about the host such as name, environment, \
             operating system version, IP addresses and Azure VM details. Depending on the \
             type of host, not all of this data may be populated.",
        ),
        (
            "related_alerts",
            "Table",
            "Any alerts recorded for the host within the query time span.",
        ),
        (
            "related_bookmarks",
            "Table",
            "Any investigation bookmarks relating to the host.",
        ),
        ("summary", "Table", "Row counts for each type of data retrieved."),
        ("scheduled_tasks", "Table", "Scheduled tasks and services created on the host."),
        ("account_actions", "Table", "Account creation and modification events."),
        ("notable_events", "Table", "Other notable events from the host."),
        ("processes", "Table", "Process creation events from the host."),
        ("process_ti", "Table", "Threat intelligence hits for process command lines."),
    ],
    factory: create,
};

/// Operating system family reported by the heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OsFamily {
    Windows,
    Linux,
}

impl OsFamily {
    fn from_heartbeat(os_type: Option<&str>) -> Self {
        match os_type {
            Some(os) if os.eq_ignore_ascii_case("linux") => OsFamily::Linux,
            _ => OsFamily::Windows,
        }
    }

    fn name(self) -> &'static str {
        match self {
            OsFamily::Windows => "Windows",
            OsFamily::Linux => "Linux",
        }
    }

    /// Query for an event category on this OS
    fn query(self, category: &str) -> String {
        let table = match self {
            OsFamily::Windows => "WindowsSecurity",
            OsFamily::Linux => "LinuxSyslog",
        };
        format!("{}.{}", table, category)
    }

    /// Field holding the process command line
    fn command_line_field(self) -> &'static str {
        match self {
            OsFamily::Windows => "CommandLine",
            OsFamily::Linux => "SyslogMessage",
        }
    }
}

pub struct HostSummary {
    core: NotebookletCore,
}

fn create(
    info: Arc<UnitInfo>,
    providers: Arc<ProviderRegistry>,
    params: &ProviderParams,
) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(HostSummary {
        core: NotebookletCore::new(info, providers, params)?,
    }))
}

impl HostSummary {
    fn host_query(&self, query: &str, host: &str) -> Result<Vec<Record>> {
        query_rows(&self.core, query, ProviderParams::new().with("Computer", host))
    }

    fn host_entity(&self, host: &str) -> Result<(Map<String, Value>, OsFamily)> {
        let mut entity = Map::new();
        entity.insert("HostName".to_string(), Value::from(host));

        if self.core.option_enabled("heartbeat") {
            let rows = self.host_query("Heartbeat.get_info_by_hostname", host)?;
            if let Some(heartbeat) = rows.into_iter().next() {
                for (src, dest) in [
                    ("OSType", "OSType"),
                    ("OSName", "OSName"),
                    ("ComputerEnvironment", "Environment"),
                    ("ComputerIP", "IpAddress"),
                    ("ResourceId", "ResourceId"),
                    ("SubscriptionId", "SubscriptionId"),
                    ("ResourceGroup", "ResourceGroup"),
                ] {
                    if let Some(value) = heartbeat.get(src) {
                        entity.insert(dest.to_string(), value.clone());
                    }
                }
            } else {
                warn!("Could not find heartbeat records for host {}", host);
            }
        }

        if self.core.option_enabled("azure_net") {
            let rows = self.host_query("Network.get_ips_for_host", host)?;
            if !rows.is_empty() {
                entity.insert("AzureNetwork".to_string(), table(rows));
            }
        }

        let os = OsFamily::from_heartbeat(entity.get("OSType").and_then(Value::as_str));
        entity.insert("OSFamily".to_string(), Value::from(os.name()));

        let is_azure = entity.get("Environment").and_then(Value::as_str) == Some("Azure");
        if self.core.option_enabled("azure_api") && is_azure {
            match self.core.get_provider("azuredata") {
                Ok(azure) if azure.connected() => {
                    let details: Map<String, Value> = ["ResourceId", "SubscriptionId", "ResourceGroup"]
                        .iter()
                        .filter_map(|key| entity.get(*key).map(|v| (key.to_string(), v.clone())))
                        .collect();
                    entity.insert("AzureDetails".to_string(), Value::Object(details));
                }
                _ => debug!("azuredata provider not connected; skipping Azure API details"),
            }
        }
        Ok((entity, os))
    }
}

impl Notebooklet for HostSummary {
    fn core(&self) -> &NotebookletCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NotebookletCore {
        &mut self.core
    }

    fn execute(&mut self, args: &RunArgs) -> Result<NotebookletResult> {
        let host = args.require_value()?;
        let mut result = self.core.new_result();

        let (entity, os) = self.host_entity(host)?;
        result.set("host_entity", Value::Object(entity));

        if self.core.option_enabled("alerts") {
            let rows = self.host_query("SecurityAlert.list_related_alerts", host)?;
            result.set("related_alerts", table(rows));
        }
        if self.core.option_enabled("bookmarks") {
            let rows = self.host_query("AzureSentinel.list_bookmarks_for_entity", host)?;
            result.set("related_bookmarks", table(rows));
        }
        for (option, category) in [
            ("scheduled_tasks", "schdld_tasks_and_services"),
            ("account_actions", "account_change_events"),
            ("notable_events", "notable_events"),
        ] {
            if self.core.option_enabled(option) {
                let rows = self.host_query(&os.query(category), host)?;
                result.set(option, table(rows));
            }
        }

        let mut processes = Vec::new();
        if self.core.option_enabled("processes") {
            processes = self.host_query(&os.query("list_host_processes"), host)?;
        }
        if self.core.option_enabled("process_ti") && !processes.is_empty() {
            let ti = first_lookup(&self.core, &["tilookup"]).ok_or_else(|| {
                Error::provider_unavailable(["tilookup"], Some(self.core.info().class_name.as_str()))
            })?;
            let mut hits = Vec::new();
            for process in &processes {
                let Some(cmd) = process.get(os.command_line_field()).and_then(Value::as_str) else {
                    continue;
                };
                let found = lookup_value(&ti, cmd)?;
                if found.get("Result") == Some(&Value::Bool(true)) {
                    hits.push(found);
                }
            }
            result.set("process_ti", Value::Array(hits));
        }
        if self.core.option_enabled("processes") {
            result.set("processes", table(processes));
        }

        let summary: Vec<Value> = result
            .data_properties(true)
            .into_iter()
            .filter_map(|name| {
                let rows = result.get(&name)?.as_array()?.len();
                Some(json!({"DataType": name, "Rows": rows}))
            })
            .collect();
        result.set("summary", Value::Array(summary));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_family() {
        assert_eq!(OsFamily::from_heartbeat(Some("Linux")), OsFamily::Linux);
        assert_eq!(OsFamily::from_heartbeat(Some("Windows")), OsFamily::Windows);
        assert_eq!(OsFamily::from_heartbeat(None), OsFamily::Windows);
        assert_eq!(OsFamily::Linux.query("notable_events"), "LinuxSyslog.notable_events");
        assert_eq!(OsFamily::Linux.command_line_field(), "SyslogMessage");
    }

    #[test]
    fn test_match_terms() {
        let info = UnitInfo::from_yaml("HostSummary", "host", UNIT.definition, UNIT.attributes).unwrap();
        assert_eq!(info.match_terms("host, linux, azure"), (true, 3));
    }
}
