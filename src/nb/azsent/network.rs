//! IP address summary notebooklet.

use crate::error::{Error, Result};
use crate::nb::{first_lookup, lookup_value, query_rows, table, BuiltinUnit};
use crate::notebooklet::{Notebooklet, NotebookletCore, RunArgs, UnitInfo};
use crate::providers::lookup::ip_type;
use crate::providers::{ProviderParams, ProviderRegistry, Record};
use crate::result::NotebookletResult;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

pub const UNIT: BuiltinUnit = BuiltinUnit {
    folder: "azsent.network",
    class_name: "IpSummary",
    definition: include_str!("ip_summary.yaml"),
    doc: "Notebooklet for IP Address Summary.\n\nQueries and displays summary information about an IP address, including:\n\n- Basic IP address properties\n- IpAddress entity (and Host entity, if a host could be associated)\n- WhoIs and Geo-location\n- Azure activity and network data (optional)\n- Office activity summary (optional)\n- Threat intelligence reports\n- Related alerts and hunting bookmarks\n",
    attributes: &[
        ("ip_str", "str", "The input IP address as a string."),
        ("ip_origin", "str", "\"External\" or \"Internal\""),
        ("ip_type", "str", "IP address type - \"Public\", \"Private\", etc."),
        ("host_entity", "Host", "Host entity associated with IP Address"),
        ("geoip", "dict", "Geo location information as a dictionary."),
        ("heartbeat", "Table", "Heartbeat record for IP Address or host"),
        ("az_network_if", "Table", "Azure Network analytics interface record, if available"),
        ("vmcomputer", "Table", "VMComputer latest record"),
        ("az_network_flows", "Table", "Azure Network analytics flows for IP, if available"),
        ("aad_signins", "Table", "AAD signin activity"),
        ("azure_activity", "Table", "Azure Activity log entries"),
        ("office_activity", "Table", "Office 365 activity"),
        ("related_alerts", "Table", "Alerts related to IP Address"),
        ("related_bookmarks", "Table", "Bookmarks related to IP Address"),
        ("ti_results", "Table", "Threat intel lookup results"),
    ],
    factory: create,
};

pub struct IpSummary {
    core: NotebookletCore,
}

fn create(
    info: Arc<UnitInfo>,
    providers: Arc<ProviderRegistry>,
    params: &ProviderParams,
) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(IpSummary {
        core: NotebookletCore::new(info, providers, params)?,
    }))
}

/// "External" for public addresses, "Internal" otherwise
fn ip_origin(addr: &IpAddr) -> &'static str {
    if ip_type(addr) == "Public" {
        "External"
    } else {
        "Internal"
    }
}

impl IpSummary {
    fn ip_query(&self, query: &str, field: &str, ip: &str) -> Result<Vec<Record>> {
        query_rows(&self.core, query, ProviderParams::new().with(field, ip))
    }
}

impl Notebooklet for IpSummary {
    fn core(&self) -> &NotebookletCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NotebookletCore {
        &mut self.core
    }

    fn execute(&mut self, args: &RunArgs) -> Result<NotebookletResult> {
        let ip_str = args.require_value()?.trim();
        let addr: IpAddr = ip_str
            .parse()
            .map_err(|_| Error::other(format!("{} is not a valid IP address", ip_str)))?;
        let origin = ip_origin(&addr);

        let mut result = self.core.new_result();
        result.set("ip_str", ip_str);
        result.set("ip_type", ip_type(&addr));
        result.set("ip_origin", origin);

        if self.core.option_enabled("geoip") {
            match first_lookup(&self.core, &["geolitelookup", "ipstacklookup"]) {
                Some(geo) => match lookup_value(&geo, ip_str) {
                    Ok(location) => result.set("geoip", location),
                    Err(e) => warn!("Geo lookup for {} failed: {}", ip_str, e),
                },
                None => warn!("No geo lookup provider available"),
            }
        }

        if self.core.option_enabled("heartbeat") {
            let rows = self.ip_query("Heartbeat.get_info_by_ipaddress", "ComputerIP", ip_str)?;
            if let Some(computer) = rows.first().and_then(|r| r.get("Computer")) {
                result.set(
                    "host_entity",
                    json!({
                        "HostName": computer,
                        "OSType": rows[0].get("OSType").cloned().unwrap_or(Value::Null),
                        "IpAddress": ip_str,
                    }),
                );
            }
            result.set("heartbeat", table(rows));
        }

        let queries = [
            ("az_net_if", "az_network_if", "Network.get_host_for_ip", "PrivateIPAddresses"),
            ("vmcomputer", "vmcomputer", "VMComputer.get_info_for_ipaddress", "Ipv4Addresses"),
            ("alerts", "related_alerts", "SecurityAlert.list_alerts_for_ip", "IpAddress"),
            ("bookmarks", "related_bookmarks", "AzureSentinel.list_bookmarks_for_entity", "IpAddress"),
            ("az_netflow", "az_network_flows", "Network.list_azure_network_flows_by_ip", "IpAddress"),
            ("az_activity", "azure_activity", "AzureActivity.list_azure_activity_for_ip", "CallerIpAddress"),
            ("az_activity", "aad_signins", "SigninLogs.list_aad_signins_for_ip", "IPAddress"),
            ("az_activity", "office_activity", "OfficeActivity.list_activity_for_ip", "ClientIP"),
        ];
        for (option, attribute, query, field) in queries {
            if self.core.option_enabled(option) {
                let rows = self.ip_query(query, field, ip_str)?;
                result.set(attribute, table(rows));
            }
        }

        if origin == "External" || self.core.option_enabled("ti") {
            match first_lookup(&self.core, &["tilookup"]) {
                Some(ti) => {
                    let found = lookup_value(&ti, ip_str)?;
                    result.set("ti_results", Value::Array(vec![found]));
                }
                None => warn!("No TI provider available for {}", ip_str),
            }
        }
        Ok(result)
    }
}
