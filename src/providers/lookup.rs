// Enrichment providers

use crate::error::{Error, Result};
use crate::providers::provider::{Provider, ProviderKind, ProviderParams};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Value lookup offered by enrichment providers
pub trait Lookup: Send + Sync {
    fn lookup(&self, value: &str) -> Result<Value>;
}

/// Threat-intelligence lookup against a configured indicator list
#[derive(Debug)]
pub struct TiLookup {
    name: String,
    indicators: HashSet<String>,
}

impl TiLookup {
    /// Accepts an `indicators` parameter (string or list of strings)
    pub fn new(name: impl Into<String>, params: &ProviderParams) -> Self {
        let indicators = params
            .get_str_list("indicators")
            .into_iter()
            .map(|ioc| ioc.to_lowercase())
            .collect();
        Self {
            name: name.into(),
            indicators,
        }
    }
}

impl Provider for TiLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Enrichment
    }

    fn as_lookup(&self) -> Option<&dyn Lookup> {
        Some(self)
    }
}

impl Lookup for TiLookup {
    fn lookup(&self, value: &str) -> Result<Value> {
        let hit = self.indicators.contains(&value.to_lowercase());
        Ok(json!({
            "Ioc": value,
            "Result": hit,
            "Severity": if hit { "high" } else { "information" },
            "Provider": self.name,
        }))
    }
}

/// Offline IP classification
#[derive(Debug)]
pub struct GeoLiteLookup {
    name: String,
}

impl GeoLiteLookup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Provider for GeoLiteLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Enrichment
    }

    fn as_lookup(&self) -> Option<&dyn Lookup> {
        Some(self)
    }
}

impl Lookup for GeoLiteLookup {
    fn lookup(&self, value: &str) -> Result<Value> {
        let addr: IpAddr = value
            .trim()
            .parse()
            .map_err(|_| Error::query(format!("'{}' is not an IP address", value)))?;
        Ok(json!({
            "Address": addr.to_string(),
            "IpType": ip_type(&addr),
            "Version": if addr.is_ipv4() { 4 } else { 6 },
        }))
    }
}

/// Classify an address as Public, Private, Loopback, Multicast or Reserved
pub fn ip_type(addr: &IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                "Loopback"
            } else if v4.is_private() || v4.is_link_local() {
                "Private"
            } else if v4.is_multicast() {
                "Multicast"
            } else if v4.is_unspecified() || v4.is_broadcast() || v4.is_documentation() {
                "Reserved"
            } else {
                "Public"
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                "Loopback"
            } else if v6.is_multicast() {
                "Multicast"
            } else if v6.is_unspecified() {
                "Reserved"
            } else if (v6.segments()[0] & 0xfe00) == 0xfc00 || (v6.segments()[0] & 0xffc0) == 0xfe80 {
                "Private"
            } else {
                "Public"
            }
        }
    }
}

/// Remote geolocation service that needs an API key
#[derive(Debug)]
pub struct IpStackLookup {
    name: String,
    api_key: String,
}

impl IpStackLookup {
    pub fn new(name: impl Into<String>, params: &ProviderParams) -> Result<Self> {
        let api_key = params
            .get_str("api_key")
            .ok_or_else(|| Error::missing_parameter("ipstacklookup_api_key"))?;
        Ok(Self {
            name: name.into(),
            api_key: api_key.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl Provider for IpStackLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Enrichment
    }

    fn as_lookup(&self) -> Option<&dyn Lookup> {
        Some(self)
    }
}

impl Lookup for IpStackLookup {
    fn lookup(&self, value: &str) -> Result<Value> {
        Err(Error::query(format!(
            "{}: remote lookup of {} is not available offline",
            self.name, value
        )))
    }
}

/// Azure resource API handle; connects with a tenant
#[derive(Debug)]
pub struct AzureData {
    name: String,
    connected: AtomicBool,
}

impl AzureData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(false),
        }
    }
}

impl Provider for AzureData {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Enrichment
    }

    fn connect_params(&self) -> &[&'static str] {
        &["tenant_id", "auth_methods"]
    }

    fn connect(&self, args: &ProviderParams) -> Result<()> {
        if args.get_str("tenant_id").is_none() {
            return Err(Error::missing_parameter("azuredata_tenant_id"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
