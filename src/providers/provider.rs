// Provider handle abstraction and provider-scoped parameters

use crate::error::Result;
use crate::providers::lookup::Lookup;
use crate::providers::query::QueryProvider;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a constructed provider
pub type ProviderHandle = Arc<dyn Provider>;

/// Broad capability of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Query backend that needs an explicit connect step
    Query,
    /// Enrichment source constructed directly
    Enrichment,
}

/// A named handle to an external data or enrichment source
pub trait Provider: Send + Sync + fmt::Debug {
    /// Name the provider was constructed under
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Parameter names accepted by [`Provider::connect`]
    fn connect_params(&self) -> &[&'static str] {
        &[]
    }

    fn connect(&self, _args: &ProviderParams) -> Result<()> {
        Ok(())
    }

    fn connected(&self) -> bool {
        true
    }

    fn as_query(&self) -> Option<&QueryProvider> {
        None
    }

    fn as_lookup(&self) -> Option<&dyn Lookup> {
        None
    }
}

/// Free-form named parameters.
///
/// Keys follow the `ProviderName_paramName` convention when they are meant
/// for a single provider; [`ProviderParams::scoped`] strips the prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderParams {
    values: IndexMap<String, Value>,
}

impl ProviderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// String value of a parameter, if it is a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// A parameter holding either one string or a list of strings
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Parameters addressed to `provider`, with the `provider_` prefix removed.
    ///
    /// Prefix matching ignores case.
    pub fn scoped(&self, provider: &str) -> ProviderParams {
        let prefix = format!("{}_", provider.to_lowercase());
        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                let head = key.get(..prefix.len())?;
                let rest = key.get(prefix.len()..)?;
                head.eq_ignore_ascii_case(&prefix)
                    .then(|| (rest.to_string(), value.clone()))
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();
        ProviderParams { values }
    }

    /// Keep only the parameters whose names appear in `accepted`
    pub fn filtered(&self, accepted: &[&str]) -> ProviderParams {
        let values = self
            .values
            .iter()
            .filter(|(key, _)| accepted.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        ProviderParams { values }
    }

    /// Merge `other` over these parameters
    pub fn merged(&self, other: &ProviderParams) -> ProviderParams {
        let mut values = self.values.clone();
        for (key, value) in &other.values {
            values.insert(key.clone(), value.clone());
        }
        ProviderParams { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ProviderParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        ProviderParams {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
