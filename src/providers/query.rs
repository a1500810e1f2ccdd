// Query-capable providers
//
// A QueryProvider wraps a QueryBackend. The LocalData backend serves
// query results from JSON files on disk; remote environments hold their
// connection string and need a real backend plugged in through the
// provider catalog before queries can execute.

use crate::error::{Error, Result};
use crate::providers::provider::{Provider, ProviderKind, ProviderParams};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// One row of query output
pub type Record = Map<String, Value>;

/// Executes named queries for a [`QueryProvider`]
pub trait QueryBackend: Send + Sync + fmt::Debug {
    /// Parameter names the backend accepts when connecting
    fn connect_params(&self) -> &[&'static str];

    fn connect(&self, args: &ProviderParams) -> Result<()>;

    /// Run `query` with `params` used as record filters or bind values
    fn exec_query(&self, query: &str, params: &ProviderParams) -> Result<Vec<Record>>;
}

/// Query provider handle
#[derive(Debug)]
pub struct QueryProvider {
    name: String,
    connected: AtomicBool,
    backend: Box<dyn QueryBackend>,
}

impl QueryProvider {
    pub fn new(name: impl Into<String>, backend: Box<dyn QueryBackend>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(false),
            backend,
        }
    }

    /// Run a named query
    pub fn exec_query(&self, query: &str, params: &ProviderParams) -> Result<Vec<Record>> {
        if !self.connected() {
            return Err(Error::query(format!(
                "{} is not connected; cannot run {}",
                self.name, query
            )));
        }
        debug!(provider = %self.name, query, "executing query");
        self.backend.exec_query(query, params)
    }
}

impl Provider for QueryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Query
    }

    fn connect_params(&self) -> &[&'static str] {
        self.backend.connect_params()
    }

    fn connect(&self, args: &ProviderParams) -> Result<()> {
        self.backend.connect(args)?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn as_query(&self) -> Option<&QueryProvider> {
        Some(self)
    }
}

/// Serves queries from `<data_path>/<query>.json` files
#[derive(Debug, Default)]
pub struct LocalDataBackend {
    data_paths: RwLock<Vec<PathBuf>>,
}

impl LocalDataBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn paths(&self) -> Vec<PathBuf> {
        match self.data_paths.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn find_file(&self, query: &str) -> Option<PathBuf> {
        self.paths()
            .into_iter()
            .map(|dir| dir.join(format!("{}.json", query)))
            .find(|path| path.is_file())
    }
}

impl QueryBackend for LocalDataBackend {
    fn connect_params(&self) -> &[&'static str] {
        &["data_paths"]
    }

    fn connect(&self, args: &ProviderParams) -> Result<()> {
        let paths: Vec<PathBuf> = args
            .get_str_list("data_paths")
            .into_iter()
            .map(PathBuf::from)
            .collect();
        for path in &paths {
            if !path.is_dir() {
                return Err(Error::PathNotFound(path.clone()));
            }
        }
        match self.data_paths.write() {
            Ok(mut guard) => *guard = paths,
            Err(poisoned) => *poisoned.into_inner() = paths,
        }
        Ok(())
    }

    fn exec_query(&self, query: &str, params: &ProviderParams) -> Result<Vec<Record>> {
        let Some(path) = self.find_file(query) else {
            debug!(query, "no local data file for query");
            return Ok(Vec::new());
        };
        let contents = std::fs::read_to_string(&path)?;
        let rows: Vec<Record> = serde_json::from_str(&contents)?;
        Ok(rows
            .into_iter()
            .filter(|row| record_matches(row, params))
            .collect())
    }
}

/// A record matches when every parameter naming one of its fields has an
/// equal value (strings compared case-insensitively).
fn record_matches(row: &Record, params: &ProviderParams) -> bool {
    params.iter().all(|(key, wanted)| match row.get(key) {
        None => true,
        Some(Value::String(have)) => match wanted.as_str() {
            Some(wanted) => have.eq_ignore_ascii_case(wanted),
            None => false,
        },
        Some(have) => have == wanted,
    })
}

/// Remote environment without a bundled driver.
///
/// Connecting records the connection string; executing reports that no
/// driver is installed for the environment.
#[derive(Debug)]
pub struct RemoteBackend {
    environment: String,
    connection_str: RwLock<Option<String>>,
}

impl RemoteBackend {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            connection_str: RwLock::new(None),
        }
    }

    pub fn connection_str(&self) -> Option<String> {
        match self.connection_str.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl QueryBackend for RemoteBackend {
    fn connect_params(&self) -> &[&'static str] {
        &["connection_str"]
    }

    fn connect(&self, args: &ProviderParams) -> Result<()> {
        let conn = args.get_str("connection_str").ok_or_else(|| {
            Error::missing_parameter(format!("{} connection_str", self.environment))
        })?;
        match self.connection_str.write() {
            Ok(mut guard) => *guard = Some(conn.to_string()),
            Err(poisoned) => *poisoned.into_inner() = Some(conn.to_string()),
        }
        Ok(())
    }

    fn exec_query(&self, query: &str, _params: &ProviderParams) -> Result<Vec<Record>> {
        Err(Error::query(format!(
            "no query driver installed for {} (query {})",
            self.environment, query
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn local_data() -> (TempDir, QueryProvider) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("SecurityAlert.list_alerts.json"),
            r#"[{"Computer": "host1", "AlertName": "a"},
                {"Computer": "HOST2", "AlertName": "b"}]"#,
        )
        .unwrap();
        let provider = QueryProvider::new("LocalData", Box::new(LocalDataBackend::new()));
        (dir, provider)
    }

    #[test]
    fn test_local_data_requires_connect() {
        let (_dir, provider) = local_data();
        let result = provider.exec_query("SecurityAlert.list_alerts", &ProviderParams::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_local_data_query_and_filter() {
        let (dir, provider) = local_data();
        let args = ProviderParams::new().with("data_paths", json!([dir.path().to_str().unwrap()]));
        provider.connect(&args).unwrap();
        assert!(provider.connected());

        let all = provider
            .exec_query("SecurityAlert.list_alerts", &ProviderParams::new())
            .unwrap();
        assert_eq!(all.len(), 2);

        let filtered = provider
            .exec_query(
                "SecurityAlert.list_alerts",
                &ProviderParams::new().with("Computer", "host2"),
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["AlertName"], json!("b"));
    }

    #[test]
    fn test_local_data_missing_query_is_empty() {
        let (dir, provider) = local_data();
        provider
            .connect(&ProviderParams::new().with("data_paths", dir.path().to_str().unwrap()))
            .unwrap();
        let rows = provider.exec_query("Nope.query", &ProviderParams::new()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_local_data_bad_path() {
        let provider = QueryProvider::new("LocalData", Box::new(LocalDataBackend::new()));
        let args = ProviderParams::new().with("data_paths", "/nonexistent/data");
        assert!(provider.connect(&args).is_err());
        assert!(!provider.connected());
    }

    #[test]
    fn test_remote_backend_needs_connection_str() {
        let provider = QueryProvider::new("Splunk", Box::new(RemoteBackend::new("Splunk")));
        assert!(provider.connect(&ProviderParams::new()).is_err());
        provider
            .connect(&ProviderParams::new().with("connection_str", "splunk://x"))
            .unwrap();
        let err = provider
            .exec_query("q", &ProviderParams::new())
            .unwrap_err();
        assert!(err.to_string().contains("no query driver"));
    }
}
