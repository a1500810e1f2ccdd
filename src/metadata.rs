//! Declarative notebooklet metadata and unit definition documents.

use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// An option entry: a bare name or a single `name: description` mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionSpec {
    Name(String),
    Described(IndexMap<String, String>),
}

impl OptionSpec {
    /// `(name, description)` pairs declared by this entry
    pub fn entries(&self) -> Vec<(String, Option<String>)> {
        match self {
            OptionSpec::Name(name) => vec![(name.clone(), None)],
            OptionSpec::Described(map) => map
                .iter()
                .map(|(name, text)| (name.clone(), Some(text.clone())))
                .collect(),
        }
    }
}

impl From<&str> for OptionSpec {
    fn from(name: &str) -> Self {
        OptionSpec::Name(name.to_string())
    }
}

impl From<(&str, &str)> for OptionSpec {
    fn from((name, text): (&str, &str)) -> Self {
        let mut map = IndexMap::new();
        map.insert(name.to_string(), text.to_string());
        OptionSpec::Described(map)
    }
}

/// Which declared options to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSet {
    All,
    Default,
    Other,
}

impl FromStr for OptionSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(OptionSet::All),
            "default" => Ok(OptionSet::Default),
            "other" => Ok(OptionSet::Other),
            _ => Err(Error::other(format!("unknown option set '{}'", s))),
        }
    }
}

/// Notebooklet metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NbMetadata {
    pub name: String,
    pub mod_name: String,
    pub description: String,
    pub default_options: Vec<OptionSpec>,
    pub other_options: Vec<OptionSpec>,
    pub inputs: Vec<String>,
    pub entity_types: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(alias = "required_providers")]
    pub req_providers: Vec<String>,
}

impl Default for NbMetadata {
    fn default() -> Self {
        Self {
            name: "Unnamed".to_string(),
            mod_name: String::new(),
            description: String::new(),
            default_options: Vec::new(),
            other_options: Vec::new(),
            inputs: vec!["value".to_string()],
            entity_types: Vec::new(),
            keywords: Vec::new(),
            req_providers: Vec::new(),
        }
    }
}

impl NbMetadata {
    /// Options and descriptions in the requested set, declaration order
    pub fn get_options(&self, set: OptionSet) -> Vec<(String, Option<String>)> {
        let mut seen = IndexSet::new();
        let sources: Vec<&Vec<OptionSpec>> = match set {
            OptionSet::All => vec![&self.default_options, &self.other_options],
            OptionSet::Default => vec![&self.default_options],
            OptionSet::Other => vec![&self.other_options],
        };
        sources
            .into_iter()
            .flatten()
            .flat_map(OptionSpec::entries)
            .filter(|(name, _)| seen.insert(name.clone()))
            .collect()
    }

    /// Union of default and other option names, without duplicates
    pub fn all_options(&self) -> Vec<String> {
        self.option_names(OptionSet::All)
    }

    pub fn default_option_names(&self) -> Vec<String> {
        self.option_names(OptionSet::Default)
    }

    fn option_names(&self, set: OptionSet) -> Vec<String> {
        self.get_options(set).into_iter().map(|(name, _)| name).collect()
    }

    /// Terms matched by keyword search, lowercased except the name
    pub fn search_terms(&self) -> IndexSet<String> {
        let mut terms = IndexSet::new();
        terms.insert(self.name.clone());
        terms.extend(self.entity_types.iter().map(|t| t.to_lowercase()));
        terms.extend(self.keywords.iter().map(|k| k.to_lowercase()));
        terms.extend(self.all_options().iter().map(|o| o.to_lowercase()));
        terms
    }

    /// Option documentation block
    pub fn options_doc(&self) -> String {
        let mut lines = vec![
            String::new(),
            "    Default Options".to_string(),
            "    ---------------".to_string(),
        ];
        push_option_lines(&mut lines, self.get_options(OptionSet::Default));
        lines.extend([
            String::new(),
            "    Other Options".to_string(),
            "    -------------".to_string(),
        ]);
        push_option_lines(&mut lines, self.get_options(OptionSet::Other));
        lines.extend([String::new(), String::new()]);
        lines.join("\n")
    }
}

fn push_option_lines(lines: &mut Vec<String>, options: Vec<(String, Option<String>)>) {
    if options.is_empty() {
        lines.push("    None".to_string());
        return;
    }
    for (name, text) in options {
        match text {
            Some(text) => lines.push(format!("    - {}: {}", name, text)),
            None => lines.push(format!("    - {}", name)),
        }
    }
}

impl fmt::Display for NbMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = |specs: &Vec<OptionSpec>| {
            specs
                .iter()
                .flat_map(OptionSpec::entries)
                .map(|(name, _)| name)
                .collect::<Vec<_>>()
        };
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "mod_name: {}", self.mod_name)?;
        writeln!(f, "description: {}", self.description)?;
        writeln!(f, "default_options: {:?}", opts(&self.default_options))?;
        writeln!(f, "other_options: {:?}", opts(&self.other_options))?;
        writeln!(f, "inputs: {:?}", self.inputs)?;
        writeln!(f, "entity_types: {:?}", self.entity_types)?;
        writeln!(f, "keywords: {:?}", self.keywords)?;
        write!(f, "req_providers: {:?}", self.req_providers)
    }
}

/// Display text for one output section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub title: Option<String>,
    pub text: Option<String>,
    pub hd_level: Option<u8>,
    pub md: Option<bool>,
}

/// A named query run by declarative notebooklets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpec {
    /// Query name passed to the query provider
    pub query: String,
    /// Only run when this option is active
    pub option: Option<String>,
    /// Field the run `value` is bound to
    pub param: Option<String>,
}

/// A notebooklet definition document (YAML)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitDocument {
    /// Class name the unit registers under
    pub class: Option<String>,
    /// Registered implementation that runs the unit
    pub implementation: Option<String>,
    /// Class documentation; may hold an `Attributes` section for the result
    pub doc: Option<String>,
    pub metadata: NbMetadata,
    pub output: IndexMap<String, OutputSection>,
    /// Result attribute -> query, for the declarative implementation
    pub queries: IndexMap<String, QuerySpec>,
}

impl UnitDocument {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a definition file, recording `mod_name` from the file stem
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut doc = Self::parse(&contents).map_err(|e| Error::unit_load(path, e.to_string()))?;
        if doc.metadata.mod_name.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                doc.metadata.mod_name = stem.to_string();
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_YAML: &str = r#"
metadata:
  name: HostSummary
  description: Host summary
  default_options:
    - heartbeat: Query Heartbeat table for host information.
    - alerts: Query any alerts for the host.
  other_options:
    - scheduled_tasks
    - azure_api: Query Azure API for VM information.
  keywords: [host, computer, heartbeat, windows, linux]
  entity_types: [Host]
  req_providers:
    - LogAnalytics|LocalData
output:
  run:
    title: Host Entity Summary
    hd_level: 1
    text: This shows a summary of data for a host.
"#;

    #[test]
    fn test_parse_document() {
        let doc = UnitDocument::parse(HOST_YAML).unwrap();
        assert_eq!(doc.metadata.name, "HostSummary");
        assert_eq!(doc.metadata.inputs, vec!["value"]);
        assert_eq!(doc.metadata.req_providers, vec!["LogAnalytics|LocalData"]);
        assert_eq!(doc.output["run"].hd_level, Some(1));
        assert!(doc.class.is_none());
        assert!(doc.queries.is_empty());
    }

    #[test]
    fn test_parse_queries() {
        let doc = UnitDocument::parse(
            "implementation: declarative\nqueries:\n  alerts:\n    query: SecurityAlert.list_alerts\n    option: alerts\n    param: Computer\n",
        )
        .unwrap();
        let spec = &doc.queries["alerts"];
        assert_eq!(spec.query, "SecurityAlert.list_alerts");
        assert_eq!(spec.option.as_deref(), Some("alerts"));
        assert_eq!(spec.param.as_deref(), Some("Computer"));
        assert_eq!(doc.implementation.as_deref(), Some("declarative"));
    }

    #[test]
    fn test_option_sets() {
        let md = UnitDocument::parse(HOST_YAML).unwrap().metadata;
        assert_eq!(md.default_option_names(), vec!["heartbeat", "alerts"]);
        assert_eq!(
            md.all_options(),
            vec!["heartbeat", "alerts", "scheduled_tasks", "azure_api"]
        );
        let other = md.get_options(OptionSet::Other);
        assert_eq!(other[0], ("scheduled_tasks".to_string(), None));
        assert_eq!(other[1].1.as_deref(), Some("Query Azure API for VM information."));
    }

    #[test]
    fn test_all_options_dedup() {
        let md = NbMetadata {
            default_options: vec!["a".into(), "b".into()],
            other_options: vec!["b".into(), ("c", "text").into()],
            ..NbMetadata::default()
        };
        assert_eq!(md.all_options(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_options_doc() {
        let md = UnitDocument::parse(HOST_YAML).unwrap().metadata;
        let doc = md.options_doc();
        assert!(doc.contains("Default Options"));
        assert!(doc.contains("    - alerts: Query any alerts for the host."));
        assert!(doc.contains("    - scheduled_tasks\n"));

        let empty = NbMetadata::default().options_doc();
        assert_eq!(empty.matches("    None").count(), 2);
    }

    #[test]
    fn test_search_terms() {
        let md = UnitDocument::parse(HOST_YAML).unwrap().metadata;
        let terms = md.search_terms();
        assert!(terms.contains("HostSummary"));
        assert!(terms.contains("host"));
        assert!(terms.contains("azure_api"));
    }

    #[test]
    fn test_display_lists_fields() {
        let md = UnitDocument::parse(HOST_YAML).unwrap().metadata;
        let text = md.to_string();
        for field in ["mod_name", "default_options", "keywords", "req_providers"] {
            assert!(text.contains(field));
        }
    }

    #[test]
    fn test_option_set_from_str() {
        assert_eq!("ALL".parse::<OptionSet>().unwrap(), OptionSet::All);
        assert!("some".parse::<OptionSet>().is_err());
    }

    #[test]
    fn test_bad_yaml_is_error() {
        assert!(UnitDocument::parse("metadata: [unclosed").is_err());
    }
}
