//! Notebooklet results and their attribute documentation.

use crate::error::{Error, Result};
use crate::timespan::TimeSpan;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

const TABLE_PREVIEW_ROWS: usize = 5;

/// Declared type and description of one result attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDoc {
    pub type_name: String,
    pub description: String,
}

impl AttributeDoc {
    pub fn new(type_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            description: description.into(),
        }
    }
}

/// Attribute name -> documentation, always including `timespan` and `notebooklet`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeDocs {
    entries: IndexMap<String, AttributeDoc>,
}

impl AttributeDocs {
    /// Build from a static `(name, type, description)` table
    pub fn from_schema(schema: &[(&str, &str, &str)]) -> Self {
        let entries = schema
            .iter()
            .map(|(name, type_name, text)| (name.to_string(), AttributeDoc::new(*type_name, *text)))
            .collect();
        Self { entries }.with_base_fields()
    }

    /// Build from the `Attributes` section of a class docstring.
    ///
    /// A missing or malformed docstring yields only the base fields.
    pub fn from_docstring(doc: Option<&str>) -> Self {
        let entries = doc.map(parse_attributes).unwrap_or_default();
        Self { entries }.with_base_fields()
    }

    fn with_base_fields(mut self) -> Self {
        self.entries.entry("timespan".to_string()).or_insert_with(|| {
            AttributeDoc::new("TimeSpan", "Time span for the queried results data.")
        });
        self.entries.entry("notebooklet".to_string()).or_insert_with(|| {
            AttributeDoc::new("Notebooklet", "The notebooklet instance that created this result.")
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDoc> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeDoc)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip the first-line/common indentation the way docstrings are written
fn clean_doc(doc: &str) -> Vec<String> {
    let lines: Vec<&str> = doc.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                line.trim().to_string()
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start()).trim_end().to_string()
            }
        })
        .collect()
}

fn parse_attributes(doc: &str) -> IndexMap<String, AttributeDoc> {
    let mut entries = IndexMap::new();
    let mut in_attribs = false;
    let mut current: Option<(String, String)> = None;
    let mut text: Vec<String> = Vec::new();

    let mut flush = |current: &mut Option<(String, String)>, text: &mut Vec<String>| {
        if let Some((name, type_name)) = current.take() {
            entries.insert(name, AttributeDoc::new(type_name, text.join(" ")));
        }
        text.clear();
    };

    let lines = clean_doc(doc);
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed == "Attributes" {
            in_attribs = true;
            continue;
        }
        if !in_attribs || trimmed.is_empty() || trimmed == "-".repeat("Attributes".len()) {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            text.push(trimmed.to_string());
            continue;
        }
        // a new underlined section ends the attribute list
        let underlined = lines
            .get(idx + 1)
            .map(|next| next.trim().len() > 1 && next.trim().chars().all(|c| c == '-'))
            .unwrap_or(false);
        if underlined {
            break;
        }
        flush(&mut current, &mut text);
        current = Some(match trimmed.split_once(':') {
            Some((name, type_name)) => (name.trim().to_string(), type_name.trim().to_string()),
            None => (trimmed.to_string(), "object".to_string()),
        });
    }
    flush(&mut current, &mut text);
    entries
}

/// A table is an array of JSON objects
pub fn is_table(value: &Value) -> bool {
    matches!(value, Value::Array(rows) if rows.iter().all(Value::is_object))
}

/// Output of one notebooklet run.
///
/// Attribute docs are fixed at construction; data fields are filled in
/// afterwards by the notebooklet.
#[derive(Debug, Clone, Serialize)]
pub struct NotebookletResult {
    pub description: String,
    pub timespan: Option<TimeSpan>,
    /// Dotted path or name of the originating notebooklet
    pub notebooklet: Option<String>,
    #[serde(skip)]
    attribute_docs: AttributeDocs,
    data: IndexMap<String, Value>,
}

impl NotebookletResult {
    pub fn new(description: impl Into<String>, docs: AttributeDocs) -> Self {
        Self {
            description: description.into(),
            timespan: None,
            notebooklet: None,
            attribute_docs: docs,
            data: IndexMap::new(),
        }
    }

    pub fn with_timespan(mut self, timespan: TimeSpan) -> Self {
        self.timespan = Some(timespan);
        self
    }

    pub fn with_notebooklet(mut self, name: impl Into<String>) -> Self {
        self.notebooklet = Some(name.into());
        self
    }

    pub fn attribute_docs(&self) -> &AttributeDocs {
        &self.attribute_docs
    }

    /// Set a data attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Names of all populated attributes
    pub fn properties(&self) -> Vec<String> {
        let mut names = vec!["description".to_string()];
        if self.timespan.is_some() {
            names.push("timespan".to_string());
        }
        if self.notebooklet.is_some() {
            names.push("notebooklet".to_string());
        }
        names.extend(
            self.data
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, _)| name.clone()),
        );
        names
    }

    /// Documentation for a declared attribute
    pub fn prop_doc(&self, name: &str) -> Result<&AttributeDoc> {
        self.attribute_docs
            .get(name)
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))
    }

    /// Attributes holding tables; empty tables only when `empty` is set
    pub fn data_properties(&self, empty: bool) -> Vec<String> {
        self.data
            .iter()
            .filter(|(_, value)| is_table(value))
            .filter(|(_, value)| empty || value.as_array().map_or(false, |rows| !rows.is_empty()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Markdown rendering: one heading per populated attribute
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for name in self.properties() {
            out.push_str(&format!("### {}\n\n", name));
            if let Some(doc) = self.attribute_docs.get(&name) {
                if !doc.description.is_empty() {
                    out.push_str(&doc.description);
                    out.push(' ');
                }
                out.push_str(&format!("Type: [{}]\n\n", doc.type_name));
            }
            out.push_str(&self.markdown_value(&name));
            out.push_str("\n\n---\n\n");
        }
        out
    }

    fn markdown_value(&self, name: &str) -> String {
        match name {
            "description" => self.description.clone(),
            "timespan" => self.timespan.map(|ts| ts.to_string()).unwrap_or_default(),
            "notebooklet" => self.notebooklet.clone().unwrap_or_default(),
            _ => match self.data.get(name) {
                Some(value) if is_table(value) => markdown_table(value),
                Some(Value::String(text)) => text.clone(),
                Some(value) => value.to_string(),
                None => String::new(),
            },
        }
    }
}

fn markdown_table(value: &Value) -> String {
    let rows = match value.as_array() {
        Some(rows) if !rows.is_empty() => rows,
        _ => return "(empty table)".to_string(),
    };
    let mut columns: Vec<String> = Vec::new();
    for row in rows.iter().take(TABLE_PREVIEW_ROWS).filter_map(Value::as_object) {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut lines = vec![
        format!("| {} |", columns.join(" | ")),
        format!("|{}", " --- |".repeat(columns.len())),
    ];
    for row in rows.iter().take(TABLE_PREVIEW_ROWS).filter_map(Value::as_object) {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| match row.get(col) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    if rows.len() > TABLE_PREVIEW_ROWS {
        lines.push(format!(
            "\n(showing top {} of {} rows)",
            TABLE_PREVIEW_ROWS,
            rows.len()
        ));
    }
    lines.join("\n")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Array(rows) if is_table(value) => format!("Table: {} rows", rows.len()),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for NotebookletResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "description: {}", self.description)?;
        if let Some(ts) = &self.timespan {
            write!(f, "\ntimespan: {}", ts)?;
        }
        if let Some(nb) = &self.notebooklet {
            write!(f, "\nnotebooklet: {}", nb)?;
        }
        for (name, value) in self.data.iter().filter(|(_, v)| !v.is_null()) {
            write!(f, "\n{}: {}", name, display_value(value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = "Host Details Results.

    Attributes
    ----------
    host_entity : msticpy.datamodel.entities.Host
        The host entity object contains data about the host
        such as name, environment, operating system version,
        IP addresses and Azure VM details.
    related_alerts : pd.DataFrame
        Pandas DataFrame of any alerts recorded for the host
        within the query time span.
    summary
        Free text summary.

    ";

    #[test]
    fn test_parse_attributes_section() {
        let docs = AttributeDocs::from_docstring(Some(DOC));
        let host = docs.get("host_entity").unwrap();
        assert_eq!(host.type_name, "msticpy.datamodel.entities.Host");
        assert!(host.description.starts_with("The host entity object contains data"));
        assert!(host.description.contains("version, IP addresses"));

        let alerts = docs.get("related_alerts").unwrap();
        assert_eq!(alerts.type_name, "pd.DataFrame");
        assert_eq!(
            alerts.description,
            "Pandas DataFrame of any alerts recorded for the host within the query time span."
        );
        assert_eq!(docs.get("summary").unwrap().type_name, "object");
    }

    #[test]
    fn test_single_attribute() {
        let doc = "Result.\n\n    Attributes\n    ----------\n    foo : DataFrame\n        Foo data.\n";
        let docs = AttributeDocs::from_docstring(Some(doc));
        assert_eq!(docs.get("foo"), Some(&AttributeDoc::new("DataFrame", "Foo data.")));
    }

    #[test]
    fn test_base_fields_always_present() {
        for docs in [
            AttributeDocs::from_docstring(None),
            AttributeDocs::from_docstring(Some("no attributes here")),
            AttributeDocs::from_docstring(Some("Attributes\n----------\n  dangling text")),
        ] {
            assert!(docs.contains("timespan"));
            assert!(docs.contains("notebooklet"));
        }
        assert_eq!(AttributeDocs::from_docstring(None).len(), 2);
    }

    #[test]
    fn test_declared_base_field_wins() {
        let docs = AttributeDocs::from_schema(&[("timespan", "Span", "custom")]);
        assert_eq!(docs.get("timespan").unwrap().description, "custom");
    }

    #[test]
    fn test_next_section_ends_attributes() {
        let doc = "Summary.\n\nAttributes\n----------\na : int\n    An int.\n\nMethods\n-------\nrun : fn\n";
        let docs = AttributeDocs::from_docstring(Some(doc));
        assert!(docs.contains("a"));
        assert!(!docs.contains("run"));
    }

    #[test]
    fn test_properties_and_prop_doc() {
        let mut result = NotebookletResult::new("Test", AttributeDocs::from_docstring(Some(DOC)))
            .with_notebooklet("azsent.host.HostSummary");
        result.set("related_alerts", json!([{"AlertName": "a"}]));
        result.set("summary", Value::Null);
        assert_eq!(
            result.properties(),
            vec!["description", "notebooklet", "related_alerts"]
        );
        assert_eq!(result.prop_doc("related_alerts").unwrap().type_name, "pd.DataFrame");
        assert!(matches!(
            result.prop_doc("missing"),
            Err(Error::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_data_properties() {
        let mut result = NotebookletResult::new("Test", AttributeDocs::default());
        result.set("full", json!([{"a": 1}]));
        result.set("empty", json!([]));
        result.set("scalar", json!(3));
        assert_eq!(result.data_properties(false), vec!["full"]);
        assert_eq!(result.data_properties(true), vec!["full", "empty"]);
    }

    #[test]
    fn test_display_summarises_tables() {
        let mut result = NotebookletResult::new("Test", AttributeDocs::default());
        result.set("rows", json!([{"a": 1}, {"a": 2}]));
        result.set("note", "hello");
        let text = result.to_string();
        assert!(text.contains("rows: Table: 2 rows"));
        assert!(text.contains("note: hello"));
    }

    #[test]
    fn test_markdown_preview_limits_rows() {
        let rows: Vec<Value> = (0..8).map(|i| json!({"n": i})).collect();
        let mut result =
            NotebookletResult::new("Test", AttributeDocs::from_schema(&[("rows", "Table", "Rows.")]));
        result.set("rows", Value::Array(rows));
        let md = result.to_markdown();
        assert!(md.contains("### rows"));
        assert!(md.contains("Rows. Type: [Table]"));
        assert!(md.contains("| 4 |"));
        assert!(!md.contains("| 5 |"));
        assert!(md.contains("(showing top 5 of 8 rows)"));
    }
}
