//! Notebooklet base: class information, run arguments and per-instance run state.

use crate::error::{Error, Result};
use crate::metadata::{NbMetadata, OutputSection, QuerySpec, UnitDocument};
use crate::options::resolve_options;
use crate::providers::{hub, ProviderHandle, ProviderParams, ProviderRegistry, Record};
use crate::result::{AttributeDocs, NotebookletResult};
use crate::settings;
use crate::timespan::TimeSpan;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::RegexBuilder;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Static description of a notebooklet class
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub class_name: String,
    pub metadata: NbMetadata,
    pub output: IndexMap<String, OutputSection>,
    /// Queries for declarative units
    pub queries: IndexMap<String, QuerySpec>,
    /// Class documentation
    pub doc: String,
    /// Documentation of the attributes on this class's results
    pub attribute_docs: AttributeDocs,
    /// Definition file, for units loaded from disk
    pub source: Option<PathBuf>,
}

impl UnitInfo {
    /// Build from a parsed definition; `class_name` is used when the document names none
    pub fn from_document(class_name: &str, document: UnitDocument) -> Self {
        let class_name = document.class.clone().unwrap_or_else(|| class_name.to_string());
        let attribute_docs = AttributeDocs::from_docstring(document.doc.as_deref());
        Self {
            class_name,
            metadata: document.metadata,
            output: document.output,
            queries: document.queries,
            doc: document.doc.unwrap_or_default(),
            attribute_docs,
            source: None,
        }
    }

    /// Build from YAML definition text with a static result schema
    pub fn from_yaml(
        class_name: &str,
        mod_name: &str,
        yaml: &str,
        schema: &[(&str, &str, &str)],
    ) -> Result<Self> {
        let mut document = UnitDocument::parse(yaml)?;
        if document.metadata.mod_name.is_empty() {
            document.metadata.mod_name = mod_name.to_string();
        }
        let mut info = Self::from_document(class_name, document);
        info.attribute_docs = AttributeDocs::from_schema(schema);
        Ok(info)
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    pub fn default_options(&self) -> Vec<String> {
        self.metadata.default_option_names()
    }

    pub fn all_options(&self) -> Vec<String> {
        self.metadata.all_options()
    }

    pub fn list_options(&self) -> String {
        self.metadata.options_doc()
    }

    pub fn keywords(&self) -> &[String] {
        &self.metadata.keywords
    }

    pub fn entity_types(&self) -> &[String] {
        &self.metadata.entity_types
    }

    /// All metadata fields, one per line
    pub fn get_settings(&self) -> String {
        self.metadata.to_string()
    }

    /// Search the class metadata and documentation.
    ///
    /// `search_terms` is split on commas and whitespace; each term is a
    /// case-insensitive regular expression (or a literal if it does not
    /// compile). Returns whether every term matched and how many did.
    pub fn match_terms(&self, search_terms: &str) -> (bool, usize) {
        let terms: Vec<&str> = search_terms
            .split(',')
            .flat_map(str::split_whitespace)
            .collect();
        let search_text = format!(
            "{} {} {}",
            self.metadata
                .search_terms()
                .into_iter()
                .collect::<Vec<_>>()
                .join(" "),
            self.metadata.description,
            self.doc
        );
        let matched = terms
            .iter()
            .filter(|term| term_matches(term, &search_text))
            .count();
        (matched == terms.len(), matched)
    }

    /// Markdown help text: description, class doc, options and output sections
    pub fn get_help(&self) -> String {
        let mut help = format!("# {}\n\n{}\n", self.class_name, self.metadata.description);
        if !self.doc.trim().is_empty() {
            help.push('\n');
            help.push_str(self.doc.trim());
            help.push('\n');
        }
        help.push_str(&self.list_options());
        let sections: Vec<_> = self
            .output
            .values()
            .filter_map(|section| section.title.as_ref().map(|t| (t, section)))
            .collect();
        if !sections.is_empty() {
            help.push_str("## Output\n\n");
            for (title, section) in sections {
                help.push_str(&format!("### {}\n\n", title));
                if let Some(text) = &section.text {
                    help.push_str(text.trim());
                    help.push_str("\n\n");
                }
            }
        }
        help
    }
}

fn term_matches(term: &str, text: &str) -> bool {
    let regex = RegexBuilder::new(term)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
        });
    match regex {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// Arguments for one run
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub value: Option<Value>,
    pub data: Option<Vec<Record>>,
    pub timespan: Option<TimeSpan>,
    /// `None` selects the default options
    pub options: Option<Vec<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub silent: Option<bool>,
    pub extra: IndexMap<String, Value>,
}

impl RunArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn data(mut self, data: Vec<Record>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn timespan(mut self, timespan: TimeSpan) -> Self {
        self.timespan = Some(timespan);
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The `value` argument as a string, or a MissingParameter error
    pub fn require_value(&self) -> Result<&str> {
        match &self.value {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
            _ => Err(Error::missing_parameter("value")),
        }
    }
}

/// Per-instance notebooklet state shared by every implementation
#[derive(Debug)]
pub struct NotebookletCore {
    info: Arc<UnitInfo>,
    providers: Arc<ProviderRegistry>,
    options: Vec<String>,
    timespan: TimeSpan,
    last_result: Option<NotebookletResult>,
    inst_silent: Option<bool>,
    run_silent: Option<bool>,
}

impl NotebookletCore {
    /// Validate `info`'s required providers against `providers`.
    ///
    /// Missing providers that the catalog knows are added on the fly using
    /// `params`. Anything still missing afterwards is an error naming the
    /// class; unrecognized names are also reported as a warning.
    pub fn new(
        info: Arc<UnitInfo>,
        providers: Arc<ProviderRegistry>,
        params: &ProviderParams,
    ) -> Result<Self> {
        let required = &info.metadata.req_providers;
        let mut check = providers.has_required_providers(required);
        if !check.is_satisfied() {
            for missing in check.missing.iter().filter(|m| !check.unknown.contains(*m)) {
                add_first_available(&providers, missing, params);
            }
            check = providers.has_required_providers(required);
        }

        if !check.unknown.is_empty() {
            warn!(
                "Unknown provider(s) {} in req_providers list. Class {}",
                check.unknown.join(", "),
                info.class_name
            );
        }
        if !check.is_satisfied() {
            return Err(Error::provider_unavailable(
                &check.missing,
                Some(info.class_name.as_str()),
            ));
        }

        let options = info.default_options();
        let inst_silent = params.get("silent").and_then(Value::as_bool);
        let core = Self {
            info,
            providers,
            options,
            timespan: TimeSpan::default(),
            last_result: None,
            inst_silent,
            run_silent: None,
        };
        settings::set_temp_silent(core.silent());
        Ok(core)
    }

    /// Construct against the process-wide current registry
    pub fn with_current(info: Arc<UnitInfo>, params: &ProviderParams) -> Result<Self> {
        let providers = hub::current().ok_or_else(|| {
            Error::other("No current provider registry was found. Please initialize providers first.")
        })?;
        Self::new(info, providers, params)
    }

    pub fn info(&self) -> &UnitInfo {
        &self.info
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn query_provider(&self) -> Option<ProviderHandle> {
        self.providers.query_provider()
    }

    /// Registered provider by name
    pub fn get_provider(&self, name: &str) -> Result<ProviderHandle> {
        self.providers.get_provider(name)
    }

    /// Options active for the current or most recent run
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn option_enabled(&self, name: &str) -> bool {
        self.options.iter().any(|opt| opt == name)
    }

    pub fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    pub fn set_timespan(&mut self, timespan: TimeSpan) {
        self.timespan = timespan;
    }

    /// Per-run setting if given, otherwise the instance default
    pub fn silent(&self) -> Option<bool> {
        self.run_silent.or(self.inst_silent)
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.inst_silent = Some(silent);
    }

    /// Result of the most recent successful run
    pub fn result(&self) -> Option<&NotebookletResult> {
        self.last_result.as_ref()
    }

    /// Resolve options, timespan and silent mode for a run
    pub fn configure(&mut self, args: &RunArgs) -> Result<()> {
        self.run_silent = args.silent;
        settings::set_temp_silent(self.silent());

        let resolved = resolve_options(
            &self.info.default_options(),
            &self.info.all_options(),
            args.options.as_deref(),
        )?;
        self.options = resolved.active;

        if let Some(timespan) = args.timespan {
            self.timespan = timespan;
        } else if let (Some(start), Some(end)) = (args.start, args.end) {
            self.timespan = TimeSpan::new(start, end)?;
        }
        debug!(
            "{} configured with options {:?}, timespan {}",
            self.info.class_name, self.options, self.timespan
        );
        Ok(())
    }

    /// Empty result bound to this notebooklet and its timespan
    pub fn new_result(&self) -> NotebookletResult {
        let description = if self.info.metadata.description.is_empty() {
            self.info.class_name.clone()
        } else {
            self.info.metadata.description.clone()
        };
        NotebookletResult::new(description, self.info.attribute_docs.clone())
            .with_timespan(self.timespan)
            .with_notebooklet(self.info.class_name.clone())
    }

    pub fn store_result(&mut self, result: NotebookletResult) -> &NotebookletResult {
        self.last_result.insert(result)
    }
}

fn add_first_available(providers: &ProviderRegistry, requirement: &str, params: &ProviderParams) {
    for member in requirement.split('|').map(str::trim).filter(|m| !m.is_empty()) {
        if !providers.catalog().is_known(member) {
            continue;
        }
        match providers.add_provider(member, params) {
            Ok(()) => {
                debug!("Added required provider {}", member);
                return;
            }
            Err(e) => debug!("Could not add provider {}: {}", member, e),
        }
    }
}

/// An analysis unit.
///
/// Implementations hold a [`NotebookletCore`] and supply [`Notebooklet::execute`];
/// [`Notebooklet::run`] resolves options first and keeps the previous result
/// if execution fails.
pub trait Notebooklet: Send {
    fn core(&self) -> &NotebookletCore;

    fn core_mut(&mut self) -> &mut NotebookletCore;

    /// Analysis logic for one run, called after the core is configured
    fn execute(&mut self, args: &RunArgs) -> Result<NotebookletResult>;

    fn run(&mut self, args: RunArgs) -> Result<NotebookletResult> {
        self.core_mut().configure(&args)?;
        let result = self.execute(&args)?;
        Ok(self.core_mut().store_result(result).clone())
    }

    fn result(&self) -> Option<&NotebookletResult> {
        self.core().result()
    }

    fn get_provider(&self, name: &str) -> Result<ProviderHandle> {
        self.core().get_provider(name)
    }

    fn info(&self) -> &UnitInfo {
        self.core().info()
    }

    fn options(&self) -> &[String] {
        self.core().options()
    }

    fn timespan(&self) -> &TimeSpan {
        self.core().timespan()
    }
}
