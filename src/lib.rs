//! Notebooklets - packaged security investigation units
//!
//! A small runtime for parameterized analysis units: discovery into a
//! class tree and dotted-path index, a provider registry with dependency
//! checking, option resolution per run and self-describing results.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod nb;
pub mod notebooklet;
pub mod options;
pub mod pivot;
pub mod providers;
pub mod result;
pub mod settings;
pub mod timespan;

// Re-export main types
pub use config::Config;
pub use discovery::{build_registry, discover_modules, nblts, UnitClass, UnitRegistry};
pub use error::{Error, Result};
pub use metadata::{NbMetadata, OptionSet};
pub use notebooklet::{Notebooklet, NotebookletCore, RunArgs, UnitInfo};
pub use pivot::PivotTable;
pub use providers::{ProviderCatalog, ProviderParams, ProviderRegistry, RegistryArgs};
pub use result::{AttributeDocs, NotebookletResult};
pub use timespan::TimeSpan;
