//! Provider registry: shared handles to external data and enrichment sources.

pub mod catalog;
pub mod hub;
pub mod lookup;
pub mod provider;
pub mod query;
pub mod registry;

pub use catalog::{ConfigResolver, ProviderCatalog, ProviderDefinition, ProviderFactory};
pub use hub::ProviderHub;
pub use lookup::Lookup;
pub use provider::{Provider, ProviderHandle, ProviderKind, ProviderParams};
pub use query::{QueryBackend, QueryProvider, Record};
pub use registry::{ProviderCheck, ProviderRegistry, QuerySelector, RegistryArgs};
