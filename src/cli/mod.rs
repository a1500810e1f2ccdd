//! CLI module for notebooklets

mod args;

pub use args::{Args, Command};

use crate::config::Config;
use crate::discovery::{discover_modules, Entry, UnitRegistry};
use crate::error::{Error, Result};
use crate::pivot::PivotTable;
use crate::providers::registry::resolve_provider_names;
use crate::providers::{ProviderCatalog, QuerySelector};
use crate::settings;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_CONFIG: &str = "notebooklets.toml";

/// Run the CLI application
pub fn run(args: Args) -> ExitCode {
    match execute(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(config: Option<&Path>, paths: Vec<PathBuf>, verbose: bool) -> Result<Config> {
    load_config_with(config, None, Vec::new(), paths, verbose)
}

fn load_config_with(
    config: Option<&Path>,
    query_provider: Option<String>,
    providers: Vec<String>,
    paths: Vec<PathBuf>,
    verbose: bool,
) -> Result<Config> {
    // An explicitly named config file must load; the default one is optional
    let mut cfg = match config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG)),
    };
    cfg.merge_cli(query_provider, providers, paths, verbose);
    cfg.validate()?;
    settings::replace(cfg.settings.clone());
    Ok(cfg)
}

fn load_registry(cfg: &Config) -> Result<Arc<UnitRegistry>> {
    debug!("Discovering notebooklets in {:?}", cfg.discovery.paths);
    let registry = discover_modules(&cfg.discovery.paths)?;
    if !registry.load_errors().is_empty() {
        eprintln!("Load errors ({}):", registry.load_errors().len());
        for (path, err) in registry.load_errors().iter().take(5) {
            eprintln!("  {}: {}", path.display(), err);
        }
        if registry.load_errors().len() > 5 {
            eprintln!("  ... and {} more", registry.load_errors().len() - 5);
        }
    }
    Ok(registry)
}

fn execute(args: Args) -> Result<()> {
    let config = args.config.as_deref();
    match args.command {
        Command::List { path } => {
            let cfg = load_config(config, path, args.verbose)?;
            let registry = load_registry(&cfg)?;
            print!("{}", registry.tree());
            println!("\n{} notebooklets", registry.len());
            Ok(())
        }

        Command::Find { terms, full_match, path } => {
            let cfg = load_config(config, path, args.verbose)?;
            let registry = load_registry(&cfg)?;
            let found = registry.find(&terms, full_match);
            if found.is_empty() {
                println!("No notebooklets matched '{}'", terms);
                return Ok(());
            }
            for (class_name, unit) in found {
                let (_, count) = unit.match_terms(&terms);
                println!(
                    "{} ({}) [{} matched]: {}",
                    class_name,
                    unit.path(),
                    count,
                    unit.info().description()
                );
            }
            Ok(())
        }

        Command::Show { name, path } => {
            let cfg = load_config(config, path, args.verbose)?;
            let registry = load_registry(&cfg)?;
            match registry.get_path(&name) {
                Some(Entry::Unit(unit)) => {
                    println!("{}", unit.info().get_help());
                    println!("## Settings\n\n{}", unit.info().get_settings());
                    Ok(())
                }
                Some(Entry::Container(container)) => {
                    print!("{}", container);
                    Ok(())
                }
                None => Err(Error::other(format!("No notebooklet or folder named '{}'", name))),
            }
        }

        Command::Providers { query_provider, providers } => {
            let cfg = load_config_with(config, query_provider, providers, Vec::new(), args.verbose)?;
            let catalog = ProviderCatalog::builtin().with_workspaces(cfg.workspaces.clone());
            let registry_args = cfg.registry_args();
            println!("Known providers:");
            for name in catalog.list_providers() {
                println!("  {}", name);
            }
            println!("Default providers:");
            for name in catalog.default_providers() {
                println!("  {}", name);
            }
            let selected =
                resolve_provider_names(registry_args.providers.as_deref(), catalog.default_providers())?;
            println!("Selected providers:");
            for name in &selected {
                println!("  {}", name);
            }
            if let QuerySelector::Name(name) = &registry_args.query_provider {
                println!("Query provider: {}", name);
            }
            Ok(())
        }

        Command::Pivots { entity } => {
            let cfg = load_config(config, Vec::new(), args.verbose)?;
            let registry = load_registry(&cfg)?;
            let pivots = PivotTable::from_registry(&registry);
            for pivot in pivots.iter() {
                if entity.as_deref().is_some_and(|e| !e.eq_ignore_ascii_case(pivot.entity)) {
                    continue;
                }
                println!(
                    "{}.{} -> {} (value = {}.{})",
                    pivot.entity,
                    pivot.func_name,
                    pivot.unit.path(),
                    pivot.entity,
                    pivot.attribute
                );
            }
            Ok(())
        }
    }
}
