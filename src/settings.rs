//! Process-wide runtime settings.
//!
//! Available settings are:
//!
//! - `verbose` (true): show progress messages.
//! - `debug` (false): turn on debug output.
//! - `show_sample_results` (false): display a sample of results as they are produced.
//! - `silent` (false): run notebooklets with no output.
//! - `temp_silent` (unset): per-run override of `silent`, published by each run.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::{OnceLock, RwLock};

/// Setting name, default and description
pub const SETTING_DEFS: &[(&str, bool, &str)] = &[
    ("verbose", true, "Show progress messages."),
    ("debug", false, "Turn on debug output."),
    (
        "show_sample_results",
        false,
        "Display sample of results as they are produced.",
    ),
    ("silent", false, "Execute notebooklets with no output."),
    ("temp_silent", false, "Execute notebooklets with no output."),
];

/// Runtime settings values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub verbose: bool,
    pub debug: bool,
    pub show_sample_results: bool,
    pub silent: bool,
    #[serde(skip)]
    pub temp_silent: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: true,
            debug: false,
            show_sample_results: false,
            silent: false,
            temp_silent: None,
        }
    }
}

impl Settings {
    /// Get a setting by name. `silent` reports the per-run override when one is set.
    pub fn get(&self, name: &str) -> Result<bool> {
        match name {
            "verbose" => Ok(self.verbose),
            "debug" => Ok(self.debug),
            "show_sample_results" => Ok(self.show_sample_results),
            "silent" => Ok(self.temp_silent.unwrap_or(self.silent)),
            "temp_silent" => Ok(self.temp_silent.unwrap_or(false)),
            _ => Err(Error::Setting(format!("Unknown option {}.", name))),
        }
    }

    /// Set a setting by name
    pub fn set(&mut self, name: &str, value: bool) -> Result<()> {
        match name {
            "verbose" => self.verbose = value,
            "debug" => self.debug = value,
            "show_sample_results" => self.show_sample_results = value,
            "silent" => self.silent = value,
            "temp_silent" => self.temp_silent = Some(value),
            _ => return Err(Error::Setting(format!("Unrecognized option {}.", name))),
        }
        Ok(())
    }

    /// Set a setting from its text form, converting to the setting's type
    pub fn set_str(&mut self, name: &str, value: &str) -> Result<()> {
        let parsed = match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => true,
            "false" | "no" | "0" | "off" => false,
            _ => {
                return Err(Error::Setting(format!(
                    "Option {} is of type bool. {} cannot be converted to that type.",
                    name, value
                )))
            }
        };
        self.set(name, parsed)
    }

    /// Set or clear the per-run silent override
    pub fn set_temp_silent(&mut self, value: Option<bool>) {
        self.temp_silent = value;
    }

    /// Describe every setting with its default
    pub fn describe() -> String {
        SETTING_DEFS
            .iter()
            .map(|(name, default, text)| format!("{} (default={}): {}", name, default, text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn global() -> &'static RwLock<Settings> {
    static SETTINGS: OnceLock<RwLock<Settings>> = OnceLock::new();
    SETTINGS.get_or_init(|| RwLock::new(Settings::default()))
}

/// Snapshot of the process-wide settings
pub fn current() -> Settings {
    match global().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process-wide settings (for example from a loaded config)
pub fn replace(settings: Settings) {
    match global().write() {
        Ok(mut guard) => *guard = settings,
        Err(poisoned) => *poisoned.into_inner() = settings,
    }
}

/// Get a process-wide setting
pub fn get_opt(name: &str) -> Result<bool> {
    current().get(name)
}

/// Set a process-wide setting
pub fn set_opt(name: &str, value: bool) -> Result<()> {
    match global().write() {
        Ok(mut guard) => guard.set(name, value),
        Err(poisoned) => poisoned.into_inner().set(name, value),
    }
}

/// Publish the silent value in effect for the current run
pub fn set_temp_silent(value: Option<bool>) {
    match global().write() {
        Ok(mut guard) => guard.set_temp_silent(value),
        Err(poisoned) => poisoned.into_inner().set_temp_silent(value),
    }
}
