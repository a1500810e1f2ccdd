//! Option and provider-list resolution.
//!
//! Both notebooklet options and provider lists accept either a plain
//! replacement list or a list of `+name`/`-name` modifiers applied to a
//! default set. Mixing the two forms in one list is a
//! [`Error::ConfigurationConflict`].

use crate::error::{Error, Result};
use indexmap::IndexSet;
use tracing::warn;

/// A caller-supplied override list, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSpec {
    /// Use exactly these names
    Replace(Vec<String>),
    /// Add and remove names relative to the defaults
    Modify { add: Vec<String>, remove: Vec<String> },
}

impl ListSpec {
    /// Classify `items`, failing if plain names and modifiers are mixed
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let mut plain = Vec::new();
        let mut add = Vec::new();
        let mut remove = Vec::new();

        for item in items {
            let item = item.as_ref().trim();
            if let Some(name) = item.strip_prefix('+') {
                push_unique(&mut add, name.trim());
            } else if let Some(name) = item.strip_prefix('-') {
                push_unique(&mut remove, name.trim());
            } else if !item.is_empty() {
                push_unique(&mut plain, item);
            }
        }

        if !plain.is_empty() && (!add.is_empty() || !remove.is_empty()) {
            return Err(Error::conflict(format!(
                "cannot mix plain names ({}) with +/- modifiers in the same list",
                plain.join(", ")
            )));
        }
        if plain.is_empty() && (!add.is_empty() || !remove.is_empty()) {
            Ok(ListSpec::Modify { add, remove })
        } else {
            Ok(ListSpec::Replace(plain))
        }
    }

    /// Apply to `defaults`: `(defaults \ remove) ∪ add`, or the replacement list
    pub fn apply(&self, defaults: &[String]) -> Vec<String> {
        match self {
            ListSpec::Replace(names) => names.clone(),
            ListSpec::Modify { add, remove } => {
                let mut result: IndexSet<String> = defaults
                    .iter()
                    .filter(|name| !remove.contains(name))
                    .cloned()
                    .collect();
                result.extend(add.iter().cloned());
                result.into_iter().collect()
            }
        }
    }

    /// Every name mentioned, whichever form the list takes
    pub fn mentioned(&self) -> Vec<&str> {
        match self {
            ListSpec::Replace(names) => names.iter().map(String::as_str).collect(),
            ListSpec::Modify { add, remove } => add
                .iter()
                .chain(remove.iter())
                .map(String::as_str)
                .collect(),
        }
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Outcome of resolving a notebooklet's options for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOptions {
    /// Options active for the run
    pub active: Vec<String>,
    /// Names that were not declared and have been dropped
    pub invalid: Vec<String>,
}

/// Resolve the active option set.
///
/// `None` or an empty list selects `defaults`. Undeclared names (not in
/// `all_options`) are dropped with a warning.
pub fn resolve_options<S: AsRef<str>>(
    defaults: &[String],
    all_options: &[String],
    overrides: Option<&[S]>,
) -> Result<ResolvedOptions> {
    let Some(overrides) = overrides.filter(|o| !o.is_empty()) else {
        return Ok(ResolvedOptions {
            active: defaults.to_vec(),
            invalid: Vec::new(),
        });
    };

    let spec = ListSpec::parse(overrides)?;
    let invalid: Vec<String> = spec
        .mentioned()
        .into_iter()
        .filter(|name| !all_options.iter().any(|opt| opt.as_str() == *name))
        .map(str::to_string)
        .collect();
    if !invalid.is_empty() {
        warn!("Invalid options {:?} ignored.", invalid);
    }

    let active = spec
        .apply(defaults)
        .into_iter()
        .filter(|name| !invalid.contains(name))
        .collect();

    Ok(ResolvedOptions { active, invalid })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_replace() {
        let spec = ListSpec::parse(&["a", "b", "a"]).unwrap();
        assert_eq!(spec, ListSpec::Replace(names(&["a", "b"])));
    }

    #[test]
    fn test_parse_modify() {
        let spec = ListSpec::parse(&["+a", "-b"]).unwrap();
        assert_eq!(
            spec,
            ListSpec::Modify {
                add: names(&["a"]),
                remove: names(&["b"])
            }
        );
    }

    #[test]
    fn test_parse_mixed_is_conflict() {
        let err = ListSpec::parse(&["a", "+b"]).unwrap_err();
        assert!(matches!(err, Error::ConfigurationConflict(_)));
    }

    #[test]
    fn test_apply_modify() {
        let defaults = names(&["default1", "default2"]);
        let spec = ListSpec::parse(&["+extra", "-default1"]).unwrap();
        assert_eq!(spec.apply(&defaults), names(&["default2", "extra"]));
    }

    #[test]
    fn test_resolve_defaults_when_none() {
        let defaults = names(&["heartbeat", "alerts"]);
        let all = names(&["heartbeat", "alerts", "azure_api"]);
        let resolved = resolve_options::<&str>(&defaults, &all, None).unwrap();
        assert_eq!(resolved.active, defaults);
        let resolved = resolve_options::<&str>(&defaults, &all, Some(&[][..])).unwrap();
        assert_eq!(resolved.active, defaults);
    }

    #[test]
    fn test_resolve_option_algebra() {
        let defaults = names(&["d1", "d2", "d3"]);
        let all = names(&["d1", "d2", "d3", "o1", "o2"]);
        let resolved =
            resolve_options(&defaults, &all, Some(&["+o1", "+o2", "-d2"][..])).unwrap();
        assert_eq!(resolved.active, names(&["d1", "d3", "o1", "o2"]));
        assert!(resolved.invalid.is_empty());
    }

    #[test]
    fn test_resolve_replace() {
        let defaults = names(&["d1", "d2"]);
        let all = names(&["d1", "d2", "o1"]);
        let resolved = resolve_options(&defaults, &all, Some(&["o1"][..])).unwrap();
        assert_eq!(resolved.active, names(&["o1"]));
    }

    #[test]
    fn test_resolve_drops_unknown() {
        let defaults = names(&["d1"]);
        let all = names(&["d1", "o1"]);
        let resolved = resolve_options(&defaults, &all, Some(&["+bogus", "+o1"][..])).unwrap();
        assert_eq!(resolved.active, names(&["d1", "o1"]));
        assert_eq!(resolved.invalid, names(&["bogus"]));

        let resolved = resolve_options(&defaults, &all, Some(&["invalid_opt"][..])).unwrap();
        assert!(resolved.active.is_empty());
        assert_eq!(resolved.invalid, names(&["invalid_opt"]));
    }

    #[test]
    fn test_resolve_mixed_fails() {
        let defaults = names(&["d1"]);
        let all = names(&["d1", "o1"]);
        assert!(resolve_options(&defaults, &all, Some(&["d1", "-o1"][..])).is_err());
    }
}
