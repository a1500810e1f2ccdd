// Filesystem loading of notebooklet definition documents

use crate::discovery::registry::UnitRegistry;
use crate::error::{Error, Result};
use crate::metadata::UnitDocument;
use crate::nb;
use crate::notebooklet::UnitInfo;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Implementation used when a document names none
pub const DEFAULT_IMPLEMENTATION: &str = "declarative";

/// Load every definition under `root` into `registry`.
///
/// Hidden folders (leading `.`) are not walked and files starting with `_`
/// are private. Each `*.yaml`/`*.yml` file is registered in the folder
/// matching its location relative to `root`, below `prefix` when given.
/// Returns the number of classes registered.
pub fn load_root(registry: &mut UnitRegistry, root: &Path, prefix: Option<&str>) -> Result<usize> {
    if !root.is_dir() {
        return Err(Error::PathNotFound(root.to_path_buf()));
    }

    let mut count = 0;
    for path in discover_files(root) {
        let folder = folder_path(root, &path, prefix);
        match load_unit(&path) {
            Ok((info, factory)) => {
                let unit = registry.register(&folder, info, factory);
                debug!("Registered {} from {}", unit.path(), path.display());
                count += 1;
            }
            Err(e) => registry.record_load_error(&path, e.to_string()),
        }
    }
    Ok(count)
}

/// Candidate definition files, sorted
fn discover_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !(is_hidden(entry) || is_dotted_folder(entry)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || is_private(&entry) {
            continue;
        }
        let is_definition = entry
            .path()
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml");
        if is_definition {
            files.push(entry.into_path());
        }
    }
    files.sort();
    files
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Folder names become path segments, so a `.` inside one cannot be indexed
fn is_dotted_folder(entry: &DirEntry) -> bool {
    let dotted = entry.file_type().is_dir() && entry.file_name().to_string_lossy().contains('.');
    if dotted {
        warn!(
            "Skipping folder {}: folder names may not contain '.'",
            entry.path().display()
        );
    }
    dotted
}

fn is_private(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('_')
}

/// Dotted folder path for `file`: `prefix` then the folders between `root` and `file`
fn folder_path(root: &Path, file: &Path, prefix: Option<&str>) -> String {
    let mut parts: Vec<String> = prefix.map(|p| vec![p.to_string()]).unwrap_or_default();
    if let Some(parent) = file.parent().and_then(|p| p.strip_prefix(root).ok()) {
        parts.extend(
            parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string()),
        );
    }
    parts.join(".")
}

fn load_unit(path: &Path) -> Result<(UnitInfo, crate::discovery::UnitFactory)> {
    let document = UnitDocument::read(path)?;
    let implementation = document
        .implementation
        .clone()
        .unwrap_or_else(|| DEFAULT_IMPLEMENTATION.to_string());
    let factory = nb::implementation(&implementation).ok_or_else(|| {
        Error::unit_load(path, format!("unknown implementation '{}'", implementation))
    })?;

    let default_name = match document.metadata.name.as_str() {
        "" | "Unnamed" => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        name => name.to_string(),
    };
    let info = UnitInfo::from_document(&default_name, document).with_source(path);
    if info.class_name.is_empty() || info.class_name.contains('.') {
        return Err(Error::unit_load(
            path,
            format!("invalid class name '{}'", info.class_name),
        ));
    }
    Ok((info, factory))
}
