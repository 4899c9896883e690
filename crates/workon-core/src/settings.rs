//! The JSON build config file the tool reads its defaults from.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, WorkflowError};

/// Keys forced to `"true"` for the duration of a run.
pub const ENABLED_FLAGS: [&str; 3] = ["product.experimental", "ffx-repo-add", "ffx_repository"];

/// Content of the settings file as it was before the run touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    raw: String,
}

impl SettingsSnapshot {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Reads and writes a settings file at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the current document.
    ///
    /// A missing, unreadable or malformed file yields an empty object and no
    /// snapshot. Otherwise the snapshot holds the file's exact bytes.
    pub fn load(&self) -> (Map<String, Value>, Option<SettingsSnapshot>) {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("no readable settings at {}: {}", self.path.display(), e);
                return (Map::new(), None);
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => (map, Some(SettingsSnapshot { raw })),
            Ok(_) | Err(_) => {
                warn!(
                    "settings at {} are not a JSON object, starting empty",
                    self.path.display()
                );
                (Map::new(), None)
            }
        }
    }

    pub fn write(&self, document: &Map<String, Value>) -> Result<()> {
        let text = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, text).map_err(|e| WorkflowError::io(&self.path, e))
    }

    /// Writes `snapshot` back verbatim.
    pub fn restore(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        std::fs::write(&self.path, &snapshot.raw).map_err(|e| WorkflowError::io(&self.path, e))
    }

    /// Deletes the file. Deleting a file that does not exist succeeds.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorkflowError::io(&self.path, e)),
        }
    }
}

/// Sets a dotted `key` such as `target.default`, creating intermediate
/// objects. A non-object value in the way is replaced.
pub fn set_nested_key(document: &mut Map<String, Value>, key: &str, value: Value) {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return;
    };

    let mut current = document;
    for part in parts {
        if !matches!(current.get(part), Some(Value::Object(_))) {
            current.insert(part.to_string(), Value::Object(Map::new()));
        }
        let Some(Value::Object(next)) = current.get_mut(part) else {
            return;
        };
        current = next;
    }
    current.insert(leaf.to_string(), value);
}

/// Values written into the settings file for a run.
#[derive(Debug, Clone)]
pub struct RunDefaults<'a> {
    pub bundle_path: &'a Path,
    pub target: &'a str,
    pub repository: &'a str,
    pub sdk_root: &'a Path,
}

/// Applies the fixed set of run defaults to `document`.
pub fn apply_defaults(document: &mut Map<String, Value>, defaults: &RunDefaults<'_>) {
    for key in ENABLED_FLAGS {
        set_nested_key(document, key, Value::from("true"));
    }
    set_nested_key(
        document,
        "product.path",
        Value::from(defaults.bundle_path.to_string_lossy()),
    );
    set_nested_key(document, "target.default", Value::from(defaults.target));
    set_nested_key(document, "repository.default", Value::from(defaults.repository));
    set_nested_key(
        document,
        "sdk.root",
        Value::from(defaults.sdk_root.to_string_lossy()),
    );
}
