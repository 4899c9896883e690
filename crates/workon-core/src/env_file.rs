//! Lookup of project entries in the nearest `fuchsia_env.toml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::ENV_FILE;

/// Resolves a `fuchsia.project` entry from the marker file nearest to a
/// directory.
pub trait BuildConfigLocator {
    /// Returns the path stored under `key`, or `None` when there is no marker
    /// file or it does not carry the entry.
    fn find_entry(&self, start: &Path, key: &str) -> Option<PathBuf>;
}

#[derive(Debug, Deserialize)]
struct EnvFile {
    #[serde(default)]
    fuchsia: FuchsiaSection,
}

#[derive(Debug, Default, Deserialize)]
struct FuchsiaSection {
    #[serde(default)]
    project: HashMap<String, toml::Value>,
}

/// Walks parent directories looking for [`ENV_FILE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvFileLocator;

impl EnvFileLocator {
    /// Returns the first marker file found at or above `start`.
    pub fn find_env_file(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(ENV_FILE))
            .find(|candidate| candidate.is_file())
    }

    fn read_entry(file: &Path, key: &str) -> Option<PathBuf> {
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to read {}: {}", file.display(), e);
                return None;
            }
        };
        let parsed = match toml::from_str::<EnvFile>(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("failed to parse {}: {}", file.display(), e);
                return None;
            }
        };

        let Some(value) = parsed.fuchsia.project.get(key).and_then(toml::Value::as_str) else {
            warn!("{} does not contain fuchsia.project.{} entry", file.display(), key);
            return None;
        };

        let path = PathBuf::from(value);
        if path.is_absolute() {
            Some(path)
        } else {
            file.parent().map(|dir| dir.join(path))
        }
    }
}

impl BuildConfigLocator for EnvFileLocator {
    fn find_entry(&self, start: &Path, key: &str) -> Option<PathBuf> {
        let file = Self::find_env_file(start)?;
        debug!("using marker file {}", file.display());
        Self::read_entry(&file, key)
    }
}
