//! Run configuration shared by every step.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::constants::{
    DEFAULT_OUT_DIR, DEFAULT_TARGET, KEY_BUILD_CONFIG_PATH, KEY_BUILD_OUT_DIR,
};
use crate::env_file::BuildConfigLocator;
use crate::error::{Result, WorkflowError};
use crate::executor::CommandExecutor;
use crate::shutdown::ShutdownSignal;

/// Inputs supplied by the operator.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub project_root: PathBuf,
    /// The product/board combination, e.g. `core.x64`.
    pub product: String,
    pub target: Option<String>,
    pub sdk_id_override: Option<String>,
    pub force_download: bool,
    pub keep_build_config: bool,
    pub restore_build_config: bool,
}

/// Options plus everything derived from them once at startup.
pub struct WorkflowContext {
    pub options: WorkflowOptions,
    pub project_name: String,
    pub out_dir: PathBuf,
    pub sdk_id: String,
    pub sdk_root: PathBuf,
    pub bundle_path: PathBuf,
    pub target: String,
    /// Location of the settings file, if the marker file names one.
    pub build_config_path: Option<PathBuf>,
    executor: Box<dyn CommandExecutor>,
    shutdown: ShutdownSignal,
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("product", &self.options.product)
            .field("sdk_id", &self.sdk_id)
            .field("target", &self.target)
            .field("bundle_path", &self.bundle_path)
            .field("build_config_path", &self.build_config_path)
            .finish_non_exhaustive()
    }
}

impl WorkflowContext {
    /// Resolves the derived configuration.
    ///
    /// # Errors
    /// Fails when the project root is not an existing directory, or when no
    /// SDK id override is given and the SDK version query fails.
    #[instrument(skip_all, fields(product = %options.product))]
    pub fn resolve(
        mut options: WorkflowOptions,
        executor: Box<dyn CommandExecutor>,
        locator: &dyn BuildConfigLocator,
    ) -> Result<Self> {
        let root = canonical_project_root(&options.project_root)?;
        options.project_root = root.clone();
        let project_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out_dir = locator
            .find_entry(&root, KEY_BUILD_OUT_DIR)
            .unwrap_or_else(|| root.join(DEFAULT_OUT_DIR));
        let build_config_path = locator.find_entry(&root, KEY_BUILD_CONFIG_PATH);

        let sdk_id = match options.sdk_id_override.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => executor.run(&["sdk", "version"])?,
        };
        let sdk_root = sdk_root(&root, &project_name);
        let bundle_path = bundle_path(&out_dir, &options.product, &sdk_id);
        let target = resolve_target(options.target.as_deref(), executor.as_ref());

        Ok(Self {
            options,
            project_name,
            out_dir,
            sdk_id,
            sdk_root,
            bundle_path,
            target,
            build_config_path,
            executor,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Replaces the interrupt flag observed by the runner and the watch loop.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn ffx(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn product(&self) -> &str {
        &self.options.product
    }
}

/// Makes `project_root` absolute, so `.` still yields a project name.
///
/// # Errors
/// Returns [`WorkflowError::Configuration`] when the path does not name an
/// existing directory.
pub fn canonical_project_root(project_root: &Path) -> Result<PathBuf> {
    let root = std::fs::canonicalize(project_root).map_err(|e| {
        WorkflowError::Configuration(format!(
            "project root '{}' is not accessible: {e}",
            project_root.display()
        ))
    })?;
    if !root.is_dir() {
        return Err(WorkflowError::Configuration(format!(
            "project root '{}' is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

/// `<root>/bazel-<name>/external/fuchsia_sdk`
pub fn sdk_root(project_root: &Path, project_name: &str) -> PathBuf {
    project_root
        .join(format!("bazel-{project_name}"))
        .join("external")
        .join("fuchsia_sdk")
}

/// `<out>/product_bundles/<product>.<sdk_id>`
pub fn bundle_path(out_dir: &Path, product: &str, sdk_id: &str) -> PathBuf {
    out_dir
        .join("product_bundles")
        .join(format!("{product}.{sdk_id}"))
}

/// Picks the target name, trying each source in order:
/// the explicit override, the tool's default target, the configured emulator
/// name, and finally [`DEFAULT_TARGET`].
///
/// Any failing or empty query falls through to the next candidate. This does
/// not distinguish "not configured" from "the tool failed".
pub fn resolve_target(explicit: Option<&str>, executor: &dyn CommandExecutor) -> String {
    if let Some(target) = explicit.filter(|t| !t.is_empty()) {
        return target.to_string();
    }

    const QUERIES: [&[&str]; 2] = [&["target", "default", "get"], &["config", "get", "emu.name"]];
    for query in QUERIES {
        match executor.run(query) {
            Ok(value) => {
                let value = unquote(&value);
                if !value.is_empty() {
                    return value;
                }
                debug!("'{}' returned nothing", query.join(" "));
            }
            Err(e) => debug!("'{}' failed: {}", query.join(" "), e),
        }
    }

    DEFAULT_TARGET.to_string()
}

/// The tool prints string values quoted.
fn unquote(value: &str) -> String {
    value.replace('"', "").trim().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::executor::fake::ScriptedExecutor;

    /// Locator answering from a fixed table.
    #[derive(Debug, Default)]
    pub(crate) struct StaticLocator(pub HashMap<&'static str, PathBuf>);

    impl BuildConfigLocator for StaticLocator {
        fn find_entry(&self, _start: &Path, key: &str) -> Option<PathBuf> {
            self.0.get(key).cloned()
        }
    }

    pub(crate) fn options(root: &Path) -> WorkflowOptions {
        WorkflowOptions {
            project_root: root.to_path_buf(),
            product: "core.x64".to_string(),
            target: Some("fuchsia-emulator".to_string()),
            sdk_id_override: Some("8".to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn context(
        options: WorkflowOptions,
        executor: &ScriptedExecutor,
        build_config: Option<PathBuf>,
    ) -> WorkflowContext {
        let mut table = HashMap::new();
        if let Some(path) = build_config {
            table.insert(KEY_BUILD_CONFIG_PATH, path);
        }
        WorkflowContext::resolve(options, Box::new(executor.clone()), &StaticLocator(table))
            .expect("context should resolve")
    }
}
