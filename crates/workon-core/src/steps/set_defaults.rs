use tracing::{debug, info};

use crate::constants::DEFAULT_REPOSITORY;
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::settings::{apply_defaults, RunDefaults, SettingsSnapshot, SettingsStore, ENABLED_FLAGS};
use crate::step::{Step, StepOutcome};

/// Points the tool's build config at this run's bundle, target and SDK, and
/// undoes that on cleanup.
#[derive(Debug, Default)]
pub struct SetDefaults {
    store: Option<SettingsStore>,
    snapshot: Option<SettingsSnapshot>,
}

impl SetDefaults {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Step for SetDefaults {
    fn name(&self) -> &'static str {
        "set-defaults"
    }

    fn run(&mut self, ctx: &WorkflowContext) -> Result<StepOutcome> {
        let Some(path) = ctx.build_config_path.as_deref() else {
            return Ok(StepOutcome::early_exit(
                "cannot find build config file. do you have a fuchsia_env.toml file?",
            ));
        };
        let store = SettingsStore::new(path);
        info!("Writing build config entry to {}", path.display());

        let (mut document, snapshot) = store.load();
        self.snapshot = snapshot;
        // Recorded before writing so cleanup also covers a failed write.
        self.store = Some(store.clone());

        info!("Setting ffx configs to true {:?}.", ENABLED_FLAGS);
        info!("Setting {} as default target", ctx.target);
        info!("Setting '{}' as the default package repository", DEFAULT_REPOSITORY);
        info!("Setting the sdk.root to {}", ctx.sdk_root.display());
        apply_defaults(
            &mut document,
            &RunDefaults {
                bundle_path: &ctx.bundle_path,
                target: &ctx.target,
                repository: DEFAULT_REPOSITORY,
                sdk_root: &ctx.sdk_root,
            },
        );

        store.write(&document)?;
        Ok(StepOutcome::Continue)
    }

    fn cleanup(&mut self, ctx: &WorkflowContext) -> Result<()> {
        let Some(store) = self.store.take() else {
            debug!("set-defaults never ran, nothing to clean up");
            return Ok(());
        };
        let snapshot = self.snapshot.take();

        match snapshot {
            Some(snapshot) if ctx.options.restore_build_config => {
                info!("Restoring original build config at {}", store.path().display());
                store.restore(&snapshot)
            }
            _ if !ctx.options.keep_build_config => {
                info!("Removing build config at {}", store.path().display());
                store.remove()
            }
            _ => Ok(()),
        }
    }
}
