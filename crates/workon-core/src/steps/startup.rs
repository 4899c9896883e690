use tracing::info;

use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::step::{Step, StepOutcome};

/// Reports the resolved configuration and creates the bundle directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Startup;

impl Step for Startup {
    fn name(&self) -> &'static str {
        "startup"
    }

    fn run(&mut self, ctx: &WorkflowContext) -> Result<StepOutcome> {
        info!("Starting up:");
        info!("- Target SDK ID: {}", ctx.sdk_id);
        info!("- Product: {}", ctx.product());
        info!("- Target: {}", ctx.target);

        if let Some(parent) = ctx.bundle_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WorkflowError::io(parent, e))?;
        }
        Ok(StepOutcome::Continue)
    }
}
