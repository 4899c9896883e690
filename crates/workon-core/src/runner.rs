//! Drives the steps in order and guarantees the cleanup pass.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, info, instrument};

use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::step::{Step, StepOutcome};
use crate::steps::{FetchBundle, SetDefaults, Startup, WatchTarget};

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step returned [`StepOutcome::Continue`].
    Completed,
    /// `step` asked to stop early.
    EarlyExit { step: &'static str, reason: String },
}

/// Owns the context and the fixed step sequence.
#[derive(Debug)]
pub struct WorkflowRunner {
    ctx: WorkflowContext,
    steps: Vec<Box<dyn Step>>,
}

impl WorkflowRunner {
    /// The standard progression: Startup, SetDefaults, FetchBundle,
    /// WatchTarget. Order matters, the watch step never returns on its own.
    pub fn new(ctx: WorkflowContext) -> Self {
        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(Startup),
            Box::new(SetDefaults::new()),
            Box::new(FetchBundle),
            Box::new(WatchTarget::new()),
        ];
        Self::with_steps(ctx, steps)
    }

    pub fn with_steps(ctx: WorkflowContext, steps: Vec<Box<dyn Step>>) -> Self {
        Self { ctx, steps }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    #[cfg(test)]
    fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs the steps in order, then cleans up every step exactly once,
    /// whether the run completed, exited early, failed, or was interrupted.
    ///
    /// # Errors
    /// Returns the first error a step's `run` raised, after cleanup.
    #[instrument(skip(self), fields(product = %self.ctx.product(), target = %self.ctx.target))]
    pub fn run(&mut self) -> Result<RunOutcome> {
        let mut pass = CleanupGuard {
            ctx: &self.ctx,
            steps: &mut self.steps,
        };
        pass.advance()
    }
}

/// Runs every step's cleanup when dropped, so the pass also happens when a
/// step returns an error or unwinds. A panicking cleanup is contained so the
/// remaining steps are still cleaned up.
struct CleanupGuard<'a> {
    ctx: &'a WorkflowContext,
    steps: &'a mut [Box<dyn Step>],
}

impl CleanupGuard<'_> {
    fn advance(&mut self) -> Result<RunOutcome> {
        for step in self.steps.iter_mut() {
            if self.ctx.shutdown().is_triggered() {
                return Err(WorkflowError::Interrupted);
            }
            info!("step: {}", step.name());
            if let StepOutcome::EarlyExit(reason) = step.run(self.ctx)? {
                info!("Exiting early: {}", reason);
                return Ok(RunOutcome::EarlyExit {
                    step: step.name(),
                    reason,
                });
            }
        }
        Ok(RunOutcome::Completed)
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        info!("Shutting down");
        for step in self.steps.iter_mut() {
            let name = step.name();
            let ctx = self.ctx;
            match panic::catch_unwind(AssertUnwindSafe(|| step.cleanup(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("cleanup of {} failed: {}", name, e),
                Err(_) => error!("cleanup of {} panicked", name),
            }
        }
    }
}
