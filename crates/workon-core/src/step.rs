//! The unit of pipeline work.

use crate::context::WorkflowContext;
use crate::error::Result;

/// What the runner should do after a step's `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Move on to the next step.
    Continue,
    /// Stop forward progress. Not a failure: cleanup still runs and the
    /// reason is reported to the operator.
    EarlyExit(String),
}

impl StepOutcome {
    pub fn early_exit(reason: impl Into<String>) -> Self {
        Self::EarlyExit(reason.into())
    }
}

/// A stage of the workflow.
///
/// `cleanup` is called once per run for every step, including steps whose
/// `run` never executed, so it must be a no-op on an unstarted step.
pub trait Step: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn run(&mut self, ctx: &WorkflowContext) -> Result<StepOutcome>;

    fn cleanup(&mut self, _ctx: &WorkflowContext) -> Result<()> {
        Ok(())
    }
}
