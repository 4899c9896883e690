//! Core logic for bringing a development device into a usable state.
//!
//! This crate defines the workflow context, the steps of a run, the runner
//! that guarantees their cleanup, and the device presence watcher.

pub mod constants;
pub mod context;
pub mod env_file;
pub mod error;
pub mod executor;
pub mod runner;
pub mod settings;
pub mod shutdown;
pub mod step;
pub mod steps;
pub mod watcher;

pub use context::{WorkflowContext, WorkflowOptions};
pub use env_file::{BuildConfigLocator, EnvFileLocator};
pub use error::{CommandError, WorkflowError};
pub use executor::{CommandExecutor, FfxExecutor};
pub use runner::{RunOutcome, WorkflowRunner};
pub use shutdown::ShutdownSignal;
pub use step::{Step, StepOutcome};
