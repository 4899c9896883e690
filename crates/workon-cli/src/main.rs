use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workon_core::{
    EnvFileLocator, FfxExecutor, RunOutcome, ShutdownSignal, WorkflowContext, WorkflowError,
    WorkflowOptions, WorkflowRunner,
};

mod interrupt;
mod styles;

use styles as s;

/// The command-line interface for work-on.
#[derive(Debug, Parser)]
#[command(name = "work-on")]
#[command(version)]
#[command(styles = s::get_clap_styles())]
#[command(about = "Prepare a Fuchsia device for interactive development")]
#[command(
    long_about = "Fetches and serves the product bundle matching your SDK, points ffx at it,
and registers the package repository whenever the target comes online.

Runs until interrupted with Ctrl+C; the build config is then cleaned up."
)]
#[command(
    after_help = "\x1b[1;32mExamples:\x1b[0m\n  \x1b[36mwork-on --ffx tools/ffx core.x64\x1b[0m                     \x1b[2m# Use the default target\x1b[0m\n  \x1b[36mwork-on --ffx tools/ffx --target nuc core.x64 --force\x1b[0m  \x1b[2m# Re-download for a named device\x1b[0m"
)]
pub(crate) struct Cli {
    /// The name of the product/board combo, e.g. `core.x64`.
    product: String,
    /// A path to the ffx tool.
    #[arg(long)]
    ffx: PathBuf,
    /// The name of the target which you are working on.
    #[arg(long)]
    target: Option<String>,
    /// The path to the project root. This directory should contain the
    /// fuchsia_env.toml file.
    #[arg(long, env = "BUILD_WORKSPACE_DIRECTORY")]
    project_root: PathBuf,
    /// Allows for overriding the sdk_id used when fetching product bundles.
    #[arg(long)]
    sdk_id_override: Option<String>,
    /// Force downloading the product bundle.
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Do not clean up the build configuration when exiting.
    #[arg(long, default_value_t = false)]
    keep_build_config: bool,
    /// Restores the original build config if it is present.
    #[arg(long, default_value_t = false)]
    restore_original_build_config: bool,
    /// Log debug output, including every ffx invocation.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> WorkflowOptions {
        WorkflowOptions {
            project_root: self.project_root.clone(),
            product: self.product.clone(),
            target: self.target.clone(),
            sdk_id_override: self.sdk_id_override.clone(),
            force_download: self.force,
            keep_build_config: self.keep_build_config,
            restore_build_config: self.restore_original_build_config,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
    debug!("parsed cli arguments: {:?}", cli);

    let shutdown = ShutdownSignal::new();
    interrupt::install(shutdown.clone())?;

    let root = workon_core::context::canonical_project_root(&cli.project_root)
        .context("unable to resolve the workflow configuration")?;
    let executor = FfxExecutor::new(&cli.ffx, Some(root));
    let ctx = WorkflowContext::resolve(cli.options(), Box::new(executor), &EnvFileLocator)
        .context("unable to resolve the workflow configuration")?
        .with_shutdown(shutdown);

    let mut runner = WorkflowRunner::new(ctx);
    report(runner.run())
}

/// Maps a finished run to the process result. Interruption is the normal way
/// to stop, and an early exit is not a failure.
fn report(result: Result<RunOutcome, WorkflowError>) -> Result<()> {
    match result {
        Ok(RunOutcome::Completed) => Ok(()),
        Ok(RunOutcome::EarlyExit { step, reason }) => {
            println!("Exiting early ({step}): {reason}");
            Ok(())
        }
        Err(WorkflowError::Interrupted) => {
            info!("Stopped");
            Ok(())
        }
        Err(e) => Err(anyhow!(e).context("work-on failed")),
    }
}
