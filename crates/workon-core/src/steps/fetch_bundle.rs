use tracing::{info, warn};

use crate::constants::BUNDLE_BASE_URL;
use crate::context::WorkflowContext;
use crate::error::{CommandError, Result, WorkflowError};
use crate::step::{Step, StepOutcome};

/// Downloads the product bundle when needed and serves it as a package
/// repository.
///
/// The repository server is left running after the workflow ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchBundle;

impl FetchBundle {
    fn download_needed(ctx: &WorkflowContext) -> bool {
        !ctx.bundle_path.exists() || ctx.options.force_download
    }

    /// Resolves the transfer manifest and downloads it. `Err` carries the
    /// early-exit reason.
    fn download(ctx: &WorkflowContext) -> std::result::Result<(), String> {
        let bundle_path = ctx.bundle_path.to_string_lossy();
        info!("Downloading product bundle to {}", bundle_path);

        let base_url = format!("{}/{}", BUNDLE_BASE_URL, ctx.sdk_id);
        let manifest = ctx
            .ffx()
            .run(&["product", "lookup", ctx.product(), &ctx.sdk_id, "--base-url", &base_url])
            .map_err(|e| {
                warn!("product lookup failed: {}", e);
                format!("Failed to look up product bundle {}.", ctx.product())
            })?;

        match ctx
            .ffx()
            .run_streamed(&["product", "download", &manifest, &bundle_path, "--force"])
        {
            Ok(0) => Ok(()),
            Ok(code) => {
                warn!("product download exited with code {}", code);
                Err("Failed to download product bundle.".to_string())
            }
            Err(e) => {
                warn!("product download failed: {}", e);
                Err("Failed to download product bundle.".to_string())
            }
        }
    }
}

impl Step for FetchBundle {
    fn name(&self) -> &'static str {
        "fetch-bundle"
    }

    fn run(&mut self, ctx: &WorkflowContext) -> Result<StepOutcome> {
        if Self::download_needed(ctx) {
            if let Err(reason) = Self::download(ctx) {
                // Ctrl-C reaches the download too and makes it fail.
                if ctx.shutdown().is_triggered() {
                    return Err(WorkflowError::Interrupted);
                }
                return Ok(StepOutcome::EarlyExit(reason));
            }
        } else {
            info!(
                "Skipping download. Product bundle already exists at {}",
                ctx.bundle_path.display()
            );
        }

        let bundle_path = ctx.bundle_path.to_string_lossy();
        let args: [&str; 7] = [
            "repository",
            "server",
            "start",
            "--background",
            "--no-device",
            "--repo-path",
            &bundle_path,
        ];
        let code = ctx.ffx().run_streamed(&args)?;
        if code != 0 {
            return Err(CommandError::Failed {
                command: args.join(" "),
                status: format!("exit status: {code}"),
                output: String::new(),
            }
            .into());
        }
        info!("Serving {} as a package repository", bundle_path);
        Ok(StepOutcome::Continue)
    }
}
