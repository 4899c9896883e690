use anyhow::{Context, Result};
use tracing::{info, warn};

use workon_core::ShutdownSignal;

/// Routes Ctrl-C into `shutdown` so the runner can clean up.
///
/// A second Ctrl-C exits immediately without cleanup.
pub fn install(shutdown: ShutdownSignal) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                info!("Interrupt received, cleaning up (Ctrl+C again to force exit)");
                shutdown.trigger();

                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("second interrupt, exiting without cleanup");
                    std::process::exit(130);
                }
            })
        })
        .context("failed to spawn signal thread")?;

    Ok(())
}
