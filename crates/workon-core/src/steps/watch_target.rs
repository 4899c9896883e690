use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::constants::{
    DEFAULT_REPOSITORY, POLL_INTERVAL, REPOSITORY_ALIASES, TARGET_WAIT_TIMEOUT_SECS,
};
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::step::{Step, StepOutcome};
use crate::watcher::{
    check_compatibility, parse_target_list, Compatibility, DeviceWatcher, TargetEntry, TargetShow,
    Transition,
};

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub transition: Transition,
    /// Set on the poll that registered the repository, unless the device
    /// could not be queried.
    pub compatibility: Option<Compatibility>,
}

/// Polls the device list forever, registering the package repository each
/// time the target comes up. Returns only when interrupted.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    interval: Duration,
}

impl Default for WatchTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchTarget {
    pub fn new() -> Self {
        Self::with_interval(POLL_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Polls once and acts on the presence edge, if any.
    ///
    /// # Errors
    /// Fails only when repository registration fails.
    pub fn tick(&self, ctx: &WorkflowContext, watcher: &mut DeviceWatcher) -> Result<Tick> {
        let devices = query_devices(ctx);
        let transition = watcher.observe(devices);
        let target = watcher.target();

        let compatibility = match transition {
            Transition::Appeared => {
                info!("{} found. Registering package repository.", target);
                register_repository(ctx)?;
                info!("{} found. Registered '{}'", target, DEFAULT_REPOSITORY);
                check_target_compatibility(ctx, target)
            }
            Transition::Lost => {
                info!("{} lost. Waiting for target to come back online.", target);
                None
            }
            Transition::Unchanged => None,
        };

        Ok(Tick {
            transition,
            compatibility,
        })
    }
}

impl Step for WatchTarget {
    fn name(&self) -> &'static str {
        "watch-target"
    }

    fn run(&mut self, ctx: &WorkflowContext) -> Result<StepOutcome> {
        info!("Watching for target to come up");
        let mut watcher = DeviceWatcher::new(ctx.target.clone());
        loop {
            self.tick(ctx, &mut watcher)?;
            if ctx.shutdown().wait_timeout(self.interval) {
                info!("Stopped watching {}", watcher.target());
                return Err(WorkflowError::Interrupted);
            }
        }
    }
}

/// Best effort: a failed query or unreadable output means no devices.
fn query_devices(ctx: &WorkflowContext) -> Vec<TargetEntry> {
    match ctx.ffx().run(&["--machine", "json", "target", "list"]) {
        Ok(json) => parse_target_list(&json),
        Err(e) => {
            debug!("target list failed: {}", e);
            Vec::new()
        }
    }
}

fn register_repository(ctx: &WorkflowContext) -> Result<()> {
    let mut args = vec!["target", "repository", "register", "-r", DEFAULT_REPOSITORY];
    for alias in REPOSITORY_ALIASES {
        args.extend(["--alias", alias]);
    }
    ctx.ffx().run(&args)?;
    Ok(())
}

/// Waits for the device, fetches its build identity and warns on mismatch.
/// Never fails the watch: query errors are logged and yield `None`.
#[instrument(skip(ctx))]
fn check_target_compatibility(ctx: &WorkflowContext, target: &str) -> Option<Compatibility> {
    info!("checking for target compatibility");
    let timeout = TARGET_WAIT_TIMEOUT_SECS.to_string();

    let show = ctx
        .ffx()
        .run(&["--target", target, "target", "wait", "-t", &timeout])
        .and_then(|_| {
            ctx.ffx()
                .run(&["--machine", "json", "--target", target, "target", "show"])
        });
    let show = match show {
        Ok(show) => show,
        Err(e) => {
            warn!("could not query {} for compatibility: {}", target, e);
            return None;
        }
    };
    let build = match serde_json::from_str::<TargetShow>(&show) {
        Ok(parsed) => parsed.build,
        Err(e) => {
            warn!("could not read build info of {}: {}", target, e);
            return None;
        }
    };

    let result = check_compatibility(&ctx.sdk_id, ctx.product(), &build);
    match &result {
        Compatibility::Compatible => {
            info!("Target is running expected SDK version and product.");
        }
        Compatibility::Mismatch {
            expected_sdk,
            observed_sdk,
            expected_product,
            observed_product,
        } => {
            warn!("WARNING: the target {} might not be compatible with your SDK.", target);
            warn!("If you experience unexpected errors, try updating your target or");
            warn!("restarting this program with the correct target.");
            warn!("Expected SDK id: {}, Target SDK id: {}", expected_sdk, observed_sdk);
            warn!(
                "Expected product: {}, Target product: {}",
                expected_product, observed_product
            );
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing;
    use crate::executor::fake::ScriptedExecutor;
    use crate::watcher::WatchState;

    const LIST: &str = "--machine json target list";
    const REGISTER: &str =
        "target repository register -r devhost.fuchsia.com --alias fuchsia.com --alias chromium.org";
    const WAIT: &str = "--target fuchsia-emulator target wait -t 60";
    const SHOW: &str = "--machine json --target fuchsia-emulator target show";

    const UP: &str = r#"[{"nodename":"fuchsia-emulator","target_state":"Product"}]"#;
    const BOOTING: &str = r#"[{"nodename":"fuchsia-emulator","target_state":"Unknown"}]"#;

    fn show(version: &str, product: &str, board: &str) -> String {
        format!(r#"{{"build":{{"version":"{version}","product":"{product}","board":"{board}"}}}}"#)
    }

    fn fixture() -> (ScriptedExecutor, WorkflowContext, DeviceWatcher) {
        let ffx = ScriptedExecutor::new();
        ffx.respond(SHOW, &show("8", "core", "x64"));
        let ctx = testing::context(testing::options(&std::env::temp_dir()), &ffx, None);
        let watcher = DeviceWatcher::new(ctx.target.clone());
        (ffx, ctx, watcher)
    }

    #[test]
    fn registers_once_per_presence_cycle() {
        let (ffx, ctx, mut watcher) = fixture();
        let step = WatchTarget::new();
        for response in [UP, UP, UP, "[]", UP] {
            ffx.push(LIST, Ok(response.to_string()));
        }

        let transitions: Vec<Transition> = (0..5)
            .map(|_| step.tick(&ctx, &mut watcher).unwrap().transition)
            .collect();

        assert_eq!(
            transitions,
            vec![
                Transition::Appeared,
                Transition::Unchanged,
                Transition::Unchanged,
                Transition::Lost,
                Transition::Appeared,
            ]
        );
        assert_eq!(ffx.count(REGISTER), 2);
        assert_eq!(ffx.count(WAIT), 2);
        assert_eq!(ffx.count(SHOW), 2);
        assert_eq!(watcher.state(), WatchState::Registered);
    }

    #[test]
    fn failed_list_query_counts_as_absent() {
        let (ffx, ctx, mut watcher) = fixture();
        let step = WatchTarget::new();
        ffx.push(LIST, Ok(UP.to_string()))
            .push(LIST, Err("daemon restarting".to_string()));

        assert_eq!(step.tick(&ctx, &mut watcher).unwrap().transition, Transition::Appeared);
        assert_eq!(step.tick(&ctx, &mut watcher).unwrap().transition, Transition::Lost);
        assert_eq!(watcher.state(), WatchState::Unregistered);
        assert_eq!(ffx.count(REGISTER), 1);
    }

    #[test]
    fn booting_target_is_not_registered() {
        let (ffx, ctx, mut watcher) = fixture();
        ffx.respond(LIST, BOOTING);
        let tick = WatchTarget::new().tick(&ctx, &mut watcher).unwrap();
        assert_eq!(tick.transition, Transition::Unchanged);
        assert_eq!(ffx.count(REGISTER), 0);
    }

    #[test]
    fn variant_board_is_compatible() {
        let (ffx, ctx, mut watcher) = fixture();
        ffx.respond(LIST, UP).respond(SHOW, &show("8", "core", "x64-dfv2"));
        let tick = WatchTarget::new().tick(&ctx, &mut watcher).unwrap();
        assert_eq!(tick.compatibility, Some(Compatibility::Compatible));
    }

    #[test]
    fn mismatch_warns_and_keeps_watching() {
        let (ffx, ctx, mut watcher) = fixture();
        ffx.respond(LIST, UP).respond(SHOW, &show("8", "core", "arm64"));
        let step = WatchTarget::new();

        let tick = step.tick(&ctx, &mut watcher).unwrap();
        assert!(matches!(
            tick.compatibility,
            Some(Compatibility::Mismatch { ref observed_product, .. }) if observed_product == "core.arm64"
        ));
        assert_eq!(watcher.state(), WatchState::Registered);

        let next = step.tick(&ctx, &mut watcher).unwrap();
        assert_eq!(next.transition, Transition::Unchanged);
        assert_eq!(ffx.count(SHOW), 1);
    }

    #[test]
    fn unreachable_device_skips_compatibility_check() {
        let (ffx, ctx, mut watcher) = fixture();
        ffx.respond(LIST, UP).fail(WAIT);
        let tick = WatchTarget::new().tick(&ctx, &mut watcher).unwrap();
        assert_eq!(tick.transition, Transition::Appeared);
        assert_eq!(tick.compatibility, None);
        assert_eq!(ffx.count(SHOW), 0);
    }

    #[test]
    fn failed_registration_is_fatal() {
        let (ffx, ctx, mut watcher) = fixture();
        ffx.respond(LIST, UP).fail(REGISTER);
        let err = WatchTarget::new().tick(&ctx, &mut watcher).unwrap_err();
        assert!(matches!(err, WorkflowError::Command(_)));
    }

    #[test]
    fn run_returns_interrupted_once_signalled() {
        let (ffx, ctx, _) = fixture();
        ffx.respond(LIST, "[]");
        ctx.shutdown().trigger();

        let mut step = WatchTarget::with_interval(Duration::from_secs(3600));
        let err = step.run(&ctx).unwrap_err();
        assert!(matches!(err, WorkflowError::Interrupted));
        assert_eq!(ffx.count(LIST), 1);
    }
}
