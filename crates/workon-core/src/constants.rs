//! Constants used across the work-on workspace.

use std::time::Duration;

/// The marker file anchoring a project root.
pub const ENV_FILE: &str = "fuchsia_env.toml";

/// `fuchsia.project` entry naming the build config (settings) file.
pub const KEY_BUILD_CONFIG_PATH: &str = "build_config_path";

/// `fuchsia.project` entry naming the build output directory.
pub const KEY_BUILD_OUT_DIR: &str = "build_out_dir";

/// Output directory used when the marker file does not name one.
pub const DEFAULT_OUT_DIR: &str = "out";

/// Target name used when neither an override nor the tool can provide one.
pub const DEFAULT_TARGET: &str = "fuchsia-emulator";

/// The package repository registered on the device.
pub const DEFAULT_REPOSITORY: &str = "devhost.fuchsia.com";

/// Aliases bound to [`DEFAULT_REPOSITORY`] at registration time.
pub const REPOSITORY_ALIASES: [&str; 2] = ["fuchsia.com", "chromium.org"];

/// Prefix of the bucket product bundles are looked up in.
pub const BUNDLE_BASE_URL: &str = "gs://fuchsia/development";

/// `target_state` reported by a device that finished booting.
pub const READY_STATE: &str = "Product";

/// Board variant suffix ignored by the compatibility check.
pub const BOARD_VARIANT_SUFFIX: &str = "-dfv2";

/// Delay between two device list queries.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Seconds `target wait` is given before the compatibility check gives up.
pub const TARGET_WAIT_TIMEOUT_SECS: u32 = 60;
