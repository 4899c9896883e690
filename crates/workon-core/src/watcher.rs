//! Device presence tracking and the build compatibility check.
//!
//! [`DeviceWatcher`] is a pure state machine: it is fed device lists and
//! reports presence edges. The caller performs the side effects.

use serde::Deserialize;
use tracing::warn;

use crate::constants::{BOARD_VARIANT_SUFFIX, READY_STATE};

/// One entry of `ffx --machine json target list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetEntry {
    #[serde(default)]
    pub nodename: String,
    #[serde(default)]
    pub target_state: String,
}

impl TargetEntry {
    pub fn is_ready(&self) -> bool {
        self.target_state == READY_STATE
    }
}

/// Parses a device list. Malformed output counts as no devices.
pub fn parse_target_list(json: &str) -> Vec<TargetEntry> {
    if json.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!("ignoring malformed target list: {}", e);
        Vec::new()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// The repository has not been registered with the current device
    /// session.
    Unregistered,
    Registered,
}

/// Edge reported by [`DeviceWatcher::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The target became present: register and check compatibility.
    Appeared,
    /// The target went away. Nothing is unregistered.
    Lost,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct DeviceWatcher {
    target: String,
    state: WatchState,
    last_seen: Vec<TargetEntry>,
}

impl DeviceWatcher {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: WatchState::Unregistered,
            last_seen: Vec::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Devices reported by the most recent poll.
    pub fn last_seen(&self) -> &[TargetEntry] {
        &self.last_seen
    }

    /// The target is listed and has finished booting.
    pub fn is_present(&self, devices: &[TargetEntry]) -> bool {
        devices
            .iter()
            .any(|d| d.nodename == self.target && d.is_ready())
    }

    /// Records a poll and returns the resulting edge.
    pub fn observe(&mut self, devices: Vec<TargetEntry>) -> Transition {
        let present = self.is_present(&devices);
        self.last_seen = devices;

        match (self.state, present) {
            (WatchState::Unregistered, true) => {
                self.state = WatchState::Registered;
                Transition::Appeared
            }
            (WatchState::Registered, false) => {
                self.state = WatchState::Unregistered;
                Transition::Lost
            }
            _ => Transition::Unchanged,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetShow {
    pub build: BuildInfo,
}

/// Build identity reported by `target show`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub board: String,
}

impl BuildInfo {
    /// `<product>.<board>`, the form product bundles are named by.
    pub fn product_board(&self) -> String {
        format!("{}.{}", self.product, self.board)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Mismatch {
        expected_sdk: String,
        observed_sdk: String,
        expected_product: String,
        observed_product: String,
    },
}

/// Compares a device's build against the bundle being served.
///
/// `-dfv2` board variants are the same board, so the suffix is ignored on
/// both sides.
pub fn check_compatibility(
    expected_sdk: &str,
    expected_product: &str,
    build: &BuildInfo,
) -> Compatibility {
    let observed_product = build.product_board();
    if expected_sdk == build.version
        && strip_variant(expected_product) == strip_variant(&observed_product)
    {
        return Compatibility::Compatible;
    }
    Compatibility::Mismatch {
        expected_sdk: expected_sdk.to_string(),
        observed_sdk: build.version.clone(),
        expected_product: expected_product.to_string(),
        observed_product,
    }
}

fn strip_variant(name: &str) -> &str {
    name.strip_suffix(BOARD_VARIANT_SUFFIX).unwrap_or(name)
}
