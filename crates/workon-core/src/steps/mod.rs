//! The four stages of a work-on run.

mod fetch_bundle;
mod set_defaults;
mod startup;
mod watch_target;

pub use fetch_bundle::FetchBundle;
pub use set_defaults::SetDefaults;
pub use startup::Startup;
pub use watch_target::WatchTarget;
