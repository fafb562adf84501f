//! Time-driven subsystems: the recurring discovery scan and per-actor safety
//! timers. Both run as tokio tasks and are cancelled through
//! `JoinHandle::abort`.

pub mod discovery;
pub mod safety;

pub use discovery::{DiscoveryScan, DiscoverySettings, DiscoveryTask};
pub use safety::{SafetySettings, SafetyManager};

use log::error;
use tokio::runtime::Handle;

/// Runtime to spawn on, or `None` (logged) when called outside tokio.
pub(crate) fn runtime(feature: &str) -> Option<Handle> {
    match Handle::try_current() {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("{} disabled: no async runtime available ({})", feature, e);
            None
        }
    }
}
