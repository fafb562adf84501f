//! Recurring discovery scan.
//!
//! Each run looks at every online actor, finds the graveyards in the actor's
//! world they have not discovered yet, and records the ones the actor is
//! standing close enough to. The scan keeps no state between runs; the store
//! is the only memory.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::host::{may_use, Actor, DiscoveryEvent, Host, Notice, Notifier, DISCOVER_PERMISSION};
use crate::logutil::escape_name;
use crate::model::Discovery;
use crate::store::{DiscoveryOutcome, GraveyardStore};

/// `[discovery]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Seconds between scans; zero or negative turns the scan off.
    pub interval_seconds: i64,
    /// Radius in blocks for graveyards whose own radius is negative.
    pub default_range: i32,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            default_range: 20,
        }
    }
}

impl DiscoverySettings {
    pub fn interval(&self) -> Option<Duration> {
        u64::try_from(self.interval_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// One pass of the scan, runnable on its own for tests and manual triggers.
pub struct DiscoveryScan {
    store: Arc<GraveyardStore>,
    host: Arc<dyn Host>,
    notifier: Arc<dyn Notifier>,
}

impl DiscoveryScan {
    pub fn new(store: Arc<GraveyardStore>, host: Arc<dyn Host>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            host,
            notifier,
        }
    }

    /// Scan every online actor; returns the number of discoveries recorded.
    pub fn run(&self, default_range: i32) -> usize {
        self.host
            .online_actors()
            .iter()
            .map(|actor| self.scan_actor(actor.as_ref(), default_range))
            .sum()
    }

    pub fn scan_actor(&self, actor: &dyn Actor, default_range: i32) -> usize {
        let location = actor.location();
        let Some(location) = location.as_valid() else {
            return 0;
        };
        if !self.host.is_world_enabled(&location.world_uid())
            || !actor.has_permission(DISCOVER_PERMISSION)
        {
            return 0;
        }

        let mut recorded = 0;
        for graveyard in self.store.undiscovered(actor) {
            let range = graveyard.attributes().effective_discovery_range(default_range);
            if range < 0 {
                continue;
            }
            let range = f64::from(range);
            match location.distance_squared(graveyard.location()) {
                Some(distance_squared) if distance_squared <= range * range => {}
                _ => continue,
            }
            if !may_use(actor, &graveyard) {
                continue;
            }

            let discovery = match Discovery::now(&graveyard.search_key(), actor.uid()).into_valid() {
                Ok(discovery) => discovery,
                Err(reason) => {
                    warn!("Skipping discovery for {}: {}", actor.uid(), reason);
                    continue;
                }
            };
            match self.store.discover(&discovery) {
                DiscoveryOutcome::Recorded => {
                    info!(
                        "{} discovered graveyard '{}'",
                        actor.name(),
                        escape_name(graveyard.display_name().as_str())
                    );
                    self.notifier.notify(
                        actor.uid(),
                        Notice::Discovered {
                            graveyard: graveyard.display_name().clone(),
                            message: graveyard.attributes().discovery_message().map(str::to_string),
                        },
                    );
                    self.notifier.discovered(DiscoveryEvent {
                        actor: actor.uid(),
                        graveyard,
                    });
                    recorded += 1;
                }
                DiscoveryOutcome::AlreadyKnown | DiscoveryOutcome::Failed => {}
            }
        }
        recorded
    }
}

/// Owns the recurring scan task.
pub struct DiscoveryTask {
    scan: Arc<DiscoveryScan>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryTask {
    pub fn new(scan: Arc<DiscoveryScan>) -> Self {
        Self {
            scan,
            handle: Mutex::new(None),
        }
    }

    /// Start scanning with `settings`, replacing any running task. Returns
    /// false when the interval turns the scan off or no runtime is available.
    pub fn start(&self, settings: &DiscoverySettings) -> bool {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let Some(period) = settings.interval() else {
            info!(
                "Discovery scan off (interval {}s)",
                settings.interval_seconds
            );
            return false;
        };
        let Some(runtime) = super::runtime("discovery scan") else {
            return false;
        };

        let scan = Arc::clone(&self.scan);
        let default_range = settings.default_range;
        *slot = Some(runtime.spawn(async move {
            let Some(first) = Instant::now().checked_add(period) else {
                error!("Discovery scan off: interval {}s is out of range", period.as_secs());
                return;
            };
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let recorded = scan.run(default_range);
                if recorded > 0 {
                    debug!("discovery scan recorded {} discoveries", recorded);
                }
            }
        }));
        info!("Discovery scan every {}s", period.as_secs());
        true
    }

    /// Stop future runs. A run already in progress finishes first because the
    /// scan body has no await point. Safe to call when nothing is running.
    pub fn cancel(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            info!("Discovery scan cancelled");
        }
    }

    /// Cancel, then start again with fresh settings.
    pub fn reload(&self, settings: &DiscoverySettings) -> bool {
        self.cancel();
        self.start(settings)
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DiscoveryTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
