//! Respawn safety: a short protection window after an actor respawns at a
//! graveyard.
//!
//! Each protected actor has exactly one entry holding the handle of its expiry
//! task. Installing a new entry aborts the old task under the same lock, so
//! re-entering safety restarts the window instead of stacking two expiries.
//! Entries carry a generation number; an expiry task only removes the entry it
//! created.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::host::{Notice, Notifier};
use crate::model::ValidGraveyard;

/// `[safety]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    /// Used for graveyards whose safety time is negative. Zero turns those off.
    pub default_duration_seconds: i64,
    /// Used for graveyards whose safety range is negative.
    pub default_range: i32,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            default_duration_seconds: 15,
            default_range: 16,
        }
    }
}

struct SafetyEntry {
    generation: u64,
    expires_at: Instant,
    range: i32,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    next_generation: u64,
    entries: HashMap<Uuid, SafetyEntry>,
}

pub struct SafetyManager {
    registry: Arc<Mutex<Registry>>,
    notifier: Arc<dyn Notifier>,
    settings: SafetySettings,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SafetyManager {
    pub fn new(notifier: Arc<dyn Notifier>, settings: SafetySettings) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            notifier,
            settings,
        }
    }

    /// Protect `actor` for the graveyard's safety time. Returns the window that
    /// was started, or `None` when safety is off for this graveyard or no
    /// runtime is available.
    pub fn put(&self, actor: Uuid, graveyard: &ValidGraveyard) -> Option<Duration> {
        let attributes = graveyard.attributes();
        let configured = attributes.safety_time();
        if configured.is_zero() {
            return None;
        }
        let duration = if configured < Duration::zero() {
            let Some(default) = Duration::try_seconds(self.settings.default_duration_seconds) else {
                warn!(
                    "respawn safety off: default duration {}s is out of range",
                    self.settings.default_duration_seconds
                );
                return None;
            };
            default
        } else {
            configured
        };
        let period = duration.to_std().ok().filter(|p| !p.is_zero())?;
        let runtime = super::runtime("respawn safety")?;
        let range = attributes.effective_safety_range(self.settings.default_range);

        {
            let mut registry = lock(&self.registry);
            registry.next_generation += 1;
            let generation = registry.next_generation;

            let shared = Arc::clone(&self.registry);
            let notifier = Arc::clone(&self.notifier);
            let handle = runtime.spawn(async move {
                tokio::time::sleep(period).await;
                let expired = {
                    let mut registry = lock(&shared);
                    match registry.entries.get(&actor) {
                        Some(entry) if entry.generation == generation => {
                            registry.entries.remove(&actor);
                            true
                        }
                        _ => false,
                    }
                };
                if expired {
                    debug!("respawn safety expired for {}", actor);
                    notifier.notify(actor, Notice::SafetyExpired);
                }
            });

            let entry = SafetyEntry {
                generation,
                expires_at: Instant::now() + period,
                range,
                handle,
            };
            if let Some(previous) = registry.entries.insert(actor, entry) {
                previous.handle.abort();
                debug!("respawn safety restarted for {}", actor);
            }
        }

        self.notifier.notify(actor, Notice::SafetyStarted { duration });
        Some(duration)
    }

    /// End protection early. Returns false when the actor was not protected.
    pub fn remove(&self, actor: Uuid) -> bool {
        match lock(&self.registry).entries.remove(&actor) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_protected(&self, actor: Uuid) -> bool {
        lock(&self.registry).entries.contains_key(&actor)
    }

    pub fn remaining(&self, actor: Uuid) -> Option<std::time::Duration> {
        lock(&self.registry)
            .entries
            .get(&actor)
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Whether a hostile that is `attacker_distance_squared` away should drop
    /// `actor` as a target. A negative safety range covers any distance.
    pub fn should_cancel_targeting(&self, actor: Uuid, attacker_distance_squared: f64) -> bool {
        match lock(&self.registry).entries.get(&actor) {
            None => false,
            Some(entry) if entry.range < 0 => true,
            Some(entry) => {
                let range = f64::from(entry.range);
                attacker_distance_squared <= range * range
            }
        }
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

impl Drop for SafetyManager {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.registry).entries.drain() {
            entry.handle.abort();
        }
    }
}
