//! Picks where a dead actor comes back and starts their safety window.

use std::sync::Arc;

use log::info;

use crate::host::{Actor, Host, Notice, Notifier, RESPAWN_PERMISSION};
use crate::logutil::escape_name;
use crate::model::ValidGraveyard;
use crate::store::GraveyardStore;
use crate::tasks::SafetyManager;

pub struct RespawnPlanner {
    store: Arc<GraveyardStore>,
    host: Arc<dyn Host>,
    notifier: Arc<dyn Notifier>,
    safety: Arc<SafetyManager>,
}

impl RespawnPlanner {
    pub fn new(
        store: Arc<GraveyardStore>,
        host: Arc<dyn Host>,
        notifier: Arc<dyn Notifier>,
        safety: Arc<SafetyManager>,
    ) -> Self {
        Self {
            store,
            host,
            notifier,
            safety,
        }
    }

    /// The graveyard `actor` should respawn at, given where they died. `None`
    /// leaves the host's own respawn point in place.
    pub fn on_respawn(&self, actor: &dyn Actor) -> Option<ValidGraveyard> {
        let location = actor.location();
        let world = location.as_valid()?.world_uid();
        if !self.host.is_world_enabled(&world) || !actor.has_permission(RESPAWN_PERMISSION) {
            return None;
        }

        let graveyard = self.store.nearest(actor)?;
        info!(
            "Respawning {} at graveyard '{}'",
            actor.name(),
            escape_name(graveyard.display_name().as_str())
        );
        self.notifier.notify(
            actor.uid(),
            Notice::Respawned {
                graveyard: graveyard.display_name().clone(),
                message: graveyard.attributes().respawn_message().map(str::to_string),
            },
        );
        self.safety.put(actor.uid(), &graveyard);
        Some(graveyard)
    }
}
