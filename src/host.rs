//! Boundary to the hosting game server.
//!
//! The host owns actors, worlds and permissions; this crate only reads them
//! through these traits. Rendering notices into localized text is also the
//! host's job, so [`Notice`] carries data, not strings.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::model::{Location, ValidDisplayName, ValidGraveyard, WorldDirectory};

/// Capability required for the discovery scan to consider an actor.
pub const DISCOVER_PERMISSION: &str = "graveyard.discover";
/// Capability required to be sent to a graveyard on respawn.
pub const RESPAWN_PERMISSION: &str = "graveyard.respawn";

/// Permission an actor needs to use graveyards restricted to `group`.
pub fn group_permission(group: &str) -> String {
    format!("group.{}", group)
}

/// A connected player as seen at one instant.
pub trait Actor: Send + Sync {
    fn uid(&self) -> Uuid;
    fn name(&self) -> String;
    fn location(&self) -> Location;
    fn has_permission(&self, permission: &str) -> bool;
}

/// True when the graveyard is unrestricted or the actor holds its group permission.
pub fn may_use(actor: &dyn Actor, graveyard: &ValidGraveyard) -> bool {
    match graveyard.attributes().permission_group() {
        None => true,
        Some(group) => actor.has_permission(&group_permission(group)),
    }
}

pub trait Host: WorldDirectory {
    fn online_actors(&self) -> Vec<Arc<dyn Actor>>;
    /// Whether graveyards are active in this world at all.
    fn is_world_enabled(&self, world_uid: &Uuid) -> bool;
}

/// Something the host should tell an actor about. Custom messages are `None`
/// when the graveyard uses the default text.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Discovered {
        graveyard: ValidDisplayName,
        message: Option<String>,
    },
    Respawned {
        graveyard: ValidDisplayName,
        message: Option<String>,
    },
    SafetyStarted {
        duration: Duration,
    },
    SafetyExpired,
}

/// Emitted once for each newly recorded discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryEvent {
    pub actor: Uuid,
    pub graveyard: ValidGraveyard,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, actor: Uuid, notice: Notice);

    /// Signal for other subsystems; ignored unless the host cares.
    fn discovered(&self, _event: DiscoveryEvent) {}
}
