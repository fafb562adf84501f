use thiserror::Error;
use uuid::Uuid;

use super::world::{World, WorldReason, WorldRef};

/// Why a location is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LocationReason {
    #[error("location is missing")]
    Null,
    #[error("{0}")]
    World(#[from] WorldReason),
}

/// Coordinates and facing within a world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self { x, y, z, yaw, pitch }
    }

    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, 0.0)
    }

    pub fn distance_squared(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// A position in a well-formed world. The world may be unloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidLocation {
    world: WorldRef,
    world_available: bool,
    position: Position,
}

impl ValidLocation {
    pub fn world(&self) -> &WorldRef {
        &self.world
    }

    pub fn world_name(&self) -> &str {
        self.world.name()
    }

    pub fn world_uid(&self) -> Uuid {
        self.world.uid()
    }

    pub fn is_world_available(&self) -> bool {
        self.world_available
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Squared distance to `other`, or `None` when the two are in different worlds.
    pub fn distance_squared(&self, other: &ValidLocation) -> Option<f64> {
        (self.world.uid() == other.world.uid())
            .then(|| self.position.distance_squared(&other.position))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Valid(ValidLocation),
    Invalid {
        world_name: Option<String>,
        reason: LocationReason,
    },
}

impl Location {
    pub fn of(world: World, position: Position) -> Self {
        match world {
            World::Available(world) => Location::Valid(ValidLocation {
                world,
                world_available: true,
                position,
            }),
            World::Unavailable(world) => Location::Valid(ValidLocation {
                world,
                world_available: false,
                position,
            }),
            World::Invalid { name, reason } => Location::Invalid {
                world_name: name,
                reason: reason.into(),
            },
        }
    }

    /// The host had no location to give.
    pub fn null() -> Self {
        Location::Invalid {
            world_name: None,
            reason: LocationReason::Null,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Location::Valid(_))
    }

    pub fn as_valid(&self) -> Option<&ValidLocation> {
        match self {
            Location::Valid(location) => Some(location),
            Location::Invalid { .. } => None,
        }
    }

    pub fn world_name(&self) -> Option<&str> {
        match self {
            Location::Valid(location) => Some(location.world_name()),
            Location::Invalid { world_name, .. } => world_name.as_deref(),
        }
    }
}
