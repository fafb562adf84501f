use thiserror::Error;
use uuid::Uuid;

/// Why a world reference is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum WorldReason {
    #[error("world name is missing")]
    NameNull,
    #[error("world name is blank")]
    NameBlank,
    #[error("world id is missing")]
    UidNull,
}

/// Answers whether the host currently has a world loaded.
pub trait WorldDirectory: Send + Sync {
    fn is_loaded(&self, uid: &Uuid) -> bool;
}

/// Directory that reports every world as loaded. Used by offline tooling
/// that has no host to ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryWorldLoaded;

impl WorldDirectory for EveryWorldLoaded {
    fn is_loaded(&self, _uid: &Uuid) -> bool {
        true
    }
}

/// A well-formed world name and id pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorldRef {
    name: String,
    uid: Uuid,
}

impl WorldRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }
}

/// World identity with a snapshot of its load state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum World {
    Available(WorldRef),
    Unavailable(WorldRef),
    Invalid {
        name: Option<String>,
        reason: WorldReason,
    },
}

impl World {
    /// Validate a name/id pair and ask `directory` whether it is loaded.
    /// The nil uuid counts as a missing id.
    pub fn of(name: Option<&str>, uid: Option<Uuid>, directory: &dyn WorldDirectory) -> Self {
        let name = match name {
            None => {
                return World::Invalid {
                    name: None,
                    reason: WorldReason::NameNull,
                }
            }
            Some(n) if n.trim().is_empty() => {
                return World::Invalid {
                    name: Some(n.to_string()),
                    reason: WorldReason::NameBlank,
                }
            }
            Some(n) => n.to_string(),
        };
        let uid = match uid {
            Some(uid) if !uid.is_nil() => uid,
            _ => {
                return World::Invalid {
                    name: Some(name),
                    reason: WorldReason::UidNull,
                }
            }
        };
        let world = WorldRef { name, uid };
        if directory.is_loaded(&uid) {
            World::Available(world)
        } else {
            World::Unavailable(world)
        }
    }

    /// A world the host reports as currently loaded, e.g. the one an online actor stands in.
    pub fn loaded(name: &str, uid: Uuid) -> Self {
        Self::of(Some(name), Some(uid), &EveryWorldLoaded)
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, World::Invalid { .. })
    }

    pub fn is_available(&self) -> bool {
        matches!(self, World::Available(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            World::Available(w) | World::Unavailable(w) => Some(w.name()),
            World::Invalid { name, .. } => name.as_deref(),
        }
    }

    pub fn reference(&self) -> Option<&WorldRef> {
        match self {
            World::Available(w) | World::Unavailable(w) => Some(w),
            World::Invalid { .. } => None,
        }
    }
}
