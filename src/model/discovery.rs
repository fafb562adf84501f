use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::name::{NameReason, SearchKey, ValidSearchKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DiscoveryReason {
    #[error("graveyard key: {0}")]
    Key(NameReason),
    #[error("actor id is missing")]
    ActorNull,
}

/// Record that an actor has found a graveyard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDiscovery {
    search_key: ValidSearchKey,
    actor: Uuid,
    timestamp: DateTime<Utc>,
}

impl ValidDiscovery {
    pub fn search_key(&self) -> &ValidSearchKey {
        &self.search_key
    }

    pub fn actor(&self) -> Uuid {
        self.actor
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Valid(ValidDiscovery),
    Invalid(DiscoveryReason),
}

impl Discovery {
    pub fn of(search_key: SearchKey, actor: Option<Uuid>, timestamp: DateTime<Utc>) -> Self {
        let search_key = match search_key.into_valid() {
            Ok(key) => key,
            Err(reason) => return Discovery::Invalid(DiscoveryReason::Key(reason)),
        };
        match actor {
            Some(actor) if !actor.is_nil() => Discovery::Valid(ValidDiscovery {
                search_key,
                actor,
                timestamp,
            }),
            _ => Discovery::Invalid(DiscoveryReason::ActorNull),
        }
    }

    /// Discovery stamped with the current time.
    pub fn now(search_key: &ValidSearchKey, actor: Uuid) -> Self {
        Self::of(SearchKey::Valid(search_key.clone()), Some(actor), Utc::now())
    }

    pub fn into_valid(self) -> Result<ValidDiscovery, DiscoveryReason> {
        match self {
            Discovery::Valid(discovery) => Ok(discovery),
            Discovery::Invalid(reason) => Err(reason),
        }
    }
}
