use thiserror::Error;
use uuid::Uuid;

use super::attributes::Attributes;
use super::location::{Location, LocationReason, ValidLocation};
use super::name::{DisplayName, NameReason, ValidDisplayName, ValidSearchKey};

/// Why a graveyard could not be produced.
///
/// The `Display` text is what end users see. Storage failures deliberately
/// say nothing specific; the detail is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum GraveyardReason {
    #[error("graveyard name is missing")]
    NameNull,
    #[error("graveyard name is blank")]
    NameBlank,
    #[error("graveyard location is invalid: {0}")]
    Location(LocationReason),
    #[error("no graveyard matched that name")]
    NotFound,
    #[error("a graveyard with that name already exists")]
    Duplicate,
    #[error("graveyard safety time is out of range")]
    SafetyTime,
    #[error("an error occurred")]
    Storage,
}

impl From<NameReason> for GraveyardReason {
    fn from(reason: NameReason) -> Self {
        match reason {
            NameReason::Null => GraveyardReason::NameNull,
            NameReason::Blank => GraveyardReason::NameBlank,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidGraveyard {
    display_name: ValidDisplayName,
    attributes: Attributes,
    location: ValidLocation,
}

impl ValidGraveyard {
    pub fn new(display_name: ValidDisplayName, attributes: Attributes, location: ValidLocation) -> Self {
        Self {
            display_name,
            attributes,
            location,
        }
    }

    pub fn display_name(&self) -> &ValidDisplayName {
        &self.display_name
    }

    /// Derived on every call so it can never drift from the display name.
    pub fn search_key(&self) -> ValidSearchKey {
        self.display_name.to_search_key()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn location(&self) -> &ValidLocation {
        &self.location
    }

    pub fn world_name(&self) -> &str {
        self.location.world_name()
    }

    pub fn world_uid(&self) -> Uuid {
        self.location.world_uid()
    }

    pub fn with_display_name(self, display_name: ValidDisplayName) -> Self {
        Self {
            display_name,
            ..self
        }
    }

    pub fn with_attributes(self, attributes: Attributes) -> Self {
        Self { attributes, ..self }
    }

    /// Replace the attribute bundle through a `with_*` chain.
    pub fn map_attributes(self, f: impl FnOnce(Attributes) -> Attributes) -> Self {
        let attributes = f(self.attributes);
        Self { attributes, ..self }
    }

    pub fn with_location(self, location: ValidLocation) -> Self {
        Self { location, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidGraveyard {
    display_name: Option<String>,
    world_name: Option<String>,
    reason: GraveyardReason,
}

impl InvalidGraveyard {
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn world_name(&self) -> Option<&str> {
        self.world_name.as_deref()
    }

    pub fn reason(&self) -> GraveyardReason {
        self.reason
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Graveyard {
    Valid(ValidGraveyard),
    Invalid(InvalidGraveyard),
}

impl Graveyard {
    /// Compose a graveyard. The display name is checked first, then the location.
    pub fn of(display_name: DisplayName, attributes: Attributes, location: Location) -> Self {
        let world_name = location.world_name().map(str::to_string);
        let display_name = match display_name {
            DisplayName::Valid(name) => name,
            DisplayName::Invalid { raw, reason } => {
                return Graveyard::invalid(raw, world_name, reason.into());
            }
        };
        match location {
            Location::Valid(location) => {
                Graveyard::Valid(ValidGraveyard::new(display_name, attributes, location))
            }
            Location::Invalid { reason, .. } => Graveyard::invalid(
                Some(display_name.as_str().to_string()),
                world_name,
                GraveyardReason::Location(reason),
            ),
        }
    }

    /// "Create here": a name typed by an actor, the actor's current location and the configured defaults.
    pub fn create_here(name: Option<&str>, location: Location, defaults: &Attributes) -> Self {
        Self::of(DisplayName::of(name), defaults.clone(), location)
    }

    pub fn invalid(
        display_name: Option<String>,
        world_name: Option<String>,
        reason: GraveyardReason,
    ) -> Self {
        Graveyard::Invalid(InvalidGraveyard {
            display_name,
            world_name,
            reason,
        })
    }

    pub fn not_found(key: &ValidSearchKey) -> Self {
        Self::invalid(Some(key.as_str().to_string()), None, GraveyardReason::NotFound)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Graveyard::Valid(_))
    }

    pub fn as_valid(&self) -> Option<&ValidGraveyard> {
        match self {
            Graveyard::Valid(graveyard) => Some(graveyard),
            Graveyard::Invalid(_) => None,
        }
    }

    pub fn into_valid(self) -> Option<ValidGraveyard> {
        match self {
            Graveyard::Valid(graveyard) => Some(graveyard),
            Graveyard::Invalid(_) => None,
        }
    }

    pub fn reason(&self) -> Option<GraveyardReason> {
        match self {
            Graveyard::Valid(_) => None,
            Graveyard::Invalid(invalid) => Some(invalid.reason),
        }
    }
}
