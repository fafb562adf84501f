//! Validated graveyard domain model.
//!
//! Every factory here is total: bad input produces the `Invalid` variant of the
//! type with a reason, never a panic. Operations that only make sense on good
//! data (deriving a search key, writing a row) live on the `Valid*` types, so
//! callers must match before using them.

pub mod attributes;
pub mod discovery;
pub mod graveyard;
pub mod location;
pub mod name;
pub mod world;

pub use attributes::Attributes;
pub use discovery::{Discovery, DiscoveryReason, ValidDiscovery};
pub use graveyard::{Graveyard, GraveyardReason, InvalidGraveyard, ValidGraveyard};
pub use location::{Location, LocationReason, Position, ValidLocation};
pub use name::{
    normalize_prefix, strip_markup, DisplayName, NameReason, SearchKey, ValidDisplayName,
    ValidSearchKey,
};
pub use world::{EveryWorldLoaded, World, WorldDirectory, WorldReason, WorldRef};
