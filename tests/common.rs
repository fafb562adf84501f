//! Test utilities & fixtures: an in-memory host, scripted actors and a notifier
//! that records everything it is told.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use graveyards::host::{Actor, DiscoveryEvent, Host, Notice, Notifier, DISCOVER_PERMISSION, RESPAWN_PERMISSION};
use graveyards::model::{
    Attributes, Graveyard, Location, Position, ValidGraveyard, World, WorldDirectory,
};
use graveyards::store::{GraveyardStore, GraveyardStoreBuilder};
use uuid::Uuid;

pub const OVERWORLD: &str = "overworld";
pub const NETHER: &str = "nether";

pub fn world_uid(name: &str) -> Uuid {
    match name {
        OVERWORLD => Uuid::from_u128(0x1111_0000_0000_0000_0000_0000_0000_0001),
        NETHER => Uuid::from_u128(0x2222_0000_0000_0000_0000_0000_0000_0002),
        _ => Uuid::from_u128(0x9999_0000_0000_0000_0000_0000_0000_0009),
    }
}

pub fn location(world: &str, x: f64, y: f64, z: f64) -> Location {
    Location::of(World::loaded(world, world_uid(world)), Position::at(x, y, z))
}

/// Attributes for a graveyard that is visible without being discovered.
pub fn visible() -> Attributes {
    Attributes::default().with_hidden(false)
}

pub fn graveyard(name: &str, world: &str, x: f64, attributes: Attributes) -> ValidGraveyard {
    Graveyard::create_here(Some(name), location(world, x, 64.0, 0.0), &attributes)
        .into_valid()
        .expect("fixture graveyard is valid")
}

/// A throwaway store; keep the `TempDir` alive for the duration of the test.
pub fn temp_store() -> (tempfile::TempDir, Arc<GraveyardStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = GraveyardStoreBuilder::new(dir.path().join("graveyards.db"))
        .open()
        .expect("open store");
    (dir, Arc::new(store))
}

pub struct FakeActor {
    uid: Uuid,
    name: String,
    location: Mutex<Location>,
    permissions: Mutex<HashSet<String>>,
}

impl FakeActor {
    /// An actor holding the discover and respawn permissions.
    pub fn new(name: &str, location: Location) -> Arc<Self> {
        let permissions = [DISCOVER_PERMISSION, RESPAWN_PERMISSION]
            .into_iter()
            .map(str::to_string)
            .collect();
        Arc::new(Self {
            uid: Uuid::new_v4(),
            name: name.to_string(),
            location: Mutex::new(location),
            permissions: Mutex::new(permissions),
        })
    }

    pub fn move_to(&self, location: Location) {
        *self.location.lock().unwrap() = location;
    }

    pub fn grant(&self, permission: &str) {
        self.permissions.lock().unwrap().insert(permission.to_string());
    }

    pub fn revoke(&self, permission: &str) {
        self.permissions.lock().unwrap().remove(permission);
    }
}

impl Actor for FakeActor {
    fn uid(&self) -> Uuid {
        self.uid
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn location(&self) -> Location {
        self.location.lock().unwrap().clone()
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.lock().unwrap().contains(permission)
    }
}

#[derive(Default)]
pub struct FakeHost {
    actors: Mutex<Vec<Arc<dyn Actor>>>,
    disabled_worlds: Mutex<HashSet<Uuid>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn join(&self, actor: Arc<FakeActor>) {
        self.actors.lock().unwrap().push(actor);
    }

    pub fn disable_world(&self, world: &str) {
        self.disabled_worlds.lock().unwrap().insert(world_uid(world));
    }
}

impl WorldDirectory for FakeHost {
    fn is_loaded(&self, _uid: &Uuid) -> bool {
        true
    }
}

impl Host for FakeHost {
    fn online_actors(&self) -> Vec<Arc<dyn Actor>> {
        self.actors.lock().unwrap().clone()
    }

    fn is_world_enabled(&self, world_uid: &Uuid) -> bool {
        !self.disabled_worlds.lock().unwrap().contains(world_uid)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(Uuid, Notice)>>,
    events: Mutex<Vec<DiscoveryEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<(Uuid, Notice)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Notice) -> bool) -> usize {
        self.notices.lock().unwrap().iter().filter(|(_, n)| matches(n)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, actor: Uuid, notice: Notice) {
        self.notices.lock().unwrap().push((actor, notice));
    }

    fn discovered(&self, event: DiscoveryEvent) {
        self.events.lock().unwrap().push(event);
    }
}
