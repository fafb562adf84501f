mod common;

use chrono::Duration;
use common::{graveyard, location, temp_store, visible, FakeActor, NETHER, OVERWORLD};
use graveyards::model::{
    Attributes, Discovery, DisplayName, Graveyard, GraveyardReason, SearchKey, ValidSearchKey,
};

fn key(text: &str) -> ValidSearchKey {
    SearchKey::of(Some(text)).into_valid().expect("valid key")
}

#[test]
fn save_then_get_returns_equal_graveyard() {
    let (_dir, store) = temp_store();
    let attributes = Attributes::default()
        .with_hidden(false)
        .with_discovery_range(12)
        .with_discovery_message("You found the &6chapel")
        .with_respawn_message("Rise again")
        .with_permission_group("pilgrims")
        .with_safety_range(6)
        .with_safety_time(Duration::seconds(30));
    let original = graveyard("&eOld Chapel", OVERWORLD, 42.5, attributes);

    let saved = store.save(&original);
    assert_eq!(saved.as_valid(), Some(&original));

    let fetched = store.get(&key("Old_Chapel"));
    assert_eq!(fetched.as_valid(), Some(&original));
    assert_eq!(store.count(), 1);
    assert!(store.exists(&key("old_chapel")));
}

#[test]
fn missing_key_is_not_found() {
    let (_dir, store) = temp_store();
    let result = store.get(&key("Nowhere"));
    assert_eq!(result.reason(), Some(GraveyardReason::NotFound));
}

#[test]
fn saving_an_existing_key_is_a_duplicate() {
    let (_dir, store) = temp_store();
    assert!(store.save(&graveyard("Old Town", OVERWORLD, 0.0, visible())).is_valid());

    // differs only by markup and case: same key under case-insensitive comparison
    let again = store.save(&graveyard("&aold town", NETHER, 5.0, visible()));
    assert_eq!(again.reason(), Some(GraveyardReason::Duplicate));
    assert_eq!(store.count(), 1);
    assert_eq!(
        store.get(&key("Old_Town")).as_valid().map(|g| g.world_name().to_string()),
        Some(OVERWORLD.to_string())
    );
}

#[test]
fn save_all_counts_partial_success() {
    let (_dir, store) = temp_store();
    let batch = vec![
        graveyard("North", OVERWORLD, 0.0, visible()),
        graveyard("South", OVERWORLD, 10.0, visible()),
        graveyard("north", OVERWORLD, 20.0, visible()),
    ];
    assert_eq!(store.save_all(&batch), 2);
    assert_eq!(store.get_all().len(), 2);
}

#[test]
fn update_returns_previous_and_moves_discoveries_on_rename() {
    let (_dir, store) = temp_store();
    let actor = FakeActor::new("ada", location(OVERWORLD, 0.0, 64.0, 0.0));
    let original = graveyard("Hill Top", OVERWORLD, 3.0, Attributes::default());
    store.save(&original);
    let discovery = Discovery::now(&original.search_key(), actor_uid(&actor))
        .into_valid()
        .expect("valid discovery");
    store.discover(&discovery);

    let renamed = original
        .clone()
        .with_display_name(DisplayName::of(Some("Summit")).into_valid().expect("valid"))
        .map_attributes(|a| a.with_hidden(false));
    let previous = store.update(&key("Hill_Top"), &renamed);

    assert_eq!(previous.as_valid(), Some(&original));
    assert_eq!(store.get(&key("Hill_Top")).reason(), Some(GraveyardReason::NotFound));
    assert_eq!(store.get(&key("Summit")).as_valid(), Some(&renamed));
    assert!(store.is_discovered(&key("Summit"), actor_uid(&actor)));
    assert!(!store.is_discovered(&key("Hill_Top"), actor_uid(&actor)));
}

#[test]
fn update_onto_another_key_is_a_duplicate() {
    let (_dir, store) = temp_store();
    let first = graveyard("First", OVERWORLD, 0.0, visible());
    store.save(&first);
    store.save(&graveyard("Second", OVERWORLD, 5.0, visible()));

    let clash = first
        .clone()
        .with_display_name(DisplayName::of(Some("second")).into_valid().expect("valid"));
    let result = store.update(&key("First"), &clash);
    assert_eq!(result.reason(), Some(GraveyardReason::Duplicate));
    assert_eq!(store.get(&key("First")).as_valid(), Some(&first));
}

#[test]
fn update_of_missing_key_is_not_found() {
    let (_dir, store) = temp_store();
    let result = store.update(&key("Ghost"), &graveyard("Ghost", OVERWORLD, 0.0, visible()));
    assert_eq!(result.reason(), Some(GraveyardReason::NotFound));
    assert_eq!(store.count(), 0);
}

#[test]
fn delete_returns_deleted_row_and_drops_its_discoveries() {
    let (_dir, store) = temp_store();
    let actor = FakeActor::new("bo", location(OVERWORLD, 0.0, 64.0, 0.0));
    let target = graveyard("Crypt", OVERWORLD, 1.0, Attributes::default());
    store.save(&target);
    let discovery = Discovery::now(&target.search_key(), actor_uid(&actor))
        .into_valid()
        .expect("valid discovery");
    store.discover(&discovery);

    let deleted = store.delete(&key("crypt"));
    assert_eq!(deleted.as_valid(), Some(&target));
    assert_eq!(store.count(), 0);
    assert!(store.discovered_keys(actor_uid(&actor)).is_empty());

    let again = store.delete(&key("Crypt"));
    assert_eq!(again.reason(), Some(GraveyardReason::NotFound));
}

#[test]
fn prefix_matching_ignores_case_and_treats_spaces_as_underscores() {
    let (_dir, store) = temp_store();
    store.save_all(&[
        graveyard("Old Town", OVERWORLD, 0.0, visible()),
        graveyard("&cOld Mill", OVERWORLD, 10.0, visible()),
        graveyard("New Town", OVERWORLD, 20.0, visible()),
        graveyard("Old_Fort 100%", OVERWORLD, 30.0, visible()),
    ]);

    assert_eq!(
        store.matching_keys(Some("old t")),
        vec!["Old_Town".to_string()]
    );
    assert_eq!(store.matching_keys(Some("OLD")).len(), 3);
    assert_eq!(store.matching_keys(None).len(), 4);
    assert_eq!(store.matching_keys(Some("")).len(), 4);
    // LIKE wildcards in the prefix are matched literally
    assert!(store.matching_keys(Some("%")).is_empty());
    assert_eq!(store.matching_keys(Some("Old_Fort_100%")).len(), 1);

    let names = store.matching_names(Some("old m"));
    assert_eq!(names, vec!["Old Mill".to_string()]);
}

#[test]
fn data_survives_reopening() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("graveyards.db");
    let chapel = graveyard("Chapel", OVERWORLD, 7.0, visible());
    {
        let store = graveyards::store::GraveyardStore::open(&path).expect("open");
        store.save(&chapel);
    }
    let store = graveyards::store::GraveyardStore::open(&path).expect("reopen");
    assert!(store.migration_report().is_none());
    assert_eq!(store.get(&key("Chapel")).as_valid(), Some(&chapel));
}

#[test]
fn damaged_safety_time_is_read_back_as_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("graveyards.db");
    {
        let store = graveyards::store::GraveyardStore::open(&path).expect("open");
        store.save(&graveyard("Chapel", OVERWORLD, 0.0, visible()));
        store.save(&graveyard("Mill", OVERWORLD, 30.0, visible()));
    }
    {
        let conn = rusqlite::Connection::open(&path).expect("raw open");
        conn.execute(
            "UPDATE graveyards SET safety_time = ?1 WHERE search_key = 'Chapel'",
            [i64::MAX],
        )
        .expect("damage row");
    }

    let store = graveyards::store::GraveyardStore::open(&path).expect("reopen");
    let all = store.get_all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].reason(), Some(GraveyardReason::SafetyTime));
    let Graveyard::Invalid(damaged) = &all[0] else {
        panic!("expected invalid graveyard");
    };
    assert_eq!(damaged.display_name(), Some("Chapel"));
    assert_eq!(damaged.world_name(), Some(OVERWORLD));
    assert!(all[1].is_valid());

    assert_eq!(store.get(&key("Chapel")).reason(), Some(GraveyardReason::SafetyTime));
    let actor = FakeActor::new("ada", location(OVERWORLD, 1.0, 64.0, 0.0));
    let nearest = store.nearest(actor.as_ref()).expect("undamaged graveyard");
    assert_eq!(nearest.search_key().as_str(), "Mill");
    let undiscovered: Vec<_> = store
        .undiscovered(actor.as_ref())
        .iter()
        .map(|g| g.search_key().as_str().to_string())
        .collect();
    assert_eq!(undiscovered, vec!["Mill".to_string()]);
}

#[test]
fn case_folding_of_keys_covers_ascii_only() {
    let (_dir, store) = temp_store();
    assert!(store.save(&graveyard("Ärger", OVERWORLD, 0.0, visible())).is_valid());
    assert!(store.save(&graveyard("ärger", OVERWORLD, 5.0, visible())).is_valid());
    assert_eq!(store.count(), 2);
    assert_eq!(store.matching_keys(Some("är")), vec!["ärger".to_string()]);
}

fn actor_uid(actor: &FakeActor) -> uuid::Uuid {
    use graveyards::host::Actor;
    actor.uid()
}

#[test]
fn invalid_graveyards_never_reach_the_store() {
    let unnamed = Graveyard::create_here(Some("   "), location(OVERWORLD, 0.0, 0.0, 0.0), &visible());
    assert_eq!(unnamed.reason(), Some(GraveyardReason::NameBlank));
    assert!(unnamed.into_valid().is_none());
}
