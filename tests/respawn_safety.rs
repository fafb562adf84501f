mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use common::{graveyard, location, temp_store, visible, FakeActor, FakeHost, RecordingNotifier, OVERWORLD};
use graveyards::host::{Actor, Notice, RESPAWN_PERMISSION};
use graveyards::respawn::RespawnPlanner;
use graveyards::tasks::{SafetyManager, SafetySettings};
use tokio::time::sleep;

fn expired(notifier: &RecordingNotifier) -> usize {
    notifier.count(|n| matches!(n, Notice::SafetyExpired))
}

#[tokio::test(start_paused = true)]
async fn reentering_safety_restarts_the_single_timer() {
    let notifier = RecordingNotifier::new();
    let manager = SafetyManager::new(notifier.clone(), SafetySettings::default());
    let actor = uuid::Uuid::new_v4();
    let chapel = graveyard("Chapel", OVERWORLD, 0.0, visible().with_safety_time(Duration::seconds(5)));

    assert_eq!(manager.put(actor, &chapel), Some(Duration::seconds(5)));
    sleep(StdDuration::from_secs(3)).await;
    assert_eq!(manager.put(actor, &chapel), Some(Duration::seconds(5)));
    assert_eq!(manager.active_count(), 1);
    assert_eq!(manager.remaining(actor), Some(StdDuration::from_secs(5)));

    // past the first window: the replaced timer must not fire
    sleep(StdDuration::from_secs(4)).await;
    assert!(manager.is_protected(actor));
    assert_eq!(expired(&notifier), 0);

    sleep(StdDuration::from_secs(2)).await;
    assert!(!manager.is_protected(actor));
    assert_eq!(expired(&notifier), 1);
    assert_eq!(
        notifier.count(|n| matches!(n, Notice::SafetyStarted { .. })),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn shorter_window_from_another_graveyard_replaces_the_longer_one() {
    let notifier = RecordingNotifier::new();
    let manager = SafetyManager::new(notifier.clone(), SafetySettings::default());
    let actor = uuid::Uuid::new_v4();
    let cathedral = graveyard("Cathedral", OVERWORLD, 0.0, visible().with_safety_time(Duration::seconds(10)));
    let crypt = graveyard("Crypt", OVERWORLD, 50.0, visible().with_safety_time(Duration::seconds(5)));

    assert_eq!(manager.put(actor, &cathedral), Some(Duration::seconds(10)));
    sleep(StdDuration::from_secs(1)).await;
    assert_eq!(manager.put(actor, &crypt), Some(Duration::seconds(5)));
    assert_eq!(manager.active_count(), 1);
    assert_eq!(manager.remaining(actor), Some(StdDuration::from_secs(5)));

    sleep(StdDuration::from_secs(4)).await;
    assert!(manager.is_protected(actor));
    assert_eq!(expired(&notifier), 0);

    // the crypt window ends at 6s
    sleep(StdDuration::from_secs(2)).await;
    assert!(!manager.is_protected(actor));
    assert_eq!(expired(&notifier), 1);

    // the cathedral timer would have fired at 10s
    sleep(StdDuration::from_secs(5)).await;
    assert_eq!(expired(&notifier), 1);
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn targeting_is_cancelled_only_inside_the_safety_range() {
    let notifier = RecordingNotifier::new();
    let manager = SafetyManager::new(notifier, SafetySettings::default());
    let actor = uuid::Uuid::new_v4();
    let chapel = graveyard(
        "Chapel",
        OVERWORLD,
        0.0,
        visible()
            .with_safety_time(Duration::seconds(10))
            .with_safety_range(8),
    );

    assert!(!manager.should_cancel_targeting(actor, 1.0));
    manager.put(actor, &chapel);
    assert!(manager.should_cancel_targeting(actor, 63.0));
    assert!(!manager.should_cancel_targeting(actor, 65.0));

    sleep(StdDuration::from_secs(11)).await;
    assert!(!manager.should_cancel_targeting(actor, 1.0));
}

#[tokio::test(start_paused = true)]
async fn respawn_picks_nearest_graveyard_and_starts_safety() {
    let (_dir, store) = temp_store();
    store.save_all(&[
        graveyard("Far", OVERWORLD, 100.0, visible()),
        graveyard(
            "Near",
            OVERWORLD,
            10.0,
            visible()
                .with_respawn_message("Back from the dead")
                .with_safety_time(Duration::seconds(5)),
        ),
    ]);
    let host = FakeHost::new();
    let notifier = RecordingNotifier::new();
    let safety = Arc::new(SafetyManager::new(notifier.clone(), SafetySettings::default()));
    let planner = RespawnPlanner::new(store, host.clone(), notifier.clone(), safety.clone());
    let actor = FakeActor::new("ada", location(OVERWORLD, 0.0, 64.0, 0.0));

    let chosen = planner.on_respawn(actor.as_ref()).expect("a graveyard");
    assert_eq!(chosen.search_key().as_str(), "Near");
    assert!(safety.is_protected(actor.uid()));

    let notices = notifier.notices();
    assert!(matches!(
        &notices[0].1,
        Notice::Respawned { message: Some(m), .. } if m == "Back from the dead"
    ));
    assert_eq!(notices[1].1, Notice::SafetyStarted { duration: Duration::seconds(5) });

    sleep(StdDuration::from_secs(6)).await;
    assert!(!safety.is_protected(actor.uid()));
    assert_eq!(expired(&notifier), 1);
}

#[tokio::test(start_paused = true)]
async fn respawn_is_skipped_without_permission_or_in_disabled_world() {
    let (_dir, store) = temp_store();
    store.save(&graveyard("Near", OVERWORLD, 10.0, visible()));
    let host = FakeHost::new();
    let notifier = RecordingNotifier::new();
    let safety = Arc::new(SafetyManager::new(notifier.clone(), SafetySettings::default()));
    let planner = RespawnPlanner::new(store, host.clone(), notifier.clone(), safety.clone());
    let actor = FakeActor::new("ada", location(OVERWORLD, 0.0, 64.0, 0.0));

    actor.revoke(RESPAWN_PERMISSION);
    assert!(planner.on_respawn(actor.as_ref()).is_none());

    actor.grant(RESPAWN_PERMISSION);
    host.disable_world(OVERWORLD);
    assert!(planner.on_respawn(actor.as_ref()).is_none());
    assert!(notifier.notices().is_empty());
    assert_eq!(safety.active_count(), 0);
}
