use std::thread;
use std::time::Duration;

use savegame::{
    ParticipantRegistry, SaveConfig, SaveSystem, SimulatedSceneLoader, Simulation,
    SimulationClock,
};
use serde_json::json;
use tempfile::TempDir;

use super::*;

const FRAME: Duration = Duration::from_millis(16);

fn demo_system(temp: &TempDir) -> SaveSystem {
    let config = SaveConfig {
        save_dir: temp.path().join("saves"),
        settle_delay: Duration::ZERO,
        ..SaveConfig::default()
    };
    let scenes = SimulatedSceneLoader::new(DEMO_SCENES, MEADOW_SCENE, 2);
    SaveSystem::new(config, Box::new(scenes), SimulationClock::new()).expect("save system")
}

/// Steps the session the way the headless loop does, with a short sleep so
/// the row writer and reader threads get a chance to run.
fn drive(session: &mut DemoSession) {
    for _ in 0..2_000 {
        session.frame(Duration::from_millis(1));
        let sim_dt = session.system().clock().scale(FRAME);
        session.fixed_update(sim_dt);
        if session.should_exit() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("demo session never finished");
}

#[test]
fn demo_session_saves_scrambles_and_restores_the_world() {
    let temp = TempDir::new().expect("tempdir");
    let mut session = DemoSession::new(
        demo_system(&temp),
        SessionScript {
            warmup_frames: 5,
            ..SessionScript::default()
        },
    );

    drive(&mut session);

    let player = session.world().player.borrow().clone();
    assert!(player.position.x > 0.0, "player walked during warmup");
    assert_eq!(player.health, 100.0);
    assert_eq!(player.inventory.len(), 1);
    assert_eq!(
        session
            .world()
            .dialog
            .borrow()
            .variable("DialogSkeleton", "times_talked"),
        Some(&json!(2))
    );
    let skeleton = session.world().skeleton.borrow();
    assert_eq!(skeleton.restores(), 1);
    assert_eq!(skeleton.variable("met_player"), Some(&json!(true)));
    drop(skeleton);
    assert_eq!(session.system().list_saves().expect("list").len(), 1);
    assert!(!session.system().clock().is_paused());

    let outcome = session.finish();
    assert!(outcome.is_success(), "{outcome:?}");
    let save = outcome.save.expect("save report");
    assert_eq!(save.expected, 4);
    assert_eq!(save.managed, 4);
    assert_eq!(outcome.load.expect("load report").managed, 4);
}

#[test]
fn unscrambled_session_still_round_trips() {
    let temp = TempDir::new().expect("tempdir");
    let mut session = DemoSession::new(
        demo_system(&temp),
        SessionScript {
            warmup_frames: 0,
            scramble_before_load: false,
        },
    );

    drive(&mut session);

    let outcome = session.finish();
    assert!(outcome.restored_matches);
    assert!(outcome.error.is_none());
}

#[test]
fn world_attaches_and_detaches_every_participant() {
    let registry = ParticipantRegistry::new();
    let mut world = World::spawn(&registry);
    assert_eq!(registry.on_save_requested.subscriber_count(), 4);
    assert_eq!(registry.on_load_completed.subscriber_count(), 4);

    assert_eq!(world.disable(&registry), 4);
    assert_eq!(registry.on_save_requested.subscriber_count(), 0);
    assert_eq!(world.disable(&registry), 0);
}

#[test]
fn paused_time_freezes_the_world() {
    let registry = ParticipantRegistry::new();
    let world = World::spawn(&registry);
    let before = world.snapshot();

    world.fixed_update(Duration::ZERO);
    assert_eq!(world.snapshot(), before);

    world.fixed_update(Duration::from_millis(500));
    let after = world.snapshot();
    assert!(after.player.position.x > before.player.position.x);
    assert_eq!(after.camera.position.x, after.player.position.x);
    assert!(after.companion.position.x < after.player.position.x);
}

#[test]
fn scramble_changes_every_saved_piece() {
    let registry = ParticipantRegistry::new();
    let world = World::spawn(&registry);
    let before = world.snapshot();

    world.scramble();
    let after = world.snapshot();
    assert_ne!(after.player, before.player);
    assert_ne!(after.companion, before.companion);
    assert_ne!(after.camera, before.camera);
    assert_ne!(after.dialog, before.dialog);
}
