mod common;

use std::{
    thread,
    time::{Duration, Instant},
};

use cgmath::Vector3;
use common::test_utils::{Probe, run_frames, world};
use ibl_asteroids::{
    assets::{AssetError, AssetKey, AssetKind, UnloadOutcome},
    config::AssetConfig,
    demo::{place_asteroids, schedule_unload},
    post::RenderQueue,
    schedule::TaskState,
};

fn asset_config() -> AssetConfig {
    AssetConfig {
        blue: "blue/asteroid.gltf".to_string(),
        green: "green/asteroid.gltf".to_string(),
        ..AssetConfig::default()
    }
}

#[test]
fn both_asteroids_are_placed_side_by_side() {
    let probe = Probe::new();
    let mut world = world(&probe);
    let config = asset_config();
    let asteroids = place_asteroids(&mut world, &config).unwrap();

    assert_eq!(probe.loads(), 2);
    assert_eq!(world.scenes.len(), 2);
    assert_eq!(world.held_count(), 2);

    let blue = world.scenes.get(asteroids.blue).unwrap();
    let green = world.scenes.get(asteroids.green).unwrap();
    assert_eq!(blue.key, AssetKey::scene("blue/asteroid.gltf"));
    assert_eq!(green.key, AssetKey::scene("green/asteroid.gltf"));
    assert_eq!(blue.transform.position, Vector3::new(-1.0, 0.0, 0.0));
    assert_eq!(green.transform.position, Vector3::new(1.0, 0.0, 0.0));
    assert_eq!(world.assets.ref_count("green/asteroid.gltf"), 1);
}

#[test]
fn a_failing_asteroid_aborts_placement() {
    let probe = Probe::new();
    let mut world = world(&probe);
    let config = AssetConfig {
        green: "broken.gltf".to_string(),
        ..asset_config()
    };
    let err = place_asteroids(&mut world, &config).unwrap_err();
    assert!(matches!(err, AssetError::Load { .. }));
    assert!(world.scenes.is_empty());
}

#[test]
fn spawn_requires_a_loaded_asset() {
    let probe = Probe::new();
    let mut world = world(&probe);
    world.assets.load("rock.gltf", AssetKind::Scene).unwrap();

    let err = world
        .spawn(AssetKey::scene("rock.gltf"), Vector3::new(0.0, 0.0, 0.0))
        .unwrap_err();
    assert!(matches!(err, AssetError::NotLoaded(_)));
    assert!(world.scenes.is_empty());
}

#[test]
fn despawn_removes_the_entry_and_releases_the_asset() {
    let probe = Probe::new();
    let mut world = world(&probe);
    let asteroids = place_asteroids(&mut world, &asset_config()).unwrap();

    assert_eq!(world.despawn(asteroids.green).unwrap(), Some(UnloadOutcome::Disposed));
    assert!(!world.scenes.contains(asteroids.green));
    assert!(world.held(asteroids.green).is_none());
    assert!(!world.assets.is_loaded("green/asteroid.gltf"));
    assert_eq!(probe.drops(), 1);

    // second call is a no-op
    assert_eq!(world.despawn(asteroids.green).unwrap(), None);
    assert_eq!(probe.drops(), 1);

    assert!(world.scenes.contains(asteroids.blue));
    assert!(world.assets.is_loaded("blue/asteroid.gltf"));
}

#[test]
fn entries_spawned_from_one_load_each_hold_the_asset() {
    let probe = Probe::new();
    let mut world = world(&probe);
    world.assets.load("rock.gltf", AssetKind::Scene).unwrap();
    world.assets.finish_loading().unwrap();
    let first = world
        .spawn(AssetKey::scene("rock.gltf"), Vector3::new(-2.0, 0.0, 0.0))
        .unwrap();
    let second = world
        .spawn(AssetKey::scene("rock.gltf"), Vector3::new(2.0, 0.0, 0.0))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(world.assets.ref_count("rock.gltf"), 3);

    // give back the load's own reference
    assert_eq!(world.assets.unload("rock.gltf").unwrap(), UnloadOutcome::Retained(2));

    assert_eq!(world.despawn(first).unwrap(), Some(UnloadOutcome::Retained(1)));
    assert!(world.scenes.contains(second));
    assert!(world.assets.is_loaded("rock.gltf"));
    assert_eq!(probe.drops(), 0);

    assert_eq!(world.despawn(second).unwrap(), Some(UnloadOutcome::Disposed));
    assert!(!world.assets.is_loaded("rock.gltf"));
    assert_eq!(probe.drops(), 1);
}

#[test]
fn an_entry_keeps_its_asset_after_the_load_reference_is_released() {
    let probe = Probe::new();
    let mut world = world(&probe);
    world.assets.load("rock.gltf", AssetKind::Scene).unwrap();
    world.assets.finish_loading().unwrap();
    let id = world
        .spawn(AssetKey::scene("rock.gltf"), Vector3::new(0.0, 0.0, 0.0))
        .unwrap();

    assert_eq!(world.assets.unload("rock.gltf").unwrap(), UnloadOutcome::Retained(1));
    assert!(world.assets.is_loaded("rock.gltf"));
    assert_eq!(world.despawn(id).unwrap(), Some(UnloadOutcome::Disposed));
}

#[test]
fn dispose_releases_everything() {
    let probe = Probe::new();
    let mut world = world(&probe);
    place_asteroids(&mut world, &asset_config()).unwrap();
    world.dispose();

    assert!(world.scenes.is_empty());
    assert_eq!(world.held_count(), 0);
    assert!(world.assets.loaded_paths().is_empty());
    assert_eq!(probe.drops(), 2);
}

#[test]
fn green_asteroid_is_unloaded_after_the_delay() {
    let probe = Probe::new();
    let mut world = world(&probe);
    let asteroids = place_asteroids(&mut world, &asset_config()).unwrap();
    let queue = RenderQueue::new();

    let delay = Duration::from_secs(5);
    let start = Instant::now();
    let task = schedule_unload(delay, queue.poster(), asteroids.green).unwrap();

    let mut removed_at = None;
    let frames = run_frames(&queue, &mut world, start, Duration::from_millis(5100), |world| {
        if removed_at.is_none() && !world.scenes.contains(asteroids.green) {
            removed_at = Some(start.elapsed());
        }
        // blue is never touched
        assert!(world.scenes.contains(asteroids.blue));
    });
    assert!(frames > 0);

    let removed_at = removed_at.expect("green asteroid still in the scene");
    assert!(removed_at >= delay, "removed after only {:?}", removed_at);
    assert_eq!(task.state(), TaskState::Executed);

    assert!(!world.assets.is_loaded("green/asteroid.gltf"));
    assert!(world.assets.is_loaded("blue/asteroid.gltf"));
    assert_eq!(world.scenes.len(), 1);
    assert_eq!(probe.drops(), 1);
    assert_eq!(world.scenes.frames(), frames);
}

#[test]
fn teardown_before_the_delay_cancels_the_unload() {
    let probe = Probe::new();
    let mut world = world(&probe);
    let asteroids = place_asteroids(&mut world, &asset_config()).unwrap();
    let queue = RenderQueue::new();

    let start = Instant::now();
    let task = schedule_unload(Duration::from_secs(5), queue.poster(), asteroids.green).unwrap();
    run_frames(&queue, &mut world, start, Duration::from_secs(2), |_| {});
    assert!(world.scenes.contains(asteroids.green));

    // teardown order: cancel the task, then close the queue
    let cancelled_at = Instant::now();
    task.cancel();
    queue.close();
    assert!(cancelled_at.elapsed() < Duration::from_millis(100));
    assert_eq!(task.state(), TaskState::Cancelled);

    while start.elapsed() < Duration::from_millis(5300) {
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.drain(&mut world), 0);
    }
    assert!(world.scenes.contains(asteroids.green));
    assert!(world.assets.is_loaded("green/asteroid.gltf"));
    assert_eq!(probe.drops(), 0);
    assert_eq!(task.state(), TaskState::Cancelled);
}
