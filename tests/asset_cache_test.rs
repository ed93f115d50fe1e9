mod common;

use common::test_utils::Probe;
use ibl_asteroids::assets::{AssetCache, AssetError, AssetKey, AssetKind, UnloadOutcome};

/// Loader that answers every key with `value`.
fn constant<T: Clone + 'static>(value: T) -> impl FnMut(&AssetKey) -> anyhow::Result<T> {
    move |_: &AssetKey| Ok(value.clone())
}

#[test]
fn load_is_deferred_until_update() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.load("blue.gltf", AssetKind::Scene).unwrap();

    assert!(cache.is_queued("blue.gltf"));
    assert!(!cache.is_loaded("blue.gltf"));
    assert_eq!(probe.loads(), 0);
    assert!(matches!(
        cache.get("blue.gltf", AssetKind::Scene),
        Err(AssetError::NotLoaded(_))
    ));

    assert!(cache.update().unwrap());
    assert!(cache.is_loaded("blue.gltf"));
    assert_eq!(probe.loads(), 1);
    assert_eq!(cache.get("blue.gltf", AssetKind::Scene).unwrap().path, "blue.gltf");
}

#[test]
fn every_load_takes_a_reference() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.load("shared.gltf", AssetKind::Scene).unwrap();
    cache.load("shared.gltf", AssetKind::Scene).unwrap();
    cache.finish_loading().unwrap();
    // queued twice, read once
    assert_eq!(probe.loads(), 1);
    assert_eq!(cache.ref_count("shared.gltf"), 2);

    cache.load("shared.gltf", AssetKind::Scene).unwrap();
    assert_eq!(cache.ref_count("shared.gltf"), 3);
    assert_eq!(probe.loads(), 1);

    assert_eq!(cache.unload("shared.gltf").unwrap(), UnloadOutcome::Retained(2));
    assert_eq!(cache.unload("shared.gltf").unwrap(), UnloadOutcome::Retained(1));
    assert_eq!(probe.drops(), 0);
    assert_eq!(cache.unload("shared.gltf").unwrap(), UnloadOutcome::Disposed);
    assert_eq!(probe.drops(), 1);
    assert!(!cache.is_loaded("shared.gltf"));
    assert_eq!(cache.ref_count("shared.gltf"), 0);
}

#[test]
fn unloading_an_unknown_path_is_an_error() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    assert!(matches!(
        cache.unload("missing.gltf"),
        Err(AssetError::NotLoaded(path)) if path == "missing.gltf"
    ));
}

#[test]
fn unloading_a_queued_asset_cancels_its_load() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.load("a.gltf", AssetKind::Scene).unwrap();
    cache.load("b.gltf", AssetKind::Scene).unwrap();
    assert_eq!(cache.unload("a.gltf").unwrap(), UnloadOutcome::Dequeued);
    assert!(!cache.is_queued("a.gltf"));

    cache.finish_loading().unwrap();
    assert!(!cache.is_loaded("a.gltf"));
    assert!(cache.is_loaded("b.gltf"));
    assert_eq!(probe.loads(), 1);
}

#[test]
fn a_path_has_exactly_one_kind() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.set_loader(AssetKind::Texture, "", probe.loader());
    cache.load("rock.gltf", AssetKind::Scene).unwrap();

    let err = cache.load("rock.gltf", AssetKind::Texture).unwrap_err();
    assert!(matches!(
        err,
        AssetError::KindMismatch {
            expected: AssetKind::Texture,
            found: AssetKind::Scene,
            ..
        }
    ));

    cache.finish_loading().unwrap();
    assert!(matches!(
        cache.get("rock.gltf", AssetKind::Texture),
        Err(AssetError::KindMismatch { .. })
    ));
    assert!(cache.get_key(&AssetKey::scene("rock.gltf")).is_ok());
}

#[test]
fn load_without_a_matching_loader_fails_up_front() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    assert!(matches!(
        cache.load("rock.obj", AssetKind::Scene),
        Err(AssetError::NoLoader { kind: AssetKind::Scene, .. })
    ));
    assert!(matches!(
        cache.load("rock.gltf", AssetKind::Cubemap),
        Err(AssetError::NoLoader { .. })
    ));
    assert!(!cache.is_queued("rock.obj"));
}

#[test]
fn longest_suffix_picks_the_loader() {
    let mut cache: AssetCache<&'static str> = AssetCache::new();
    cache.set_loader(AssetKind::Scene, "", constant("any"));
    cache.set_loader(AssetKind::Scene, ".gltf", constant("gltf"));
    cache.set_loader(AssetKind::Scene, ".lod0.gltf", constant("lod0"));

    for path in ["rock.bin", "rock.gltf", "rock.lod0.gltf"] {
        cache.load(path, AssetKind::Scene).unwrap();
    }
    cache.finish_loading().unwrap();

    assert_eq!(*cache.get("rock.bin", AssetKind::Scene).unwrap(), "any");
    assert_eq!(*cache.get("rock.gltf", AssetKind::Scene).unwrap(), "gltf");
    assert_eq!(*cache.get("rock.lod0.gltf", AssetKind::Scene).unwrap(), "lod0");
}

#[test]
fn registering_a_suffix_again_replaces_the_loader() {
    let mut cache: AssetCache<u32> = AssetCache::new();
    cache.set_loader(AssetKind::Scene, ".gltf", constant(1));
    cache.set_loader(AssetKind::Scene, ".gltf", constant(2));
    cache.load("rock.gltf", AssetKind::Scene).unwrap();
    cache.finish_loading().unwrap();
    assert_eq!(*cache.get("rock.gltf", AssetKind::Scene).unwrap(), 2);
}

#[test]
fn finish_loading_stops_at_the_first_failure() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.load("good.gltf", AssetKind::Scene).unwrap();
    cache.load("broken.gltf", AssetKind::Scene).unwrap();
    cache.load("later.gltf", AssetKind::Scene).unwrap();

    let err = cache.finish_loading().unwrap_err();
    assert!(matches!(&err, AssetError::Load { path, .. } if path == "broken.gltf"));
    assert!(err.to_string().contains("corrupt file broken.gltf"));
    assert!(cache.is_loaded("good.gltf"));
    assert!(!cache.is_loaded("broken.gltf"));
    assert!(!cache.is_queued("broken.gltf"));
    assert!(cache.is_queued("later.gltf"));

    // the rest of the queue is still there
    cache.finish_loading().unwrap();
    assert!(cache.is_loaded("later.gltf"));
}

#[test]
fn progress_tracks_the_current_batch() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    assert_eq!(cache.progress(), 1.0);

    for path in ["a.gltf", "b.gltf", "c.gltf", "d.gltf"] {
        cache.load(path, AssetKind::Scene).unwrap();
    }
    assert_eq!(cache.progress(), 0.0);
    assert!(!cache.update().unwrap());
    assert_eq!(cache.progress(), 0.25);
    assert!(!cache.update().unwrap());
    assert_eq!(cache.progress(), 0.5);
    cache.finish_loading().unwrap();
    assert_eq!(cache.progress(), 1.0);

    let mut loaded = cache.loaded_paths();
    loaded.sort();
    assert_eq!(loaded, vec!["a.gltf", "b.gltf", "c.gltf", "d.gltf"]);
}

#[test]
fn clear_disposes_everything() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.load("a.gltf", AssetKind::Scene).unwrap();
    cache.load("a.gltf", AssetKind::Scene).unwrap();
    cache.load("b.gltf", AssetKind::Scene).unwrap();
    cache.finish_loading().unwrap();
    cache.load("queued.gltf", AssetKind::Scene).unwrap();

    cache.clear();
    assert_eq!(probe.drops(), 2);
    assert!(cache.loaded_paths().is_empty());
    assert!(!cache.is_queued("queued.gltf"));
    assert!(cache.update().unwrap());
}

#[test]
fn dropping_the_cache_disposes_its_assets() {
    let probe = Probe::new();
    let mut cache = probe.cache();
    cache.load("a.gltf", AssetKind::Scene).unwrap();
    cache.finish_loading().unwrap();
    drop(cache);
    assert_eq!(probe.drops(), 1);
}
