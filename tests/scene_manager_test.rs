mod common;

use std::time::Duration;

use cgmath::{Matrix4, Vector3};
use common::test_utils::scene_manager;
use ibl_asteroids::{
    assets::AssetKey,
    data_structures::{
        instance::Instance,
        model::{Model, SceneAsset, ScenePart},
    },
    render::part_instances,
    scene::SceneEntry,
};

fn entry(path: &str) -> SceneEntry {
    SceneEntry::new(AssetKey::scene(path), Instance::new())
}

#[test]
fn entries_keep_insertion_order() {
    let mut scenes = scene_manager();
    let a = scenes.add_scene(entry("a.gltf"));
    let b = scenes.add_scene(entry("b.gltf"));
    let c = scenes.add_scene(entry("c.gltf"));

    let ids: Vec<_> = scenes.entries().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![a, b, c]);

    scenes.remove_scene(b).unwrap();
    let paths: Vec<_> = scenes.entries().map(|(_, e)| e.key.path.as_str()).collect();
    assert_eq!(paths, vec!["a.gltf", "c.gltf"]);
}

#[test]
fn ids_are_never_reused() {
    let mut scenes = scene_manager();
    let first = scenes.add_scene(entry("a.gltf"));
    scenes.remove_scene(first);
    let second = scenes.add_scene(entry("a.gltf"));
    assert_ne!(first, second);
    assert!(!scenes.contains(first));
    assert_eq!(second.to_string(), "scene#1");
}

#[test]
fn removing_twice_returns_none() {
    let mut scenes = scene_manager();
    let id = scenes.add_scene(entry("a.gltf"));
    assert!(scenes.remove_scene(id).is_some());
    assert!(scenes.remove_scene(id).is_none());
    assert!(scenes.is_empty());
}

#[test]
fn entries_can_be_moved() {
    let mut scenes = scene_manager();
    let id = scenes.add_scene(entry("a.gltf"));
    scenes.get_mut(id).unwrap().transform = Instance::from(Vector3::new(0.0, 2.0, 0.0));
    assert_eq!(scenes.get(id).unwrap().transform.position, Vector3::new(0.0, 2.0, 0.0));
}

#[test]
fn update_advances_the_clock() {
    let mut scenes = scene_manager();
    for _ in 0..3 {
        scenes.update(Duration::from_millis(20));
    }
    assert_eq!(scenes.frames(), 3);
    assert_eq!(scenes.elapsed(), Duration::from_millis(60));
}

#[test]
fn viewport_changes_reach_the_camera() {
    let mut scenes = scene_manager();
    scenes.update_viewport(500, 250);
    assert_eq!(scenes.camera.aspect(), 2.0);
}

#[test]
fn instances_translate_without_touching_rotation_or_scale() {
    let instance = Instance::new().translate(Vector3::new(1.0, 0.0, 0.0)).translate(Vector3::new(0.0, 0.5, 0.0));
    assert_eq!(instance.position, Vector3::new(1.0, 0.5, 0.0));
    assert_eq!(instance.scale, Vector3::new(1.0, 1.0, 1.0));
    let matrix = instance.to_matrix();
    assert_eq!(matrix.w.truncate(), Vector3::new(1.0, 0.5, 0.0));
}

#[test]
fn raw_instances_carry_the_placement_matrix() {
    let instance = Instance::from(Vector3::new(-1.0, 0.0, 0.0));
    assert_eq!(instance.to_raw().model(), instance.to_matrix());
}

fn asset(parts: Vec<ScenePart>) -> SceneAsset {
    SceneAsset {
        name: "rock.gltf".to_string(),
        model: Model {
            meshes: Vec::new(),
            materials: Vec::new(),
        },
        parts,
    }
}

#[test]
fn assets_without_parts_have_nothing_to_draw() {
    let empty = asset(Vec::new());
    assert!(empty.is_empty());
    assert!(part_instances(&Instance::new(), &empty).is_empty());
}

#[test]
fn part_instances_apply_the_placement_on_top_of_the_node_transform() {
    let node = Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0));
    let rock = asset(vec![
        ScenePart {
            name: "a".to_string(),
            meshes: 0..0,
            transform: node,
        },
        ScenePart {
            name: "b".to_string(),
            meshes: 0..0,
            transform: Matrix4::from_scale(2.0),
        },
    ]);
    assert!(!rock.is_empty());

    let placement = Instance::from(Vector3::new(-1.0, 0.0, 0.0));
    let raw = part_instances(&placement, &rock);
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0].model().w.truncate(), Vector3::new(-1.0, 1.0, 0.0));
    assert_eq!(raw[1].model(), placement.to_matrix() * Matrix4::from_scale(2.0));
}
