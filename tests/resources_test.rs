use std::io::Cursor;

use approx::assert_relative_eq;
use ibl_asteroids::{
    data_structures::{
        model::ModelVertex,
        texture::{CubeFaces, max_mip_levels, validate_cube_levels},
    },
    resources::{
        compute_tangents,
        texture::{decode_image, load_binary, load_image},
    },
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

fn vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
    ModelVertex {
        position,
        tex_coords,
        normal: [0.0, 0.0, 1.0],
        ..Default::default()
    }
}

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

#[test]
fn tangents_follow_the_uv_axes() {
    let mut vertices = vec![
        vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
        vertex([2.0, 0.0, 0.0], [1.0, 0.0]),
        vertex([0.0, 2.0, 0.0], [0.0, 1.0]),
    ];
    compute_tangents(&mut vertices, &[0, 1, 2]);

    for v in &vertices {
        assert_relative_eq!(v.tangent[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.tangent[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.bitangent[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.bitangent[1], 1.0, epsilon = 1e-6);
    }
}

#[test]
fn degenerate_uvs_and_bad_indices_leave_tangents_untouched() {
    let mut vertices = vec![
        vertex([0.0, 0.0, 0.0], [0.5, 0.5]),
        vertex([1.0, 0.0, 0.0], [0.5, 0.5]),
        vertex([0.0, 1.0, 0.0], [0.5, 0.5]),
    ];
    compute_tangents(&mut vertices, &[0, 1, 2, 0, 1, 7]);
    for v in &vertices {
        assert_eq!(v.tangent, [0.0; 3]);
        assert_eq!(v.bitangent, [0.0; 3]);
    }
}

#[test]
fn images_decode_with_and_without_a_mime_type() {
    let bytes = png_bytes();
    let hinted = decode_image(&bytes, Some("image/png")).unwrap();
    assert_eq!((hinted.width(), hinted.height()), (4, 2));
    let guessed = decode_image(&bytes, None).unwrap();
    assert_eq!(guessed.to_rgba8().get_pixel(3, 1), &Rgba([255, 0, 0, 255]));
    assert!(decode_image(b"not an image", None).is_err());
}

#[tokio::test]
async fn files_are_read_relative_to_the_asset_root() {
    let root = std::env::temp_dir().join(format!("ibl-asteroids-resources-{}", std::process::id()));
    tokio::fs::create_dir_all(&root).await.unwrap();
    tokio::fs::write(root.join("face.png"), png_bytes()).await.unwrap();

    let img = load_image(&root, "face.png").await.unwrap();
    assert_eq!(img.width(), 4);

    let err = load_binary(&root, "missing.png").await.unwrap_err();
    assert!(err.to_string().contains("missing.png"));

    tokio::fs::remove_dir_all(&root).await.unwrap();
}

fn cube_level(size: u32) -> CubeFaces {
    std::array::from_fn(|_| DynamicImage::new_rgba8(size, size))
}

#[test]
fn mip_chain_length_is_bounded_by_the_face_size() {
    assert_eq!(max_mip_levels(1), 1);
    assert_eq!(max_mip_levels(16), 5);
    assert_eq!(max_mip_levels(256), 9);
    assert_eq!(max_mip_levels(300), 9);
}

#[test]
fn valid_mip_chains_report_their_base_size() {
    let levels: Vec<_> = [8, 4, 2, 1].map(cube_level).into_iter().collect();
    assert_eq!(validate_cube_levels(&levels, "specular").unwrap(), 8);
}

#[test]
fn too_many_mip_levels_are_rejected() {
    let mut levels: Vec<_> = [4, 2, 1].map(cube_level).into_iter().collect();
    levels.push(cube_level(1));
    let err = validate_cube_levels(&levels, "specular").unwrap_err();
    assert!(err.to_string().contains("at most 3"), "{}", err);
}

#[test]
fn malformed_faces_are_rejected() {
    assert!(validate_cube_levels(&[], "empty").is_err());

    let not_square: CubeFaces = std::array::from_fn(|_| DynamicImage::new_rgba8(4, 2));
    assert!(validate_cube_levels(&[not_square], "wide").is_err());

    let mut wrong_level = vec![cube_level(4), cube_level(2)];
    wrong_level[1][3] = DynamicImage::new_rgba8(4, 4);
    let err = validate_cube_levels(&wrong_level, "diffuse").unwrap_err();
    assert!(err.to_string().contains("level 1 face 3"), "{}", err);
}
