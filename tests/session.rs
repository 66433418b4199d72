use std::rc::Rc;

use mpr_viewer::backend::RenderingEngine;
use mpr_viewer::volume_loader::{ImageFrame, VolumeLoaderError};
use mpr_viewer::{HeadlessBackend, ImageId, PrimaryTool, ViewerConfig, ViewerSession, ViewportId};
use ndarray::Array2;

/// Back end whose `mem:<z>` images are 8x6 frames filled with `z * 10`.
fn memory_backend() -> Rc<HeadlessBackend> {
    let backend = Rc::new(HeadlessBackend::new());
    backend.volume_cache().register_image_loader(
        "mem",
        Rc::new(|id: &ImageId| -> Result<ImageFrame, VolumeLoaderError> {
            let z: f32 = id.locator().parse().unwrap_or(0.0);
            Ok(ImageFrame {
                pixels: Array2::from_elem((8, 6), z * 10.0),
                position_z: Some(z),
                table_position: None,
                instance_number: None,
                spacing: Some((1.0, 1.0, 1.0)),
            })
        }),
    );
    backend
}

fn memory_ids(count: usize) -> Vec<ImageId> {
    (0..count).map(|i| ImageId::new("mem", i.to_string())).collect()
}

#[tokio::test]
async fn remounting_does_not_leak_listeners() {
    let backend = memory_backend();

    for _ in 0..3 {
        let session = ViewerSession::new(backend.clone(), ViewerConfig::default(), memory_ids(10));
        session.init().await.expect("init should succeed");
        let engine = backend
            .engine("MY_RENDERING_ENGINE_ID")
            .expect("engine should exist");
        assert_eq!(engine.notifications().listener_count(), 6);

        drop(session);

        assert_eq!(engine.notifications().listener_count(), 0);
        assert_eq!(backend.tool_groups().group_count(), 0);
        assert!(backend.engine("MY_RENDERING_ENGINE_ID").is_none());
    }
}

#[tokio::test]
async fn json_config_reaches_engine_and_labels() {
    let backend = memory_backend();
    let config = ViewerConfig::from_json(
        r#"{
            "rendering_engine_id": "ENGINE",
            "derived_slice_count": 64,
            "voi_range": { "lower": 0.0, "upper": 80.0 }
        }"#,
    )
    .expect("config should parse");
    let session = ViewerSession::new(backend.clone(), config, memory_ids(10));

    session.init().await.expect("init should succeed");

    let engine = backend.engine("ENGINE").expect("engine should exist");
    let voi = engine.voi_range(ViewportId::Sagittal).expect("voi applied");
    assert_eq!((voi.lower, voi.upper), (0.0, 80.0));
    assert_eq!(session.slice_label(ViewportId::Coronal), "64 / 64");
    assert_eq!(session.slider_range(ViewportId::Coronal), 0..=63);
    assert_eq!(session.slice_label(ViewportId::Axial), "5 / 10");
}

#[tokio::test]
async fn configured_viewport_names_and_line_colors_reach_the_back_end() {
    let backend = memory_backend();
    let config = ViewerConfig::from_json(
        r#"{
            "viewport_names": { "coronal": "FRONT" },
            "reference_line_colors": { "axial": "rgb(1, 2, 3)" }
        }"#,
    )
    .expect("config should parse");
    let session = ViewerSession::new(backend.clone(), config, memory_ids(10));

    session.init().await.expect("init should succeed");

    let engine = backend
        .engine("MY_RENDERING_ENGINE_ID")
        .expect("engine should exist");
    assert_eq!(engine.viewport_name(ViewportId::Coronal).as_deref(), Some("FRONT"));
    assert_eq!(engine.viewport_name(ViewportId::Axial).as_deref(), Some("CT_AXIAL"));
    assert_eq!(
        session.reference_line_color(ViewportId::Axial).as_deref(),
        Some("rgb(1, 2, 3)")
    );
    assert_eq!(
        session.reference_line_color(ViewportId::Coronal).as_deref(),
        Some("rgb(200, 100, 0)")
    );
}

#[tokio::test]
async fn slab_wider_than_the_volume_still_renders() {
    let backend = memory_backend();
    let session = ViewerSession::new(backend.clone(), ViewerConfig::default(), memory_ids(10));
    session.init().await.expect("init should succeed");

    session.set_slab_thickness(1.0e30);

    let engine = backend
        .engine("MY_RENDERING_ENGINE_ID")
        .expect("engine should exist");
    for viewport in ViewportId::ALL {
        assert!(engine.frame(viewport).is_some());
    }
    assert_eq!(session.snapshot(ViewportId::Axial).slab_thickness, Some(1.0e30));
}

#[tokio::test]
async fn slab_over_zero_slice_spacing_still_renders() {
    let backend = Rc::new(HeadlessBackend::new());
    backend.volume_cache().register_image_loader(
        "flat",
        Rc::new(|id: &ImageId| -> Result<ImageFrame, VolumeLoaderError> {
            let z: f32 = id.locator().parse().unwrap_or(0.0);
            Ok(ImageFrame {
                pixels: Array2::from_elem((8, 6), z * 10.0),
                position_z: Some(z),
                table_position: None,
                instance_number: None,
                spacing: Some((1.0, 1.0, 0.0)),
            })
        }),
    );
    let ids = (0..10).map(|i| ImageId::new("flat", i.to_string())).collect();
    let session = ViewerSession::new(backend.clone(), ViewerConfig::default(), ids);
    session.init().await.expect("init should succeed");

    session.set_slab_thickness(2.0);

    let engine = backend
        .engine("MY_RENDERING_ENGINE_ID")
        .expect("engine should exist");
    for viewport in ViewportId::ALL {
        assert!(engine.frame(viewport).is_some());
    }
}

#[tokio::test]
async fn slab_view_shows_brightest_voxels() {
    let backend = memory_backend();
    let session = ViewerSession::new(backend.clone(), ViewerConfig::default(), memory_ids(10));
    session.init().await.expect("init should succeed");
    let engine = backend
        .engine("MY_RENDERING_ENGINE_ID")
        .expect("engine should exist");
    let single = engine.frame(ViewportId::Axial).expect("axial frame");

    session.set_slab_thickness(4.0);

    let slab = engine.frame(ViewportId::Axial).expect("axial frame");
    assert_eq!(slab.dimensions(), (6, 8));
    assert!(slab.get_pixel(0, 0).0[0] > single.get_pixel(0, 0).0[0]);
    assert_eq!(session.snapshot(ViewportId::Axial).slab_thickness, Some(4.0));
}

#[tokio::test]
async fn tool_switching_and_camera_actions_survive_together() {
    let backend = memory_backend();
    let session = ViewerSession::new(backend.clone(), ViewerConfig::default(), memory_ids(10));
    session.init().await.expect("init should succeed");

    session.select_primary_tool(PrimaryTool::Length);
    session.rotate_90();
    session.handle_resize();

    assert_eq!(session.primary_tool(), Some(PrimaryTool::Length));
    assert!(
        session
            .transform_info(ViewportId::Coronal)
            .contains("R: 90.00")
    );

    let engine: Rc<dyn RenderingEngine> = session.rendering_engine().expect("engine");
    assert_eq!(engine.viewport_ids(), ViewportId::ALL.to_vec());
}
