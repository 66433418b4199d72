use std::path::PathBuf;
use std::rc::Rc;

use mpr_viewer::{
    DICOM_FILE_SCHEME, HeadlessBackend, ImageId, ViewerConfig, ViewerSession, ViewportId,
    VolumeLoader,
};
use tracing::{error, info, warn};

/// JSON overrides for [`ViewerConfig`].
const CONFIG_ENV: &str = "MPR_VIEWER_CONFIG";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    let directory = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("dicom"), PathBuf::from);
    let config = match std::env::var(CONFIG_ENV) {
        Ok(json) => ViewerConfig::from_json(&json).expect("should have parsed viewer config"),
        Err(_) => ViewerConfig::default(),
    };
    let image_ids: Vec<_> = VolumeLoader::dicom_paths_in_directory(&directory)
        .expect("should have listed files in directory")
        .iter()
        .map(|path| ImageId::from_path(DICOM_FILE_SCHEME, path))
        .collect();
    info!(directory = %directory.display(), images = image_ids.len(), "starting viewer");

    let backend = Rc::new(HeadlessBackend::new());
    let session = ViewerSession::new(backend.clone(), config, image_ids);
    if let Err(e) = session.init().await {
        error!(error = %e, "viewer failed to initialize");
        return;
    }
    for viewport in ViewportId::ALL {
        info!(
            viewport = session.config().viewport_name(viewport),
            slice = %session.slice_label(viewport),
            reference_line = ?session.reference_line_color(viewport),
            transform = %session.transform_info(viewport),
            "viewport ready"
        );
    }

    session.rotate_90();
    session.set_slab_thickness(5.0);
    let scroll_slabs = session.toggle_slab_scroll();
    info!(
        ?scroll_slabs,
        transform = %session.transform_info(ViewportId::Axial),
        "switched to slab view"
    );

    let frame = backend
        .engine(&session.config().rendering_engine_id)
        .and_then(|engine| engine.frame(ViewportId::Axial));
    match frame {
        Some(frame) => frame.save("result.png").expect("should have saved result.png"),
        None => warn!("axial viewport has not rendered a frame"),
    }

    session.teardown();
}
