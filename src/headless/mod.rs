//! In-process back end rendering on the CPU.
//!
//! Used by the demo binary and by tests. Images are decoded with the DICOM
//! loader of this crate, slabs are combined on the CPU and written to gray
//! images, and tools only track modes and bindings.

mod annotations;
mod cache;
mod engine;
mod tools;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::{debug, info};

pub use annotations::AnnotationStore;
pub use cache::{DICOM_FILE_SCHEME, ImageLoaderFn, VolumeCache};
pub use engine::HeadlessRenderingEngine;
pub use tools::{HeadlessToolGroup, HeadlessToolGroupManager};

use crate::backend::{AnnotationManager, Backend, RenderingEngine, ToolRegistry, VolumeLoading};
use crate::error::BackendError;

#[derive(Default)]
pub struct HeadlessBackend {
    initialized: Cell<bool>,
    volumes: Rc<VolumeCache>,
    tools: Rc<HeadlessToolGroupManager>,
    annotations: Rc<AnnotationStore>,
    engines: RefCell<BTreeMap<String, Rc<HeadlessRenderingEngine>>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume_cache(&self) -> Rc<VolumeCache> {
        Rc::clone(&self.volumes)
    }

    pub fn tool_groups(&self) -> Rc<HeadlessToolGroupManager> {
        Rc::clone(&self.tools)
    }

    pub fn annotation_store(&self) -> Rc<AnnotationStore> {
        Rc::clone(&self.annotations)
    }

    /// Concrete engine registered under `id`, for frame access.
    pub fn engine(&self, id: &str) -> Option<Rc<HeadlessRenderingEngine>> {
        self.engines.borrow().get(id).cloned()
    }
}

impl Backend for HeadlessBackend {
    fn init(&self) -> LocalBoxFuture<'_, Result<(), BackendError>> {
        async move {
            if !self.initialized.replace(true) {
                self.volumes.register_dicom_file_loader();
                info!("headless back end initialized");
            }
            Ok(())
        }
        .boxed_local()
    }

    fn create_rendering_engine(&self, id: &str) -> Result<Rc<dyn RenderingEngine>, BackendError> {
        if !self.initialized.get() {
            return Err(BackendError::NotInitialized);
        }
        let mut engines = self.engines.borrow_mut();
        if engines.contains_key(id) {
            return Err(BackendError::DuplicateEngine(id.to_owned()));
        }
        let engine = Rc::new(HeadlessRenderingEngine::new(id, self.volume_cache()));
        engines.insert(id.to_owned(), Rc::clone(&engine));
        debug!(engine = id, "rendering engine created");
        Ok(engine)
    }

    fn destroy_rendering_engine(&self, id: &str) -> bool {
        let removed = self.engines.borrow_mut().remove(id).is_some();
        if removed {
            debug!(engine = id, "rendering engine destroyed");
        }
        removed
    }

    fn volumes(&self) -> Rc<dyn VolumeLoading> {
        self.volume_cache()
    }

    fn tools(&self) -> Rc<dyn ToolRegistry> {
        self.tool_groups()
    }

    fn annotations(&self) -> Rc<dyn AnnotationManager> {
        self.annotation_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn engines_require_init_and_unique_ids() {
        let backend = HeadlessBackend::new();
        assert!(matches!(
            backend.create_rendering_engine("engine"),
            Err(BackendError::NotInitialized)
        ));

        backend.init().await.expect("should init");
        let engine = backend
            .create_rendering_engine("engine")
            .expect("should create engine");
        assert_eq!(engine.id(), "engine");
        assert!(matches!(
            backend.create_rendering_engine("engine"),
            Err(BackendError::DuplicateEngine(id)) if id == "engine"
        ));

        assert!(backend.destroy_rendering_engine("engine"));
        assert!(!backend.destroy_rendering_engine("engine"));
        assert!(backend.engine("engine").is_none());
    }
}
