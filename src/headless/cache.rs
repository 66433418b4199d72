//! Image and volume caches of the headless back end.
//!
//! Images are decoded by per-scheme image loaders and kept as frames. Volumes
//! are registered first and loaded later by the volume loader registered for
//! their scheme, which receives the frames of the volume's image ids.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::{debug, info};
use web_time::Instant;

use crate::backend::{VolumeHandle, VolumeLoaderFn, VolumeLoading};
use crate::error::BackendError;
use crate::ids::{ImageId, VolumeId};
use crate::volume::Volume;
use crate::volume_loader::{ImageFrame, VolumeLoader, VolumeLoaderError};

/// Decodes the image behind an image id.
pub type ImageLoaderFn = Rc<dyn Fn(&ImageId) -> Result<ImageFrame, VolumeLoaderError>>;

/// Image scheme for DICOM files on the local file system.
pub const DICOM_FILE_SCHEME: &str = "dicomfile";

struct CachedVolume {
    image_ids: Vec<ImageId>,
    volume: Option<Rc<Volume>>,
}

#[derive(Default)]
pub struct VolumeCache {
    image_loaders: RefCell<HashMap<String, ImageLoaderFn>>,
    volume_loaders: RefCell<HashMap<String, VolumeLoaderFn>>,
    images: RefCell<HashMap<ImageId, ImageFrame>>,
    volumes: RefCell<HashMap<VolumeId, CachedVolume>>,
}

impl VolumeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_image_loader(&self, scheme: &str, loader: ImageLoaderFn) {
        self.image_loaders
            .borrow_mut()
            .insert(scheme.to_owned(), loader);
    }

    /// Register `dicomfile:<path>` image ids.
    pub fn register_dicom_file_loader(&self) {
        self.register_image_loader(
            DICOM_FILE_SCHEME,
            Rc::new(|id: &ImageId| VolumeLoader::frame_from_file(id.locator())),
        );
    }

    /// Loaded voxels of a cached volume.
    pub fn volume(&self, id: &VolumeId) -> Result<Rc<Volume>, BackendError> {
        let volumes = self.volumes.borrow();
        let cached = volumes
            .get(id)
            .ok_or_else(|| BackendError::UnknownVolume(id.to_string()))?;
        cached
            .volume
            .clone()
            .ok_or_else(|| BackendError::VolumeNotLoaded(id.to_string()))
    }

    pub fn cached_image_count(&self) -> usize {
        self.images.borrow().len()
    }

    pub fn cached_volume_count(&self) -> usize {
        self.volumes.borrow().len()
    }

    fn load_image(&self, id: &ImageId) -> Result<ImageFrame, BackendError> {
        if let Some(frame) = self.images.borrow().get(id) {
            return Ok(frame.clone());
        }

        let loader = self
            .image_loaders
            .borrow()
            .get(id.scheme())
            .cloned()
            .ok_or_else(|| BackendError::UnknownScheme(id.scheme().to_owned()))?;
        let frame = loader(id).map_err(|source| BackendError::ImageLoad {
            id: id.to_string(),
            source,
        })?;

        self.images.borrow_mut().insert(id.clone(), frame.clone());
        Ok(frame)
    }
}

impl VolumeLoading for VolumeCache {
    fn register_volume_loader(&self, scheme: &str, loader: VolumeLoaderFn) {
        debug!(scheme, "volume loader registered");
        self.volume_loaders
            .borrow_mut()
            .insert(scheme.to_owned(), loader);
    }

    fn create_and_cache_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        image_ids: &'a [ImageId],
    ) -> LocalBoxFuture<'a, Result<VolumeHandle, BackendError>> {
        async move {
            if !self.volume_loaders.borrow().contains_key(volume.scheme()) {
                return Err(BackendError::UnknownScheme(volume.scheme().to_owned()));
            }
            self.volumes.borrow_mut().insert(
                volume.clone(),
                CachedVolume {
                    image_ids: image_ids.to_vec(),
                    volume: None,
                },
            );
            Ok(VolumeHandle {
                id: volume.clone(),
                image_count: image_ids.len(),
            })
        }
        .boxed_local()
    }

    fn load_volume(
        &self,
        volume: &VolumeId,
        on_complete: Box<dyn FnOnce()>,
    ) -> Result<(), BackendError> {
        let image_ids = self
            .volumes
            .borrow()
            .get(volume)
            .map(|cached| cached.image_ids.clone())
            .ok_or_else(|| BackendError::UnknownVolume(volume.to_string()))?;
        let loader = self
            .volume_loaders
            .borrow()
            .get(volume.scheme())
            .cloned()
            .ok_or_else(|| BackendError::UnknownScheme(volume.scheme().to_owned()))?;

        let started = Instant::now();
        let frames = image_ids
            .iter()
            .map(|id| self.load_image(id))
            .collect::<Result<Vec<_>, _>>()?;
        let loaded = Rc::new(loader(frames)?);

        info!(
            volume = %volume,
            dim = ?loaded.dim(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "volume loaded"
        );
        if let Some(cached) = self.volumes.borrow_mut().get_mut(volume) {
            cached.volume = Some(loaded);
        }
        on_complete();
        Ok(())
    }

    fn load_and_cache_images<'a>(
        &'a self,
        image_ids: &'a [ImageId],
    ) -> LocalBoxFuture<'a, Result<usize, BackendError>> {
        async move {
            for id in image_ids {
                self.load_image(id)?;
            }
            debug!(count = image_ids.len(), "images cached");
            Ok(image_ids.len())
        }
        .boxed_local()
    }

    fn purge_cache(&self) {
        self.images.borrow_mut().clear();
    }

    fn purge_volume_cache(&self) {
        self.volumes.borrow_mut().clear();
    }
}
