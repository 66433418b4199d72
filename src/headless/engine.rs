//! CPU rendering engine keeping per-viewport camera and slice state.
//!
//! Viewports only sample axis-aligned planes of the bound volume. Rotation,
//! pan and zoom are stored and reported but do not resample the frame.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use image::GrayImage;
use tracing::{debug, warn};

use crate::backend::{RenderingEngine, ViewportInput, ViewportProperties};
use crate::config::VoiRange;
use crate::enums::{BlendMode, Interpolation, NotificationKind, Orientation, ViewportId};
use crate::error::BackendError;
use crate::headless::VolumeCache;
use crate::ids::VolumeId;
use crate::notifications::{ElementId, NotificationBus};
use crate::presentation::ViewPresentation;
use crate::volume::{SlabRequest, Volume};

struct ViewportState {
    element: ElementId,
    name: String,
    orientation: Orientation,
    display_area: (f32, f32),
    presentation: ViewPresentation,
    slab_thickness: Option<f32>,
    voi: Option<VoiRange>,
    blend: BlendMode,
    volume: Option<Rc<Volume>>,
    slice_index: Option<usize>,
}

impl ViewportState {
    fn centre_slice(&self) -> Option<usize> {
        let volume = self.volume.as_ref()?;
        Some(volume.slice_count(self.orientation) / 2)
    }

    fn render(&self) -> Option<GrayImage> {
        let volume = self.volume.as_ref()?;
        volume.render_slab(&SlabRequest {
            index: self.slice_index?,
            orientation: self.orientation,
            thickness: self.slab_thickness.unwrap_or_default(),
            blend: self.blend,
            voi: self.voi,
            interpolation: Interpolation::Linear,
        })
    }
}

pub struct HeadlessRenderingEngine {
    id: String,
    volumes: Rc<VolumeCache>,
    viewports: RefCell<BTreeMap<ViewportId, ViewportState>>,
    next_element: Cell<u64>,
    frames: RefCell<BTreeMap<ViewportId, GrayImage>>,
    render_count: Cell<usize>,
    notifications: NotificationBus,
}

impl HeadlessRenderingEngine {
    pub fn new(id: impl Into<String>, volumes: Rc<VolumeCache>) -> Self {
        Self {
            id: id.into(),
            volumes,
            viewports: RefCell::new(BTreeMap::new()),
            next_element: Cell::new(1),
            frames: RefCell::new(BTreeMap::new()),
            render_count: Cell::new(0),
            notifications: NotificationBus::new(),
        }
    }

    /// Last frame rendered for the viewport.
    pub fn frame(&self, viewport: ViewportId) -> Option<GrayImage> {
        self.frames.borrow().get(&viewport).cloned()
    }

    pub fn render_count(&self) -> usize {
        self.render_count.get()
    }

    pub fn blend_mode(&self, viewport: ViewportId) -> Option<BlendMode> {
        self.viewports.borrow().get(&viewport).map(|state| state.blend)
    }

    pub fn voi_range(&self, viewport: ViewportId) -> Option<VoiRange> {
        self.viewports.borrow().get(&viewport)?.voi
    }

    /// String id the host registered the viewport under.
    pub fn viewport_name(&self, viewport: ViewportId) -> Option<String> {
        self.viewports
            .borrow()
            .get(&viewport)
            .map(|state| state.name.clone())
    }

    pub fn display_area(&self, viewport: ViewportId) -> Option<(f32, f32)> {
        self.viewports
            .borrow()
            .get(&viewport)
            .map(|state| state.display_area)
    }

    /// Mutate one viewport and return its element, releasing the borrow before
    /// anything is emitted.
    fn update<R>(
        &self,
        viewport: ViewportId,
        f: impl FnOnce(&mut ViewportState) -> R,
    ) -> Option<(ElementId, R)> {
        let mut viewports = self.viewports.borrow_mut();
        let state = viewports.get_mut(&viewport)?;
        let result = f(state);
        Some((state.element, result))
    }

    fn emit(&self, element: ElementId, kinds: &[NotificationKind]) {
        for kind in kinds {
            self.notifications.emit(element, *kind);
        }
    }

    fn viewport_for_element(&self, element: ElementId) -> Option<ViewportId> {
        self.viewports
            .borrow()
            .iter()
            .find(|(_, state)| state.element == element)
            .map(|(viewport, _)| *viewport)
    }
}

impl RenderingEngine for HeadlessRenderingEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_viewports(&self, inputs: &[ViewportInput]) {
        let mut viewports = self.viewports.borrow_mut();
        viewports.clear();
        self.frames.borrow_mut().clear();
        for input in inputs {
            let element = ElementId(self.next_element.get());
            self.next_element.set(element.0 + 1);
            debug!(engine = %self.id, viewport = %input.name, ?element, "viewport enabled");
            viewports.insert(
                input.viewport,
                ViewportState {
                    element,
                    name: input.name.clone(),
                    orientation: input.orientation,
                    display_area: input.display_area,
                    presentation: ViewPresentation::default(),
                    slab_thickness: None,
                    voi: None,
                    blend: BlendMode::default(),
                    volume: None,
                    slice_index: None,
                },
            );
        }
        debug!(engine = %self.id, count = viewports.len(), "viewports set");
    }

    fn viewport_ids(&self) -> Vec<ViewportId> {
        self.viewports.borrow().keys().copied().collect()
    }

    fn element(&self, viewport: ViewportId) -> Option<ElementId> {
        self.viewports.borrow().get(&viewport).map(|state| state.element)
    }

    fn view_presentation(&self, viewport: ViewportId) -> Option<ViewPresentation> {
        self.viewports
            .borrow()
            .get(&viewport)
            .map(|state| state.presentation)
    }

    fn set_view_presentation(&self, viewport: ViewportId, presentation: ViewPresentation) {
        let presentation = presentation.rotated(0.0);
        let updated = self.update(viewport, |state| state.presentation = presentation);
        if let Some((element, _)) = updated {
            self.emit(element, &[NotificationKind::CameraModified]);
        }
    }

    fn slab_thickness(&self, viewport: ViewportId) -> Option<f32> {
        self.viewports.borrow().get(&viewport)?.slab_thickness
    }

    fn set_properties(&self, viewport: ViewportId, properties: ViewportProperties) {
        let updated = self.update(viewport, |state| {
            if let Some(voi) = properties.voi_range {
                state.voi = Some(voi);
            }
            match properties.slab_thickness {
                Some(thickness) if state.slab_thickness != Some(thickness) => {
                    state.slab_thickness = Some(thickness.max(0.0));
                    true
                }
                _ => false,
            }
        });
        // slab changes are reported as camera changes
        if let Some((element, true)) = updated {
            self.emit(element, &[NotificationKind::CameraModified]);
        }
    }

    fn set_blend_mode(&self, viewport: ViewportId, mode: BlendMode) {
        self.update(viewport, |state| state.blend = mode);
    }

    fn reset_camera(&self, viewport: ViewportId) {
        let updated = self.update(viewport, |state| {
            state.presentation = ViewPresentation::default();
            let centre = state.centre_slice();
            let moved = centre.is_some() && centre != state.slice_index;
            state.slice_index = centre.or(state.slice_index);
            moved
        });
        match updated {
            Some((element, true)) => self.emit(
                element,
                &[NotificationKind::SliceChanged, NotificationKind::CameraModified],
            ),
            Some((element, false)) => self.emit(element, &[NotificationKind::CameraModified]),
            None => {}
        }
    }

    fn slice_index(&self, viewport: ViewportId) -> Option<usize> {
        self.viewports.borrow().get(&viewport)?.slice_index
    }

    fn number_of_slices(&self, viewport: ViewportId) -> Option<usize> {
        let viewports = self.viewports.borrow();
        let state = viewports.get(&viewport)?;
        Some(state.volume.as_ref()?.slice_count(state.orientation))
    }

    fn jump_to_slice(&self, element: ElementId, index: usize) {
        let Some(viewport) = self.viewport_for_element(element) else {
            return;
        };
        let updated = self.update(viewport, |state| {
            let count = state.volume.as_ref()?.slice_count(state.orientation);
            let index = index.min(count.saturating_sub(1));
            if state.slice_index == Some(index) {
                return None;
            }
            state.slice_index = Some(index);
            Some(index)
        });
        if let Some((element, Some(index))) = updated {
            debug!(?viewport, index, "jumped to slice");
            self.emit(
                element,
                &[NotificationKind::SliceChanged, NotificationKind::CameraModified],
            );
        }
    }

    fn set_volume_for_viewports<'a>(
        &'a self,
        volume: &'a VolumeId,
        viewports: &'a [ViewportId],
    ) -> LocalBoxFuture<'a, Result<(), BackendError>> {
        async move {
            let loaded = self.volumes.volume(volume)?;
            for viewport in viewports {
                let updated = self.update(*viewport, |state| {
                    state.volume = Some(Rc::clone(&loaded));
                    state.slice_index = state.centre_slice();
                    state.slab_thickness.get_or_insert(loaded.min_spacing());
                });
                match updated {
                    Some((element, ())) => self.emit(
                        element,
                        &[NotificationKind::SliceChanged, NotificationKind::CameraModified],
                    ),
                    None => {
                        warn!(?viewport, volume = %volume, "no such viewport to bind volume to")
                    }
                }
            }
            Ok(())
        }
        .boxed_local()
    }

    fn resize(&self, immediate: bool, keep_camera: bool) {
        if !keep_camera {
            for viewport in self.viewport_ids() {
                if let Some((element, _)) = self.update(viewport, |state| {
                    state.presentation = ViewPresentation::default();
                }) {
                    self.emit(element, &[NotificationKind::CameraModified]);
                }
            }
        }
        if immediate {
            self.render();
        }
    }

    fn render(&self) {
        let viewports = self.viewport_ids();
        self.render_viewports(&viewports);
    }

    fn render_viewports(&self, viewports: &[ViewportId]) {
        let states = self.viewports.borrow();
        let mut frames = self.frames.borrow_mut();
        for viewport in viewports {
            if let Some(frame) = states.get(viewport).and_then(ViewportState::render) {
                frames.insert(*viewport, frame);
            }
        }
        self.render_count.set(self.render_count.get() + 1);
    }

    fn notifications(&self) -> &NotificationBus {
        &self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VolumeLoading;
    use crate::enums::SortBy;
    use crate::ids::ImageId;
    use crate::volume_loader::{ImageFrame, VolumeLoader, VolumeLoaderError};
    use ndarray::Array2;

    async fn engine_with_volume() -> Rc<HeadlessRenderingEngine> {
        let cache = Rc::new(VolumeCache::new());
        cache.register_image_loader(
            "mem",
            Rc::new(|id: &ImageId| -> Result<ImageFrame, VolumeLoaderError> {
                let z: f32 = id.locator().parse().unwrap_or(0.0);
                Ok(ImageFrame {
                    pixels: Array2::from_elem((6, 8), z * 10.0),
                    position_z: Some(z),
                    table_position: None,
                    instance_number: None,
                    spacing: Some((1.0, 1.0, 2.0)),
                })
            }),
        );
        cache.register_volume_loader("stack", VolumeLoader::streaming(SortBy::InstanceNumber));
        let ids: Vec<_> = (0..4).map(|i| ImageId::new("mem", i.to_string())).collect();
        let volume_id = VolumeId::new("stack", "ct");
        cache
            .create_and_cache_volume(&volume_id, &ids)
            .await
            .expect("should cache");
        cache
            .load_volume(&volume_id, Box::new(|| {}))
            .expect("should load");

        let engine = Rc::new(HeadlessRenderingEngine::new("engine", cache));
        let inputs: Vec<_> = ViewportId::ALL
            .iter()
            .map(|&viewport| ViewportInput {
                viewport,
                name: format!("{viewport:?}"),
                orientation: viewport.default_orientation(),
                display_area: (1.0, 1.0),
            })
            .collect();
        engine.set_viewports(&inputs);
        engine
            .set_volume_for_viewports(&volume_id, &ViewportId::ALL)
            .await
            .expect("should bind");
        engine
    }

    #[tokio::test]
    async fn binding_volume_centres_slices() {
        let engine = engine_with_volume().await;

        assert_eq!(engine.number_of_slices(ViewportId::Axial), Some(4));
        assert_eq!(engine.number_of_slices(ViewportId::Coronal), Some(6));
        assert_eq!(engine.number_of_slices(ViewportId::Sagittal), Some(8));
        assert_eq!(engine.slice_index(ViewportId::Axial), Some(2));
        assert_eq!(engine.slab_thickness(ViewportId::Axial), Some(1.0));
    }

    #[tokio::test]
    async fn viewports_keep_their_host_names() {
        let engine = engine_with_volume().await;
        assert_eq!(engine.viewport_name(ViewportId::Sagittal).as_deref(), Some("Sagittal"));

        engine.set_viewports(&[]);
        assert_eq!(engine.viewport_name(ViewportId::Sagittal), None);
    }

    #[tokio::test]
    async fn binding_unloaded_volume_fails() {
        let engine = HeadlessRenderingEngine::new("engine", Rc::new(VolumeCache::new()));
        let result = engine
            .set_volume_for_viewports(&VolumeId::new("stack", "ct"), &ViewportId::ALL)
            .await;
        assert!(matches!(result, Err(BackendError::UnknownVolume(_))));
    }

    #[tokio::test]
    async fn jump_clamps_and_notifies() {
        let engine = engine_with_volume().await;
        let element = engine.element(ViewportId::Axial).expect("element");
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        engine
            .notifications()
            .subscribe(element, NotificationKind::SliceChanged, move |_| {
                counter.set(counter.get() + 1)
            });

        engine.jump_to_slice(element, 99);
        assert_eq!(engine.slice_index(ViewportId::Axial), Some(3));
        engine.jump_to_slice(element, 3);
        assert_eq!(hits.get(), 1);

        engine.jump_to_slice(ElementId(999), 0);
        assert_eq!(engine.slice_index(ViewportId::Axial), Some(3));
    }

    #[tokio::test]
    async fn unchanged_slab_does_not_notify() {
        let engine = engine_with_volume().await;
        let element = engine.element(ViewportId::Coronal).expect("element");
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        engine
            .notifications()
            .subscribe(element, NotificationKind::CameraModified, move |_| {
                counter.set(counter.get() + 1)
            });
        let properties = ViewportProperties {
            slab_thickness: Some(3.0),
            ..ViewportProperties::default()
        };

        engine.set_properties(ViewportId::Coronal, properties);
        engine.set_properties(ViewportId::Coronal, properties);

        assert_eq!(hits.get(), 1);
        assert_eq!(engine.slab_thickness(ViewportId::Coronal), Some(3.0));
    }

    #[tokio::test]
    async fn render_produces_frames_for_bound_viewports() {
        let engine = engine_with_volume().await;
        engine.set_properties(
            ViewportId::Axial,
            ViewportProperties {
                voi_range: Some(VoiRange {
                    lower: 0.0,
                    upper: 30.0,
                }),
                slab_thickness: None,
            },
        );

        engine.render();

        let axial = engine.frame(ViewportId::Axial).expect("axial frame");
        assert_eq!(axial.dimensions(), (8, 6));
        // slice 2 holds value 20 in a 0..30 window
        assert_eq!(axial.get_pixel(0, 0).0[0], 170);
        assert!(engine.frame(ViewportId::Sagittal).is_some());
        assert_eq!(engine.render_count(), 1);
    }

    #[tokio::test]
    async fn resize_without_keeping_camera_resets_presentation() {
        let engine = engine_with_volume().await;
        let zoomed = ViewPresentation {
            zoom: 3.0,
            ..ViewPresentation::default()
        };
        engine.set_view_presentation(ViewportId::Axial, zoomed);

        engine.resize(false, true);
        assert_eq!(engine.view_presentation(ViewportId::Axial), Some(zoomed));

        engine.resize(true, false);
        assert_eq!(
            engine.view_presentation(ViewportId::Axial),
            Some(ViewPresentation::default())
        );
        assert_eq!(engine.render_count(), 1);
    }
}
