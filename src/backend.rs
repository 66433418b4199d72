//! Interfaces of the rendering, loading and tooling back end.
//!
//! The viewer never owns render state. It drives a back end through these
//! traits and mirrors what the back end reports. All handles are `Rc` and the
//! traits take `&self`: implementations keep their state behind `RefCell`s so
//! that notification handlers can query the back end while it is emitting.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use uuid::Uuid;

use crate::config::{AnnotationStyles, ReferenceLineColors, VoiRange};
use crate::enums::{BlendMode, MouseBinding, Orientation, ToolMode, ToolName, ViewportId};
use crate::error::BackendError;
use crate::ids::{ImageId, VolumeId};
use crate::notifications::{ElementId, NotificationBus};
use crate::presentation::ViewPresentation;
use crate::volume::Volume;
use crate::volume_loader::{ImageFrame, VolumeLoaderError};

/// Builds a volume from the decoded frames of its image ids.
pub type VolumeLoaderFn = Rc<dyn Fn(Vec<ImageFrame>) -> Result<Volume, VolumeLoaderError>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportInput {
    pub viewport: ViewportId,
    /// Host-facing string id of the viewport.
    pub name: String,
    pub orientation: Orientation,
    /// Fraction of the canvas covered by the image, `(width, height)`.
    pub display_area: (f32, f32),
}

/// Properties applied with [`RenderingEngine::set_properties`]. `None` leaves
/// the current value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportProperties {
    pub voi_range: Option<VoiRange>,
    pub slab_thickness: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHandle {
    pub id: VolumeId,
    pub image_count: usize,
}

pub trait RenderingEngine {
    fn id(&self) -> &str;

    /// Replace all viewports. Elements are allocated by the engine.
    fn set_viewports(&self, inputs: &[ViewportInput]);
    fn viewport_ids(&self) -> Vec<ViewportId>;
    fn element(&self, viewport: ViewportId) -> Option<ElementId>;

    fn view_presentation(&self, viewport: ViewportId) -> Option<ViewPresentation>;
    fn set_view_presentation(&self, viewport: ViewportId, presentation: ViewPresentation);
    fn slab_thickness(&self, viewport: ViewportId) -> Option<f32>;
    fn set_properties(&self, viewport: ViewportId, properties: ViewportProperties);
    fn set_blend_mode(&self, viewport: ViewportId, mode: BlendMode);
    fn reset_camera(&self, viewport: ViewportId);

    fn slice_index(&self, viewport: ViewportId) -> Option<usize>;
    fn number_of_slices(&self, viewport: ViewportId) -> Option<usize>;
    fn jump_to_slice(&self, element: ElementId, index: usize);

    fn set_volume_for_viewports<'a>(
        &'a self,
        volume: &'a VolumeId,
        viewports: &'a [ViewportId],
    ) -> LocalBoxFuture<'a, Result<(), BackendError>>;

    fn resize(&self, immediate: bool, keep_camera: bool);
    fn render(&self);
    fn render_viewports(&self, viewports: &[ViewportId]);

    fn notifications(&self) -> &NotificationBus;
}

pub trait VolumeLoading {
    fn register_volume_loader(&self, scheme: &str, loader: VolumeLoaderFn);

    /// Register a volume under `volume` without loading its voxels.
    fn create_and_cache_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        image_ids: &'a [ImageId],
    ) -> LocalBoxFuture<'a, Result<VolumeHandle, BackendError>>;

    /// Load the voxels of a cached volume, calling `on_complete` once they
    /// are available.
    fn load_volume(
        &self,
        volume: &VolumeId,
        on_complete: Box<dyn FnOnce()>,
    ) -> Result<(), BackendError>;

    /// Prefetch images into the image cache, returning how many were loaded.
    fn load_and_cache_images<'a>(
        &'a self,
        image_ids: &'a [ImageId],
    ) -> LocalBoxFuture<'a, Result<usize, BackendError>>;

    fn purge_cache(&self);
    fn purge_volume_cache(&self);
}

/// Per-tool configuration held by a tool group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolConfiguration {
    /// Let the scroll wheel move by slab thickness instead of one slice.
    pub scroll_slabs: bool,
    pub reference_line_colors: Option<ReferenceLineColors>,
}

pub trait ToolGroup {
    fn id(&self) -> &str;
    fn add_tool(&self, tool: ToolName, configuration: ToolConfiguration);
    fn set_tool_active(&self, tool: ToolName, bindings: &[MouseBinding]);
    fn set_tool_enabled(&self, tool: ToolName);
    fn set_tool_disabled(&self, tool: ToolName);
    fn tool_mode(&self, tool: ToolName) -> Option<ToolMode>;
    fn add_viewport(&self, viewport: ViewportId, rendering_engine_id: &str);
    fn viewport_ids(&self) -> Vec<ViewportId>;
    fn tool_configuration(&self, tool: ToolName) -> Option<ToolConfiguration>;
    fn set_tool_configuration(&self, tool: ToolName, configuration: ToolConfiguration);
    /// Tool currently bound to the primary mouse button.
    fn active_primary_tool(&self) -> Option<ToolName>;
}

pub trait ToolRegistry {
    fn add_tool(&self, tool: ToolName);
    /// `None` when a group with this id already exists.
    fn create_tool_group(&self, id: &str) -> Option<Rc<dyn ToolGroup>>;
    fn get_tool_group(&self, id: &str) -> Option<Rc<dyn ToolGroup>>;
    fn destroy_tool_group(&self, id: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationMetadata {
    /// Tag of the tool that created the annotation.
    pub tool_name: String,
    pub viewport: Option<ViewportId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub uid: Uuid,
    pub metadata: AnnotationMetadata,
    /// Set by the back end, e.g. while the pointer hovers the annotation.
    pub highlighted: bool,
}

impl Annotation {
    pub fn is_from(&self, tool: ToolName) -> bool {
        self.metadata.tool_name == tool.as_str()
    }
}

pub trait AnnotationManager {
    fn all_annotations(&self) -> Vec<Annotation>;
    fn remove_annotation(&self, uid: Uuid) -> bool;
    fn default_styles(&self) -> AnnotationStyles;
    fn set_default_styles(&self, styles: AnnotationStyles);
}

/// Everything a viewer session needs from the back end, handed over
/// explicitly instead of being looked up from globals.
pub trait Backend {
    fn init(&self) -> LocalBoxFuture<'_, Result<(), BackendError>>;
    fn create_rendering_engine(&self, id: &str) -> Result<Rc<dyn RenderingEngine>, BackendError>;
    fn destroy_rendering_engine(&self, id: &str) -> bool;
    fn volumes(&self) -> Rc<dyn VolumeLoading>;
    fn tools(&self) -> Rc<dyn ToolRegistry>;
    fn annotations(&self) -> Rc<dyn AnnotationManager>;
}
