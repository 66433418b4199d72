//! Lifetime of one mounted viewer.
//!
//! A [`ViewerSession`] owns nothing the back end renders with. It runs the
//! initialization chain against a [`Backend`], keeps the handles that chain
//! produced and releases them again on [`teardown`](ViewerSession::teardown).
//! Every action is a no-op while its engine, viewport or tool group is
//! missing, so controls may fire during startup or after unmount.

use std::cell::{Cell, RefCell};
use std::ops::RangeInclusive;
use std::rc::Rc;

use tracing::{debug, info};
use web_time::Instant;

use crate::backend::{Backend, RenderingEngine, ViewportInput, ViewportProperties};
use crate::config::ViewerConfig;
use crate::enums::{BlendMode, PrimaryTool, ViewportId};
use crate::error::ViewerError;
use crate::ids::ImageId;
use crate::mirror::{ViewportSnapshot, ViewportStateMirror};
use crate::presentation::Transform;
use crate::tools::ToolActivationController;
use crate::volume_loader::VolumeLoader;

pub struct ViewerSession {
    backend: Rc<dyn Backend>,
    config: ViewerConfig,
    image_ids: Vec<ImageId>,
    mounted: Cell<bool>,
    shown: Cell<bool>,
    volume_loaded: Rc<Cell<bool>>,
    engine: RefCell<Option<Rc<dyn RenderingEngine>>>,
    controller: RefCell<Option<Rc<ToolActivationController>>>,
    mirror: RefCell<ViewportStateMirror>,
}

impl ViewerSession {
    /// Mount a session. Nothing is requested from the back end until
    /// [`init`](Self::init) runs.
    pub fn new(backend: Rc<dyn Backend>, config: ViewerConfig, image_ids: Vec<ImageId>) -> Self {
        let mirror = ViewportStateMirror::new(&config, image_ids.len());
        Self {
            backend,
            config,
            image_ids,
            mounted: Cell::new(true),
            shown: Cell::new(false),
            volume_loaded: Rc::new(Cell::new(false)),
            engine: RefCell::new(None),
            controller: RefCell::new(None),
            mirror: RefCell::new(mirror),
        }
    }

    /// Run the initialization chain. Steps run strictly in order and the
    /// viewer is shown only once all of them succeeded. A session torn down
    /// while a step is pending stops after that step without error.
    pub async fn init(&self) -> Result<(), ViewerError> {
        let started = Instant::now();

        self.backend.init().await?;
        if !self.still_mounted("back end init") {
            return Ok(());
        }
        let engine = self
            .backend
            .create_rendering_engine(&self.config.rendering_engine_id)?;
        *self.engine.borrow_mut() = Some(Rc::clone(&engine));

        let volumes = self.backend.volumes();
        volumes.register_volume_loader(
            &self.config.volume_loader_scheme,
            VolumeLoader::streaming(self.config.sort_by),
        );

        let controller = Rc::new(ToolActivationController::new(
            self.backend.tools(),
            self.backend.annotations(),
            &engine,
            &self.config.tool_group_id,
        ));
        if !controller.init_tool_group(&self.config) {
            return Err(ViewerError::ToolGroup(self.config.tool_group_id.clone()));
        }
        *self.controller.borrow_mut() = Some(Rc::clone(&controller));

        let prefetched = volumes.load_and_cache_images(&self.image_ids).await?;
        if !self.still_mounted("image prefetch") {
            return Ok(());
        }
        debug!(prefetched, "images prefetched");

        let volume_id = self.config.volume_id();
        let handle = volumes
            .create_and_cache_volume(&volume_id, &self.image_ids)
            .await?;
        if !self.still_mounted("volume creation") {
            return Ok(());
        }

        let inputs: Vec<_> = ViewportId::ALL
            .iter()
            .map(|&viewport| ViewportInput {
                viewport,
                name: self.config.viewport_name(viewport).to_owned(),
                orientation: viewport.default_orientation(),
                display_area: (self.config.display_ratio, self.config.display_ratio),
            })
            .collect();
        engine.set_viewports(&inputs);

        let loaded = Rc::clone(&self.volume_loaded);
        volumes.load_volume(&handle.id, Box::new(move || loaded.set(true)))?;

        engine
            .set_volume_for_viewports(&handle.id, &ViewportId::ALL)
            .await?;
        if !self.still_mounted("volume binding") {
            return Ok(());
        }
        engine.render();

        for viewport in ViewportId::ALL {
            engine.set_properties(
                viewport,
                ViewportProperties {
                    voi_range: Some(self.config.voi_range),
                    slab_thickness: None,
                },
            );
        }
        engine.render_viewports(&ViewportId::ALL);

        self.mirror.borrow_mut().subscribe(&engine);
        controller.select_primary_tool(PrimaryTool::default());

        self.shown.set(true);
        info!(
            volume = %handle.id,
            images = handle.image_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "viewer initialized"
        );
        Ok(())
    }

    fn still_mounted(&self, step: &str) -> bool {
        let mounted = self.mounted.get();
        if !mounted {
            debug!(step, "session unmounted, stopping initialization");
            // the finished step may have refilled caches teardown already purged
            let volumes = self.backend.volumes();
            volumes.purge_volume_cache();
            volumes.purge_cache();
        }
        mounted
    }

    /// Release everything in reverse order of acquisition. Safe to call more
    /// than once and before `init` finished.
    pub fn teardown(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        self.shown.set(false);

        self.mirror.borrow_mut().unsubscribe();

        let volumes = self.backend.volumes();
        volumes.purge_volume_cache();
        volumes.purge_cache();
        self.volume_loaded.set(false);

        if self.controller.borrow_mut().take().is_some() {
            self.backend
                .tools()
                .destroy_tool_group(&self.config.tool_group_id);
        }

        let engine = self.engine.borrow_mut().take();
        if let Some(engine) = engine {
            self.backend.destroy_rendering_engine(engine.id());
        }
        info!("viewer session torn down");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Gate for every control of the viewer.
    pub fn is_shown(&self) -> bool {
        self.shown.get()
    }

    pub fn is_volume_loaded(&self) -> bool {
        self.volume_loaded.get()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn rendering_engine(&self) -> Option<Rc<dyn RenderingEngine>> {
        self.engine.borrow().clone()
    }

    fn shown_controller(&self) -> Option<Rc<ToolActivationController>> {
        if !self.is_shown() {
            return None;
        }
        self.controller.borrow().clone()
    }

    pub fn scroll_to_slice(&self, viewport: ViewportId, index: usize) {
        let Some(engine) = self.rendering_engine() else {
            return;
        };
        if let Some(element) = engine.element(viewport) {
            engine.jump_to_slice(element, index);
        }
    }

    /// Turn every viewport a quarter clockwise.
    pub fn rotate_90(&self) {
        let Some(engine) = self.rendering_engine() else {
            return;
        };
        for viewport in engine.viewport_ids() {
            if let Some(presentation) = engine.view_presentation(viewport) {
                engine.set_view_presentation(viewport, presentation.apply(Transform::Rotate90));
            }
        }
        engine.render();
    }

    pub fn reset_camera(&self) {
        let Some(engine) = self.rendering_engine() else {
            return;
        };
        for viewport in engine.viewport_ids() {
            engine.reset_camera(viewport);
        }
        engine.render();
    }

    /// Show every viewport as a maximum intensity projection over `thickness`.
    pub fn set_slab_thickness(&self, thickness: f32) {
        let Some(engine) = self.rendering_engine() else {
            return;
        };
        for viewport in engine.viewport_ids() {
            engine.set_properties(
                viewport,
                ViewportProperties {
                    slab_thickness: Some(thickness),
                    ..ViewportProperties::default()
                },
            );
            engine.set_blend_mode(viewport, BlendMode::MaximumIntensity);
        }
        engine.render();
    }

    /// Resize the canvases without losing pan, zoom or rotation.
    pub fn handle_resize(&self) {
        let Some(engine) = self.rendering_engine() else {
            return;
        };
        let presentations: Vec<_> = engine
            .viewport_ids()
            .into_iter()
            .filter_map(|viewport| Some((viewport, engine.view_presentation(viewport)?)))
            .collect();

        engine.resize(true, true);

        for (viewport, presentation) in presentations {
            engine.set_view_presentation(viewport, presentation);
        }
    }

    pub fn select_primary_tool(&self, tool: PrimaryTool) {
        if let Some(controller) = self.shown_controller() {
            controller.select_primary_tool(tool);
        }
    }

    pub fn primary_tool(&self) -> Option<PrimaryTool> {
        self.shown_controller()?.primary_tool()
    }

    pub fn delete_highlighted_measurement(&self) -> usize {
        self.shown_controller()
            .map_or(0, |controller| controller.delete_highlighted_measurement())
    }

    pub fn clear_all_measurements(&self) -> usize {
        self.shown_controller()
            .map_or(0, |controller| controller.clear_all_measurements())
    }

    pub fn toggle_slab_scroll(&self) -> Option<bool> {
        self.shown_controller()?.toggle_slab_scroll()
    }

    /// Color of the crosshairs reference line drawn for `viewport`.
    pub fn reference_line_color(&self, viewport: ViewportId) -> Option<String> {
        self.shown_controller()?.reference_line_color(viewport)
    }

    pub fn snapshot(&self, viewport: ViewportId) -> ViewportSnapshot {
        self.mirror.borrow().snapshot(viewport)
    }

    pub fn slice_label(&self, viewport: ViewportId) -> String {
        self.mirror.borrow().slice_label(viewport)
    }

    pub fn slider_range(&self, viewport: ViewportId) -> RangeInclusive<usize> {
        self.mirror.borrow().slider_range(viewport)
    }

    pub fn transform_info(&self, viewport: ViewportId) -> String {
        self.mirror.borrow().transform_info(viewport)
    }

    pub fn subscription_count(&self) -> usize {
        self.mirror.borrow().subscription_count()
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
