//! UI-side copy of each viewport's slice and camera state.
//!
//! The mirror never writes to the rendering engine. It re-reads state whenever
//! the engine notifies a change and exposes the result as text for labels and
//! slider positions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::backend::RenderingEngine;
use crate::config::ViewerConfig;
use crate::enums::{NotificationKind, ViewportId};
use crate::notifications::SubscriptionId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSnapshot {
    pub slice_index: usize,
    pub pan: (f32, f32),
    pub zoom: f32,
    pub rotation_degrees: f32,
    pub slab_thickness: Option<f32>,
}

type Snapshots = Rc<RefCell<BTreeMap<ViewportId, ViewportSnapshot>>>;

pub struct ViewportStateMirror {
    snapshots: Snapshots,
    slice_totals: BTreeMap<ViewportId, usize>,
    engine: Option<Weak<dyn RenderingEngine>>,
    subscriptions: Vec<SubscriptionId>,
}

impl ViewportStateMirror {
    /// Snapshots start from the configured default presentation. The
    /// acquisition viewport shows `image_count` slices and starts near the
    /// middle of the stack, the reconstructed views use the configured count.
    pub fn new(config: &ViewerConfig, image_count: usize) -> Self {
        let presentation = config.default_presentation;
        let derived_start = 255.min(config.derived_slice_count.saturating_sub(1));

        let mut snapshots = BTreeMap::new();
        let mut slice_totals = BTreeMap::new();
        for viewport in ViewportId::ALL {
            let (slice_index, total) = if viewport.is_acquisition() {
                ((image_count / 2).saturating_sub(1), image_count)
            } else {
                (derived_start, config.derived_slice_count)
            };
            snapshots.insert(
                viewport,
                ViewportSnapshot {
                    slice_index,
                    pan: presentation.pan,
                    zoom: presentation.zoom,
                    rotation_degrees: presentation.rotation,
                    slab_thickness: None,
                },
            );
            slice_totals.insert(viewport, total);
        }

        Self {
            snapshots: Rc::new(RefCell::new(snapshots)),
            slice_totals,
            engine: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn snapshot(&self, viewport: ViewportId) -> ViewportSnapshot {
        self.snapshots.borrow()[&viewport]
    }

    /// Copy the engine's slice index into the snapshot. No-op while the
    /// viewport has no slice.
    pub fn on_slice_changed(&self, engine: &dyn RenderingEngine, viewport: ViewportId) {
        apply_slice(&self.snapshots, engine, viewport);
    }

    /// Copy pan, zoom, rotation and slab thickness into the snapshot. Slab
    /// thickness edits arrive as camera notifications too, so it is re-read
    /// every time.
    pub fn on_camera_changed(&self, engine: &dyn RenderingEngine, viewport: ViewportId) {
        apply_camera(&self.snapshots, engine, viewport);
    }

    /// Listen for slice and camera notifications of every viewport the engine
    /// currently knows. Elements are resolved now; viewports created later are
    /// not followed. Any previous subscription is dropped first.
    pub fn subscribe(&mut self, engine: &Rc<dyn RenderingEngine>) {
        self.unsubscribe();

        let bus = engine.notifications();
        for viewport in engine.viewport_ids() {
            let Some(element) = engine.element(viewport) else {
                continue;
            };

            for kind in [NotificationKind::SliceChanged, NotificationKind::CameraModified] {
                let weak_engine = Rc::downgrade(engine);
                let snapshots = Rc::clone(&self.snapshots);
                let id = bus.subscribe(element, kind, move |_| {
                    let Some(engine) = weak_engine.upgrade() else {
                        return;
                    };
                    match kind {
                        NotificationKind::SliceChanged => {
                            apply_slice(&snapshots, engine.as_ref(), viewport)
                        }
                        NotificationKind::CameraModified => {
                            apply_camera(&snapshots, engine.as_ref(), viewport)
                        }
                    }
                });
                self.subscriptions.push(id);
            }
        }

        debug!(
            engine = engine.id(),
            listeners = self.subscriptions.len(),
            "subscribed to viewport notifications"
        );
        self.engine = Some(Rc::downgrade(engine));
    }

    /// Remove exactly the handlers added by [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&mut self) {
        let ids = std::mem::take(&mut self.subscriptions);
        let Some(engine) = self.engine.take().and_then(|weak| weak.upgrade()) else {
            // engine gone, its bus and handlers went with it
            return;
        };
        let bus = engine.notifications();
        let removed = ids.iter().filter(|id| bus.unsubscribe(**id)).count();
        debug!(engine = engine.id(), removed, "unsubscribed from viewport notifications");
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn slice_total(&self, viewport: ViewportId) -> usize {
        self.slice_totals[&viewport]
    }

    /// `"{slice} / {total}"` with a one-based slice number.
    pub fn slice_label(&self, viewport: ViewportId) -> String {
        format!(
            "{} / {}",
            self.snapshot(viewport).slice_index + 1,
            self.slice_total(viewport)
        )
    }

    pub fn slider_range(&self, viewport: ViewportId) -> RangeInclusive<usize> {
        0..=self.slice_total(viewport).saturating_sub(1)
    }

    /// Pan, zoom, rotation and slab thickness, `--` for an unknown thickness.
    pub fn transform_info(&self, viewport: ViewportId) -> String {
        let snapshot = self.snapshot(viewport);
        let slab = snapshot
            .slab_thickness
            .map_or_else(|| "--".to_owned(), |thickness| format!("{thickness:.2}"));
        format!(
            "P: ({:.2}, {:.2}) / Z: {:.2} / R: {:.2} / S: {}",
            snapshot.pan.0, snapshot.pan.1, snapshot.zoom, snapshot.rotation_degrees, slab
        )
    }
}

fn apply_slice(snapshots: &Snapshots, engine: &dyn RenderingEngine, viewport: ViewportId) {
    let Some(index) = engine.slice_index(viewport) else {
        return;
    };
    if let Some(snapshot) = snapshots.borrow_mut().get_mut(&viewport) {
        snapshot.slice_index = index;
    }
}

fn apply_camera(snapshots: &Snapshots, engine: &dyn RenderingEngine, viewport: ViewportId) {
    let Some(presentation) = engine.view_presentation(viewport) else {
        return;
    };
    let slab_thickness = engine.slab_thickness(viewport);
    if let Some(snapshot) = snapshots.borrow_mut().get_mut(&viewport) {
        snapshot.pan = presentation.pan;
        snapshot.zoom = presentation.zoom;
        snapshot.rotation_degrees = presentation.rotation;
        snapshot.slab_thickness = slab_thickness;
    }
}
