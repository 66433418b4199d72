use std::cell::RefCell;

use uuid::Uuid;

use crate::backend::{Annotation, AnnotationManager, AnnotationMetadata};
use crate::config::{AnnotationStyles, ToolStyle};
use crate::enums::ViewportId;

/// Annotations in creation order plus the default style sheet.
pub struct AnnotationStore {
    annotations: RefCell<Vec<Annotation>>,
    styles: RefCell<AnnotationStyles>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        let global = ToolStyle {
            color: Some("rgb(255, 255, 0)".to_owned()),
            color_highlighted: Some("rgb(0, 255, 0)".to_owned()),
            color_selected: Some("rgb(0, 220, 0)".to_owned()),
            line_width: Some(1.0),
            line_dash: Some(String::new()),
            text_box_font_size: Some("14px".to_owned()),
            text_box_color: Some("rgb(255, 255, 0)".to_owned()),
            text_box_color_highlighted: Some("rgb(0, 255, 0)".to_owned()),
            text_box_color_selected: Some("rgb(0, 255, 0)".to_owned()),
        };
        Self {
            annotations: RefCell::new(Vec::new()),
            styles: RefCell::new(AnnotationStyles {
                global,
                ..AnnotationStyles::default()
            }),
        }
    }

    /// Store a new annotation as a tool would after a completed drag.
    pub fn add_annotation(
        &self,
        tool_name: &str,
        viewport: Option<ViewportId>,
        highlighted: bool,
    ) -> Uuid {
        let uid = Uuid::new_v4();
        self.annotations.borrow_mut().push(Annotation {
            uid,
            metadata: AnnotationMetadata {
                tool_name: tool_name.to_owned(),
                viewport,
            },
            highlighted,
        });
        uid
    }

    #[cfg(test)]
    pub fn set_highlighted(&self, uid: Uuid, highlighted: bool) -> bool {
        let mut annotations = self.annotations.borrow_mut();
        match annotations.iter_mut().find(|annotation| annotation.uid == uid) {
            Some(annotation) => {
                annotation.highlighted = highlighted;
                true
            }
            None => false,
        }
    }
}

impl AnnotationManager for AnnotationStore {
    fn all_annotations(&self) -> Vec<Annotation> {
        self.annotations.borrow().clone()
    }

    fn remove_annotation(&self, uid: Uuid) -> bool {
        let mut annotations = self.annotations.borrow_mut();
        let before = annotations.len();
        annotations.retain(|annotation| annotation.uid != uid);
        annotations.len() != before
    }

    fn default_styles(&self) -> AnnotationStyles {
        self.styles.borrow().clone()
    }

    fn set_default_styles(&self, styles: AnnotationStyles) {
        *self.styles.borrow_mut() = styles;
    }
}
