//! Declarative viewer configuration.
//!
//! Defaults reproduce the stock viewer: three CT viewports, a streaming
//! volume, orange dashed length measurements and colored crosshair reference
//! lines. Hosts can override any field from JSON; missing fields keep their
//! defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{SortBy, ToolName, ViewportId};
use crate::error::ViewerError;
use crate::ids::VolumeId;
use crate::presentation::ViewPresentation;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub rendering_engine_id: String,
    pub tool_group_id: String,
    pub viewport_names: ViewportNames,
    pub volume_loader_scheme: String,
    pub volume_name: String,
    pub sort_by: SortBy,
    /// Slice count shown for the reconstructed coronal and sagittal views.
    pub derived_slice_count: usize,
    pub voi_range: VoiRange,
    pub default_presentation: ViewPresentation,
    /// Width and height of the image area relative to the canvas.
    pub display_ratio: f32,
    pub styles: AnnotationStyles,
    pub reference_line_colors: ReferenceLineColors,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            rendering_engine_id: "MY_RENDERING_ENGINE_ID".to_owned(),
            tool_group_id: "TOOL_GROUP_ID".to_owned(),
            viewport_names: ViewportNames::default(),
            volume_loader_scheme: "cornerstoneStreamingImageVolume".to_owned(),
            volume_name: "CT_VOLUME_ID".to_owned(),
            sort_by: SortBy::ImagePositionPatient,
            derived_slice_count: 512,
            voi_range: VoiRange {
                lower: -300.0,
                upper: 1400.0,
            },
            default_presentation: ViewPresentation {
                zoom: 1.1,
                ..ViewPresentation::default()
            },
            display_ratio: 1.0,
            styles: AnnotationStyles::length_overrides(),
            reference_line_colors: ReferenceLineColors::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn volume_id(&self) -> VolumeId {
        VolumeId::new(&self.volume_loader_scheme, &self.volume_name)
    }

    pub fn viewport_name(&self, viewport: ViewportId) -> &str {
        match viewport {
            ViewportId::Axial => &self.viewport_names.axial,
            ViewportId::Coronal => &self.viewport_names.coronal,
            ViewportId::Sagittal => &self.viewport_names.sagittal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportNames {
    pub axial: String,
    pub coronal: String,
    pub sagittal: String,
}

impl Default for ViewportNames {
    fn default() -> Self {
        Self {
            axial: "CT_AXIAL".to_owned(),
            coronal: "CT_CORONAL".to_owned(),
            sagittal: "CT_SAGITTAL".to_owned(),
        }
    }
}

/// Window applied when mapping voxel values to gray levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiRange {
    pub lower: f32,
    pub upper: f32,
}

impl VoiRange {
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceLineColors {
    pub axial: String,
    pub coronal: String,
    pub sagittal: String,
}

impl Default for ReferenceLineColors {
    fn default() -> Self {
        Self {
            axial: "rgb(200, 0, 0)".to_owned(),
            coronal: "rgb(200, 100, 0)".to_owned(),
            sagittal: "rgb(0, 200, 0)".to_owned(),
        }
    }
}

impl ReferenceLineColors {
    pub fn for_viewport(&self, viewport: ViewportId) -> &str {
        match viewport {
            ViewportId::Axial => &self.axial,
            ViewportId::Coronal => &self.coronal,
            ViewportId::Sagittal => &self.sagittal,
        }
    }
}

/// Style properties of one tool. Unset fields inherit from the back end's
/// defaults when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolStyle {
    pub color: Option<String>,
    pub color_highlighted: Option<String>,
    pub color_selected: Option<String>,
    pub line_width: Option<f32>,
    pub line_dash: Option<String>,
    pub text_box_font_size: Option<String>,
    pub text_box_color: Option<String>,
    pub text_box_color_highlighted: Option<String>,
    pub text_box_color_selected: Option<String>,
}

impl ToolStyle {
    /// Overwrite every field `other` sets.
    pub fn merge(&mut self, other: &ToolStyle) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
        take(&mut self.color, &other.color);
        take(&mut self.color_highlighted, &other.color_highlighted);
        take(&mut self.color_selected, &other.color_selected);
        take(&mut self.line_width, &other.line_width);
        take(&mut self.line_dash, &other.line_dash);
        take(&mut self.text_box_font_size, &other.text_box_font_size);
        take(&mut self.text_box_color, &other.text_box_color);
        take(&mut self.text_box_color_highlighted, &other.text_box_color_highlighted);
        take(&mut self.text_box_color_selected, &other.text_box_color_selected);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyles {
    pub global: ToolStyle,
    pub tools: BTreeMap<ToolName, ToolStyle>,
}

impl AnnotationStyles {
    /// Orange, dashed length measurements turning red when hovered.
    pub fn length_overrides() -> Self {
        let length = ToolStyle {
            color: Some("#d70".to_owned()),
            color_highlighted: Some("#f00".to_owned()),
            color_selected: Some("#f90".to_owned()),
            text_box_font_size: Some("0.75rem".to_owned()),
            text_box_color: Some("#d70".to_owned()),
            text_box_color_highlighted: Some("#f00".to_owned()),
            text_box_color_selected: Some("#f90".to_owned()),
            ..ToolStyle::default()
        };
        Self {
            global: ToolStyle {
                line_dash: Some("5,3".to_owned()),
                ..ToolStyle::default()
            },
            tools: BTreeMap::from([(ToolName::Length, length)]),
        }
    }

    /// Deep merge: per-tool styles are merged field by field, tools missing
    /// from `self` are added.
    pub fn merged(&self, overrides: &AnnotationStyles) -> Self {
        let mut merged = self.clone();
        merged.global.merge(&overrides.global);
        for (tool, style) in &overrides.tools {
            merged.tools.entry(*tool).or_default().merge(style);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_volume_id_uses_loader_scheme() {
        let config = ViewerConfig::default();
        assert_eq!(
            config.volume_id().to_string(),
            "cornerstoneStreamingImageVolume:CT_VOLUME_ID"
        );
        assert_eq!(config.viewport_name(ViewportId::Sagittal), "CT_SAGITTAL");
    }

    #[test]
    fn json_overrides_keep_remaining_defaults() {
        let config = ViewerConfig::from_json(
            r#"{ "tool_group_id": "MPR_TOOLS", "voi_range": { "lower": 0.0, "upper": 80.0 } }"#,
        )
        .expect("should parse partial config");
        assert_eq!(config.tool_group_id, "MPR_TOOLS");
        assert_eq!(config.voi_range.width(), 80.0);
        assert_eq!(config.rendering_engine_id, "MY_RENDERING_ENGINE_ID");
        assert_eq!(config.derived_slice_count, 512);
        assert_eq!(config.default_presentation.zoom, 1.1);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            ViewerConfig::from_json("{ not json"),
            Err(ViewerError::Config(_))
        ));
    }

    #[test]
    fn merged_styles_keep_unset_defaults() {
        let defaults = AnnotationStyles {
            global: ToolStyle {
                color: Some("rgb(255, 255, 0)".to_owned()),
                line_width: Some(1.0),
                line_dash: Some(String::new()),
                ..ToolStyle::default()
            },
            tools: BTreeMap::new(),
        };

        let merged = defaults.merged(&AnnotationStyles::length_overrides());

        assert_eq!(merged.global.color.as_deref(), Some("rgb(255, 255, 0)"));
        assert_eq!(merged.global.line_width, Some(1.0));
        assert_eq!(merged.global.line_dash.as_deref(), Some("5,3"));
        let length = &merged.tools[&ToolName::Length];
        assert_eq!(length.color_highlighted.as_deref(), Some("#f00"));
        assert_eq!(length.text_box_font_size.as_deref(), Some("0.75rem"));
    }
}
