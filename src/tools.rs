//! Primary tool switching and measurement housekeeping.
//!
//! Zoom, pan and wheel scrolling stay bound for the whole session. Crosshairs
//! and length measurement share the primary mouse button; the controller keeps
//! exactly one of them active. Nothing is cached here: every call reads the
//! current state back from the tool group.

use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::backend::{
    AnnotationManager, RenderingEngine, ToolConfiguration, ToolGroup, ToolRegistry,
};
use crate::config::ViewerConfig;
use crate::enums::{MouseBinding, PrimaryTool, ToolName, ViewportId};

pub struct ToolActivationController {
    tools: Rc<dyn ToolRegistry>,
    annotations: Rc<dyn AnnotationManager>,
    engine: Weak<dyn RenderingEngine>,
    tool_group_id: String,
}

impl ToolActivationController {
    pub fn new(
        tools: Rc<dyn ToolRegistry>,
        annotations: Rc<dyn AnnotationManager>,
        engine: &Rc<dyn RenderingEngine>,
        tool_group_id: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            annotations,
            engine: Rc::downgrade(engine),
            tool_group_id: tool_group_id.into(),
        }
    }

    fn tool_group(&self) -> Option<Rc<dyn ToolGroup>> {
        self.tools.get_tool_group(&self.tool_group_id)
    }

    fn render(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.render();
        }
    }

    /// Register the tools, create the group with the fixed secondary,
    /// auxiliary and wheel bindings and apply the annotation styles. Returns
    /// `false` if the group could not be created.
    pub fn init_tool_group(&self, config: &ViewerConfig) -> bool {
        for tool in ToolName::ALL {
            self.tools.add_tool(tool);
        }

        let Some(group) = self.tools.create_tool_group(&self.tool_group_id) else {
            warn!(tool_group = %self.tool_group_id, "tool group could not be created");
            return false;
        };

        for tool in ToolName::ALL {
            let configuration = match tool {
                ToolName::Crosshairs => ToolConfiguration {
                    reference_line_colors: Some(config.reference_line_colors.clone()),
                    ..ToolConfiguration::default()
                },
                _ => ToolConfiguration::default(),
            };
            group.add_tool(tool, configuration);
        }

        group.set_tool_active(ToolName::Zoom, &[MouseBinding::Secondary]);
        group.set_tool_active(ToolName::Pan, &[MouseBinding::Auxiliary]);
        group.set_tool_active(ToolName::StackScrollWheel, &[MouseBinding::Wheel]);

        let styles = self.annotations.default_styles().merged(&config.styles);
        self.annotations.set_default_styles(styles);

        info!(tool_group = %self.tool_group_id, "tool group initialized");
        true
    }

    /// Bind `tool` to the primary button. The other primary tool is left
    /// enabled (length annotations stay visible) or disabled (crosshairs).
    pub fn select_primary_tool(&self, tool: PrimaryTool) {
        let Some(group) = self.tool_group() else {
            debug!(?tool, "no tool group, ignoring tool selection");
            return;
        };

        if group.viewport_ids().is_empty() {
            if let Some(engine) = self.engine.upgrade() {
                for viewport in ViewportId::ALL {
                    group.add_viewport(viewport, engine.id());
                }
            }
        }

        match tool {
            PrimaryTool::Crosshairs => {
                group.set_tool_active(ToolName::Crosshairs, &[MouseBinding::Primary]);
                group.set_tool_enabled(ToolName::Length);
            }
            PrimaryTool::Length => {
                group.set_tool_disabled(ToolName::Crosshairs);
                group.set_tool_active(ToolName::Length, &[MouseBinding::Primary]);
            }
        }
        debug!(?tool, "primary tool selected");
    }

    /// The primary tool the tool group currently has active.
    pub fn primary_tool(&self) -> Option<PrimaryTool> {
        let tool = self.tool_group()?.active_primary_tool()?;
        PrimaryTool::try_from(tool).ok()
    }

    /// Color the crosshairs draw the reference line of `viewport` with.
    pub fn reference_line_color(&self, viewport: ViewportId) -> Option<String> {
        let configuration = self
            .tool_group()?
            .tool_configuration(ToolName::Crosshairs)?;
        configuration
            .reference_line_colors
            .map(|colors| colors.for_viewport(viewport).to_owned())
    }

    /// Remove every highlighted length measurement. Only acts while length
    /// is the primary tool. Returns the number of removed annotations.
    pub fn delete_highlighted_measurement(&self) -> usize {
        if self.primary_tool() != Some(PrimaryTool::Length) {
            return 0;
        }
        self.remove_length_annotations(true)
    }

    /// Remove every length measurement, highlighted or not.
    pub fn clear_all_measurements(&self) -> usize {
        self.remove_length_annotations(false)
    }

    fn remove_length_annotations(&self, highlighted_only: bool) -> usize {
        let targets: Vec<_> = self
            .annotations
            .all_annotations()
            .into_iter()
            .filter(|annotation| annotation.is_from(ToolName::Length))
            .filter(|annotation| !highlighted_only || annotation.highlighted)
            .map(|annotation| annotation.uid)
            .collect();

        let mut removed = 0;
        for uid in targets {
            if self.annotations.remove_annotation(uid) {
                removed += 1;
            }
        }

        debug!(removed, highlighted_only, "removed length measurements");
        self.render();
        removed
    }

    /// Flip the wheel tool's slab scrolling and return the new value, `None`
    /// without a tool group or wheel tool.
    pub fn toggle_slab_scroll(&self) -> Option<bool> {
        let group = self.tool_group()?;
        let mut configuration = group.tool_configuration(ToolName::StackScrollWheel)?;
        configuration.scroll_slabs = !configuration.scroll_slabs;
        let scroll_slabs = configuration.scroll_slabs;
        group.set_tool_configuration(ToolName::StackScrollWheel, configuration);
        debug!(scroll_slabs, "slab scrolling toggled");
        Some(scroll_slabs)
    }
}
