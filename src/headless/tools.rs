use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::warn;

use crate::backend::{ToolConfiguration, ToolGroup, ToolRegistry};
use crate::enums::{MouseBinding, ToolMode, ToolName, ViewportId};

#[derive(Default)]
struct ToolState {
    mode: ToolMode,
    bindings: Vec<MouseBinding>,
    configuration: ToolConfiguration,
}

pub struct HeadlessToolGroup {
    id: String,
    registered: Rc<RefCell<BTreeSet<ToolName>>>,
    tools: RefCell<BTreeMap<ToolName, ToolState>>,
    viewports: RefCell<Vec<(ViewportId, String)>>,
}

impl HeadlessToolGroup {
    /// Rendering engine the viewport was attached with.
    pub fn rendering_engine_of(&self, viewport: ViewportId) -> Option<String> {
        self.viewports
            .borrow()
            .iter()
            .find(|(id, _)| *id == viewport)
            .map(|(_, engine)| engine.clone())
    }

    #[cfg(test)]
    pub fn bindings(&self, tool: ToolName) -> Vec<MouseBinding> {
        self.tools
            .borrow()
            .get(&tool)
            .map(|state| state.bindings.clone())
            .unwrap_or_default()
    }

    fn with_tool(&self, tool: ToolName, f: impl FnOnce(&mut ToolState)) {
        match self.tools.borrow_mut().get_mut(&tool) {
            Some(state) => f(state),
            None => warn!(tool_group = %self.id, ?tool, "tool is not part of the group"),
        }
    }
}

impl ToolGroup for HeadlessToolGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn add_tool(&self, tool: ToolName, configuration: ToolConfiguration) {
        if !self.registered.borrow().contains(&tool) {
            warn!(tool_group = %self.id, ?tool, "tool must be registered before it is added");
            return;
        }
        self.tools.borrow_mut().insert(
            tool,
            ToolState {
                mode: ToolMode::Passive,
                bindings: Vec::new(),
                configuration,
            },
        );
    }

    /// A binding belongs to one tool at a time. Tools losing their last
    /// binding drop back to passive.
    fn set_tool_active(&self, tool: ToolName, bindings: &[MouseBinding]) {
        if !self.tools.borrow().contains_key(&tool) {
            warn!(tool_group = %self.id, ?tool, "tool is not part of the group");
            return;
        }

        let mut tools = self.tools.borrow_mut();
        for (other, state) in tools.iter_mut() {
            if *other == tool {
                continue;
            }
            let had_bindings = !state.bindings.is_empty();
            state.bindings.retain(|binding| !bindings.contains(binding));
            if had_bindings && state.bindings.is_empty() && state.mode == ToolMode::Active {
                state.mode = ToolMode::Passive;
            }
        }
        if let Some(state) = tools.get_mut(&tool) {
            state.mode = ToolMode::Active;
            for binding in bindings {
                if !state.bindings.contains(binding) {
                    state.bindings.push(*binding);
                }
            }
        }
    }

    fn set_tool_enabled(&self, tool: ToolName) {
        self.with_tool(tool, |state| {
            state.mode = ToolMode::Enabled;
            state.bindings.clear();
        });
    }

    fn set_tool_disabled(&self, tool: ToolName) {
        self.with_tool(tool, |state| {
            state.mode = ToolMode::Disabled;
            state.bindings.clear();
        });
    }

    fn tool_mode(&self, tool: ToolName) -> Option<ToolMode> {
        self.tools.borrow().get(&tool).map(|state| state.mode)
    }

    fn add_viewport(&self, viewport: ViewportId, rendering_engine_id: &str) {
        let mut viewports = self.viewports.borrow_mut();
        if viewports.iter().all(|(id, _)| *id != viewport) {
            viewports.push((viewport, rendering_engine_id.to_owned()));
        }
    }

    fn viewport_ids(&self) -> Vec<ViewportId> {
        self.viewports.borrow().iter().map(|(id, _)| *id).collect()
    }

    fn tool_configuration(&self, tool: ToolName) -> Option<ToolConfiguration> {
        self.tools
            .borrow()
            .get(&tool)
            .map(|state| state.configuration.clone())
    }

    fn set_tool_configuration(&self, tool: ToolName, configuration: ToolConfiguration) {
        self.with_tool(tool, |state| state.configuration = configuration);
    }

    fn active_primary_tool(&self) -> Option<ToolName> {
        self.tools
            .borrow()
            .iter()
            .find(|(_, state)| {
                state.mode == ToolMode::Active && state.bindings.contains(&MouseBinding::Primary)
            })
            .map(|(tool, _)| *tool)
    }
}

#[derive(Default)]
pub struct HeadlessToolGroupManager {
    registered: Rc<RefCell<BTreeSet<ToolName>>>,
    groups: RefCell<BTreeMap<String, Rc<HeadlessToolGroup>>>,
}

impl HeadlessToolGroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headless_group(&self, id: &str) -> Option<Rc<HeadlessToolGroup>> {
        self.groups.borrow().get(id).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.groups.borrow().len()
    }
}

impl ToolRegistry for HeadlessToolGroupManager {
    fn add_tool(&self, tool: ToolName) {
        self.registered.borrow_mut().insert(tool);
    }

    fn create_tool_group(&self, id: &str) -> Option<Rc<dyn ToolGroup>> {
        let mut groups = self.groups.borrow_mut();
        if groups.contains_key(id) {
            return None;
        }
        let group = Rc::new(HeadlessToolGroup {
            id: id.to_owned(),
            registered: Rc::clone(&self.registered),
            tools: RefCell::new(BTreeMap::new()),
            viewports: RefCell::new(Vec::new()),
        });
        groups.insert(id.to_owned(), Rc::clone(&group));
        Some(group)
    }

    fn get_tool_group(&self, id: &str) -> Option<Rc<dyn ToolGroup>> {
        let group = self.groups.borrow().get(id).cloned()?;
        Some(group)
    }

    fn destroy_tool_group(&self, id: &str) -> bool {
        self.groups.borrow_mut().remove(id).is_some()
    }
}
