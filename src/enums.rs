use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Native plane of the acquired images. Data sets are assumed to be axial.
    Acquisition,
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    /// The anatomical plane the orientation samples from the volume.
    pub fn plane(self) -> Self {
        match self {
            Orientation::Acquisition => Orientation::Axial,
            other => other,
        }
    }
}

/// The three viewports of the viewer. The set is fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViewportId {
    Axial,
    Coronal,
    Sagittal,
}

impl ViewportId {
    pub const ALL: [ViewportId; 3] = [ViewportId::Axial, ViewportId::Coronal, ViewportId::Sagittal];

    /// Orientation the viewport is created with.
    pub fn default_orientation(self) -> Orientation {
        match self {
            ViewportId::Axial => Orientation::Acquisition,
            ViewportId::Coronal => Orientation::Coronal,
            ViewportId::Sagittal => Orientation::Sagittal,
        }
    }

    /// Whether the viewport shows the images as acquired rather than a
    /// reconstructed plane.
    pub fn is_acquisition(self) -> bool {
        matches!(self, ViewportId::Axial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolName {
    Crosshairs,
    Length,
    Zoom,
    Pan,
    StackScrollWheel,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::Zoom,
        ToolName::Pan,
        ToolName::Crosshairs,
        ToolName::Length,
        ToolName::StackScrollWheel,
    ];

    /// Tag written into the metadata of annotations the tool creates.
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Crosshairs => "Crosshairs",
            ToolName::Length => "Length",
            ToolName::Zoom => "Zoom",
            ToolName::Pan => "Pan",
            ToolName::StackScrollWheel => "StackScrollMouseWheel",
        }
    }
}

/// Tools competing for the primary mouse button. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrimaryTool {
    #[default]
    Crosshairs,
    Length,
}

impl From<PrimaryTool> for ToolName {
    fn from(tool: PrimaryTool) -> Self {
        match tool {
            PrimaryTool::Crosshairs => ToolName::Crosshairs,
            PrimaryTool::Length => ToolName::Length,
        }
    }
}

impl TryFrom<ToolName> for PrimaryTool {
    type Error = ToolName;

    fn try_from(tool: ToolName) -> Result<Self, Self::Error> {
        match tool {
            ToolName::Crosshairs => Ok(PrimaryTool::Crosshairs),
            ToolName::Length => Ok(PrimaryTool::Length),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBinding {
    Primary,
    Secondary,
    Auxiliary,
    Wheel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// Bound to an input and receiving interactions.
    Active,
    /// Annotations are editable but the tool is not bound to an input.
    Passive,
    /// Annotations are rendered but not editable.
    Enabled,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Composite,
    MaximumIntensity,
    MinimumIntensity,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A viewport moved to a different slice.
    SliceChanged,
    /// Pan, zoom, rotation or slab thickness of a viewport changed.
    CameraModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Stretch reconstructed planes to isotropic spacing.
    Linear,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
