use serde::{Deserialize, Serialize};

/// Camera state of a viewport as the back end reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPresentation {
    pub pan: (f32, f32),
    pub zoom: f32,
    /// Degrees, kept in `[0, 360)`.
    pub rotation: f32,
}

impl Default for ViewPresentation {
    fn default() -> Self {
        Self {
            pan: (0.0, 0.0),
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl ViewPresentation {
    pub fn rotated(self, degrees: f32) -> Self {
        Self {
            rotation: (self.rotation + degrees).rem_euclid(360.0),
            ..self
        }
    }

    pub fn apply(self, transform: Transform) -> Self {
        match transform {
            Transform::Rotate90 => self.rotated(90.0),
        }
    }
}

/// Camera edits offered by the viewer toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Rotate90,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_quarter_turns_return_to_start() {
        let start = ViewPresentation::default();
        let mut seen = Vec::new();
        let mut current = start;
        for _ in 0..4 {
            current = current.apply(Transform::Rotate90);
            seen.push(current.rotation);
        }
        assert_eq!(seen, vec![90.0, 180.0, 270.0, 0.0]);
        assert_eq!(current, start);
    }

    #[test]
    fn rotation_wraps_negative_angles() {
        let presentation = ViewPresentation::default().rotated(-90.0);
        assert_eq!(presentation.rotation, 270.0);
    }

    #[test]
    fn rotation_leaves_pan_and_zoom_alone() {
        let presentation = ViewPresentation {
            pan: (3.0, -2.0),
            zoom: 1.1,
            rotation: 270.0,
        }
        .rotated(90.0);
        assert_eq!(presentation.pan, (3.0, -2.0));
        assert_eq!(presentation.zoom, 1.1);
        assert_eq!(presentation.rotation, 0.0);
    }
}
