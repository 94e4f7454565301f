//! Render View Abstraction
//!
//! A [`RenderView`] is one eye (or the single mono camera) of a frame:
//! projection, pose, and optionally the viewport rectangle it renders into.
//! A stereo frame passes two views; a mono frame passes one.

use glam::{Mat4, Vec3};

use super::gl::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Eye {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub projection: Mat4,
    /// Eye-to-world transform.
    pub pose: Mat4,
    /// World-to-eye transform, the inverse of `pose`.
    pub view_matrix: Mat4,
    pub viewport: Option<Viewport>,
    pub eye: Eye,
}

impl RenderView {
    #[must_use]
    pub fn new(projection: Mat4, pose: Mat4) -> Self {
        Self {
            projection,
            pose,
            view_matrix: pose.inverse(),
            viewport: None,
            eye: Eye::None,
        }
    }

    /// Builds a view from a world-to-eye matrix.
    #[must_use]
    pub fn from_view_matrix(projection: Mat4, view_matrix: Mat4) -> Self {
        Self {
            projection,
            pose: view_matrix.inverse(),
            view_matrix,
            viewport: None,
            eye: Eye::None,
        }
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    #[must_use]
    pub fn with_eye(mut self, eye: Eye) -> Self {
        self.eye = eye;
        self
    }

    /// 0 for the left eye, 1 otherwise.
    #[must_use]
    pub fn eye_index(&self) -> i32 {
        i32::from(self.eye != Eye::Left)
    }

    #[must_use]
    pub fn camera_position(&self) -> Vec3 {
        self.pose.w_axis.truncate()
    }
}
