use crate::terrain::RenderMode;
use glam::{Mat4, Quat, Vec3};
use parking_lot::RwLock;
use std::sync::Arc;

/// Uniform zoom change per ZoomIn/ZoomOut.
pub const ZOOM_STEP: f32 = 0.10;
/// Degrees per TiltUp/TiltDown/YawLeft/YawRight.
pub const ROTATION_STEP_DEG: f32 = 1.0;

/// View transform and render-mode selector.
///
/// Angles are in degrees and neither clamped nor wrapped; the scale is
/// unclamped as well, so zooming out past zero mirrors the terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub scale: f32,
    /// Rotation about the lateral (X) axis.
    pub rot_x: f32,
    /// Rotation about the vertical (Z) axis.
    pub rot_y: f32,
    pub render_mode: RenderMode,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rot_x: -45.0,
            rot_y: 0.0,
            render_mode: RenderMode::Points,
        }
    }
}

impl ViewState {
    /// Model transform: scale, then rotation about X, then about Z.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scale))
            * Mat4::from_quat(Quat::from_rotation_x(self.rot_x.to_radians()))
            * Mat4::from_quat(Quat::from_rotation_z(self.rot_y.to_radians()))
    }
}

/// Handle to a view that may be shared by several windows.
///
/// Every window takes one `snapshot` per tick, so a frame never observes a
/// half-applied update from another window.
#[derive(Debug, Clone, Default)]
pub struct SharedView {
    inner: Arc<RwLock<ViewState>>,
}

impl SharedView {
    pub fn new(view: ViewState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(view)),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> ViewState {
        *self.inner.read()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Number of windows holding this view.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
