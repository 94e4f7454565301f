//! Fixed-function state diffing between consecutive materials.

use super::gl::{Capability, GlContext};
use crate::resources::material_state::{BLEND_FUNC_RANGE, CAPS_RANGE, DEPTH_FUNC_RANGE};
use crate::resources::{MaterialState, StateFlags};

/// Write masks left disabled by the last bound material. They are restored
/// at the end of the frame so the host sees a writable framebuffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskResets {
    pub color_mask: bool,
    pub depth_mask: bool,
}

impl MaskResets {
    pub fn restore(&mut self, gl: &mut dyn GlContext) {
        if self.depth_mask {
            gl.depth_mask(true);
            self.depth_mask = false;
        }
        if self.color_mask {
            gl.color_mask(true, true, true, true);
            self.color_mask = false;
        }
    }
}

fn set_capability(
    gl: &mut dyn GlContext,
    capability: Capability,
    flag: StateFlags,
    state: MaterialState,
    changed: StateFlags,
) {
    if changed.contains(flag) {
        if state.contains(flag) {
            gl.enable(capability);
        } else {
            gl.disable(capability);
        }
    }
}

/// Issues the minimal GL calls to go from `previous` to `state`.
///
/// With no previous material every field is treated as changed. Blend
/// factors are only sent when blending is on in `state`; the depth function
/// only when depth testing is on.
pub fn bind_material_state(
    gl: &mut dyn GlContext,
    state: MaterialState,
    previous: Option<MaterialState>,
    resets: &mut MaskResets,
) {
    let previous = previous.unwrap_or(MaterialState::from_bits(!state.bits()));
    if state == previous {
        return;
    }

    let new_bits = state.bits();
    let old_bits = previous.bits();

    if (new_bits & CAPS_RANGE) != (old_bits & CAPS_RANGE) {
        let changed = StateFlags::from_bits_truncate((new_bits ^ old_bits) & CAPS_RANGE);

        set_capability(gl, Capability::CullFace, StateFlags::CULL_FACE, state, changed);
        set_capability(gl, Capability::Blend, StateFlags::BLEND, state, changed);
        set_capability(gl, Capability::DepthTest, StateFlags::DEPTH_TEST, state, changed);
        set_capability(gl, Capability::StencilTest, StateFlags::STENCIL_TEST, state, changed);

        if changed.contains(StateFlags::COLOR_MASK) {
            let mask = state.color_mask();
            gl.color_mask(mask, mask, mask, mask);
            resets.color_mask = !mask;
        }

        if changed.contains(StateFlags::DEPTH_MASK) {
            let mask = state.depth_mask();
            gl.depth_mask(mask);
            resets.depth_mask = !mask;
        }

        if changed.contains(StateFlags::STENCIL_MASK) {
            gl.stencil_mask(if state.stencil_mask() { 0xFF } else { 0x00 });
        }
    }

    if state.blend() && (new_bits & BLEND_FUNC_RANGE) != (old_bits & BLEND_FUNC_RANGE) {
        gl.blend_func(state.blend_func_src().gl(), state.blend_func_dst().gl());
    }

    if state.depth_test() && (new_bits & DEPTH_FUNC_RANGE) != (old_bits & DEPTH_FUNC_RANGE) {
        gl.depth_func(state.depth_func().gl());
    }
}
