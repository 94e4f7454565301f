//! GPU-side primitives.

use smallvec::SmallVec;

use super::gl::{BufferTarget, ComponentType, GlContext, GlVertexArray, IndexType, Topology};
use super::render_material::RenderMaterialId;
use crate::resources::{Aabb, AttributeMask, AttributeSemantic, GeometryBuffer, Primitive};
use crate::scene::NodeHandle;

/// Handle to a [`RenderPrimitive`] owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPrimitiveId(pub(crate) u32);

impl RenderPrimitiveId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct AttributePointer {
    location: u32,
    component_count: u32,
    component_type: ComponentType,
    normalized: bool,
    stride: u32,
    byte_offset: usize,
}

/// Attributes sharing one buffer, so the buffer is bound once.
#[derive(Debug, Clone)]
struct AttributeBuffer {
    buffer: GeometryBuffer,
    pointers: SmallVec<[AttributePointer; 4]>,
}

#[derive(Debug, Clone)]
struct IndexStream {
    buffer: GeometryBuffer,
    byte_offset: usize,
    index_type: IndexType,
}

/// A primitive bound to a render material, tracking which scene nodes
/// instance it.
#[derive(Debug)]
pub struct RenderPrimitive {
    material: RenderMaterialId,
    attribute_mask: AttributeMask,
    attribute_buffers: Vec<AttributeBuffer>,
    indices: Option<IndexStream>,
    element_count: u32,
    topology: Topology,
    bounds: Option<Aabb>,
    vao: Option<GlVertexArray>,
    complete: bool,
    pub(crate) active_frame_id: u64,
    instances: Vec<NodeHandle>,
}

impl RenderPrimitive {
    pub(crate) fn new(primitive: &Primitive, material: RenderMaterialId) -> Self {
        let mut attribute_buffers: Vec<AttributeBuffer> = Vec::new();
        for attribute in &primitive.attributes {
            let pointer = AttributePointer {
                location: attribute.semantic.location(),
                component_count: attribute.component_count,
                component_type: attribute.component_type,
                normalized: attribute.normalized,
                stride: attribute.stride,
                byte_offset: attribute.byte_offset,
            };
            match attribute_buffers
                .iter_mut()
                .find(|group| group.buffer == attribute.buffer)
            {
                Some(group) => group.pointers.push(pointer),
                None => attribute_buffers.push(AttributeBuffer {
                    buffer: attribute.buffer.clone(),
                    pointers: smallvec::smallvec![pointer],
                }),
            }
        }

        Self {
            material,
            attribute_mask: primitive.attribute_mask(),
            attribute_buffers,
            indices: primitive.indices.as_ref().map(|i| IndexStream {
                buffer: i.buffer.clone(),
                byte_offset: i.byte_offset,
                index_type: i.index_type,
            }),
            element_count: primitive.element_count,
            topology: primitive.topology,
            bounds: primitive.bounds,
            vao: None,
            complete: false,
            active_frame_id: 0,
            instances: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn material(&self) -> RenderMaterialId {
        self.material
    }

    #[inline]
    #[must_use]
    pub fn attribute_mask(&self) -> AttributeMask {
        self.attribute_mask
    }

    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    #[inline]
    #[must_use]
    pub fn instances(&self) -> &[NodeHandle] {
        &self.instances
    }

    #[inline]
    #[must_use]
    pub fn active_frame_id(&self) -> u64 {
        self.active_frame_id
    }

    /// Number of distinct vertex buffers.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.attribute_buffers.len()
    }

    /// Whether every vertex and index buffer has been uploaded.
    ///
    /// Once true this never reverts.
    pub fn is_complete(&mut self) -> bool {
        if !self.complete {
            self.complete = self.attribute_buffers.iter().all(|g| g.buffer.is_ready())
                && self.indices.as_ref().is_none_or(|i| i.buffer.is_ready());
        }
        self.complete
    }

    pub(crate) fn add_instance(&mut self, node: NodeHandle) {
        if !self.instances.contains(&node) {
            self.instances.push(node);
        }
    }

    pub(crate) fn remove_instance(&mut self, node: NodeHandle) {
        self.instances.retain(|n| *n != node);
    }

    /// Makes this primitive's vertex input current.
    ///
    /// With vertex array objects the layout is recorded once and replayed by
    /// binding the VAO. Without them, attribute arrays are toggled only when
    /// `current_mask` differs from this primitive's mask; the caller tracks
    /// the mask between draws.
    pub(crate) fn bind_vertex_input(
        &mut self,
        gl: &mut dyn GlContext,
        use_vao: bool,
        current_mask: &mut Option<AttributeMask>,
    ) {
        if use_vao {
            if let Some(vao) = self.vao {
                gl.bind_vertex_array(Some(vao));
                return;
            }
            if let Some(vao) = gl.create_vertex_array() {
                gl.bind_vertex_array(Some(vao));
                self.vao = Some(vao);
                self.bind_attributes(gl, None);
                return;
            }
        }
        self.bind_attributes(gl, *current_mask);
        *current_mask = Some(self.attribute_mask);
    }

    fn bind_attributes(&self, gl: &mut dyn GlContext, current_mask: Option<AttributeMask>) {
        if current_mask != Some(self.attribute_mask) {
            for semantic in AttributeSemantic::ALL {
                if self.attribute_mask.contains(semantic.mask()) {
                    gl.enable_vertex_attrib_array(semantic.location());
                } else {
                    gl.disable_vertex_attrib_array(semantic.location());
                }
            }
        }

        for group in &self.attribute_buffers {
            gl.bind_buffer(BufferTarget::Array, group.buffer.handle());
            for p in &group.pointers {
                gl.vertex_attrib_pointer(
                    p.location,
                    p.component_count,
                    p.component_type,
                    p.normalized,
                    p.stride,
                    p.byte_offset,
                );
            }
        }

        gl.bind_buffer(
            BufferTarget::ElementArray,
            self.indices.as_ref().and_then(|i| i.buffer.handle()),
        );
    }

    /// Issues the draw call for one instance.
    pub(crate) fn draw(&self, gl: &mut dyn GlContext) {
        match &self.indices {
            Some(indices) => gl.draw_elements(
                self.topology,
                self.element_count,
                indices.index_type,
                indices.byte_offset,
            ),
            None => gl.draw_arrays(self.topology, 0, self.element_count),
        }
    }
}
