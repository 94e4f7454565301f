//! Geometry description: vertex attributes, indices and bounds.

use bitflags::bitflags;
use glam::Vec3;

use super::buffer::GeometryBuffer;
use crate::renderer::gl::{ComponentType, IndexType, Topology};

/// The fixed set of vertex attributes a primitive may provide.
///
/// Each semantic owns a vertex attribute location and one bit of the
/// [`AttributeMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
    TexCoord0,
    TexCoord1,
    Color0,
}

impl AttributeSemantic {
    pub const ALL: [AttributeSemantic; 6] = [
        AttributeSemantic::Position,
        AttributeSemantic::Normal,
        AttributeSemantic::Tangent,
        AttributeSemantic::TexCoord0,
        AttributeSemantic::TexCoord1,
        AttributeSemantic::Color0,
    ];

    /// Vertex attribute location bound before linking.
    #[must_use]
    pub const fn location(self) -> u32 {
        match self {
            Self::Position => 1,
            Self::Normal => 2,
            Self::Tangent => 3,
            Self::TexCoord0 => 4,
            Self::TexCoord1 => 5,
            Self::Color0 => 6,
        }
    }

    #[must_use]
    pub const fn mask(self) -> AttributeMask {
        match self {
            Self::Position => AttributeMask::POSITION,
            Self::Normal => AttributeMask::NORMAL,
            Self::Tangent => AttributeMask::TANGENT,
            Self::TexCoord0 => AttributeMask::TEXCOORD_0,
            Self::TexCoord1 => AttributeMask::TEXCOORD_1,
            Self::Color0 => AttributeMask::COLOR_0,
        }
    }

    /// Shader attribute name (glTF attribute naming).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "POSITION",
            Self::Normal => "NORMAL",
            Self::Tangent => "TANGENT",
            Self::TexCoord0 => "TEXCOORD_0",
            Self::TexCoord1 => "TEXCOORD_1",
            Self::Color0 => "COLOR_0",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

bitflags! {
    /// Which attribute semantics a primitive provides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeMask: u32 {
        const POSITION   = 0x0001;
        const NORMAL     = 0x0002;
        const TANGENT    = 0x0004;
        const TEXCOORD_0 = 0x0008;
        const TEXCOORD_1 = 0x0010;
        const COLOR_0    = 0x0020;
    }
}

/// One vertex attribute stream inside a [`GeometryBuffer`].
#[derive(Debug, Clone)]
pub struct PrimitiveAttribute {
    pub semantic: AttributeSemantic,
    pub buffer: GeometryBuffer,
    /// Number of components (1-4).
    pub component_count: u32,
    pub component_type: ComponentType,
    pub stride: u32,
    pub byte_offset: usize,
    pub normalized: bool,
}

impl PrimitiveAttribute {
    #[must_use]
    pub fn new(
        semantic: AttributeSemantic,
        buffer: GeometryBuffer,
        component_count: u32,
        component_type: ComponentType,
        stride: u32,
        byte_offset: usize,
    ) -> Self {
        Self {
            semantic,
            buffer,
            component_count,
            component_type,
            stride,
            byte_offset,
            normalized: false,
        }
    }

    #[must_use]
    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }
}

/// Index stream of a primitive.
#[derive(Debug, Clone)]
pub struct PrimitiveIndices {
    pub buffer: GeometryBuffer,
    pub byte_offset: usize,
    pub index_type: IndexType,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// A drawable unit of geometry: attribute streams, optional indices,
/// element count and topology.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub attributes: Vec<PrimitiveAttribute>,
    pub element_count: u32,
    pub topology: Topology,
    pub indices: Option<PrimitiveIndices>,
    pub bounds: Option<Aabb>,
}

impl Primitive {
    #[must_use]
    pub fn new(attributes: Vec<PrimitiveAttribute>, element_count: u32, topology: Topology) -> Self {
        Self {
            attributes,
            element_count,
            topology,
            indices: None,
            bounds: None,
        }
    }

    pub fn set_indices(&mut self, buffer: GeometryBuffer, index_type: IndexType, byte_offset: usize) {
        self.indices = Some(PrimitiveIndices {
            buffer,
            byte_offset,
            index_type,
        });
    }

    pub fn set_bounds(&mut self, min: Vec3, max: Vec3) {
        self.bounds = Some(Aabb::new(min, max));
    }

    #[must_use]
    pub fn attribute_mask(&self) -> AttributeMask {
        self.attributes
            .iter()
            .fold(AttributeMask::empty(), |mask, a| mask | a.semantic.mask())
    }

    #[must_use]
    pub fn has_attribute(&self, semantic: AttributeSemantic) -> bool {
        self.attributes.iter().any(|a| a.semantic == semantic)
    }
}
