//! GL context abstraction.
//!
//! The renderer drives a WebGL 1 style immediate-mode API through the
//! [`GlContext`] trait. A real backend forwards each call to the driver;
//! [`HeadlessContext`](super::headless::HeadlessContext) records them.
//!
//! GL object handles are opaque newtypes allocated by the context. Enums
//! carry their GL numeric values so a backend can cast them directly.

use std::fmt;

// ============================================================================
// Handles
// ============================================================================

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

gl_handle!(
    /// Buffer object.
    GlBuffer
);
gl_handle!(
    /// Texture object.
    GlTexture
);
gl_handle!(
    /// Shader object.
    GlShader
);
gl_handle!(
    /// Program object.
    GlProgram
);
gl_handle!(
    /// Vertex array object (OES_vertex_array_object).
    GlVertexArray
);
gl_handle!(
    /// Uniform location within a linked program.
    UniformLocation
);

// ============================================================================
// Enumerations
// ============================================================================

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array = 0x8892,
    ElementArray = 0x8893,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    Stream = 0x88E0,
    #[default]
    Static = 0x88E4,
    Dynamic = 0x88E8,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Fragment = 0x8B30,
    Vertex = 0x8B31,
}

impl ShaderStage {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Toggleable pipeline capabilities.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CullFace = 0x0B44,
    DepthTest = 0x0B71,
    StencilTest = 0x0B90,
    Blend = 0x0BE2,
}

/// Primitive assembly mode.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    Points = 0x0000,
    Lines = 0x0001,
    LineLoop = 0x0002,
    LineStrip = 0x0003,
    #[default]
    Triangles = 0x0004,
    TriangleStrip = 0x0005,
    TriangleFan = 0x0006,
}

impl Topology {
    #[must_use]
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0x0000 => Self::Points,
            0x0001 => Self::Lines,
            0x0002 => Self::LineLoop,
            0x0003 => Self::LineStrip,
            0x0004 => Self::Triangles,
            0x0005 => Self::TriangleStrip,
            0x0006 => Self::TriangleFan,
            _ => return None,
        })
    }
}

/// Vertex attribute component type.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    Byte = 0x1400,
    UnsignedByte = 0x1401,
    Short = 0x1402,
    UnsignedShort = 0x1403,
    UnsignedInt = 0x1405,
    #[default]
    Float = 0x1406,
}

impl ComponentType {
    #[must_use]
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0x1400 => Self::Byte,
            0x1401 => Self::UnsignedByte,
            0x1402 => Self::Short,
            0x1403 => Self::UnsignedShort,
            0x1405 => Self::UnsignedInt,
            0x1406 => Self::Float,
            _ => return None,
        })
    }

    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }
}

/// Element index type.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    UnsignedByte = 0x1401,
    #[default]
    UnsignedShort = 0x1403,
    UnsignedInt = 0x1405,
}

impl IndexType {
    #[must_use]
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0x1401 => Self::UnsignedByte,
            0x1403 => Self::UnsignedShort,
            0x1405 => Self::UnsignedInt,
            _ => return None,
        })
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexParameter {
    MagFilter = 0x2800,
    MinFilter = 0x2801,
    WrapS = 0x2802,
    WrapT = 0x2803,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    Alpha = 0x1906,
    Rgb = 0x1907,
    #[default]
    Rgba = 0x1908,
    Luminance = 0x1909,
    LuminanceAlpha = 0x190A,
}

impl PixelFormat {
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::Alpha | Self::Luminance => 1,
            Self::LuminanceAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelType {
    #[default]
    UnsignedByte = 0x1401,
    Float = 0x1406,
}

/// Framebuffer rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Arguments of a `texImage2D` upload.
#[derive(Debug, Clone, Copy)]
pub struct TexImage<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixel_type: PixelType,
    pub pixels: &'a [u8],
}

// ============================================================================
// Context trait
// ============================================================================

/// A WebGL 1 style rendering context.
///
/// The renderer owns its context exclusively and issues every call from
/// the render thread, so methods take `&mut self` and no synchronisation is
/// implied. Texture calls target `TEXTURE_2D` of the active unit.
pub trait GlContext {
    // ─── Capabilities ─────────────────────────────────────────────────

    /// Whether vertex array objects are available.
    fn supports_vertex_array_objects(&self) -> bool;

    /// Whether fragment shaders support `highp` floats.
    fn supports_high_precision_fragment(&self) -> bool;

    // ─── Buffers ──────────────────────────────────────────────────────

    fn create_buffer(&mut self) -> GlBuffer;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<GlBuffer>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    // ─── Textures ─────────────────────────────────────────────────────

    fn create_texture(&mut self) -> GlTexture;
    /// Selects texture unit `TEXTURE0 + unit`.
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: Option<GlTexture>);
    fn tex_image_2d(&mut self, image: &TexImage<'_>);
    fn tex_parameter(&mut self, parameter: TexParameter, value: u32);
    fn generate_mipmap(&mut self);

    // ─── Shaders & programs ───────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> GlShader;
    fn shader_source(&mut self, shader: GlShader, source: &str);
    fn compile_shader(&mut self, shader: GlShader);
    fn shader_compile_status(&self, shader: GlShader) -> bool;
    fn shader_info_log(&self, shader: GlShader) -> String;
    fn delete_shader(&mut self, shader: GlShader);

    fn create_program(&mut self) -> GlProgram;
    fn attach_shader(&mut self, program: GlProgram, shader: GlShader);
    fn bind_attrib_location(&mut self, program: GlProgram, index: u32, name: &str);
    fn link_program(&mut self, program: GlProgram);
    fn program_link_status(&self, program: GlProgram) -> bool;
    fn program_info_log(&self, program: GlProgram) -> String;
    fn delete_program(&mut self, program: GlProgram);
    /// Names of the program's active uniforms as reported by the driver.
    /// Arrays are reported with a trailing `[0]`.
    fn active_uniform_names(&self, program: GlProgram) -> Vec<String>;
    fn uniform_location(&self, program: GlProgram, name: &str) -> Option<UniformLocation>;
    fn use_program(&mut self, program: Option<GlProgram>);

    // ─── Uniforms ─────────────────────────────────────────────────────

    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    /// `uniform{components}fv`; `values.len()` is a multiple of `components`.
    fn uniform_fv(&mut self, location: UniformLocation, components: u32, values: &[f32]);
    fn uniform_matrix4fv(&mut self, location: UniformLocation, value: &[f32; 16]);

    // ─── Fixed-function state ─────────────────────────────────────────

    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);
    fn depth_mask(&mut self, enabled: bool);
    fn stencil_mask(&mut self, mask: u32);
    /// Factors are raw GL enums (`ZERO`, `ONE`, `SRC_ALPHA`, ...).
    fn blend_func(&mut self, src: u32, dst: u32);
    /// Raw GL comparison enum (`NEVER` .. `ALWAYS`).
    fn depth_func(&mut self, func: u32);
    fn viewport(&mut self, viewport: Viewport);

    // ─── Vertex input ─────────────────────────────────────────────────

    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        component_type: ComponentType,
        normalized: bool,
        stride: u32,
        offset: usize,
    );
    /// Returns `None` when vertex array objects are unsupported.
    fn create_vertex_array(&mut self) -> Option<GlVertexArray>;
    fn bind_vertex_array(&mut self, vertex_array: Option<GlVertexArray>);

    // ─── Drawing ──────────────────────────────────────────────────────

    fn draw_arrays(&mut self, mode: Topology, first: u32, count: u32);
    fn draw_elements(&mut self, mode: Topology, count: u32, index_type: IndexType, offset: usize);
}
