//! Core resource definitions.
//!
//! CPU-side descriptions the renderer consumes, independent of any GL
//! objects:
//! - [`GeometryBuffer`]: vertex/index bytes, possibly still loading
//! - [`Texture`]: image, video or raw pixel sources plus sampler settings
//! - [`Primitive`]: attribute streams, indices and bounds
//! - [`Material`]: shader choice, sampler/uniform slots, fixed-function state

pub mod buffer;
pub mod material;
pub mod material_state;
pub mod primitive;
pub mod shader_defines;
pub mod texture;

pub use buffer::{BufferSource, GeometryBuffer};
pub use material::{CustomShader, Material, MaterialKind, MaterialSampler, MaterialUniform};
pub use material_state::{BlendFactor, DepthFunc, MaterialState, RenderOrder, StateFlags};
pub use primitive::{
    Aabb, AttributeMask, AttributeSemantic, Primitive, PrimitiveAttribute, PrimitiveIndices,
};
pub use shader_defines::ShaderDefines;
pub use texture::{
    DecodedImage, MagFilter, MinFilter, Texture, TextureSampler, TextureSource, VideoSource,
    WrapMode,
};
