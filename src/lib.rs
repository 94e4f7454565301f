#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod core;
pub mod engine;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use assets::{AssetReader, FileAssetReader, GltfLoader, MemoryAssetReader};
pub use crate::core::{Completer, Completion, Readiness, completion_pair};
pub use engine::Viewer;
pub use errors::{Result, View360Error};
pub use renderer::headless::HeadlessContext;
pub use renderer::{FrameStats, RenderView, Renderer, RendererSettings};
pub use resources::{Material, MaterialState, Primitive, RenderOrder, Texture};
pub use scene::{Node, NodeHandle, Scene};
