//! Asset loading
//!
//! - [`AssetReader`]: where bytes come from (files, memory)
//! - [`GltfLoader`]: glTF 2.0 documents into render primitives and nodes
//! - image decoding and data URIs
//!
//! Reads and decodes run on a shared background runtime; results reach the
//! renderer through completion tokens.

pub mod gltf;
pub mod image;
pub mod io;

pub use self::gltf::GltfLoader;
pub use self::image::{decode_rgba8, load_image_texture};
pub use self::io::{
    AssetReader, DataUri, FileAssetReader, MemoryAssetReader, asset_runtime, parse_data_uri,
};
