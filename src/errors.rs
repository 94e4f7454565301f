//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`View360Error`] covers:
//! - Programming errors that are raised immediately (missing texture keys,
//!   materials without a name or shader source)
//! - Asset loading and decoding errors
//! - Format errors (glTF, data URIs, JSON settings)
//! - Failures of background loading tasks
//!
//! Shader compile and link failures are *not* errors at this level: they are
//! logged and the affected program is skipped when drawing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use view360::errors::{View360Error, Result};
//!
//! fn load_scene() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum View360Error {
    // ========================================================================
    // Programming Errors
    // ========================================================================
    /// A texture was handed to the texture cache with an empty key.
    #[error("Texture does not have a valid key")]
    MissingTextureKey,

    /// A material without a material name cannot be turned into a program.
    #[error("Material does not have a material name")]
    MissingMaterialName,

    /// A material without shader source cannot be turned into a program.
    #[error("Material \"{material}\" does not have a {stage} shader source")]
    MissingShaderSource {
        /// Name of the offending material
        material: String,
        /// `"vertex"` or `"fragment"`
        stage: &'static str,
    },

    /// A handle did not refer to a live renderer object.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Asset index out of bounds.
    #[error("Asset index out of bounds: {context} (index: {index})")]
    AssetIndexOutOfBounds {
        /// Description of what was being accessed
        context: String,
        /// The invalid index
        index: usize,
    },

    /// The asset uses a feature or version this loader does not handle.
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // Image & Texture Errors
    // ========================================================================
    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    GltfError(String),

    /// Data URI parsing error.
    #[error("Data URI error: {0}")]
    DataUriError(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    // ========================================================================
    // Async & Threading Errors
    // ========================================================================
    /// Task join error (when async tasks fail to complete).
    #[error("Task join error: {0}")]
    TaskJoinError(String),

    /// The background runtime for asset loading could not be started.
    #[error("Asset runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// The producing side of a completion went away without settling it.
    #[error("Load was abandoned before completing")]
    Abandoned,
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for View360Error {
    fn from(err: image::ImageError) -> Self {
        View360Error::ImageDecodeError(err.to_string())
    }
}

impl From<gltf::Error> for View360Error {
    fn from(err: gltf::Error) -> Self {
        View360Error::GltfError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for View360Error {
    fn from(err: tokio::task::JoinError) -> Self {
        View360Error::TaskJoinError(err.to_string())
    }
}

/// Alias for `Result<T, View360Error>`.
pub type Result<T> = std::result::Result<T, View360Error>;
