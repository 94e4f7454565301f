//! Renderer Configuration
//!
//! [`RendererSettings`] is read once when the renderer is created. The
//! lighting fields can be changed afterwards through the renderer's global
//! light setters.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use view360::renderer::{Renderer, RendererSettings};
//!
//! let settings = RendererSettings::from_json(r#"{ "light_color": [1.0, 1.0, 1.0] }"#)?;
//! let renderer = Renderer::new(context, settings);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Default float precision declared in fragment shaders that do not declare
/// their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatPrecision {
    Lowp,
    Mediump,
    Highp,
}

impl FloatPrecision {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FloatPrecision::Lowp => "lowp",
            FloatPrecision::Mediump => "mediump",
            FloatPrecision::Highp => "highp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Direction the global light travels in.
    pub light_direction: [f32; 3],
    pub light_color: [f32; 3],
    /// Use vertex array objects when the context supports them.
    pub use_vertex_array_objects: bool,
    /// Overrides the precision picked from the context's capabilities.
    pub fragment_precision: Option<FloatPrecision>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            light_direction: [-0.1, -1.0, -0.2],
            light_color: [3.0, 3.0, 3.0],
            use_vertex_array_objects: true,
            fragment_precision: None,
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            RendererSettings::from_json(r#"{ "fragment_precision": "mediump" }"#).unwrap();
        assert_eq!(settings.fragment_precision, Some(FloatPrecision::Mediump));
        assert_eq!(settings.light_direction, [-0.1, -1.0, -0.2]);
        assert!(settings.use_vertex_array_objects);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(RendererSettings::from_json("{ not json").is_err());
    }
}
