//! Shader Macro Definitions
//!
//! A material picks its shader variant through a set of `#define`s. Two
//! materials with the same material name and the same define set share one
//! compiled program, so the set is kept sorted by key: equal sets compare
//! and hash equal no matter the order the defines were added in.
//!
//! ```rust,ignore
//! use view360::resources::ShaderDefines;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("USE_BASE_COLOR_MAP", "1");
//! let preamble = defines.to_preamble();
//! assert_eq!(preamble, "#define USE_BASE_COLOR_MAP 1\n");
//! ```

use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

/// A sorted collection of shader macro definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    defines: Vec<(String, String)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Set shader define (maintains sorted order)
    ///
    /// If key exists, updates its value; otherwise inserts new entry.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.position(key) {
            Ok(idx) => value.clone_into(&mut self.defines[idx].1),
            Err(idx) => self.defines.insert(idx, (key.to_owned(), value.to_owned())),
        }
    }

    /// Remove shader define
    pub fn remove(&mut self, key: &str) -> bool {
        if let Ok(idx) = self.position(key) {
            self.defines.remove(idx);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_ok()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .ok()
            .map(|idx| self.defines[idx].1.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// Iterate defines in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge shader defines from another `ShaderDefines`
    ///
    /// If there are conflicts, values from other will override values in self.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }

    /// `#define KEY VALUE` lines, one per define, to prepend to shader source.
    #[must_use]
    pub fn to_preamble(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            let _ = writeln!(out, "#define {key} {value}");
        }
        out
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
    }
}

impl Hash for ShaderDefines {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.defines.hash(state);
    }
}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::new();
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}
