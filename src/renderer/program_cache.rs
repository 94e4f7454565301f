//! Program Cache
//!
//! Central owner of all [`Program`]s. Programs are stored in a contiguous
//! `Vec` and addressed through lightweight [`ProgramId`] handles. A program
//! is identified by its material name plus its (sorted) define set, so every
//! material of the same kind and variant shares one program.
//!
//! Material shader bodies define `vertex_main` / `fragment_main`; the cache
//! wraps them with the `main` entry points and, for fragment shaders that do
//! not declare one, a default float precision.

use rustc_hash::FxHashMap;

use super::gl::GlContext;
use super::program::Program;
use super::settings::FloatPrecision;
use crate::errors::Result;
use crate::resources::{AttributeSemantic, Material, ShaderDefines};

const VERTEX_EPILOGUE: &str = "
uniform mat4 PROJECTION_MATRIX, VIEW_MATRIX, MODEL_MATRIX;
void main() {
  gl_Position = vertex_main(PROJECTION_MATRIX, VIEW_MATRIX, MODEL_MATRIX);
}
";

const FRAGMENT_EPILOGUE: &str = "
void main() {
  gl_FragColor = fragment_main();
}
";

/// Handle to a cached [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

impl ProgramId {
    /// Raw index into the program storage array.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProgramKey {
    material_name: String,
    defines: ShaderDefines,
}

impl std::fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.material_name)?;
        for (key, value) in self.defines.iter() {
            write!(f, "{key}={value},")?;
        }
        Ok(())
    }
}

/// Whether `source` declares its own default float precision.
fn declares_float_precision(source: &str) -> bool {
    ["lowp", "mediump", "highp"]
        .iter()
        .any(|p| source.contains(&format!("precision {p} float;")))
}

pub struct ProgramCache {
    programs: Vec<Program>,
    lookup: FxHashMap<ProgramKey, ProgramId>,
    fragment_precision: FloatPrecision,
}

impl ProgramCache {
    #[must_use]
    pub fn new(fragment_precision: FloatPrecision) -> Self {
        Self {
            programs: Vec::with_capacity(16),
            lookup: FxHashMap::default(),
            fragment_precision,
        }
    }

    /// Returns the program for `material` with `defines`, building it on
    /// first request.
    ///
    /// Fails only for materials without a name or shader source. A program
    /// that fails to compile is still returned; it is skipped when drawing.
    pub fn get_or_create(
        &mut self,
        gl: &mut dyn GlContext,
        material: &Material,
        defines: ShaderDefines,
    ) -> Result<ProgramId> {
        material.validate()?;

        let key = ProgramKey {
            material_name: material.material_name().to_string(),
            defines,
        };
        if let Some(&id) = self.lookup.get(&key) {
            return Ok(id);
        }

        let vertex_source = format!("{}{VERTEX_EPILOGUE}", material.vertex_source());
        let fragment_body = material.fragment_source();
        let fragment_source = if declares_float_precision(fragment_body) {
            format!("{fragment_body}{FRAGMENT_EPILOGUE}")
        } else {
            format!(
                "precision {} float;\n{fragment_body}{FRAGMENT_EPILOGUE}",
                self.fragment_precision.as_str()
            )
        };

        let attributes: Vec<(&str, u32)> = AttributeSemantic::ALL
            .iter()
            .map(|s| (s.name(), s.location()))
            .collect();

        log::debug!("Compiling program {key}");
        let program = Program::new(
            gl,
            &vertex_source,
            &fragment_source,
            &attributes,
            key.defines.clone(),
        );

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(program);
        self.lookup.insert(key, id);
        Ok(id)
    }

    /// Retrieve a program by handle. **Panics** if the id is invalid.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ProgramId) -> &Program {
        &self.programs[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: ProgramId) -> &mut Program {
        &mut self.programs[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    #[must_use]
    pub fn fragment_precision(&self) -> FloatPrecision {
        self.fragment_precision
    }
}
