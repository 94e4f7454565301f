//! Headless recording context.
//!
//! [`HeadlessContext`] implements [`GlContext`] without a GPU. Every call is
//! appended to a log of [`GlCall`]s that tests and tools can inspect.
//!
//! Enough of the driver is emulated for the renderer to behave as it would
//! against a real context:
//! - shaders containing a `#error` directive fail to compile, and programs
//!   with a failed shader fail to link
//! - active uniforms are discovered from the shader sources after a small
//!   `#define` / `#ifdef` / `#ifndef` / `#else` / `#endif` preprocessing pass
//! - vertex array object support and fragment precision are configurable

use rustc_hash::{FxHashMap, FxHashSet};

use super::gl::{
    BufferTarget, BufferUsage, Capability, ComponentType, GlBuffer, GlContext, GlProgram,
    GlShader, GlTexture, GlVertexArray, IndexType, PixelFormat, PixelType, ShaderStage,
    TexImage, TexParameter, Topology, UniformLocation, Viewport,
};

/// One recorded context call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    // Buffers
    CreateBuffer(GlBuffer),
    BindBuffer(BufferTarget, Option<GlBuffer>),
    BufferData {
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    // Textures
    CreateTexture(GlTexture),
    ActiveTexture(u32),
    BindTexture(Option<GlTexture>),
    TexImage2D {
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
    },
    TexParameter(TexParameter, u32),
    GenerateMipmap,
    // Shaders & programs
    CreateShader(GlShader, ShaderStage),
    ShaderSource(GlShader, String),
    CompileShader(GlShader),
    DeleteShader(GlShader),
    CreateProgram(GlProgram),
    AttachShader(GlProgram, GlShader),
    BindAttribLocation(GlProgram, u32, String),
    LinkProgram(GlProgram),
    DeleteProgram(GlProgram),
    UseProgram(Option<GlProgram>),
    // Uniforms
    Uniform1i(UniformLocation, i32),
    UniformFv {
        location: UniformLocation,
        components: u32,
        values: Vec<f32>,
    },
    UniformMatrix4fv(UniformLocation, [f32; 16]),
    // Fixed function
    Enable(Capability),
    Disable(Capability),
    ColorMask([bool; 4]),
    DepthMask(bool),
    StencilMask(u32),
    BlendFunc(u32, u32),
    DepthFunc(u32),
    Viewport(Viewport),
    // Vertex input
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: u32,
        component_type: ComponentType,
        normalized: bool,
        stride: u32,
        offset: usize,
    },
    CreateVertexArray(GlVertexArray),
    BindVertexArray(Option<GlVertexArray>),
    // Drawing
    DrawArrays {
        mode: Topology,
        first: u32,
        count: u32,
    },
    DrawElements {
        mode: Topology,
        count: u32,
        index_type: IndexType,
        offset: usize,
    },
}

impl GlCall {
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. })
    }

    /// Whether this call changes fixed-function pipeline state.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            GlCall::Enable(_)
                | GlCall::Disable(_)
                | GlCall::ColorMask(_)
                | GlCall::DepthMask(_)
                | GlCall::StencilMask(_)
                | GlCall::BlendFunc(..)
                | GlCall::DepthFunc(_)
        )
    }
}

struct ShaderRecord {
    source: String,
    compiled: bool,
    info_log: String,
}

#[derive(Default)]
struct ProgramRecord {
    shaders: Vec<GlShader>,
    linked: bool,
    info_log: String,
    uniforms: Vec<String>,
    locations: FxHashMap<String, UniformLocation>,
}

/// A [`GlContext`] that records calls instead of rendering.
pub struct HeadlessContext {
    calls: Vec<GlCall>,
    next_id: u32,
    vertex_array_objects: bool,
    high_precision_fragment: bool,
    shaders: FxHashMap<GlShader, ShaderRecord>,
    programs: FxHashMap<GlProgram, ProgramRecord>,
    uniform_names: FxHashMap<UniformLocation, String>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 1,
            vertex_array_objects: true,
            high_precision_fragment: true,
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
            uniform_names: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_vertex_array_objects(mut self, supported: bool) -> Self {
        self.vertex_array_objects = supported;
        self
    }

    #[must_use]
    pub fn with_high_precision_fragment(mut self, supported: bool) -> Self {
        self.high_precision_fragment = supported;
        self
    }

    // ─── Inspection ───────────────────────────────────────────────────

    #[must_use]
    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    #[must_use]
    pub fn draw_call_count(&self) -> usize {
        self.count_calls(GlCall::is_draw)
    }

    /// Name of the uniform a location was handed out for.
    #[must_use]
    pub fn uniform_name(&self, location: UniformLocation) -> Option<&str> {
        self.uniform_names.get(&location).map(String::as_str)
    }

    /// Values most recently uploaded through `uniform*fv` to a uniform name.
    #[must_use]
    pub fn last_uniform_values(&self, name: &str) -> Option<&[f32]> {
        self.calls.iter().rev().find_map(|call| match call {
            GlCall::UniformFv {
                location, values, ..
            } if self.uniform_name(*location) == Some(name) => Some(values.as_slice()),
            GlCall::UniformMatrix4fv(location, values)
                if self.uniform_name(*location) == Some(name) =>
            {
                Some(values.as_slice())
            }
            _ => None,
        })
    }

    /// Number of programs that are still alive.
    #[must_use]
    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

// ============================================================================
// Source inspection
// ============================================================================

/// Strips comments and inactive preprocessor branches from `source`.
fn preprocess(source: &str) -> String {
    let mut defined: FxHashSet<&str> = FxHashSet::default();
    // One entry per open conditional: (branch active, any branch taken).
    let mut stack: Vec<(bool, bool)> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for raw in source.lines() {
        let line = raw.split("//").next().unwrap_or("").trim();
        let enclosing = stack.iter().all(|(active, _)| *active);

        if let Some(directive) = line.strip_prefix('#') {
            let mut words = directive.split_whitespace();
            let keyword = words.next().unwrap_or("");
            let operand = words.next().unwrap_or("");
            match keyword {
                "define" if enclosing => {
                    defined.insert(operand);
                }
                "ifdef" | "ifndef" => {
                    let hit = defined.contains(operand) == (keyword == "ifdef");
                    stack.push((enclosing && hit, hit));
                }
                "else" => {
                    if let Some((_, taken)) = stack.pop() {
                        let parent = stack.iter().all(|(a, _)| *a);
                        stack.push((parent && !taken, true));
                    }
                }
                "endif" => {
                    stack.pop();
                }
                "error" if enclosing => {
                    out.push_str(line);
                    out.push('\n');
                }
                _ => {}
            }
            continue;
        }

        if enclosing {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Uniform names declared by an (already preprocessed) shader.
fn declared_uniforms(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for statement in source.split(';') {
        let mut words = statement.split_whitespace();
        if words.next() != Some("uniform") {
            continue;
        }
        let rest: Vec<&str> = words
            .skip_while(|w| matches!(*w, "lowp" | "mediump" | "highp"))
            .skip(1)
            .collect();
        for declarator in rest.join(" ").split(',') {
            let declarator = declarator.trim();
            if declarator.is_empty() {
                continue;
            }
            match declarator.find('[') {
                Some(bracket) => names.push(format!("{}[0]", declarator[..bracket].trim())),
                None => names.push(declarator.to_string()),
            }
        }
    }
    names
}

fn has_error_directive(source: &str) -> bool {
    source.lines().any(|line| line.starts_with("#error"))
}

// ============================================================================
// GlContext implementation
// ============================================================================

impl GlContext for HeadlessContext {
    fn supports_vertex_array_objects(&self) -> bool {
        self.vertex_array_objects
    }

    fn supports_high_precision_fragment(&self) -> bool {
        self.high_precision_fragment
    }

    fn create_buffer(&mut self) -> GlBuffer {
        let buffer = GlBuffer(self.alloc());
        self.calls.push(GlCall::CreateBuffer(buffer));
        buffer
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<GlBuffer>) {
        self.calls.push(GlCall::BindBuffer(target, buffer));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.calls.push(GlCall::BufferData {
            target,
            len: data.len(),
            usage,
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.calls.push(GlCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn create_texture(&mut self) -> GlTexture {
        let texture = GlTexture(self.alloc());
        self.calls.push(GlCall::CreateTexture(texture));
        texture
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: Option<GlTexture>) {
        self.calls.push(GlCall::BindTexture(texture));
    }

    fn tex_image_2d(&mut self, image: &TexImage<'_>) {
        self.calls.push(GlCall::TexImage2D {
            width: image.width,
            height: image.height,
            format: image.format,
            pixel_type: image.pixel_type,
        });
    }

    fn tex_parameter(&mut self, parameter: TexParameter, value: u32) {
        self.calls.push(GlCall::TexParameter(parameter, value));
    }

    fn generate_mipmap(&mut self) {
        self.calls.push(GlCall::GenerateMipmap);
    }

    fn create_shader(&mut self, stage: ShaderStage) -> GlShader {
        let shader = GlShader(self.alloc());
        self.shaders.insert(
            shader,
            ShaderRecord {
                source: String::new(),
                compiled: false,
                info_log: String::new(),
            },
        );
        self.calls.push(GlCall::CreateShader(shader, stage));
        shader
    }

    fn shader_source(&mut self, shader: GlShader, source: &str) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            record.source = source.to_string();
        }
        self.calls.push(GlCall::ShaderSource(shader, source.to_string()));
    }

    fn compile_shader(&mut self, shader: GlShader) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            if has_error_directive(&preprocess(&record.source)) {
                record.compiled = false;
                record.info_log = String::from("ERROR: 0:1: '#error' : compilation terminated");
            } else {
                record.compiled = true;
                record.info_log.clear();
            }
        }
        self.calls.push(GlCall::CompileShader(shader));
    }

    fn shader_compile_status(&self, shader: GlShader) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: GlShader) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: GlShader) {
        self.shaders.remove(&shader);
        self.calls.push(GlCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> GlProgram {
        let program = GlProgram(self.alloc());
        self.programs.insert(program, ProgramRecord::default());
        self.calls.push(GlCall::CreateProgram(program));
        program
    }

    fn attach_shader(&mut self, program: GlProgram, shader: GlShader) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.shaders.push(shader);
        }
        self.calls.push(GlCall::AttachShader(program, shader));
    }

    fn bind_attrib_location(&mut self, program: GlProgram, index: u32, name: &str) {
        self.calls
            .push(GlCall::BindAttribLocation(program, index, name.to_string()));
    }

    fn link_program(&mut self, program: GlProgram) {
        self.calls.push(GlCall::LinkProgram(program));

        let Some(record) = self.programs.get(&program) else {
            return;
        };
        let mut linked = true;
        let mut uniforms: Vec<String> = Vec::new();
        for shader in &record.shaders {
            match self.shaders.get(shader) {
                Some(s) if s.compiled => {
                    for name in declared_uniforms(&preprocess(&s.source)) {
                        if !uniforms.contains(&name) {
                            uniforms.push(name);
                        }
                    }
                }
                _ => linked = false,
            }
        }

        let mut locations = FxHashMap::default();
        if linked {
            for name in &uniforms {
                let location = UniformLocation(self.alloc());
                self.uniform_names
                    .insert(location, name.trim_end_matches("[0]").to_string());
                locations.insert(name.trim_end_matches("[0]").to_string(), location);
            }
        }

        if let Some(record) = self.programs.get_mut(&program) {
            record.linked = linked;
            record.info_log = if linked {
                String::new()
            } else {
                String::from("ERROR: one or more attached shaders not successfully compiled")
            };
            record.uniforms = if linked { uniforms } else { Vec::new() };
            record.locations = locations;
        }
    }

    fn program_link_status(&self, program: GlProgram) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: GlProgram) -> String {
        self.programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: GlProgram) {
        self.programs.remove(&program);
        self.calls.push(GlCall::DeleteProgram(program));
    }

    fn active_uniform_names(&self, program: GlProgram) -> Vec<String> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn uniform_location(&self, program: GlProgram, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)
            .and_then(|p| p.locations.get(name).copied())
    }

    fn use_program(&mut self, program: Option<GlProgram>) {
        self.calls.push(GlCall::UseProgram(program));
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.calls.push(GlCall::Uniform1i(location, value));
    }

    fn uniform_fv(&mut self, location: UniformLocation, components: u32, values: &[f32]) {
        self.calls.push(GlCall::UniformFv {
            location,
            components,
            values: values.to_vec(),
        });
    }

    fn uniform_matrix4fv(&mut self, location: UniformLocation, value: &[f32; 16]) {
        self.calls.push(GlCall::UniformMatrix4fv(location, *value));
    }

    fn enable(&mut self, capability: Capability) {
        self.calls.push(GlCall::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.calls.push(GlCall::Disable(capability));
    }

    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.calls.push(GlCall::ColorMask([red, green, blue, alpha]));
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.calls.push(GlCall::DepthMask(enabled));
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.calls.push(GlCall::StencilMask(mask));
    }

    fn blend_func(&mut self, src: u32, dst: u32) {
        self.calls.push(GlCall::BlendFunc(src, dst));
    }

    fn depth_func(&mut self, func: u32) {
        self.calls.push(GlCall::DepthFunc(func));
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.calls.push(GlCall::Viewport(viewport));
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(GlCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(GlCall::DisableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        component_type: ComponentType,
        normalized: bool,
        stride: u32,
        offset: usize,
    ) {
        self.calls.push(GlCall::VertexAttribPointer {
            index,
            size,
            component_type,
            normalized,
            stride,
            offset,
        });
    }

    fn create_vertex_array(&mut self) -> Option<GlVertexArray> {
        if !self.vertex_array_objects {
            return None;
        }
        let vao = GlVertexArray(self.alloc());
        self.calls.push(GlCall::CreateVertexArray(vao));
        Some(vao)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<GlVertexArray>) {
        self.calls.push(GlCall::BindVertexArray(vertex_array));
    }

    fn draw_arrays(&mut self, mode: Topology, first: u32, count: u32) {
        self.calls.push(GlCall::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: Topology, count: u32, index_type: IndexType, offset: usize) {
        self.calls.push(GlCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
    }
}
