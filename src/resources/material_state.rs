//! Packed fixed-function state of a material.
//!
//! Layout of the 32-bit state word:
//!
//! | bits   | field                                    |
//! |--------|------------------------------------------|
//! | 0..8   | capability flags ([`StateFlags`])        |
//! | 8..12  | blend source factor (encoded)            |
//! | 12..16 | blend destination factor (encoded)       |
//! | 16..20 | depth comparison (`func - NEVER`)        |
//!
//! Blend factors `ZERO` and `ONE` are stored as-is; every other factor is
//! stored as `(factor - SRC_COLOR) + 2`.

use bitflags::bitflags;

bitflags! {
    /// Capability bits in the low byte of the state word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        const CULL_FACE    = 0x01;
        const BLEND        = 0x02;
        const DEPTH_TEST   = 0x04;
        const STENCIL_TEST = 0x08;
        const COLOR_MASK   = 0x10;
        const DEPTH_MASK   = 0x20;
        const STENCIL_MASK = 0x40;
    }
}

pub const CAPS_RANGE: u32 = 0xFF;
pub const BLEND_SRC_SHIFT: u32 = 8;
pub const BLEND_SRC_RANGE: u32 = 0x0F00;
pub const BLEND_DST_SHIFT: u32 = 12;
pub const BLEND_DST_RANGE: u32 = 0xF000;
pub const BLEND_FUNC_RANGE: u32 = 0xFF00;
pub const DEPTH_FUNC_SHIFT: u32 = 16;
pub const DEPTH_FUNC_RANGE: u32 = 0xF_0000;

const GL_SRC_COLOR: u32 = 0x0300;
const GL_NEVER: u32 = 0x0200;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcColor = 0x0300,
    OneMinusSrcColor = 0x0301,
    SrcAlpha = 0x0302,
    OneMinusSrcAlpha = 0x0303,
    DstAlpha = 0x0304,
    OneMinusDstAlpha = 0x0305,
    DstColor = 0x0306,
    OneMinusDstColor = 0x0307,
    SrcAlphaSaturate = 0x0308,
}

impl BlendFactor {
    #[inline]
    #[must_use]
    pub fn gl(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn from_gl(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Zero,
            1 => Self::One,
            0x0300 => Self::SrcColor,
            0x0301 => Self::OneMinusSrcColor,
            0x0302 => Self::SrcAlpha,
            0x0303 => Self::OneMinusSrcAlpha,
            0x0304 => Self::DstAlpha,
            0x0305 => Self::OneMinusDstAlpha,
            0x0306 => Self::DstColor,
            0x0307 => Self::OneMinusDstColor,
            0x0308 => Self::SrcAlphaSaturate,
            _ => return None,
        })
    }

    const fn encode(self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            other => (other as u32 - GL_SRC_COLOR) + 2,
        }
    }

    fn decode(bits: u32) -> Self {
        let gl = match bits {
            0 | 1 => bits,
            n => (n - 2) + GL_SRC_COLOR,
        };
        Self::from_gl(gl).unwrap_or(Self::One)
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Never = 0x0200,
    Less = 0x0201,
    Equal = 0x0202,
    LessEqual = 0x0203,
    Greater = 0x0204,
    NotEqual = 0x0205,
    GreaterEqual = 0x0206,
    Always = 0x0207,
}

impl DepthFunc {
    #[inline]
    #[must_use]
    pub fn gl(self) -> u32 {
        self as u32
    }

    fn decode(bits: u32) -> Self {
        match bits + GL_NEVER {
            0x0200 => Self::Never,
            0x0201 => Self::Less,
            0x0202 => Self::Equal,
            0x0203 => Self::LessEqual,
            0x0204 => Self::Greater,
            0x0205 => Self::NotEqual,
            0x0206 => Self::GreaterEqual,
            _ => Self::Always,
        }
    }
}

/// The packed state word of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialState(u32);

impl Default for MaterialState {
    /// Back-face culling, depth test, color and depth writes, alpha
    /// blending factors (blending itself off) and `LESS` depth comparison.
    fn default() -> Self {
        let mut state = Self(
            (StateFlags::CULL_FACE
                | StateFlags::DEPTH_TEST
                | StateFlags::COLOR_MASK
                | StateFlags::DEPTH_MASK)
                .bits(),
        );
        state.set_blend_func_src(BlendFactor::SrcAlpha);
        state.set_blend_func_dst(BlendFactor::OneMinusSrcAlpha);
        state.set_depth_func(DepthFunc::Less);
        state
    }
}

impl MaterialState {
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn flags(self) -> StateFlags {
        StateFlags::from_bits_truncate(self.0 & CAPS_RANGE)
    }

    #[inline]
    #[must_use]
    pub fn contains(self, flag: StateFlags) -> bool {
        self.flags().contains(flag)
    }

    pub fn set_flag(&mut self, flag: StateFlags, enabled: bool) {
        if enabled {
            self.0 |= flag.bits();
        } else {
            self.0 &= !flag.bits();
        }
    }

    // ─── Capabilities ─────────────────────────────────────────────────

    #[must_use]
    pub fn cull_face(self) -> bool {
        self.contains(StateFlags::CULL_FACE)
    }
    pub fn set_cull_face(&mut self, value: bool) {
        self.set_flag(StateFlags::CULL_FACE, value);
    }

    #[must_use]
    pub fn blend(self) -> bool {
        self.contains(StateFlags::BLEND)
    }
    pub fn set_blend(&mut self, value: bool) {
        self.set_flag(StateFlags::BLEND, value);
    }

    #[must_use]
    pub fn depth_test(self) -> bool {
        self.contains(StateFlags::DEPTH_TEST)
    }
    pub fn set_depth_test(&mut self, value: bool) {
        self.set_flag(StateFlags::DEPTH_TEST, value);
    }

    #[must_use]
    pub fn stencil_test(self) -> bool {
        self.contains(StateFlags::STENCIL_TEST)
    }
    pub fn set_stencil_test(&mut self, value: bool) {
        self.set_flag(StateFlags::STENCIL_TEST, value);
    }

    #[must_use]
    pub fn color_mask(self) -> bool {
        self.contains(StateFlags::COLOR_MASK)
    }
    pub fn set_color_mask(&mut self, value: bool) {
        self.set_flag(StateFlags::COLOR_MASK, value);
    }

    #[must_use]
    pub fn depth_mask(self) -> bool {
        self.contains(StateFlags::DEPTH_MASK)
    }
    pub fn set_depth_mask(&mut self, value: bool) {
        self.set_flag(StateFlags::DEPTH_MASK, value);
    }

    #[must_use]
    pub fn stencil_mask(self) -> bool {
        self.contains(StateFlags::STENCIL_MASK)
    }
    pub fn set_stencil_mask(&mut self, value: bool) {
        self.set_flag(StateFlags::STENCIL_MASK, value);
    }

    // ─── Packed fields ────────────────────────────────────────────────

    #[must_use]
    pub fn depth_func(self) -> DepthFunc {
        DepthFunc::decode((self.0 & DEPTH_FUNC_RANGE) >> DEPTH_FUNC_SHIFT)
    }
    pub fn set_depth_func(&mut self, func: DepthFunc) {
        self.0 = (self.0 & !DEPTH_FUNC_RANGE) | ((func.gl() - GL_NEVER) << DEPTH_FUNC_SHIFT);
    }

    #[must_use]
    pub fn blend_func_src(self) -> BlendFactor {
        BlendFactor::decode((self.0 & BLEND_SRC_RANGE) >> BLEND_SRC_SHIFT)
    }
    pub fn set_blend_func_src(&mut self, factor: BlendFactor) {
        self.0 = (self.0 & !BLEND_SRC_RANGE) | (factor.encode() << BLEND_SRC_SHIFT);
    }

    #[must_use]
    pub fn blend_func_dst(self) -> BlendFactor {
        BlendFactor::decode((self.0 & BLEND_DST_RANGE) >> BLEND_DST_SHIFT)
    }
    pub fn set_blend_func_dst(&mut self, factor: BlendFactor) {
        self.0 = (self.0 & !BLEND_DST_RANGE) | (factor.encode() << BLEND_DST_SHIFT);
    }
}

/// Draw bucket of a material. Buckets are drawn in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RenderOrder {
    Opaque = 0,
    Sky = 1,
    Transparent = 2,
    Additive = 3,
    /// Resolved to `Transparent` or `Opaque` from the blend flag.
    #[default]
    Default = 4,
}

impl RenderOrder {
    /// Number of draw buckets after resolution.
    pub const BUCKET_COUNT: usize = 4;

    #[must_use]
    pub fn resolve(self, state: MaterialState) -> RenderOrder {
        match self {
            RenderOrder::Default if state.blend() => RenderOrder::Transparent,
            RenderOrder::Default => RenderOrder::Opaque,
            other => other,
        }
    }

    /// Bucket index. An unresolved `Default` lands with the opaque
    /// primitives, as it would under a default state.
    #[must_use]
    pub fn bucket(self) -> usize {
        match self {
            RenderOrder::Opaque | RenderOrder::Default => 0,
            RenderOrder::Sky => 1,
            RenderOrder::Transparent => 2,
            RenderOrder::Additive => 3,
        }
    }
}
