use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::Completion;
use crate::renderer::gl::{PixelFormat, PixelType};

static NEXT_DATA_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Sampler
// ============================================================================

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest = 0x2600,
    Linear = 0x2601,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest = 0x2600,
    Linear = 0x2601,
    NearestMipmapNearest = 0x2700,
    LinearMipmapNearest = 0x2701,
    NearestMipmapLinear = 0x2702,
    LinearMipmapLinear = 0x2703,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat = 0x2901,
    ClampToEdge = 0x812F,
    MirroredRepeat = 0x8370,
}

/// Explicit sampler settings. Unset fields fall back to defaults derived
/// from the texture dimensions when the texture is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureSampler {
    pub min_filter: Option<MinFilter>,
    pub mag_filter: Option<MagFilter>,
    pub wrap_s: Option<WrapMode>,
    pub wrap_t: Option<WrapMode>,
}

/// Sampler parameters after applying the size-dependent defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSampler {
    pub generate_mipmaps: bool,
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl TextureSampler {
    /// Fills unset fields from the texture size.
    ///
    /// Power-of-two textures get mipmaps (when `mipmap` is set), trilinear
    /// minification and repeat wrapping; others get linear minification and
    /// clamp-to-edge wrapping.
    #[must_use]
    pub fn resolve(&self, width: u32, height: u32, mipmap: bool) -> ResolvedSampler {
        let power_of_two = is_power_of_two(width) && is_power_of_two(height);
        let generate_mipmaps = power_of_two && mipmap;
        ResolvedSampler {
            generate_mipmaps,
            min_filter: self.min_filter.unwrap_or(if generate_mipmaps {
                MinFilter::LinearMipmapLinear
            } else {
                MinFilter::Linear
            }),
            mag_filter: self.mag_filter.unwrap_or(MagFilter::Linear),
            wrap_s: self.wrap_s.unwrap_or(if power_of_two {
                WrapMode::Repeat
            } else {
                WrapMode::ClampToEdge
            }),
            wrap_t: self.wrap_t.unwrap_or(if power_of_two {
                WrapMode::Repeat
            } else {
                WrapMode::ClampToEdge
            }),
        }
    }
}

#[inline]
fn is_power_of_two(n: u32) -> bool {
    n.is_power_of_two()
}

// ============================================================================
// Sources
// ============================================================================

/// Decoded pixel data ready for upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

/// An image whose pixels are decoded asynchronously.
#[derive(Debug)]
pub struct ImageSource {
    pub(crate) pixels: Mutex<Completion<DecodedImage>>,
}

/// A streaming source of video frames.
///
/// Implemented by the host's media pipeline. Frames are RGBA8 unless
/// [`format`](VideoSource::format) says otherwise.
pub trait VideoSource: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> PixelFormat {
        PixelFormat::Rgba
    }
    /// Whether at least one frame is available.
    fn is_ready(&self) -> bool;
    fn is_playing(&self) -> bool;
    fn is_stalled(&self) -> bool;
    /// Calls `f` with the current frame's pixels.
    fn with_frame(&self, f: &mut dyn FnMut(&[u8]));
}

/// Raw pixels supplied by the application.
#[derive(Debug, Clone)]
pub struct DataSource {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixel_type: PixelType,
    pub bytes: Vec<u8>,
}

pub enum TextureSource {
    Image(ImageSource),
    Video(Arc<dyn VideoSource>),
    Data(DataSource),
}

impl std::fmt::Debug for TextureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(image) => f.debug_tuple("Image").field(image).finish(),
            Self::Video(video) => write!(f, "Video({}x{})", video.width(), video.height()),
            Self::Data(data) => write!(f, "Data({}x{})", data.width, data.height),
        }
    }
}

// ============================================================================
// Texture
// ============================================================================

/// A 2D texture description.
///
/// Textures are identified by their key: the render texture cache uploads
/// each key once no matter how many materials reference it.
#[derive(Debug)]
pub struct Texture {
    key: String,
    source: TextureSource,
    pub sampler: TextureSampler,
    pub mipmap: bool,
}

impl Texture {
    /// An image texture keyed by its URI.
    #[must_use]
    pub fn from_image(uri: impl Into<String>, pixels: Completion<DecodedImage>) -> Self {
        Self::with_source(
            uri.into(),
            TextureSource::Image(ImageSource {
                pixels: Mutex::new(pixels),
            }),
        )
    }

    #[must_use]
    pub fn video(key: impl Into<String>, source: Arc<dyn VideoSource>) -> Self {
        Self::with_source(key.into(), TextureSource::Video(source))
    }

    /// A texture over raw pixels, keyed `DATA_<n>`.
    #[must_use]
    pub fn data(
        bytes: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
    ) -> Self {
        let id = NEXT_DATA_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_source(
            format!("DATA_{id}"),
            TextureSource::Data(DataSource {
                width,
                height,
                format,
                pixel_type,
                bytes,
            }),
        )
    }

    /// A 1x1 RGBA texture. All colour textures of the same value share a key.
    #[must_use]
    pub fn color(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::with_source(
            format!("COLOR_{r}_{g}_{b}_{a}"),
            TextureSource::Data(DataSource {
                width: 1,
                height: 1,
                format: PixelFormat::Rgba,
                pixel_type: PixelType::UnsignedByte,
                bytes: vec![r, g, b, a],
            }),
        )
    }

    /// [`Texture::color`] from normalized components.
    #[must_use]
    pub fn color_f32(rgba: [f32; 4]) -> Self {
        let [r, g, b, a] = rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self::color(r, g, b, a)
    }

    fn with_source(key: String, source: TextureSource) -> Self {
        Self {
            key,
            source,
            sampler: TextureSampler::default(),
            mipmap: true,
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: TextureSampler) -> Self {
        self.sampler = sampler;
        self
    }

    #[must_use]
    pub fn with_mipmap(mut self, mipmap: bool) -> Self {
        self.mipmap = mipmap;
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &TextureSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_defaults_follow_size() {
        let pot = TextureSampler::default().resolve(256, 128, true);
        assert!(pot.generate_mipmaps);
        assert_eq!(pot.min_filter, MinFilter::LinearMipmapLinear);
        assert_eq!(pot.wrap_s, WrapMode::Repeat);

        let npot = TextureSampler::default().resolve(300, 128, true);
        assert!(!npot.generate_mipmaps);
        assert_eq!(npot.min_filter, MinFilter::Linear);
        assert_eq!(npot.wrap_t, WrapMode::ClampToEdge);
        assert_eq!(npot.mag_filter, MagFilter::Linear);
    }

    #[test]
    fn test_explicit_sampler_wins() {
        let sampler = TextureSampler {
            min_filter: Some(MinFilter::Nearest),
            wrap_s: Some(WrapMode::MirroredRepeat),
            ..Default::default()
        };
        let resolved = sampler.resolve(64, 64, false);
        assert!(!resolved.generate_mipmaps);
        assert_eq!(resolved.min_filter, MinFilter::Nearest);
        assert_eq!(resolved.wrap_s, WrapMode::MirroredRepeat);
        assert_eq!(resolved.wrap_t, WrapMode::Repeat);
    }

    #[test]
    fn test_color_keys() {
        assert_eq!(Texture::color(255, 0, 0, 255).key(), "COLOR_255_0_0_255");
        assert_eq!(Texture::color_f32([1.0, 0.0, 0.0, 1.0]).key(), "COLOR_255_0_0_255");
        let a = Texture::data(vec![0; 4], 1, 1, PixelFormat::Rgba, PixelType::UnsignedByte);
        let b = Texture::data(vec![0; 4], 1, 1, PixelFormat::Rgba, PixelType::UnsignedByte);
        assert!(a.key().starts_with("DATA_"));
        assert_ne!(a.key(), b.key());
    }
}
