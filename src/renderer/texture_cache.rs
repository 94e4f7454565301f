//! Render Texture Cache
//!
//! Maps texture keys to GL texture objects. Every key is uploaded once,
//! however many materials reference it. Textures whose pixels are still
//! loading are parked in a pending list and uploaded by [`poll_pending`]
//! once their source settles.
//!
//! [`poll_pending`]: TextureCache::poll_pending

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::gl::{GlContext, GlTexture, PixelType, TexImage, TexParameter};
use crate::core::Readiness;
use crate::errors::{Result, View360Error};
use crate::resources::{Texture, TextureSource};

/// Handle to a cached [`RenderTexture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTextureId(pub(crate) u32);

impl RenderTextureId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// GPU-side state of one texture key.
pub struct RenderTexture {
    texture: Arc<Texture>,
    handle: GlTexture,
    complete: bool,
    failed: bool,
    active_frame_id: u64,
}

impl RenderTexture {
    #[inline]
    #[must_use]
    pub fn handle(&self) -> GlTexture {
        self.handle
    }

    /// Whether pixels have been uploaded.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.texture.key()
    }

    /// Uploads whatever the source has now. Returns the source state.
    fn try_upload(&mut self, gl: &mut dyn GlContext) -> Readiness {
        let texture = self.texture.clone();
        match texture.source() {
            TextureSource::Data(data) => {
                self.upload(
                    gl,
                    &TexImage {
                        width: data.width,
                        height: data.height,
                        format: data.format,
                        pixel_type: data.pixel_type,
                        pixels: &data.bytes,
                    },
                );
                Readiness::Ready
            }
            TextureSource::Image(image) => {
                let mut pixels = image.pixels.lock();
                match pixels.poll() {
                    Readiness::Ready => {
                        if let Some(decoded) = pixels.take() {
                            self.upload(
                                gl,
                                &TexImage {
                                    width: decoded.width,
                                    height: decoded.height,
                                    format: decoded.format,
                                    pixel_type: PixelType::UnsignedByte,
                                    pixels: &decoded.pixels,
                                },
                            );
                        }
                        Readiness::Ready
                    }
                    Readiness::Failed => {
                        if let Some(err) = pixels.error() {
                            log::warn!("Texture '{}' failed to load: {err}", texture.key());
                        }
                        self.failed = true;
                        Readiness::Failed
                    }
                    Readiness::Pending => Readiness::Pending,
                }
            }
            TextureSource::Video(video) => {
                if !video.is_ready() {
                    return Readiness::Pending;
                }
                let (width, height, format) = (video.width(), video.height(), video.format());
                video.with_frame(&mut |pixels| {
                    self.upload(
                        gl,
                        &TexImage {
                            width,
                            height,
                            format,
                            pixel_type: PixelType::UnsignedByte,
                            pixels,
                        },
                    );
                });
                Readiness::Ready
            }
        }
    }

    fn upload(&mut self, gl: &mut dyn GlContext, image: &TexImage<'_>) {
        gl.bind_texture(Some(self.handle));
        gl.tex_image_2d(image);

        let sampler = self
            .texture
            .sampler
            .resolve(image.width, image.height, self.texture.mipmap);
        if sampler.generate_mipmaps {
            gl.generate_mipmap();
        }
        gl.tex_parameter(TexParameter::MinFilter, sampler.min_filter as u32);
        gl.tex_parameter(TexParameter::MagFilter, sampler.mag_filter as u32);
        gl.tex_parameter(TexParameter::WrapS, sampler.wrap_s as u32);
        gl.tex_parameter(TexParameter::WrapT, sampler.wrap_t as u32);
        self.complete = true;
    }

    /// Per-frame hook. Video textures re-upload their current frame at most
    /// once per frame while playing.
    fn mark_active(&mut self, frame_id: u64, gl: &mut dyn GlContext) {
        if self.active_frame_id == frame_id {
            return;
        }
        self.active_frame_id = frame_id;

        if !self.complete {
            return;
        }
        if let TextureSource::Video(video) = self.texture.source() {
            if video.is_playing() && !video.is_stalled() {
                let handle = self.handle;
                let (width, height, format) = (video.width(), video.height(), video.format());
                video.with_frame(&mut |pixels| {
                    gl.bind_texture(Some(handle));
                    gl.tex_image_2d(&TexImage {
                        width,
                        height,
                        format,
                        pixel_type: PixelType::UnsignedByte,
                        pixels,
                    });
                });
            }
        }
    }
}

#[derive(Default)]
pub struct TextureCache {
    textures: Vec<RenderTexture>,
    lookup: FxHashMap<String, RenderTextureId>,
    pending: Vec<RenderTextureId>,
}

impl TextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the render texture for `texture`'s key, creating and
    /// uploading it on first request.
    pub fn get_or_create(
        &mut self,
        gl: &mut dyn GlContext,
        texture: &Arc<Texture>,
    ) -> Result<RenderTextureId> {
        let key = texture.key();
        if key.is_empty() {
            return Err(View360Error::MissingTextureKey);
        }
        if let Some(&id) = self.lookup.get(key) {
            return Ok(id);
        }

        let id = RenderTextureId(self.textures.len() as u32);
        let mut render_texture = RenderTexture {
            texture: texture.clone(),
            handle: gl.create_texture(),
            complete: false,
            failed: false,
            active_frame_id: 0,
        };
        if render_texture.try_upload(gl) == Readiness::Pending {
            self.pending.push(id);
        }
        log::debug!(
            "Created render texture '{key}' ({})",
            if render_texture.complete { "uploaded" } else { "pending" }
        );

        self.textures.push(render_texture);
        self.lookup.insert(key.to_string(), id);
        Ok(id)
    }

    /// Uploads pending textures whose sources have settled. An upload here
    /// counts as frame `frame_id`'s video upload.
    pub fn poll_pending(&mut self, gl: &mut dyn GlContext, frame_id: u64) {
        let textures = &mut self.textures;
        self.pending.retain(|id| {
            let texture = &mut textures[id.index()];
            if texture.try_upload(gl) == Readiness::Pending {
                return true;
            }
            texture.active_frame_id = frame_id;
            false
        });
    }

    /// Per-frame activation. Returns whether the texture can be sampled.
    pub fn mark_active(&mut self, id: RenderTextureId, frame_id: u64, gl: &mut dyn GlContext) -> bool {
        let texture = &mut self.textures[id.index()];
        texture.mark_active(frame_id, gl);
        texture.complete
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: RenderTextureId) -> &RenderTexture {
        &self.textures[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
