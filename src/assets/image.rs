//! Image decoding for textures.

use std::sync::Arc;

use crate::assets::io::{AssetReader, asset_runtime, data_uri_key, is_data_uri, parse_data_uri};
use crate::core::completion_pair;
use crate::errors::Result;
use crate::renderer::gl::PixelFormat;
use crate::resources::{DecodedImage, Texture};

/// Decodes a PNG or JPEG into tightly packed RGBA8.
pub fn decode_rgba8(bytes: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes)?.into_rgba8();
    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        width,
        height,
        format: PixelFormat::Rgba,
        pixels: image.into_raw(),
    })
}

/// [`decode_rgba8`] on the blocking pool.
pub async fn decode_image(bytes: Vec<u8>) -> Result<DecodedImage> {
    tokio::task::spawn_blocking(move || decode_rgba8(&bytes)).await?
}

/// An image texture for `uri` that fills in once the file has been read
/// and decoded on the asset runtime.
///
/// The texture is keyed by the resolved URI, so loading the same image
/// twice shares one GPU texture.
pub fn load_image_texture(reader: &Arc<dyn AssetReader>, uri: &str) -> Result<Texture> {
    let runtime = asset_runtime()?;
    let (completer, completion) = completion_pair();

    if is_data_uri(uri) {
        let key = data_uri_key(uri);
        let bytes = parse_data_uri(uri)?.data;
        runtime.spawn(async move { completer.settle(decode_image(bytes).await) });
        return Ok(Texture::from_image(key, completion));
    }

    let key = reader.resolve(uri);
    let read = reader.read_bytes(uri);
    let label = key.clone();
    runtime.spawn(async move {
        let result = match read.await {
            Ok(bytes) => decode_image(bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            log::warn!("Failed to load image '{label}': {e}");
        }
        completer.settle(result);
    });
    Ok(Texture::from_image(key, completion))
}
