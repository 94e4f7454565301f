use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::OnceLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::{Builder, Runtime};

use crate::errors::{Result, View360Error};

/// Future returned by [`AssetReader::read_bytes`].
pub type ReadFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'static>>;

/// Shared multi-threaded runtime that runs asset reads and image decodes.
pub fn asset_runtime() -> Result<&'static Runtime> {
    static RUNTIME: OnceLock<std::result::Result<Runtime, String>> = OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            Builder::new_multi_thread()
                .thread_name("view360-assets")
                .enable_all()
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| View360Error::RuntimeUnavailable(e.clone()))
}

/// Asset reader trait
///
/// Resolves a URI relative to the reader's base and reads it
/// asynchronously.
pub trait AssetReader: Send + Sync {
    fn read_bytes(&self, uri: &str) -> ReadFuture;

    /// Display form of `uri` resolved against the reader's base. Used as
    /// the cache key for external images.
    fn resolve(&self, uri: &str) -> String {
        uri.to_string()
    }
}

/// Local file reader
pub struct FileAssetReader {
    root_path: PathBuf,
}

impl FileAssetReader {
    /// A path to a file uses the file's directory as the root.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl AssetReader for FileAssetReader {
    fn read_bytes(&self, uri: &str) -> ReadFuture {
        let path = self.root_path.join(uri);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(View360Error::AssetNotFound(path.display().to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn resolve(&self, uri: &str) -> String {
        self.root_path.join(uri).display().to_string()
    }
}

/// In-memory reader keyed by URI.
#[derive(Default)]
pub struct MemoryAssetReader {
    files: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl MemoryAssetReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.files.write().insert(uri.into(), bytes);
    }
}

impl AssetReader for MemoryAssetReader {
    fn read_bytes(&self, uri: &str) -> ReadFuture {
        let result = self
            .files
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| View360Error::AssetNotFound(uri.to_string()));
        Box::pin(async move { result })
    }
}

/// A parsed `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

#[must_use]
pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Cache key for a texture loaded from a data URI.
#[must_use]
pub fn data_uri_key(uri: &str) -> String {
    format!("DATAURI_{:016x}", xxhash_rust::xxh3::xxh3_64(uri.as_bytes()))
}

/// Decodes `data:[<mime>][;base64],<payload>`.
pub fn parse_data_uri(uri: &str) -> Result<DataUri> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| View360Error::DataUriError("missing \"data:\" prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| View360Error::DataUriError("missing ',' separator".to_string()))?;

    let (mime, base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let mime_type = (!mime.is_empty()).then(|| mime.to_string());
    let data = if base64 {
        STANDARD.decode(payload)?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(DataUri { mime_type, data })
}
