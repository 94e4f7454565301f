use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::core::Completion;
use crate::renderer::gl::{BufferTarget, BufferUsage, GlBuffer};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Where the bytes of a new buffer come from.
pub enum BufferSource {
    /// Bytes available now; uploaded synchronously.
    Ready(Vec<u8>),
    /// Bytes produced by a loader; uploaded once the completion settles.
    Pending(Completion<Vec<u8>>),
}

impl BufferSource {
    #[must_use]
    pub fn from_slice<T: Pod>(data: &[T]) -> Self {
        BufferSource::Ready(bytemuck::cast_slice(data).to_vec())
    }
}

impl From<Vec<u8>> for BufferSource {
    fn from(bytes: Vec<u8>) -> Self {
        BufferSource::Ready(bytes)
    }
}

impl From<Completion<Vec<u8>>> for BufferSource {
    fn from(completion: Completion<Vec<u8>>) -> Self {
        BufferSource::Pending(completion)
    }
}

pub(crate) struct BufferState {
    pub handle: Option<GlBuffer>,
    pub byte_length: usize,
    pub source: Option<Completion<Vec<u8>>>,
    /// Writes issued before the initial upload landed: `(offset, bytes)`.
    pub deferred_writes: Vec<(usize, Vec<u8>)>,
    pub failed: bool,
}

#[derive(Debug)]
struct BufferShared {
    id: u64,
    target: BufferTarget,
    usage: BufferUsage,
    state: Mutex<BufferState>,
}

impl std::fmt::Debug for BufferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferState")
            .field("handle", &self.handle)
            .field("byte_length", &self.byte_length)
            .field("deferred_writes", &self.deferred_writes.len())
            .finish_non_exhaustive()
    }
}

/// A GPU vertex or index buffer whose contents may arrive asynchronously.
///
/// Cloning is cheap and yields another reference to the same buffer;
/// equality and hashing follow buffer identity.
#[derive(Debug, Clone)]
pub struct GeometryBuffer(Arc<BufferShared>);

impl PartialEq for GeometryBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for GeometryBuffer {}

impl std::hash::Hash for GeometryBuffer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl GeometryBuffer {
    /// Creates an unuploaded buffer. The renderer fills in the GL handle.
    pub(crate) fn new(target: BufferTarget, usage: BufferUsage, source: BufferSource) -> Self {
        let (byte_length, source) = match source {
            BufferSource::Ready(bytes) => (bytes.len(), Some(Completion::ready(bytes))),
            BufferSource::Pending(completion) => (0, Some(completion)),
        };
        Self(Arc::new(BufferShared {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            target,
            usage,
            state: Mutex::new(BufferState {
                handle: None,
                byte_length,
                source,
                deferred_writes: Vec::new(),
                failed: false,
            }),
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> BufferTarget {
        self.0.target
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.0.usage
    }

    /// The GL buffer, once the initial upload has happened.
    #[must_use]
    pub fn handle(&self) -> Option<GlBuffer> {
        self.0.state.lock().handle
    }

    /// Whether the buffer's contents have been uploaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.state.lock().handle.is_some()
    }

    /// Whether the buffer's data source failed; it will never become ready.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.0.state.lock().failed
    }

    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.0.state.lock().byte_length
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut BufferState) -> R) -> R {
        f(&mut self.0.state.lock())
    }
}
