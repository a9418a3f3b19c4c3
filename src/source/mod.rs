pub mod buffer;

pub use buffer::BufferSource;

use std::sync::Arc;

use parking_lot::Mutex;

/// Common trait implemented by every playable audio source.
///
/// Sources yield interleaved stereo f32 frames on demand. The engine never
/// decodes media itself — decoding happens upstream, and the resulting PCM
/// is handed over behind this trait.
pub trait SampleSource: Send {
    /// Fill `out` (interleaved stereo, [L, R, L, R, ...]) from the current
    /// play position. Returns the number of samples written; anything short
    /// of `out.len()` means the source ran dry for this block.
    fn pull(&mut self, out: &mut [f32]) -> usize;
}

/// Cloneable, identity-comparable handle to a live source.
///
/// Clones refer to the same underlying source, so the graph can tell a
/// stale handle from the one currently wired.
#[derive(Clone)]
pub struct SourceHandle {
    inner: Arc<Mutex<dyn SampleSource>>,
}

impl SourceHandle {
    pub fn new(source: impl SampleSource + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    /// Whether two handles wrap the same underlying source.
    pub fn same_source(&self, other: &SourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn pull(&self, out: &mut [f32]) -> usize {
        self.inner.lock().pull(out)
    }
}
