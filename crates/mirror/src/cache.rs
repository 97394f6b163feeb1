use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::frame::Frame;
use crate::resolve::{BacktraceSymbolizer, Symbolizer, resolve};
use crate::stack::RawPointer;

/// Append-only memo of pointer resolutions.
///
/// Return addresses name code that does not move for the life of the
/// process, so entries are never updated or evicted.
pub struct FrameCache {
    symbolizer: Box<dyn Symbolizer>,
    entries: RwLock<HashMap<RawPointer, Arc<[Frame]>>>,
}

impl FrameCache {
    pub fn new(symbolizer: impl Symbolizer + 'static) -> Self {
        Self {
            symbolizer: Box::new(symbolizer),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide cache backed by [`BacktraceSymbolizer`].
    pub fn global() -> &'static FrameCache {
        static CACHE: OnceLock<FrameCache> = OnceLock::new();
        CACHE.get_or_init(|| FrameCache::new(BacktraceSymbolizer))
    }

    /// Frames for `ptr`, resolving them on first use.
    ///
    /// A hit only clones the stored `Arc`. Racing misses may both resolve;
    /// whichever inserts first is kept and returned to both.
    pub fn get(&self, ptr: RawPointer) -> Arc<[Frame]> {
        if let Some(frames) = self.entries.read().get(&ptr) {
            return Arc::clone(frames);
        }

        let resolved = resolve(self.symbolizer.as_ref(), ptr);
        Arc::clone(self.entries.write().entry(ptr).or_insert(resolved))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for FrameCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
