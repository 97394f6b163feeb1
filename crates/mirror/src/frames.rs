use std::iter::FusedIterator;
use std::slice;
use std::sync::Arc;

use crate::cache::FrameCache;
use crate::frame::Frame;
use crate::stack::RawPointer;

/// Walks a captured stack one logical frame at a time.
///
/// Pointers are only resolved when the frames they expand to are requested,
/// so reading the first frame of a deep stack costs a single lookup.
pub struct Frames<'a> {
    cache: &'a FrameCache,
    ptrs: slice::Iter<'a, RawPointer>,
    current: Option<Arc<[Frame]>>,
    index: usize,
    /// Inlined frames still to drop from the first pointer's expansion.
    skip_first: usize,
}

impl<'a> Frames<'a> {
    pub(crate) fn new(ptrs: &'a [RawPointer], skip_first: usize, cache: &'a FrameCache) -> Self {
        Self {
            cache,
            ptrs: ptrs.iter(),
            current: None,
            index: 0,
            skip_first,
        }
    }

    fn buffered(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |frames| frames.len().saturating_sub(self.index))
    }
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.current.as_ref().and_then(|frames| frames.get(self.index)) {
                self.index += 1;
                return Some(frame.clone());
            }

            let Some(ptr) = self.ptrs.next() else {
                self.current = None;
                return None;
            };
            self.current = Some(self.cache.get(*ptr));
            self.index = std::mem::take(&mut self.skip_first);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // every pointer expands to at least one frame, except possibly a
        // first one whose inlined frames were all skipped
        let pointers = self.ptrs.len().saturating_sub(usize::from(self.skip_first > 0));
        (self.buffered() + pointers, None)
    }
}

impl FusedIterator for Frames<'_> {}

impl std::fmt::Debug for Frames<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frames")
            .field("pointers", &self.ptrs.len())
            .field("buffered", &self.buffered())
            .finish()
    }
}
