use std::error::Error;
use std::fmt;

use crate::cache::FrameCache;
use crate::frames::Frames;

/// Maximum number of return addresses kept by [`capture`].
pub const DEPTH: usize = 32;

/// Frames between the unwinder's first report and the caller of [`capture`]
/// when the unwinder cannot report function entry addresses: the `backtrace`
/// walk entry points plus `capture` itself. Depends on the target and on the
/// `backtrace` version.
pub const BASE_SKIPS: usize = 3;

/// A return address in the current process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawPointer(usize);

impl RawPointer {
    pub fn new(addr: usize) -> Result<Self, InvalidPointer> {
        if addr == 0 {
            return Err(InvalidPointer);
        }
        Ok(Self(addr))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for RawPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPointer(0x{:x})", self.0)
    }
}

impl fmt::Display for RawPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPointer;

impl fmt::Display for InvalidPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "return address must be non-zero")
    }
}

impl Error for InvalidPointer {}

/// Return addresses of a call stack, innermost first.
///
/// When `skip` ends partway through the calls inlined into the first return
/// address, the remainder is kept here and dropped while iterating.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CapturedStack {
    ptrs: [RawPointer; DEPTH],
    len: usize,
    skip_first: usize,
}

impl CapturedStack {
    const EMPTY: Self = Self {
        ptrs: [RawPointer(0); DEPTH],
        len: 0,
        skip_first: 0,
    };

    /// Number of return addresses, not logical frames.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[RawPointer] {
        &self.ptrs[..self.len]
    }

    /// Lazily resolved frames, through the process-wide cache.
    pub fn frames(&self) -> Frames<'_> {
        self.frames_in(FrameCache::global())
    }

    pub fn frames_in<'a>(&'a self, cache: &'a FrameCache) -> Frames<'a> {
        Frames::new(self.as_slice(), self.skip_first, cache)
    }

    /// Returns false once the stack is full.
    fn push(&mut self, ptr: RawPointer) -> bool {
        if self.len == DEPTH {
            return false;
        }
        self.ptrs[self.len] = ptr;
        self.len += 1;
        self.len < DEPTH
    }
}

impl Default for CapturedStack {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl FromIterator<RawPointer> for CapturedStack {
    /// Keeps the first [`DEPTH`] pointers and drops the rest.
    fn from_iter<I: IntoIterator<Item = RawPointer>>(iter: I) -> Self {
        let mut stack = Self::EMPTY;
        for ptr in iter {
            if !stack.push(ptr) {
                break;
            }
        }
        stack
    }
}

impl fmt::Debug for CapturedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl fmt::Display for CapturedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, frame) in self.frames().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            f.write_str(frame.formatted())?;
        }
        Ok(())
    }
}

/// Captures the calling thread's stack, omitting the `skip` innermost frames
/// above the caller.
///
/// `capture(0)` starts at the function that called `capture`; each increment
/// of `skip` drops one more logical frame, including frames the compiler
/// inlined into a single return address. Stacks deeper than [`DEPTH`] return
/// addresses are truncated.
///
/// A caller that ends in a tail call to `capture` has no frame of its own
/// left on the stack by then, so the capture starts at its caller instead.
///
/// Must stay out of line: the walk finds its starting point by looking for
/// this function's own frame.
#[inline(never)]
pub fn capture(skip: usize) -> CapturedStack {
    let anchor = capture as *const () as usize;
    let mut walk = Walk::new(skip, 0, FrameCache::global());
    let mut anchored = false;

    backtrace::trace(|frame| {
        if !anchored {
            anchored = frame.symbol_address() as usize == anchor;
            return true;
        }
        walk.record(frame.ip() as usize)
    });

    if !anchored {
        tracing::debug!(
            skip,
            base_skips = BASE_SKIPS,
            "unwinder reported no function entry addresses; falling back to fixed skip count"
        );
        walk = Walk::new(skip, BASE_SKIPS, FrameCache::global());
        backtrace::trace(|frame| walk.record(frame.ip() as usize));
    }

    walk.stack
}

/// Per-capture walk state.
///
/// `base` counts return addresses to drop before `skip` starts counting.
/// `skip` counts logical frames, so resolving is only needed while it is
/// non-zero.
struct Walk<'a> {
    stack: CapturedStack,
    base: usize,
    skip: usize,
    cache: &'a FrameCache,
}

impl<'a> Walk<'a> {
    fn new(skip: usize, base: usize, cache: &'a FrameCache) -> Self {
        Self {
            stack: CapturedStack::EMPTY,
            base,
            skip,
            cache,
        }
    }

    /// Returns false once the stack is full.
    fn record(&mut self, ip: usize) -> bool {
        let Ok(ptr) = RawPointer::new(ip) else {
            return true;
        };
        if self.base > 0 {
            self.base -= 1;
            return true;
        }
        if self.skip > 0 {
            let logical = self.cache.get(ptr).len();
            if self.skip >= logical {
                self.skip -= logical;
                return true;
            }
            self.stack.skip_first = std::mem::take(&mut self.skip);
        }
        self.stack.push(ptr)
    }
}
