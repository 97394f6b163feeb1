//! Cheap call-stack capture with cached symbolization.
//!
//! [`capture`] records up to [`DEPTH`] return addresses of the calling thread
//! without allocating. Resolving them into [`Frame`]s happens lazily while
//! iterating, and each return address is symbolized at most once per process:
//! results are memoized in [`FrameCache::global`], so a logging callsite that
//! captures on every call pays for symbolization only the first time.
//!
//! ```no_run
//! let stack = mirror::capture(0);
//! for frame in stack.frames() {
//!     println!("{frame}");
//! }
//! ```

mod cache;
mod frame;
mod frames;
mod resolve;
mod stack;

pub use cache::FrameCache;
pub use frame::Frame;
pub use frames::Frames;
pub use resolve::{BacktraceSymbolizer, RawFrame, Symbolizer, resolve};
pub use stack::{BASE_SKIPS, CapturedStack, DEPTH, InvalidPointer, RawPointer, capture};
