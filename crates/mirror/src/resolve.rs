use std::ffi::c_void;
use std::sync::Arc;

use crate::frame::Frame;
use crate::stack::RawPointer;

/// One logical frame as reported by a symbol source, before any cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// Demangled, fully qualified function name.
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// Maps a return address to the logical frames compiled into it.
///
/// When calls were inlined into `ptr`, the innermost call comes first and the
/// physical function last.
pub trait Symbolizer: Send + Sync {
    fn symbolize(&self, ptr: RawPointer) -> Vec<RawFrame>;
}

/// Symbolizes addresses of the current process through `backtrace::resolve`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceSymbolizer;

impl Symbolizer for BacktraceSymbolizer {
    fn symbolize(&self, ptr: RawPointer) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        // resolve() steps back from the return address onto the call instruction
        backtrace::resolve(ptr.get() as *mut c_void, |symbol| {
            frames.push(RawFrame {
                function: symbol.name().map(|name| format!("{name:#}")),
                file: symbol
                    .filename()
                    .map(|path| path.to_string_lossy().into_owned()),
                line: symbol.lineno(),
            });
        });
        frames
    }
}

/// Resolves `ptr` into display frames. Always yields at least one frame.
pub fn resolve(symbolizer: &dyn Symbolizer, ptr: RawPointer) -> Arc<[Frame]> {
    let raw = symbolizer.symbolize(ptr);
    if raw.is_empty() {
        tracing::debug!(%ptr, "no symbols reported for pointer");
        return Arc::from([Frame::from_raw(&RawFrame::default())]);
    }

    let frames: Arc<[Frame]> = raw.iter().map(Frame::from_raw).collect();
    tracing::trace!(%ptr, frames = frames.len(), "resolved pointer");
    frames
}
