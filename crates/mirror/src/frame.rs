use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::resolve::RawFrame;

/// One resolved, human-readable call-stack entry.
///
/// Every field is reference counted, so cloning a `Frame` out of the cache
/// never allocates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    package: Arc<str>,
    function: Arc<str>,
    file: Arc<str>,
    line: u32,
    formatted: Arc<str>,
}

impl Frame {
    /// Builds a frame from already-split parts. `file` is used as given.
    pub fn new(package: &str, function: &str, file: &str, line: u32) -> Self {
        Self {
            package: Arc::from(package),
            function: Arc::from(function),
            file: Arc::from(file),
            line,
            formatted: Arc::from(format_frame(package, function, file, line)),
        }
    }

    pub(crate) fn from_raw(raw: &RawFrame) -> Self {
        let (package, function) = split_function(raw.function.as_deref().unwrap_or_default());
        let file = to_file_name(raw.file.as_deref().unwrap_or_default());
        Self::new(&package, &function, file, raw.line.unwrap_or(0))
    }

    /// Crate the function belongs to.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Function path inside [`Frame::package`], with receiver decoration removed.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Final path component of the source file.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// `"\tat <package>.<function>(<file>:<line>)"`
    pub fn formatted(&self) -> &str {
        &self.formatted
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted)
    }
}

fn format_frame(package: &str, function: &str, file: &str, line: u32) -> String {
    format!("\tat {package}.{function}({file}:{line})")
}

const DECORATION: &[char] = &['*', '&', '(', ')'];

/// Splits a demangled symbol into its crate and the rest of its path.
fn split_function(qualified: &str) -> (String, String) {
    let name = strip_rust_hash_suffix(qualified);
    let path = match name.strip_prefix('<') {
        Some(rest) => qualified_self_path(rest).unwrap_or(Cow::Borrowed(name)),
        None => Cow::Borrowed(name),
    };

    let (package, function) = path.split_once("::").unwrap_or(("", &*path));
    (package.to_owned(), function.replace(DECORATION, ""))
}

/// Legacy mangling appends `::h` and exactly 16 hex digits; anything shorter
/// is a real path segment such as `::hadd`.
fn strip_rust_hash_suffix(name: &str) -> &str {
    if let Some(idx) = name.rfind("::h") {
        let suffix = &name[idx + 3..];
        if suffix.len() == 16 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return &name[..idx];
        }
    }
    name
}

/// Rewrites `T as Trait>::rest` (the text after a leading `<`) into `T::rest`.
fn qualified_self_path(rest: &str) -> Option<Cow<'_, str>> {
    let bytes = rest.as_bytes();
    let mut depth = 1usize;
    let mut self_end = None;
    let mut close = None;

    for (idx, &byte) in bytes.iter().enumerate() {
        match byte {
            b'<' => depth += 1,
            // `->` inside fn pointer types is not a closing bracket
            b'>' if idx > 0 && bytes[idx - 1] == b'-' => {}
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            b' ' if depth == 1 && self_end.is_none() && rest[idx..].starts_with(" as ") => {
                self_end = Some(idx);
            }
            _ => {}
        }
    }

    let close = close?;
    let self_ty = strip_receiver(&rest[..self_end.unwrap_or(close)]);
    let tail = rest[close + 1..].trim_start_matches("::");
    if tail.is_empty() {
        return Some(Cow::Borrowed(self_ty));
    }
    Some(Cow::Owned(format!("{self_ty}::{tail}")))
}

fn strip_receiver(mut ty: &str) -> &str {
    loop {
        let trimmed = ty.trim_start();
        let next = ["&", "*const ", "*mut ", "mut ", "dyn "]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix));
        match next {
            Some(rest) => ty = rest,
            None => return trimmed.trim_end(),
        }
    }
}

fn to_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> (String, String) {
        split_function(name)
    }

    #[test]
    fn formats_fixed_template() {
        let frame = Frame::new("pkg", "Foo", "bar.go", 42);
        assert_eq!(frame.formatted(), "\tat pkg.Foo(bar.go:42)");
        assert_eq!(frame.to_string(), frame.formatted());
    }

    #[test]
    fn frames_compare_on_every_field() {
        let frame = Frame::new("app", "run", "main.rs", 10);
        assert_eq!(frame, Frame::new("app", "run", "main.rs", 10));
        assert_ne!(frame, Frame::new("app", "run", "main.rs", 11));
        assert_ne!(frame, Frame::new("app", "run", "lib.rs", 10));
        assert_ne!(frame, Frame::new("other", "run", "main.rs", 10));
    }

    #[test]
    fn splits_crate_from_function_path() {
        assert_eq!(
            split("mirror::stack::capture"),
            ("mirror".to_owned(), "stack::capture".to_owned())
        );
        assert_eq!(split("main"), (String::new(), "main".to_owned()));
    }

    #[test]
    fn strips_hash_suffix() {
        assert_eq!(
            split("app::handlers::render::h0123456789abcdef"),
            ("app".to_owned(), "handlers::render".to_owned())
        );
        assert_eq!(
            split("app::handlers::hadd"),
            ("app".to_owned(), "handlers::hadd".to_owned())
        );
    }

    #[test]
    fn strips_receiver_decoration() {
        assert_eq!(
            split("<&app::Widget as core::fmt::Debug>::fmt"),
            ("app".to_owned(), "Widget::fmt".to_owned())
        );
        assert_eq!(
            split("<&mut app::Widget as core::ops::Drop>::drop"),
            ("app".to_owned(), "Widget::drop".to_owned())
        );
        assert_eq!(
            split("<*const app::Node>::next"),
            ("app".to_owned(), "Node::next".to_owned())
        );
        assert_eq!(
            split("<app::Widget>::new"),
            ("app".to_owned(), "Widget::new".to_owned())
        );
    }

    #[test]
    fn respects_generics_in_self_type() {
        assert_eq!(
            split("<alloc::vec::Vec<u8> as core::fmt::Debug>::fmt"),
            ("alloc".to_owned(), "vec::Vec<u8>::fmt".to_owned())
        );
        assert_eq!(
            split("<app::Handler<fn() -> u8> as app::Call>::call"),
            ("app".to_owned(), "Handler<fn -> u8>::call".to_owned())
        );
    }

    #[test]
    fn removes_pointer_and_paren_noise_from_function() {
        assert_eq!(
            split("app::(*Handler)::serve"),
            ("app".to_owned(), "Handler::serve".to_owned())
        );
        assert_eq!(
            split("app::run::{{closure}}"),
            ("app".to_owned(), "run::{{closure}}".to_owned())
        );
    }

    #[test]
    fn reduces_file_to_last_component() {
        assert_eq!(to_file_name("/home/me/src/app/main.rs"), "main.rs");
        assert_eq!(to_file_name(r"C:\src\app\lib.rs"), "lib.rs");
        assert_eq!(to_file_name("lib.rs"), "lib.rs");
        assert_eq!(to_file_name(""), "");
    }

    #[test]
    fn missing_symbol_data_is_best_effort() {
        let frame = Frame::from_raw(&RawFrame::default());
        assert_eq!(frame, Frame::new("", "", "", 0));
        assert_eq!(frame.formatted(), "\tat .(:0)");
    }

    #[test]
    fn builds_from_raw_frame() {
        let frame = Frame::from_raw(&RawFrame {
            function: Some("<&app::Widget as core::fmt::Debug>::fmt".to_owned()),
            file: Some("/src/app/src/widget.rs".to_owned()),
            line: Some(7),
        });
        assert_eq!(frame, Frame::new("app", "Widget::fmt", "widget.rs", 7));
        assert_eq!(frame.formatted(), "\tat app.Widget::fmt(widget.rs:7)");
    }
}
