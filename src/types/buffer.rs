//! Compiled-unit data shapes
//!
//! Defines the byte buffers and compile specs passed across the backend
//! boundary. Their contents are backend-private; only the shape lives here.

use std::fmt;

// ─────────────────────────────────────────────────────────────────
// Byte View
// ─────────────────────────────────────────────────────────────────

/// Non-owning view over externally owned bytes
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteView<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Create a view over the given bytes
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// The viewed bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of bytes in the view
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the view is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Interpret the view as UTF-8 text
    pub fn as_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.bytes).ok()
    }
}

impl fmt::Debug for ByteView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({} bytes)", self.bytes.len())
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<'a> From<&'a str> for ByteView<'a> {
    fn from(s: &'a str) -> Self {
        Self::new(s.as_bytes())
    }
}

// ─────────────────────────────────────────────────────────────────
// Compile Spec
// ─────────────────────────────────────────────────────────────────

/// Key/value compile-time configuration for one backend
///
/// The value is interpreted only by the backend. Order within a spec list is
/// not significant to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileSpec<'a> {
    pub key: &'a str,
    pub value: ByteView<'a>,
}

impl<'a> CompileSpec<'a> {
    pub fn new(key: &'a str, value: impl Into<ByteView<'a>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Find the first spec with the given key
pub fn find_spec<'a>(specs: &[CompileSpec<'a>], key: &str) -> Option<ByteView<'a>> {
    specs.iter().find(|s| s.key == key).map(|s| s.value)
}

// ─────────────────────────────────────────────────────────────────
// Freeable Buffer
// ─────────────────────────────────────────────────────────────────

/// Callback invoked once when a buffer's bytes are released
pub type ReleaseHook = Box<dyn FnOnce(usize) + Send>;

/// Compiled unit bytes that a backend may release early
///
/// The runtime hands a `&mut FreeableBuffer` to `init`. The backend can read
/// it, [`free`](Self::free) it once consumed, or [`take`](Self::take) the
/// bytes to keep them inside its handle. Whatever is left is released when
/// the buffer drops.
pub struct FreeableBuffer {
    data: Option<Box<[u8]>>,
    on_release: Option<ReleaseHook>,
}

impl FreeableBuffer {
    /// Wrap owned bytes
    pub fn new(data: impl Into<Box<[u8]>>) -> Self {
        Self {
            data: Some(data.into()),
            on_release: None,
        }
    }

    /// Wrap owned bytes and observe their release
    ///
    /// The hook receives the number of bytes released. It does not fire when
    /// the bytes are moved out with [`take`](Self::take).
    pub fn with_release_hook(data: impl Into<Box<[u8]>>, hook: ReleaseHook) -> Self {
        Self {
            data: Some(data.into()),
            on_release: Some(hook),
        }
    }

    /// The buffer contents, empty once freed
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Number of bytes still held
    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Whether the bytes have been freed or taken
    pub fn is_freed(&self) -> bool {
        self.data.is_none()
    }

    /// Release the bytes now
    pub fn free(&mut self) {
        if let Some(data) = self.data.take() {
            let nbytes = data.len();
            drop(data);
            if let Some(hook) = self.on_release.take() {
                hook(nbytes);
            }
        }
    }

    /// Move the bytes out, leaving the buffer freed
    pub fn take(&mut self) -> Option<Box<[u8]>> {
        self.on_release = None;
        self.data.take()
    }
}

impl Drop for FreeableBuffer {
    fn drop(&mut self) {
        self.free();
    }
}

impl fmt::Debug for FreeableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeableBuffer")
            .field("len", &self.len())
            .field("freed", &self.is_freed())
            .finish()
    }
}

impl From<Vec<u8>> for FreeableBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}
