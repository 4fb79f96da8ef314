//! Capability interface to the document host.
//!
//! A host is the stateful editor that actually performs moves, copies and
//! saves. It is modelled as an owned object created per call by a
//! [`HostFactory`]; nothing in this crate keeps a process-wide host.
//!
//! Two hosts ship with the crate:
//!
//! - [`memory::MemoryHost`]: an in-memory reference host with failure injection
//! - `ooxml::pptx::PptxHost` (feature `ooxml`): edits `.pptx` packages directly
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

pub mod memory;

/// Errors reported by a host.
#[derive(Error, Debug)]
pub enum HostError {
    /// The document could not be parsed.
    #[error("unreadable document: {0}")]
    Parse(String),

    /// The host refused the call (locked file, invalid path, bad state).
    #[error("host rejected the call: {0}")]
    Rejected(String),

    /// The host is temporarily busy; the call may succeed if retried.
    #[error("host is busy: {0}")]
    Busy(String),

    /// A slide index did not fit the document.
    #[error("slide index {index} out of range for {count} slides")]
    OutOfRange { index: usize, count: usize },

    /// The call exceeded its deadline.
    #[error("host call timed out after {0:?}")]
    Timeout(Duration),

    /// The host process is gone.
    #[error("host process terminated")]
    Terminated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Whether retrying the same call can succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, HostError::Busy(_))
    }
}

/// How a document is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// One open document inside a host.
///
/// Positions are 1-based. After every mutation the host renumbers the
/// remaining slides, so a position is only meaningful until the next call.
pub trait Document {
    /// Opaque slide copy produced by [`Document::copy_slide`].
    type Clipboard;

    fn slide_count(&self) -> Result<usize, HostError>;

    /// Move the slide at `current` so that it ends at `new_index`.
    fn move_slide(&mut self, current: usize, new_index: usize) -> Result<(), HostError>;

    fn copy_slide(&self, index: usize) -> Result<Self::Clipboard, HostError>;

    /// Paste a copied slide so that it ends at `at` (`count + 1` appends).
    fn paste_slide(&mut self, clip: &Self::Clipboard, at: usize) -> Result<(), HostError>;

    fn save_as(&mut self, path: &Path) -> Result<(), HostError>;
}

/// A running host, owning the documents it opened.
pub trait DocumentHost {
    type Document: Document;

    /// File extension of the host's native format, without the dot.
    const EXTENSION: &'static str;

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<Self::Document, HostError>;

    /// Release a document handle. Consumes it, so a handle closes once.
    fn close(&mut self, document: Self::Document) -> Result<(), HostError>;

    /// Number of handles opened and not yet closed.
    fn open_handles(&self) -> usize;

    /// Shut the host down gracefully.
    fn quit(&mut self) -> Result<(), HostError>;

    /// Kill the host process after a timeout. Open handles become invalid.
    fn terminate(&mut self);
}

/// Starts one host instance per call.
pub trait HostFactory {
    type Host: DocumentHost;

    fn launch(&self) -> Result<Self::Host, HostError>;
}

/// Clipboard type of a host's documents.
pub type ClipboardOf<H> = <<H as DocumentHost>::Document as Document>::Clipboard;
