//! Document mutation driver.
//!
//! A [`Driver`] owns one host instance and the document handles it opens for
//! a single call. Uploaded bytes are first written to a private working copy
//! inside a per-call temporary directory, so the caller's input is never
//! mutated. Every handle is closed exactly once, and the host is shut down,
//! whichever way the call ends: explicitly via [`Driver::finish`], on the
//! first error (the driver moves to [`DriverState::Failed`] and tears down
//! immediately), or when the driver is dropped.
//!
//! ```text
//! Unopened -> Opened -> Mutated -> Saved -> Closed
//!     \__________\_________\________\_____> Failed
//! ```
use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::host::{ClipboardOf, Document, DocumentHost, HostError, OpenMode};
use crate::plan::{Operation, OperationSequence};

pub mod policy;

pub use policy::CallPolicy;

/// Lifecycle state of a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Unopened,
    Opened,
    Mutated,
    Saved,
    Closed,
    Failed,
}

impl DriverState {
    /// Whether the state can no longer change.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, DriverState::Closed | DriverState::Failed)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Unopened => "unopened",
            DriverState::Opened => "opened",
            DriverState::Mutated => "mutated",
            DriverState::Saved => "saved",
            DriverState::Closed => "closed",
            DriverState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Handle to a document opened through a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocId(usize);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// A saved document: its bytes plus a suggested file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Owns a host and its open documents for the duration of one call.
pub struct Driver<H: DocumentHost> {
    host: H,
    policy: CallPolicy,
    state: DriverState,
    documents: Vec<Option<H::Document>>,
    terminated: bool,
    workspace: TempDir,
}

impl<H: DocumentHost> Driver<H> {
    /// Create a driver whose working copies live under the system temp dir.
    pub fn new(host: H, policy: CallPolicy) -> Result<Self> {
        Self::with_work_dir(host, policy, None)
    }

    /// Create a driver whose working copies live under `parent`.
    ///
    /// If the working directory cannot be created the host is shut down
    /// before the error is returned.
    pub fn with_work_dir(mut host: H, policy: CallPolicy, parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("slideshift-");
        let created = match parent {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        };
        let workspace = match created {
            Ok(workspace) => workspace,
            Err(err) => {
                warn!(error = %err, "cannot create working directory, stopping host");
                if let Err(quit) = host.quit() {
                    warn!(error = %quit, "host did not quit, terminating");
                    host.terminate();
                }
                return Err(Error::Io(err));
            },
        };

        Ok(Self {
            host,
            policy,
            state: DriverState::Unopened,
            documents: Vec::new(),
            terminated: false,
            workspace,
        })
    }

    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Directory holding this call's working copies.
    #[inline]
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Open a writable working copy of `bytes`.
    pub fn open_for_update(&mut self, bytes: &[u8]) -> Result<DocId> {
        self.open(bytes, OpenMode::ReadWrite)
    }

    /// Materialize `bytes` as a working copy and open it in the host.
    pub fn open(&mut self, bytes: &[u8], mode: OpenMode) -> Result<DocId> {
        self.expect_state(&[DriverState::Unopened, DriverState::Opened], "open a document")?;

        let id = DocId(self.documents.len());
        let path = self
            .workspace
            .path()
            .join(format!("input-{}.{}", id.0 + 1, H::EXTENSION));
        if let Err(err) = std::fs::write(&path, bytes) {
            return Err(self.fail(Error::Io(err)));
        }

        let host = &mut self.host;
        match self.policy.run("open", || host.open(&path, mode)) {
            Ok(document) => {
                info!(doc = %id, path = %path.display(), ?mode, "opened document");
                self.documents.push(Some(document));
                self.state = DriverState::Opened;
                Ok(id)
            },
            Err(err) => Err(self.fail_host(err, Error::open)),
        }
    }

    /// Current slide count of an open document.
    pub fn slide_count(&mut self, id: DocId) -> Result<usize> {
        let result = match slot(&self.documents, id) {
            Ok(document) => self.policy.run("slide_count", || document.slide_count()),
            Err(err) => Err(err),
        };
        result.map_err(|err| self.fail_host(err, |e| Error::operation(1, e)))
    }

    /// Execute a move-only sequence against `id`.
    pub fn apply_sequence(&mut self, id: DocId, sequence: &OperationSequence) -> Result<()> {
        self.apply(id, None, sequence)
    }

    /// Execute a sequence whose copy-paste steps draw from `donor`.
    pub fn apply_merge_sequence(
        &mut self,
        donor: DocId,
        target: DocId,
        sequence: &OperationSequence,
    ) -> Result<()> {
        self.apply(target, Some(donor), sequence)
    }

    fn apply(&mut self, target: DocId, donor: Option<DocId>, sequence: &OperationSequence) -> Result<()> {
        self.expect_state(&[DriverState::Opened, DriverState::Mutated], "apply operations")?;
        self.expect_open(target)?;
        if let Some(donor) = donor {
            self.expect_open(donor)?;
            if donor == target {
                return Err(self.fail(Error::InternalInvariant(format!(
                    "document {} cannot donate slides to itself",
                    donor
                ))));
            }
        }
        let needs_donor = sequence
            .iter()
            .any(|op| matches!(op, Operation::CopyPaste { .. }));
        if needs_donor && donor.is_none() {
            return Err(self.fail(Error::InternalInvariant(
                "copy-paste step planned without a donor document".to_string(),
            )));
        }

        for (i, &op) in sequence.iter().enumerate() {
            let step = i + 1;
            debug!(doc = %target, step, %op, "applying operation");
            if let Err(err) = execute(&mut self.documents, &self.policy, target, donor, op) {
                warn!(doc = %target, step, %op, error = %err, "operation failed");
                return Err(self.fail_host(err, |e| Error::operation(step, e)));
            }
            self.state = DriverState::Mutated;
        }
        Ok(())
    }

    /// Copy slide `index` of `id`, validated against its current count.
    pub fn copy_slide(&mut self, id: DocId, index: usize) -> Result<ClipboardOf<H>> {
        self.expect_state(&[DriverState::Opened, DriverState::Mutated], "copy a slide")?;
        let count = self.slide_count(id)?;
        if index == 0 || index > count {
            return Err(self.fail(Error::InvalidRange(format!(
                "cannot copy slide {} from document {} with {} slides",
                index, id, count
            ))));
        }

        let result = match slot(&self.documents, id) {
            Ok(document) => self.policy.run("copy_slide", || document.copy_slide(index)),
            Err(err) => Err(err),
        };
        result.map_err(|err| self.fail_host(err, |e| Error::operation(1, e)))
    }

    /// Paste a copied slide into `id` at `index` (`count + 1` appends).
    pub fn paste_at(&mut self, id: DocId, index: usize, clip: &ClipboardOf<H>) -> Result<()> {
        self.expect_state(&[DriverState::Opened, DriverState::Mutated], "paste a slide")?;
        let count = self.slide_count(id)?;
        if index == 0 || index > count + 1 {
            return Err(self.fail(Error::InvalidRange(format!(
                "cannot paste at position {} into document {} with {} slides",
                index, id, count
            ))));
        }

        let result = match slot_mut(&mut self.documents, id) {
            Ok(document) => self.policy.run("paste_slide", || document.paste_slide(clip, index)),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                self.state = DriverState::Mutated;
                Ok(())
            },
            Err(err) => Err(self.fail_host(err, |e| Error::operation(1, e))),
        }
    }

    /// Save `id` and read the result back as an [`OutputArtifact`].
    ///
    /// Only the final path component of `file_name` is used.
    pub fn save_as(&mut self, id: DocId, file_name: &str) -> Result<OutputArtifact> {
        self.expect_state(&[DriverState::Opened, DriverState::Mutated], "save")?;

        let file_name = match Path::new(file_name).file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                return Err(self.fail(Error::Save(format!(
                    "'{}' is not a file name",
                    file_name
                ))));
            },
        };
        let out_dir = self.workspace.path().join("output");
        if let Err(err) = std::fs::create_dir_all(&out_dir) {
            return Err(self.fail(Error::Io(err)));
        }
        let path: PathBuf = out_dir.join(&file_name);

        let result = match slot_mut(&mut self.documents, id) {
            Ok(document) => self.policy.run("save_as", || document.save_as(&path)),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            return Err(self.fail_host(err, Error::save));
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(Error::Io(err))),
        };
        info!(doc = %id, path = %path.display(), size = bytes.len(), "saved document");
        self.state = DriverState::Saved;

        Ok(OutputArtifact { bytes, file_name })
    }

    /// Close one document. When it was the last open handle the host quits
    /// and the driver is closed.
    pub fn close_document(&mut self, id: DocId) -> Result<()> {
        let Some(document) = self.documents.get_mut(id.0).and_then(Option::take) else {
            return Err(Error::InternalInvariant(format!(
                "document {} is not open",
                id
            )));
        };
        if let Err(err) = self.host.close(document) {
            warn!(doc = %id, error = %err, "closing document failed");
        } else {
            info!(doc = %id, "closed document");
        }

        if self.documents.iter().all(Option::is_none) {
            self.shutdown_host();
            self.state = DriverState::Closed;
        }
        Ok(())
    }

    /// Close every open document and shut the host down.
    pub fn finish(mut self) -> DriverState {
        if !self.state.is_terminal() {
            self.teardown();
            self.state = DriverState::Closed;
        }
        self.state
    }

    fn expect_state(&mut self, allowed: &[DriverState], action: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        let state = self.state;
        Err(self.fail(Error::InternalInvariant(format!(
            "cannot {} while the driver is {}",
            action, state
        ))))
    }

    fn expect_open(&mut self, id: DocId) -> Result<()> {
        if matches!(self.documents.get(id.0), Some(Some(_))) {
            return Ok(());
        }
        Err(self.fail(Error::InternalInvariant(format!(
            "document {} is not open",
            id
        ))))
    }

    /// Enter `Failed`, tearing everything down, and hand back `err`.
    fn fail(&mut self, err: Error) -> Error {
        if !self.state.is_terminal() {
            self.state = DriverState::Failed;
            self.teardown();
        }
        err
    }

    fn fail_host(&mut self, err: HostError, wrap: impl FnOnce(HostError) -> Error) -> Error {
        if matches!(err, HostError::Timeout(_)) {
            warn!(error = %err, "terminating unresponsive host");
            self.host.terminate();
            self.terminated = true;
        }
        self.fail(wrap(err))
    }

    fn teardown(&mut self) {
        for (i, slot) in self.documents.iter_mut().enumerate() {
            if let Some(document) = slot.take() {
                match self.host.close(document) {
                    Ok(()) => info!(doc = %DocId(i), "closed document"),
                    Err(err) => warn!(doc = %DocId(i), error = %err, "closing document failed"),
                }
            }
        }
        self.shutdown_host();
    }

    fn shutdown_host(&mut self) {
        if self.terminated {
            return;
        }
        if self.host.open_handles() > 0 {
            debug!(handles = self.host.open_handles(), "host still referenced, leaving it running");
            return;
        }
        if let Err(err) = self.host.quit() {
            warn!(error = %err, "host did not quit, terminating");
            self.host.terminate();
        }
        self.terminated = true;
    }
}

impl<H: DocumentHost> Drop for Driver<H> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            if self.state != DriverState::Saved {
                debug!(state = %self.state, "driver dropped before completion");
            }
            self.teardown();
            self.state = DriverState::Closed;
        }
    }
}

fn slot<D>(documents: &[Option<D>], id: DocId) -> std::result::Result<&D, HostError> {
    documents
        .get(id.0)
        .and_then(Option::as_ref)
        .ok_or_else(|| HostError::Rejected(format!("document {} is closed", id)))
}

fn slot_mut<D>(documents: &mut [Option<D>], id: DocId) -> std::result::Result<&mut D, HostError> {
    documents
        .get_mut(id.0)
        .and_then(Option::as_mut)
        .ok_or_else(|| HostError::Rejected(format!("document {} is closed", id)))
}

fn execute<D: Document>(
    documents: &mut [Option<D>],
    policy: &CallPolicy,
    target: DocId,
    donor: Option<DocId>,
    op: Operation,
) -> std::result::Result<(), HostError> {
    match op {
        Operation::Move { from, to } => {
            let document = slot_mut(documents, target)?;
            policy.run("move_slide", || document.move_slide(from, to))
        },
        Operation::CopyPaste { source, at } => {
            let donor = donor
                .ok_or_else(|| HostError::Rejected("no donor document for copy".to_string()))?;
            let clip = {
                let document = slot(documents, donor)?;
                policy.run("copy_slide", || document.copy_slide(source))?
            };
            let document = slot_mut(documents, target)?;
            policy.run("paste_slide", || document.paste_slide(&clip, at))
        },
    }
}
