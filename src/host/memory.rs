//! In-memory reference host.
//!
//! Documents use a small text format: a `%slides` header line followed by one
//! slide body per line (backslash and newline escaped). The host keeps a
//! shared [`Ledger`] of what happened to it, and [`Faults`] can make it fail
//! in controlled ways, which is how the driver's cleanup guarantees are
//! exercised without a real editor.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::host::{Document, DocumentHost, HostError, HostFactory, OpenMode};

/// Header line of the deck format.
pub const DECK_HEADER: &str = "%slides";

/// Serialize slide bodies into the deck format.
pub fn encode_deck<S: AsRef<str>>(slides: &[S]) -> Vec<u8> {
    let mut out = String::with_capacity(DECK_HEADER.len() + 1 + slides.len() * 16);
    out.push_str(DECK_HEADER);
    out.push('\n');
    for slide in slides {
        for c in slide.as_ref().chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                other => out.push(other),
            }
        }
        out.push('\n');
    }
    out.into_bytes()
}

/// Parse the deck format.
pub fn decode_deck(bytes: &[u8]) -> Result<Vec<String>, HostError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| HostError::Parse(format!("deck is not UTF-8: {}", e)))?;
    let mut lines = text.lines();
    if lines.next() != Some(DECK_HEADER) {
        return Err(HostError::Parse(format!(
            "missing '{}' header",
            DECK_HEADER
        )));
    }

    lines
        .map(|line| {
            let mut slide = String::with_capacity(line.len());
            let mut chars = line.chars();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    slide.push(c);
                    continue;
                }
                match chars.next() {
                    Some('\\') => slide.push('\\'),
                    Some('n') => slide.push('\n'),
                    other => {
                        return Err(HostError::Parse(format!(
                            "bad escape '\\{}'",
                            other.map(String::from).unwrap_or_default()
                        )));
                    },
                }
            }
            Ok(slide)
        })
        .collect()
}

/// Controlled failures for [`MemoryHost`].
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Every `open` fails with a parse error.
    pub reject_open: bool,
    /// Every `save_as` is rejected.
    pub reject_save: bool,
    /// The n-th mutating call (1-based, counted across the host) is rejected.
    pub fail_mutation: Option<usize>,
    /// Number of `Busy` replies handed out before mutations go through.
    pub busy_replies: u32,
    /// Simulated latency of every mutating call.
    pub latency: Option<Duration>,
}

/// Observable record of a host's lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub launched: usize,
    pub opened: usize,
    pub closed: usize,
    pub mutations: usize,
    pub saves: usize,
    pub quit: bool,
    pub terminated: bool,
    busy_remaining: u32,
    attempts: usize,
}

impl Ledger {
    /// Handles opened and never closed.
    #[inline]
    pub fn leaked(&self) -> usize {
        self.opened.saturating_sub(self.closed)
    }

    /// Whether the host process is still alive.
    #[inline]
    pub fn running(&self) -> bool {
        self.launched > 0 && !self.quit && !self.terminated
    }

    /// Total host calls that reached the document model.
    #[inline]
    pub fn host_calls(&self) -> usize {
        self.opened + self.attempts + self.saves
    }
}

pub type SharedLedger = Arc<Mutex<Ledger>>;

/// A document open in a [`MemoryHost`].
pub struct MemoryDocument {
    slides: Vec<String>,
    mode: OpenMode,
    faults: Faults,
    ledger: SharedLedger,
}

impl MemoryDocument {
    /// Current slide bodies in order.
    pub fn slides(&self) -> &[String] {
        &self.slides
    }

    fn ensure_alive(&self) -> Result<(), HostError> {
        if self.ledger.lock().terminated {
            return Err(HostError::Terminated);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), HostError> {
        if self.mode == OpenMode::ReadOnly {
            return Err(HostError::Rejected("document is open read-only".to_string()));
        }
        Ok(())
    }

    fn begin_mutation(&self) -> Result<(), HostError> {
        self.ensure_writable()?;
        {
            let mut ledger = self.ledger.lock();
            if ledger.terminated {
                return Err(HostError::Terminated);
            }
            if ledger.busy_remaining > 0 {
                ledger.busy_remaining -= 1;
                return Err(HostError::Busy("call rejected by callee".to_string()));
            }
            ledger.attempts += 1;
            if self.faults.fail_mutation == Some(ledger.attempts) {
                return Err(HostError::Rejected(format!(
                    "injected failure on mutation {}",
                    ledger.attempts
                )));
            }
        }
        if let Some(latency) = self.faults.latency {
            std::thread::sleep(latency);
        }
        Ok(())
    }

    fn check_index(&self, index: usize, count: usize) -> Result<(), HostError> {
        if index == 0 || index > count {
            return Err(HostError::OutOfRange { index, count });
        }
        Ok(())
    }
}

impl Document for MemoryDocument {
    type Clipboard = String;

    fn slide_count(&self) -> Result<usize, HostError> {
        self.ensure_alive()?;
        Ok(self.slides.len())
    }

    fn move_slide(&mut self, current: usize, new_index: usize) -> Result<(), HostError> {
        self.check_index(current, self.slides.len())?;
        self.check_index(new_index, self.slides.len())?;
        self.begin_mutation()?;
        let slide = self.slides.remove(current - 1);
        self.slides.insert(new_index - 1, slide);
        self.ledger.lock().mutations += 1;
        Ok(())
    }

    fn copy_slide(&self, index: usize) -> Result<String, HostError> {
        self.ensure_alive()?;
        self.check_index(index, self.slides.len())?;
        Ok(self.slides[index - 1].clone())
    }

    fn paste_slide(&mut self, clip: &String, at: usize) -> Result<(), HostError> {
        if at == 0 || at > self.slides.len() + 1 {
            return Err(HostError::OutOfRange {
                index: at,
                count: self.slides.len(),
            });
        }
        self.begin_mutation()?;
        self.slides.insert(at - 1, clip.clone());
        self.ledger.lock().mutations += 1;
        Ok(())
    }

    fn save_as(&mut self, path: &Path) -> Result<(), HostError> {
        self.ensure_alive()?;
        if self.faults.reject_save {
            return Err(HostError::Rejected(format!(
                "cannot write {}",
                path.display()
            )));
        }
        std::fs::write(path, encode_deck(&self.slides))?;
        self.ledger.lock().saves += 1;
        Ok(())
    }
}

/// In-memory host process.
pub struct MemoryHost {
    faults: Faults,
    ledger: SharedLedger,
}

impl MemoryHost {
    /// Start a host with no faults.
    pub fn new() -> Self {
        Self::with_faults(Faults::default())
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self::attach(faults, SharedLedger::default())
    }

    fn attach(faults: Faults, ledger: SharedLedger) -> Self {
        {
            let mut state = ledger.lock();
            state.launched += 1;
            state.quit = false;
            state.terminated = false;
            state.busy_remaining = faults.busy_replies;
        }
        Self { faults, ledger }
    }

    /// Shared view of what this host did.
    pub fn ledger(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentHost for MemoryHost {
    type Document = MemoryDocument;

    const EXTENSION: &'static str = "deck";

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<MemoryDocument, HostError> {
        {
            let ledger = self.ledger.lock();
            if !ledger.running() {
                return Err(HostError::Terminated);
            }
        }
        if self.faults.reject_open {
            return Err(HostError::Parse(format!(
                "{} is not a presentation",
                path.display()
            )));
        }

        let bytes = std::fs::read(path)?;
        let slides = decode_deck(&bytes)?;
        self.ledger.lock().opened += 1;

        Ok(MemoryDocument {
            slides,
            mode,
            faults: self.faults.clone(),
            ledger: Arc::clone(&self.ledger),
        })
    }

    fn close(&mut self, document: MemoryDocument) -> Result<(), HostError> {
        drop(document);
        self.ledger.lock().closed += 1;
        Ok(())
    }

    fn open_handles(&self) -> usize {
        self.ledger.lock().leaked()
    }

    fn quit(&mut self) -> Result<(), HostError> {
        let mut ledger = self.ledger.lock();
        if ledger.terminated {
            return Err(HostError::Terminated);
        }
        ledger.quit = true;
        Ok(())
    }

    fn terminate(&mut self) {
        self.ledger.lock().terminated = true;
    }
}

/// Launches [`MemoryHost`]s that all report into one ledger.
#[derive(Clone, Default)]
pub struct MemoryHostFactory {
    faults: Faults,
    ledger: SharedLedger,
}

impl MemoryHostFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ledger: SharedLedger::default(),
        }
    }

    /// Snapshot of the shared ledger.
    pub fn ledger(&self) -> Ledger {
        self.ledger.lock().clone()
    }
}

impl HostFactory for MemoryHostFactory {
    type Host = MemoryHost;

    fn launch(&self) -> Result<MemoryHost, HostError> {
        Ok(MemoryHost::attach(self.faults.clone(), Arc::clone(&self.ledger)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_deck(dir: &TempDir, name: &str, slides: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, encode_deck(slides)).unwrap();
        path
    }

    #[test]
    fn test_deck_format_escapes() {
        let slides = vec!["plain".to_string(), "two\nlines".to_string(), "back\\slash".to_string()];
        let bytes = encode_deck(&slides);
        assert_eq!(decode_deck(&bytes).unwrap(), slides);
    }

    #[test]
    fn test_decode_rejects_missing_header() {
        assert!(matches!(decode_deck(b"slide one\n"), Err(HostError::Parse(_))));
        assert!(matches!(decode_deck(&[0xff, 0xfe]), Err(HostError::Parse(_))));
    }

    #[test]
    fn test_move_and_paste() {
        let dir = TempDir::new().unwrap();
        let path = write_deck(&dir, "deck.txt", &["a", "b", "c"]);
        let mut host = MemoryHost::new();

        let mut doc = host.open(&path, OpenMode::ReadWrite).unwrap();
        doc.move_slide(3, 1).unwrap();
        assert_eq!(doc.slides(), &["c", "a", "b"]);

        let clip = doc.copy_slide(2).unwrap();
        doc.paste_slide(&clip, 4).unwrap();
        assert_eq!(doc.slides(), &["c", "a", "b", "a"]);
        assert_eq!(doc.slide_count().unwrap(), 4);

        assert!(matches!(
            doc.paste_slide(&clip, 6),
            Err(HostError::OutOfRange { index: 6, count: 4 })
        ));

        host.close(doc).unwrap();
        assert_eq!(host.open_handles(), 0);
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let dir = TempDir::new().unwrap();
        let path = write_deck(&dir, "deck.txt", &["a", "b"]);
        let mut host = MemoryHost::new();
        let mut doc = host.open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(doc.move_slide(1, 2), Err(HostError::Rejected(_))));
        host.close(doc).unwrap();
    }

    #[test]
    fn test_busy_then_success() {
        let dir = TempDir::new().unwrap();
        let path = write_deck(&dir, "deck.txt", &["a", "b"]);
        let mut host = MemoryHost::with_faults(Faults {
            busy_replies: 1,
            ..Faults::default()
        });
        let mut doc = host.open(&path, OpenMode::ReadWrite).unwrap();
        assert!(doc.move_slide(1, 2).unwrap_err().is_transient());
        doc.move_slide(1, 2).unwrap();
        assert_eq!(doc.slides(), &["b", "a"]);
        host.close(doc).unwrap();
    }

    #[test]
    fn test_terminate_invalidates_documents() {
        let dir = TempDir::new().unwrap();
        let path = write_deck(&dir, "deck.txt", &["a"]);
        let mut host = MemoryHost::new();
        let ledger = host.ledger();
        let doc = host.open(&path, OpenMode::ReadWrite).unwrap();

        host.terminate();
        assert!(matches!(doc.slide_count(), Err(HostError::Terminated)));
        assert!(matches!(host.open(&path, OpenMode::ReadWrite), Err(HostError::Terminated)));
        host.close(doc).unwrap();
        assert!(!ledger.lock().running());
    }
}
