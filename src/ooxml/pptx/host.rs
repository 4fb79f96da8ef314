//! A document host that edits `.pptx` packages directly.
//!
//! Moves only reorder the in-memory slide list; the presentation part is
//! regenerated when the document is saved. Copies are [`SlideClip`]s and can
//! be pasted into any other open presentation.
use std::path::Path;

use tracing::debug;

use crate::host::{Document, DocumentHost, HostError, HostFactory, OpenMode};
use crate::ooxml::opc::constants::content_type as ct;
use crate::ooxml::opc::error::OpcError;
use crate::ooxml::opc::{OpcPackage, PackURI};
use crate::ooxml::pptx::presentation::{next_slide_id, read_slide_ids, write_slide_ids, SlideId};
use crate::ooxml::pptx::slide::SlideClip;

/// An open presentation package.
pub struct PptxDocument {
    package: OpcPackage,
    presentation: PackURI,
    slides: Vec<SlideId>,
    mode: OpenMode,
}

impl PptxDocument {
    /// Parse a package and locate its slide list.
    pub fn from_package(package: OpcPackage, mode: OpenMode) -> Result<Self, OpcError> {
        let presentation = package.main_document()?;
        let content_type = package
            .content_type(&presentation)
            .ok_or_else(|| OpcError::ContentTypeNotFound(presentation.to_string()))?;
        if !ct::PRESENTATION_MAINS.iter().any(|main| *main == content_type) {
            return Err(OpcError::UnexpectedContentType {
                partname: presentation.to_string(),
                content_type: content_type.to_string(),
            });
        }

        let slides = read_slide_ids(package.require_part(&presentation)?)?;
        let rels = package.rels(&presentation)?;
        for slide in &slides {
            let rel = rels
                .get(&slide.r_id)
                .ok_or_else(|| OpcError::RelationshipNotFound(slide.r_id.clone()))?;
            let partname = rel.target_partname(presentation.base_uri())?;
            package.require_part(&partname)?;
        }

        Ok(Self {
            package,
            presentation,
            slides,
            mode,
        })
    }

    /// Part names of the slides in presentation order.
    pub fn slide_partnames(&self) -> Result<Vec<PackURI>, HostError> {
        let rels = self.package.rels(&self.presentation)?;
        self.slides
            .iter()
            .map(|slide| {
                let rel = rels
                    .get(&slide.r_id)
                    .ok_or_else(|| OpcError::RelationshipNotFound(slide.r_id.clone()))?;
                Ok(rel.target_partname(self.presentation.base_uri())?)
            })
            .collect()
    }

    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    fn check_index(&self, index: usize, count: usize) -> Result<(), HostError> {
        if index == 0 || index > count {
            return Err(HostError::OutOfRange { index, count });
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), HostError> {
        if self.mode == OpenMode::ReadOnly {
            return Err(HostError::Rejected("presentation is open read-only".to_string()));
        }
        Ok(())
    }
}

impl Document for PptxDocument {
    type Clipboard = SlideClip;

    fn slide_count(&self) -> Result<usize, HostError> {
        Ok(self.slides.len())
    }

    fn move_slide(&mut self, current: usize, new_index: usize) -> Result<(), HostError> {
        self.ensure_writable()?;
        self.check_index(current, self.slides.len())?;
        self.check_index(new_index, self.slides.len())?;
        let slide = self.slides.remove(current - 1);
        self.slides.insert(new_index - 1, slide);
        Ok(())
    }

    fn copy_slide(&self, index: usize) -> Result<SlideClip, HostError> {
        self.check_index(index, self.slides.len())?;
        let partname = self.slide_partnames()?.swap_remove(index - 1);
        Ok(SlideClip::capture(&self.package, &partname)?)
    }

    fn paste_slide(&mut self, clip: &SlideClip, at: usize) -> Result<(), HostError> {
        self.ensure_writable()?;
        if at == 0 || at > self.slides.len() + 1 {
            return Err(HostError::OutOfRange {
                index: at,
                count: self.slides.len(),
            });
        }
        let r_id = clip.paste(&mut self.package, &self.presentation)?;
        let id = next_slide_id(&self.slides);
        debug!(id, %r_id, at, "inserted slide id");
        self.slides.insert(at - 1, SlideId { id, r_id });
        Ok(())
    }

    fn save_as(&mut self, path: &Path) -> Result<(), HostError> {
        let xml = write_slide_ids(self.package.require_part(&self.presentation)?, &self.slides)?;
        self.package.set_part(self.presentation.clone(), xml);
        self.package.save(path)?;
        Ok(())
    }
}

/// Host for `.pptx` packages. Each instance tracks its own handles.
#[derive(Debug, Default)]
pub struct PptxHost {
    handles: usize,
    stopped: bool,
}

impl PptxHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentHost for PptxHost {
    type Document = PptxDocument;

    const EXTENSION: &'static str = "pptx";

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<PptxDocument, HostError> {
        if self.stopped {
            return Err(HostError::Terminated);
        }
        let package = match OpcPackage::open(path) {
            Ok(package) => package,
            Err(OpcError::IoError(e)) => return Err(HostError::Io(e)),
            Err(e) => return Err(HostError::Parse(e.to_string())),
        };
        let document = PptxDocument::from_package(package, mode)
            .map_err(|e| HostError::Parse(e.to_string()))?;
        self.handles += 1;
        debug!(path = %path.display(), slides = document.slides.len(), "parsed presentation");
        Ok(document)
    }

    fn close(&mut self, document: PptxDocument) -> Result<(), HostError> {
        drop(document);
        self.handles = self.handles.saturating_sub(1);
        Ok(())
    }

    fn open_handles(&self) -> usize {
        self.handles
    }

    fn quit(&mut self) -> Result<(), HostError> {
        self.stopped = true;
        Ok(())
    }

    fn terminate(&mut self) {
        self.stopped = true;
        self.handles = 0;
    }
}

/// Launches a fresh [`PptxHost`] per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxHostFactory;

impl HostFactory for PptxHostFactory {
    type Host = PptxHost;

    fn launch(&self) -> Result<PptxHost, HostError> {
        Ok(PptxHost::new())
    }
}
