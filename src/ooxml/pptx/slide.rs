//! Copying a slide from one package into another.
//!
//! A [`SlideClip`] is a self-contained snapshot of a slide part and every
//! part it owns: images, media, charts and their embedded workbooks, tags.
//! Parts the slide only refers to are not captured. The slide layout is
//! remembered by name and re-bound on paste, while notes, comments and links
//! to other slides are left behind. Hyperlinks whose relationship is left
//! behind are removed from the copied XML, and any other attribute that names
//! such a relationship is dropped.
use std::collections::HashMap;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::{OpcPackage, PackURI, Relationship, Relationships};

/// Template for new slide part names.
const SLIDE_TEMPLATE: &str = "/ppt/slides/slide%d.xml";

/// Last path segment of relationship types that point at presentation-level
/// parts or at parts that are not carried with a copied slide.
const LEFT_BEHIND: &[&str] = &[
    "slide",
    "slideLayout",
    "slideMaster",
    "notesSlide",
    "notesMaster",
    "comments",
    "commentAuthors",
    "theme",
];

/// Content types that are never duplicated by a paste.
/// Elements removed outright when their relationship is not carried.
const LINK_ELEMENTS: &[&[u8]] = &[b"hlinkClick", b"hlinkHover"];

const SHARED_TYPES: &[&str] = &[
    ct::PML_SLIDE,
    ct::PML_SLIDE_LAYOUT,
    ct::PML_SLIDE_MASTER,
    ct::PML_NOTES_SLIDE,
    ct::OFC_THEME,
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClipTarget {
    /// Index into the clip's owned parts.
    Part(usize),
    External(String),
    Layout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClipRel {
    r_id: String,
    reltype: String,
    target: ClipTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClipPart {
    source: PackURI,
    content_type: String,
    bytes: Vec<u8>,
    rels: Vec<ClipRel>,
}

/// A copied slide, ready to be pasted into any presentation package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideClip {
    slide: ClipPart,
    parts: Vec<ClipPart>,
    layout_name: Option<String>,
}

impl SlideClip {
    /// Capture `slide` and the parts it owns from `package`.
    pub fn capture(package: &OpcPackage, slide: &PackURI) -> Result<Self> {
        let content_type = package
            .content_type(slide)
            .ok_or_else(|| OpcError::ContentTypeNotFound(slide.to_string()))?
            .to_string();
        let mut capture = Capture {
            package,
            parts: Vec::new(),
            index: HashMap::new(),
            pending: Vec::new(),
            layout_name: None,
        };

        let (rels, dropped) = capture.collect(slide, true)?;
        while let Some(i) = capture.pending.pop() {
            let source = capture.parts[i].source.clone();
            let (rels, part_dropped) = capture.collect(&source, false)?;
            let part = &mut capture.parts[i];
            part.rels = rels;
            if !part_dropped.is_empty() && is_xml(&part.content_type) {
                part.bytes = strip_references(&part.bytes, &part_dropped)?;
            }
        }

        let mut bytes = package.require_part(slide)?.to_vec();
        if !dropped.is_empty() {
            bytes = strip_references(&bytes, &dropped)?;
        }

        debug!(
            slide = %slide,
            parts = capture.parts.len(),
            layout = ?capture.layout_name,
            "captured slide"
        );
        Ok(Self {
            slide: ClipPart {
                source: slide.clone(),
                content_type,
                bytes,
                rels,
            },
            parts: capture.parts,
            layout_name: capture.layout_name,
        })
    }

    /// Name of the source slide's layout (`cSld/@name`), if it had one.
    pub fn layout_name(&self) -> Option<&str> {
        self.layout_name.as_deref()
    }

    /// Number of owned parts captured alongside the slide.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Add the slide to `package` and relate it to `presentation`.
    ///
    /// Returns the relationship id of the new slide in the presentation
    /// part; placing it in the slide list is up to the caller.
    pub fn paste(&self, package: &mut OpcPackage, presentation: &PackURI) -> Result<String> {
        let layout = self.choose_layout(package, presentation)?;

        let slide_name = package.next_partname(SLIDE_TEMPLATE)?;
        package.set_part(slide_name.clone(), self.slide.bytes.clone());
        ensure_content_type(package, &slide_name, &self.slide.content_type);

        let mut names = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let name = package.next_partname(&numbered_template(&part.source))?;
            package.set_part(name.clone(), part.bytes.clone());
            ensure_content_type(package, &name, &part.content_type);
            names.push(name);
        }

        for (part, name) in self.parts.iter().zip(&names) {
            if !part.rels.is_empty() {
                let rels = rebuild_rels(&part.rels, name, &names, &layout);
                package.set_rels(name, &rels);
            }
        }

        let mut slide_rels = rebuild_rels(&self.slide.rels, &slide_name, &names, &layout);
        if !self.slide.rels.iter().any(|rel| rel.target == ClipTarget::Layout) {
            slide_rels.add(rt::SLIDE_LAYOUT, layout.relative_ref(slide_name.base_uri()));
        }
        package.set_rels(&slide_name, &slide_rels);

        let mut pres_rels = package.rels(presentation)?;
        let r_id = pres_rels.add(rt::SLIDE, slide_name.relative_ref(presentation.base_uri()));
        package.set_rels(presentation, &pres_rels);

        debug!(slide = %slide_name, layout = %layout, %r_id, "pasted slide");
        Ok(r_id)
    }

    /// The destination layout with the source layout's name, else the
    /// destination's first layout.
    fn choose_layout(&self, package: &OpcPackage, presentation: &PackURI) -> Result<PackURI> {
        let layouts = list_layouts(package, presentation)?;
        let matching = self.layout_name.as_ref().and_then(|wanted| {
            layouts
                .iter()
                .find(|(_, name)| name.as_ref() == Some(wanted))
        });
        matching
            .or(layouts.first())
            .map(|(partname, _)| partname.clone())
            .ok_or_else(|| OpcError::PartNotFound("slide layout".to_string()))
    }
}

/// A capture in progress: parts found so far and those still to visit.
struct Capture<'p> {
    package: &'p OpcPackage,
    parts: Vec<ClipPart>,
    index: HashMap<PackURI, usize>,
    pending: Vec<usize>,
    layout_name: Option<String>,
}

impl Capture<'_> {
    /// Relationships of `source` to carry, and the ids of those left behind.
    fn collect(&mut self, source: &PackURI, is_slide: bool) -> Result<(Vec<ClipRel>, Vec<String>)> {
        let rels = self.package.rels(source)?;
        let mut out = Vec::with_capacity(rels.len());
        let mut dropped = Vec::new();

        for rel in &rels {
            if rel.is_external() {
                out.push(ClipRel {
                    r_id: rel.r_id().to_string(),
                    reltype: rel.reltype().to_string(),
                    target: ClipTarget::External(rel.target_ref().to_string()),
                });
                continue;
            }

            if is_slide && rel.reltype() == rt::SLIDE_LAYOUT {
                let layout = rel.target_partname(source.base_uri())?;
                self.layout_name = layout_name(self.package, &layout)?;
                out.push(ClipRel {
                    r_id: rel.r_id().to_string(),
                    reltype: rel.reltype().to_string(),
                    target: ClipTarget::Layout,
                });
                continue;
            }

            if is_left_behind(rel) {
                debug!(source = %source, r_id = rel.r_id(), reltype = rel.reltype(), "not carried");
                dropped.push(rel.r_id().to_string());
                continue;
            }

            let target = rel.target_partname(source.base_uri())?;
            if let Some(&i) = self.index.get(&target) {
                out.push(internal(rel, i));
                continue;
            }

            let (Some(bytes), Some(content_type)) =
                (self.package.part(&target), self.package.content_type(&target))
            else {
                debug!(source = %source, target = %target, "dangling relationship dropped");
                dropped.push(rel.r_id().to_string());
                continue;
            };
            if SHARED_TYPES.iter().any(|shared| *shared == content_type) {
                dropped.push(rel.r_id().to_string());
                continue;
            }

            let i = self.parts.len();
            self.parts.push(ClipPart {
                source: target.clone(),
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
                rels: Vec::new(),
            });
            self.index.insert(target, i);
            self.pending.push(i);
            out.push(internal(rel, i));
        }

        Ok((out, dropped))
    }
}

fn is_xml(content_type: &str) -> bool {
    content_type.ends_with("+xml") || content_type == ct::XML
}

/// Remove references to the relationship ids in `dropped` from a part.
///
/// `hlinkClick` and `hlinkHover` elements naming a dropped id are removed
/// with their content. On any other element only the offending attribute
/// goes. Attributes count as references when their prefix is bound to the
/// relationships namespace on the root element.
fn strip_references(xml: &[u8], dropped: &[String]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut r_prefix: Option<Vec<u8>> = None;
    let mut seen_root = false;
    let mut skipping = 0usize;
    let mut removed = 0usize;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event.into_owned(),
            Err(e) => return Err(OpcError::XmlError(format!("slide parse error: {}", e))),
        };
        buf.clear();

        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                Event::Eof => break,
                _ => {},
            }
            continue;
        }

        match event {
            Event::Start(e) if !seen_root => {
                seen_root = true;
                r_prefix = relationships_prefix(&e)?;
                writer.write_event(Event::Start(e))?;
            },
            Event::Start(e) => match rewrite_element(e, r_prefix.as_deref(), dropped)? {
                Some(e) => writer.write_event(Event::Start(e))?,
                None => {
                    removed += 1;
                    skipping = 1;
                },
            },
            Event::Empty(e) => match rewrite_element(e, r_prefix.as_deref(), dropped)? {
                Some(e) => writer.write_event(Event::Empty(e))?,
                None => removed += 1,
            },
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    debug!(removed, "removed links to relationships that were not carried");
    Ok(writer.into_inner())
}

/// Prefix bound to the relationships namespace on `root`, if any.
fn relationships_prefix(root: &BytesStart<'_>) -> Result<Option<Vec<u8>>> {
    for attr in root.attributes() {
        let attr = attr?;
        if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
            if attr.value.as_ref() == namespace::OFC_RELATIONSHIPS.as_bytes() {
                return Ok(Some(prefix.to_vec()));
            }
        }
    }
    Ok(None)
}

/// `None` when the whole element must go, else the element minus any
/// attribute that names a dropped relationship.
fn rewrite_element(
    element: BytesStart<'static>,
    r_prefix: Option<&[u8]>,
    dropped: &[String],
) -> Result<Option<BytesStart<'static>>> {
    let Some(r_prefix) = r_prefix else {
        return Ok(Some(element));
    };
    let is_reference = |attr: &Attribute<'_>| {
        attr.key.prefix().is_some_and(|p| p.as_ref() == r_prefix)
            && dropped.iter().any(|id| id.as_bytes() == attr.value.as_ref())
    };

    let mut stale = false;
    for attr in element.attributes() {
        if is_reference(&attr?) {
            stale = true;
            break;
        }
    }
    if !stale {
        return Ok(Some(element));
    }
    if LINK_ELEMENTS.iter().any(|name| *name == element.local_name().as_ref()) {
        return Ok(None);
    }

    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    for attr in element.attributes() {
        let attr = attr?;
        if !is_reference(&attr) {
            rebuilt.push_attribute(attr);
        }
    }
    Ok(Some(rebuilt))
}

fn internal(rel: &Relationship, i: usize) -> ClipRel {
    ClipRel {
        r_id: rel.r_id().to_string(),
        reltype: rel.reltype().to_string(),
        target: ClipTarget::Part(i),
    }
}

fn is_left_behind(rel: &Relationship) -> bool {
    let kind = rel.reltype().rsplit('/').next().unwrap_or_default();
    LEFT_BEHIND.iter().any(|left| *left == kind)
}

fn rebuild_rels(
    rels: &[ClipRel],
    owner: &PackURI,
    names: &[PackURI],
    layout: &PackURI,
) -> Relationships {
    let mut out = Relationships::new();
    for rel in rels {
        let (target, external) = match &rel.target {
            ClipTarget::Part(i) => (names[*i].relative_ref(owner.base_uri()), false),
            ClipTarget::Layout => (layout.relative_ref(owner.base_uri()), false),
            ClipTarget::External(url) => (url.clone(), true),
        };
        out.push(Relationship::new(
            rel.r_id.clone(),
            rel.reltype.clone(),
            target,
            external,
        ));
    }
    out
}

fn ensure_content_type(package: &mut OpcPackage, partname: &PackURI, content_type: &str) {
    if package.content_type(partname) != Some(content_type) {
        package
            .content_types_mut()
            .set_override(partname.as_str(), content_type);
    }
}

/// `/ppt/media/image12.png` becomes `/ppt/media/image%d.png`.
fn numbered_template(source: &PackURI) -> String {
    let filename = source.filename();
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) => (&filename[..pos], &filename[pos..]),
        None => (filename, ""),
    };
    let stem = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let base = source.base_uri().trim_end_matches('/');
    format!("{}/{}%d{}", base, stem, ext)
}

/// Slide layouts of a presentation in master order, with their names.
pub fn list_layouts(
    package: &OpcPackage,
    presentation: &PackURI,
) -> Result<Vec<(PackURI, Option<String>)>> {
    let mut layouts = Vec::new();
    for master_rel in package.rels(presentation)?.iter() {
        if master_rel.reltype() != rt::SLIDE_MASTER || master_rel.is_external() {
            continue;
        }
        let master = master_rel.target_partname(presentation.base_uri())?;
        for layout_rel in package.rels(&master)?.iter() {
            if layout_rel.reltype() != rt::SLIDE_LAYOUT || layout_rel.is_external() {
                continue;
            }
            let layout = layout_rel.target_partname(master.base_uri())?;
            let name = layout_name(package, &layout)?;
            layouts.push((layout, name));
        }
    }
    Ok(layouts)
}

/// `cSld/@name` of a layout part.
fn layout_name(package: &OpcPackage, layout: &PackURI) -> Result<Option<String>> {
    let Some(xml) = package.part(layout) else {
        return Ok(None);
    };
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"cSld" =>
            {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"name" {
                        return Ok(Some(attr.unescape_value()?.into_owned()));
                    }
                }
                return Ok(None);
            },
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(OpcError::XmlError(format!(
                    "{} parse error: {}",
                    layout, e
                )));
            },
            _ => {},
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_template() {
        let uri = PackURI::new("/ppt/media/image12.png").unwrap();
        assert_eq!(numbered_template(&uri), "/ppt/media/image%d.png");
        let uri = PackURI::new("/ppt/embeddings/Microsoft_Excel_Worksheet.xlsx").unwrap();
        assert_eq!(
            numbered_template(&uri),
            "/ppt/embeddings/Microsoft_Excel_Worksheet%d.xlsx"
        );
        let uri = PackURI::new("/ppt/tags/tag3").unwrap();
        assert_eq!(numbered_template(&uri), "/ppt/tags/tag%d");
    }

    #[test]
    fn test_strip_references_removes_stale_links() {
        let xml = br#"<p:sld xmlns:a="a" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="p"><p:cNvPr id="2" name="Jump"><a:hlinkClick r:id="rId3" action="ppaction://hlinksldjump"/></p:cNvPr><a:rPr><a:hlinkHover r:id="rId4"><a:snd r:embed="rId9"/></a:hlinkHover></a:rPr><a:hlinkClick r:id="rId5"/><a:blip r:embed="rId4" cstate="print"/></p:sld>"#;
        let dropped = vec!["rId3".to_string(), "rId4".to_string()];
        let out = String::from_utf8(strip_references(xml, &dropped).unwrap()).unwrap();

        assert!(!out.contains("rId3"));
        assert!(!out.contains("hlinkHover"));
        assert!(!out.contains("rId9"));
        assert!(out.contains(r#"<p:cNvPr id="2" name="Jump"></p:cNvPr>"#));
        assert!(out.contains(r#"<a:hlinkClick r:id="rId5"/>"#));
        assert!(out.contains(r#"<a:blip cstate="print"/>"#));
        assert!(out.starts_with("<p:sld xmlns:a="));
    }

    #[test]
    fn test_strip_references_ignores_unbound_prefix() {
        let xml = br#"<p:sld xmlns:p="p"><a:hlinkClick r:id="rId3"/></p:sld>"#;
        let dropped = vec!["rId3".to_string()];
        let out = strip_references(xml, &dropped).unwrap();
        assert_eq!(out, xml.to_vec());
    }

    #[test]
    fn test_left_behind_kinds() {
        let notes = Relationship::new(
            "rId1".into(),
            rt::NOTES_SLIDE.into(),
            "../notesSlides/notesSlide1.xml".into(),
            false,
        );
        let image = Relationship::new(
            "rId2".into(),
            rt::IMAGE.into(),
            "../media/image1.png".into(),
            false,
        );
        let modern_comments = Relationship::new(
            "rId3".into(),
            "http://schemas.microsoft.com/office/2018/10/relationships/comments".into(),
            "../comments/modernComment_1.xml".into(),
            false,
        );
        assert!(is_left_behind(&notes));
        assert!(!is_left_behind(&image));
        assert!(is_left_behind(&modern_comments));
    }
}
