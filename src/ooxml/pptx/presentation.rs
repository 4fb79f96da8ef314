//! The slide list of `presentation.xml`.
//!
//! Slide order lives in `<p:sldIdLst>`: each `<p:sldId>` carries a numeric id
//! and the relationship id of its slide part. Reordering slides is a matter
//! of rewriting this list; every other byte of the part is streamed through
//! unchanged.
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};

/// Lowest id PowerPoint accepts for a slide.
pub const MIN_SLIDE_ID: u32 = 256;

/// One `<p:sldId>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideId {
    pub id: u32,
    pub r_id: String,
}

/// Next unused slide id for a list.
pub fn next_slide_id(slides: &[SlideId]) -> u32 {
    slides
        .iter()
        .map(|slide| slide.id.saturating_add(1))
        .max()
        .unwrap_or(MIN_SLIDE_ID)
        .max(MIN_SLIDE_ID)
}

/// Read the slide list in document order.
pub fn read_slide_ids(xml: &[u8]) -> Result<Vec<SlideId>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut slides = Vec::new();
    let mut buf = Vec::new();
    let mut in_list = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sldIdLst" => in_list = true,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"sldIdLst" => in_list = false,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if in_list && e.local_name().as_ref() == b"sldId" =>
            {
                let mut id = None;
                let mut r_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() != b"id" {
                        continue;
                    }
                    if attr.key.prefix().is_some() {
                        r_id = Some(attr.unescape_value()?.into_owned());
                    } else {
                        id = Some(
                            atoi_simd::parse::<u32, false, false>(&attr.value)
                                .map_err(|_| OpcError::XmlError("sldId/@id is not a number".to_string()))?,
                        );
                    }
                }

                match (id, r_id) {
                    (Some(id), Some(r_id)) => slides.push(SlideId { id, r_id }),
                    _ => {
                        return Err(OpcError::XmlError(
                            "sldId without id or r:id".to_string(),
                        ));
                    },
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(OpcError::XmlError(format!(
                    "presentation.xml parse error: {}",
                    e
                )));
            },
            _ => {},
        }
        buf.clear();
    }

    Ok(slides)
}

/// Children of `<p:presentation>` that precede `<p:sldIdLst>`.
const BEFORE_SLIDE_LIST: &[&[u8]] = &[b"sldMasterIdLst", b"notesMasterIdLst", b"handoutMasterIdLst"];

/// Prefixes used by the root element, learned from the root start tag.
struct Prefixes {
    pml: Option<String>,
    rels: Option<String>,
}

impl Prefixes {
    fn from_root(root: &BytesStart<'_>) -> Result<Self> {
        let pml = root
            .name()
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());

        let mut rels = None;
        for attr in root.attributes() {
            let attr = attr?;
            let key = attr.key.as_ref();
            if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                if attr.value.as_ref() == namespace::OFC_RELATIONSHIPS.as_bytes() {
                    rels = Some(String::from_utf8_lossy(prefix).into_owned());
                }
            }
        }

        Ok(Self { pml, rels })
    }

    fn qualify(prefix: &Option<String>, local: &str) -> String {
        match prefix {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }
}

fn write_slide_list<W: std::io::Write>(
    writer: &mut Writer<W>,
    prefixes: &Prefixes,
    slides: &[SlideId],
) -> Result<()> {
    if slides.is_empty() {
        return Ok(());
    }
    let list_name = Prefixes::qualify(&prefixes.pml, "sldIdLst");
    let item_name = Prefixes::qualify(&prefixes.pml, "sldId");
    let r_attr = format!("{}:id", prefixes.rels.as_deref().unwrap_or("r"));

    writer.write_event(Event::Start(BytesStart::new(list_name.as_str())))?;
    for slide in slides {
        let id = slide.id.to_string();
        let mut item = BytesStart::new(item_name.as_str());
        item.push_attribute(("id", id.as_str()));
        item.push_attribute((r_attr.as_str(), slide.r_id.as_str()));
        writer.write_event(Event::Empty(item))?;
    }
    writer.write_event(Event::End(BytesEnd::new(list_name.as_str())))?;
    Ok(())
}

/// Rewrite `presentation.xml` so that its slide list is exactly `slides`.
///
/// An existing `<p:sldIdLst>` is replaced in place. When the part has none,
/// the list is inserted at its schema position, after the master id lists.
pub fn write_slide_ids(xml: &[u8], slides: &[SlideId]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut rewriter = ListRewriter {
        writer: Writer::new(Vec::with_capacity(xml.len() + slides.len() * 48)),
        slides,
        prefixes: None,
        depth: 0,
        written: false,
        skipping: None,
    };

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| OpcError::XmlError(format!("presentation.xml parse error: {}", e)))?;
        let done = rewriter.feed(event)?;
        buf.clear();
        if done {
            break;
        }
    }

    if rewriter.prefixes.is_none() {
        return Err(OpcError::XmlError("presentation.xml has no root element".to_string()));
    }
    Ok(rewriter.writer.into_inner())
}

/// Event-by-event state of [`write_slide_ids`].
struct ListRewriter<'s> {
    writer: Writer<Vec<u8>>,
    slides: &'s [SlideId],
    prefixes: Option<Prefixes>,
    depth: usize,
    written: bool,
    /// Depth of the old list while its content is being dropped.
    skipping: Option<usize>,
}

impl ListRewriter<'_> {
    /// Handle one event; `true` at end of input.
    fn feed(&mut self, event: Event<'_>) -> Result<bool> {
        if let Some(skip_depth) = self.skipping {
            match event {
                Event::Start(_) => self.depth += 1,
                Event::End(_) => {
                    self.depth -= 1;
                    if self.depth == skip_depth {
                        self.skipping = None;
                    }
                },
                Event::Eof => {
                    return Err(OpcError::XmlError("unterminated sldIdLst".to_string()));
                },
                _ => {},
            }
            return Ok(false);
        }

        match event {
            Event::Start(e) if self.depth == 0 => {
                let learned = Prefixes::from_root(&e)?;
                let mut root = e.into_owned();
                if learned.rels.is_none() && !self.slides.is_empty() {
                    root.push_attribute(("xmlns:r", namespace::OFC_RELATIONSHIPS));
                }
                self.prefixes = Some(learned);
                self.writer.write_event(Event::Start(root))?;
                self.depth += 1;
            },
            Event::Start(e) if self.depth == 1 => {
                if self.child_of_root(&e)? {
                    self.skipping = Some(self.depth);
                } else {
                    self.writer.write_event(Event::Start(e))?;
                }
                self.depth += 1;
            },
            Event::Empty(e) if self.depth == 1 => {
                if !self.child_of_root(&e)? {
                    self.writer.write_event(Event::Empty(e))?;
                }
            },
            Event::Start(e) => {
                self.writer.write_event(Event::Start(e))?;
                self.depth += 1;
            },
            Event::End(e) => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 && !self.written {
                    self.write_list()?;
                }
                self.writer.write_event(Event::End(e))?;
            },
            Event::Eof => return Ok(true),
            other => self.writer.write_event(other)?,
        }
        Ok(false)
    }

    /// Emit the new list ahead of a root child if this is the place for it.
    /// Returns `true` when `e` is the old list, which the caller drops.
    fn child_of_root(&mut self, e: &BytesStart<'_>) -> Result<bool> {
        let local = e.local_name();
        if local.as_ref() == b"sldIdLst" {
            self.write_list()?;
            return Ok(true);
        }
        if !self.written && !BEFORE_SLIDE_LIST.iter().any(|name| *name == local.as_ref()) {
            self.write_list()?;
        }
        Ok(false)
    }

    fn write_list(&mut self) -> Result<()> {
        let Some(prefixes) = self.prefixes.as_ref() else {
            return Err(OpcError::XmlError("element outside the root".to_string()));
        };
        write_slide_list(&mut self.writer, prefixes, self.slides)?;
        self.written = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESENTATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" saveSubsetFonts="1">
  <p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>
  <p:sldIdLst>
    <p:sldId id="256" r:id="rId2"/>
    <p:sldId id="257" r:id="rId3"/>
    <p:sldId id="260" r:id="rId4"/>
  </p:sldIdLst>
  <p:sldSz cx="12192000" cy="6858000"/>
  <p:notesSz cx="6858000" cy="9144000"/>
</p:presentation>"#;

    fn ids(slides: &[SlideId]) -> Vec<(u32, &str)> {
        slides.iter().map(|s| (s.id, s.r_id.as_str())).collect()
    }

    #[test]
    fn test_read_slide_ids() {
        let slides = read_slide_ids(PRESENTATION.as_bytes()).unwrap();
        assert_eq!(ids(&slides), [(256, "rId2"), (257, "rId3"), (260, "rId4")]);
        assert_eq!(next_slide_id(&slides), 261);
        assert_eq!(next_slide_id(&[]), MIN_SLIDE_ID);
    }

    #[test]
    fn test_master_ids_are_not_slides() {
        let xml = br#"<p:presentation xmlns:p="x" xmlns:r="y"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst></p:presentation>"#;
        assert!(read_slide_ids(xml).unwrap().is_empty());
    }

    #[test]
    fn test_rewrite_reorders_and_preserves_the_rest() {
        let mut slides = read_slide_ids(PRESENTATION.as_bytes()).unwrap();
        slides.swap(0, 2);
        let xml = write_slide_ids(PRESENTATION.as_bytes(), &slides).unwrap();
        let text = std::str::from_utf8(&xml).unwrap();

        assert_eq!(ids(&read_slide_ids(&xml).unwrap()), [(260, "rId4"), (257, "rId3"), (256, "rId2")]);
        assert!(text.contains(r#"saveSubsetFonts="1""#));
        assert!(text.contains(r#"<p:sldMasterId id="2147483648" r:id="rId1"/>"#));
        assert!(text.contains(r#"<p:sldSz cx="12192000" cy="6858000"/>"#));
        assert_eq!(text.matches("sldIdLst").count(), 2);
    }

    #[test]
    fn test_inserts_missing_list_before_slide_size() {
        let xml = br#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldMasterIdLst/><p:sldSz cx="1" cy="2"/></p:presentation>"#;
        let slides = vec![SlideId {
            id: 256,
            r_id: "rId7".to_string(),
        }];
        let out = write_slide_ids(xml, &slides).unwrap();
        let text = std::str::from_utf8(&out).unwrap();

        let list = text.find("<p:sldIdLst>").unwrap();
        assert!(text.find("<p:sldMasterIdLst/>").unwrap() < list);
        assert!(list < text.find("<p:sldSz").unwrap());
        assert!(text.contains(r#"rel:id="rId7""#));
        assert_eq!(ids(&read_slide_ids(&out).unwrap()), [(256, "rId7")]);
    }

    #[test]
    fn test_adds_relationship_namespace_when_absent() {
        let xml = br#"<presentation xmlns="http://schemas.openxmlformats.org/presentationml/2006/main"><sldSz cx="1" cy="2"/></presentation>"#;
        let slides = vec![SlideId {
            id: 300,
            r_id: "rId2".to_string(),
        }];
        let out = write_slide_ids(xml, &slides).unwrap();
        let text = std::str::from_utf8(&out).unwrap();
        assert!(text.contains("xmlns:r="));
        assert!(text.contains(r#"<sldId id="300" r:id="rId2"/>"#));
    }

    #[test]
    fn test_rejects_sld_id_without_rel() {
        let xml = br#"<p:presentation xmlns:p="x"><p:sldIdLst><p:sldId id="256"/></p:sldIdLst></p:presentation>"#;
        assert!(read_slide_ids(xml).is_err());
    }
}
