//! Relationship parts (`.rels`).
//!
//! Relationships are kept in document order so that a part that is read and
//! written back without changes keeps its `.rels` byte layout stable.
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    r_id: String,
    reltype: String,
    target_ref: String,
    is_external: bool,
}

impl Relationship {
    pub fn new(r_id: String, reltype: String, target_ref: String, is_external: bool) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            is_external,
        }
    }

    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Target as written: a relative part reference, or a URL when external.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Absolute part name of an internal target, resolved against the
    /// source part's directory.
    pub fn target_partname(&self, base_uri: &str) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidPackUri(format!(
                "relationship {} targets external '{}'",
                self.r_id, self.target_ref
            )));
        }
        PackURI::from_rel_ref(base_uri, &self.target_ref)
    }
}

/// The relationships of one source part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.rels` part.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut rels = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target = None;
                    let mut is_external = false;

                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = attr.unescape_value()?;
                        match attr.key.as_ref() {
                            b"Id" => r_id = Some(value.into_owned()),
                            b"Type" => reltype = Some(value.into_owned()),
                            b"Target" => target = Some(value.into_owned()),
                            b"TargetMode" => is_external = value == target_mode::EXTERNAL,
                            _ => {},
                        }
                    }

                    match (r_id, reltype, target) {
                        (Some(r_id), Some(reltype), Some(target)) => {
                            rels.rels.push(Relationship::new(r_id, reltype, target, is_external));
                        },
                        _ => {
                            return Err(OpcError::XmlError(
                                "Relationship without Id, Type or Target".to_string(),
                            ));
                        },
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Relationships parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Serialize back to a `.rels` part.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut xml = String::with_capacity(128 + self.rels.len() * 160);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
        xml.push_str("<Relationships xmlns=\"");
        xml.push_str(namespace::OPC_RELATIONSHIPS);
        xml.push_str("\">");
        for rel in &self.rels {
            xml.push_str("<Relationship Id=\"");
            xml.push_str(&escape(rel.r_id.as_str()));
            xml.push_str("\" Type=\"");
            xml.push_str(&escape(rel.reltype.as_str()));
            xml.push_str("\" Target=\"");
            xml.push_str(&escape(rel.target_ref.as_str()));
            if rel.is_external {
                xml.push_str("\" TargetMode=\"");
                xml.push_str(target_mode::EXTERNAL);
            }
            xml.push_str("\"/>");
        }
        xml.push_str("</Relationships>");
        xml.into_bytes()
    }

    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    /// First relationship of `reltype`.
    pub fn first_of_type(&self, reltype: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.reltype == reltype)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Next free `rIdN`, one past the highest numeric id in use.
    pub fn next_r_id(&self) -> String {
        let max = self
            .rels
            .iter()
            .filter_map(|rel| rel.r_id.strip_prefix("rId"))
            .filter_map(|digits| atoi_simd::parse::<u32, false, false>(digits.as_bytes()).ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Append an internal relationship and return its id.
    pub fn add(&mut self, reltype: &str, target_ref: String) -> String {
        let r_id = self.next_r_id();
        self.rels.push(Relationship::new(
            r_id.clone(),
            reltype.to_string(),
            target_ref,
            false,
        ));
        r_id
    }

    /// Insert a relationship that keeps a caller-chosen id.
    pub fn push(&mut self, rel: Relationship) {
        self.rels.push(rel);
    }

    /// Drop a relationship by id, returning it.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|rel| rel.r_id == r_id)?;
        Some(self.rels.remove(pos))
    }
}

impl<'a> IntoIterator for &'a Relationships {
    type Item = &'a Relationship;
    type IntoIter = std::slice::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.rels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::relationship_type as rt;

    const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn test_parse_keeps_order() {
        let rels = Relationships::from_xml(SLIDE_RELS.as_bytes()).unwrap();
        let ids: Vec<&str> = rels.iter().map(Relationship::r_id).collect();
        assert_eq!(ids, ["rId2", "rId1", "rId3"]);

        let layout = rels.first_of_type(rt::SLIDE_LAYOUT).unwrap();
        assert_eq!(
            layout.target_partname("/ppt/slides").unwrap().as_str(),
            "/ppt/slideLayouts/slideLayout1.xml"
        );

        let link = rels.get("rId3").unwrap();
        assert!(link.is_external());
        assert_eq!(link.target_ref(), "https://example.com/?a=1&b=2");
        assert!(link.target_partname("/ppt/slides").is_err());
    }

    #[test]
    fn test_next_r_id() {
        let mut rels = Relationships::from_xml(SLIDE_RELS.as_bytes()).unwrap();
        assert_eq!(rels.next_r_id(), "rId4");
        let id = rels.add(rt::SLIDE, "slides/slide9.xml".to_string());
        assert_eq!(id, "rId4");
        assert_eq!(Relationships::new().next_r_id(), "rId1");
    }

    #[test]
    fn test_serialize_and_reparse() {
        let rels = Relationships::from_xml(SLIDE_RELS.as_bytes()).unwrap();
        let xml = rels.to_xml();
        let text = std::str::from_utf8(&xml).unwrap();
        assert!(text.contains("&amp;b=2"));
        assert_eq!(Relationships::from_xml(&xml).unwrap(), rels);
    }

    #[test]
    fn test_rejects_incomplete_relationship() {
        let xml = br#"<Relationships xmlns="x"><Relationship Id="rId1"/></Relationships>"#;
        assert!(Relationships::from_xml(xml).is_err());
    }
}
