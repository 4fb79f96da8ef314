//! The `[Content_Types].xml` stream.
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;

/// Extension defaults and per-part overrides, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let (key_attr, is_default): (&[u8], bool) = match e.local_name().as_ref() {
                        b"Default" => (&b"Extension"[..], true),
                        b"Override" => (&b"PartName"[..], false),
                        _ => (&b""[..], false),
                    };
                    if !key_attr.is_empty() {
                        let mut key = None;
                        let mut content_type = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            if attr.key.as_ref() == key_attr {
                                key = Some(attr.unescape_value()?.into_owned());
                            } else if attr.key.as_ref() == b"ContentType" {
                                content_type = Some(attr.unescape_value()?.into_owned());
                            }
                        }

                        match (key, content_type, is_default) {
                            (Some(ext), Some(ct), true) => map.add_default(&ext, &ct),
                            (Some(partname), Some(ct), false) => map.set_override(&partname, &ct),
                            _ => {},
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Content types parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut xml = String::with_capacity(256 + (self.defaults.len() + self.overrides.len()) * 128);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
        xml.push_str("<Types xmlns=\"");
        xml.push_str(namespace::OPC_CONTENT_TYPES);
        xml.push_str("\">");
        for (ext, ct) in &self.defaults {
            xml.push_str("<Default Extension=\"");
            xml.push_str(&escape(ext.as_str()));
            xml.push_str("\" ContentType=\"");
            xml.push_str(&escape(ct.as_str()));
            xml.push_str("\"/>");
        }
        for (partname, ct) in &self.overrides {
            xml.push_str("<Override PartName=\"");
            xml.push_str(&escape(partname.as_str()));
            xml.push_str("\" ContentType=\"");
            xml.push_str(&escape(ct.as_str()));
            xml.push_str("\"/>");
        }
        xml.push_str("</Types>");
        xml.into_bytes()
    }

    /// Content type of a part: its override, else the default for its extension.
    pub fn get(&self, partname: &PackURI) -> Option<&str> {
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(partname.as_str()))
            .or_else(|| {
                let ext = partname.ext();
                self.defaults
                    .iter()
                    .find(|(default, _)| default.eq_ignore_ascii_case(ext))
            })
            .map(|(_, ct)| ct.as_str())
    }

    /// Register a default for `ext` unless one exists.
    pub fn add_default(&mut self, ext: &str, content_type: &str) {
        if !self.has_default(ext) {
            self.defaults
                .push((ext.to_ascii_lowercase(), content_type.to_string()));
        }
    }

    pub fn has_default(&self, ext: &str) -> bool {
        self.defaults
            .iter()
            .any(|(default, _)| default.eq_ignore_ascii_case(ext))
    }

    /// Set (or replace) the override for `partname`.
    pub fn set_override(&mut self, partname: &str, content_type: &str) {
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(partname))
        {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self
                .overrides
                .push((partname.to_string(), content_type.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;

    const TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="PNG" ContentType="image/png"/>
  <Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>
</Types>"#;

    #[test]
    fn test_override_wins_over_default() {
        let types = ContentTypes::from_xml(TYPES.as_bytes()).unwrap();
        let pres = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(types.get(&pres), Some(ct::PML_PRESENTATION_MAIN));

        let other = PackURI::new("/ppt/viewProps.xml").unwrap();
        assert_eq!(types.get(&other), Some(ct::XML));
    }

    #[test]
    fn test_extension_lookup_ignores_case() {
        let types = ContentTypes::from_xml(TYPES.as_bytes()).unwrap();
        let image = PackURI::new("/ppt/media/image1.png").unwrap();
        assert_eq!(types.get(&image), Some(ct::PNG));
        assert!(types.has_default("png"));
    }

    #[test]
    fn test_missing_type() {
        let types = ContentTypes::from_xml(TYPES.as_bytes()).unwrap();
        let unknown = PackURI::new("/ppt/media/clip.wav").unwrap();
        assert_eq!(types.get(&unknown), None);
    }

    #[test]
    fn test_set_override_and_reparse() {
        let mut types = ContentTypes::from_xml(TYPES.as_bytes()).unwrap();
        types.set_override("/ppt/slides/slide2.xml", ct::PML_SLIDE);
        types.set_override("/ppt/slides/slide2.xml", ct::PML_SLIDE);
        types.add_default("jpeg", ct::JPEG);

        let reparsed = ContentTypes::from_xml(&types.to_xml()).unwrap();
        assert_eq!(reparsed, types);
        let slide = PackURI::new("/ppt/slides/slide2.xml").unwrap();
        assert_eq!(reparsed.get(&slide), Some(ct::PML_SLIDE));
    }
}
