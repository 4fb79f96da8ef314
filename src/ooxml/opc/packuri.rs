//! Part names inside an OPC package.
use std::fmt;

use crate::ooxml::opc::error::{OpcError, Result};

/// The package pseudo-partname, the source of package-level relationships.
pub const PACKAGE_URI: &str = "/";

/// Part name of the content types stream.
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// An absolute part name such as `/ppt/slides/slide3.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(OpcError::InvalidPackUri(format!(
                "part name must begin with '/', got '{}'",
                uri
            )));
        }
        Ok(Self { uri })
    }

    /// Part name for a ZIP member name (`ppt/slides/slide1.xml`).
    pub fn from_member(member: &str) -> Result<Self> {
        Self::new(format!("/{}", member.trim_start_matches('/')))
    }

    /// Resolve a relationship target relative to `base_uri`.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        let joined = if relative_ref.starts_with('/') {
            relative_ref.to_string()
        } else if base_uri.ends_with('/') {
            format!("{}{}", base_uri, relative_ref)
        } else {
            format!("{}/{}", base_uri, relative_ref)
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in joined.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    segments.pop();
                },
                other => segments.push(other),
            }
        }
        Self::new(format!("/{}", segments.join("/")))
    }

    /// Directory portion: `/ppt/slides` for `/ppt/slides/slide1.xml`.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// Extension without the dot, lowercased by the caller when needed.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// ZIP member name (no leading slash).
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Reference to this part as written in a `.rels` part whose source
    /// lives in `base_uri`.
    pub fn relative_ref(&self, base_uri: &str) -> String {
        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

        let mut parts: Vec<&str> = vec![".."; from.len() - common];
        parts.extend_from_slice(&to[common..]);
        parts.join("/")
    }

    /// The `.rels` part holding this part's relationships.
    pub fn rels_uri(&self) -> PackURI {
        let uri = if self.uri == PACKAGE_URI {
            "/_rels/.rels".to_string()
        } else {
            let base = self.base_uri().trim_end_matches('/');
            format!("{}/_rels/{}.rels", base, self.filename())
        };
        PackURI { uri }
    }

    /// Inverse of [`PackURI::rels_uri`]; `None` if this is not a `.rels` part.
    pub fn rels_source(&self) -> Option<PackURI> {
        let file = self.filename().strip_suffix(".rels")?;
        let dir = self.base_uri().strip_suffix("/_rels")?;
        if file.is_empty() {
            return Some(PackURI {
                uri: PACKAGE_URI.to_string(),
            });
        }
        Some(PackURI {
            uri: format!("{}/{}", dir, file),
        })
    }

    pub fn is_rels(&self) -> bool {
        self.uri.ends_with(".rels") && self.base_uri().ends_with("_rels")
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for PackURI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_leading_slash() {
        assert!(PackURI::new("/ppt/presentation.xml").is_ok());
        assert!(PackURI::new("ppt/presentation.xml").is_err());
    }

    #[test]
    fn test_components() {
        let uri = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(uri.base_uri(), "/ppt/slides");
        assert_eq!(uri.filename(), "slide1.xml");
        assert_eq!(uri.ext(), "xml");
        assert_eq!(uri.membername(), "ppt/slides/slide1.xml");
    }

    #[test]
    fn test_resolves_relative_targets() {
        let uri = PackURI::from_rel_ref("/ppt/slides", "../slideLayouts/slideLayout2.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/slideLayouts/slideLayout2.xml");
        let uri = PackURI::from_rel_ref("/", "ppt/presentation.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/presentation.xml");
        let uri = PackURI::from_rel_ref("/ppt/slides", "/ppt/media/image1.png").unwrap();
        assert_eq!(uri.as_str(), "/ppt/media/image1.png");
    }

    #[test]
    fn test_relative_ref() {
        let layout = PackURI::new("/ppt/slideLayouts/slideLayout1.xml").unwrap();
        assert_eq!(layout.relative_ref("/ppt/slides"), "../slideLayouts/slideLayout1.xml");
        let slide = PackURI::new("/ppt/slides/slide4.xml").unwrap();
        assert_eq!(slide.relative_ref("/ppt"), "slides/slide4.xml");
        assert_eq!(slide.relative_ref("/"), "ppt/slides/slide4.xml");
    }

    #[test]
    fn test_rels_uri_round_trip() {
        let slide = PackURI::new("/ppt/slides/slide4.xml").unwrap();
        let rels = slide.rels_uri();
        assert_eq!(rels.as_str(), "/ppt/slides/_rels/slide4.xml.rels");
        assert!(rels.is_rels());
        assert_eq!(rels.rels_source(), Some(slide));

        let root = PackURI::new(PACKAGE_URI).unwrap();
        assert_eq!(root.rels_uri().as_str(), "/_rels/.rels");
        assert_eq!(root.rels_uri().rels_source(), Some(root));
    }
}
