//! An OPC package held in memory.
//!
//! Parts are kept as raw bytes in the order they appeared in the ZIP
//! archive; parts added later are appended. Only the parts a caller actually
//! edits are re-serialized, everything else is written back untouched.
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::ooxml::opc::rel::Relationships;

#[derive(Debug, Clone)]
pub struct OpcPackage {
    parts: Vec<(PackURI, Vec<u8>)>,
    content_types: ContentTypes,
}

impl OpcPackage {
    /// Read a package from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Read a package from ZIP bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut content_types = None;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let partname = PackURI::from_member(file.name())?;
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;

            if partname.as_str().eq_ignore_ascii_case(CONTENT_TYPES_URI) {
                content_types = Some(ContentTypes::from_xml(&bytes)?);
            } else {
                parts.push((partname, bytes));
            }
        }

        let content_types = content_types
            .ok_or_else(|| OpcError::PartNotFound(CONTENT_TYPES_URI.to_string()))?;

        Ok(Self {
            parts,
            content_types,
        })
    }

    /// Serialize to ZIP bytes; `[Content_Types].xml` is written first.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file(CONTENT_TYPES_URI.trim_start_matches('/'), options)?;
        writer.write_all(&self.content_types.to_xml())?;

        for (partname, bytes) in &self.parts {
            writer.start_file(partname.membername(), options)?;
            writer.write_all(bytes)?;
        }

        Ok(writer.finish()?.into_inner())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn part(&self, partname: &PackURI) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(name, _)| name == partname)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn require_part(&self, partname: &PackURI) -> Result<&[u8]> {
        self.part(partname)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    #[inline]
    pub fn contains(&self, partname: &PackURI) -> bool {
        self.part(partname).is_some()
    }

    /// Replace a part's bytes, or append a new part.
    pub fn set_part(&mut self, partname: PackURI, bytes: Vec<u8>) {
        match self.parts.iter_mut().find(|(name, _)| *name == partname) {
            Some(entry) => entry.1 = bytes,
            None => self.parts.push((partname, bytes)),
        }
    }

    pub fn part_names(&self) -> impl Iterator<Item = &PackURI> {
        self.parts.iter().map(|(name, _)| name)
    }

    pub fn content_type(&self, partname: &PackURI) -> Option<&str> {
        self.content_types.get(partname)
    }

    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    /// Relationships whose source is `source`; empty if it has no `.rels` part.
    pub fn rels(&self, source: &PackURI) -> Result<Relationships> {
        match self.part(&source.rels_uri()) {
            Some(xml) => Relationships::from_xml(xml),
            None => Ok(Relationships::new()),
        }
    }

    pub fn set_rels(&mut self, source: &PackURI, rels: &Relationships) {
        self.content_types.add_default("rels", ct::OPC_RELATIONSHIPS);
        self.set_part(source.rels_uri(), rels.to_xml());
    }

    /// The main document part, found through the package `officeDocument`
    /// relationship.
    pub fn main_document(&self) -> Result<PackURI> {
        let root = PackURI::new(PACKAGE_URI)?;
        let rels = self.rels(&root)?;
        let rel = rels
            .first_of_type(rt::OFFICE_DOCUMENT)
            .ok_or_else(|| OpcError::RelationshipNotFound(rt::OFFICE_DOCUMENT.to_string()))?;
        rel.target_partname(root.base_uri())
    }

    /// First unused part name for a template such as
    /// `/ppt/slides/slide%d.xml`.
    pub fn next_partname(&self, template: &str) -> Result<PackURI> {
        for n in 1..=self.parts.len() + 1 {
            let candidate = PackURI::new(template.replacen("%d", &n.to_string(), 1))?;
            if !self.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(OpcError::InvalidPackUri(format!(
            "no free part name for '{}'",
            template
        )))
    }
}
