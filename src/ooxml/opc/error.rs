//! Error types for OPC package operations
use thiserror::Error;

use crate::host::HostError;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Content type not found for partname: {0}")]
    ContentTypeNotFound(String),

    #[error("Unexpected content type for {partname}: {content_type}")]
    UnexpectedContentType {
        partname: String,
        content_type: String,
    },

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Quick-XML error: {0}")]
    QuickXmlError(#[from] quick_xml::Error),

    #[error("Attribute error: {0}")]
    AttrError(String),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::AttrError(err.to_string())
    }
}

impl From<OpcError> for HostError {
    /// IO failures stay IO failures; everything else means the package is
    /// not something the host can work with.
    fn from(err: OpcError) -> Self {
        match err {
            OpcError::IoError(e) => HostError::Io(e),
            OpcError::PartNotFound(_) | OpcError::RelationshipNotFound(_) => {
                HostError::Rejected(err.to_string())
            },
            other => HostError::Parse(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
