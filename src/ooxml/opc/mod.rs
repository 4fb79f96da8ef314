//! Open Packaging Conventions (OPC) support.
//!
//! Just enough of the package model to edit a PresentationML deck in place:
//!
//! - Part names and relationship resolution ([`PackURI`])
//! - `.rels` parts ([`Relationships`]), order preserving
//! - `[Content_Types].xml` ([`ContentTypes`])
//! - ZIP-backed packages ([`OpcPackage`]) via the `zip` crate

pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod rel;

// Re-export commonly used types
pub use content_types::ContentTypes;
pub use error::OpcError;
pub use package::OpcPackage;
pub use packuri::PackURI;
pub use rel::{Relationship, Relationships};
