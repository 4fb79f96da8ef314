//! Office Open XML (OOXML) support for presentation decks.
//!
//! The module is organized into two layers:
//!
//! 1. **OPC Layer** (`opc`): package handling (ZIP, parts, relationships, content types)
//! 2. **PresentationML** (`pptx`): slide list editing and slide copy/paste, exposed
//!    as a [`crate::host::DocumentHost`]
pub mod opc;
pub mod pptx;

// Re-export commonly used types from OPC layer
pub use opc::{OpcError, OpcPackage, PackURI};
pub use pptx::{PptxHost, PptxHostFactory};
