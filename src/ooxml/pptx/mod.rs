//! PowerPoint (.pptx) host.
//!
//! - [`presentation`]: reading and rewriting the `<p:sldIdLst>` slide list
//! - [`slide`]: capturing a slide with its owned parts and pasting it elsewhere
//! - [`host`]: the [`PptxHost`] document host built on the two

pub mod host;
pub mod presentation;
pub mod slide;

pub use host::{PptxDocument, PptxHost, PptxHostFactory};
pub use presentation::SlideId;
pub use slide::SlideClip;
