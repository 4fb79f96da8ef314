//! Slideshift - slide reordering and cross-deck merging for presentation hosts
//!
//! A presentation host (an editor, or the bundled `.pptx` host) renumbers
//! slides 1..n after every move. A batch of "move slide a to position b"
//! requests can therefore not be replayed naively: each move shifts the
//! positions the later moves refer to. This library plans such batches into
//! an ordered sequence of single moves that lands every requested slide at its
//! requested position, and drives a host through that sequence with
//! guaranteed cleanup.
//!
//! # Features
//!
//! - **Planner**: pure, host-free conversion of a move batch into an
//!   [`OperationSequence`]
//! - **Merge**: copy one slide from a donor deck into another at any position
//! - **Driver**: state machine that opens working copies, applies a sequence,
//!   saves, and always closes every handle and stops the host
//! - **Hosts**: an in-memory reference host, and (feature `ooxml`) a host that
//!   edits `.pptx` packages directly
//!
//! # Example - Planning a batch
//!
//! ```
//! use slideshift::{MoveRequest, Operation, Planner};
//!
//! # fn main() -> slideshift::Result<()> {
//! let moves = [MoveRequest::new(5, 1), MoveRequest::new(1, 5)];
//! let sequence = Planner::new(5).plan(&moves)?;
//!
//! assert_eq!(
//!     sequence.as_slice(),
//!     &[
//!         Operation::Move { from: 5, to: 1 },
//!         Operation::Move { from: 2, to: 5 },
//!     ]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Reordering a .pptx file
//!
//! ```no_run
//! # #[cfg(feature = "ooxml")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use slideshift::ooxml::PptxHostFactory;
//! use slideshift::{plan_and_apply_update, MoveRequest, Settings};
//!
//! let bytes = std::fs::read("deck.pptx")?;
//! let moves = MoveRequest::parse_batch("5,1", "1,5")?;
//! let artifact = plan_and_apply_update(&PptxHostFactory, &Settings::default(), &bytes, &moves)?;
//! std::fs::write(&artifact.file_name, &artifact.bytes)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "ooxml"))]
//! # fn main() {}
//! ```

/// YAML settings for host call policy and output naming
pub mod config;

/// Host driver state machine
pub mod driver;

/// Error types
pub mod error;

/// Document host capability traits and the in-memory host
pub mod host;

/// Pure move and merge planning
pub mod plan;

/// Update and merge entry points
pub mod service;

/// Office Open XML presentation host
///
/// Reads and writes `.pptx` packages, and implements the host traits on top
/// of them.
#[cfg(feature = "ooxml")]
pub mod ooxml;

pub use config::Settings;
pub use driver::{CallPolicy, DocId, Driver, DriverState, OutputArtifact};
pub use error::{Error, ErrorKind, Result};
pub use host::{Document, DocumentHost, HostError, HostFactory, OpenMode};
pub use plan::{
    check_batch, check_batch_shape, parse_positions, plan_merge, Direction, MergeRequest, MoveRequest,
    Operation, OperationSequence, Planner,
};
pub use service::{plan_and_apply_merge, plan_and_apply_update, ErrorResult};
