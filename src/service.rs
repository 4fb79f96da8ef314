//! The two caller-facing operations: reorder slides within one deck, and
//! copy one slide from a deck into another.
//!
//! Each call launches its own host from the given [`HostFactory`], drives it
//! through a [`Driver`], and leaves nothing running when it returns,
//! whether it succeeded or not.
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::driver::{Driver, OutputArtifact};
use crate::error::{Error, ErrorKind, Result};
use crate::host::{HostFactory, OpenMode};
use crate::plan::{check_batch_shape, plan_merge, MergeRequest, MoveRequest, Planner};

/// Apply a batch of moves to `bytes` and return the saved deck.
///
/// Duplicate and zero positions are rejected before any host is launched;
/// range checks need the document's slide count and run after it is opened.
pub fn plan_and_apply_update<F: HostFactory>(
    factory: &F,
    settings: &Settings,
    bytes: &[u8],
    moves: &[MoveRequest],
) -> Result<OutputArtifact> {
    check_batch_shape(moves)?;

    let host = factory.launch().map_err(Error::open)?;
    let mut driver = Driver::with_work_dir(host, settings.to_policy(), settings.work_dir.as_deref())?;

    let doc = driver.open_for_update(bytes)?;
    let count = driver.slide_count(doc)?;
    let sequence = Planner::new(count).plan(moves)?;
    info!(slides = count, moves = moves.len(), operations = sequence.len(), "applying update");

    driver.apply_sequence(doc, &sequence)?;
    let artifact = driver.save_as(doc, &settings.output.update_file_name)?;
    driver.finish();
    Ok(artifact)
}

/// Insert slide `request.source` of `source` into `target` at
/// `request.insert_at` and return the saved target deck.
pub fn plan_and_apply_merge<F: HostFactory>(
    factory: &F,
    settings: &Settings,
    source: &[u8],
    target: &[u8],
    request: MergeRequest,
) -> Result<OutputArtifact> {
    if request.source == 0 || request.insert_at == 0 {
        return Err(Error::InvalidRange(format!(
            "slide positions are 1-based, got slide {} at position {}",
            request.source, request.insert_at
        )));
    }

    let host = factory.launch().map_err(Error::open)?;
    let mut driver = Driver::with_work_dir(host, settings.to_policy(), settings.work_dir.as_deref())?;

    let donor = driver.open(source, OpenMode::ReadOnly)?;
    let doc = driver.open_for_update(target)?;
    let donor_count = driver.slide_count(donor)?;
    let target_count = driver.slide_count(doc)?;
    let sequence = plan_merge(donor_count, target_count, request)?;
    info!(
        source = request.source,
        insert_at = request.insert_at,
        source_slides = donor_count,
        target_slides = target_count,
        "applying merge"
    );

    driver.apply_merge_sequence(donor, doc, &sequence)?;
    let artifact = driver.save_as(doc, &settings.output.merge_file_name)?;
    driver.finish();
    Ok(artifact)
}

/// Error payload for callers that only need a category and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResult {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorResult {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Error> for ErrorResult {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{decode_deck, encode_deck, Faults, MemoryHostFactory};

    fn five() -> Vec<u8> {
        encode_deck(&["o1", "o2", "o3", "o4", "o5"])
    }

    #[test]
    fn test_update_swaps_first_and_last() {
        let factory = MemoryHostFactory::new();
        let moves = [MoveRequest::new(5, 1), MoveRequest::new(1, 5)];
        let artifact = plan_and_apply_update(&factory, &Settings::default(), &five(), &moves).unwrap();

        assert_eq!(artifact.file_name, "updated_presentation.pptx");
        assert_eq!(
            decode_deck(&artifact.bytes).unwrap(),
            ["o5", "o2", "o3", "o4", "o1"]
        );
        let ledger = factory.ledger();
        assert_eq!(ledger.mutations, 2);
        assert_eq!(ledger.leaked(), 0);
        assert!(!ledger.running());
    }

    #[test]
    fn test_conflict_never_launches() {
        let factory = MemoryHostFactory::new();
        let moves = [MoveRequest::new(1, 3), MoveRequest::new(2, 3)];
        let err = plan_and_apply_update(&factory, &Settings::default(), &five(), &moves).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(factory.ledger().launched, 0);
    }

    #[test]
    fn test_out_of_range_after_open_cleans_up() {
        let factory = MemoryHostFactory::new();
        let moves = [MoveRequest::new(6, 1)];
        let err = plan_and_apply_update(&factory, &Settings::default(), &five(), &moves).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);

        let ledger = factory.ledger();
        assert_eq!(ledger.opened, 1);
        assert_eq!(ledger.mutations, 0);
        assert_eq!(ledger.leaked(), 0);
        assert!(!ledger.running());
    }

    #[test]
    fn test_save_rejection() {
        let factory = MemoryHostFactory::with_faults(Faults {
            reject_save: true,
            ..Faults::default()
        });
        let err = plan_and_apply_update(&factory, &Settings::default(), &five(), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Save);
        assert_eq!(factory.ledger().leaked(), 0);
    }

    #[test]
    fn test_merge_appends() {
        let factory = MemoryHostFactory::new();
        let a = encode_deck(&["a1", "a2"]);
        let b = encode_deck(&["b1", "b2"]);
        let artifact =
            plan_and_apply_merge(&factory, &Settings::default(), &a, &b, MergeRequest::new(2, 3)).unwrap();

        assert_eq!(artifact.file_name, "merged_presentation.pptx");
        assert_eq!(decode_deck(&artifact.bytes).unwrap(), ["b1", "b2", "a2"]);
        let ledger = factory.ledger();
        assert_eq!(ledger.opened, 2);
        assert_eq!(ledger.closed, 2);
    }

    #[test]
    fn test_merge_rejects_bad_position() {
        let factory = MemoryHostFactory::new();
        let a = encode_deck(&["a1"]);
        let b = encode_deck(&["b1"]);
        let err = plan_and_apply_merge(&factory, &Settings::default(), &a, &b, MergeRequest::new(1, 3))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
        assert_eq!(factory.ledger().mutations, 0);
        assert_eq!(factory.ledger().leaked(), 0);

        let err = plan_and_apply_merge(&factory, &Settings::default(), &a, &b, MergeRequest::new(0, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }

    #[test]
    fn test_error_result() {
        let result = ErrorResult::from(Error::Conflict("slide 2 is listed more than once".into()));
        assert_eq!(result.kind, ErrorKind::Conflict);
        assert!(result.kind.is_user_error());
        assert_eq!(result.to_string(), "Conflicting request: slide 2 is listed more than once");
    }
}
