//! Caller-facing move and merge requests.
//!
//! All positions are 1-based and expressed against the document as it was
//! when the request was made, before any mutation.
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Direction of a requested repositioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Target position is before the original position.
    Backward,
    /// Target position is after the original position.
    Forward,
    /// Target equals origin; no host call is needed for the slide itself.
    Stationary,
}

/// Move the slide originally at `from` so that it ends up at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveRequest {
    pub from: usize,
    pub to: usize,
}

impl MoveRequest {
    #[inline]
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        match self.from.cmp(&self.to) {
            std::cmp::Ordering::Greater => Direction::Backward,
            std::cmp::Ordering::Less => Direction::Forward,
            std::cmp::Ordering::Equal => Direction::Stationary,
        }
    }

    /// Pair up two parallel position lists.
    ///
    /// # Arguments
    /// * `slides` - Original positions of the slides to move
    /// * `targets` - New positions, one per entry of `slides`
    pub fn zip(slides: &[usize], targets: &[usize]) -> Result<Vec<MoveRequest>> {
        if slides.len() != targets.len() {
            return Err(Error::InvalidRange(format!(
                "the number of slides to update ({}) and new positions ({}) must match",
                slides.len(),
                targets.len()
            )));
        }
        Ok(slides
            .iter()
            .zip(targets)
            .map(|(&from, &to)| MoveRequest::new(from, to))
            .collect())
    }

    /// Parse a batch from two comma-separated lists such as `"5, 1"` and `"1,5"`.
    ///
    /// # Example
    ///
    /// ```
    /// use slideshift::plan::MoveRequest;
    ///
    /// let batch = MoveRequest::parse_batch("5, 1", "1,5")?;
    /// assert_eq!(batch, vec![MoveRequest::new(5, 1), MoveRequest::new(1, 5)]);
    /// # Ok::<(), slideshift::Error>(())
    /// ```
    pub fn parse_batch(slides: &str, targets: &str) -> Result<Vec<MoveRequest>> {
        let slides = parse_positions(slides)?;
        let targets = parse_positions(targets)?;
        Self::zip(&slides, &targets)
    }
}

/// Parse a comma-separated list of 1-based positions.
///
/// Blank entries are skipped, so trailing commas are accepted.
pub fn parse_positions(list: &str) -> Result<Vec<usize>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            atoi_simd::parse::<u32, false, false>(item.as_bytes())
                .map(|n| n as usize)
                .map_err(|_| Error::InvalidInput(format!("'{}' is not a slide position", item)))
        })
        .collect()
}

/// Insert slide `source` of one document at `insert_at` in another.
///
/// `insert_at` may be one past the destination's slide count to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRequest {
    pub source: usize,
    pub insert_at: usize,
}

impl MergeRequest {
    #[inline]
    pub fn new(source: usize, insert_at: usize) -> Self {
        Self { source, insert_at }
    }
}

/// Check a batch for problems that do not depend on the document.
///
/// Zero positions and duplicates are rejected here, before any document is
/// opened.
pub fn check_batch_shape(requests: &[MoveRequest]) -> Result<()> {
    if let Some(req) = requests.iter().find(|r| r.from == 0 || r.to == 0) {
        return Err(Error::InvalidRange(format!(
            "slide positions are 1-based, got {} -> {}",
            req.from, req.to
        )));
    }

    let mut origins = HashSet::with_capacity(requests.len());
    let mut targets = HashSet::with_capacity(requests.len());
    for req in requests {
        if !origins.insert(req.from) {
            return Err(Error::Conflict(format!(
                "slide {} is listed more than once",
                req.from
            )));
        }
        if !targets.insert(req.to) {
            return Err(Error::Conflict(format!(
                "position {} is requested more than once",
                req.to
            )));
        }
    }
    Ok(())
}

/// Check a batch against a document with `slide_count` slides.
pub fn check_batch(slide_count: usize, requests: &[MoveRequest]) -> Result<()> {
    check_batch_shape(requests)?;
    if requests.len() > slide_count {
        return Err(Error::InvalidRange(format!(
            "{} moves requested for a presentation with {} slides",
            requests.len(),
            slide_count
        )));
    }
    for req in requests {
        if req.from > slide_count {
            return Err(Error::InvalidRange(format!(
                "slide {} is out of range, presentation has {} slides",
                req.from, slide_count
            )));
        }
        if req.to > slide_count {
            return Err(Error::InvalidRange(format!(
                "new position {} is out of range, presentation has {} slides",
                req.to, slide_count
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_direction() {
        assert_eq!(MoveRequest::new(5, 1).direction(), Direction::Backward);
        assert_eq!(MoveRequest::new(1, 5).direction(), Direction::Forward);
        assert_eq!(MoveRequest::new(3, 3).direction(), Direction::Stationary);
    }

    #[test]
    fn test_parse_batch_tolerates_whitespace() {
        let batch = MoveRequest::parse_batch(" 2 ,5,", "5, 2").unwrap();
        assert_eq!(batch, vec![MoveRequest::new(2, 5), MoveRequest::new(5, 2)]);
    }

    #[test]
    fn test_parse_batch_rejects_garbage() {
        let err = MoveRequest::parse_batch("1,x", "2,3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_batch_length_mismatch() {
        let err = MoveRequest::parse_batch("1,2,3", "2,3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }

    #[test]
    fn test_duplicate_target_is_conflict() {
        let err = check_batch_shape(&[MoveRequest::new(1, 3), MoveRequest::new(2, 3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_duplicate_origin_is_conflict() {
        let err = check_batch(4, &[MoveRequest::new(2, 3), MoveRequest::new(2, 4)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_out_of_range() {
        let err = check_batch(3, &[MoveRequest::new(4, 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
        let err = check_batch(3, &[MoveRequest::new(1, 4)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
        let err = check_batch(3, &[MoveRequest::new(0, 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }
}
