//! Permutation planner.
//!
//! Hosts address slides only by their current position and renumber every
//! other slide after each move, so a batch of `(original -> target)` pairs
//! cannot be applied in input order. The planner simulates the host's
//! renumbering and emits each move against the slide's live position.
//!
//! Moves are issued backward-first (descending original position), then
//! forward (ascending original position), then any stationary pair that an
//! earlier move displaced. A slide is settled once it has been placed; every
//! move lands between the settled neighbours the slide must end up between,
//! at the requested target whenever that position lies in the allowed span.
//! Once all named slides are settled the live order equals the requested
//! arrangement, which is checked before the sequence is returned.
use tracing::debug;

use crate::error::{Error, Result};
use crate::plan::request::{check_batch, Direction, MergeRequest, MoveRequest};
use crate::plan::sequence::{Operation, OperationSequence};

/// Plans single-slide moves for a document with a fixed number of slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Planner {
    slide_count: usize,
}

impl Planner {
    /// Create a planner for a document with `slide_count` slides.
    #[inline]
    pub fn new(slide_count: usize) -> Self {
        Self { slide_count }
    }

    #[inline]
    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    /// Compute the arrangement a batch asks for.
    ///
    /// Returns the original position of the slide that should occupy each
    /// final position. Named slides sit at their targets; the remaining slides
    /// fill the free positions in their original relative order.
    pub fn final_arrangement(&self, requests: &[MoveRequest]) -> Result<Vec<usize>> {
        check_batch(self.slide_count, requests)?;
        Ok(self.arrangement_unchecked(requests))
    }

    fn arrangement_unchecked(&self, requests: &[MoveRequest]) -> Vec<usize> {
        let n = self.slide_count;
        let mut slots = vec![None; n];
        let mut named = vec![false; n + 1];
        for req in requests {
            slots[req.to - 1] = Some(req.from);
            named[req.from] = true;
        }

        let mut unnamed = (1..=n).filter(|&pos| !named[pos]);
        slots
            .into_iter()
            .map(|slot| slot.or_else(|| unnamed.next()).unwrap_or_default())
            .collect()
    }

    /// Plan the moves that realize `requests`.
    ///
    /// # Errors
    ///
    /// * `InvalidRange` if a position is outside `1..=slide_count`
    /// * `Conflict` if an original or target position repeats
    /// * `InternalInvariant` if the simulation cannot place a slide
    ///
    /// # Example
    ///
    /// ```
    /// use slideshift::plan::{MoveRequest, Operation, Planner};
    ///
    /// let seq = Planner::new(5).plan(&[MoveRequest::new(5, 1), MoveRequest::new(1, 5)])?;
    /// assert_eq!(
    ///     seq.as_slice(),
    ///     &[Operation::Move { from: 5, to: 1 }, Operation::Move { from: 2, to: 5 }]
    /// );
    /// # Ok::<(), slideshift::Error>(())
    /// ```
    pub fn plan(&self, requests: &[MoveRequest]) -> Result<OperationSequence> {
        check_batch(self.slide_count, requests)?;
        let n = self.slide_count;
        let arrangement = self.arrangement_unchecked(requests);

        // rank[p]: final 0-based position of the slide originally at p
        let mut rank = vec![0usize; n + 1];
        for (slot, &orig) in arrangement.iter().enumerate() {
            rank[orig] = slot;
        }

        let mut settled = vec![true; n + 1];
        for req in requests {
            settled[req.from] = false;
        }

        let mut backward = Vec::new();
        let mut forward = Vec::new();
        let mut stationary = Vec::new();
        for &req in requests {
            match req.direction() {
                Direction::Backward => backward.push(req),
                Direction::Forward => forward.push(req),
                Direction::Stationary => stationary.push(req),
            }
        }
        backward.sort_unstable_by(|a, b| b.from.cmp(&a.from));
        forward.sort_unstable_by_key(|req| req.from);
        stationary.sort_unstable_by_key(|req| req.from);

        // live[i]: original position of the slide currently at position i + 1
        let mut live: Vec<usize> = (1..=n).collect();
        let mut seq = OperationSequence::new();

        for req in backward.iter().chain(&forward).chain(&stationary) {
            let current = live.iter().position(|&s| s == req.from).ok_or_else(|| {
                Error::InternalInvariant(format!(
                    "slide originally at {} has no live position",
                    req.from
                ))
            })?;
            live.remove(current);

            let own = rank[req.from];
            let lower = live
                .iter()
                .rposition(|&s| settled[s] && rank[s] < own)
                .map_or(0, |i| i + 1);
            let upper = live
                .iter()
                .position(|&s| settled[s] && rank[s] > own)
                .unwrap_or(live.len());
            if lower > upper {
                return Err(Error::InternalInvariant(format!(
                    "settled slides out of order around slide originally at {}",
                    req.from
                )));
            }

            let dest = (req.to - 1).clamp(lower, upper);
            live.insert(dest, req.from);
            settled[req.from] = true;

            if dest != current {
                let op = Operation::Move {
                    from: current + 1,
                    to: dest + 1,
                };
                debug!(original = req.from, target = req.to, %op, "planned move");
                seq.push(op);
            }
        }

        if live != arrangement {
            return Err(Error::InternalInvariant(format!(
                "planned order {:?} differs from requested order {:?}",
                live, arrangement
            )));
        }

        Ok(seq)
    }
}

/// Plan a copy of slide `request.source` from a donor with `source_count`
/// slides into a target with `target_count` slides.
///
/// `request.insert_at` may be `target_count + 1` to append.
pub fn plan_merge(
    source_count: usize,
    target_count: usize,
    request: MergeRequest,
) -> Result<OperationSequence> {
    if request.source == 0 || request.source > source_count {
        return Err(Error::InvalidRange(format!(
            "invalid slide number {} in the source presentation, which has {} slides",
            request.source, source_count
        )));
    }
    if request.insert_at == 0 || request.insert_at > target_count + 1 {
        return Err(Error::InvalidRange(format!(
            "invalid merge position {} in the target presentation, which has {} slides",
            request.insert_at, target_count
        )));
    }

    Ok([Operation::CopyPaste {
        source: request.source,
        at: request.insert_at,
    }]
    .into_iter()
    .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use proptest::sample::subsequence;

    fn replay(n: usize, seq: &OperationSequence) -> Vec<usize> {
        let mut slides: Vec<usize> = (1..=n).collect();
        seq.replay(&mut slides, &[]).unwrap();
        slides
    }

    #[test]
    fn test_backward_then_recomputed_forward() {
        let requests = [MoveRequest::new(5, 1), MoveRequest::new(1, 5)];
        let seq = Planner::new(5).plan(&requests).unwrap();

        assert_eq!(
            seq.as_slice(),
            &[
                Operation::Move { from: 5, to: 1 },
                Operation::Move { from: 2, to: 5 },
            ]
        );
        assert_eq!(replay(5, &seq), vec![5, 2, 3, 4, 1]);
    }

    #[test]
    fn test_swap_elides_landed_forward_move() {
        let requests = [MoveRequest::new(1, 2), MoveRequest::new(2, 1)];
        let seq = Planner::new(3).plan(&requests).unwrap();

        assert_eq!(seq.as_slice(), &[Operation::Move { from: 2, to: 1 }]);
        assert_eq!(replay(3, &seq), vec![2, 1, 3]);
    }

    #[test]
    fn test_forward_chain_uses_live_positions() {
        // Naive in-order application would leave slide 1 at position 1
        let requests = [MoveRequest::new(1, 2), MoveRequest::new(2, 3)];
        let seq = Planner::new(3).plan(&requests).unwrap();
        assert_eq!(replay(3, &seq), vec![3, 1, 2]);
    }

    #[test]
    fn test_backward_target_survives_forward_extraction() {
        let requests = [MoveRequest::new(3, 2), MoveRequest::new(1, 4)];
        let seq = Planner::new(4).plan(&requests).unwrap();
        assert_eq!(replay(4, &seq), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_displaced_stationary_slide_is_restored() {
        // Slide 3 must jump ahead of slide 2 even though 2 stays put
        let requests = [MoveRequest::new(1, 3), MoveRequest::new(2, 2)];
        let seq = Planner::new(3).plan(&requests).unwrap();
        let result = replay(3, &seq);
        assert_eq!(result[1], 2);
        assert_eq!(result[2], 1);
    }

    #[test]
    fn test_stationary_only_batch_is_empty() {
        let requests = [MoveRequest::new(2, 2), MoveRequest::new(4, 4)];
        let seq = Planner::new(4).plan(&requests).unwrap();
        assert!(seq.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        assert!(Planner::new(0).plan(&[]).unwrap().is_empty());
        assert!(Planner::new(7).plan(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_conflict_rejected() {
        let err = Planner::new(3)
            .plan(&[MoveRequest::new(1, 3), MoveRequest::new(2, 3)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = Planner::new(3).plan(&[MoveRequest::new(1, 9)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }

    #[test]
    fn test_final_arrangement() {
        let planner = Planner::new(5);
        let arrangement = planner
            .final_arrangement(&[MoveRequest::new(5, 1), MoveRequest::new(1, 5)])
            .unwrap();
        assert_eq!(arrangement, vec![5, 2, 3, 4, 1]);
    }

    #[test]
    fn test_plan_merge_bounds() {
        assert!(plan_merge(3, 4, MergeRequest::new(1, 1)).is_ok());
        assert!(plan_merge(3, 4, MergeRequest::new(3, 5)).is_ok());

        let err = plan_merge(3, 4, MergeRequest::new(4, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
        let err = plan_merge(3, 4, MergeRequest::new(1, 6)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
        let err = plan_merge(3, 4, MergeRequest::new(1, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }

    #[test]
    fn test_plan_merge_into_empty_target() {
        let seq = plan_merge(2, 0, MergeRequest::new(2, 1)).unwrap();
        assert_eq!(seq.as_slice(), &[Operation::CopyPaste { source: 2, at: 1 }]);
    }

    fn batch_strategy() -> impl Strategy<Value = (usize, Vec<MoveRequest>)> {
        (1usize..=12)
            .prop_flat_map(|n| {
                let positions: Vec<usize> = (1..=n).collect();
                (Just(n), subsequence(positions, 0..=n))
            })
            .prop_flat_map(|(n, origins)| {
                let positions: Vec<usize> = (1..=n).collect();
                let k = origins.len();
                (Just(n), Just(origins), subsequence(positions, k).prop_shuffle())
            })
            .prop_map(|(n, origins, targets)| {
                let requests = origins
                    .into_iter()
                    .zip(targets)
                    .map(|(from, to)| MoveRequest::new(from, to))
                    .collect();
                (n, requests)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_plan_realizes_requested_arrangement((n, requests) in batch_strategy()) {
            let planner = Planner::new(n);
            let seq = planner.plan(&requests).unwrap();
            let result = replay(n, &seq);

            for req in &requests {
                prop_assert_eq!(result[req.to - 1], req.from, "slide {} misplaced", req.from);
            }

            let named: Vec<usize> = requests.iter().map(|r| r.from).collect();
            let untouched: Vec<usize> = result.iter().copied().filter(|s| !named.contains(s)).collect();
            let mut sorted = untouched.clone();
            sorted.sort_unstable();
            prop_assert_eq!(untouched, sorted);

            prop_assert!(seq.len() <= requests.len());
        }

        #[test]
        fn prop_only_named_slides_are_moved((n, requests) in batch_strategy()) {
            let seq = Planner::new(n).plan(&requests).unwrap();
            let named: Vec<usize> = requests.iter().map(|r| r.from).collect();
            let mut slides: Vec<usize> = (1..=n).collect();
            for op in &seq {
                if let Operation::Move { from, to } = *op {
                    prop_assert!(named.contains(&slides[from - 1]));
                    let slide = slides.remove(from - 1);
                    slides.insert(to - 1, slide);
                }
            }
        }

        #[test]
        fn prop_plan_is_deterministic((n, requests) in batch_strategy()) {
            let planner = Planner::new(n);
            prop_assert_eq!(planner.plan(&requests).unwrap(), planner.plan(&requests).unwrap());
        }
    }
}
