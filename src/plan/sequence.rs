//! Operation sequences produced by the planner and executed by the driver.
use std::fmt;

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// One elementary host call.
///
/// Indices are 1-based positions in the document *at the moment the
/// operation executes*, not in the original ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Move the slide currently at `from` so that it ends at `to`.
    Move { from: usize, to: usize },
    /// Copy slide `source` of the donor document and paste it at `at`.
    CopyPaste { source: usize, at: usize },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Move { from, to } => write!(f, "move {} -> {}", from, to),
            Operation::CopyPaste { source, at } => write!(f, "copy {} -> paste at {}", source, at),
        }
    }
}

/// Ordered list of operations to execute verbatim against a live document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSequence {
    ops: SmallVec<[Operation; 8]>,
}

impl OperationSequence {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Operation] {
        &self.ops
    }

    /// Apply the sequence to an in-memory ordering, the way a host would.
    ///
    /// `slides` is mutated in place. `donor` supplies the slides for
    /// [`Operation::CopyPaste`]; it may be empty when the sequence only moves.
    ///
    /// # Example
    ///
    /// ```
    /// use slideshift::plan::{Operation, OperationSequence};
    ///
    /// let mut seq = OperationSequence::new();
    /// seq.push(Operation::Move { from: 3, to: 1 });
    /// let mut slides = vec!['a', 'b', 'c'];
    /// seq.replay(&mut slides, &[])?;
    /// assert_eq!(slides, vec!['c', 'a', 'b']);
    /// # Ok::<(), slideshift::Error>(())
    /// ```
    pub fn replay<T: Clone>(&self, slides: &mut Vec<T>, donor: &[T]) -> Result<()> {
        for (i, op) in self.ops.iter().enumerate() {
            match *op {
                Operation::Move { from, to } => {
                    if from == 0 || to == 0 || from > slides.len() || to > slides.len() {
                        return Err(Error::InvalidRange(format!(
                            "step {}: {} does not fit {} slides",
                            i + 1,
                            op,
                            slides.len()
                        )));
                    }
                    let slide = slides.remove(from - 1);
                    slides.insert(to - 1, slide);
                },
                Operation::CopyPaste { source, at } => {
                    if source == 0 || source > donor.len() || at == 0 || at > slides.len() + 1 {
                        return Err(Error::InvalidRange(format!(
                            "step {}: {} does not fit {} donor / {} target slides",
                            i + 1,
                            op,
                            donor.len(),
                            slides.len()
                        )));
                    }
                    slides.insert(at - 1, donor[source - 1].clone());
                },
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a OperationSequence {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl FromIterator<Operation> for OperationSequence {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for OperationSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_move_forward_and_back() {
        let seq: OperationSequence = [
            Operation::Move { from: 1, to: 3 },
            Operation::Move { from: 3, to: 2 },
        ]
        .into_iter()
        .collect();
        let mut slides = vec![1, 2, 3, 4];
        seq.replay(&mut slides, &[]).unwrap();
        // [1,2,3,4] -> [2,3,1,4] -> [2,1,3,4]
        assert_eq!(slides, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_replay_copy_paste_append() {
        let seq: OperationSequence = [Operation::CopyPaste { source: 2, at: 3 }].into_iter().collect();
        let mut slides = vec!["b1", "b2"];
        seq.replay(&mut slides, &["a1", "a2"]).unwrap();
        assert_eq!(slides, vec!["b1", "b2", "a2"]);
    }

    #[test]
    fn test_replay_rejects_out_of_range() {
        let seq: OperationSequence = [Operation::Move { from: 4, to: 1 }].into_iter().collect();
        let mut slides = vec![1, 2, 3];
        assert!(seq.replay(&mut slides, &[]).is_err());
    }

    #[test]
    fn test_display() {
        let seq: OperationSequence = [
            Operation::Move { from: 5, to: 1 },
            Operation::CopyPaste { source: 2, at: 4 },
        ]
        .into_iter()
        .collect();
        assert_eq!(seq.to_string(), "move 5 -> 1; copy 2 -> paste at 4");
    }
}
