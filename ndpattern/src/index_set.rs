/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Lazy views over the index space of a pattern.
//!
//! An index set is an ordered sequence of indices computed on demand
//! from a pattern and a few scalars; nothing is materialized. Sets
//! compose: a [`IndexSetSub`] narrows another set, an
//! [`IndexSetLocal`] restricts a set to the elements one unit holds,
//! an [`IndexSetGlobal`] maps those back to global indices, and
//! [`IndexSetBlocks`] enumerates the pattern's blocks overlapping a
//! set.
//!
//! ```
//! # use ndpattern::*;
//! let team = StaticTeam::new(2, 0).unwrap();
//! let spec = PatternSpec::with_defaults(SizeSpec::new(vec![20]).unwrap(), &team);
//! let pattern = BlockPattern::new(spec, &team).unwrap();
//!
//! let all = IndexSetIdentity::new(&pattern);
//! let sub = all.sub(0, 5, 15).unwrap();
//! assert!(sub.iter().eq(5..15));
//!
//! // Unit 0 holds 0..10, so its part of 5..15 is local 5..10.
//! let local = sub.local().unwrap();
//! assert!(local.iter().eq(5..10));
//! assert!(local.global().iter().eq(5..10));
//! ```

use std::ops::Range;

use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::pattern::Pattern;
use crate::size::ViewSpec;

mod blocks;
mod identity;
mod local;
mod sub;

pub use blocks::IndexSetBlock;
pub use blocks::IndexSetBlocks;
pub use identity::IndexSetIdentity;
pub use local::IndexSetGlobal;
pub use local::IndexSetLocal;
pub use sub::IndexSetSub;
pub use sub::IndexSetSubPreimage;

/// An ordered, randomly accessible sequence of indices.
pub trait IndexSet {
    /// Number of indices in the set.
    fn size(&self) -> usize;

    /// The index at position `pos`. Requires `pos < size()`; use
    /// [`IndexSet::get`] for a checked lookup.
    fn index(&self, pos: usize) -> usize;

    /// Extents of the set when viewed as a rectangle.
    fn extents(&self) -> Vec<usize>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn get(&self, pos: usize) -> Option<usize> {
        (pos < self.size()).then(|| self.index(pos))
    }

    fn first(&self) -> Option<usize> {
        self.get(0)
    }

    fn last(&self) -> Option<usize> {
        self.size().checked_sub(1).map(|pos| self.index(pos))
    }

    fn iter(&self) -> IndexSetIter<'_, Self>
    where
        Self: Sized,
    {
        IndexSetIter::new(self, 1)
    }

    /// Iterate every `stride`-th index; a negative stride iterates
    /// backwards from the last index.
    fn step(&self, stride: isize) -> Result<IndexSetIter<'_, Self>, PatternError>
    where
        Self: Sized,
    {
        if stride == 0 {
            return Err(PatternError::invalid("stride must be non-zero"));
        }
        Ok(IndexSetIter::new(self, stride))
    }
}

/// An index set over a rectangular region of a pattern's global index
/// space, yielding global linear indices.
pub trait GlobalIndexSet<'a>: IndexSet {
    type Pattern: Pattern + 'a;

    fn pattern(&self) -> &'a Self::Pattern;

    /// The region covered, in global coordinates.
    fn viewspec(&self) -> &ViewSpec;

    /// The part of this set held by the calling unit.
    fn local(&self) -> Result<IndexSetLocal<'a, Self::Pattern>, PatternError> {
        self.local_of(self.pattern().myid())
    }

    /// The part of this set held by `unit`.
    fn local_of(&self, unit: usize) -> Result<IndexSetLocal<'a, Self::Pattern>, PatternError> {
        IndexSetLocal::new(self.pattern(), self.viewspec().clone(), unit)
    }

    /// Restrict dimension `dim` to positions `begin..end` of this set.
    fn sub(
        &self,
        dim: usize,
        begin: usize,
        end: usize,
    ) -> Result<IndexSetSub<'_, Self>, PatternError>
    where
        Self: Sized,
    {
        IndexSetSub::new(self, dim, begin, end)
    }

    /// The pattern's blocks overlapping this set.
    fn blocks(&self) -> IndexSetBlocks<'a, Self::Pattern> {
        IndexSetBlocks::new(self.pattern(), self.viewspec().clone())
    }
}

/// Global linear index of position `pos` in `view`, enumerating the
/// view in the pattern's storage order.
pub(crate) fn view_index<P: Pattern + ?Sized>(pattern: &P, view: &ViewSpec, pos: usize) -> usize {
    let layout = pattern.memory_layout();
    let coords: Vec<usize> = CartesianIndexSpace::new(view.extents().to_vec(), layout.arrangement())
        .delinearize(pos)
        .iter()
        .zip(view.offsets())
        .map(|(c, offset)| c + offset)
        .collect();
    layout.linearize(&coords)
}

/// Random-access iterator over an [`IndexSet`]. Cloning restarts
/// nothing; a clone continues from the same position independently.
pub struct IndexSetIter<'s, S: IndexSet> {
    set: &'s S,
    stride: isize,
    front: usize,
    back: usize,
}

impl<'s, S: IndexSet> IndexSetIter<'s, S> {
    fn new(set: &'s S, stride: isize) -> Self {
        let count = set.size().div_ceil(stride.unsigned_abs());
        Self {
            set,
            stride,
            front: 0,
            back: count,
        }
    }

    /// Number of elements of a full traversal.
    pub fn count_total(&self) -> usize {
        self.set.size().div_ceil(self.stride.unsigned_abs())
    }

    fn offset_of(&self, k: usize) -> usize {
        let step = self.stride.unsigned_abs();
        if self.stride > 0 {
            k * step
        } else {
            self.set.size() - 1 - k * step
        }
    }

    /// The `k`-th index of a full traversal, regardless of the
    /// iterator's current position. `at(count_total())` is the
    /// past-the-end index, extrapolated from the last element.
    pub fn at(&self, k: usize) -> Option<usize> {
        let count = self.count_total();
        if k < count {
            return Some(self.set.index(self.offset_of(k)));
        }
        if k > count || count == 0 {
            return None;
        }
        let step = self.stride.unsigned_abs();
        let last_index = self.set.index(self.offset_of(count - 1));
        if self.stride > 0 {
            Some(last_index + step)
        } else {
            last_index.checked_sub(step)
        }
    }

    /// Return to the first element.
    pub fn restart(&mut self) {
        self.front = 0;
        self.back = self.count_total();
    }
}

impl<S: IndexSet> Clone for IndexSetIter<'_, S> {
    fn clone(&self) -> Self {
        Self {
            set: self.set,
            stride: self.stride,
            front: self.front,
            back: self.back,
        }
    }
}

impl<S: IndexSet> Iterator for IndexSetIter<'_, S> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let index = self.set.index(self.offset_of(self.front));
        self.front += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl<S: IndexSet> DoubleEndedIterator for IndexSetIter<'_, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.set.index(self.offset_of(self.back)))
    }
}

impl<S: IndexSet> ExactSizeIterator for IndexSetIter<'_, S> {}

/// The calling unit's local offsets of the global indices
/// `begin..end` of a one-dimensional pattern. Blocks dealt to a unit
/// are stored in order, so the result is a single range.
pub fn local_index_range<P: Pattern>(
    pattern: &P,
    begin: usize,
    end: usize,
) -> Result<Range<usize>, PatternError> {
    if pattern.ndim() != 1 {
        return Err(PatternError::InvalidDims {
            expected: 1,
            got: pattern.ndim(),
        });
    }
    let all = IndexSetIdentity::new(pattern);
    let sub = all.sub(0, begin, end)?;
    let local = sub.local()?;
    Ok(match (local.first(), local.last()) {
        (Some(first), Some(last)) => first..last + 1,
        _ => 0..0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::distribution::DistributionSpec;
    use crate::pattern::BlockPattern;
    use crate::pattern::PatternSpec;
    use crate::size::SizeSpec;
    use crate::team::StaticTeam;
    use crate::team::TeamSpec;

    fn pattern_1d(extent: usize, dist: Distribution, nunits: usize, myid: usize) -> BlockPattern {
        let team = StaticTeam::new(nunits, myid).unwrap();
        let spec = PatternSpec::new(
            SizeSpec::new(vec![extent]).unwrap(),
            DistributionSpec::new(vec![dist]).unwrap(),
            TeamSpec::new(vec![nunits], &team).unwrap(),
        )
        .unwrap();
        BlockPattern::new(spec, &team).unwrap()
    }

    #[test]
    fn test_iter_random_access() {
        let p = pattern_1d(10, Distribution::Blocked, 1, 0);
        let all = IndexSetIdentity::new(&p);
        let it = all.iter();
        assert_eq!(it.len(), 10);
        assert_eq!(it.at(3), Some(3));
        assert_eq!(it.at(10), Some(10));
        assert_eq!(it.at(11), None);
        assert!(it.clone().rev().eq((0..10).rev()));
        assert_eq!(all.first(), Some(0));
        assert_eq!(all.last(), Some(9));
    }

    #[test]
    fn test_iter_restart() {
        let p = pattern_1d(4, Distribution::Blocked, 1, 0);
        let all = IndexSetIdentity::new(&p);
        let mut it = all.iter();
        assert_eq!(it.next(), Some(0));
        assert_eq!(it.next(), Some(1));
        let resumed = it.clone();
        it.restart();
        assert!(it.eq(0..4));
        assert!(resumed.eq(2..4));
    }

    #[test]
    fn test_step() {
        let p = pattern_1d(10, Distribution::Blocked, 1, 0);
        let all = IndexSetIdentity::new(&p);
        assert!(all.step(3).unwrap().eq([0, 3, 6, 9]));
        assert!(all.step(4).unwrap().eq([0, 4, 8]));
        assert_eq!(all.step(4).unwrap().at(3), Some(12));
        assert!(all.step(-3).unwrap().eq([9, 6, 3, 0]));
        assert_eq!(all.step(-4).unwrap().at(3), None);
        assert!(all.step(0).is_err());
    }

    #[test]
    fn test_step_past_end_of_sub() {
        let p = pattern_1d(20, Distribution::Blocked, 1, 0);
        let all = IndexSetIdentity::new(&p);
        let sub = all.sub(0, 5, 15).unwrap();

        let forward = sub.step(4).unwrap();
        assert!(forward.clone().eq([5, 9, 13]));
        assert_eq!(forward.at(3), Some(17));

        let backward = sub.step(-4).unwrap();
        assert!(backward.clone().eq([14, 10, 6]));
        assert_eq!(backward.at(3), Some(2));
        assert_eq!(backward.at(4), None);
        assert!(sub.step(-3).unwrap().eq([14, 11, 8, 5]));
        assert_eq!(sub.step(-3).unwrap().at(4), Some(2));
    }

    #[test]
    fn test_empty_iter() {
        let p = pattern_1d(10, Distribution::Blocked, 1, 0);
        let all = IndexSetIdentity::new(&p);
        let empty = all.sub(0, 4, 4).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.iter().next(), None);
        assert_eq!(empty.iter().at(0), None);
        assert_eq!(empty.first(), None);
        assert_eq!(empty.last(), None);
    }

    #[test]
    fn test_local_index_range() {
        // Blocks of 2 over 3 units; unit 1 holds 2,3 8,9 14,15.
        let p = pattern_1d(16, Distribution::BlockCyclic(2), 3, 1);
        assert_eq!(local_index_range(&p, 0, 16).unwrap(), 0..6);
        assert_eq!(local_index_range(&p, 3, 9).unwrap(), 1..3);
        assert_eq!(local_index_range(&p, 3, 10).unwrap(), 1..4);
        assert_eq!(local_index_range(&p, 4, 8).unwrap(), 0..0);
        assert!(local_index_range(&p, 3, 17).is_err());
    }
}
