/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::GlobalIndexSet;
use super::IndexSet;
use super::view_index;
use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::pattern::Pattern;
use crate::size::ViewSpec;

/// The blocks of a pattern that overlap a region, as linear indices
/// into the pattern's block grid.
#[derive(Debug)]
pub struct IndexSetBlocks<'a, P: Pattern> {
    pattern: &'a P,
    domain: ViewSpec,
    first_block: Vec<usize>,
    blocks: CartesianIndexSpace,
}

impl<'a, P: Pattern> IndexSetBlocks<'a, P> {
    pub(crate) fn new(pattern: &'a P, domain: ViewSpec) -> Self {
        let core = pattern.core();
        let arrangement = core.arrangement();
        if domain.is_empty() {
            return Self {
                pattern,
                first_block: vec![0; domain.ndim()],
                blocks: CartesianIndexSpace::new(vec![0; domain.ndim()], arrangement),
                domain,
            };
        }
        let last: Vec<usize> = domain
            .offsets()
            .iter()
            .zip(domain.extents())
            .map(|(offset, extent)| offset + extent - 1)
            .collect();
        let first_block = core.block_coords(domain.offsets());
        let last_block = core.block_coords(&last);
        let extents: Vec<usize> = first_block
            .iter()
            .zip(&last_block)
            .map(|(first, last)| last - first + 1)
            .collect();
        Self {
            pattern,
            domain,
            first_block,
            blocks: CartesianIndexSpace::new(extents, arrangement),
        }
    }

    /// The domain's elements inside the `pos`-th block of this set.
    pub fn block(&self, pos: usize) -> Result<IndexSetBlock<'a, P>, PatternError> {
        let total = self.size();
        if pos >= total {
            return Err(PatternError::IndexOutOfRange { index: pos, total });
        }
        let view = self.pattern.block(self.index(pos))?.intersect(&self.domain)?;
        Ok(IndexSetBlock {
            pattern: self.pattern,
            view,
        })
    }
}

impl<P: Pattern> IndexSet for IndexSetBlocks<'_, P> {
    fn size(&self) -> usize {
        self.blocks.size()
    }

    fn index(&self, pos: usize) -> usize {
        let coords: Vec<usize> = self
            .blocks
            .delinearize(pos)
            .iter()
            .zip(&self.first_block)
            .map(|(c, first)| c + first)
            .collect();
        self.pattern.blockspec().linearize(&coords)
    }

    fn extents(&self) -> Vec<usize> {
        self.blocks.extents().to_vec()
    }
}

/// The part of a region that falls inside one block.
#[derive(Debug)]
pub struct IndexSetBlock<'a, P: Pattern> {
    pattern: &'a P,
    view: ViewSpec,
}

impl<P: Pattern> Clone for IndexSetBlock<'_, P> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern,
            view: self.view.clone(),
        }
    }
}

impl<P: Pattern> IndexSet for IndexSetBlock<'_, P> {
    fn size(&self) -> usize {
        self.view.size()
    }

    fn index(&self, pos: usize) -> usize {
        view_index(self.pattern, &self.view, pos)
    }

    fn extents(&self) -> Vec<usize> {
        self.view.extents().to_vec()
    }
}

impl<'a, P: Pattern> GlobalIndexSet<'a> for IndexSetBlock<'a, P> {
    type Pattern = P;

    fn pattern(&self) -> &'a P {
        self.pattern
    }

    fn viewspec(&self) -> &ViewSpec {
        &self.view
    }
}
