/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::GlobalIndexSet;
use super::IndexSet;
use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::pattern::Pattern;
use crate::size::ViewSpec;

/// A domain with one dimension narrowed to `begin..end`.
#[derive(Debug)]
pub struct IndexSetSub<'d, D> {
    domain: &'d D,
    view: ViewSpec,
    map: IndexSetSubPreimage,
}

impl<'a, 'd, D: GlobalIndexSet<'a>> IndexSetSub<'d, D> {
    pub(crate) fn new(
        domain: &'d D,
        dim: usize,
        begin: usize,
        end: usize,
    ) -> Result<Self, PatternError> {
        let view = domain.viewspec().select(dim, begin, end)?;
        let arrangement = domain.pattern().memory_layout().arrangement();
        let map = IndexSetSubPreimage {
            image: CartesianIndexSpace::new(view.extents().to_vec(), arrangement),
            domain: CartesianIndexSpace::new(domain.viewspec().extents().to_vec(), arrangement),
            dim,
            begin,
        };
        Ok(Self { domain, view, map })
    }

    pub fn domain(&self) -> &'d D {
        self.domain
    }

    /// Maps positions of this set to positions of its domain.
    pub fn pre(&self) -> IndexSetSubPreimage {
        self.map.clone()
    }

    /// Position in this set of the domain's position `domain_pos`, if
    /// it lies inside the narrowed range.
    pub fn inverse(&self, domain_pos: usize) -> Option<usize> {
        self.map.inverse(domain_pos)
    }
}

impl<D: IndexSet> IndexSet for IndexSetSub<'_, D> {
    fn size(&self) -> usize {
        self.view.size()
    }

    fn index(&self, pos: usize) -> usize {
        self.domain.index(self.map.index(pos))
    }

    fn extents(&self) -> Vec<usize> {
        self.view.extents().to_vec()
    }
}

impl<'a, D: GlobalIndexSet<'a>> GlobalIndexSet<'a> for IndexSetSub<'_, D> {
    type Pattern = D::Pattern;

    fn pattern(&self) -> &'a D::Pattern {
        self.domain.pattern()
    }

    fn viewspec(&self) -> &ViewSpec {
        &self.view
    }
}

/// The positions, within the domain of an [`IndexSetSub`], of each of
/// the sub set's positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSetSubPreimage {
    image: CartesianIndexSpace,
    domain: CartesianIndexSpace,
    dim: usize,
    begin: usize,
}

impl IndexSetSubPreimage {
    /// Shift a domain position back by `-begin` in the narrowed
    /// dimension.
    pub fn inverse(&self, domain_pos: usize) -> Option<usize> {
        if domain_pos >= self.domain.size() {
            return None;
        }
        let mut coords = self.domain.delinearize(domain_pos);
        coords[self.dim] = coords[self.dim].checked_sub(self.begin)?;
        self.image
            .contains(&coords)
            .then(|| self.image.linearize(&coords))
    }
}

impl IndexSet for IndexSetSubPreimage {
    fn size(&self) -> usize {
        self.image.size()
    }

    fn index(&self, pos: usize) -> usize {
        let mut coords = self.image.delinearize(pos);
        coords[self.dim] += self.begin;
        self.domain.linearize(&coords)
    }

    fn extents(&self) -> Vec<usize> {
        self.image.extents().to_vec()
    }
}
