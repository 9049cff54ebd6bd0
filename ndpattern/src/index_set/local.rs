/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use itertools::izip;

use super::IndexSet;
use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::pattern::LocalMemoryLayout;
use crate::pattern::Pattern;
use crate::size::ViewSpec;

/// The elements of a global region held by one unit, as offsets into
/// that unit's local memory.
///
/// A unit's elements inside a rectangular region always form a
/// rectangle of its local index space, so the set is stored as that
/// rectangle and linearized through the unit's [`LocalMemoryLayout`].
#[derive(Debug)]
pub struct IndexSetLocal<'a, P: Pattern> {
    pattern: &'a P,
    unit: usize,
    unit_coords: Vec<usize>,
    domain: ViewSpec,
    begin: Vec<usize>,
    space: CartesianIndexSpace,
    layout: LocalMemoryLayout,
}

impl<'a, P: Pattern> IndexSetLocal<'a, P> {
    pub(crate) fn new(pattern: &'a P, domain: ViewSpec, unit: usize) -> Result<Self, PatternError> {
        pattern.core().check_unit(unit)?;
        if !pattern.is_rectangular() {
            return Err(PatternError::NonRectangular {
                reason: format!("{} pattern has no local index rectangle", pattern.kind()),
            });
        }
        let layout = pattern.local_memory_layout(unit)?;
        let unit_coords = pattern.teamspec().coords(unit)?;

        let (begin, extents): (Vec<usize>, Vec<usize>) = izip!(
            domain.offsets(),
            domain.extents(),
            &unit_coords,
            pattern.blocksize_spec().extents(),
            pattern.teamspec().extents()
        )
        .map(|(&offset, &extent, &u, &b, &nunits)| {
            let lbegin = owned_before(offset, u, b, nunits);
            let lend = owned_before(offset + extent, u, b, nunits);
            (lbegin, lend - lbegin)
        })
        .unzip();

        tracing::trace!(
            "local index set of unit {} over {}: {:?} + {:?}",
            unit,
            domain,
            begin,
            extents
        );
        Ok(Self {
            pattern,
            unit,
            unit_coords,
            domain,
            begin,
            space: CartesianIndexSpace::new(extents, pattern.memory_layout().arrangement()),
            layout,
        })
    }

    pub fn pattern(&self) -> &'a P {
        self.pattern
    }

    pub fn unit(&self) -> usize {
        self.unit
    }

    /// The global region this set was taken from.
    pub fn domain(&self) -> &ViewSpec {
        &self.domain
    }

    /// First local coordinates of the set in each dimension.
    pub fn local_offsets(&self) -> &[usize] {
        &self.begin
    }

    /// Local coordinates of position `pos`.
    fn local_coords(&self, pos: usize) -> Vec<usize> {
        self.space
            .delinearize(pos)
            .iter()
            .zip(&self.begin)
            .map(|(c, b)| c + b)
            .collect()
    }

    pub fn local(&self) -> Self {
        self.clone()
    }

    /// The same elements as global indices.
    pub fn global(&self) -> IndexSetGlobal<'a, P> {
        IndexSetGlobal {
            local: self.clone(),
        }
    }

    pub fn pre(&self) -> IndexSetGlobal<'a, P> {
        self.global()
    }
}

/// Number of coordinates below `x` that the unit at offset `u` owns in
/// a dimension cut into blocks of `b` dealt round-robin over `nunits`.
fn owned_before(x: usize, u: usize, b: usize, nunits: usize) -> usize {
    let period = nunits * b;
    (x / period) * b + (x % period).saturating_sub(u * b).min(b)
}

impl<P: Pattern> Clone for IndexSetLocal<'_, P> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern,
            unit: self.unit,
            unit_coords: self.unit_coords.clone(),
            domain: self.domain.clone(),
            begin: self.begin.clone(),
            space: self.space.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<P: Pattern + PartialEq> PartialEq for IndexSetLocal<'_, P> {
    fn eq(&self, other: &Self) -> bool {
        (std::ptr::eq(self.pattern, other.pattern) || self.pattern == other.pattern)
            && self.unit == other.unit
            && self.domain == other.domain
            && self.begin == other.begin
            && self.space == other.space
    }
}

impl<P: Pattern> IndexSet for IndexSetLocal<'_, P> {
    fn size(&self) -> usize {
        self.space.size()
    }

    fn index(&self, pos: usize) -> usize {
        self.layout.linearize(&self.local_coords(pos))
    }

    fn extents(&self) -> Vec<usize> {
        self.space.extents().to_vec()
    }
}

/// The global indices of an [`IndexSetLocal`], in the same order.
#[derive(Debug)]
pub struct IndexSetGlobal<'a, P: Pattern> {
    local: IndexSetLocal<'a, P>,
}

impl<'a, P: Pattern> IndexSetGlobal<'a, P> {
    pub fn unit(&self) -> usize {
        self.local.unit
    }

    pub fn local(&self) -> IndexSetLocal<'a, P> {
        self.local.clone()
    }

    pub fn pre(&self) -> IndexSetLocal<'a, P> {
        self.local()
    }

    /// Local offset of the element at global index `global_index` if
    /// this set's unit owns it.
    pub fn local_offset_of(&self, global_index: usize) -> Result<Option<usize>, PatternError> {
        let local = self.local.pattern.local(global_index)?;
        Ok((local.unit == self.local.unit).then_some(local.index))
    }
}

impl<P: Pattern> Clone for IndexSetGlobal<'_, P> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
        }
    }
}

impl<P: Pattern> IndexSet for IndexSetGlobal<'_, P> {
    fn size(&self) -> usize {
        self.local.size()
    }

    fn index(&self, pos: usize) -> usize {
        let core = self.local.pattern.core();
        let global =
            core.grid_global_coords(&self.local.unit_coords, &self.local.local_coords(pos));
        core.memory_layout().linearize(&global)
    }

    fn extents(&self) -> Vec<usize> {
        self.local.extents()
    }
}
