/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Patterns: the mapping between global coordinates and
//! `(unit, local offset)` pairs.
//!
//! A pattern is built from a [`PatternSpec`] (the size, distribution
//! and team specs of an index space) and the [`Team`] whose units will
//! hold the data. Every unit builds the same pattern from the same
//! inputs; the only thing that differs between units is
//! [`Pattern::myid`], which selects the cached local extents.
//!
//! Three variants exist:
//!
//! - [`BlockPattern`] stores each unit's elements in canonical
//!   row-/column-major order and supports every distribution.
//! - [`TilePattern`] stores each unit's blocks one after another and
//!   requires every block to be full.
//! - [`ShiftTilePattern`] deals blocks out along diagonals, so every
//!   unit occurs once in every run of `nunits` consecutive blocks.
//!
//! [`AnyPattern`] holds one of them, chosen once at construction.

use serde::Deserialize;
use serde::Serialize;

use crate::cartesian::CartesianIndexSpace;
use crate::cartesian::MemArrange;
use crate::distribution::DistributionSpec;
use crate::error::PatternError;
use crate::error::check_dims;
use crate::properties::PatternKind;
use crate::size::SizeSpec;
use crate::size::ViewSpec;
use crate::team::Team;
use crate::team::TeamSpec;
use crate::team::broadcast;

mod base;
mod block;
mod layout;
mod shift_tile;
mod tile;

pub use base::BlockSizeSpec;
pub use base::BlockSpec;
pub use base::PatternCore;
pub use block::BlockPattern;
pub use layout::LocalMemoryLayout;
pub use shift_tile::ShiftTilePattern;
pub use tile::TilePattern;

/// Everything needed to build a pattern, apart from the team.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PatternSpec {
    pub sizespec: SizeSpec,
    pub distspec: DistributionSpec,
    pub teamspec: TeamSpec,
    pub arrangement: MemArrange,
}

impl PatternSpec {
    /// A row-major pattern spec. All three specs must have the same
    /// number of dimensions.
    pub fn new(
        sizespec: SizeSpec,
        distspec: DistributionSpec,
        teamspec: TeamSpec,
    ) -> Result<Self, PatternError> {
        check_dims(sizespec.ndim(), distspec.ndim())?;
        check_dims(sizespec.ndim(), teamspec.ndim())?;
        Ok(Self {
            sizespec,
            distspec,
            teamspec,
            arrangement: MemArrange::RowMajor,
        })
    }

    /// Arrange all units of `team` along the first distributed
    /// dimension of `distspec`.
    pub fn with_distribution(
        sizespec: SizeSpec,
        distspec: DistributionSpec,
        team: &dyn Team,
    ) -> Result<Self, PatternError> {
        let teamspec = TeamSpec::from_distribution(&distspec, team);
        Self::new(sizespec, distspec, teamspec)
    }

    /// The default distribution and team arrangement: blocked over all
    /// units in the first dimension.
    pub fn with_defaults(sizespec: SizeSpec, team: &dyn Team) -> Self {
        let ndim = sizespec.ndim();
        Self {
            sizespec,
            distspec: DistributionSpec::default_for(ndim),
            teamspec: TeamSpec::default_for(ndim, team),
            arrangement: MemArrange::RowMajor,
        }
    }

    pub fn with_arrangement(mut self, arrangement: MemArrange) -> Self {
        self.arrangement = arrangement;
        self
    }

    pub fn ndim(&self) -> usize {
        self.sizespec.ndim()
    }

    /// Make every unit of `team` agree on the spec held by `root`.
    pub fn synchronize(&self, team: &dyn Team, root: usize) -> Result<Self, PatternError> {
        let spec = broadcast(team, self, root)?;
        team.barrier()?;
        Ok(spec)
    }
}

/// The location of an element: its owning unit and its offset in that
/// unit's local memory.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct LocalIndex {
    pub unit: usize,
    pub index: usize,
}

/// The mapping from global coordinates to units and local offsets.
///
/// Coordinates passed to the `*_view` methods are relative to the
/// given view; the other methods use the pattern's own view, which
/// covers the whole index space.
pub trait Pattern {
    /// State shared by all variants.
    fn core(&self) -> &PatternCore;

    fn kind(&self) -> PatternKind;

    /// The unit owning the element at `coords`.
    fn unit_at_view(&self, coords: &[usize], view: &ViewSpec) -> Result<usize, PatternError>;

    /// Local offset, within its owning unit, of the element at `coords`.
    fn index_to_elem_view(&self, coords: &[usize], view: &ViewSpec)
    -> Result<usize, PatternError>;

    /// Global linear index of the element at offset `local` of `unit`.
    fn local_to_global_index(&self, unit: usize, local: usize) -> Result<usize, PatternError>;

    /// Extents of `unit`'s local index space.
    fn local_extents_of(&self, unit: usize) -> Result<Vec<usize>, PatternError>;

    /// Number of elements `unit` holds.
    fn local_size_of(&self, unit: usize) -> Result<usize, PatternError>;

    /// Upper bound on the number of elements any unit holds.
    fn max_elem_per_unit(&self) -> usize;

    /// Whether every unit's elements form a rectangle in its local
    /// index space, so that local coordinates are meaningful.
    fn is_rectangular(&self) -> bool;

    /// `unit`'s storage order. Fails for non-rectangular patterns.
    fn local_memory_layout(&self, unit: usize) -> Result<LocalMemoryLayout, PatternError>;

    /// Local offset of the element at `local_coords` of `unit`.
    fn local_at(&self, unit: usize, local_coords: &[usize]) -> Result<usize, PatternError> {
        self.local_memory_layout(unit)?.at(local_coords)
    }

    fn unit_at(&self, coords: &[usize]) -> Result<usize, PatternError> {
        self.unit_at_view(coords, self.viewspec())
    }

    fn index_to_elem(&self, coords: &[usize]) -> Result<usize, PatternError> {
        self.index_to_elem_view(coords, self.viewspec())
    }

    /// Alias for [`Pattern::index_to_elem`].
    fn at(&self, coords: &[usize]) -> Result<usize, PatternError> {
        self.index_to_elem(coords)
    }

    /// Owner and local offset of the element at global linear index
    /// `global_index`.
    fn local(&self, global_index: usize) -> Result<LocalIndex, PatternError> {
        let coords = self.coords(global_index)?;
        Ok(LocalIndex {
            unit: self.unit_at(&coords)?,
            index: self.index_to_elem(&coords)?,
        })
    }

    /// Global coordinates of the element at offset `local` of `unit`.
    fn global(&self, unit: usize, local: usize) -> Result<Vec<usize>, PatternError> {
        self.coords(self.local_to_global_index(unit, local)?)
    }

    fn is_local(&self, global_index: usize, unit: usize) -> Result<bool, PatternError> {
        Ok(self.local(global_index)?.unit == unit)
    }

    /// Global coordinates of global linear index `index`.
    fn coords(&self, index: usize) -> Result<Vec<usize>, PatternError> {
        self.memory_layout().coords(index)
    }

    /// Linear index, in the block grid, of the block holding `coords`.
    fn block_at(&self, coords: &[usize]) -> Result<usize, PatternError> {
        let core = self.core();
        let abs = core.absolute_coords(coords, core.viewspec())?;
        Ok(core.blockspec().linearize(&core.block_coords(&abs)))
    }

    /// The region covered by block `block_index`.
    fn block(&self, block_index: usize) -> Result<ViewSpec, PatternError> {
        self.core().block_view(block_index)
    }

    fn local_size(&self) -> usize {
        self.core().local_size()
    }

    fn local_extents(&self) -> &[usize] {
        self.core().local_extents()
    }

    /// The calling unit's local extent in dimension `dim`.
    fn local_extent(&self, dim: usize) -> Result<usize, PatternError> {
        self.local_extents()
            .get(dim)
            .copied()
            .ok_or(PatternError::DimensionOutOfRange {
                dim,
                ndims: self.ndim(),
            })
    }

    /// Total number of elements.
    fn capacity(&self) -> usize {
        self.sizespec().size()
    }

    fn size(&self) -> usize {
        self.capacity()
    }

    fn ndim(&self) -> usize {
        self.core().ndim()
    }

    fn extent(&self, dim: usize) -> Result<usize, PatternError> {
        self.sizespec().extent(dim)
    }

    fn nunits(&self) -> usize {
        self.core().nunits()
    }

    fn myid(&self) -> usize {
        self.core().myid()
    }

    /// Size of a full block in dimension `dim`.
    fn blocksize(&self, dim: usize) -> Result<usize, PatternError> {
        self.blocksize_spec().extent(dim)
    }

    fn max_blocksize(&self) -> usize {
        self.core().max_blocksize()
    }

    /// Number of blocks in dimension `dim`.
    fn nblocks(&self, dim: usize) -> Result<usize, PatternError> {
        self.blockspec().extent(dim)
    }

    /// Total number of blocks.
    fn num_blocks(&self) -> usize {
        self.blockspec().size()
    }

    /// Number of elements in the last, possibly short, block of
    /// dimension `dim`; zero if all blocks are full.
    fn overflow_blocksize(&self, dim: usize) -> Result<usize, PatternError> {
        Ok(self.extent(dim)? % self.blocksize(dim)?)
    }

    /// Number of elements missing from the last block of dimension
    /// `dim`.
    fn underflow_blocksize(&self, dim: usize) -> Result<usize, PatternError> {
        let overflow = self.overflow_blocksize(dim)?;
        if overflow == 0 {
            Ok(0)
        } else {
            Ok(self.blocksize(dim)? - overflow)
        }
    }

    fn sizespec(&self) -> &SizeSpec {
        self.core().sizespec()
    }

    fn distspec(&self) -> &DistributionSpec {
        self.core().distspec()
    }

    fn teamspec(&self) -> &TeamSpec {
        self.core().teamspec()
    }

    fn memory_layout(&self) -> &CartesianIndexSpace {
        self.core().memory_layout()
    }

    fn viewspec(&self) -> &ViewSpec {
        self.core().viewspec()
    }

    fn blockspec(&self) -> &BlockSpec {
        self.core().blockspec()
    }

    fn blocksize_spec(&self) -> &BlockSizeSpec {
        self.core().blocksize_spec()
    }
}

/// One of the pattern variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnyPattern {
    Block(BlockPattern),
    Tile(TilePattern),
    ShiftTile(ShiftTilePattern),
}

impl AnyPattern {
    /// Build the variant named by `kind`.
    pub fn new(
        kind: PatternKind,
        spec: PatternSpec,
        team: &dyn Team,
    ) -> Result<Self, PatternError> {
        Ok(match kind {
            PatternKind::Block => AnyPattern::Block(BlockPattern::new(spec, team)?),
            PatternKind::Tile => AnyPattern::Tile(TilePattern::new(spec, team)?),
            PatternKind::ShiftTile => AnyPattern::ShiftTile(ShiftTilePattern::new(spec, team)?),
        })
    }
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $e:expr) => {
        match $self {
            AnyPattern::Block($p) => $e,
            AnyPattern::Tile($p) => $e,
            AnyPattern::ShiftTile($p) => $e,
        }
    };
}

impl Pattern for AnyPattern {
    fn core(&self) -> &PatternCore {
        dispatch!(self, p => p.core())
    }

    fn kind(&self) -> PatternKind {
        dispatch!(self, p => p.kind())
    }

    fn unit_at_view(&self, coords: &[usize], view: &ViewSpec) -> Result<usize, PatternError> {
        dispatch!(self, p => p.unit_at_view(coords, view))
    }

    fn index_to_elem_view(
        &self,
        coords: &[usize],
        view: &ViewSpec,
    ) -> Result<usize, PatternError> {
        dispatch!(self, p => p.index_to_elem_view(coords, view))
    }

    fn local_to_global_index(&self, unit: usize, local: usize) -> Result<usize, PatternError> {
        dispatch!(self, p => p.local_to_global_index(unit, local))
    }

    fn local_extents_of(&self, unit: usize) -> Result<Vec<usize>, PatternError> {
        dispatch!(self, p => p.local_extents_of(unit))
    }

    fn local_size_of(&self, unit: usize) -> Result<usize, PatternError> {
        dispatch!(self, p => p.local_size_of(unit))
    }

    fn max_elem_per_unit(&self) -> usize {
        dispatch!(self, p => p.max_elem_per_unit())
    }

    fn is_rectangular(&self) -> bool {
        dispatch!(self, p => p.is_rectangular())
    }

    fn local_memory_layout(&self, unit: usize) -> Result<LocalMemoryLayout, PatternError> {
        dispatch!(self, p => p.local_memory_layout(unit))
    }

    fn local_at(&self, unit: usize, local_coords: &[usize]) -> Result<usize, PatternError> {
        dispatch!(self, p => p.local_at(unit, local_coords))
    }
}
