/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use itertools::izip;

use super::LocalMemoryLayout;
use super::Pattern;
use super::PatternCore;
use super::PatternSpec;
use crate::error::PatternError;
use crate::properties::PatternKind;
use crate::size::ViewSpec;
use crate::team::Team;

/// Blocks are dealt out along diagonals of the block grid: the block
/// at block coordinates `bc` belongs to unit `sum(bc) % nunits`. Any
/// run of `nunits` consecutive blocks along the fastest dimension
/// therefore holds one block of every unit, which is what stencils and
/// transpositions over the block grid want.
///
/// Each unit stores its blocks contiguously, in the order they appear
/// in the block grid. All units hold the same number of blocks, so
/// extents must be multiples of their block sizes and the number of
/// blocks along the fastest dimension a multiple of `nunits`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShiftTilePattern {
    core: PatternCore,
}

impl ShiftTilePattern {
    pub fn new(spec: PatternSpec, team: &dyn Team) -> Result<Self, PatternError> {
        let mut core = PatternCore::new(spec, team)?;
        for (d, (&extent, &b)) in core
            .sizespec()
            .extents()
            .iter()
            .zip(core.blocksize_spec().extents())
            .enumerate()
        {
            if extent % b != 0 {
                return Err(PatternError::invalid(format!(
                    "shift tile pattern: extent {} in dimension {} is not a multiple of {}",
                    extent, d, b
                )));
            }
        }
        let fastest = core.arrangement().fastest_dim(core.ndim());
        let nblocks_fastest = core.blockspec().extents()[fastest];
        if nblocks_fastest % core.nunits() != 0 {
            return Err(PatternError::invalid(format!(
                "shift tile pattern: {} blocks in dimension {} cannot be shifted over {} units",
                nblocks_fastest,
                fastest,
                core.nunits()
            )));
        }

        let local_extents = Self::local_extents_for(&core);
        let local_size = Self::local_size_for(&core);
        tracing::debug!(
            "shift tile pattern: unit {} holds {} elements",
            core.myid(),
            local_size
        );
        core.cache_local(local_extents, local_size);
        Ok(Self { core })
    }

    fn local_extents_for(core: &PatternCore) -> Vec<usize> {
        let fastest = core.arrangement().fastest_dim(core.ndim());
        let mut extents = core.sizespec().extents().to_vec();
        extents[fastest] /= core.nunits();
        extents
    }

    fn local_size_for(core: &PatternCore) -> usize {
        (core.blockspec().size() / core.nunits()) * core.max_blocksize()
    }

    fn phase_of(&self, abs: &[usize]) -> usize {
        let phase: Vec<usize> = abs
            .iter()
            .zip(self.core.blocksize_spec().extents())
            .map(|(c, b)| c % b)
            .collect();
        self.core.blocksize_spec().linearize(&phase)
    }
}

impl Pattern for ShiftTilePattern {
    fn core(&self) -> &PatternCore {
        &self.core
    }

    fn kind(&self) -> PatternKind {
        PatternKind::ShiftTile
    }

    fn unit_at_view(&self, coords: &[usize], view: &ViewSpec) -> Result<usize, PatternError> {
        let abs = self.core.absolute_coords(coords, view)?;
        let diagonal: usize = self.core.block_coords(&abs).iter().sum();
        Ok(diagonal % self.core.nunits())
    }

    fn index_to_elem_view(
        &self,
        coords: &[usize],
        view: &ViewSpec,
    ) -> Result<usize, PatternError> {
        let abs = self.core.absolute_coords(coords, view)?;
        let block_coords = self.core.block_coords(&abs);
        let local_block = self.core.blockspec().linearize(&block_coords) / self.core.nunits();
        Ok(local_block * self.core.max_blocksize() + self.phase_of(&abs))
    }

    fn local_to_global_index(&self, unit: usize, local: usize) -> Result<usize, PatternError> {
        self.core.check_unit(unit)?;
        let total = self.local_size();
        if local >= total {
            return Err(PatternError::IndexOutOfRange {
                index: local,
                total,
            });
        }
        let nunits = self.core.nunits();
        let max_blocksize = self.core.max_blocksize();
        // The unit's k-th block is the one it owns among blocks
        // k*nunits .. (k+1)*nunits, which differ only in the fastest
        // dimension.
        let first = (local / max_blocksize) * nunits;
        let first_diagonal: usize = self.core.blockspec().delinearize(first).iter().sum();
        let shift = (unit + nunits - first_diagonal % nunits) % nunits;
        let block_coords = self.core.blockspec().delinearize(first + shift);
        let phase = self
            .core
            .blocksize_spec()
            .delinearize(local % max_blocksize);
        let global: Vec<usize> = izip!(block_coords, phase, self.core.blocksize_spec().extents())
            .map(|(bc, p, b)| bc * b + p)
            .collect();
        self.core.memory_layout().at(&global)
    }

    fn local_extents_of(&self, unit: usize) -> Result<Vec<usize>, PatternError> {
        self.core.check_unit(unit)?;
        Ok(self.core.local_extents().to_vec())
    }

    fn local_size_of(&self, unit: usize) -> Result<usize, PatternError> {
        self.core.check_unit(unit)?;
        Ok(self.core.local_size())
    }

    fn max_elem_per_unit(&self) -> usize {
        self.core.local_size()
    }

    fn is_rectangular(&self) -> bool {
        false
    }

    fn local_memory_layout(&self, _unit: usize) -> Result<LocalMemoryLayout, PatternError> {
        Err(PatternError::NonRectangular {
            reason: "shift tile blocks do not form a local grid".to_string(),
        })
    }
}
