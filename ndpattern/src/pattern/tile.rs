/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::LocalMemoryLayout;
use super::Pattern;
use super::PatternCore;
use super::PatternSpec;
use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::properties::PatternKind;
use crate::size::ViewSpec;
use crate::team::Team;

/// Blocks are assigned to units as in [`super::BlockPattern`], but each
/// unit stores its blocks one after another, every block contiguous.
/// Every block must be full: each extent has to be a multiple of its
/// block size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TilePattern {
    core: PatternCore,
}

impl TilePattern {
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
                    "tile pattern: extent {} in dimension {} is not a multiple of block size {}",
                    extent, d, b
                )));
            }
        }
        let unit_coords = core.teamspec().coords(core.myid())?;
        let local_extents = core.grid_local_extents(&unit_coords);
        let local_size = local_extents.iter().product();
        tracing::debug!(
            "tile pattern: unit {} holds {:?} ({} elements)",
            core.myid(),
            local_extents,
            local_size
        );
        core.cache_local(local_extents, local_size);
        Ok(Self { core })
    }

    fn layout_of(&self, unit_coords: &[usize]) -> LocalMemoryLayout {
        LocalMemoryLayout::Blocked {
            local_blockspec: CartesianIndexSpace::new(
                self.core.grid_local_blocks(unit_coords),
                self.core.arrangement(),
            ),
            blocksize_spec: self.core.blocksize_spec().clone(),
            max_blocksize: self.core.max_blocksize(),
        }
    }
}

impl Pattern for TilePattern {
    fn core(&self) -> &PatternCore {
        &self.core
    }

    fn kind(&self) -> PatternKind {
        PatternKind::Tile
    }

    fn unit_at_view(&self, coords: &[usize], view: &ViewSpec) -> Result<usize, PatternError> {
        let abs = self.core.absolute_coords(coords, view)?;
        Ok(self.core.grid_unit(&self.core.block_coords(&abs)))
    }

    fn index_to_elem_view(
        &self,
        coords: &[usize],
        view: &ViewSpec,
    ) -> Result<usize, PatternError> {
        let abs = self.core.absolute_coords(coords, view)?;
        let block_coords = self.core.block_coords(&abs);
        let unit_coords = self.core.grid_unit_coords(&block_coords);
        let local_coords = self.core.grid_local_coords(&abs, &block_coords);
        self.layout_of(&unit_coords).at(&local_coords)
    }

    fn local_to_global_index(&self, unit: usize, local: usize) -> Result<usize, PatternError> {
        let unit_coords = self.core.teamspec().coords(unit)?;
        let local_coords = self.layout_of(&unit_coords).coords(local)?;
        let global = self.core.grid_global_coords(&unit_coords, &local_coords);
        self.core.memory_layout().at(&global)
    }

    fn local_extents_of(&self, unit: usize) -> Result<Vec<usize>, PatternError> {
        let unit_coords = self.core.teamspec().coords(unit)?;
        Ok(self.core.grid_local_extents(&unit_coords))
    }

    fn local_size_of(&self, unit: usize) -> Result<usize, PatternError> {
        let unit_coords = self.core.teamspec().coords(unit)?;
        Ok(self.layout_of(&unit_coords).size())
    }

    fn max_elem_per_unit(&self) -> usize {
        let most_blocks: usize = self
            .core
            .blockspec()
            .extents()
            .iter()
            .zip(self.core.teamspec().extents())
            .map(|(nblocks, nunits)| nblocks.div_ceil(*nunits))
            .product();
        most_blocks * self.core.max_blocksize()
    }

    fn is_rectangular(&self) -> bool {
        true
    }

    fn local_memory_layout(&self, unit: usize) -> Result<LocalMemoryLayout, PatternError> {
        let unit_coords = self.core.teamspec().coords(unit)?;
        Ok(self.layout_of(&unit_coords))
    }
}
