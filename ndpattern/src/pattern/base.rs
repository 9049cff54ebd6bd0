/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use itertools::izip;

use super::PatternSpec;
use crate::cartesian::CartesianIndexSpace;
use crate::cartesian::MemArrange;
use crate::distribution::Distribution;
use crate::distribution::DistributionSpec;
use crate::error::PatternError;
use crate::error::check_dims;
use crate::size::SizeSpec;
use crate::size::ViewSpec;
use crate::team::Team;
use crate::team::TeamSpec;

/// Number of blocks in each dimension.
pub type BlockSpec = CartesianIndexSpace;

/// Extents of a single (full) block.
pub type BlockSizeSpec = CartesianIndexSpace;

/// State shared by all pattern variants: the specs a pattern was built
/// from, and everything derived from them at construction.
#[derive(Clone, Debug)]
pub struct PatternCore {
    sizespec: SizeSpec,
    distspec: DistributionSpec,
    teamspec: TeamSpec,
    memory_layout: CartesianIndexSpace,
    viewspec: ViewSpec,
    blockspec: BlockSpec,
    blocksize_spec: BlockSizeSpec,
    max_blocksize: usize,
    nunits: usize,
    myid: usize,
    local_extents: Vec<usize>,
    local_size: usize,
}

impl PatternCore {
    pub(crate) fn new(spec: PatternSpec, team: &dyn Team) -> Result<Self, PatternError> {
        let PatternSpec {
            sizespec,
            distspec,
            teamspec,
            arrangement,
        } = spec;
        let ndim = sizespec.ndim();
        check_dims(ndim, distspec.ndim())?;
        check_dims(ndim, teamspec.ndim())?;
        if teamspec.size() != team.size() {
            return Err(PatternError::TeamSizeMismatch {
                expected: team.size(),
                got: teamspec.size(),
            });
        }
        if team.myid() >= team.size() {
            return Err(PatternError::UnitOutOfRange {
                unit: team.myid(),
                nunits: team.size(),
            });
        }
        for (d, (dist, &nunits_d)) in distspec.iter().zip(teamspec.extents()).enumerate() {
            if *dist == Distribution::None && nunits_d > 1 {
                return Err(PatternError::invalid(format!(
                    "dimension {} is not distributed but has {} units",
                    d, nunits_d
                )));
            }
        }

        let (blockspec, blocksize_spec) =
            initialize_block_specs(&sizespec, &distspec, &teamspec, arrangement);
        let max_blocksize = blocksize_spec.size();
        let memory_layout = CartesianIndexSpace::new(sizespec.extents().to_vec(), arrangement);
        let viewspec = ViewSpec::full(sizespec.extents());

        tracing::debug!(
            "pattern core: {} {} {} blocks {:?} of {:?}",
            sizespec,
            distspec,
            teamspec,
            blockspec.extents(),
            blocksize_spec.extents(),
        );

        Ok(Self {
            sizespec,
            distspec,
            teamspec,
            memory_layout,
            viewspec,
            blockspec,
            blocksize_spec,
            max_blocksize,
            nunits: team.size(),
            myid: team.myid(),
            local_extents: Vec::new(),
            local_size: 0,
        })
    }

    pub(crate) fn cache_local(&mut self, extents: Vec<usize>, size: usize) {
        self.local_extents = extents;
        self.local_size = size;
    }

    pub fn ndim(&self) -> usize {
        self.sizespec.ndim()
    }

    pub fn sizespec(&self) -> &SizeSpec {
        &self.sizespec
    }

    pub fn distspec(&self) -> &DistributionSpec {
        &self.distspec
    }

    pub fn teamspec(&self) -> &TeamSpec {
        &self.teamspec
    }

    pub fn memory_layout(&self) -> &CartesianIndexSpace {
        &self.memory_layout
    }

    pub fn arrangement(&self) -> MemArrange {
        self.memory_layout.arrangement()
    }

    pub fn viewspec(&self) -> &ViewSpec {
        &self.viewspec
    }

    pub fn blockspec(&self) -> &BlockSpec {
        &self.blockspec
    }

    pub fn blocksize_spec(&self) -> &BlockSizeSpec {
        &self.blocksize_spec
    }

    pub fn max_blocksize(&self) -> usize {
        self.max_blocksize
    }

    pub fn nunits(&self) -> usize {
        self.nunits
    }

    pub fn myid(&self) -> usize {
        self.myid
    }

    pub fn local_extents(&self) -> &[usize] {
        &self.local_extents
    }

    pub fn local_size(&self) -> usize {
        self.local_size
    }

    pub(crate) fn blocksizes(&self) -> &[usize] {
        self.blocksize_spec.extents()
    }

    pub(crate) fn check_unit(&self, unit: usize) -> Result<(), PatternError> {
        if unit >= self.nunits {
            return Err(PatternError::UnitOutOfRange {
                unit,
                nunits: self.nunits,
            });
        }
        Ok(())
    }

    /// Translate coordinates relative to `view` into coordinates of the
    /// full index space.
    pub(crate) fn absolute_coords(
        &self,
        coords: &[usize],
        view: &ViewSpec,
    ) -> Result<Vec<usize>, PatternError> {
        check_dims(self.ndim(), coords.len())?;
        check_dims(self.ndim(), view.ndim())?;
        let abs: Vec<usize> = izip!(coords, view.offsets(), view.extents())
            .enumerate()
            .map(|(dim, (&coord, &offset, &extent))| {
                if coord >= extent {
                    Err(PatternError::CoordOutOfRange { dim, coord, extent })
                } else {
                    Ok(coord + offset)
                }
            })
            .collect::<Result<_, _>>()?;
        self.memory_layout.check_coords(&abs)?;
        Ok(abs)
    }

    pub(crate) fn block_coords(&self, abs: &[usize]) -> Vec<usize> {
        abs.iter()
            .zip(self.blocksizes())
            .map(|(c, b)| c / b)
            .collect()
    }

    /// Coordinates, in the team grid, of the unit owning the block at
    /// `block_coords`.
    pub(crate) fn grid_unit_coords(&self, block_coords: &[usize]) -> Vec<usize> {
        izip!(self.distspec.iter(), block_coords, self.teamspec.extents())
            .map(|(dist, &bc, &nunits)| dist.block_coord_to_unit_offset(bc, nunits))
            .collect()
    }

    pub(crate) fn grid_unit(&self, block_coords: &[usize]) -> usize {
        self.teamspec
            .space()
            .linearize(&self.grid_unit_coords(block_coords))
    }

    /// Coordinates of the element at `abs` within its owner's local
    /// index space.
    pub(crate) fn grid_local_coords(&self, abs: &[usize], block_coords: &[usize]) -> Vec<usize> {
        izip!(abs, block_coords, self.blocksizes(), self.teamspec.extents())
            .map(|(&c, &bc, &b, &nunits)| (bc / nunits) * b + c % b)
            .collect()
    }

    /// Inverse of [`grid_local_coords`] for the unit at `unit_coords`.
    pub(crate) fn grid_global_coords(&self, unit_coords: &[usize], local: &[usize]) -> Vec<usize> {
        izip!(
            self.distspec.iter(),
            unit_coords,
            local,
            self.blocksizes(),
            self.teamspec.extents()
        )
        .map(|(dist, &u, &lc, &b, &nunits)| {
            dist.local_index_to_block_coord(u, lc, nunits, b) * b + lc % b
        })
        .collect()
    }

    /// Number of blocks the unit at `unit_coords` holds in each
    /// dimension.
    pub(crate) fn grid_local_blocks(&self, unit_coords: &[usize]) -> Vec<usize> {
        izip!(unit_coords, self.blockspec.extents(), self.teamspec.extents())
            .map(|(&u, &nblocks, &nunits)| {
                if u < nblocks {
                    (nblocks - u).div_ceil(nunits)
                } else {
                    0
                }
            })
            .collect()
    }

    /// Number of elements the unit at `unit_coords` holds in each
    /// dimension. The unit owning the last block of a dimension loses
    /// that block's underflow.
    pub(crate) fn grid_local_extents(&self, unit_coords: &[usize]) -> Vec<usize> {
        let nlocal_blocks = self.grid_local_blocks(unit_coords);
        izip!(
            unit_coords,
            nlocal_blocks,
            self.sizespec.extents(),
            self.blockspec.extents(),
            self.blocksizes(),
            self.teamspec.extents()
        )
        .map(|(&u, nlb, &extent, &nblocks, &b, &nunits)| {
            let full = nlb * b;
            let owns_last = nlb > 0 && (nblocks - 1) % nunits == u;
            if owns_last {
                full - (nblocks * b - extent)
            } else {
                full
            }
        })
        .collect()
    }

    /// The region of the index space covered by block `block_index`.
    pub(crate) fn block_view(&self, block_index: usize) -> Result<ViewSpec, PatternError> {
        let block_coords = self.blockspec.coords(block_index)?;
        let (offsets, extents) = izip!(&block_coords, self.blocksizes(), self.sizespec.extents())
            .map(|(&bc, &b, &extent)| {
                let offset = bc * b;
                (offset, b.min(extent - offset))
            })
            .unzip();
        ViewSpec::new(offsets, extents)
    }
}

impl PartialEq for PatternCore {
    fn eq(&self, other: &Self) -> bool {
        self.distspec == other.distspec
            && self.teamspec == other.teamspec
            && self.memory_layout == other.memory_layout
            && self.viewspec == other.viewspec
            && self.blockspec == other.blockspec
            && self.blocksize_spec == other.blocksize_spec
            && self.nunits == other.nunits
            && self.local_size == other.local_size
    }
}

impl Eq for PatternCore {}

/// Derive the block grid and the block extents. A dimension of extent
/// `E` distributed over `T` units is cut into blocks of
/// `max_blocksize_in_range(E, T)` elements, the last one possibly
/// short.
pub(crate) fn initialize_block_specs(
    sizespec: &SizeSpec,
    distspec: &DistributionSpec,
    teamspec: &TeamSpec,
    arrangement: MemArrange,
) -> (BlockSpec, BlockSizeSpec) {
    let (nblocks, blocksizes): (Vec<usize>, Vec<usize>) =
        izip!(distspec.iter(), sizespec.extents(), teamspec.extents())
            .map(|(dist, &extent, &nunits)| {
                let blocksize = dist.max_blocksize_in_range(extent, nunits);
                (extent.div_ceil(blocksize), blocksize)
            })
            .unzip();
    (
        BlockSpec::new(nblocks, arrangement),
        BlockSizeSpec::new(blocksizes, arrangement),
    )
}
