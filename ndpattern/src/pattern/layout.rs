/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use itertools::izip;
use serde::Deserialize;
use serde::Serialize;

use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::error::check_dims;

/// How a unit stores its elements. Both variants describe the same
/// local index space (one coordinate per element the unit holds); they
/// differ in how those coordinates are linearized into local offsets.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LocalMemoryLayout {
    /// The local elements in plain row- or column-major order.
    Canonical(CartesianIndexSpace),
    /// Block after block, each block stored contiguously.
    Blocked {
        /// Number of local blocks per dimension.
        local_blockspec: CartesianIndexSpace,
        /// Extents of one block.
        blocksize_spec: CartesianIndexSpace,
        max_blocksize: usize,
    },
}

impl LocalMemoryLayout {
    pub fn ndim(&self) -> usize {
        match self {
            LocalMemoryLayout::Canonical(space) => space.ndim(),
            LocalMemoryLayout::Blocked {
                local_blockspec, ..
            } => local_blockspec.ndim(),
        }
    }

    /// Number of elements in the local index space.
    pub fn size(&self) -> usize {
        match self {
            LocalMemoryLayout::Canonical(space) => space.size(),
            LocalMemoryLayout::Blocked {
                local_blockspec,
                max_blocksize,
                ..
            } => local_blockspec.size() * max_blocksize,
        }
    }

    /// Extents of the local index space.
    pub fn extents(&self) -> Vec<usize> {
        match self {
            LocalMemoryLayout::Canonical(space) => space.extents().to_vec(),
            LocalMemoryLayout::Blocked {
                local_blockspec,
                blocksize_spec,
                ..
            } => local_blockspec
                .extents()
                .iter()
                .zip(blocksize_spec.extents())
                .map(|(nblocks, b)| nblocks * b)
                .collect(),
        }
    }

    /// Local offset of the element at local coordinates `coords`.
    pub fn at(&self, coords: &[usize]) -> Result<usize, PatternError> {
        match self {
            LocalMemoryLayout::Canonical(space) => space.at(coords),
            LocalMemoryLayout::Blocked {
                local_blockspec,
                blocksize_spec,
                max_blocksize,
            } => {
                check_dims(local_blockspec.ndim(), coords.len())?;
                let mut block_coords = Vec::with_capacity(coords.len());
                let mut phase = Vec::with_capacity(coords.len());
                for (dim, (&c, &nblocks, &b)) in
                    izip!(coords, local_blockspec.extents(), blocksize_spec.extents()).enumerate()
                {
                    if c >= nblocks * b {
                        return Err(PatternError::CoordOutOfRange {
                            dim,
                            coord: c,
                            extent: nblocks * b,
                        });
                    }
                    block_coords.push(c / b);
                    phase.push(c % b);
                }
                Ok(local_blockspec.linearize(&block_coords) * max_blocksize
                    + blocksize_spec.linearize(&phase))
            }
        }
    }

    /// Unchecked [`LocalMemoryLayout::at`]; callers validate `coords`.
    pub(crate) fn linearize(&self, coords: &[usize]) -> usize {
        match self {
            LocalMemoryLayout::Canonical(space) => space.linearize(coords),
            LocalMemoryLayout::Blocked {
                local_blockspec,
                blocksize_spec,
                max_blocksize,
            } => {
                let (block_coords, phase): (Vec<usize>, Vec<usize>) = coords
                    .iter()
                    .zip(blocksize_spec.extents())
                    .map(|(c, b)| (c / b, c % b))
                    .unzip();
                local_blockspec.linearize(&block_coords) * max_blocksize
                    + blocksize_spec.linearize(&phase)
            }
        }
    }

    /// Local coordinates of the element at local offset `offset`.
    pub fn coords(&self, offset: usize) -> Result<Vec<usize>, PatternError> {
        match self {
            LocalMemoryLayout::Canonical(space) => space.coords(offset),
            LocalMemoryLayout::Blocked {
                local_blockspec,
                blocksize_spec,
                max_blocksize,
            } => {
                let total = self.size();
                if offset >= total {
                    return Err(PatternError::IndexOutOfRange {
                        index: offset,
                        total,
                    });
                }
                let block_coords = local_blockspec.delinearize(offset / max_blocksize);
                let phase = blocksize_spec.delinearize(offset % max_blocksize);
                Ok(izip!(block_coords, phase, blocksize_spec.extents())
                    .map(|(bc, p, b)| bc * b + p)
                    .collect())
            }
        }
    }
}
