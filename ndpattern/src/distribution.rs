/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Per-dimension distribution policies.
//!
//! A [`Distribution`] decides how the elements of one dimension are
//! cut into blocks and how those blocks are dealt out to the units
//! arranged along that dimension. Blocks are always dealt
//! round-robin; the policies differ only in how the block size is
//! chosen:
//!
//! | policy            | block size           |
//! |-------------------|----------------------|
//! | `None`            | the whole extent     |
//! | `Blocked`         | `ceil(extent/units)` |
//! | `Cyclic`          | 1                    |
//! | `BlockCyclic(k)`  | `k`                  |
//! | `Tile(k)`         | `k`                  |

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PatternError;

#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Distribution {
    /// Not distributed; a single unit holds the whole dimension.
    None,
    /// One contiguous block per unit.
    Blocked,
    /// Elements dealt round-robin.
    Cyclic,
    /// Blocks of the given size dealt round-robin.
    BlockCyclic(usize),
    /// Like `BlockCyclic`, with each block stored contiguously in the
    /// owning unit's memory.
    Tile(usize),
}

impl Distribution {
    pub fn block_cyclic(blocksize: usize) -> Result<Self, PatternError> {
        if blocksize == 0 {
            return Err(PatternError::ZeroBlocksize {
                distribution: "BLOCKCYCLIC",
            });
        }
        Ok(Distribution::BlockCyclic(blocksize))
    }

    pub fn tile(blocksize: usize) -> Result<Self, PatternError> {
        if blocksize == 0 {
            return Err(PatternError::ZeroBlocksize {
                distribution: "TILE",
            });
        }
        Ok(Distribution::Tile(blocksize))
    }

    pub fn is_distributed(&self) -> bool {
        !matches!(self, Distribution::None)
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self, Distribution::Tile(_))
    }

    pub(crate) fn validate(&self) -> Result<(), PatternError> {
        match *self {
            Distribution::BlockCyclic(0) => Err(PatternError::ZeroBlocksize {
                distribution: "BLOCKCYCLIC",
            }),
            Distribution::Tile(0) => Err(PatternError::ZeroBlocksize {
                distribution: "TILE",
            }),
            _ => Ok(()),
        }
    }

    /// The largest block this policy produces for a dimension of
    /// `extent` elements spread over `nunits` units. Never zero.
    pub fn max_blocksize_in_range(&self, extent: usize, nunits: usize) -> usize {
        let blocksize = match *self {
            Distribution::None => extent,
            Distribution::Blocked => extent.div_ceil(nunits.max(1)),
            Distribution::Cyclic => 1,
            Distribution::BlockCyclic(k) | Distribution::Tile(k) => k,
        };
        blocksize.max(1)
    }

    /// Offset, along this dimension, of the unit owning block
    /// `block_coord`.
    pub fn block_coord_to_unit_offset(&self, block_coord: usize, nunits: usize) -> usize {
        match self {
            Distribution::None => 0,
            _ => block_coord % nunits.max(1),
        }
    }

    /// Global block coordinate of the block holding `local_coord` on the
    /// unit at `unit_offset` along this dimension.
    pub fn local_index_to_block_coord(
        &self,
        unit_offset: usize,
        local_coord: usize,
        nunits: usize,
        blocksize: usize,
    ) -> usize {
        match self {
            Distribution::None => 0,
            _ => (local_coord / blocksize) * nunits + unit_offset,
        }
    }

    /// Upper bound on the number of blocks any one unit holds.
    pub fn max_local_blocks_in_range(&self, extent: usize, nunits: usize) -> usize {
        let blocksize = self.max_blocksize_in_range(extent, nunits);
        extent.div_ceil(blocksize).div_ceil(nunits.max(1))
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::None => write!(f, "NONE"),
            Distribution::Blocked => write!(f, "BLOCKED"),
            Distribution::Cyclic => write!(f, "CYCLIC"),
            Distribution::BlockCyclic(k) => write!(f, "BLOCKCYCLIC({})", k),
            Distribution::Tile(k) => write!(f, "TILE({})", k),
        }
    }
}

/// One [`Distribution`] per dimension.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DistributionSpec {
    dists: Vec<Distribution>,
}

impl DistributionSpec {
    pub fn new(dists: impl Into<Vec<Distribution>>) -> Result<Self, PatternError> {
        let dists = dists.into();
        if dists.is_empty() {
            return Err(PatternError::invalid(
                "distribution spec needs at least one dimension",
            ));
        }
        for dist in &dists {
            dist.validate()?;
        }
        Ok(Self { dists })
    }

    /// `Blocked` in the first dimension, `None` in the rest.
    pub fn default_for(ndim: usize) -> Self {
        let mut dists = vec![Distribution::None; ndim.max(1)];
        dists[0] = Distribution::Blocked;
        Self { dists }
    }

    pub fn ndim(&self) -> usize {
        self.dists.len()
    }

    pub fn get(&self, dim: usize) -> Result<Distribution, PatternError> {
        self.dists
            .get(dim)
            .copied()
            .ok_or(PatternError::DimensionOutOfRange {
                dim,
                ndims: self.ndim(),
            })
    }

    pub fn dists(&self) -> &[Distribution] {
        &self.dists
    }

    pub fn iter(&self) -> impl Iterator<Item = &Distribution> {
        self.dists.iter()
    }

    pub fn is_tiled(&self) -> bool {
        self.dists.iter().any(Distribution::is_tiled)
    }
}

impl std::ops::Index<usize> for DistributionSpec {
    type Output = Distribution;

    fn index(&self, dim: usize) -> &Distribution {
        &self.dists[dim]
    }
}

impl fmt::Display for DistributionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DistributionSpec(")?;
        for (i, dist) in self.dists.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dist)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_blocksize() {
        assert_eq!(Distribution::None.max_blocksize_in_range(10, 1), 10);
        assert_eq!(Distribution::Blocked.max_blocksize_in_range(10, 3), 4);
        assert_eq!(Distribution::Blocked.max_blocksize_in_range(12, 4), 3);
        assert_eq!(Distribution::Cyclic.max_blocksize_in_range(10, 3), 1);
        assert_eq!(Distribution::BlockCyclic(4).max_blocksize_in_range(10, 3), 4);
        assert_eq!(Distribution::Tile(2).max_blocksize_in_range(10, 3), 2);
        // Empty extents still produce a usable block size.
        assert_eq!(Distribution::Blocked.max_blocksize_in_range(0, 3), 1);
    }

    #[test]
    fn test_unit_offset() {
        assert_eq!(Distribution::None.block_coord_to_unit_offset(5, 1), 0);
        assert_eq!(Distribution::Cyclic.block_coord_to_unit_offset(5, 3), 2);
        assert_eq!(
            Distribution::BlockCyclic(2).block_coord_to_unit_offset(3, 3),
            0
        );
    }

    #[test]
    fn test_local_index_to_block_coord() {
        // 3 units, block size 2: unit 1 holds blocks 1, 4, 7...
        let dist = Distribution::BlockCyclic(2);
        assert_eq!(dist.local_index_to_block_coord(1, 0, 3, 2), 1);
        assert_eq!(dist.local_index_to_block_coord(1, 3, 3, 2), 4);
        assert_eq!(dist.local_index_to_block_coord(1, 5, 3, 2), 7);
    }

    #[test]
    fn test_max_local_blocks() {
        assert_eq!(Distribution::Blocked.max_local_blocks_in_range(10, 3), 1);
        assert_eq!(Distribution::Cyclic.max_local_blocks_in_range(10, 3), 4);
        assert_eq!(
            Distribution::BlockCyclic(2).max_local_blocks_in_range(11, 2),
            3
        );
    }

    #[test]
    fn test_zero_blocksize_rejected() {
        assert!(matches!(
            Distribution::tile(0),
            Err(PatternError::ZeroBlocksize { .. })
        ));
        assert!(Distribution::block_cyclic(0).is_err());
        assert!(DistributionSpec::new(vec![Distribution::BlockCyclic(0)]).is_err());
    }

    #[test]
    fn test_spec() {
        let spec = DistributionSpec::default_for(3);
        assert_eq!(
            spec.dists(),
            &[
                Distribution::Blocked,
                Distribution::None,
                Distribution::None
            ]
        );
        assert_eq!(
            spec.to_string(),
            "DistributionSpec(BLOCKED, NONE, NONE)"
        );
        assert!(!spec.is_tiled());
        assert!(spec.get(3).is_err());
        assert_eq!(Distribution::Tile(4).to_string(), "TILE(4)");
    }
}
