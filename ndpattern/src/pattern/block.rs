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
use crate::cartesian::CartesianIndexSpace;
use crate::error::PatternError;
use crate::properties::PatternKind;
use crate::size::ViewSpec;
use crate::team::Team;

/// The general pattern. Blocks are dealt round-robin to the units of
/// the team grid, dimension by dimension, and each unit stores its
/// elements in the same row-/column-major order as the global index
/// space.
///
/// ```
/// # use ndpattern::*;
/// let team = StaticTeam::new(4, 0).unwrap();
/// let spec = PatternSpec::new(
///     SizeSpec::new(vec![12, 12]).unwrap(),
///     DistributionSpec::new(vec![Distribution::Blocked, Distribution::None]).unwrap(),
///     TeamSpec::new(vec![4, 1], &team).unwrap(),
/// )
/// .unwrap();
/// let pattern = BlockPattern::new(spec, &team).unwrap();
/// assert_eq!(pattern.local_extents(), &[3, 12]);
/// assert_eq!(pattern.unit_at(&[5, 5]).unwrap(), 1);
/// assert_eq!(pattern.at(&[5, 5]).unwrap(), 2 * 12 + 5);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPattern {
    core: PatternCore,
}

impl BlockPattern {
    pub fn new(spec: PatternSpec, team: &dyn Team) -> Result<Self, PatternError> {
        let mut core = PatternCore::new(spec, team)?;
        let unit_coords = core.teamspec().coords(core.myid())?;
        let local_extents = core.grid_local_extents(&unit_coords);
        let local_size = local_extents.iter().product();
        tracing::debug!(
            "block pattern: unit {} holds {:?} ({} elements)",
            core.myid(),
            local_extents,
            local_size
        );
        core.cache_local(local_extents, local_size);
        Ok(Self { core })
    }

    fn local_space(&self, local_extents: Vec<usize>) -> CartesianIndexSpace {
        CartesianIndexSpace::new(local_extents, self.core.arrangement())
    }
}

impl Pattern for BlockPattern {
    fn core(&self) -> &PatternCore {
        &self.core
    }

    fn kind(&self) -> PatternKind {
        PatternKind::Block
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
        let local_space = self.local_space(self.core.grid_local_extents(&unit_coords));
        let index = local_space.linearize(&local_coords);
        tracing::trace!("{:?} -> unit {:?} local {:?} ({})", abs, unit_coords, local_coords, index);
        Ok(index)
    }

    fn local_to_global_index(&self, unit: usize, local: usize) -> Result<usize, PatternError> {
        let unit_coords = self.core.teamspec().coords(unit)?;
        let local_space = self.local_space(self.core.grid_local_extents(&unit_coords));
        let local_coords = local_space.coords(local)?;
        let global = self.core.grid_global_coords(&unit_coords, &local_coords);
        self.core.memory_layout().at(&global)
    }

    fn local_extents_of(&self, unit: usize) -> Result<Vec<usize>, PatternError> {
        let unit_coords = self.core.teamspec().coords(unit)?;
        Ok(self.core.grid_local_extents(&unit_coords))
    }

    fn local_size_of(&self, unit: usize) -> Result<usize, PatternError> {
        Ok(self.local_extents_of(unit)?.iter().product())
    }

    fn max_elem_per_unit(&self) -> usize {
        izip!(
            self.core.distspec().iter(),
            self.core.sizespec().extents(),
            self.core.teamspec().extents()
        )
        .map(|(dist, &extent, &nunits)| {
            dist.max_blocksize_in_range(extent, nunits)
                * dist.max_local_blocks_in_range(extent, nunits)
        })
        .product()
    }

    fn is_rectangular(&self) -> bool {
        true
    }

    fn local_memory_layout(&self, unit: usize) -> Result<LocalMemoryLayout, PatternError> {
        Ok(LocalMemoryLayout::Canonical(
            self.local_space(self.local_extents_of(unit)?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartesian::MemArrange;
    use crate::distribution::Distribution;
    use crate::distribution::DistributionSpec;
    use crate::size::SizeSpec;
    use crate::team::StaticTeam;
    use crate::team::TeamSpec;

    fn pattern(
        extents: Vec<usize>,
        dists: Vec<Distribution>,
        team_extents: Vec<usize>,
        myid: usize,
    ) -> BlockPattern {
        let team = StaticTeam::new(team_extents.iter().product(), myid).unwrap();
        let spec = PatternSpec::new(
            SizeSpec::new(extents).unwrap(),
            DistributionSpec::new(dists).unwrap(),
            TeamSpec::new(team_extents, &team).unwrap(),
        )
        .unwrap();
        BlockPattern::new(spec, &team).unwrap()
    }

    fn owners(p: &BlockPattern) -> Vec<usize> {
        (0..p.capacity())
            .map(|i| p.unit_at(&p.coords(i).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_blocked_slabs() {
        let p = pattern(
            vec![12, 12],
            vec![Distribution::Blocked, Distribution::None],
            vec![4, 1],
            1,
        );
        assert_eq!(p.local_extents(), &[3, 12]);
        assert_eq!(p.local_size(), 36);
        assert_eq!(p.local_extent(0).unwrap(), 3);
        assert_eq!(p.unit_at(&[5, 5]).unwrap(), 1);
        assert_eq!(p.local_to_global_index(1, 0).unwrap(), 36);
        assert_eq!(p.local_to_global_index(3, 35).unwrap(), 143);
        assert_eq!(p.max_elem_per_unit(), 36);
    }

    #[test]
    fn test_blocked_1d_owners() {
        let p = pattern(vec![10], vec![Distribution::Blocked], vec![3], 0);
        assert_eq!(owners(&p), vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        assert_eq!(p.local_size_of(2).unwrap(), 2);
        assert_eq!(p.max_elem_per_unit(), 4);
    }

    #[test]
    fn test_cyclic_1d() {
        let p = pattern(vec![7], vec![Distribution::Cyclic], vec![3], 0);
        assert_eq!(owners(&p), vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(p.at(&[6]).unwrap(), 2);
        assert_eq!(p.at(&[4]).unwrap(), 1);
        assert_eq!(p.local_size_of(0).unwrap(), 3);
        assert_eq!(p.local_size_of(1).unwrap(), 2);
        assert_eq!(p.local_to_global_index(1, 1).unwrap(), 4);
    }

    #[test]
    fn test_block_cyclic_underfilled() {
        let p = pattern(vec![11], vec![Distribution::BlockCyclic(2)], vec![2], 0);
        assert_eq!(owners(&p), vec![0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1]);
        assert_eq!(p.local_size_of(0).unwrap(), 6);
        assert_eq!(p.local_size_of(1).unwrap(), 5);
        assert_eq!(p.at(&[10]).unwrap(), 4);
        assert!(p.local_to_global_index(1, 5).is_err());
    }

    #[test]
    fn test_2d_grid_col_major() {
        let team = StaticTeam::new(4, 3).unwrap();
        let spec = PatternSpec::new(
            SizeSpec::new(vec![5, 6]).unwrap(),
            DistributionSpec::new(vec![Distribution::BlockCyclic(2), Distribution::Cyclic])
                .unwrap(),
            TeamSpec::new(vec![2, 2], &team).unwrap(),
        )
        .unwrap()
        .with_arrangement(MemArrange::ColMajor);
        let p = BlockPattern::new(spec, &team).unwrap();
        let mut seen = vec![vec![false; p.capacity()]; p.nunits()];
        for i in 0..p.capacity() {
            let coords = p.coords(i).unwrap();
            let unit = p.unit_at(&coords).unwrap();
            let local = p.at(&coords).unwrap();
            assert!(local < p.local_size_of(unit).unwrap());
            assert!(!seen[unit][local]);
            seen[unit][local] = true;
            assert_eq!(p.local_to_global_index(unit, local).unwrap(), i);
        }
        let total: usize = (0..4).map(|u| p.local_size_of(u).unwrap()).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn test_more_units_than_elements() {
        let p = pattern(vec![3], vec![Distribution::Blocked], vec![5], 4);
        assert_eq!(p.local_size(), 0);
        assert_eq!(p.local_extents(), &[0]);
        assert!(p.local_to_global_index(4, 0).is_err());
        assert_eq!(owners(&p), vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range() {
        let p = pattern(vec![4, 4], vec![Distribution::Blocked, Distribution::None], vec![2, 1], 0);
        assert!(matches!(
            p.unit_at(&[4, 0]),
            Err(PatternError::CoordOutOfRange { dim: 0, coord: 4, .. })
        ));
        assert!(matches!(
            p.local_to_global_index(2, 0),
            Err(PatternError::UnitOutOfRange { unit: 2, nunits: 2 })
        ));
        assert!(matches!(
            p.local_to_global_index(0, 8),
            Err(PatternError::IndexOutOfRange { index: 8, total: 8 })
        ));
        assert!(p.at(&[1]).is_err());
    }

    #[test]
    fn test_view() {
        let p = pattern(vec![8], vec![Distribution::Blocked], vec![2], 0);
        let view = ViewSpec::new(vec![3], vec![3]).unwrap();
        assert_eq!(p.unit_at_view(&[0], &view).unwrap(), 0);
        assert_eq!(p.unit_at_view(&[1], &view).unwrap(), 1);
        assert_eq!(p.index_to_elem_view(&[2], &view).unwrap(), 1);
        assert!(p.unit_at_view(&[3], &view).is_err());
    }

    #[test]
    fn test_equality() {
        let a = pattern(vec![8], vec![Distribution::Blocked], vec![2], 0);
        let b = pattern(vec![8], vec![Distribution::Blocked], vec![2], 0);
        let c = pattern(vec![8], vec![Distribution::Cyclic], vec![2], 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_local_at() {
        let p = pattern(
            vec![6, 4],
            vec![Distribution::Blocked, Distribution::None],
            vec![2, 1],
            0,
        );
        assert_eq!(p.local_at(1, &[1, 2]).unwrap(), 6);
        assert!(p.local_at(1, &[3, 0]).is_err());
        assert!(matches!(
            p.local_memory_layout(0).unwrap(),
            LocalMemoryLayout::Canonical(_)
        ));
    }
}
