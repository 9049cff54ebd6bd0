/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Property-based generators for [`PatternSpec`] and related types.
//!
//! [`gen_pattern_spec`] generates specs any [`crate::BlockPattern`]
//! accepts: every distribution, partial trailing blocks and idle units
//! included. [`gen_tiled_spec`] restricts itself to full tiles, which
//! [`crate::TilePattern`] requires.
//!
//! ```
//! use proptest::prelude::*;
//!
//! use crate::strategy::gen_pattern_spec;
//!
//! proptest! {
//!     #[test]
//!     fn test_spec(spec in gen_pattern_spec(3, 12, 4)) {
//!         assert_eq!(spec.sizespec.ndim(), spec.teamspec.ndim());
//!     }
//! }
//! ```
//!
//! This module is only included in test builds (`#[cfg(test)]`).

use proptest::prelude::*;

use crate::cartesian::MemArrange;
use crate::distribution::Distribution;
use crate::distribution::DistributionSpec;
use crate::pattern::PatternSpec;
use crate::size::SizeSpec;
use crate::team::TeamSpec;

pub fn gen_arrangement() -> impl Strategy<Value = MemArrange> {
    prop_oneof![Just(MemArrange::RowMajor), Just(MemArrange::ColMajor)]
}

/// A distribution for a dimension spread over `nunits` units. A single
/// unit may also leave its dimension undistributed.
pub fn gen_distribution(nunits: usize) -> BoxedStrategy<Distribution> {
    let distributed = prop_oneof![
        Just(Distribution::Blocked),
        Just(Distribution::Cyclic),
        (1..=4usize).prop_map(Distribution::BlockCyclic),
    ];
    if nunits == 1 {
        prop_oneof![Just(Distribution::None), distributed].boxed()
    } else {
        distributed.boxed()
    }
}

/// Generates a [`PatternSpec`] of up to `max_dims` dimensions, each of
/// extent `1..=max_extent` spread over `1..=max_units` units.
pub fn gen_pattern_spec(
    max_dims: usize,
    max_extent: usize,
    max_units: usize,
) -> impl Strategy<Value = PatternSpec> {
    let dim = (1..=max_extent, 1..=max_units).prop_flat_map(|(extent, nunits)| {
        gen_distribution(nunits).prop_map(move |dist| (extent, nunits, dist))
    });
    (prop::collection::vec(dim, 1..=max_dims), gen_arrangement()).prop_map(
        |(dims, arrangement)| {
            let (extents, rest): (Vec<usize>, Vec<(usize, Distribution)>) = dims
                .into_iter()
                .map(|(extent, nunits, dist)| (extent, (nunits, dist)))
                .unzip();
            let (team, dists): (Vec<usize>, Vec<Distribution>) = rest.into_iter().unzip();
            build(extents, dists, team, arrangement)
        },
    )
}

/// Generates a [`PatternSpec`] of tiles that divide every extent: each
/// dimension holds `nunits * blocks_per_unit` tiles of `1..=max_tile`
/// elements.
pub fn gen_tiled_spec(max_dims: usize, max_tile: usize) -> impl Strategy<Value = PatternSpec> {
    let dim = (1..=3usize, 1..=3usize, 1..=max_tile);
    (prop::collection::vec(dim, 1..=max_dims), gen_arrangement()).prop_map(
        |(dims, arrangement)| {
            let mut extents = Vec::new();
            let mut dists = Vec::new();
            let mut team = Vec::new();
            for (nunits, per_unit, tile) in dims {
                extents.push(nunits * per_unit * tile);
                dists.push(Distribution::Tile(tile));
                team.push(nunits);
            }
            build(extents, dists, team, arrangement)
        },
    )
}

fn build(
    extents: Vec<usize>,
    dists: Vec<Distribution>,
    team: Vec<usize>,
    arrangement: MemArrange,
) -> PatternSpec {
    let nunits = team.iter().product();
    PatternSpec::new(
        SizeSpec::new(extents).unwrap(),
        DistributionSpec::new(dists).unwrap(),
        TeamSpec::with_size(team, nunits).unwrap(),
    )
    .unwrap()
    .with_arrangement(arrangement)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::collections::HashSet;

    use super::*;
    use crate::index_set::GlobalIndexSet;
    use crate::index_set::IndexSet;
    use crate::index_set::IndexSetIdentity;
    use crate::math::balance_extents;
    use crate::pattern::BlockPattern;
    use crate::pattern::Pattern;
    use crate::pattern::ShiftTilePattern;
    use crate::pattern::TilePattern;
    use crate::team::StaticTeam;

    fn team_for(spec: &PatternSpec, myid: usize) -> StaticTeam {
        StaticTeam::new(spec.teamspec.size(), myid).unwrap()
    }

    /// Every global index maps to a distinct `(unit, local)` pair that
    /// maps back to it, and local sizes add up to the capacity.
    fn check_bijection<P: Pattern>(p: &P) {
        let mut seen = HashSet::new();
        for i in 0..p.capacity() {
            let coords = p.coords(i).unwrap();
            let unit = p.unit_at(&coords).unwrap();
            let local = p.at(&coords).unwrap();
            assert!(local < p.local_size_of(unit).unwrap());
            assert!(local < p.max_elem_per_unit());
            assert!(seen.insert((unit, local)));
            assert_eq!(p.local_to_global_index(unit, local).unwrap(), i);
        }
        let total: usize = (0..p.nunits()).map(|u| p.local_size_of(u).unwrap()).sum();
        assert_eq!(total, p.capacity());
    }

    proptest! {
        #[test]
        fn test_block_pattern_bijection(spec in gen_pattern_spec(3, 9, 3)) {
            let team = team_for(&spec, 0);
            check_bijection(&BlockPattern::new(spec, &team).unwrap());
        }

        #[test]
        fn test_tile_pattern_bijection(spec in gen_tiled_spec(3, 3)) {
            let team = team_for(&spec, 0);
            check_bijection(&TilePattern::new(spec.clone(), &team).unwrap());
            check_bijection(&BlockPattern::new(spec, &team).unwrap());
        }

        #[test]
        fn test_shift_tile_bijection(
            nunits in 1..=4usize,
            per_unit in 1..=3usize,
            tile in 1..=3usize,
        ) {
            let spec = build(
                vec![nunits * per_unit * tile],
                vec![Distribution::Tile(tile)],
                vec![nunits],
                MemArrange::RowMajor,
            );
            let team = team_for(&spec, 0);
            check_bijection(&ShiftTilePattern::new(spec, &team).unwrap());
        }

        #[test]
        fn test_local_sets_partition_region(
            (spec, begin, end) in gen_pattern_spec(3, 9, 3).prop_flat_map(|spec| {
                let extent = spec.sizespec.extents()[0];
                (Just(spec), 0..=extent).prop_flat_map(move |(spec, begin)| {
                    (Just(spec), Just(begin), begin..=extent)
                })
            })
        ) {
            let team = team_for(&spec, 0);
            let p = BlockPattern::new(spec, &team).unwrap();
            let all = IndexSetIdentity::new(&p);
            let region = all.sub(0, begin, end).unwrap();
            let expected: BTreeSet<usize> = region.iter().collect();

            let mut seen = BTreeSet::new();
            for unit in 0..p.nunits() {
                let local = region.local_of(unit).unwrap();
                let global = local.global();
                prop_assert_eq!(global.local(), local.clone());
                for (offset, index) in local.iter().zip(global.iter()) {
                    prop_assert_eq!(p.local_to_global_index(unit, offset).unwrap(), index);
                    prop_assert!(seen.insert(index));
                }
            }
            prop_assert_eq!(seen, expected);
        }

        #[test]
        fn test_balance_preserves_size(nunits in 1..=64usize, ndim in 2..=3usize) {
            let mut extents = vec![1; ndim];
            extents[0] = nunits;
            let balanced = balance_extents(&extents, &BTreeSet::new());
            prop_assert_eq!(balanced.len(), ndim);
            prop_assert_eq!(balanced.iter().product::<usize>(), nunits);
        }
    }
}
