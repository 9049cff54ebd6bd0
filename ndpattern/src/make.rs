/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Factories deriving concrete specs and patterns from
//! [`PatternProperties`].

use std::collections::BTreeSet;

use crate::config;
use crate::config::Config;
use crate::distribution::Distribution;
use crate::distribution::DistributionSpec;
use crate::error::PatternError;
use crate::math::balance_extents;
use crate::math::factorize;
use crate::math::smallest_factor;
use crate::pattern::AnyPattern;
use crate::pattern::PatternSpec;
use crate::properties::PatternProperties;
use crate::size::SizeSpec;
use crate::team::Team;
use crate::team::TeamSpec;

/// Arrange the units of `team` for a pattern over `sizespec` with the
/// given properties.
///
/// Starting from all units in the first dimension, the team grid is
/// balanced toward square blocks (unless the mapping asks for
/// diagonal, neighbor or multiple placement without minimal
/// partitioning), then adjusted for multiple mapping and for the
/// minimum bulk transfer size in `config`.
pub fn make_team_spec(
    sizespec: &SizeSpec,
    properties: &PatternProperties,
    team: &dyn Team,
    config: &Config,
) -> Result<TeamSpec, PatternError> {
    let ndim = sizespec.ndim();
    let teamspec = TeamSpec::default_for(ndim, team);
    if ndim == 1 {
        return Ok(teamspec);
    }
    let nunits = team.size();
    let locality = team.locality();
    let blocking: BTreeSet<usize> = if locality.num_nodes == 1 {
        BTreeSet::from([locality.num_numa_domains])
    } else {
        BTreeSet::from([locality.num_cpus])
    };
    let partitioning = &properties.partitioning;
    let mapping = &properties.mapping;

    let mut extents = teamspec.extents().to_vec();
    tracing::debug!("make_team_spec: initial team extents {:?}", extents);

    if partitioning.minimal || !(mapping.diagonal || mapping.neighbor || mapping.multiple) {
        extents = balance_extents(&extents, &blocking);
        if nunits > 1 && extents[0] == nunits {
            tracing::debug!(
                "make_team_spec: could not balance {} units with blocking factors {:?}",
                nunits,
                blocking
            );
        }
    }
    tracing::debug!("make_team_spec: team extents after balancing {:?}", extents);

    // Move the smallest team factor that splits the data evenly out of
    // a dimension whose data extent does not divide over its units.
    let mut small_factor_found = None;
    if partitioning.minimal && mapping.multiple {
        for (from, to) in [(0, 1), (1, 0)] {
            let data_extent = sizespec.extents()[from];
            if data_extent % extents[from] == 0 {
                continue;
            }
            if let Some(&factor) = factorize(extents[from])
                .keys()
                .find(|&&f| data_extent % f == 0)
            {
                extents[from] /= factor;
                extents[to] *= factor;
                small_factor_found = Some(factor);
                break;
            }
        }
    }
    tracing::debug!(
        "make_team_spec: team extents after multiple mapping {:?}",
        extents
    );

    let bulk_min = config.bulk_min_size_bytes();
    if bulk_min > 0 && small_factor_found.is_some() {
        let block_volume: usize = sizespec
            .extents()
            .iter()
            .zip(&extents)
            .map(|(extent, nunits)| extent / nunits)
            .product();
        if block_volume * config.element_size_bytes() < bulk_min {
            if let Some(factor) = smallest_factor(extents[1]) {
                extents[0] *= factor;
                extents[1] /= factor;
            }
        }
        tracing::debug!(
            "make_team_spec: team extents after adjusting for bulk min size {}: {:?}",
            bulk_min,
            extents
        );
    }

    TeamSpec::with_size(extents, nunits)
}

/// [`make_team_spec`] with the global configuration.
pub fn make_team_spec_default(
    sizespec: &SizeSpec,
    properties: &PatternProperties,
    team: &dyn Team,
) -> Result<TeamSpec, PatternError> {
    make_team_spec(sizespec, properties, team, &config::global::snapshot())
}

/// Choose one distribution per dimension satisfying `properties` for
/// the given team arrangement.
pub fn make_distribution_spec(
    sizespec: &SizeSpec,
    teamspec: &TeamSpec,
    properties: &PatternProperties,
) -> Result<DistributionSpec, PatternError> {
    if sizespec.ndim() != teamspec.ndim() {
        return Err(PatternError::InvalidDims {
            expected: sizespec.ndim(),
            got: teamspec.ndim(),
        });
    }
    let partitioning = &properties.partitioning;
    let mapping = &properties.mapping;
    let layout = &properties.layout;

    let mut min_block_extent = sizespec.size();
    if partitioning.minimal {
        for (extent, nunits) in sizespec.extents().iter().zip(teamspec.extents()) {
            min_block_extent = min_block_extent.min(extent / nunits);
        }
        tracing::debug!(
            "make_distribution_spec: minimum block extent {}",
            min_block_extent
        );
    }

    let mut dists = Vec::with_capacity(sizespec.ndim());
    for (d, (&extent, &nunits)) in sizespec
        .extents()
        .iter()
        .zip(teamspec.extents())
        .enumerate()
    {
        let mut nblocks = nunits;
        if mapping.diagonal || mapping.neighbor {
            // Every unit must occur in every hyperplane.
            nblocks = teamspec.size();
        } else if partitioning.minimal {
            if !mapping.balanced {
                if min_block_extent == 0 {
                    return Err(PatternError::invalid(format!(
                        "cannot form blocks: fewer elements than units in dimension {}",
                        d
                    )));
                }
                nblocks = extent / min_block_extent;
            }
        } else if mapping.balanced && nblocks % nunits != 0 {
            return Err(PatternError::invalid(format!(
                "cannot distribute {} blocks to {} units in dimension {}",
                nblocks, nunits, d
            )));
        }
        if nblocks == 0 {
            return Err(PatternError::invalid(format!(
                "no blocks in dimension {}",
                d
            )));
        }
        let tilesize = extent / nblocks;
        if tilesize == 0 {
            return Err(PatternError::invalid(format!(
                "cannot distribute {} elements to {} blocks in dimension {}",
                extent, nblocks, d
            )));
        }
        if partitioning.balanced && extent % tilesize != 0 {
            return Err(PatternError::invalid(format!(
                "cannot distribute {} elements to {} blocks in dimension {}",
                extent, nblocks, d
            )));
        }
        let dist = if layout.linear && layout.blocked {
            Distribution::Tile(tilesize)
        } else {
            Distribution::BlockCyclic(tilesize)
        };
        tracing::debug!(
            "make_distribution_spec: dimension {}: {} blocks over {} units: {}",
            d,
            nblocks,
            nunits,
            dist
        );
        dists.push(dist);
    }
    DistributionSpec::new(dists)
}

/// Build the pattern variant satisfying `properties`.
pub fn make_pattern(
    sizespec: SizeSpec,
    teamspec: TeamSpec,
    properties: &PatternProperties,
    team: &dyn Team,
) -> Result<AnyPattern, PatternError> {
    let kind = properties.pattern_kind(sizespec.ndim())?;
    let distspec = make_distribution_spec(&sizespec, &teamspec, properties)?;
    tracing::debug!(
        "make_pattern: {} for {} {} {}",
        kind,
        sizespec,
        teamspec,
        distspec
    );
    let spec = PatternSpec::new(sizespec, distspec, teamspec)?;
    AnyPattern::new(kind, spec, team)
}

/// Build the pattern variant satisfying `properties`, arranging the
/// team with [`make_team_spec`].
pub fn make_pattern_for_team(
    sizespec: SizeSpec,
    properties: &PatternProperties,
    team: &dyn Team,
    config: &Config,
) -> Result<AnyPattern, PatternError> {
    let teamspec = make_team_spec(&sizespec, properties, team, config)?;
    make_pattern(sizespec, teamspec, properties, team)
}
