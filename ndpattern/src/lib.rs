/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Distribution patterns for partitioned global address spaces.
//!
//! A [`Pattern`] maps every point of an n-dimensional index space to
//! the unit of a [`Team`] that holds it and to that element's offset
//! in the unit's local memory, and back. Patterns are described by a
//! [`SizeSpec`] (the extents), a [`DistributionSpec`] (how each
//! dimension is cut into blocks) and a [`TeamSpec`] (how units are
//! arranged), and are either built directly or chosen by
//! [`make::make_pattern`] from a set of [`properties`].
//!
//! The [`index_set`] module provides lazy, composable views over a
//! pattern's index space: sub-ranges, the part held by one unit, and
//! the blocks overlapping a region.
//!
//! ```
//! use ndpattern::*;
//!
//! let team = StaticTeam::new(4, 0).unwrap();
//! let spec = PatternSpec::with_defaults(SizeSpec::new(vec![10]).unwrap(), &team);
//! let pattern = BlockPattern::new(spec, &team).unwrap();
//! // Blocks of 3 elements; the last unit holds just one.
//! assert_eq!(pattern.unit_at(&[7]).unwrap(), 2);
//! assert_eq!(pattern.local_size_of(3).unwrap(), 1);
//! ```

mod cartesian;
pub use cartesian::CartesianIndexSpace;
pub use cartesian::CartesianIterator;
pub use cartesian::MemArrange;

mod distribution;
pub use distribution::Distribution;
pub use distribution::DistributionSpec;

mod error;
pub use error::ErrorKind;
pub use error::PatternError;

mod size;
pub use size::SizeSpec;
pub use size::ViewSpec;

/// Runtime configuration of the pattern factories.
pub mod config;

/// Lazy views over a pattern's index space.
pub mod index_set;
pub use index_set::GlobalIndexSet;
pub use index_set::IndexSet;
pub use index_set::IndexSetBlock;
pub use index_set::IndexSetBlocks;
pub use index_set::IndexSetGlobal;
pub use index_set::IndexSetIdentity;
pub use index_set::IndexSetIter;
pub use index_set::IndexSetLocal;
pub use index_set::IndexSetSub;
pub use index_set::IndexSetSubPreimage;
pub use index_set::local_index_range;

/// Factories deriving team specs, distributions and patterns from
/// properties.
pub mod make;
pub use make::make_distribution_spec;
pub use make::make_pattern;
pub use make::make_pattern_for_team;
pub use make::make_team_spec;
pub use make::make_team_spec_default;

/// Integer factorization helpers.
pub mod math;

pub mod pattern;
pub use pattern::AnyPattern;
pub use pattern::BlockPattern;
pub use pattern::BlockSizeSpec;
pub use pattern::BlockSpec;
pub use pattern::LocalIndex;
pub use pattern::LocalMemoryLayout;
pub use pattern::Pattern;
pub use pattern::PatternCore;
pub use pattern::PatternSpec;
pub use pattern::ShiftTilePattern;
pub use pattern::TilePattern;

/// Pattern properties: what a caller asks of a pattern.
pub mod properties;
pub use properties::LayoutProperties;
pub use properties::MappingProperties;
pub use properties::PartitioningProperties;
pub use properties::PatternKind;
pub use properties::PatternProperties;

/// Property-based generators for randomized test input.
#[cfg(test)]
pub mod strategy;

/// Teams of units and their arrangement.
pub mod team;
pub use team::Locality;
pub use team::StaticTeam;
pub use team::Team;
pub use team::TeamSpec;
pub use team::ThreadTeam;
pub use team::broadcast;
