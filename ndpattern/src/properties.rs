/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Abstract pattern properties.
//!
//! Rather than naming distributions directly, callers can describe
//! what they need from a pattern (how the index space is cut into
//! blocks, how blocks are mapped to units, and how a unit's blocks
//! are laid out in its memory) and let [`crate::make`] choose a
//! concrete pattern.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PatternError;

/// How the index space is cut into blocks.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct PartitioningProperties {
    /// As few blocks as possible.
    pub minimal: bool,
    /// Every block holds the same number of elements.
    pub balanced: bool,
    /// Blocks are rectangular.
    pub rectangular: bool,
}

impl Default for PartitioningProperties {
    fn default() -> Self {
        Self {
            minimal: false,
            balanced: false,
            rectangular: true,
        }
    }
}

impl PartitioningProperties {
    pub fn minimal(mut self) -> Self {
        self.minimal = true;
        self
    }

    pub fn balanced(mut self) -> Self {
        self.balanced = true;
        self
    }
}

/// How blocks are mapped to units.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug, Default)]
pub struct MappingProperties {
    /// Every unit holds the same number of blocks.
    pub balanced: bool,
    /// Every unit occurs in every diagonal of the block grid.
    pub diagonal: bool,
    /// Neighbouring blocks are mapped to different units.
    pub neighbor: bool,
    /// Units may hold more than one block.
    pub multiple: bool,
}

impl MappingProperties {
    pub fn balanced(mut self) -> Self {
        self.balanced = true;
        self
    }

    pub fn diagonal(mut self) -> Self {
        self.diagonal = true;
        self
    }

    pub fn neighbor(mut self) -> Self {
        self.neighbor = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// How a unit's elements are arranged in its local memory.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct LayoutProperties {
    /// Each block is contiguous in local memory.
    pub blocked: bool,
    /// Local memory mirrors the global row/column-major order.
    pub canonical: bool,
    /// Local blocks are stored one after another.
    pub linear: bool,
}

impl Default for LayoutProperties {
    fn default() -> Self {
        Self::canonical()
    }
}

impl LayoutProperties {
    pub fn canonical() -> Self {
        Self {
            blocked: false,
            canonical: true,
            linear: false,
        }
    }

    pub fn blocked() -> Self {
        Self {
            blocked: true,
            canonical: false,
            linear: false,
        }
    }

    pub fn linear(mut self) -> Self {
        self.linear = true;
        self
    }
}

/// The concrete pattern variants.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum PatternKind {
    Block,
    Tile,
    ShiftTile,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Block => write!(f, "BlockPattern"),
            PatternKind::Tile => write!(f, "TilePattern"),
            PatternKind::ShiftTile => write!(f, "ShiftTilePattern"),
        }
    }
}

/// The three property sets taken together.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug, Default)]
pub struct PatternProperties {
    pub partitioning: PartitioningProperties,
    pub mapping: MappingProperties,
    pub layout: LayoutProperties,
}

impl PatternProperties {
    pub fn new(
        partitioning: PartitioningProperties,
        mapping: MappingProperties,
        layout: LayoutProperties,
    ) -> Self {
        Self {
            partitioning,
            mapping,
            layout,
        }
    }

    /// Resolve the pattern variant satisfying these properties for an
    /// `ndim`-dimensional space. Exactly one variant must match.
    pub fn pattern_kind(&self, ndim: usize) -> Result<PatternKind, PatternError> {
        let PatternProperties {
            partitioning,
            mapping,
            layout,
        } = self;
        let candidates: Vec<PatternKind> = [
            (PatternKind::Tile, partitioning.minimal && layout.blocked),
            (
                PatternKind::ShiftTile,
                (mapping.diagonal || mapping.neighbor)
                    && (layout.blocked || (partitioning.balanced && ndim == 1)),
            ),
            (PatternKind::Block, layout.canonical),
        ]
        .into_iter()
        .filter_map(|(kind, matches)| matches.then_some(kind))
        .collect();

        match candidates.as_slice() {
            [kind] => Ok(*kind),
            [] => Err(PatternError::invalid(format!(
                "no pattern satisfies {:?}",
                self
            ))),
            _ => Err(PatternError::invalid(format!(
                "properties {:?} are ambiguous between {:?}",
                self, candidates
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_block() {
        let props = PatternProperties::default();
        assert!(props.partitioning.rectangular);
        assert_eq!(props.pattern_kind(2).unwrap(), PatternKind::Block);
    }

    #[test]
    fn test_tile() {
        let props = PatternProperties::new(
            PartitioningProperties::default().minimal(),
            MappingProperties::default(),
            LayoutProperties::blocked().linear(),
        );
        assert_eq!(props.pattern_kind(2).unwrap(), PatternKind::Tile);
    }

    #[test]
    fn test_shift_tile() {
        let props = PatternProperties::new(
            PartitioningProperties::default(),
            MappingProperties::default().diagonal(),
            LayoutProperties::blocked(),
        );
        assert_eq!(props.pattern_kind(2).unwrap(), PatternKind::ShiftTile);

        // One-dimensional balanced partitioning suffices without a
        // blocked layout.
        let props = PatternProperties::new(
            PartitioningProperties::default().balanced(),
            MappingProperties::default().neighbor(),
            LayoutProperties {
                blocked: false,
                canonical: false,
                linear: false,
            },
        );
        assert_eq!(props.pattern_kind(1).unwrap(), PatternKind::ShiftTile);
        assert!(props.pattern_kind(2).is_err());
    }

    #[test]
    fn test_ambiguous() {
        // Minimal, diagonal and blocked satisfies both tile variants.
        let props = PatternProperties::new(
            PartitioningProperties::default().minimal(),
            MappingProperties::default().diagonal(),
            LayoutProperties::blocked(),
        );
        assert!(matches!(
            props.pattern_kind(2),
            Err(PatternError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_unsatisfiable() {
        let props = PatternProperties::new(
            PartitioningProperties::default(),
            MappingProperties::default(),
            LayoutProperties::blocked(),
        );
        assert!(props.pattern_kind(2).is_err());
    }
}
