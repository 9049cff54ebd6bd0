/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use super::GlobalIndexSet;
use super::IndexSet;
use crate::pattern::Pattern;
use crate::size::ViewSpec;

/// Every global index of a pattern, in order.
#[derive(Debug)]
pub struct IndexSetIdentity<'a, P: Pattern> {
    pattern: &'a P,
}

impl<'a, P: Pattern> IndexSetIdentity<'a, P> {
    pub fn new(pattern: &'a P) -> Self {
        Self { pattern }
    }

    /// The identity is its own preimage.
    pub fn pre(&self) -> Self {
        self.clone()
    }
}

impl<P: Pattern> Clone for IndexSetIdentity<'_, P> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern,
        }
    }
}

impl<P: Pattern> IndexSet for IndexSetIdentity<'_, P> {
    fn size(&self) -> usize {
        self.pattern.capacity()
    }

    fn index(&self, pos: usize) -> usize {
        pos
    }

    fn extents(&self) -> Vec<usize> {
        self.pattern.sizespec().extents().to_vec()
    }
}

impl<'a, P: Pattern> GlobalIndexSet<'a> for IndexSetIdentity<'a, P> {
    type Pattern = P;

    fn pattern(&self) -> &'a P {
        self.pattern
    }

    fn viewspec(&self) -> &ViewSpec {
        self.pattern.viewspec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::BlockPattern;
    use crate::pattern::PatternSpec;
    use crate::size::SizeSpec;
    use crate::team::StaticTeam;

    #[test]
    fn test_identity() {
        let team = StaticTeam::new(3, 0).unwrap();
        let spec = PatternSpec::with_defaults(SizeSpec::new(vec![4, 5]).unwrap(), &team);
        let pattern = BlockPattern::new(spec, &team).unwrap();
        let all = IndexSetIdentity::new(&pattern);
        assert_eq!(all.size(), 20);
        assert_eq!(all.extents(), vec![4, 5]);
        assert!(all.iter().eq(0..20));
        assert!(all.pre().iter().eq(0..20));
        assert_eq!(all.get(20), None);
    }
}
