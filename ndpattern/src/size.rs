/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;

use itertools::izip;
use serde::Deserialize;
use serde::Serialize;

use crate::error::PatternError;
use crate::error::check_dims;

/// The extents of an n-dimensional index space.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SizeSpec {
    extents: Vec<usize>,
}

impl SizeSpec {
    /// Create a size spec. At least one dimension is required.
    pub fn new(extents: impl Into<Vec<usize>>) -> Result<Self, PatternError> {
        let extents = extents.into();
        if extents.is_empty() {
            return Err(PatternError::invalid("size spec needs at least one dimension"));
        }
        Ok(Self { extents })
    }

    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn extent(&self, dim: usize) -> Result<usize, PatternError> {
        self.extents
            .get(dim)
            .copied()
            .ok_or(PatternError::DimensionOutOfRange {
                dim,
                ndims: self.ndim(),
            })
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SizeSpec({:?})", self.extents)
    }
}

/// A rectangular window into an index space: an offset and an extent
/// per dimension.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ViewSpec {
    offsets: Vec<usize>,
    extents: Vec<usize>,
}

impl ViewSpec {
    pub fn new(offsets: Vec<usize>, extents: Vec<usize>) -> Result<Self, PatternError> {
        check_dims(offsets.len(), extents.len())?;
        Ok(Self { offsets, extents })
    }

    /// A view covering all of `extents` with zero offsets.
    pub fn full(extents: &[usize]) -> Self {
        Self {
            offsets: vec![0; extents.len()],
            extents: extents.to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn offset(&self, dim: usize) -> usize {
        self.offsets[dim]
    }

    pub fn extent(&self, dim: usize) -> usize {
        self.extents[dim]
    }

    /// Narrow dimension `dim` to `begin..end`, relative to the current
    /// window.
    pub fn select(&self, dim: usize, begin: usize, end: usize) -> Result<Self, PatternError> {
        if dim >= self.ndim() {
            return Err(PatternError::DimensionOutOfRange {
                dim,
                ndims: self.ndim(),
            });
        }
        if end < begin {
            return Err(PatternError::EmptyRange { begin, end });
        }
        if end > self.extents[dim] {
            return Err(PatternError::IndexOutOfRange {
                index: end,
                total: self.extents[dim],
            });
        }
        let mut view = self.clone();
        view.offsets[dim] += begin;
        view.extents[dim] = end - begin;
        Ok(view)
    }

    /// Whether the absolute coordinates `coords` fall inside the window.
    pub fn contains(&self, coords: &[usize]) -> bool {
        coords.len() == self.ndim()
            && izip!(coords, &self.offsets, &self.extents)
                .all(|(&c, &offset, &extent)| c >= offset && c < offset + extent)
    }

    /// The overlap of two windows over the same space.
    pub fn intersect(&self, other: &ViewSpec) -> Result<Self, PatternError> {
        check_dims(self.ndim(), other.ndim())?;
        let (offsets, extents) = izip!(&self.offsets, &self.extents, &other.offsets, &other.extents)
            .map(|(&o1, &e1, &o2, &e2)| {
                let begin = o1.max(o2);
                let end = (o1 + e1).min(o2 + e2);
                (begin, end.saturating_sub(begin))
            })
            .unzip();
        Ok(Self { offsets, extents })
    }
}

impl fmt::Display for ViewSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ViewSpec(offsets={:?}, extents={:?})",
            self.offsets, self.extents
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_spec() {
        let spec = SizeSpec::new(vec![4, 5, 6]).unwrap();
        assert_eq!(spec.ndim(), 3);
        assert_eq!(spec.size(), 120);
        assert_eq!(spec.extent(1).unwrap(), 5);
        assert!(spec.extent(3).is_err());
        assert!(SizeSpec::new(Vec::new()).is_err());
    }

    #[test]
    fn test_view_select() {
        let view = ViewSpec::full(&[10, 8]);
        let sub = view.select(0, 2, 7).unwrap();
        assert_eq!(sub.offsets(), &[2, 0]);
        assert_eq!(sub.extents(), &[5, 8]);
        let sub = sub.select(0, 1, 3).unwrap();
        assert_eq!(sub.offsets(), &[3, 0]);
        assert_eq!(sub.extents(), &[2, 8]);
        assert_eq!(sub.size(), 16);

        assert!(matches!(
            view.select(2, 0, 1),
            Err(PatternError::DimensionOutOfRange { dim: 2, ndims: 2 })
        ));
        assert!(matches!(
            view.select(0, 0, 11),
            Err(PatternError::IndexOutOfRange {
                index: 11,
                total: 10
            })
        ));
        assert!(matches!(
            view.select(0, 5, 4),
            Err(PatternError::EmptyRange { begin: 5, end: 4 })
        ));
    }

    #[test]
    fn test_view_contains() {
        let view = ViewSpec::new(vec![2, 3], vec![2, 2]).unwrap();
        assert!(view.contains(&[2, 3]));
        assert!(view.contains(&[3, 4]));
        assert!(!view.contains(&[4, 3]));
        assert!(!view.contains(&[1, 3]));
        assert!(!view.contains(&[2]));
    }

    #[test]
    fn test_view_intersect() {
        let a = ViewSpec::new(vec![0, 0], vec![6, 6]).unwrap();
        let b = ViewSpec::new(vec![4, 2], vec![4, 2]).unwrap();
        let c = a.intersect(&b).unwrap();
        assert_eq!(c.offsets(), &[4, 2]);
        assert_eq!(c.extents(), &[2, 2]);

        let d = ViewSpec::new(vec![7, 0], vec![1, 1]).unwrap();
        assert!(a.intersect(&d).unwrap().is_empty());
    }
}
