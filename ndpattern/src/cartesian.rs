/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use serde::Deserialize;
use serde::Serialize;

use crate::error::PatternError;
use crate::error::check_dims;

/// Storage order of a multidimensional index space.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug, Default)]
pub enum MemArrange {
    /// The last dimension varies fastest.
    #[default]
    RowMajor,
    /// The first dimension varies fastest.
    ColMajor,
}

impl MemArrange {
    /// The dimension whose coordinate varies fastest in linear order.
    pub fn fastest_dim(self, ndim: usize) -> usize {
        match self {
            MemArrange::RowMajor => ndim.saturating_sub(1),
            MemArrange::ColMajor => 0,
        }
    }
}

/// A dense n-dimensional index space together with a storage order.
/// `at` maps coordinates to linear offsets and `coords` maps them
/// back; the two are inverse bijections on `0..size()`.
///
/// ```
/// # use ndpattern::CartesianIndexSpace;
/// # use ndpattern::MemArrange;
/// let rm = CartesianIndexSpace::new(vec![3, 4], MemArrange::RowMajor);
/// assert_eq!(rm.at(&[1, 2]).unwrap(), 6);
/// let cm = CartesianIndexSpace::new(vec![3, 4], MemArrange::ColMajor);
/// assert_eq!(cm.at(&[1, 2]).unwrap(), 7);
/// assert_eq!(cm.coords(7).unwrap(), vec![1, 2]);
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CartesianIndexSpace {
    extents: Vec<usize>,
    arrangement: MemArrange,
    strides: Vec<usize>,
}

impl CartesianIndexSpace {
    /// Create a new index space with the given extents.
    pub fn new(extents: impl Into<Vec<usize>>, arrangement: MemArrange) -> Self {
        let extents = extents.into();
        let strides = compute_strides(&extents, arrangement);
        Self {
            extents,
            arrangement,
            strides,
        }
    }

    /// Create a new row-major index space.
    pub fn row_major(extents: impl Into<Vec<usize>>) -> Self {
        Self::new(extents, MemArrange::RowMajor)
    }

    /// Replace the extents, keeping the storage order.
    pub fn resize(&mut self, extents: impl Into<Vec<usize>>) {
        self.extents = extents.into();
        self.strides = compute_strides(&self.extents, self.arrangement);
    }

    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    /// The number of points in the space.
    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// The extent of dimension `dim`.
    pub fn extent(&self, dim: usize) -> Result<usize, PatternError> {
        self.extents
            .get(dim)
            .copied()
            .ok_or(PatternError::DimensionOutOfRange {
                dim,
                ndims: self.ndim(),
            })
    }

    pub fn arrangement(&self) -> MemArrange {
        self.arrangement
    }

    /// Linear distance between neighbours in each dimension.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Linear offset of the point at `coords`.
    pub fn at(&self, coords: &[usize]) -> Result<usize, PatternError> {
        self.check_coords(coords)?;
        Ok(self.linearize(coords))
    }

    /// Coordinates of the point at linear offset `index`.
    pub fn coords(&self, index: usize) -> Result<Vec<usize>, PatternError> {
        let total = self.size();
        if index >= total {
            return Err(PatternError::IndexOutOfRange { index, total });
        }
        Ok(self.delinearize(index))
    }

    /// Whether `coords` names a point of this space.
    pub fn contains(&self, coords: &[usize]) -> bool {
        self.check_coords(coords).is_ok()
    }

    pub(crate) fn check_coords(&self, coords: &[usize]) -> Result<(), PatternError> {
        check_dims(self.ndim(), coords.len())?;
        for (dim, (&coord, &extent)) in coords.iter().zip(&self.extents).enumerate() {
            if coord >= extent {
                return Err(PatternError::CoordOutOfRange { dim, coord, extent });
            }
        }
        Ok(())
    }

    /// Unchecked linearization; callers validate `coords`.
    pub(crate) fn linearize(&self, coords: &[usize]) -> usize {
        coords
            .iter()
            .zip(&self.strides)
            .map(|(coord, stride)| coord * stride)
            .sum()
    }

    /// Unchecked inverse of [`linearize`]; requires `index < size()`.
    pub(crate) fn delinearize(&self, index: usize) -> Vec<usize> {
        let mut coords = vec![0; self.ndim()];
        let mut rest = index;
        match self.arrangement {
            MemArrange::RowMajor => {
                for (dim, extent) in self.extents.iter().enumerate().rev() {
                    coords[dim] = rest % extent;
                    rest /= extent;
                }
            }
            MemArrange::ColMajor => {
                for (dim, extent) in self.extents.iter().enumerate() {
                    coords[dim] = rest % extent;
                    rest /= extent;
                }
            }
        }
        coords
    }

    /// Iterate all points in linear order.
    pub fn iter(&self) -> CartesianIterator<'_> {
        CartesianIterator {
            space: self,
            index: 0,
            size: self.size(),
        }
    }
}

fn compute_strides(extents: &[usize], arrangement: MemArrange) -> Vec<usize> {
    let mut strides = extents.to_vec();
    let step = |acc: usize, n: &mut usize| {
        let next = *n * acc;
        *n = acc;
        next
    };
    let _ = match arrangement {
        MemArrange::RowMajor => strides.iter_mut().rev().fold(1, step),
        MemArrange::ColMajor => strides.iter_mut().fold(1, step),
    };
    strides
}

impl std::fmt::Display for CartesianIndexSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}", self.extents, self.arrangement)
    }
}

/// Iterates over the coordinates of a [`CartesianIndexSpace`] in the
/// space's linear order.
#[derive(Clone)]
pub struct CartesianIterator<'a> {
    space: &'a CartesianIndexSpace,
    index: usize,
    size: usize,
}

impl Iterator for CartesianIterator<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.size {
            return None;
        }
        let coords = self.space.delinearize(self.index);
        self.index += 1;
        Some(coords)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.size - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CartesianIterator<'_> {}
