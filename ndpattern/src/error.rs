/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

/// Coarse classification of a [`PatternError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The inputs were inconsistent or unsatisfiable.
    InvalidArgument,
    /// An index, coordinate, unit or dimension was out of bounds.
    OutOfRange,
    /// The team failed to synchronize or exchange data.
    Team,
}

/// The type of error for pattern construction and queries.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PatternError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("invalid dims: expected {expected}, got {got}")]
    InvalidDims { expected: usize, got: usize },

    #[error("team spec of size {got} does not match team of size {expected}")]
    TeamSizeMismatch { expected: usize, got: usize },

    #[error("blocksize must be positive for {distribution}")]
    ZeroBlocksize { distribution: &'static str },

    #[error("non-rectangular pattern: {reason}")]
    NonRectangular { reason: String },

    #[error("index {index} out of range {total}")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("coordinate {coord} out of range {extent} in dimension {dim}")]
    CoordOutOfRange {
        dim: usize,
        coord: usize,
        extent: usize,
    },

    #[error("dimension {dim} out of range for {ndims}-dimensional pattern")]
    DimensionOutOfRange { dim: usize, ndims: usize },

    #[error("unit {unit} out of range for team of {nunits} units")]
    UnitOutOfRange { unit: usize, nunits: usize },

    #[error("empty range: {begin}..{end}")]
    EmptyRange { begin: usize, end: usize },

    #[error("team operation failed: {0}")]
    Team(String),
}

impl PatternError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PatternError::InvalidArgument { .. }
            | PatternError::InvalidDims { .. }
            | PatternError::TeamSizeMismatch { .. }
            | PatternError::ZeroBlocksize { .. }
            | PatternError::NonRectangular { .. } => ErrorKind::InvalidArgument,
            PatternError::IndexOutOfRange { .. }
            | PatternError::CoordOutOfRange { .. }
            | PatternError::DimensionOutOfRange { .. }
            | PatternError::UnitOutOfRange { .. }
            | PatternError::EmptyRange { .. } => ErrorKind::OutOfRange,
            PatternError::Team(_) => ErrorKind::Team,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        PatternError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for PatternError {
    fn from(err: bincode::Error) -> Self {
        PatternError::Team(format!("codec: {}", err))
    }
}

pub(crate) fn check_dims(expected: usize, got: usize) -> Result<(), PatternError> {
    if expected != got {
        return Err(PatternError::InvalidDims { expected, got });
    }
    Ok(())
}
