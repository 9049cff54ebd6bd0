/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Prime factorization of `n` as a map from prime to multiplicity.
/// `0` and `1` have no prime factors.
pub fn factorize(n: usize) -> BTreeMap<usize, usize> {
    let mut factors = BTreeMap::new();
    let mut rem = n;
    let mut d = 2;
    while rem > 1 && d * d <= rem {
        while rem % d == 0 {
            *factors.entry(d).or_insert(0) += 1;
            rem /= d;
        }
        d += 1;
    }
    if rem > 1 {
        *factors.entry(rem).or_insert(0) += 1;
    }
    factors
}

/// Prime factors of `n` in ascending order, with repetition.
pub fn prime_factors(n: usize) -> Vec<usize> {
    factorize(n)
        .into_iter()
        .flat_map(|(p, count)| std::iter::repeat(p).take(count))
        .collect()
}

/// The smallest prime factor of `n`, if `n > 1`.
pub fn smallest_factor(n: usize) -> Option<usize> {
    factorize(n).into_keys().next()
}

/// Rearrange the product of `extents` into a grid of the same rank
/// whose extents are as close to each other as possible.
///
/// Prime factors are assigned largest first, each to the currently
/// smallest dimension. If `blocking` contains a factor `b > 1` that
/// divides the total and is at most its square root, the largest such
/// factor is kept whole in the last dimension, so a blocking unit such
/// as a NUMA domain is not split across dimensions.
pub fn balance_extents(extents: &[usize], blocking: &BTreeSet<usize>) -> Vec<usize> {
    let ndim = extents.len();
    let size: usize = extents.iter().product();
    if ndim < 2 || size < 2 {
        return extents.to_vec();
    }
    let mut balanced = vec![1; ndim];
    let mut rest = size;
    if let Some(&b) = blocking
        .iter()
        .rev()
        .find(|&&b| b > 1 && size % b == 0 && b * b <= size)
    {
        balanced[ndim - 1] = b;
        rest /= b;
    }
    for factor in prime_factors(rest).into_iter().rev() {
        let (dim, _) = balanced
            .iter()
            .enumerate()
            .min_by_key(|&(dim, &extent)| (extent, dim))
            .unwrap_or((0, &1));
        balanced[dim] *= factor;
    }
    balanced
}
