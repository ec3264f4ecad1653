// This code is part of Qiskit.
//
// (C) Copyright IBM 2025
//
// This code is licensed under the Apache License, Version 2.0. You may
// obtain a copy of this license in the LICENSE.txt file in the root directory
// of this source tree or at http://www.apache.org/licenses/LICENSE-2.0.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

use indexmap::IndexSet;
use num_complex::Complex64;
use rand::prelude::*;
use rand_pcg::Pcg64Mcg;
use thiserror::Error;

use crate::spin_op::SpinOperator;
use crate::term::TermKey;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SampleError {
    #[error(
        "cannot draw {requested} distinct terms on {num_qubits} qubits; at most {capacity} exist"
    )]
    RequestExceedsCapacity {
        requested: usize,
        capacity: usize,
        num_qubits: u32,
    },
    #[error("cannot partition an operator into {0} groups")]
    InvalidPartitionCount(usize),
}

/// The number of distinct terms [SpinOperator::random] can draw on `num_qubits` qubits.
///
/// Each drawn term has a `2 * num_qubits`-bit symplectic pattern with exactly `num_qubits` bits set,
/// so this is the central binomial coefficient `C(2n, n)`, saturating at `usize::MAX`.  There are
/// no such terms on zero qubits.
pub fn random_capacity(num_qubits: u32) -> usize {
    if num_qubits == 0 {
        return 0;
    }
    let n = num_qubits as u128;
    // C(n + k, k) = C(n + k - 1, k - 1) * (n + k) / k, which is exact at every step.
    let mut out: u128 = 1;
    for k in 1..=n {
        match out.checked_mul(n + k) {
            Some(numer) => out = numer / k,
            None => return usize::MAX,
        }
        if out > usize::MAX as u128 {
            return usize::MAX;
        }
    }
    out as usize
}

impl SpinOperator {
    /// Draw an operator of `num_terms` distinct terms on `num_qubits` qubits, each with unit
    /// coefficient.
    ///
    /// Every term is a uniformly shuffled pattern of `2 * num_qubits` symplectic bits with exactly
    /// `num_qubits` of them set.  The output is a pure function of the arguments: the same seed
    /// always produces the same terms in the same order.  The width of the result is `num_qubits`,
    /// even if no drawn term touches the last qubit.
    pub fn random(num_qubits: u32, num_terms: usize, seed: u64) -> Result<Self, SampleError> {
        let capacity = random_capacity(num_qubits);
        if num_terms > capacity {
            return Err(SampleError::RequestExceedsCapacity {
                requested: num_terms,
                capacity,
                num_qubits,
            });
        }
        ::tracing::debug!(num_qubits, num_terms, seed, "drawing random spin operator");

        let width = num_qubits as usize;
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let mut bits: Vec<bool> = (0..2 * width).map(|i| i < width).collect();
        let mut keys = IndexSet::<TermKey, ::ahash::RandomState>::with_capacity_and_hasher(
            num_terms,
            ::ahash::RandomState::new(),
        );
        let mut draws = 0usize;
        while keys.len() < num_terms {
            bits.shuffle(&mut rng);
            let (x, z) = bits.split_at(width);
            keys.insert(TermKey::from_bits(x, z));
            draws += 1;
        }
        ::tracing::trace!(draws, "random terms drawn");

        Ok(SpinOperator::from_terms(
            num_qubits,
            keys.into_iter().map(|key| (key, Complex64::new(1.0, 0.0))),
        ))
    }

    /// Split the terms of the operator into `num_groups` operators of near-equal size.
    ///
    /// The terms are dealt out contiguously in iteration order.  With `n` terms, the first
    /// `n % num_groups` groups get `n / num_groups + 1` terms and the rest get `n / num_groups`, so
    /// trailing groups may be empty.  Every group keeps the width of `self`.
    pub fn distribute_terms(&self, num_groups: usize) -> Result<Vec<SpinOperator>, SampleError> {
        if num_groups == 0 {
            return Err(SampleError::InvalidPartitionCount(num_groups));
        }
        let base = self.num_terms() / num_groups;
        let extra = self.num_terms() % num_groups;
        ::tracing::debug!(
            num_terms = self.num_terms(),
            num_groups,
            "distributing spin operator terms"
        );

        let mut terms = self.iter();
        Ok((0..num_groups)
            .map(|group| {
                let size = base + usize::from(group < extra);
                SpinOperator::from_terms(
                    self.num_qubits(),
                    terms
                        .by_ref()
                        .take(size)
                        .map(|term| (term.key.clone(), term.coeff)),
                )
            })
            .collect())
    }
}
