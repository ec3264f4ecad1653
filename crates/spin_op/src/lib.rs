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

//! Sums of weighted Pauli strings over qubits, in the symplectic representation.
//!
//! The central type is [SpinOperator], which stores one complex coefficient per distinct Pauli
//! string, keyed by the string's `(x, z)` bit vectors ([TermKey]).  On top of the algebra it
//! provides dense and sparse matrix construction ([matrix]), a flat numeric encoding ([codec]),
//! and seeded random generation and term partitioning ([sampler]).

use std::env;

pub mod codec;
pub mod matrix;
pub mod pauli;
pub mod sampler;
pub mod spin_op;
pub mod term;

pub use codec::{CodecError, MalformedKind};
pub use matrix::{CooMatrix, MatrixError};
pub use pauli::{LabelError, Pauli};
pub use sampler::{SampleError, random_capacity};
pub use spin_op::{CoherenceError, SpinOperator};
pub use term::{MAX_QUBIT_INDEX, SpinTerm, SpinTermView, TermKey};

/// Should the large matrix constructions use the rayon thread pool?
///
/// Threads are disabled when `QISKIT_IN_PARALLEL=TRUE` (an outer layer is already parallel),
/// unless `QISKIT_FORCE_THREADS=TRUE` overrides it.
#[inline]
pub fn getenv_use_multiple_threads() -> bool {
    let parallel_context = env::var("QISKIT_IN_PARALLEL")
        .unwrap_or_else(|_| "FALSE".to_string())
        .to_uppercase()
        == "TRUE";
    let force_threads = env::var("QISKIT_FORCE_THREADS")
        .unwrap_or_else(|_| "FALSE".to_string())
        .to_uppercase()
        == "TRUE";
    !parallel_context || force_threads
}
