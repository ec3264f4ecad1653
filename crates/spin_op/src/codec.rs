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

//! Flat numeric encoding of a [SpinOperator].
//!
//! The buffer is a header followed by one fixed-size record per term, all stored as `f64`:
//!
//! ```text
//! [num_terms, num_qubits,
//!  num_qubits, x_0 .. x_{n-1}, z_0 .. z_{n-1}, re, im,     <- term 0
//!  num_qubits, x_0 .. x_{n-1}, z_0 .. z_{n-1}, re, im,     <- term 1
//!  ...]
//! ```
//!
//! Terms are written in the iteration order of the operator, so decoding an encoded operator
//! reproduces both its terms and their order.  Every count is a non-negative integer and every bit
//! is exactly `0.0` or `1.0`; anything else is rejected on decode.

use num_complex::Complex64;
use thiserror::Error;

use crate::spin_op::SpinOperator;
use crate::term::TermKey;

const HEADER_LEN: usize = 2;

/// The specific inconsistency found in a buffer that failed to decode.
#[derive(Error, Debug, PartialEq)]
pub enum MalformedKind {
    #[error("the buffer has {0} entries, which is too short for the header")]
    MissingHeader(usize),
    #[error("header value {0} is not a non-negative integer")]
    NonIntegralHeader(f64),
    #[error("the header declares a buffer of {expected} entries, but there are {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("term {term} declares {found} qubits, but the header declares {expected}")]
    TermWidthMismatch {
        term: usize,
        expected: usize,
        found: f64,
    },
    #[error("term {term} has the value {value} at bit {bit}, which is neither 0 nor 1")]
    NonBinaryBit { term: usize, bit: usize, value: f64 },
    #[error("term {term} has a non-finite coefficient")]
    NonFiniteCoefficient { term: usize },
}

#[derive(Error, Debug, PartialEq)]
pub enum CodecError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(#[from] MalformedKind),
}

/// The number of `f64` entries in the record of one term on `num_qubits` qubits.
#[inline]
fn record_len(num_qubits: usize) -> usize {
    2 * num_qubits + 3
}

/// Read a header count.  Only exact non-negative integers that fit in a `u32` are accepted.
fn read_count(value: f64) -> Result<usize, MalformedKind> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Ok(value as usize)
    } else {
        Err(MalformedKind::NonIntegralHeader(value))
    }
}

fn read_bit(value: f64, term: usize, bit: usize) -> Result<bool, MalformedKind> {
    if value == 0.0 {
        Ok(false)
    } else if value == 1.0 {
        Ok(true)
    } else {
        Err(MalformedKind::NonBinaryBit { term, bit, value })
    }
}

impl SpinOperator {
    /// Encode the operator into the flat buffer described in the [module docs](self).
    pub fn serialize(&self) -> Vec<f64> {
        let num_qubits = self.num_qubits() as usize;
        let mut out = Vec::with_capacity(HEADER_LEN + self.num_terms() * record_len(num_qubits));
        out.push(self.num_terms() as f64);
        out.push(num_qubits as f64);
        // The width of an operator with no terms is unbounded by its storage, so the scratch space
        // is only sized once there is a term to write.
        let mut bits = Vec::new();
        for term in self.iter() {
            bits.clear();
            term.key.extend_bits(self.num_qubits(), &mut bits);
            out.push(num_qubits as f64);
            out.extend(bits.iter().map(|&bit| if bit { 1.0 } else { 0.0 }));
            out.push(term.coeff.re);
            out.push(term.coeff.im);
        }
        out
    }

    /// Decode a buffer produced by [serialize](Self::serialize).
    ///
    /// The buffer must be exactly as long as its header declares, and every term record must be
    /// self-consistent.  Repeated keys are merged, exactly as for addition.
    pub fn deserialize(buffer: &[f64]) -> Result<Self, CodecError> {
        let (num_terms, num_qubits) = match buffer {
            [num_terms, num_qubits, ..] => (read_count(*num_terms)?, read_count(*num_qubits)?),
            _ => return Err(MalformedKind::MissingHeader(buffer.len()).into()),
        };
        let record = record_len(num_qubits);
        let expected = num_terms
            .checked_mul(record)
            .and_then(|body| body.checked_add(HEADER_LEN))
            .ok_or(MalformedKind::NonIntegralHeader(num_terms as f64))?;
        if buffer.len() != expected {
            return Err(MalformedKind::LengthMismatch {
                expected,
                found: buffer.len(),
            }
            .into());
        }
        ::tracing::debug!(num_terms, num_qubits, "decoding spin operator");

        let mut out = SpinOperator::with_capacity(num_qubits as u32, num_terms);
        // Only grown by records actually present in the buffer; the header alone can declare a
        // width far larger than anything we could allocate.
        let mut bits = Vec::new();
        for (term, chunk) in buffer[HEADER_LEN..].chunks_exact(record).enumerate() {
            if chunk[0] != num_qubits as f64 {
                return Err(MalformedKind::TermWidthMismatch {
                    term,
                    expected: num_qubits,
                    found: chunk[0],
                }
                .into());
            }
            bits.clear();
            for (bit, value) in chunk[1..=2 * num_qubits].iter().enumerate() {
                bits.push(read_bit(*value, term, bit)?);
            }
            let (re, im) = (chunk[record - 2], chunk[record - 1]);
            if !(re.is_finite() && im.is_finite()) {
                return Err(MalformedKind::NonFiniteCoefficient { term }.into());
            }
            let (x, z) = bits.split_at(num_qubits);
            out.add_term(TermKey::from_bits(x, z), Complex64::new(re, im));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hamiltonian() -> SpinOperator {
        5.907 - 2.1433 * SpinOperator::x(0) * SpinOperator::x(1)
            - 2.1433 * SpinOperator::y(0) * SpinOperator::y(1)
            + 0.21829 * SpinOperator::z(0)
            - 6.125 * SpinOperator::z(1)
    }

    #[test]
    fn layout() {
        let op = SpinOperator::y(1) * Complex64::new(0.5, -2.0);
        assert_eq!(
            op.serialize(),
            vec![1.0, 2.0, 2.0, 0.0, 1.0, 0.0, 1.0, 0.5, -2.0]
        );
    }

    #[test]
    fn round_trip_keeps_terms_and_order() {
        let op = hamiltonian();
        let buffer = op.serialize();
        assert_eq!(buffer.len(), 2 + 5 * 7);
        let back = SpinOperator::deserialize(&buffer).unwrap();
        assert_eq!(back, op);
        assert_eq!(back.num_qubits(), op.num_qubits());
        assert_eq!(back.raw_data(), op.raw_data());
    }

    #[test]
    fn empty_operators() {
        let op = SpinOperator::zero(3);
        assert_eq!(op.serialize(), vec![0.0, 3.0]);
        let back = SpinOperator::deserialize(&op.serialize()).unwrap();
        assert_eq!(back.num_qubits(), 3);
        assert!(back.is_empty());
    }

    #[test]
    fn wide_header_without_terms() {
        let op = SpinOperator::deserialize(&[0.0, 4294967295.0]).unwrap();
        assert_eq!(op.num_qubits(), u32::MAX);
        assert!(op.is_empty());
        assert_eq!(op.serialize(), vec![0.0, 4294967295.0]);
        assert!(matches!(
            SpinOperator::deserialize(&[1.0, 4294967295.0]),
            Err(CodecError::MalformedEncoding(
                MalformedKind::LengthMismatch { .. }
            ))
        ));
    }

    #[test]
    fn rejects_inconsistent_buffers() {
        fn malformed(buffer: &[f64]) -> MalformedKind {
            match SpinOperator::deserialize(buffer) {
                Err(CodecError::MalformedEncoding(kind)) => kind,
                Ok(_) => panic!("buffer should not have decoded"),
            }
        }
        let good = hamiltonian().serialize();

        assert_eq!(malformed(&[]), MalformedKind::MissingHeader(0));
        assert_eq!(malformed(&[1.0]), MalformedKind::MissingHeader(1));
        assert_eq!(
            malformed(&good[..good.len() - 1]),
            MalformedKind::LengthMismatch {
                expected: good.len(),
                found: good.len() - 1
            }
        );
        let mut extended = good.clone();
        extended.push(0.0);
        assert!(matches!(
            malformed(&extended),
            MalformedKind::LengthMismatch { .. }
        ));
        assert_eq!(
            malformed(&[1.5, 2.0]),
            MalformedKind::NonIntegralHeader(1.5)
        );
        assert_eq!(
            malformed(&[-1.0, 2.0]),
            MalformedKind::NonIntegralHeader(-1.0)
        );
        assert!(matches!(
            malformed(&[f64::NAN, 2.0]),
            MalformedKind::NonIntegralHeader(_)
        ));

        let mut bad_width = good.clone();
        bad_width[2] = 3.0;
        assert_eq!(
            malformed(&bad_width),
            MalformedKind::TermWidthMismatch {
                term: 0,
                expected: 2,
                found: 3.0
            }
        );

        let mut bad_bit = good.clone();
        bad_bit[2 + 7 + 2] = 0.5;
        assert_eq!(
            malformed(&bad_bit),
            MalformedKind::NonBinaryBit {
                term: 1,
                bit: 1,
                value: 0.5
            }
        );

        let mut bad_coeff = good;
        bad_coeff[2 + 6] = f64::INFINITY;
        assert_eq!(
            malformed(&bad_coeff),
            MalformedKind::NonFiniteCoefficient { term: 0 }
        );
    }
}
