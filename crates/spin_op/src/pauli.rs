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

use ndarray::{Array2, array};
use num_complex::Complex64;
use thiserror::Error;

/// Named handle to the alphabet of single-qubit Pauli operators, including the identity.
///
/// # Representation
///
/// The `u8` representation is the symplectic pair of the operator, with X in the Lsb1 and Z in
/// the Lsb0, so `0b10` <-> `X`, `0b01` <-> `Z`, `0b11` <-> `Y` and `0b00` <-> `I`.  Unlike the
/// sparse observables, the identity is a named member here, because the per-qubit visitors of
/// [SpinTermView](crate::term::SpinTermView) report every qubit of a term, not only the
/// non-identity ones.
///
/// `Pauli::Y` has `(1, 1)` as its `(x, z)` representation and represents exactly the Pauli Y
/// operator; there is no hidden factor of $-i$ anywhere in the encoding.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pauli {
    /// The single-qubit identity.
    I = 0b00,
    /// Pauli X operator.
    X = 0b10,
    /// Pauli Y operator.
    Y = 0b11,
    /// Pauli Z operator.
    Z = 0b01,
}
impl From<Pauli> for u8 {
    fn from(value: Pauli) -> u8 {
        value as u8
    }
}

impl Pauli {
    /// Build the operator from its symplectic `(x, z)` bit pair.
    #[inline]
    pub fn from_bits(x: bool, z: bool) -> Self {
        match (x, z) {
            (false, false) => Self::I,
            (true, false) => Self::X,
            (true, true) => Self::Y,
            (false, true) => Self::Z,
        }
    }

    /// Does this operator include an X component?
    #[inline]
    pub fn x_bit(&self) -> bool {
        (*self as u8) & 0b10 != 0
    }

    /// Does this operator include a Z component?
    #[inline]
    pub fn z_bit(&self) -> bool {
        (*self as u8) & 0b01 != 0
    }

    /// The single-letter label of this operator.
    #[inline]
    pub fn label(&self) -> char {
        // Note: these labels are what `SpinOperator::from_word` accepts, and should not change.
        match self {
            Self::I => 'I',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Attempt to convert an ASCII letter into a `Pauli`.  The alphabet is case sensitive.
    #[inline]
    pub fn try_from_u8(value: u8) -> Result<Self, PauliFromU8Error> {
        match value {
            b'I' => Ok(Self::I),
            b'X' => Ok(Self::X),
            b'Y' => Ok(Self::Y),
            b'Z' => Ok(Self::Z),
            _ => Err(PauliFromU8Error(value)),
        }
    }

    /// The 2x2 matrix of this operator in the computational basis.
    pub fn matrix(&self) -> Array2<Complex64> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::new(0.0, 1.0);
        match self {
            Self::I => array![[one, zero], [zero, one]],
            Self::X => array![[zero, one], [one, zero]],
            Self::Y => array![[zero, -i], [i, zero]],
            Self::Z => array![[one, zero], [zero, -one]],
        }
    }
}

#[derive(Error, Debug)]
#[error("{0:#04x} is not a letter of the Pauli alphabet 'IXYZ'")]
pub struct PauliFromU8Error(pub u8);

/// An error related to the processing of a dense Pauli word.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LabelError {
    #[error("invalid Pauli symbol {symbol:?} at position {position}; words may only contain 'IXYZ'")]
    InvalidPauliSymbol { symbol: char, position: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_pairs_match_the_symplectic_table() {
        assert_eq!((Pauli::I.x_bit(), Pauli::I.z_bit()), (false, false));
        assert_eq!((Pauli::X.x_bit(), Pauli::X.z_bit()), (true, false));
        assert_eq!((Pauli::Y.x_bit(), Pauli::Y.z_bit()), (true, true));
        assert_eq!((Pauli::Z.x_bit(), Pauli::Z.z_bit()), (false, true));
        for pauli in [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z] {
            assert_eq!(Pauli::from_bits(pauli.x_bit(), pauli.z_bit()), pauli);
        }
    }

    #[test]
    fn letters_round_trip() {
        for pauli in [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z] {
            assert_eq!(Pauli::try_from_u8(pauli.label() as u8).unwrap(), pauli);
        }
        assert!(Pauli::try_from_u8(b'x').is_err());
        assert!(Pauli::try_from_u8(b'+').is_err());
    }

    #[test]
    fn y_is_i_times_xz() {
        let i = Complex64::new(0.0, 1.0);
        let xz = Pauli::X.matrix().dot(&Pauli::Z.matrix());
        assert_eq!(Pauli::Y.matrix(), xz.mapv(|v| v * i));
    }
}
