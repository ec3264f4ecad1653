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

use std::fmt;

use ahash::RandomState;
use indexmap::{IndexMap, map::Entry};
use num_complex::Complex64;
use num_traits::Zero;
use thiserror::Error;

use crate::pauli::{LabelError, Pauli};
use crate::term::{SpinTermView, TermKey, check_qubit_index, phase_factor};

/// Absolute tolerance on each coefficient used by the `==` comparison of two operators.
pub const EQ_ABS_TOL: f64 = 1e-12;
/// Relative tolerance on each coefficient used by the `==` comparison of two operators.
pub const EQ_REL_TOL: f64 = 1e-9;

const C_ZERO: Complex64 = Complex64::new(0.0, 0.0);
const C_ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Error cases stemming from data coherence at the point of entry into `SpinOperator` from
/// user-provided raw data.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoherenceError {
    #[error("`rows` ({rows}) and `coeffs` ({coeffs}) must be the same length")]
    MismatchedTermCount { rows: usize, coeffs: usize },
    #[error("row {row} has {len} bits, but each row must hold the same even number of bits")]
    BadRowLength { row: usize, len: usize },
}

/// A weighted sum of Pauli strings, stored as a map from the symplectic key of each string to its
/// complex coefficient.
///
/// # Representation
///
/// No two entries share a [TermKey]; adding a term whose key is already present sums the
/// coefficients in place.  An entry whose coefficient becomes exactly zero through any operation is
/// removed immediately, so [num_terms](Self::num_terms) always counts non-zero terms.  The
/// surviving entries keep their insertion order, which is the iteration order of the operator and
/// is stable for as long as the operator is not mutated.
///
/// `num_qubits` is the width of the operator.  It only ever grows: every operation that brings in
/// a wider key (or a wider operator) zero-pads the existing terms by raising it, and cancelling
/// terms never lowers it.  Keys themselves are width-agnostic (see [TermKey]), so the padding is
/// free.
///
/// In particular, an operator with no terms does not have width 0 in general.  `x(3) - x(3)` is
/// the zero operator on 4 qubits, and its matrix is the 16x16 zero matrix.  Only the operators
/// built with no width in the first place ([empty](Self::empty), `zero(0)`) report 0.
///
/// # Concurrency
///
/// The operator holds no interior mutability.  Shared references can be read from many threads at
/// once, and all mutation needs `&mut self`, so the borrow checker already forbids mutating an
/// operator while any of its term views are alive.
#[derive(Clone, Debug, Default)]
pub struct SpinOperator {
    /// The width of the operator.  Not inferable from the keys after cancellations, and not reset
    /// to 0 when the last term cancels.
    num_qubits: u32,
    /// The coefficient of each distinct Pauli string, in insertion order.
    terms: IndexMap<TermKey, Complex64, RandomState>,
}

impl SpinOperator {
    /// The operator with no terms acting on no qubits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The operator with no terms acting on `num_qubits` qubits.
    pub fn zero(num_qubits: u32) -> Self {
        Self {
            num_qubits,
            terms: IndexMap::default(),
        }
    }

    /// Create a zero operator with pre-allocated space for the given number of terms.
    pub fn with_capacity(num_qubits: u32, num_terms: usize) -> Self {
        Self {
            num_qubits,
            terms: IndexMap::with_capacity_and_hasher(num_terms, RandomState::new()),
        }
    }

    /// A single-term operator with unit coefficient, acting as `pauli` on `qubit` and as the
    /// identity on every lower qubit.  Its width is `qubit + 1`.
    ///
    /// # Panics
    ///
    /// If `qubit` is greater than [MAX_QUBIT_INDEX](crate::MAX_QUBIT_INDEX), since the width
    /// would not fit in a `u32`.  The same holds for [i](Self::i), [x](Self::x), [y](Self::y) and
    /// [z](Self::z).
    #[track_caller]
    pub fn single(qubit: u32, pauli: Pauli) -> Self {
        check_qubit_index(qubit);
        let mut out = Self::with_capacity(qubit + 1, 1);
        out.add_term(TermKey::single(qubit, pauli), C_ONE);
        out
    }

    /// The identity operator on `qubit`, with width `qubit + 1`.
    #[track_caller]
    pub fn i(qubit: u32) -> Self {
        Self::single(qubit, Pauli::I)
    }

    /// Pauli X on `qubit`.
    #[track_caller]
    pub fn x(qubit: u32) -> Self {
        Self::single(qubit, Pauli::X)
    }

    /// Pauli Y on `qubit`.
    #[track_caller]
    pub fn y(qubit: u32) -> Self {
        Self::single(qubit, Pauli::Y)
    }

    /// Pauli Z on `qubit`.
    #[track_caller]
    pub fn z(qubit: u32) -> Self {
        Self::single(qubit, Pauli::Z)
    }

    /// Parse a dense Pauli word, such as `"XXIZ"`, into a single-term operator with unit
    /// coefficient.  The letter at position `k` is the operator on qubit `k`, and the width of the
    /// result is the length of the word.
    pub fn from_word(word: &str) -> Result<Self, LabelError> {
        let paulis = word
            .chars()
            .enumerate()
            .map(|(position, symbol)| {
                u8::try_from(symbol)
                    .ok()
                    .and_then(|byte| Pauli::try_from_u8(byte).ok())
                    .ok_or(LabelError::InvalidPauliSymbol { symbol, position })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Self::with_capacity(paulis.len() as u32, 1);
        out.add_term(TermKey::from_paulis(paulis), C_ONE);
        Ok(out)
    }

    /// Build an operator from `(key, coefficient)` pairs, merging repeated keys.
    pub fn from_terms<I>(num_qubits: u32, terms: I) -> Self
    where
        I: IntoIterator<Item = (TermKey, Complex64)>,
    {
        let terms = terms.into_iter();
        let mut out = Self::with_capacity(num_qubits, terms.size_hint().0);
        for (key, coeff) in terms {
            out.add_term(key, coeff);
        }
        out
    }

    /// Build an operator from the format returned by [raw_data](Self::raw_data).
    ///
    /// Every row holds the `x` bits then the `z` bits of one term, so all rows must share one even
    /// length `2 * num_qubits`.  Repeated rows are merged.
    pub fn from_raw_data(rows: &[Vec<bool>], coeffs: &[Complex64]) -> Result<Self, CoherenceError> {
        if rows.len() != coeffs.len() {
            return Err(CoherenceError::MismatchedTermCount {
                rows: rows.len(),
                coeffs: coeffs.len(),
            });
        }
        let width = rows.first().map_or(0, Vec::len);
        if let Some((row, bits)) = rows
            .iter()
            .enumerate()
            .find(|(_, bits)| bits.len() != width || bits.len() % 2 != 0)
        {
            return Err(CoherenceError::BadRowLength {
                row,
                len: bits.len(),
            });
        }
        let num_qubits = (width / 2) as u32;
        Ok(Self::from_terms(
            num_qubits,
            rows.iter().zip(coeffs).map(|(bits, coeff)| {
                let (x, z) = bits.split_at(num_qubits as usize);
                (TermKey::from_bits(x, z), *coeff)
            }),
        ))
    }

    /// The width of the operator.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// The number of distinct terms with non-zero coefficient.
    #[inline]
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Is every stored term proportional to the identity?
    ///
    /// This is vacuously true for an operator with no terms, and ignores the coefficient values.
    pub fn is_identity(&self) -> bool {
        self.terms.keys().all(TermKey::is_identity)
    }

    /// Zero-pad every term of the operator to act on at least `num_qubits` qubits.  This never
    /// shrinks the operator.
    #[inline]
    pub fn widen(&mut self, num_qubits: u32) {
        self.num_qubits = self.num_qubits.max(num_qubits);
    }

    /// The coefficient of the term with the given key, which is zero if the term is absent.
    pub fn coeff(&self, key: &TermKey) -> Complex64 {
        self.terms.get(key).copied().unwrap_or(C_ZERO)
    }

    /// Get a view onto the term at position `index` of the iteration order.
    ///
    /// # Panics
    ///
    /// If the index is out of bounds.
    pub fn term(&self, index: usize) -> SpinTermView<'_> {
        let Some((key, coeff)) = self.terms.get_index(index) else {
            panic!(
                "index {index} out of bounds for an operator with {} terms",
                self.num_terms()
            );
        };
        SpinTermView {
            num_qubits: self.num_qubits,
            coeff: *coeff,
            key,
        }
    }

    /// Get an iterator over the individual terms of the operator.
    ///
    /// The order is the insertion order of the terms, which is stable across repeated iterations
    /// of an unmodified operator.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            num_qubits: self.num_qubits,
            inner: self.terms.iter(),
        }
    }

    /// Call `visit` once for every term, in iteration order.
    pub fn for_each_term<F>(&self, visit: F)
    where
        F: FnMut(SpinTermView<'_>),
    {
        self.iter().for_each(visit)
    }

    /// The canonical inspection format of the operator: for every term in iteration order, the
    /// `x` bits followed by the `z` bits (both zero-padded to the operator width), and the
    /// coefficients in the same order.
    pub fn raw_data(&self) -> (Vec<Vec<bool>>, Vec<Complex64>) {
        self.terms
            .iter()
            .map(|(key, coeff)| {
                let mut bits = Vec::new();
                key.extend_bits(self.num_qubits, &mut bits);
                (bits, *coeff)
            })
            .unzip()
    }

    /// Merge a single term into the operator, summing coefficients with any existing term of the
    /// same key.  The operator is widened to fit the key if necessary.
    pub fn add_term(&mut self, key: TermKey, coeff: Complex64) {
        self.widen(key.min_qubits());
        match self.terms.entry(key) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += coeff;
                if entry.get().is_zero() {
                    entry.shift_remove();
                }
            }
            Entry::Vacant(entry) => {
                if !coeff.is_zero() {
                    entry.insert(coeff);
                }
            }
        }
    }

    /// Add a multiple of the identity, as a term on the all-identity key.
    fn add_scalar(&mut self, scalar: Complex64) {
        self.add_term(TermKey::identity(), scalar);
    }

    /// Multiply every coefficient by `scalar`, dropping everything if the result is zero.
    fn scale(&mut self, scalar: Complex64) {
        if scalar.is_zero() {
            self.terms.clear();
        } else {
            self.terms.values_mut().for_each(|coeff| *coeff *= scalar);
            self.terms.retain(|_, coeff| !coeff.is_zero());
        }
    }

    /// The Pauli product `self * other`.
    ///
    /// Every pair of terms is multiplied with the exact phase rule of [TermKey::compose], and the
    /// products are merged by key, so colliding cross terms have their coefficients summed.
    pub fn compose(&self, other: &SpinOperator) -> SpinOperator {
        let mut out = SpinOperator::with_capacity(
            self.num_qubits.max(other.num_qubits),
            self.num_terms() * other.num_terms(),
        );
        for (left, left_coeff) in self.terms.iter() {
            for (right, right_coeff) in other.terms.iter() {
                let (key, phase) = left.compose(right);
                *out.terms.entry(key).or_insert(C_ZERO) +=
                    left_coeff * right_coeff * phase_factor(phase);
            }
        }
        out.terms.retain(|_, coeff| !coeff.is_zero());
        out
    }

    /// The Hermitian adjoint.  Pauli strings are Hermitian, so only the coefficients change.
    pub fn adjoint(&self) -> SpinOperator {
        SpinOperator {
            num_qubits: self.num_qubits,
            terms: self
                .terms
                .iter()
                .map(|(key, coeff)| (key.clone(), coeff.conj()))
                .collect(),
        }
    }

    /// Remove every term whose coefficient has absolute value less than or equal to `tol`.
    pub fn simplify(&mut self, tol: f64) {
        self.terms.retain(|_, coeff| coeff.norm() > tol);
    }

    /// Compare two operators term by term, allowing each coefficient to differ by the given
    /// tolerances.  A key present in only one operator compares against zero.  The widths of the
    /// operators are not compared.
    pub fn approx_eq(&self, other: &SpinOperator, abs_tol: f64, rel_tol: f64) -> bool {
        let close = |left: Complex64, right: Complex64| {
            ::approx::relative_eq!(left, right, epsilon = abs_tol, max_relative = rel_tol)
        };
        self.terms
            .iter()
            .all(|(key, coeff)| close(*coeff, other.coeff(key)))
            && other
                .terms
                .iter()
                .filter(|(key, _)| !self.terms.contains_key(*key))
                .all(|(_, coeff)| close(*coeff, C_ZERO))
    }
}

impl PartialEq for SpinOperator {
    fn eq(&self, other: &SpinOperator) -> bool {
        self.approx_eq(other, EQ_ABS_TOL, EQ_REL_TOL)
    }
}

impl fmt::Display for SpinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

/// Iterator over the terms of a [SpinOperator].  Created by [SpinOperator::iter].
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    num_qubits: u32,
    inner: indexmap::map::Iter<'a, TermKey, Complex64>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = SpinTermView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, coeff)| SpinTermView {
            num_qubits: self.num_qubits,
            coeff: *coeff,
            key,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
impl ExactSizeIterator for Iter<'_> {}
impl ::std::iter::FusedIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a SpinOperator {
    type Item = SpinTermView<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl ::std::ops::AddAssign<&SpinOperator> for SpinOperator {
    fn add_assign(&mut self, rhs: &SpinOperator) {
        self.widen(rhs.num_qubits);
        self.terms.reserve(rhs.num_terms());
        for (key, coeff) in rhs.terms.iter() {
            self.add_term(key.clone(), *coeff);
        }
    }
}
impl ::std::ops::AddAssign for SpinOperator {
    fn add_assign(&mut self, rhs: SpinOperator) {
        *self += &rhs;
    }
}
impl ::std::ops::Add<&SpinOperator> for SpinOperator {
    type Output = SpinOperator;

    fn add(mut self, rhs: &SpinOperator) -> SpinOperator {
        self += rhs;
        self
    }
}
impl ::std::ops::Add for SpinOperator {
    type Output = SpinOperator;

    fn add(mut self, rhs: SpinOperator) -> SpinOperator {
        self += &rhs;
        self
    }
}
impl ::std::ops::Add for &SpinOperator {
    type Output = SpinOperator;

    fn add(self, rhs: &SpinOperator) -> SpinOperator {
        self.clone() + rhs
    }
}

impl ::std::ops::SubAssign<&SpinOperator> for SpinOperator {
    fn sub_assign(&mut self, rhs: &SpinOperator) {
        self.widen(rhs.num_qubits);
        self.terms.reserve(rhs.num_terms());
        for (key, coeff) in rhs.terms.iter() {
            self.add_term(key.clone(), -coeff);
        }
    }
}
impl ::std::ops::SubAssign for SpinOperator {
    fn sub_assign(&mut self, rhs: SpinOperator) {
        *self -= &rhs;
    }
}
impl ::std::ops::Sub<&SpinOperator> for SpinOperator {
    type Output = SpinOperator;

    fn sub(mut self, rhs: &SpinOperator) -> SpinOperator {
        self -= rhs;
        self
    }
}
impl ::std::ops::Sub for SpinOperator {
    type Output = SpinOperator;

    fn sub(mut self, rhs: SpinOperator) -> SpinOperator {
        self -= &rhs;
        self
    }
}
impl ::std::ops::Sub for &SpinOperator {
    type Output = SpinOperator;

    fn sub(self, rhs: &SpinOperator) -> SpinOperator {
        self.clone() - rhs
    }
}

impl ::std::ops::MulAssign<&SpinOperator> for SpinOperator {
    fn mul_assign(&mut self, rhs: &SpinOperator) {
        *self = self.compose(rhs);
    }
}
impl ::std::ops::MulAssign for SpinOperator {
    fn mul_assign(&mut self, rhs: SpinOperator) {
        *self = self.compose(&rhs);
    }
}
impl ::std::ops::Mul for &SpinOperator {
    type Output = SpinOperator;

    fn mul(self, rhs: &SpinOperator) -> SpinOperator {
        self.compose(rhs)
    }
}
impl ::std::ops::Mul<&SpinOperator> for SpinOperator {
    type Output = SpinOperator;

    fn mul(self, rhs: &SpinOperator) -> SpinOperator {
        self.compose(rhs)
    }
}
impl ::std::ops::Mul for SpinOperator {
    type Output = SpinOperator;

    fn mul(self, rhs: SpinOperator) -> SpinOperator {
        self.compose(&rhs)
    }
}

impl ::std::ops::Neg for &SpinOperator {
    type Output = SpinOperator;

    fn neg(self) -> SpinOperator {
        SpinOperator {
            num_qubits: self.num_qubits,
            terms: self
                .terms
                .iter()
                .map(|(key, coeff)| (key.clone(), -coeff))
                .collect(),
        }
    }
}
impl ::std::ops::Neg for SpinOperator {
    type Output = SpinOperator;

    fn neg(mut self) -> SpinOperator {
        self.terms.values_mut().for_each(|coeff| *coeff = -*coeff);
        self
    }
}

/// Implement the mixed scalar-operator arithmetic for one scalar type.  Adding a scalar adds it
/// as the coefficient of the identity term; `scalar - op` is `(-op) + scalar`.
macro_rules! impl_scalar_ops {
    ($scalar:ty) => {
        impl ::std::ops::AddAssign<$scalar> for SpinOperator {
            fn add_assign(&mut self, rhs: $scalar) {
                self.add_scalar(Complex64::from(rhs));
            }
        }
        impl ::std::ops::Add<$scalar> for SpinOperator {
            type Output = SpinOperator;

            fn add(mut self, rhs: $scalar) -> SpinOperator {
                self += rhs;
                self
            }
        }
        impl ::std::ops::Add<$scalar> for &SpinOperator {
            type Output = SpinOperator;

            fn add(self, rhs: $scalar) -> SpinOperator {
                self.clone() + rhs
            }
        }
        impl ::std::ops::Add<SpinOperator> for $scalar {
            type Output = SpinOperator;

            fn add(self, rhs: SpinOperator) -> SpinOperator {
                rhs + self
            }
        }
        impl ::std::ops::Add<&SpinOperator> for $scalar {
            type Output = SpinOperator;

            fn add(self, rhs: &SpinOperator) -> SpinOperator {
                rhs + self
            }
        }

        impl ::std::ops::SubAssign<$scalar> for SpinOperator {
            fn sub_assign(&mut self, rhs: $scalar) {
                self.add_scalar(-Complex64::from(rhs));
            }
        }
        impl ::std::ops::Sub<$scalar> for SpinOperator {
            type Output = SpinOperator;

            fn sub(mut self, rhs: $scalar) -> SpinOperator {
                self -= rhs;
                self
            }
        }
        impl ::std::ops::Sub<$scalar> for &SpinOperator {
            type Output = SpinOperator;

            fn sub(self, rhs: $scalar) -> SpinOperator {
                self.clone() - rhs
            }
        }
        impl ::std::ops::Sub<SpinOperator> for $scalar {
            type Output = SpinOperator;

            fn sub(self, rhs: SpinOperator) -> SpinOperator {
                -rhs + self
            }
        }
        impl ::std::ops::Sub<&SpinOperator> for $scalar {
            type Output = SpinOperator;

            fn sub(self, rhs: &SpinOperator) -> SpinOperator {
                -rhs + self
            }
        }

        impl ::std::ops::MulAssign<$scalar> for SpinOperator {
            fn mul_assign(&mut self, rhs: $scalar) {
                self.scale(Complex64::from(rhs));
            }
        }
        impl ::std::ops::Mul<$scalar> for SpinOperator {
            type Output = SpinOperator;

            fn mul(mut self, rhs: $scalar) -> SpinOperator {
                self *= rhs;
                self
            }
        }
        impl ::std::ops::Mul<$scalar> for &SpinOperator {
            type Output = SpinOperator;

            fn mul(self, rhs: $scalar) -> SpinOperator {
                self.clone() * rhs
            }
        }
        impl ::std::ops::Mul<SpinOperator> for $scalar {
            type Output = SpinOperator;

            fn mul(self, rhs: SpinOperator) -> SpinOperator {
                rhs * self
            }
        }
        impl ::std::ops::Mul<&SpinOperator> for $scalar {
            type Output = SpinOperator;

            fn mul(self, rhs: &SpinOperator) -> SpinOperator {
                rhs * self
            }
        }
    };
}

impl_scalar_ops!(f64);
impl_scalar_ops!(Complex64);

impl ::std::iter::Sum for SpinOperator {
    fn sum<I: Iterator<Item = SpinOperator>>(iter: I) -> SpinOperator {
        iter.fold(SpinOperator::empty(), |acc, op| acc + op)
    }
}
impl<'a> ::std::iter::Sum<&'a SpinOperator> for SpinOperator {
    fn sum<I: Iterator<Item = &'a SpinOperator>>(iter: I) -> SpinOperator {
        iter.fold(SpinOperator::empty(), |acc, op| acc + op)
    }
}
impl FromIterator<SpinOperator> for SpinOperator {
    fn from_iter<I: IntoIterator<Item = SpinOperator>>(iter: I) -> SpinOperator {
        iter.into_iter().sum()
    }
}
