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

use num_complex::Complex64;
use smallvec::SmallVec;

use crate::pauli::Pauli;
use crate::spin_op::SpinOperator;

/// Storage for one of the two symplectic bit vectors.  Qubit `q` lives in bit `q % 64` of word
/// `q / 64`.  Almost every operator we see in practice fits into a single word.
type Words = SmallVec<[u64; 1]>;

/// The highest qubit a single-qubit constructor accepts.  Widths are `u32`, and an operator acting
/// on qubit `q` has width `q + 1`, so `u32::MAX` itself can never be acted on.
pub const MAX_QUBIT_INDEX: u32 = u32::MAX - 1;

#[track_caller]
pub(crate) fn check_qubit_index(qubit: u32) {
    if qubit > MAX_QUBIT_INDEX {
        panic!("qubit index {qubit} exceeds the largest supported qubit index {MAX_QUBIT_INDEX}");
    }
}

/// The symplectic key of a single Pauli string, ignoring any coefficient.
///
/// The key is stored in a width-agnostic canonical form: `x` and `z` always have the same number
/// of words, and trailing words that are zero in both vectors are never stored.  Two keys that
/// differ only in how many identities they are padded with are therefore the same key, and
/// zero-extending a key to a larger qubit count (see [SpinOperator::widen]) never needs to touch
/// the stored bits.  The all-identity key is the key with no words at all.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TermKey {
    x: Words,
    z: Words,
}

impl TermKey {
    /// The key of the all-identity Pauli string.
    pub fn identity() -> Self {
        Self::default()
    }

    /// The key of a Pauli string that is the identity everywhere except on `qubit`.
    ///
    /// # Panics
    ///
    /// If `qubit` is greater than [MAX_QUBIT_INDEX].
    #[track_caller]
    pub fn single(qubit: u32, pauli: Pauli) -> Self {
        check_qubit_index(qubit);
        let word = (qubit / u64::BITS) as usize;
        let bit = 1u64 << (qubit % u64::BITS);
        let mut x = Words::from_elem(0, word + 1);
        let mut z = Words::from_elem(0, word + 1);
        if pauli.x_bit() {
            x[word] |= bit;
        }
        if pauli.z_bit() {
            z[word] |= bit;
        }
        let mut out = Self { x, z };
        out.trim();
        out
    }

    /// Build a key from dense per-qubit `x` and `z` bits.
    ///
    /// # Panics
    ///
    /// If `x` and `z` are not the same length.
    #[track_caller]
    pub fn from_bits(x: &[bool], z: &[bool]) -> Self {
        if x.len() != z.len() {
            panic!(
                "x bits ({}) and z bits ({}) must be the same length",
                x.len(),
                z.len()
            );
        }
        let mut out = Self {
            x: pack(x),
            z: pack(z),
        };
        out.trim();
        out
    }

    /// Build a key from a sequence of single-qubit operators, where the `k`th item acts on qubit
    /// `k`.
    pub fn from_paulis<I>(paulis: I) -> Self
    where
        I: IntoIterator<Item = Pauli>,
    {
        let (x, z): (Vec<bool>, Vec<bool>) = paulis
            .into_iter()
            .map(|pauli| (pauli.x_bit(), pauli.z_bit()))
            .unzip();
        Self::from_bits(&x, &z)
    }

    /// Is this the key of the all-identity string?
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.x.is_empty()
    }

    /// The smallest qubit count that can hold this key without truncation, i.e. one more than the
    /// highest qubit carrying a non-identity operator.  Keys never reach past [MAX_QUBIT_INDEX], so
    /// this always fits.
    pub fn min_qubits(&self) -> u32 {
        match (self.x.last(), self.z.last()) {
            (Some(x), Some(z)) => {
                let top = x | z;
                (self.x.len() as u32 - 1) * u64::BITS + (u64::BITS - top.leading_zeros())
            }
            _ => 0,
        }
    }

    #[inline]
    pub fn x_bit(&self, qubit: u32) -> bool {
        bit(&self.x, qubit)
    }

    #[inline]
    pub fn z_bit(&self, qubit: u32) -> bool {
        bit(&self.z, qubit)
    }

    /// The operator on `qubit`.  Qubits past the stored words are implicitly the identity.
    #[inline]
    pub fn pauli(&self, qubit: u32) -> Pauli {
        Pauli::from_bits(self.x_bit(qubit), self.z_bit(qubit))
    }

    /// The packed `x` and `z` words of this key, least-significant qubits first.
    pub fn words(&self) -> (&[u64], &[u64]) {
        (&self.x, &self.z)
    }

    /// The number of Y operators in the string.
    pub fn num_ys(&self) -> u32 {
        self.x
            .iter()
            .zip(self.z.iter())
            .map(|(x, z)| (x & z).count_ones())
            .sum()
    }

    /// Write the dense bits of this key, zero-padded to `num_qubits`, into `out`: first every
    /// `x` bit in qubit order, then every `z` bit.
    pub fn extend_bits(&self, num_qubits: u32, out: &mut Vec<bool>) {
        out.reserve(2 * num_qubits as usize);
        out.extend((0..num_qubits).map(|q| self.x_bit(q)));
        out.extend((0..num_qubits).map(|q| self.z_bit(q)));
    }

    /// Multiply two Pauli strings, `self * other`.
    ///
    /// The output key is the word-wise XOR of the inputs.  The second return value is the
    /// exponent `k` of the phase $i^k$ picked up by the product, in `0..4`.
    ///
    /// Writing each single-qubit operator as $i^{xz} X^x Z^z$, moving the `Z` of the left operand
    /// through the `X` of the right one contributes a factor $(-1)^{z_1 x_2}$, so the phase of a
    /// product is $i^{x_1 z_1 + x_2 z_2 + 2 z_1 x_2 - x_3 z_3}$ per qubit.  This means each term of
    /// the exponent is a popcount over whole words.
    pub fn compose(&self, other: &TermKey) -> (TermKey, u8) {
        let len = self.x.len().max(other.x.len());
        let mut x = Words::with_capacity(len);
        let mut z = Words::with_capacity(len);
        // Both counts are only ever needed modulo 4, and `u32::MAX + 1` is divisible by 4, so the
        // wrapping arithmetic is exact.
        let mut positive = 0u32;
        let mut negative = 0u32;
        for i in 0..len {
            let (x1, z1) = word_pair(self, i);
            let (x2, z2) = word_pair(other, i);
            let (x3, z3) = (x1 ^ x2, z1 ^ z2);
            positive = positive
                .wrapping_add((x1 & z1).count_ones())
                .wrapping_add((x2 & z2).count_ones())
                .wrapping_add(2 * (z1 & x2).count_ones());
            negative = negative.wrapping_add((x3 & z3).count_ones());
            x.push(x3);
            z.push(z3);
        }
        let mut out = TermKey { x, z };
        out.trim();
        (out, (positive.wrapping_sub(negative) & 0b11) as u8)
    }

    fn trim(&mut self) {
        while let (Some(&0), Some(&0)) = (self.x.last(), self.z.last()) {
            self.x.pop();
            self.z.pop();
        }
    }
}

#[inline]
fn word_pair(key: &TermKey, index: usize) -> (u64, u64) {
    (
        key.x.get(index).copied().unwrap_or(0),
        key.z.get(index).copied().unwrap_or(0),
    )
}

#[inline]
fn bit(words: &Words, qubit: u32) -> bool {
    words
        .get((qubit / u64::BITS) as usize)
        .is_some_and(|word| (word >> (qubit % u64::BITS)) & 1 == 1)
}

fn pack(bits: &[bool]) -> Words {
    bits.chunks(u64::BITS as usize)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, &b)| acc | ((b as u64) << i))
        })
        .collect()
}

/// The complex number $i^k$.
#[inline]
pub fn phase_factor(exponent: u8) -> Complex64 {
    match exponent % 4 {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        3 => Complex64::new(0.0, -1.0),
        _ => unreachable!("'x % 4' has only four possible values"),
    }
}

/// A view object onto a single term of a [SpinOperator].
///
/// The `num_qubits` is that of the whole operator; the key itself does not store its width, so
/// every accessor here pads with identities up to it.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SpinTermView<'a> {
    pub num_qubits: u32,
    pub coeff: Complex64,
    pub key: &'a TermKey,
}

impl SpinTermView<'_> {
    #[inline]
    pub fn coeff(&self) -> Complex64 {
        self.coeff
    }

    /// The operator acting on `qubit`.
    #[inline]
    pub fn pauli(&self, qubit: u32) -> Pauli {
        self.key.pauli(qubit)
    }

    /// Call `visit` once for every qubit of the term, in increasing qubit order, with the
    /// operator on that qubit and its index.
    pub fn for_each_pauli<F>(&self, mut visit: F)
    where
        F: FnMut(Pauli, u32),
    {
        for qubit in 0..self.num_qubits {
            visit(self.key.pauli(qubit), qubit);
        }
    }

    /// The dense label of this term, with qubit 0 as the first letter.  This is the format
    /// accepted by [SpinOperator::from_word].
    pub fn to_label(&self) -> String {
        (0..self.num_qubits)
            .map(|qubit| self.key.pauli(qubit).label())
            .collect()
    }

    /// Convert this view into an owning [SpinTerm] of the same data.
    pub fn to_term(&self) -> SpinTerm {
        SpinTerm {
            num_qubits: self.num_qubits,
            coeff: self.coeff,
            key: self.key.clone(),
        }
    }
}

impl fmt::Display for SpinTermView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.coeff, self.to_label())
    }
}

/// A single term from a complete [SpinOperator], owning its key.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinTerm {
    num_qubits: u32,
    coeff: Complex64,
    key: TermKey,
}

impl SpinTerm {
    pub fn new(num_qubits: u32, coeff: Complex64, key: TermKey) -> Self {
        Self {
            num_qubits: num_qubits.max(key.min_qubits()),
            coeff,
            key,
        }
    }

    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    pub fn coeff(&self) -> Complex64 {
        self.coeff
    }

    pub fn key(&self) -> &TermKey {
        &self.key
    }

    pub fn view(&self) -> SpinTermView<'_> {
        SpinTermView {
            num_qubits: self.num_qubits,
            coeff: self.coeff,
            key: &self.key,
        }
    }

    /// Convert this term into a single-term [SpinOperator].
    pub fn to_operator(&self) -> SpinOperator {
        let mut out = SpinOperator::zero(self.num_qubits);
        out.add_term(self.key.clone(), self.coeff);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(label: &str) -> TermKey {
        TermKey::from_paulis(label.bytes().map(|b| Pauli::try_from_u8(b).unwrap()))
    }

    #[test]
    fn trailing_identities_are_not_stored() {
        assert_eq!(key("XZ"), key("XZII"));
        assert_eq!(key("III"), TermKey::identity());
        assert!(key("IIII").is_identity());
        assert_eq!(TermKey::single(3, Pauli::I), TermKey::identity());
    }

    #[test]
    fn min_qubits_tracks_the_highest_non_identity() {
        assert_eq!(TermKey::identity().min_qubits(), 0);
        assert_eq!(key("X").min_qubits(), 1);
        assert_eq!(key("IIZII").min_qubits(), 3);
        assert_eq!(TermKey::single(64, Pauli::Y).min_qubits(), 65);
        assert_eq!(TermKey::single(127, Pauli::X).min_qubits(), 128);
    }

    #[test]
    #[should_panic(expected = "largest supported qubit index")]
    fn single_rejects_qubit_past_the_width_range() {
        TermKey::single(u32::MAX, Pauli::X);
    }

    #[test]
    fn single_qubit_products() {
        let cases = [
            ("X", "Y", "Z", 1),
            ("Y", "Z", "X", 1),
            ("Z", "X", "Y", 1),
            ("Y", "X", "Z", 3),
            ("Z", "Y", "X", 3),
            ("X", "Z", "Y", 3),
            ("X", "X", "I", 0),
            ("Y", "Y", "I", 0),
            ("Z", "Z", "I", 0),
            ("I", "Y", "Y", 0),
        ];
        for (left, right, expected, phase) in cases {
            assert_eq!(
                key(left).compose(&key(right)),
                (key(expected), phase),
                "{left} * {right}"
            );
        }
    }

    #[test]
    fn phases_accumulate_across_qubits_and_words() {
        // (X ⊗ Z)(Y ⊗ X) = (iZ) ⊗ (iY) = -Z ⊗ Y.
        assert_eq!(key("XZ").compose(&key("YX")), (key("ZY"), 2));
        let mut left = TermKey::single(70, Pauli::X);
        left = left.compose(&TermKey::single(1, Pauli::Z)).0;
        let right = TermKey::single(70, Pauli::Y)
            .compose(&TermKey::single(1, Pauli::X))
            .0;
        let (out, phase) = left.compose(&right);
        assert_eq!(out.pauli(70), Pauli::Z);
        assert_eq!(out.pauli(1), Pauli::Y);
        assert_eq!(phase, 2);
        assert_eq!(out.min_qubits(), 71);
    }

    #[test]
    fn bits_are_written_x_then_z() {
        let mut out = Vec::new();
        key("XY").extend_bits(3, &mut out);
        assert_eq!(out, vec![true, true, false, false, true, false]);
    }

    #[test]
    fn view_visits_every_qubit_in_order() {
        let key = key("XIZ");
        let view = SpinTermView {
            num_qubits: 4,
            coeff: Complex64::new(2.0, 0.0),
            key: &key,
        };
        let mut seen = Vec::new();
        view.for_each_pauli(|pauli, qubit| seen.push((qubit, pauli)));
        assert_eq!(
            seen,
            vec![(0, Pauli::X), (1, Pauli::I), (2, Pauli::Z), (3, Pauli::I)]
        );
        assert_eq!(view.to_label(), "XIZI");
        assert_eq!(view.to_string(), "(2+0i) XIZI");
    }
}
