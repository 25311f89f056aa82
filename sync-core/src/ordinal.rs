//! Arbitrary-precision sibling ordering keys.
//!
//! An [`Ordinal`] is a sequence of base-256 digits read as a fraction in
//! `[0, 1)`: `[0x80, 0, ...]` is one half. Keys compare lexicographically as
//! unsigned bytes, which matches numeric order because every valid key is
//! canonical (no trailing zero digits beyond [`MIN_LENGTH`]).
//!
//! There is always room between two distinct keys, so inserting a sibling never
//! renumbers its neighbours: [`Ordinal::create_between`] grows the key by one
//! digit when the two bounds are adjacent at their current length.
//!
//! The minimum length exists for interoperability with the older fixed-width
//! `i64` positions; see [`Ordinal::from_legacy_i64`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The zero digit.
pub const ZERO_DIGIT: u8 = 0;
/// The digit halfway through the radix.
pub const MID_DIGIT: u8 = 128;
/// The largest digit.
pub const MAX_DIGIT: u8 = u8::MAX;
/// Number of distinct digit values.
pub const RADIX: u16 = MAX_DIGIT as u16 + 1;
/// Minimum number of digits in a valid ordinal.
pub const MIN_LENGTH: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Reasons a byte string is not a valid ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrdinalError {
    /// Fewer than [`MIN_LENGTH`] digits.
    #[error("ordinal too short: {len} digits (minimum {MIN_LENGTH})")]
    TooShort {
        /// Number of digits supplied.
        len: usize,
    },
    /// Every digit is zero; nothing could sort before it.
    #[error("ordinal must contain a non-zero digit")]
    AllZero,
    /// A zero digit trails past the minimum length.
    #[error("ordinal has a trailing zero digit beyond the minimum length")]
    TrailingZero,
}

/// A totally ordered, arbitrary-precision position among siblings.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Ordinal(Vec<u8>);

impl Ordinal {
    /// The conventional first key handed out in an empty parent.
    pub fn initial() -> Self {
        let mut digits = vec![ZERO_DIGIT; MIN_LENGTH];
        digits[0] = MID_DIGIT;
        Self(digits)
    }

    /// Validate raw digits read from storage.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, OrdinalError> {
        validate(&bytes)?;
        Ok(Self(bytes))
    }

    /// The raw digits.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of digits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; valid ordinals have at least [`MIN_LENGTH`] digits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Create a key strictly between `lower` and `upper`.
    ///
    /// `None` for `lower` means "before everything", `None` for `upper` means
    /// "after everything".
    ///
    /// # Panics
    ///
    /// Panics if both bounds are given and `lower >= upper`. Ordering the
    /// bounds is the caller's contract.
    pub fn create_between(lower: Option<&Ordinal>, upper: Option<&Ordinal>) -> Self {
        if let (Some(lo), Some(hi)) = (lower, upper) {
            assert!(
                lo < hi,
                "create_between needs lower < upper (got {} and {})",
                lo,
                hi
            );
        }

        let mut width = MIN_LENGTH
            .max(lower.map_or(0, Ordinal::len))
            .max(upper.map_or(0, Ordinal::len));

        // At most two rounds: if the bounds are adjacent at `width` digits, one
        // more digit puts RADIX units between them.
        loop {
            let lo = widen(lower.map(Ordinal::as_bytes), width, false);
            let hi = widen(upper.map(Ordinal::as_bytes), width, true);
            let gap = subtract(&hi, &lo);
            if spans_at_least_two(&gap) {
                let mid = add(&lo, &halve(&gap));
                debug_assert_eq!(mid[0], 0, "midpoint must stay below one");
                return Self::canonical(mid[1..].to_vec());
            }
            width += 1;
        }
    }

    /// Create a key that sorts before `self`.
    pub fn create_before(&self) -> Self {
        Self::create_between(None, Some(self))
    }

    /// Create a key that sorts after `self`.
    pub fn create_after(&self) -> Self {
        Self::create_between(Some(self), None)
    }

    /// Embed a legacy `i64` position, preserving order.
    ///
    /// `a < b` as integers if and only if
    /// `from_legacy_i64(a) < from_legacy_i64(b)`.
    pub fn from_legacy_i64(position: i64) -> Self {
        let shifted = (position as u64) ^ SIGN_BIT;
        let mut digits = shifted.to_be_bytes().to_vec();
        if shifted == 0 {
            // The all-zero key is invalid; a trailing mid digit keeps i64::MIN
            // below i64::MIN + 1 (which ends in a 1 at the eighth digit).
            digits.push(MID_DIGIT);
        }
        Self(digits)
    }

    /// Project back onto a legacy `i64` position.
    ///
    /// Lossy: only the first eight digits are read, so ordinals created by
    /// [`Ordinal::create_between`] generally do not round-trip, and distinct
    /// ordinals may map to the same integer. Exact for values produced by
    /// [`Ordinal::from_legacy_i64`].
    pub fn to_legacy_i64(&self) -> i64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..MIN_LENGTH]);
        (u64::from_be_bytes(head) ^ SIGN_BIT) as i64
    }

    fn canonical(mut digits: Vec<u8>) -> Self {
        while digits.len() > MIN_LENGTH && digits.last() == Some(&ZERO_DIGIT) {
            digits.pop();
        }
        Self(digits)
    }
}

impl TryFrom<Vec<u8>> for Ordinal {
    type Error = OrdinalError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<Ordinal> for Vec<u8> {
    fn from(ordinal: Ordinal) -> Self {
        ordinal.0
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ordinal({})", hex::encode(&self.0))
    }
}

fn validate(bytes: &[u8]) -> Result<(), OrdinalError> {
    if bytes.len() < MIN_LENGTH {
        return Err(OrdinalError::TooShort { len: bytes.len() });
    }
    if bytes.iter().all(|&d| d == ZERO_DIGIT) {
        return Err(OrdinalError::AllZero);
    }
    if bytes.len() > MIN_LENGTH && bytes.last() == Some(&ZERO_DIGIT) {
        return Err(OrdinalError::TrailingZero);
    }
    Ok(())
}

/// Fixed-point form with one integer digit in front: `[int, d0, .., d(width-1)]`.
///
/// A missing lower bound is zero; a missing upper bound is one.
fn widen(digits: Option<&[u8]>, width: usize, missing_is_one: bool) -> Vec<u8> {
    let mut out = vec![ZERO_DIGIT; width + 1];
    match digits {
        Some(d) => out[1..=d.len()].copy_from_slice(d),
        None if missing_is_one => out[0] = 1,
        None => {}
    }
    out
}

fn subtract(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert_eq!(a.len(), b.len());
    let mut out = vec![ZERO_DIGIT; a.len()];
    let mut borrow = 0i16;
    for i in (0..a.len()).rev() {
        let mut d = a[i] as i16 - b[i] as i16 - borrow;
        borrow = 0;
        if d < 0 {
            d += RADIX as i16;
            borrow = 1;
        }
        out[i] = d as u8;
    }
    out
}

fn add(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert_eq!(a.len(), b.len());
    let mut out = vec![ZERO_DIGIT; a.len()];
    let mut carry = 0u16;
    for i in (0..a.len()).rev() {
        let sum = a[i] as u16 + b[i] as u16 + carry;
        out[i] = (sum % RADIX) as u8;
        carry = sum / RADIX;
    }
    out
}

fn halve(a: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len());
    let mut rem = 0u16;
    for &d in a {
        let cur = rem * RADIX + d as u16;
        out.push((cur / 2) as u8);
        rem = cur % 2;
    }
    out
}

fn spans_at_least_two(gap: &[u8]) -> bool {
    match gap.split_last() {
        Some((&last, rest)) => rest.iter().any(|&d| d != ZERO_DIGIT) || last >= 2,
        None => false,
    }
}
