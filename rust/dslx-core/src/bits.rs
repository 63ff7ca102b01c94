//! Arbitrary-width bit vectors with hardware (wrap-around) semantics.

use crate::error::ValueError;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Whether a bit pattern is read as unsigned or two's-complement signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signedness {
    Unsigned,
    Signed,
}

impl Signedness {
    pub fn is_signed(self) -> bool {
        matches!(self, Signedness::Signed)
    }

    fn prefix(self) -> char {
        match self {
            Signedness::Unsigned => 'u',
            Signedness::Signed => 's',
        }
    }
}

/// A fixed-width bit vector.
///
/// The pattern is always strictly below `2^width`; every constructor either
/// checks or wraps to maintain that. Two values are equal only when width,
/// signedness and pattern all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BitsRepr")]
pub struct Bits {
    signedness: Signedness,
    width: usize,
    pattern: BigUint,
}

/// Serialized form of `Bits`; deserialization goes back through `Bits::new`.
#[derive(Deserialize)]
struct BitsRepr {
    signedness: Signedness,
    width: usize,
    pattern: BigUint,
}

impl TryFrom<BitsRepr> for Bits {
    type Error = ValueError;

    fn try_from(repr: BitsRepr) -> Result<Self, Self::Error> {
        Bits::new(repr.signedness, repr.width, repr.pattern)
    }
}

fn mask(width: usize) -> BigUint {
    (BigUint::one() << width) - 1u32
}

fn modulus(width: usize) -> BigInt {
    BigInt::from(BigUint::one() << width)
}

impl Bits {
    /// Builds a bit vector, rejecting patterns that do not fit in `width` bits.
    pub fn new(signedness: Signedness, width: usize, pattern: BigUint) -> Result<Self, ValueError> {
        if pattern.bits() > width as u64 {
            return Err(ValueError::range_error(format!(
                "pattern {} does not fit in {} bits",
                pattern, width
            )));
        }
        Ok(Self { signedness, width, pattern })
    }

    /// Builds a bit vector, keeping only the low `width` bits of `pattern`.
    pub fn wrapping(signedness: Signedness, width: usize, pattern: BigUint) -> Self {
        let pattern = pattern & mask(width);
        Self { signedness, width, pattern }
    }

    /// Builds a bit vector from a mathematical integer, modulo `2^width`.
    pub fn from_bigint(signedness: Signedness, width: usize, value: &BigInt) -> Self {
        let m = modulus(width);
        let mut r = value % &m;
        if r.sign() == Sign::Minus {
            r += &m;
        }
        Self {
            signedness,
            width,
            pattern: r.magnitude().clone(),
        }
    }

    pub fn from_u64(signedness: Signedness, width: usize, value: u64) -> Self {
        Self::wrapping(signedness, width, BigUint::from(value))
    }

    pub fn from_i64(signedness: Signedness, width: usize, value: i64) -> Self {
        Self::from_bigint(signedness, width, &BigInt::from(value))
    }

    pub fn ubits(width: usize, value: u64) -> Self {
        Self::from_u64(Signedness::Unsigned, width, value)
    }

    pub fn sbits(width: usize, value: i64) -> Self {
        Self::from_i64(Signedness::Signed, width, value)
    }

    pub fn zero(signedness: Signedness, width: usize) -> Self {
        Self {
            signedness,
            width,
            pattern: BigUint::zero(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn signedness(&self) -> Signedness {
        self.signedness
    }

    pub fn is_signed(&self) -> bool {
        self.signedness.is_signed()
    }

    pub fn pattern(&self) -> &BigUint {
        &self.pattern
    }

    pub fn is_zero(&self) -> bool {
        self.pattern.is_zero()
    }

    /// Most significant bit; false for the empty vector.
    pub fn msb(&self) -> bool {
        self.width > 0 && self.pattern.bit(self.width as u64 - 1)
    }

    /// Whether two vectors have the same type (width and signedness).
    pub fn same_type(&self, other: &Bits) -> bool {
        self.width == other.width && self.signedness == other.signedness
    }

    /// The integer this pattern denotes under its own signedness tag.
    pub fn to_bigint(&self) -> BigInt {
        self.interpret(self.signedness)
    }

    fn interpret(&self, signedness: Signedness) -> BigInt {
        let unsigned = BigInt::from(self.pattern.clone());
        if signedness.is_signed() && self.msb() {
            unsigned - modulus(self.width)
        } else {
            unsigned
        }
    }

    pub fn to_u64(&self) -> Result<u64, ValueError> {
        self.to_bigint().to_u64().ok_or_else(|| {
            ValueError::range_error(format!("{} does not fit in an unsigned 64-bit integer", self))
        })
    }

    pub fn to_i64(&self) -> Result<i64, ValueError> {
        self.to_bigint().to_i64().ok_or_else(|| {
            ValueError::range_error(format!("{} does not fit in a signed 64-bit integer", self))
        })
    }

    /// Interprets the pattern as an unsigned magnitude (shift amounts, indices).
    pub fn to_usize(&self) -> Option<usize> {
        self.pattern.to_usize()
    }

    // ── Arithmetic ────────────────────────────────────────────────────

    /// Truncates both operands to the narrower width and reads them under the
    /// left operand's signedness.
    fn narrowed(&self, rhs: &Bits) -> (usize, BigInt, BigInt) {
        let width = self.width.min(rhs.width);
        let lhs = Bits::wrapping(self.signedness, width, self.pattern.clone());
        let rhs = Bits::wrapping(self.signedness, width, rhs.pattern.clone());
        (width, lhs.to_bigint(), rhs.to_bigint())
    }

    pub fn add(&self, rhs: &Bits) -> Bits {
        let (width, a, b) = self.narrowed(rhs);
        Bits::from_bigint(self.signedness, width, &(a + b))
    }

    pub fn sub(&self, rhs: &Bits) -> Bits {
        let (width, a, b) = self.narrowed(rhs);
        Bits::from_bigint(self.signedness, width, &(a - b))
    }

    pub fn mul(&self, rhs: &Bits) -> Bits {
        let (width, a, b) = self.narrowed(rhs);
        Bits::from_bigint(self.signedness, width, &(a * b))
    }

    /// Truncating division; signed operands round toward zero.
    pub fn div(&self, rhs: &Bits) -> Result<Bits, ValueError> {
        let (width, a, b) = self.narrowed(rhs);
        if b.is_zero() {
            return Err(ValueError::DivisionByZero);
        }
        Ok(Bits::from_bigint(self.signedness, width, &(a / b)))
    }

    /// Truncating remainder; the sign follows the dividend.
    pub fn rem(&self, rhs: &Bits) -> Result<Bits, ValueError> {
        let (width, a, b) = self.narrowed(rhs);
        if b.is_zero() {
            return Err(ValueError::DivisionByZero);
        }
        Ok(Bits::from_bigint(self.signedness, width, &(a % b)))
    }

    pub fn negate(&self) -> Bits {
        Bits::from_bigint(self.signedness, self.width, &-self.to_bigint())
    }

    // ── Bitwise ───────────────────────────────────────────────────────

    fn check_same_width(&self, rhs: &Bits, op: &str) -> Result<(), ValueError> {
        if self.width != rhs.width {
            return Err(ValueError::type_error(format!(
                "{} requires operands of equal width, found {} and {}",
                op, self, rhs
            )));
        }
        Ok(())
    }

    pub fn and(&self, rhs: &Bits) -> Result<Bits, ValueError> {
        self.check_same_width(rhs, "and")?;
        Ok(self.with_pattern(&self.pattern & &rhs.pattern))
    }

    pub fn or(&self, rhs: &Bits) -> Result<Bits, ValueError> {
        self.check_same_width(rhs, "or")?;
        Ok(self.with_pattern(&self.pattern | &rhs.pattern))
    }

    pub fn xor(&self, rhs: &Bits) -> Result<Bits, ValueError> {
        self.check_same_width(rhs, "xor")?;
        Ok(self.with_pattern(&self.pattern ^ &rhs.pattern))
    }

    /// One's complement.
    pub fn invert(&self) -> Bits {
        self.with_pattern(&self.pattern ^ mask(self.width))
    }

    /// `self` becomes the most significant part of the result.
    pub fn concat(&self, low: &Bits) -> Bits {
        let pattern = (&self.pattern << low.width) | &low.pattern;
        Bits {
            signedness: self.signedness,
            width: self.width + low.width,
            pattern,
        }
    }

    fn shift_amount(&self, amount: &Bits) -> Option<usize> {
        amount.to_usize().filter(|n| *n < self.width)
    }

    pub fn shll(&self, amount: &Bits) -> Bits {
        match self.shift_amount(amount) {
            Some(n) => Bits::wrapping(self.signedness, self.width, &self.pattern << n),
            None => Bits::zero(self.signedness, self.width),
        }
    }

    pub fn shrl(&self, amount: &Bits) -> Bits {
        match self.shift_amount(amount) {
            Some(n) => self.with_pattern(&self.pattern >> n),
            None => Bits::zero(self.signedness, self.width),
        }
    }

    /// Arithmetic shift: sign-fills when the value is signed and negative.
    pub fn shra(&self, amount: &Bits) -> Bits {
        if !(self.is_signed() && self.msb()) {
            return self.shrl(amount);
        }
        match self.shift_amount(amount) {
            Some(n) => {
                let fill = mask(self.width) ^ mask(self.width - n);
                self.with_pattern((&self.pattern >> n) | fill)
            }
            None => self.with_pattern(mask(self.width)),
        }
    }

    fn with_pattern(&self, pattern: BigUint) -> Bits {
        Bits {
            signedness: self.signedness,
            width: self.width,
            pattern,
        }
    }

    // ── Comparison ────────────────────────────────────────────────────

    /// Orders two equal-width vectors under the left operand's signedness.
    pub fn compare(&self, rhs: &Bits) -> Result<Ordering, ValueError> {
        self.check_same_width(rhs, "comparison")?;
        Ok(self
            .interpret(self.signedness)
            .cmp(&rhs.interpret(self.signedness)))
    }

    // ── Bit utilities ─────────────────────────────────────────────────

    pub fn count_leading_zeros(&self) -> usize {
        self.width - self.pattern.bits() as usize
    }

    pub fn count_trailing_zeros(&self) -> usize {
        self.pattern
            .trailing_zeros()
            .map(|n| n as usize)
            .unwrap_or(self.width)
    }

    pub fn reverse(&self) -> Bits {
        let mut pattern = BigUint::zero();
        for i in 0..self.width {
            if self.pattern.bit(i as u64) {
                pattern.set_bit((self.width - 1 - i) as u64, true);
            }
        }
        self.with_pattern(pattern)
    }

    pub fn and_reduce(&self) -> bool {
        self.pattern == mask(self.width)
    }

    pub fn or_reduce(&self) -> bool {
        !self.pattern.is_zero()
    }

    pub fn xor_reduce(&self) -> bool {
        self.pattern.count_ones() % 2 == 1
    }

    /// Sign-extends (or truncates) to `width` bits, retagging as `signedness`.
    pub fn sign_extend(&self, signedness: Signedness, width: usize) -> Bits {
        Bits::from_bigint(signedness, width, &self.interpret(Signedness::Signed))
    }

    /// One-hot encoding of the lowest (or highest) set bit, one bit wider
    /// than the input; the extra top bit flags an all-zero input.
    pub fn one_hot(&self, lsb_prio: bool) -> Bits {
        let width = self.width + 1;
        let position = if self.pattern.is_zero() {
            self.width
        } else if lsb_prio {
            self.count_trailing_zeros()
        } else {
            self.pattern.bits() as usize - 1
        };
        let mut pattern = BigUint::zero();
        pattern.set_bit(position as u64, true);
        Bits {
            signedness: Signedness::Unsigned,
            width,
            pattern,
        }
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.signedness.prefix();
        if self.width <= 64 {
            write!(f, "{}{}:{}", prefix, self.width, self.to_bigint())
        } else {
            write!(f, "{}N[{}]:{}", prefix, self.width, self.to_bigint())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32v(value: u64) -> Bits {
        Bits::ubits(32, value)
    }

    #[test]
    fn new_rejects_oversized_patterns() {
        assert!(Bits::new(Signedness::Unsigned, 4, BigUint::from(15u32)).is_ok());
        let err = Bits::new(Signedness::Unsigned, 4, BigUint::from(16u32)).unwrap_err();
        assert!(matches!(err, ValueError::RangeError(_)));
    }

    #[test]
    fn add_wraps_at_width() {
        assert_eq!(Bits::ubits(8, 0xff).add(&Bits::ubits(8, 1)), Bits::ubits(8, 0));
        assert_eq!(Bits::sbits(8, 127).add(&Bits::sbits(8, 1)), Bits::sbits(8, -128));
    }

    #[test]
    fn add_then_sub_is_identity() {
        let samples = [0u64, 1, 2, 0x7f, 0x80, 0xa5a5_a5a5, 0xffff_fffe, 0xffff_ffff];
        for &a in &samples {
            for &b in &samples {
                let (a, b) = (u32v(a), u32v(b));
                assert_eq!(a.add(&b).sub(&b), a, "({} + {}) - {}", a, b, b);
            }
        }
        for a in [-128i64, -1, 0, 1, 127] {
            for b in [-128i64, -7, 0, 3, 127] {
                let (a, b) = (Bits::sbits(8, a), Bits::sbits(8, b));
                assert_eq!(a.add(&b).sub(&b), a);
            }
        }
    }

    #[test]
    fn arithmetic_matches_reference_values() {
        let a = u32v(0xa5a5_a5a5);
        assert_eq!(a.sub(&u32v(0x5a5a_5a5a)), u32v(0x4b4b_4b4b));
        assert_eq!(u32v(0x8420_8420).div(&u32v(4)).unwrap(), u32v(0x2108_2108));
        assert_eq!(u32v(0x2108_2108).mul(&u32v(4)), u32v(0x8420_8420));
    }

    #[test]
    fn mixed_width_arithmetic_uses_narrower_width() {
        let result = Bits::ubits(16, 0x1ff).add(&Bits::ubits(8, 1));
        assert_eq!(result, Bits::ubits(8, 0));
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        assert_eq!(Bits::sbits(8, -7).div(&Bits::sbits(8, 2)).unwrap(), Bits::sbits(8, -3));
        assert_eq!(Bits::sbits(8, -7).rem(&Bits::sbits(8, 2)).unwrap(), Bits::sbits(8, -1));
        assert_eq!(Bits::sbits(8, -128).div(&Bits::sbits(8, -1)).unwrap(), Bits::sbits(8, -128));
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(u32v(1).div(&u32v(0)), Err(ValueError::DivisionByZero));
        assert_eq!(u32v(1).rem(&u32v(0)), Err(ValueError::DivisionByZero));
    }

    #[test]
    fn bitwise_ops_require_equal_widths() {
        assert_eq!(u32v(0xa5a5_a5a5).and(&u32v(0xffff_ffff)).unwrap(), u32v(0xa5a5_a5a5));
        assert_eq!(u32v(0xa5a5_a5a5).or(&u32v(0x5a5a_5a5a)).unwrap(), u32v(0xffff_ffff));
        assert_eq!(u32v(0xa5a5_ffff).xor(&u32v(0x5a5a_ffff)).unwrap(), u32v(0xffff_0000));
        let err = u32v(1).and(&Bits::ubits(8, 1)).unwrap_err();
        assert!(matches!(err, ValueError::TypeError(_)));
    }

    #[test]
    fn concat_places_left_operand_high() {
        let joined = u32v(0xa5a5_a5a5).concat(&u32v(0xffff_ffff));
        assert_eq!(joined.width(), 64);
        assert_eq!(joined.to_u64().unwrap(), 0xa5a5_a5a5_ffff_ffff);

        let high = Bits::ubits(3, 0b101);
        let low = Bits::ubits(5, 0b00110);
        assert_eq!(high.concat(&low), Bits::ubits(8, (0b101 << 5) | 0b00110));
    }

    #[test]
    fn shifts_zero_fill_past_width() {
        assert_eq!(u32v(0x2108_2108).shll(&u32v(2)), u32v(0x8420_8420));
        assert_eq!(u32v(0x8420_8420).shrl(&u32v(2)), u32v(0x2108_2108));
        assert_eq!(u32v(0xffff_ffff).shll(&Bits::ubits(8, 32)), u32v(0));
        assert_eq!(u32v(0xffff_ffff).shrl(&Bits::ubits(64, u64::MAX)), u32v(0));
    }

    #[test]
    fn arithmetic_shift_sign_fills() {
        assert_eq!(Bits::sbits(8, -16).shra(&Bits::ubits(3, 2)), Bits::sbits(8, -4));
        assert_eq!(Bits::sbits(8, 16).shra(&Bits::ubits(3, 2)), Bits::sbits(8, 4));
        assert_eq!(Bits::sbits(8, -1).shra(&Bits::ubits(8, 200)), Bits::sbits(8, -1));
        assert_eq!(Bits::ubits(8, 0x80).shra(&Bits::ubits(3, 7)), Bits::ubits(8, 1));
    }

    #[test]
    fn invert_then_negate() {
        let b = Bits::sbits(32, 1).invert();
        assert_eq!(b, Bits::sbits(32, -2));
        assert_eq!(b.negate(), Bits::sbits(32, 2));
        assert_eq!(Bits::ubits(4, 1).negate(), Bits::ubits(4, 0xf));
    }

    #[test]
    fn compare_respects_signedness() {
        assert_eq!(Bits::sbits(8, -1).compare(&Bits::sbits(8, 1)).unwrap(), Ordering::Less);
        assert_eq!(Bits::ubits(8, 0xff).compare(&Bits::ubits(8, 1)).unwrap(), Ordering::Greater);
        assert!(Bits::ubits(8, 1).compare(&Bits::ubits(9, 1)).is_err());
    }

    #[test]
    fn conversions_check_range() {
        assert_eq!(Bits::sbits(8, -3).to_i64().unwrap(), -3);
        assert!(Bits::sbits(8, -3).to_u64().is_err());
        let wide = Bits::wrapping(Signedness::Unsigned, 128, BigUint::one() << 100);
        assert!(wide.to_u64().is_err());
    }

    #[test]
    fn bit_utilities() {
        let v = Bits::ubits(8, 0b0001_0100);
        assert_eq!(v.count_leading_zeros(), 3);
        assert_eq!(v.count_trailing_zeros(), 2);
        assert_eq!(Bits::ubits(8, 0).count_trailing_zeros(), 8);
        assert_eq!(v.reverse(), Bits::ubits(8, 0b0010_1000));
        assert!(Bits::ubits(4, 0xf).and_reduce());
        assert!(!v.and_reduce());
        assert!(v.or_reduce());
        assert!(!v.xor_reduce());
        assert!(Bits::ubits(8, 0b0000_0111).xor_reduce());
    }

    #[test]
    fn sign_extend_and_one_hot() {
        let narrow = Bits::sbits(4, -2);
        assert_eq!(narrow.sign_extend(Signedness::Signed, 8), Bits::sbits(8, -2));
        assert_eq!(Bits::ubits(4, 0b0111).sign_extend(Signedness::Unsigned, 8), Bits::ubits(8, 7));
        assert_eq!(Bits::ubits(8, 0x1ff & 0xff).sign_extend(Signedness::Unsigned, 4), Bits::ubits(4, 0xf));

        let v = Bits::ubits(4, 0b0110);
        assert_eq!(v.one_hot(true), Bits::ubits(5, 0b00010));
        assert_eq!(v.one_hot(false), Bits::ubits(5, 0b00100));
        assert_eq!(Bits::ubits(4, 0).one_hot(true), Bits::ubits(5, 0b10000));
    }

    #[test]
    fn display_uses_width_aware_syntax() {
        assert_eq!(u32v(42).to_string(), "u32:42");
        assert_eq!(Bits::sbits(32, -2).to_string(), "s32:-2");
        assert_eq!(Bits::ubits(128, 5).to_string(), "uN[128]:5");
        assert_eq!(Bits::ubits(0, 0).to_string(), "u0:0");
    }
}
