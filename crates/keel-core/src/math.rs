//! Fixed-point arithmetic for deterministic simulation math.
//!
//! Native floating point can round differently across CPUs and compiler
//! flags, which breaks lockstep. Every distance, range, progress and
//! threshold value in Keel is a [`Fixed`]: a signed 64-bit number with 32
//! fractional bits. Its raw `i64` bits are what the heap serializes.

use std::ops::{Add, Sub};

/// Deterministic fixed-point number (32 integer bits, 32 fractional bits).
pub type Fixed = fixed::types::I32F32;

/// Square root of a fixed-point value, rounded toward zero.
///
/// Computed with an integer Newton iteration on the raw bits, so the
/// result is bit-identical on every platform. Non-positive inputs yield
/// zero.
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    // sqrt(bits / 2^32) * 2^32 == isqrt(bits * 2^32)
    let scaled = (value.to_bits() as u128) << Fixed::FRAC_NBITS;
    Fixed::from_bits(isqrt_u128(scaled) as i64)
}

fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// A 2D position or offset in fixed-point world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vec2Fixed {
    /// Horizontal component.
    pub x: Fixed,
    /// Vertical component.
    pub y: Fixed,
}

impl Vec2Fixed {
    /// The origin.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a vector from components.
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole-unit integer components.
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Squared euclidean length, saturating at [`Fixed::MAX`].
    pub fn length_squared(self) -> Fixed {
        self.x
            .saturating_mul(self.x)
            .saturating_add(self.y.saturating_mul(self.y))
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt((other - self).length_squared())
    }
}

impl Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sqrt_of_perfect_squares() {
        assert_eq!(fixed_sqrt(Fixed::from_num(0)), Fixed::ZERO);
        assert_eq!(fixed_sqrt(Fixed::from_num(1)), Fixed::from_num(1));
        assert_eq!(fixed_sqrt(Fixed::from_num(16)), Fixed::from_num(4));
        assert_eq!(fixed_sqrt(Fixed::from_num(144)), Fixed::from_num(12));
    }

    #[test]
    fn sqrt_of_negative_is_zero() {
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn sqrt_of_fraction() {
        // 0.25 -> 0.5 exactly
        assert_eq!(
            fixed_sqrt(Fixed::from_num(1) / 4),
            Fixed::from_num(1) / 2
        );
    }

    #[test]
    fn distance_three_four_five() {
        let a = Vec2Fixed::from_ints(1, 1);
        let b = Vec2Fixed::from_ints(4, 5);
        assert_eq!(a.distance(b), Fixed::from_num(5));
        assert_eq!(b.distance(a), Fixed::from_num(5));
    }

    proptest! {
        #[test]
        fn sqrt_is_floor(raw in 0i64..(1i64 << 62)) {
            let v = Fixed::from_bits(raw);
            let r = fixed_sqrt(v).to_bits() as i128;
            let scaled = (raw as i128) << 32;
            prop_assert!(r * r <= scaled);
            prop_assert!((r + 1) * (r + 1) > scaled);
        }
    }
}
