use std::ops::{Add, AddAssign, Sub};

pub const FIXED_SHIFT: u32 = 16;

/// Signed 16.16 fixed-point scalar.
///
/// Stored in an `i64` so intermediate products of pixel coordinates and step
/// counts do not overflow. Division and conversion back to pixels floor toward
/// negative infinity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);

    pub const fn from_int(value: i32) -> Self {
        Self((value as i64) << FIXED_SHIFT)
    }

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// `numerator / denominator` as a fixed-point value, floored.
    /// Returns zero for a zero denominator.
    pub fn ratio(numerator: i32, denominator: i32) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        Self(((numerator as i64) << FIXED_SHIFT).div_euclid(denominator as i64))
    }

    pub fn floor(self) -> i32 {
        (self.0 >> FIXED_SHIFT) as i32
    }

    /// Multiplies by an integer count without losing the fractional part.
    pub fn scale(self, factor: i64) -> Self {
        Self(self.0 * factor)
    }

    /// Integer pixels covered by `self * factor`, floored.
    pub fn scaled_floor(self, factor: i64) -> i32 {
        self.scale(factor).floor()
    }

    pub fn div_int(self, divisor: i64) -> Self {
        if divisor == 0 {
            return Self::ZERO;
        }
        Self(self.0.div_euclid(divisor))
    }

    pub fn signum(self) -> i64 {
        self.0.signum()
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 += rhs.0;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FixedPoint2 {
    pub x: Fixed,
    pub y: Fixed,
}

impl FixedPoint2 {
    pub fn from_int(x: i32, y: i32) -> Self {
        Self {
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
        }
    }

    pub fn floor(self) -> (i32, i32) {
        (self.x.floor(), self.y.floor())
    }

    pub fn div_int(self, divisor: i64) -> Self {
        Self {
            x: self.x.div_int(divisor),
            y: self.y.div_int(divisor),
        }
    }
}

impl Add for FixedPoint2 {
    type Output = FixedPoint2;

    fn add(self, rhs: FixedPoint2) -> FixedPoint2 {
        FixedPoint2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for FixedPoint2 {
    fn add_assign(&mut self, rhs: FixedPoint2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for FixedPoint2 {
    type Output = FixedPoint2;

    fn sub(self, rhs: FixedPoint2) -> FixedPoint2 {
        FixedPoint2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
