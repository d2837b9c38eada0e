use fixed::types::I32F32;
use relmenu_document::Rgb;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::iter::Sum;
use std::ops;

/// Layout length in PDF points, stored as fixed point and rounded to milli-points
/// on every arithmetic step so repeated measure/draw passes agree bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pt(I32F32);

const FRAC_ONE: i128 = 1 << 32;

/// Integer division rounding half away from zero.
fn round_div(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let half = den.abs() / 2;
    let magnitude = (num.abs() + half) / den.abs();
    if (num < 0) != (den < 0) { -magnitude } else { magnitude }
}

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    fn milli(self) -> i128 {
        round_div(self.0.to_bits() as i128 * 1000, FRAC_ONE)
    }

    fn from_milli(milli: i128) -> Pt {
        let milli = milli.clamp(i64::MIN as i128, i64::MAX as i128);
        let bits = round_div(milli * FRAC_ONE, 1000).clamp(i64::MIN as i128, i64::MAX as i128);
        Pt(I32F32::from_bits(bits as i64))
    }

    /// Non-finite input maps to zero.
    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_milli((value as f64 * 1000.0).round() as i128)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli(value as i128 * 1000)
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli(milli as i128)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        self.milli().clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Pt) -> Pt {
        Ord::max(self, other)
    }

    pub fn min(self, other: Pt) -> Pt {
        Ord::min(self, other)
    }

    /// `self * num / denom` in milli-points. Zero when `denom` is zero.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        Pt::from_milli(round_div(self.milli().saturating_mul(num as i128), denom as i128))
    }

    /// How many whole `step`s fit in `self`. Zero for non-positive inputs.
    pub fn whole_steps(self, step: Pt) -> usize {
        let (avail, step) = (self.milli(), step.milli());
        if avail <= 0 || step <= 0 {
            return 0;
        }
        usize::try_from(avail / step).unwrap_or(usize::MAX)
    }
}

impl Serialize for Pt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_milli_i64() as f64 / 1000.0)
    }
}

impl<'de> Deserialize<'de> for Pt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(|value| Pt::from_f32(value as f32))
    }
}

macro_rules! pt_additive {
    ($op:ident, $method:ident, $assign:ident, $assign_method:ident, $sign:tt) => {
        impl ops::$op for Pt {
            type Output = Pt;
            fn $method(self, rhs: Pt) -> Pt {
                Pt::from_milli(self.milli() $sign rhs.milli())
            }
        }

        impl ops::$assign for Pt {
            fn $assign_method(&mut self, rhs: Pt) {
                *self = *self $sign rhs;
            }
        }
    };
}

pt_additive!(Add, add, AddAssign, add_assign, +);
pt_additive!(Sub, sub, SubAssign, sub_assign, -);

impl ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt::from_milli(self.milli().saturating_mul(rhs as i128))
    }
}

impl ops::Mul<usize> for Pt {
    type Output = Pt;
    fn mul(self, rhs: usize) -> Pt {
        let rhs = i128::try_from(rhs).unwrap_or(i128::MAX);
        Pt::from_milli(self.milli().saturating_mul(rhs))
    }
}

/// Goes through f32; only for scale factors, never for accumulated lengths.
impl ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl ops::Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        Pt::from_milli(round_div(self.milli(), rhs as i128))
    }
}

impl ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli(-self.milli())
    }
}

impl Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, ops::Add::add)
    }
}

impl<'a> Sum<&'a Pt> for Pt {
    fn sum<I: Iterator<Item = &'a Pt>>(iter: I) -> Pt {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn a4() -> Self {
        Self {
            width: Pt::from_f32(595.28),
            height: Pt::from_f32(841.89),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn bottom(&self) -> Pt {
        self.y + self.height
    }

    pub fn right(&self) -> Pt {
        self.x + self.width
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

impl From<Rgb> for Color {
    fn from(value: Rgb) -> Self {
        Color::from_rgb8(value.r, value.g, value.b)
    }
}
