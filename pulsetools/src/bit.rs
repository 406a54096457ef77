//! Bit field tools for hardware words and channel masks

use bit_iter::BitIter;
use num_traits::{FromPrimitive, PrimInt, Unsigned};
use std::ops::{BitAndAssign, BitOrAssign};

use crate::Channel;

/// Extract `width` bits starting at bit `offset`:
/// `(value >> offset) & ((1 << width) - 1)`.
///
/// Total over all widths, including the full width of `T` where the naive
/// mask would overflow.
#[inline]
pub fn extract<T: PrimInt + Unsigned>(value: T, width: u32, offset: u32) -> T {
    let bits = T::zero().count_zeros();
    if width == 0 || offset >= bits {
        return T::zero();
    }
    return (value >> offset as usize) & mask::<T>(width);
}

/// Inverse of [`extract`]: write the low `width` bits of `field` into `value`
/// at `offset`, leaving every other bit untouched.
#[inline]
pub fn insert<T: PrimInt + Unsigned>(value: T, field: T, width: u32, offset: u32) -> T {
    let bits = T::zero().count_zeros();
    if width == 0 || offset >= bits {
        return value;
    }
    let m = mask::<T>(width) << offset as usize;
    return (value & !m) | ((field << offset as usize) & m);
}

#[inline]
fn mask<T: PrimInt + Unsigned>(width: u32) -> T {
    if width >= T::zero().count_zeros() {
        !T::zero()
    } else {
        (T::one() << width as usize) - T::one()
    }
}

/// Convert channels into a bitmask
pub fn chans_to_mask(chs: &[Channel]) -> u32 {
    let mut m = 0u32;
    for &ch in chs {
        m.set(ch as usize);
    }
    return m;
}

/// Returns all channels in mask
pub fn mask_to_chans(m: u32) -> Vec<Channel> {
    let mut chs = Vec::new();
    for b in BitIter::from(m) {
        chs.push(b as Channel);
    }
    return chs;
}

/// Bitwise set/check/change operations on unsigned integers
pub trait BitOps:
    PrimInt
    + BitAndAssign
    + BitOrAssign
    + FromPrimitive
    + Unsigned
{
    fn set(&mut self, b: usize);
    fn change(&mut self, b: usize, x: bool);
    fn check(self, b: usize) -> bool;
}

macro_rules! impl_bitops {
    ($($t:ty),*) => {$(
        impl BitOps for $t {
            #[inline]
            fn set(&mut self, b: usize) {
                *self |= 1 << b;
            }

            #[inline]
            fn change(&mut self, b: usize, x: bool) {
                *self = (*self & !(1 << b)) | ((x as $t) << b);
            }

            #[inline]
            fn check(self, b: usize) -> bool {
                return self >> b & 1 == 1;
            }
        }
    )*};
}

impl_bitops!(u8, u16, u32, u64);
