//! Trait abstractions for the element types a collective call may carry.

use bytemuck::Pod;
use num_traits::{NumAssign, WrappingAdd, WrappingMul};
use std::fmt::Debug;

/// Fixed-width numeric element that can be sent over a channel and reduced.
///
/// `Pod` lets buffers be viewed as raw bytes without copying. `PartialOrd`
/// backs min/max in [`ReduceOp`]; sum and product go through
/// [`reduce_add`](Self::reduce_add) and [`reduce_mul`](Self::reduce_mul),
/// which wrap on integer overflow instead of panicking.
///
/// [`ReduceOp`]: crate::core::types::ReduceOp
pub trait CollectiveElement: Pod + NumAssign + PartialOrd + Debug + Send + Sync + 'static {
    /// Short name used in log messages
    const TYPE_NAME: &'static str;

    /// Sum of two elements. Integers wrap.
    fn reduce_add(self, other: Self) -> Self;

    /// Product of two elements. Integers wrap.
    fn reduce_mul(self, other: Self) -> Self;
}

macro_rules! impl_collective_element {
    (float: $($fty:ty => $fname:expr),* ; int: $($ity:ty => $iname:expr),* $(,)?) => {
        $(
            impl CollectiveElement for $fty {
                const TYPE_NAME: &'static str = $fname;

                #[inline]
                fn reduce_add(self, other: Self) -> Self {
                    self + other
                }

                #[inline]
                fn reduce_mul(self, other: Self) -> Self {
                    self * other
                }
            }
        )*
        $(
            impl CollectiveElement for $ity {
                const TYPE_NAME: &'static str = $iname;

                #[inline]
                fn reduce_add(self, other: Self) -> Self {
                    WrappingAdd::wrapping_add(&self, &other)
                }

                #[inline]
                fn reduce_mul(self, other: Self) -> Self {
                    WrappingMul::wrapping_mul(&self, &other)
                }
            }
        )*
    };
}

impl_collective_element! {
    float:
    f32 => "f32",
    f64 => "f64";
    int:
    i8 => "i8",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
}
