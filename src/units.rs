//! Time-unit helpers for simulation parameters.
//!
//! The simulator integrates in seconds, but callers may prefer to express the
//! physics tick as a rate or in another time unit. These helpers keep the
//! conversion compile-time checked through `qtty` dimensions.

use qtty::{Quantity, Second, Unit};

/// Marker trait for units that share the same physical dimension.
///
/// Implemented automatically for any pair of units where
/// `From::Dim == To::Dim`.
pub trait SameDim<To: Unit>: Unit<Dim = To::Dim> {}

impl<From, To> SameDim<To> for From
where
    From: Unit,
    To: Unit<Dim = From::Dim>,
{
}

/// Converts a quantity to another unit of the same dimension.
#[inline]
pub const fn convert<From, To>(q: Quantity<From>) -> Quantity<To>
where
    From: SameDim<To>,
    To: Unit,
{
    q.to_const::<To>()
}

/// Converts any time quantity to seconds.
#[inline]
pub const fn to_seconds<U>(q: Quantity<U>) -> Quantity<Second>
where
    U: SameDim<Second>,
{
    convert(q)
}

/// Physics tick for a given rate in frames per second.
pub fn tick_from_rate(frames_per_second: f64) -> Quantity<Second> {
    Quantity::<Second>::new(1.0 / frames_per_second)
}
