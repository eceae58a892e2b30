//! This module defines shared traits that link Rust scalar types to the engine's
//! runtime type tags.

use crate::types::ElementType;

/// A plain-old-data scalar that can be stored in a volume.
///
/// The associated `DTYPE` is the tag written into the header when a slice of
/// this type is encoded, and the tag a decoded buffer must carry to be
/// reinterpreted as this type.
pub trait Element: bytemuck::Pod + Send + Sync {
    const DTYPE: ElementType;
}

// Implement the trait for all supported primitive types.
macro_rules! impl_element {
    ($T:ty, $tag:ident) => {
        impl Element for $T {
            const DTYPE: ElementType = ElementType::$tag;
        }
    };
}

impl_element!(u8, UInt8);
impl_element!(i8, Int8);
impl_element!(u16, UInt16);
impl_element!(i16, Int16);
impl_element!(u32, UInt32);
impl_element!(i32, Int32);
impl_element!(u64, UInt64);
impl_element!(i64, Int64);
impl_element!(f32, Float32);
impl_element!(f64, Float64);
