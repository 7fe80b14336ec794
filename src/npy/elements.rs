use bytemuck::Pod;

/// Scalar type of an `.npy` payload.
///
/// Each variant maps to the fixed 3-character `descr` tag written to the
/// header: an endianness marker (`<` little-endian, or `|` for 1-byte types),
/// a type letter, and the width in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// `<f4`
    Float32,
    /// `<f8`
    Float64,
    /// `|i1`
    Int8,
    /// `<i2`
    Int16,
    /// `<i4`
    Int32,
    /// `<i8`
    Int64,
    /// `|u1`
    UInt8,
    /// `<u2`
    UInt16,
    /// `<u4`
    UInt32,
    /// `<u8`
    UInt64,
}

impl DType {
    /// The `descr` tag recorded in the header.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Float32 => "<f4",
            Self::Float64 => "<f8",
            Self::Int8 => "|i1",
            Self::Int16 => "<i2",
            Self::Int32 => "<i4",
            Self::Int64 => "<i8",
            Self::UInt8 => "|u1",
            Self::UInt16 => "<u2",
            Self::UInt32 => "<u4",
            Self::UInt64 => "<u8",
        }
    }

    /// Byte width of one scalar element.
    pub const fn word_size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Float32 | Self::Int32 | Self::UInt32 => 4,
            Self::Float64 | Self::Int64 | Self::UInt64 => 8,
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// An element type that can be stored in an `.npy` payload.
///
/// This trait is sealed: only the ten fixed-width numeric types have an
/// on-disk tag, so anything else is rejected at compile time rather than at
/// write time.
pub trait Element: Pod + private::Sealed {
    /// The `descr` entry for this type.
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident,)*) => {
        $(
            impl private::Sealed for $ty {}
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_element! {
    f32 => Float32,
    f64 => Float64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn tag_table() {
        let table = [
            (DType::Float32, "<f4", 4),
            (DType::Float64, "<f8", 8),
            (DType::Int8, "|i1", 1),
            (DType::Int16, "<i2", 2),
            (DType::Int32, "<i4", 4),
            (DType::Int64, "<i8", 8),
            (DType::UInt8, "|u1", 1),
            (DType::UInt16, "<u2", 2),
            (DType::UInt32, "<u4", 4),
            (DType::UInt64, "<u8", 8),
        ];
        for (dtype, tag, word_size) in table {
            assert_eq!(dtype.tag(), tag);
            assert_eq!(dtype.word_size(), word_size);
        }
    }

    #[test]
    fn word_size_matches_rust_width() {
        fn check<T: Element>() {
            assert_eq!(T::DTYPE.word_size(), mem::size_of::<T>());
        }
        check::<f32>();
        check::<f64>();
        check::<i8>();
        check::<i16>();
        check::<i32>();
        check::<i64>();
        check::<u8>();
        check::<u16>();
        check::<u32>();
        check::<u64>();
    }

    #[test]
    fn one_byte_types_have_no_endianness() {
        for dtype in [DType::Int8, DType::UInt8] {
            assert!(dtype.tag().starts_with('|'));
        }
    }
}
