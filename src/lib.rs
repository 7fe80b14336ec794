#![doc = include_str!("../README.md")]
//! ## Operate .npy Files
//!
//! - Reading
//!   - [`ReadNpyExt`] extension trait, implemented for [`NpyArray`] and
//!     [`nalgebra::DMatrix`]
//!   - [`read_npy`] convenience function
//!   - [`read_npy_raw`] for the payload bytes alone
//! - Writing
//!   - [`WriteNpyExt`] extension trait, implemented for slices, `Vec`, and
//!     [`nalgebra::DMatrix`]
//!   - [`write_npy`] and [`write_npy_2d`] convenience functions
//! - Stacking
//!   - [`stack_npy_folder`] to gather a contiguous run of same-shaped files
//!     into one matrix
//!
//! ## Limitations
//!
//! - Only little-endian data is supported; a `>` endianness marker in a file
//!   header is rejected.
//! - The element types are the ten fixed-width numeric scalars listed in
//!   [`DType`]; the [`Element`] trait is sealed over them.
//! - Headers are written with a 4-byte length field (format version 2.0);
//!   the 2-byte variant is not produced.
#![warn(missing_docs)]

mod impl_nalgebra;
mod npy;

pub use crate::npy::{
    header::{
        FormatHeaderError, Header, ParseHeaderError, ReadHeaderError, WriteHeaderError,
    },
    read_npy, read_npy_raw,
    stack::{stack_npy_folder, StackNpyError},
    write_npy, write_npy_2d, DType, Element, NpyArray, NpzMap, RawNpy, ReadNpyError, ReadNpyExt,
    WriteNpyError, WriteNpyExt,
};
