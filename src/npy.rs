mod array;
mod elements;
pub mod header;
pub mod stack;

pub use self::{array::NpyArray, elements::{DType, Element}};
use self::header::{Header, ParseHeaderError, ReadHeaderError, WriteHeaderError};
use std::{
    collections::BTreeMap,
    fs,
    io::{self, Read as _, Write as _},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::warn;

/// Arrays keyed by name: the in-memory shape of a multi-array archive.
pub type NpzMap = BTreeMap<String, NpyArray>;

/// An error reading an `.npy` file.
#[derive(Debug, Error)]
pub enum ReadNpyError {
    /// The file could not be opened for reading.
    #[error("failed to open {}: {}", .path.display(), .source)]
    Open {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying open failure.
        source: io::Error,
    },
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// An error parsing the file header.
    #[error("error parsing header: {0}")]
    ParseHeader(#[from] ParseHeaderError),
    /// The file does not contain all the data described in the header.
    #[error("reached EOF before reading all data")]
    MissingData,
    /// The file's rank does not match the destination type.
    #[error("rank {actual} array cannot be read into a rank-{expected} destination")]
    WrongNdim {
        /// Rank the destination type requires.
        expected: usize,
        /// Rank declared in the file header.
        actual: usize,
    },
    /// The file's word size does not match the requested element type.
    #[error("file word size {actual} does not match the requested element width {expected}")]
    WrongWordSize {
        /// Byte width of the requested element type.
        expected: usize,
        /// Word size declared in the file header.
        actual: usize,
    },
}

impl From<io::Error> for ReadNpyError {
    /// Performs the conversion.
    ///
    /// `UnexpectedEof` becomes [`ReadNpyError::MissingData`]; everything else
    /// is carried as [`ReadNpyError::Io`].
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::MissingData,
            _ => Self::Io(err),
        }
    }
}

impl From<ReadHeaderError> for ReadNpyError {
    fn from(err: ReadHeaderError) -> Self {
        match err {
            ReadHeaderError::Io(err) => Self::from(err),
            ReadHeaderError::Parse(err) => Self::ParseHeader(err),
        }
    }
}

/// An error writing an `.npy` file.
#[derive(Debug, Error)]
pub enum WriteNpyError {
    /// The destination could not be opened for writing; nothing was written.
    #[error("failed to create {}: {}", .path.display(), .source)]
    Create {
        /// Path of the destination file.
        path: PathBuf,
        /// The underlying open failure.
        source: io::Error,
    },
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error formatting the header.
    #[error("error formatting header: {0}")]
    FormatHeader(#[from] header::FormatHeaderError),
    /// The slice length does not match the declared dimensions.
    #[error("slice of {len} elements cannot fill a {rows}x{cols} matrix")]
    ShapeMismatch {
        /// Length of the provided slice.
        len: usize,
        /// Declared row count.
        rows: usize,
        /// Declared column count.
        cols: usize,
    },
}

impl From<WriteHeaderError> for WriteNpyError {
    fn from(err: WriteHeaderError) -> Self {
        match err {
            WriteHeaderError::Io(err) => Self::Io(err),
            WriteHeaderError::Format(err) => Self::FormatHeader(err),
        }
    }
}

/// Extension trait for reading a value from `.npy`-formatted bytes.
pub trait ReadNpyExt: Sized {
    /// Reads the value from `reader` in `.npy` format.
    ///
    /// The layout flag recorded in the header is honored, never normalized.
    fn read_npy<R: io::Read>(reader: R) -> Result<Self, ReadNpyError>;
}

/// Extension trait for writing a value in `.npy` format.
///
/// Implementations perform exactly one contiguous header write and one
/// contiguous payload write, recording whatever layout the source already
/// has. There is no partial-write recovery: a write interrupted mid-payload
/// leaves a truncated file.
pub trait WriteNpyExt {
    /// Writes the value to `writer` in `.npy` format.
    fn write_npy<W: io::Write>(&self, writer: W) -> Result<(), WriteNpyError>;
}

impl<T: Element> WriteNpyExt for [T] {
    /// Writes the slice as a rank-1, row-major array.
    fn write_npy<W: io::Write>(&self, mut writer: W) -> Result<(), WriteNpyError> {
        header::write_header(&mut writer, T::DTYPE, &[self.len()], false)?;
        writer.write_all(bytemuck::cast_slice(self))?;
        writer.flush()?;
        Ok(())
    }
}

impl<T: Element> WriteNpyExt for Vec<T> {
    fn write_npy<W: io::Write>(&self, writer: W) -> Result<(), WriteNpyError> {
        self.as_slice().write_npy(writer)
    }
}

/// Reads an `.npy` file located at the specified path.
///
/// This is a convenience function for `File::open` followed by
/// [`ReadNpyExt::read_npy`]. The file handle is released on every exit path,
/// including header parse failures.
///
/// # Example
///
/// ```no_run
/// use npy_mat::{read_npy, NpyArray};
/// # use npy_mat::ReadNpyError;
///
/// let arr: NpyArray = read_npy("resources/array.npy")?;
/// # Ok::<_, ReadNpyError>(())
/// ```
pub fn read_npy<P, T>(path: P) -> Result<T, ReadNpyError>
where
    P: AsRef<Path>,
    T: ReadNpyExt,
{
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| ReadNpyError::Open {
        path: path.to_owned(),
        source,
    })?;
    T::read_npy(io::BufReader::new(file))
}

/// Raw payload of an `.npy` file, shape discarded.
#[derive(Debug)]
pub struct RawNpy {
    /// The payload bytes, in the file's declared layout.
    pub bytes: Vec<u8>,
    /// Byte width of one scalar element.
    pub word_size: usize,
}

impl RawNpy {
    /// Payload length in bytes.
    pub fn num_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Reads an `.npy` file, returning only the payload bytes and word size.
///
/// Unlike [`read_npy`], a payload shorter than the header declares is
/// tolerated here: the short read is logged and the remainder of the buffer
/// stays zeroed. This matches the historical tool this crate replaces; prefer
/// [`read_npy`] when a truncated file should be an error.
pub fn read_npy_raw<P: AsRef<Path>>(path: P) -> Result<RawNpy, ReadNpyError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| ReadNpyError::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut reader = io::BufReader::new(file);
    let header = Header::from_reader(&mut reader)?;

    let num_bytes = header.num_bytes();
    let mut bytes = vec![0; num_bytes];
    let mut filled = 0;
    while filled < num_bytes {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    if filled < num_bytes {
        warn!(
            "short read from {}: got {filled} of {num_bytes} payload bytes",
            path.display(),
        );
    }
    Ok(RawNpy { bytes, word_size: header.word_size })
}

/// Writes a value to an `.npy` file at the specified path.
///
/// The file is created if it does not exist and truncated if it does. If the
/// destination cannot be opened, the error carries the path and nothing is
/// written.
///
/// # Example
///
/// ```no_run
/// use npy_mat::write_npy;
/// # use npy_mat::WriteNpyError;
///
/// let data: Vec<i32> = vec![1, 2, 3, 4];
/// write_npy("array.npy", &data)?;
/// # Ok::<_, WriteNpyError>(())
/// ```
pub fn write_npy<P, T>(path: P, array: &T) -> Result<(), WriteNpyError>
where
    P: AsRef<Path>,
    T: WriteNpyExt + ?Sized,
{
    let path = path.as_ref();
    let file = fs::File::create(path).map_err(|source| WriteNpyError::Create {
        path: path.to_owned(),
        source,
    })?;
    array.write_npy(io::BufWriter::new(file))
}

/// Writes a row-major slice as a rank-2 array at the specified path.
///
/// The slice length must equal `rows * cols`.
pub fn write_npy_2d<P, T>(path: P, data: &[T], rows: usize, cols: usize) -> Result<(), WriteNpyError>
where
    P: AsRef<Path>,
    T: Element,
{
    if data.len() != rows * cols {
        return Err(WriteNpyError::ShapeMismatch { len: data.len(), rows, cols });
    }
    let path = path.as_ref();
    let file = fs::File::create(path).map_err(|source| WriteNpyError::Create {
        path: path.to_owned(),
        source,
    })?;
    let mut writer = io::BufWriter::new(file);
    header::write_header(&mut writer, T::DTYPE, &[rows, cols], false)?;
    writer.write_all(bytemuck::cast_slice(data))?;
    writer.flush()?;
    Ok(())
}
