use crate::npy::{elements::Element, header::Header, ReadNpyError};
use nalgebra::{DMatrix, Scalar};
use num_traits::Zero;
use std::{
    fs,
    io::{self, Read as _},
    mem,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

/// An error stacking a folder of `.npy` files into one matrix.
#[derive(Debug, Error)]
pub enum StackNpyError {
    /// An error opening, parsing, or reading one of the files.
    #[error(transparent)]
    Read(#[from] ReadNpyError),
    /// The first file's layout flag does not match the expected layout.
    #[error(
        "{}: expected fortran_order={}, file declares {}",
        .path.display(), .expected, .found
    )]
    LayoutMismatch {
        /// Path of the first file.
        path: PathBuf,
        /// Layout the caller asked for.
        expected: bool,
        /// Layout declared in the file header.
        found: bool,
    },
    /// The first file is not rank 2.
    #[error("{}: expected a rank-2 array, found rank {}", .path.display(), .rank)]
    NotMatrix {
        /// Path of the offending file.
        path: PathBuf,
        /// Rank declared in the file header.
        rank: usize,
    },
    /// A file in the run declares a different shape than the first file.
    #[error(
        "{}: shape {:?} does not match the first file's {:?}",
        .path.display(), .found, .expected
    )]
    ShapeMismatch {
        /// Path of the offending file.
        path: PathBuf,
        /// Shape of the first file.
        expected: Vec<usize>,
        /// Shape declared by the offending file.
        found: Vec<usize>,
    },
    /// A file in the run declares a word size other than the element width.
    #[error(
        "{}: word size {} does not match the requested element width {}",
        .path.display(), .found, .expected
    )]
    WordSizeMismatch {
        /// Path of the offending file.
        path: PathBuf,
        /// Byte width of the requested element type.
        expected: usize,
        /// Word size declared by the offending file.
        found: usize,
    },
}

fn read_header_at(path: &Path) -> Result<Header, ReadNpyError> {
    let file = fs::File::open(path).map_err(|source| ReadNpyError::Open {
        path: path.to_owned(),
        source,
    })?;
    Header::from_reader(io::BufReader::new(file)).map_err(ReadNpyError::from)
}

/// Stacks a contiguous run of same-shaped `.npy` files into one matrix.
///
/// Files are named `{prefix}{index}{suffix}` inside `folder`, with decimal
/// indices counting up from `start_index`. The first missing index ends the
/// run, even if later indices exist. Each file in the run must be rank 2 with
/// the same shape and word size as the first; the first file's layout flag
/// must equal `expected_fortran_order`.
///
/// The result has `rows * file_count` rows. File `start_index + i`'s payload
/// bytes are copied verbatim into block `i` of the matrix backing storage; no
/// transposition or reordering happens on the way in.
///
/// # Example
///
/// ```no_run
/// use nalgebra::DMatrix;
/// use npy_mat::stack_npy_folder;
/// # use npy_mat::StackNpyError;
///
/// // chunk0.npy, chunk1.npy, ... each holding a column-major 128x16 block
/// let stacked: DMatrix<f32> = stack_npy_folder("chunks", "chunk", 0, ".npy", true)?;
/// # Ok::<_, StackNpyError>(())
/// ```
pub fn stack_npy_folder<T, P>(
    folder: P,
    prefix: &str,
    start_index: usize,
    suffix: &str,
    expected_fortran_order: bool,
) -> Result<DMatrix<T>, StackNpyError>
where
    T: Element + Scalar + Zero,
    P: AsRef<Path>,
{
    let folder = folder.as_ref();
    let entry = |index: usize| folder.join(format!("{prefix}{index}{suffix}"));

    let first = entry(start_index);
    let first_header = read_header_at(&first)?;
    let &[rows, cols] = first_header.shape.as_slice() else {
        return Err(StackNpyError::NotMatrix {
            path: first,
            rank: first_header.shape.len(),
        });
    };
    if first_header.fortran_order != expected_fortran_order {
        return Err(StackNpyError::LayoutMismatch {
            path: first,
            expected: expected_fortran_order,
            found: first_header.fortran_order,
        });
    }

    // Probe successive indices; the first gap ends the run regardless of
    // what exists beyond it.
    let mut file_count = 0;
    while fs::File::open(entry(start_index + file_count)).is_ok() {
        file_count += 1;
    }
    debug!(
        "stacking {file_count} files of shape ({rows}, {cols}) from {}",
        folder.display(),
    );

    let block = rows * cols;
    let mut matrix = DMatrix::<T>::zeros(rows * file_count, cols);
    let out = matrix.as_mut_slice();
    for i in 0..file_count {
        let path = entry(start_index + i);
        let file = fs::File::open(&path).map_err(|source| ReadNpyError::Open {
            path: path.clone(),
            source,
        })?;
        let mut reader = io::BufReader::new(file);
        let header = Header::from_reader(&mut reader).map_err(ReadNpyError::from)?;
        if header.shape != [rows, cols] {
            return Err(StackNpyError::ShapeMismatch {
                path,
                expected: vec![rows, cols],
                found: header.shape,
            });
        }
        if header.word_size != mem::size_of::<T>() {
            return Err(StackNpyError::WordSizeMismatch {
                path,
                expected: mem::size_of::<T>(),
                found: header.word_size,
            });
        }
        let chunk = &mut out[i * block..(i + 1) * block];
        reader
            .read_exact(bytemuck::cast_slice_mut(chunk))
            .map_err(ReadNpyError::from)?;
    }
    Ok(matrix)
}
