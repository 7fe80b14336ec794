use crate::npy::{
    header, Element, NpyArray, ReadNpyError, ReadNpyExt, WriteNpyError, WriteNpyExt,
};
use nalgebra::{DMatrix, Scalar};
use std::{io, mem};

impl<T: Element + Scalar> WriteNpyExt for DMatrix<T> {
    /// Writes the matrix with its own row/column counts and layout.
    ///
    /// nalgebra stores matrices column-major, so the header records
    /// `fortran_order: True` and the payload is the backing slice verbatim.
    fn write_npy<W: io::Write>(&self, mut writer: W) -> Result<(), WriteNpyError> {
        header::write_header(&mut writer, T::DTYPE, &[self.nrows(), self.ncols()], true)?;
        writer.write_all(bytemuck::cast_slice(self.as_slice()))?;
        writer.flush()?;
        Ok(())
    }
}

impl<T: Element + Scalar> ReadNpyExt for DMatrix<T> {
    /// Reads a rank-2 file into a matrix, honoring the file's layout flag
    /// when placing elements.
    fn read_npy<R: io::Read>(reader: R) -> Result<Self, ReadNpyError> {
        let arr = NpyArray::read_npy(reader)?;
        let &[rows, cols] = arr.shape() else {
            return Err(ReadNpyError::WrongNdim {
                expected: 2,
                actual: arr.shape().len(),
            });
        };
        if arr.word_size() != mem::size_of::<T>() {
            return Err(ReadNpyError::WrongWordSize {
                expected: mem::size_of::<T>(),
                actual: arr.word_size(),
            });
        }
        let data = arr.to_vec::<T>();
        Ok(if arr.fortran_order() {
            DMatrix::from_column_slice(rows, cols, &data)
        } else {
            DMatrix::from_row_slice(rows, cols, &data)
        })
    }
}
