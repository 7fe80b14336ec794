use crate::npy::{elements::Element, header::Header, ReadNpyError, ReadNpyExt};
use std::{
    cell::{Ref, RefCell, RefMut},
    io, mem,
    rc::Rc,
};

/// A dtype-erased array read from an `.npy` file.
///
/// The payload buffer is reference counted and shared: [`Clone`] aliases the
/// same storage, so a mutation made through one handle is visible through
/// every other. This makes copies cheap; callers that need isolated storage
/// use [`NpyArray::deep_clone`]. The buffer is never resized after
/// construction.
///
/// Typed access follows the usual `RefCell` borrow rules: a live mutable view
/// excludes every other view.
#[derive(Clone, Debug)]
pub struct NpyArray {
    // Storage is allocated in 8-byte words so that typed views of any
    // supported scalar width are aligned; `num_bytes` is the payload length.
    data: Rc<RefCell<Vec<u64>>>,
    num_bytes: usize,
    shape: Vec<usize>,
    word_size: usize,
    fortran_order: bool,
}

impl NpyArray {
    /// Creates a zero-filled array with the given metadata.
    ///
    /// The buffer length is `word_size * product(shape)` bytes; an empty
    /// shape is treated as a single element.
    pub fn zeros(shape: Vec<usize>, word_size: usize, fortran_order: bool) -> Self {
        let num_vals: usize = shape.iter().product();
        let num_bytes = word_size * num_vals;
        Self {
            data: Rc::new(RefCell::new(vec![0; num_bytes.div_ceil(8)])),
            num_bytes,
            shape,
            word_size,
            fortran_order,
        }
    }

    /// Dimension sizes in declaration order.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte width of one scalar element.
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// `true` for column-major storage. Carried through from the file header
    /// verbatim.
    pub fn fortran_order(&self) -> bool {
        self.fortran_order
    }

    /// Number of scalar elements.
    pub fn num_vals(&self) -> usize {
        self.shape.iter().product()
    }

    /// Payload length in bytes.
    pub fn num_bytes(&self) -> usize {
        self.num_bytes
    }

    /// Borrows the raw payload bytes.
    pub fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |words| {
            &bytemuck::cast_slice(words)[..self.num_bytes]
        })
    }

    /// Mutably borrows the raw payload bytes.
    pub fn bytes_mut(&self) -> RefMut<'_, [u8]> {
        let num_bytes = self.num_bytes;
        RefMut::map(self.data.borrow_mut(), |words| {
            &mut bytemuck::cast_slice_mut(words)[..num_bytes]
        })
    }

    /// Borrows the payload as a slice of `T`.
    ///
    /// The caller must request the element type the file was written with;
    /// the width agreement is checked in debug builds only.
    pub fn as_slice<T: Element>(&self) -> Ref<'_, [T]> {
        debug_assert_eq!(
            mem::size_of::<T>(),
            self.word_size,
            "element width does not match the file's word size",
        );
        Ref::map(self.bytes(), |bytes| bytemuck::cast_slice(bytes))
    }

    /// Mutably borrows the payload as a slice of `T`.
    ///
    /// Same contract as [`NpyArray::as_slice`].
    pub fn as_mut_slice<T: Element>(&self) -> RefMut<'_, [T]> {
        debug_assert_eq!(
            mem::size_of::<T>(),
            self.word_size,
            "element width does not match the file's word size",
        );
        RefMut::map(self.bytes_mut(), |bytes| bytemuck::cast_slice_mut(bytes))
    }

    /// Copies the payload out into an owned `Vec<T>`.
    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        self.as_slice::<T>().to_vec()
    }

    /// Copies the buffer, yielding a handle with isolated storage.
    pub fn deep_clone(&self) -> Self {
        Self {
            data: Rc::new(RefCell::new(self.data.borrow().clone())),
            num_bytes: self.num_bytes,
            shape: self.shape.clone(),
            word_size: self.word_size,
            fortran_order: self.fortran_order,
        }
    }
}

impl ReadNpyExt for NpyArray {
    fn read_npy<R: io::Read>(mut reader: R) -> Result<Self, ReadNpyError> {
        let header = Header::from_reader(&mut reader)?;
        let arr = Self::zeros(header.shape, header.word_size, header.fortran_order);
        reader
            .read_exact(&mut arr.bytes_mut())
            .map_err(ReadNpyError::from)?;
        Ok(arr)
    }
}
