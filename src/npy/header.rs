use crate::npy::elements::DType;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io;
use thiserror::Error;

/// Magic string to indicate npy format.
const MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// Version bytes written ahead of the header length field.
const VERSION: [u8; 2] = [0x02, 0x00];

/// Number of bytes in the little-endian header length field.
const HEADER_LEN_NUM_BYTES: usize = 4;

/// Bytes ahead of the header text: magic string, version, length field.
const PREFIX_LEN: usize = MAGIC_STRING.len() + VERSION.len() + HEADER_LEN_NUM_BYTES;

/// The prefix length plus the header text length must be evenly divisible by
/// this value for every header this crate writes.
const HEADER_DIVISOR: usize = 16;

/// An error parsing the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum ParseHeaderError {
    /// A required key could not be located in the header dictionary.
    #[error("missing header key: '{0}'")]
    MissingKey(&'static str),
    /// The header text does not end with a newline.
    #[error("newline missing at end of header")]
    MissingNewline,
    /// The `descr` entry declares a byte order other than little-endian.
    #[error("unsupported endianness marker '{0}': only little-endian data is supported")]
    UnsupportedEndianness(char),
}

/// An error reading the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum ReadHeaderError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error parsing the header text.
    #[error("error parsing header: {0}")]
    Parse(#[from] ParseHeaderError),
}

/// An error formatting the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum FormatHeaderError {
    /// Only rank-1 and rank-2 shapes can be described by the writer.
    #[error("cannot describe a rank-{0} array; only rank 1 and 2 are written")]
    UnsupportedRank(usize),
    /// `HEADER_LEN` exceeds the maximum encodable value.
    #[error("the header is too long")]
    HeaderTooLong,
}

/// An error writing the header of a `.npy` file.
#[derive(Debug, Error)]
pub enum WriteHeaderError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error formatting the header.
    #[error("error formatting header: {0}")]
    Format(#[from] FormatHeaderError),
}

/// Metadata parsed from the header of a `.npy` file.
///
/// The layout flag is carried through verbatim; it is never inferred from the
/// data or corrected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Dimension sizes in declaration order; empty for a rank-0 file.
    pub shape: Vec<usize>,
    /// Byte width of one scalar element.
    pub word_size: usize,
    /// `true` for column-major storage, `false` for row-major.
    pub fortran_order: bool,
}

impl Header {
    /// Number of scalar elements; an empty shape counts as a single element.
    pub fn num_vals(&self) -> usize {
        self.shape.iter().product()
    }

    /// Payload length in bytes.
    pub fn num_bytes(&self) -> usize {
        self.word_size * self.num_vals()
    }

    /// Reads and parses the header at the reader's current position.
    ///
    /// The magic string and version bytes are skipped, not validated. The
    /// dictionary is not parsed as a grammar; the known keys are located by
    /// substring and their values read at fixed offsets.
    pub fn from_reader<R: io::Read>(mut reader: R) -> Result<Self, ReadHeaderError> {
        let mut prefix = [0; MAGIC_STRING.len() + VERSION.len()];
        reader.read_exact(&mut prefix)?;
        let header_len = reader.read_u32::<LittleEndian>()? as usize;

        let mut text = vec![0; header_len];
        reader.read_exact(&mut text)?;
        if text.last() != Some(&b'\n') {
            return Err(ParseHeaderError::MissingNewline.into());
        }

        let fortran_order = parse_fortran_order(&text)?;
        let shape = parse_shape(&text)?;
        let word_size = parse_descr(&text)?;
        Ok(Self { shape, word_size, fortran_order })
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn parse_fortran_order(text: &[u8]) -> Result<bool, ParseHeaderError> {
    let key = find(text, b"fortran_order").ok_or(ParseHeaderError::MissingKey("fortran_order"))?;
    // The boolean token sits a fixed distance past the key: `fortran_order': `.
    let token = text.get(key + 16..key + 20);
    Ok(token.is_some_and(|token| token == b"True"))
}

fn parse_shape(text: &[u8]) -> Result<Vec<usize>, ParseHeaderError> {
    let open = text.iter().position(|&b| b == b'(');
    let close = text.iter().position(|&b| b == b')');
    let (Some(open), Some(close)) = (open, close) else {
        return Err(ParseHeaderError::MissingKey("shape"));
    };
    // Maximal digit runs between the parens give the dimension list; this
    // also absorbs the trailing comma of rank-1 tuples.
    let mut shape = Vec::new();
    let mut current: Option<usize> = None;
    for &b in text.get(open + 1..close).unwrap_or(&[]) {
        if b.is_ascii_digit() {
            current = Some(current.unwrap_or(0) * 10 + usize::from(b - b'0'));
        } else if let Some(dim) = current.take() {
            shape.push(dim);
        }
    }
    if let Some(dim) = current {
        shape.push(dim);
    }
    Ok(shape)
}

fn parse_descr(text: &[u8]) -> Result<usize, ParseHeaderError> {
    let key = find(text, b"descr").ok_or(ParseHeaderError::MissingKey("descr"))?;
    // The endianness marker sits a fixed distance past the key: `descr': '`.
    let marker = *text.get(key + 9).ok_or(ParseHeaderError::MissingKey("descr"))?;
    match marker {
        b'<' | b'|' => {}
        other => return Err(ParseHeaderError::UnsupportedEndianness(char::from(other))),
    }
    // The type letter at the next position is carried as-is; the digit run
    // after it is the word size.
    let mut word_size = 0;
    for &b in text.get(key + 11..).unwrap_or(&[]) {
        if b.is_ascii_digit() {
            word_size = word_size * 10 + usize::from(b - b'0');
        } else {
            break;
        }
    }
    Ok(word_size)
}

/// Formats a complete header: magic string, version, length field, and the
/// padded, newline-terminated dictionary text.
pub(crate) fn encode_header(
    dtype: DType,
    shape: &[usize],
    fortran_order: bool,
) -> Result<Vec<u8>, FormatHeaderError> {
    let shape_text = match *shape {
        [len] => format!("({len},)"),
        [rows, cols] => format!("({rows}, {cols})"),
        _ => return Err(FormatHeaderError::UnsupportedRank(shape.len())),
    };
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
        dtype.tag(),
        if fortran_order { "True" } else { "False" },
        shape_text,
    );

    // Space padding before the final newline keeps the prefix plus the header
    // text on a 16-byte boundary.
    let unpadded_total_len = PREFIX_LEN + dict.len() + 1;
    let padding_len = (HEADER_DIVISOR - unpadded_total_len % HEADER_DIVISOR) % HEADER_DIVISOR;
    let text_len = dict.len() + padding_len + 1;
    let header_len = u32::try_from(text_len).map_err(|_| FormatHeaderError::HeaderTooLong)?;
    let mut formatted_header_len = [0; HEADER_LEN_NUM_BYTES];
    LittleEndian::write_u32(&mut formatted_header_len, header_len);

    let total_len = PREFIX_LEN + text_len;
    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(MAGIC_STRING);
    out.extend_from_slice(&VERSION);
    out.extend_from_slice(&formatted_header_len);
    out.extend_from_slice(dict.as_bytes());
    out.resize(total_len - 1, b' ');
    out.push(b'\n');

    debug_assert_eq!(out.len(), total_len);
    debug_assert_eq!(out.len() % HEADER_DIVISOR, 0);
    Ok(out)
}

/// Writes a formatted header as one contiguous write.
pub(crate) fn write_header<W: io::Write>(
    mut writer: W,
    dtype: DType,
    shape: &[usize],
    fortran_order: bool,
) -> Result<(), WriteHeaderError> {
    writer.write_all(&encode_header(dtype, shape, fortran_order)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds complete header bytes around a raw dictionary line.
    fn header_bytes(text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC_STRING);
        out.extend_from_slice(&VERSION);
        let mut len = [0; HEADER_LEN_NUM_BYTES];
        LittleEndian::write_u32(&mut len, text.len() as u32);
        out.extend_from_slice(&len);
        out.extend_from_slice(text.as_bytes());
        out
    }

    #[test]
    fn parses_rank_2_header() {
        let bytes = header_bytes("{'descr': '<i4', 'fortran_order': False, 'shape': (2, 3), }\n");
        let header = Header::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(header.shape, vec![2, 3]);
        assert_eq!(header.word_size, 4);
        assert!(!header.fortran_order);
        assert_eq!(header.num_vals(), 6);
        assert_eq!(header.num_bytes(), 24);
    }

    #[test]
    fn parses_rank_1_trailing_comma() {
        let bytes = header_bytes("{'descr': '|u1', 'fortran_order': True, 'shape': (4,), }\n");
        let header = Header::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(header.shape, vec![4]);
        assert_eq!(header.word_size, 1);
        assert!(header.fortran_order);
    }

    #[test]
    fn empty_shape_is_one_element() {
        let bytes = header_bytes("{'descr': '<f8', 'fortran_order': False, 'shape': (), }\n");
        let header = Header::from_reader(bytes.as_slice()).unwrap();
        assert!(header.shape.is_empty());
        assert_eq!(header.num_vals(), 1);
        assert_eq!(header.num_bytes(), 8);
    }

    #[test]
    fn magic_and_version_are_not_validated() {
        let text = "{'descr': '<f4', 'fortran_order': False, 'shape': (5,), }\n";
        let mut bytes = header_bytes(text);
        bytes[..6].copy_from_slice(b"NOTNPY");
        bytes[6] = 9;
        bytes[7] = 7;
        let header = Header::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(header.shape, vec![5]);
    }

    #[test]
    fn missing_descr_names_the_key() {
        let bytes = header_bytes("{'fortran_order': False, 'shape': (3,), }\n");
        let err = Header::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Parse(ParseHeaderError::MissingKey("descr"))
        ));
    }

    #[test]
    fn missing_fortran_order_names_the_key() {
        let bytes = header_bytes("{'descr': '<i4', 'shape': (3,), }\n");
        let err = Header::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Parse(ParseHeaderError::MissingKey("fortran_order"))
        ));
    }

    #[test]
    fn missing_parens_names_shape() {
        let bytes = header_bytes("{'descr': '<i4', 'fortran_order': False, }\n");
        let err = Header::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Parse(ParseHeaderError::MissingKey("shape"))
        ));
    }

    #[test]
    fn big_endian_is_rejected() {
        let bytes = header_bytes("{'descr': '>i4', 'fortran_order': False, 'shape': (3,), }\n");
        let err = Header::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Parse(ParseHeaderError::UnsupportedEndianness('>'))
        ));
    }

    #[test]
    fn missing_newline_is_rejected() {
        let bytes = header_bytes("{'descr': '<i4', 'fortran_order': False, 'shape': (3,), }");
        let err = Header::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Parse(ParseHeaderError::MissingNewline)
        ));
    }

    #[test]
    fn short_header_text_is_an_eof_error() {
        let mut bytes = header_bytes("{'descr': '<i4', 'fortran_order': False, 'shape': (3,), }\n");
        bytes.truncate(bytes.len() - 10);
        let err = Header::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReadHeaderError::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn encoded_headers_are_aligned() {
        let shapes: &[&[usize]] = &[&[1], &[4], &[123_456], &[2, 3], &[1000, 7]];
        for &shape in shapes {
            for dtype in [DType::UInt8, DType::Int32, DType::Float64] {
                for fortran_order in [false, true] {
                    let out = encode_header(dtype, shape, fortran_order).unwrap();
                    assert_eq!(out.len() % HEADER_DIVISOR, 0);
                    let stored = LittleEndian::read_u32(&out[8..12]) as usize;
                    assert_eq!(stored, out.len() - PREFIX_LEN);
                    assert_eq!(out[out.len() - 1], b'\n');
                }
            }
        }
    }

    #[test]
    fn encoded_header_round_trips() {
        let out = encode_header(DType::Float32, &[7, 2], true).unwrap();
        let header = Header::from_reader(out.as_slice()).unwrap();
        assert_eq!(header.shape, vec![7, 2]);
        assert_eq!(header.word_size, 4);
        assert!(header.fortran_order);
    }

    #[test]
    fn rank_3_is_rejected_before_writing() {
        let err = encode_header(DType::Int16, &[2, 3, 4], false).unwrap_err();
        assert!(matches!(err, FormatHeaderError::UnsupportedRank(3)));
    }
}
