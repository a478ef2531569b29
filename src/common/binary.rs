//! Bounds-checked binary readers for framed formats.
//!
//! JPEG segment headers are big-endian. Every reader here checks the
//! requested range against the slice before touching it, so a length field
//! taken from an untrusted file can never cause an out-of-bounds access.

use zerocopy::{BE, FromBytes, U16};

/// Binary parsing error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryError {
    /// Not enough data to read the requested type
    InsufficientData { expected: usize, available: usize },
    /// Failed to parse the data
    ParseError(String),
}

impl std::fmt::Display for BinaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryError::InsufficientData {
                expected,
                available,
            } => {
                write!(
                    f,
                    "Insufficient data: expected {}, got {}",
                    expected, available
                )
            },
            BinaryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for BinaryError {}

/// Result type for binary operations
pub type BinaryResult<T> = Result<T, BinaryError>;

/// Borrow `len` bytes at `offset`, failing instead of panicking when the
/// range leaves the slice (including on `offset + len` overflow).
///
/// # Examples
///
/// ```
/// use docmark::common::binary::slice_at;
/// let data = [1u8, 2, 3, 4];
/// assert_eq!(slice_at(&data, 1, 2).unwrap(), &[2, 3]);
/// assert!(slice_at(&data, 3, 2).is_err());
/// assert!(slice_at(&data, usize::MAX, 2).is_err());
/// ```
#[inline]
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> BinaryResult<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| BinaryError::ParseError("offset overflow".to_string()))?;
    data.get(offset..end)
        .ok_or(BinaryError::InsufficientData {
            expected: end,
            available: data.len(),
        })
}

/// Read a big-endian u16 from a byte slice at the given offset.
///
/// # Examples
///
/// ```
/// use docmark::common::binary::read_u16_be;
/// let data = [0x12, 0x34, 0x56, 0x78];
/// assert_eq!(read_u16_be(&data, 0).unwrap(), 0x1234);
/// assert_eq!(read_u16_be(&data, 2).unwrap(), 0x5678);
/// ```
#[inline]
pub fn read_u16_be(data: &[u8], offset: usize) -> BinaryResult<u16> {
    let bytes = slice_at(data, offset, 2)?;
    U16::<BE>::read_from_bytes(bytes)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read u16".to_string()))
}

/// Encode a u16 as big-endian bytes.
#[inline]
pub fn u16_be_bytes(value: u16) -> [u8; 2] {
    U16::<BE>::new(value).to_bytes()
}
