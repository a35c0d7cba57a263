//! N-dimensional arrays and their binary blob format
//!
//! Arrays are stored in `ARRAY` columns as a self-describing little-endian
//! blob:
//!
//! ```text
//! ┌──────────┬─────────┬───────┬──────────┬──────────────┬─────────┬──────────┐
//! │ "JNDA"   │ version │ dtype │ rank u32 │ dims u64 × r │ payload │ xxh3 u64 │
//! └──────────┴─────────┴───────┴──────────┴──────────────┴─────────┴──────────┘
//! ```
//!
//! The payload is the element data in row-major order. The trailing checksum
//! covers the payload only.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Blob magic bytes
pub const TENSOR_MAGIC: [u8; 4] = *b"JNDA";

/// Current blob format version
pub const TENSOR_FORMAT_VERSION: u8 = 1;

/// Errors from tensor construction or blob decoding
#[derive(Debug, Error)]
pub enum TensorError {
    /// Blob does not start with `JNDA`
    #[error("bad magic bytes")]
    BadMagic,

    /// Blob written by an unknown format version
    #[error("unsupported tensor format version {0}")]
    UnsupportedVersion(u8),

    /// Unknown element type byte
    #[error("unknown element type {0}")]
    UnknownElementType(u8),

    /// Blob ended early
    #[error("truncated tensor blob")]
    Truncated,

    /// Bytes left over after the checksum
    #[error("{0} trailing bytes after tensor blob")]
    TrailingBytes(usize),

    /// Payload checksum did not match
    #[error("checksum mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    ChecksumMismatch {
        /// Checksum read from the blob
        stored: u64,
        /// Checksum of the payload as read
        computed: u64,
    },

    /// Shape product disagrees with element count
    #[error("shape {shape:?} holds {expected} elements, data has {actual}")]
    ShapeMismatch {
        /// Declared shape
        shape: Vec<usize>,
        /// Product of the shape
        expected: usize,
        /// Element count of the data
        actual: usize,
    },

    /// Shape product overflows `usize`
    #[error("shape {0:?} is too large")]
    ShapeOverflow(Vec<u64>),
}

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// Unsigned byte
    U8,
    /// Boolean, one byte per element
    Bool,
}

impl ElementType {
    /// Blob tag byte
    pub fn to_byte(&self) -> u8 {
        match self {
            ElementType::F32 => 0,
            ElementType::F64 => 1,
            ElementType::I32 => 2,
            ElementType::I64 => 3,
            ElementType::U8 => 4,
            ElementType::Bool => 5,
        }
    }

    /// Parse a blob tag byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ElementType::F32),
            1 => Some(ElementType::F64),
            2 => Some(ElementType::I32),
            3 => Some(ElementType::I64),
            4 => Some(ElementType::U8),
            5 => Some(ElementType::Bool),
            _ => None,
        }
    }

    /// Encoded size of one element in bytes
    pub fn size(&self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 => 4,
            ElementType::F64 | ElementType::I64 => 8,
            ElementType::U8 | ElementType::Bool => 1,
        }
    }
}

/// Typed element storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorData {
    /// f32 elements
    F32(Vec<f32>),
    /// f64 elements
    F64(Vec<f64>),
    /// i32 elements
    I32(Vec<i32>),
    /// i64 elements
    I64(Vec<i64>),
    /// u8 elements
    U8(Vec<u8>),
    /// bool elements
    Bool(Vec<bool>),
}

impl TensorData {
    /// Element type of this data
    pub fn element_type(&self) -> ElementType {
        match self {
            TensorData::F32(_) => ElementType::F32,
            TensorData::F64(_) => ElementType::F64,
            TensorData::I32(_) => ElementType::I32,
            TensorData::I64(_) => ElementType::I64,
            TensorData::U8(_) => ElementType::U8,
            TensorData::Bool(_) => ElementType::Bool,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::U8(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    /// True if there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! tensor_data_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for TensorData {
                fn from(v: Vec<$t>) -> Self {
                    TensorData::$variant(v)
                }
            }
        )*
    };
}

tensor_data_from!(f32 => F32, f64 => F64, i32 => I32, i64 => I64, u8 => U8, bool => Bool);

/// N-dimensional array with a fixed element type
///
/// ## Invariants
///
/// - The product of `shape` equals the element count (an empty shape is a
///   scalar holding one element)
/// - Elements are in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = TensorError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Tensor::new(raw.shape, raw.data)
    }
}

impl Tensor {
    /// Create a tensor, checking the shape against the data length
    pub fn new(shape: Vec<usize>, data: impl Into<TensorData>) -> Result<Self, TensorError> {
        let data = data.into();
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| TensorError::ShapeOverflow(shape.iter().map(|&d| d as u64).collect()))?;
        if expected != data.len() {
            return Err(TensorError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Tensor { shape, data })
    }

    /// One-dimensional tensor over the given elements
    pub fn vector(data: impl Into<TensorData>) -> Self {
        let data = data.into();
        Tensor {
            shape: vec![data.len()],
            data,
        }
    }

    /// Dimensions
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element storage
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Element type
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if there are no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn contains_non_finite(&self) -> bool {
        match &self.data {
            TensorData::F32(v) => v.iter().any(|x| !x.is_finite()),
            TensorData::F64(v) => v.iter().any(|x| !x.is_finite()),
            _ => false,
        }
    }

    /// Encode to the blob format
    pub fn to_blob(&self) -> Vec<u8> {
        let payload = self.payload_bytes();
        let mut out = Vec::with_capacity(10 + self.shape.len() * 8 + payload.len() + 8);
        out.extend_from_slice(&TENSOR_MAGIC);
        out.push(TENSOR_FORMAT_VERSION);
        out.push(self.element_type().to_byte());
        // Writes into a Vec cannot fail
        let _ = out.write_u32::<LittleEndian>(self.shape.len() as u32);
        for &dim in &self.shape {
            let _ = out.write_u64::<LittleEndian>(dim as u64);
        }
        let checksum = xxh3_64(&payload);
        out.extend_from_slice(&payload);
        let _ = out.write_u64::<LittleEndian>(checksum);
        out
    }

    fn payload_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len() * self.element_type().size());
        match &self.data {
            TensorData::F32(v) => v.iter().for_each(|x| {
                let _ = buf.write_f32::<LittleEndian>(*x);
            }),
            TensorData::F64(v) => v.iter().for_each(|x| {
                let _ = buf.write_f64::<LittleEndian>(*x);
            }),
            TensorData::I32(v) => v.iter().for_each(|x| {
                let _ = buf.write_i32::<LittleEndian>(*x);
            }),
            TensorData::I64(v) => v.iter().for_each(|x| {
                let _ = buf.write_i64::<LittleEndian>(*x);
            }),
            TensorData::U8(v) => buf.extend_from_slice(v),
            TensorData::Bool(v) => buf.extend(v.iter().map(|&b| b as u8)),
        }
        buf
    }

    /// Decode from the blob format
    pub fn from_blob(bytes: &[u8]) -> Result<Self, TensorError> {
        let mut cursor = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic).map_err(eof)?;
        if magic != TENSOR_MAGIC {
            return Err(TensorError::BadMagic);
        }
        let version = cursor.read_u8().map_err(eof)?;
        if version != TENSOR_FORMAT_VERSION {
            return Err(TensorError::UnsupportedVersion(version));
        }
        let tag = cursor.read_u8().map_err(eof)?;
        let dtype = ElementType::from_byte(tag).ok_or(TensorError::UnknownElementType(tag))?;

        let rank = cursor.read_u32::<LittleEndian>().map_err(eof)? as usize;
        // Each dimension needs 8 bytes; reject absurd ranks before allocating
        if rank > bytes.len() / 8 {
            return Err(TensorError::Truncated);
        }
        let mut raw_dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            raw_dims.push(cursor.read_u64::<LittleEndian>().map_err(eof)?);
        }
        let count = raw_dims
            .iter()
            .try_fold(1usize, |acc, &d| {
                usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
            })
            .ok_or_else(|| TensorError::ShapeOverflow(raw_dims.clone()))?;
        let payload_len = count
            .checked_mul(dtype.size())
            .ok_or_else(|| TensorError::ShapeOverflow(raw_dims.clone()))?;

        let start = cursor.position() as usize;
        let remaining = bytes.len() - start;
        let needed = payload_len.saturating_add(8);
        if remaining < needed {
            return Err(TensorError::Truncated);
        }
        if remaining > needed {
            return Err(TensorError::TrailingBytes(remaining - needed));
        }

        let payload = &bytes[start..start + payload_len];
        let stored = (&bytes[start + payload_len..])
            .read_u64::<LittleEndian>()
            .map_err(eof)?;
        let computed = xxh3_64(payload);
        if stored != computed {
            return Err(TensorError::ChecksumMismatch { stored, computed });
        }

        let data = read_elements(dtype, payload, count).map_err(eof)?;
        let shape = raw_dims.into_iter().map(|d| d as usize).collect();
        Tensor::new(shape, data)
    }
}

fn read_elements(dtype: ElementType, payload: &[u8], count: usize) -> io::Result<TensorData> {
    let mut r = payload;
    Ok(match dtype {
        ElementType::F32 => TensorData::F32(
            (0..count)
                .map(|_| r.read_f32::<LittleEndian>())
                .collect::<io::Result<_>>()?,
        ),
        ElementType::F64 => TensorData::F64(
            (0..count)
                .map(|_| r.read_f64::<LittleEndian>())
                .collect::<io::Result<_>>()?,
        ),
        ElementType::I32 => TensorData::I32(
            (0..count)
                .map(|_| r.read_i32::<LittleEndian>())
                .collect::<io::Result<_>>()?,
        ),
        ElementType::I64 => TensorData::I64(
            (0..count)
                .map(|_| r.read_i64::<LittleEndian>())
                .collect::<io::Result<_>>()?,
        ),
        ElementType::U8 => TensorData::U8(payload.to_vec()),
        ElementType::Bool => TensorData::Bool(payload.iter().map(|&b| b != 0).collect()),
    })
}

fn eof(_: io::Error) -> TensorError {
    TensorError::Truncated
}
