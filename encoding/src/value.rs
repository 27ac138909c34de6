//! Primitive attribute values.
//!
//! Only the value shapes needed by this toolkit are supported:
//! text, binary integers, floating point numbers and raw bytes.
//! Conversions are lenient in the same way as most DICOM readers:
//! numeric attributes stored as text (`IS`, `DS`) can be read as numbers.
use crate::header::VR;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use smallvec::SmallVec;
use std::borrow::Cow;

/// An aggregation of one or more values of the same type.
pub type C<T> = SmallVec<[T; 2]>;

/// A primitive (non-sequence) attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    /// No value.
    Empty,
    /// One or more text values.
    Strs(C<String>),
    /// Raw bytes.
    U8(C<u8>),
    /// Unsigned 16-bit integers.
    U16(C<u16>),
    /// Signed 16-bit integers.
    I16(C<i16>),
    /// Unsigned 32-bit integers.
    U32(C<u32>),
    /// Signed 32-bit integers.
    I32(C<i32>),
    /// Unsigned 64-bit integers.
    U64(C<u64>),
    /// Signed 64-bit integers.
    I64(C<i64>),
    /// Single precision floating point numbers.
    F32(C<f32>),
    /// Double precision floating point numbers.
    F64(C<f64>),
}

impl PrimitiveValue {
    /// The number of individual values.
    pub fn multiplicity(&self) -> usize {
        match self {
            PrimitiveValue::Empty => 0,
            PrimitiveValue::Strs(v) => v.len(),
            PrimitiveValue::U8(v) => v.len(),
            PrimitiveValue::U16(v) => v.len(),
            PrimitiveValue::I16(v) => v.len(),
            PrimitiveValue::U32(v) => v.len(),
            PrimitiveValue::I32(v) => v.len(),
            PrimitiveValue::U64(v) => v.len(),
            PrimitiveValue::I64(v) => v.len(),
            PrimitiveValue::F32(v) => v.len(),
            PrimitiveValue::F64(v) => v.len(),
        }
    }

    /// Whether the value is empty.
    pub fn is_empty(&self) -> bool {
        self.multiplicity() == 0
    }

    /// Retrieve the value as a single string,
    /// joining multiple values with a backslash
    /// and trimming trailing padding.
    pub fn to_str(&self) -> Cow<str> {
        match self {
            PrimitiveValue::Strs(v) if v.len() == 1 => {
                Cow::Borrowed(v[0].trim_end_matches([' ', '\0']))
            }
            PrimitiveValue::Strs(v) => Cow::Owned(
                v.iter()
                    .map(|s| s.trim_end_matches([' ', '\0']))
                    .collect::<Vec<_>>()
                    .join("\\"),
            ),
            PrimitiveValue::Empty => Cow::Borrowed(""),
            PrimitiveValue::U8(v) => Cow::Owned(String::from_utf8_lossy(v).into_owned()),
            other => Cow::Owned(
                other
                    .to_f64s()
                    .unwrap_or_default()
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("\\"),
            ),
        }
    }

    /// Retrieve all values as signed 64-bit integers.
    /// Text values are parsed after trimming.
    pub fn to_ints(&self) -> Option<C<i64>> {
        match self {
            PrimitiveValue::Strs(v) => v
                .iter()
                .flat_map(|s| s.split('\\'))
                .map(|s| s.trim_matches([' ', '\0']).parse::<i64>().ok())
                .collect(),
            PrimitiveValue::U16(v) => Some(v.iter().map(|&x| x as i64).collect()),
            PrimitiveValue::I16(v) => Some(v.iter().map(|&x| x as i64).collect()),
            PrimitiveValue::U32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            PrimitiveValue::I32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            PrimitiveValue::I64(v) => Some(v.clone()),
            PrimitiveValue::U64(v) => v.iter().map(|&x| i64::try_from(x).ok()).collect(),
            PrimitiveValue::U8(v) => Some(v.iter().map(|&x| x as i64).collect()),
            PrimitiveValue::F32(_) | PrimitiveValue::F64(_) | PrimitiveValue::Empty => None,
        }
    }

    /// Retrieve the first value as a signed 64-bit integer.
    pub fn to_int(&self) -> Option<i64> {
        self.to_ints().and_then(|v| v.first().copied())
    }

    /// Retrieve the first value as an unsigned 16-bit integer,
    /// if it fits.
    pub fn to_u16(&self) -> Option<u16> {
        self.to_int().and_then(|v| u16::try_from(v).ok())
    }

    /// Retrieve all values as double precision numbers.
    /// Text values are parsed after trimming.
    pub fn to_f64s(&self) -> Option<C<f64>> {
        match self {
            PrimitiveValue::Strs(v) => v
                .iter()
                .flat_map(|s| s.split('\\'))
                .map(|s| s.trim_matches([' ', '\0']).parse::<f64>().ok())
                .collect(),
            PrimitiveValue::F32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            PrimitiveValue::F64(v) => Some(v.clone()),
            PrimitiveValue::Empty => None,
            other => other
                .to_ints()
                .map(|v| v.into_iter().map(|x| x as f64).collect()),
        }
    }

    /// Retrieve the first value as a double precision number.
    pub fn to_f64(&self) -> Option<f64> {
        self.to_f64s().and_then(|v| v.first().copied())
    }

    /// Decode a value from its little endian binary form,
    /// as interpreted by the given value representation.
    pub fn from_bytes(vr: VR, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return PrimitiveValue::Empty;
        }
        match vr {
            vr if vr.is_textual() => {
                let text = String::from_utf8_lossy(bytes);
                let text = text.trim_end_matches([' ', '\0']);
                if matches!(vr, VR::LT | VR::ST | VR::UT | VR::UR) {
                    // single-valued text VRs may contain backslashes
                    PrimitiveValue::Strs(std::iter::once(text.to_string()).collect())
                } else {
                    PrimitiveValue::Strs(text.split('\\').map(str::to_string).collect())
                }
            }
            VR::US => PrimitiveValue::U16(
                bytes
                    .chunks_exact(2)
                    .map(LittleEndian::read_u16)
                    .collect(),
            ),
            VR::SS => PrimitiveValue::I16(
                bytes
                    .chunks_exact(2)
                    .map(LittleEndian::read_i16)
                    .collect(),
            ),
            VR::UL => PrimitiveValue::U32(
                bytes
                    .chunks_exact(4)
                    .map(LittleEndian::read_u32)
                    .collect(),
            ),
            VR::SL => PrimitiveValue::I32(
                bytes
                    .chunks_exact(4)
                    .map(LittleEndian::read_i32)
                    .collect(),
            ),
            VR::UV => PrimitiveValue::U64(
                bytes
                    .chunks_exact(8)
                    .map(LittleEndian::read_u64)
                    .collect(),
            ),
            VR::SV => PrimitiveValue::I64(
                bytes
                    .chunks_exact(8)
                    .map(LittleEndian::read_i64)
                    .collect(),
            ),
            VR::FL => PrimitiveValue::F32(
                bytes
                    .chunks_exact(4)
                    .map(LittleEndian::read_f32)
                    .collect(),
            ),
            VR::FD => PrimitiveValue::F64(
                bytes
                    .chunks_exact(8)
                    .map(LittleEndian::read_f64)
                    .collect(),
            ),
            _ => PrimitiveValue::U8(bytes.iter().copied().collect()),
        }
    }

    /// Encode this value in little endian,
    /// padded to an even length as mandated for the given VR
    /// (`UI` with a null byte, other text with a space,
    /// binary data with zero).
    pub fn to_bytes(&self, vr: VR) -> Vec<u8> {
        let mut out = match self {
            PrimitiveValue::Empty => Vec::new(),
            PrimitiveValue::Strs(v) => v.join("\\").into_bytes(),
            PrimitiveValue::U8(v) => v.to_vec(),
            PrimitiveValue::U16(v) => {
                let mut out = vec![0; v.len() * 2];
                LittleEndian::write_u16_into(v, &mut out);
                out
            }
            PrimitiveValue::I16(v) => {
                let mut out = vec![0; v.len() * 2];
                LittleEndian::write_i16_into(v, &mut out);
                out
            }
            PrimitiveValue::U32(v) => {
                let mut out = vec![0; v.len() * 4];
                LittleEndian::write_u32_into(v, &mut out);
                out
            }
            PrimitiveValue::I32(v) => {
                let mut out = vec![0; v.len() * 4];
                LittleEndian::write_i32_into(v, &mut out);
                out
            }
            PrimitiveValue::U64(v) => {
                let mut out = vec![0; v.len() * 8];
                LittleEndian::write_u64_into(v, &mut out);
                out
            }
            PrimitiveValue::I64(v) => {
                let mut out = vec![0; v.len() * 8];
                LittleEndian::write_i64_into(v, &mut out);
                out
            }
            PrimitiveValue::F32(v) => {
                let mut out = vec![0; v.len() * 4];
                LittleEndian::write_f32_into(v, &mut out);
                out
            }
            PrimitiveValue::F64(v) => {
                let mut out = vec![0; v.len() * 8];
                LittleEndian::write_f64_into(v, &mut out);
                out
            }
        };
        if out.len() % 2 == 1 {
            let pad = match vr {
                VR::UI => b'\0',
                vr if vr.is_textual() => b' ',
                _ => 0,
            };
            out.push(pad);
        }
        out
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        PrimitiveValue::Strs(std::iter::once(value.to_string()).collect())
    }
}

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        PrimitiveValue::Strs(std::iter::once(value).collect())
    }
}

impl From<u16> for PrimitiveValue {
    fn from(value: u16) -> Self {
        PrimitiveValue::U16(std::iter::once(value).collect())
    }
}

impl From<u32> for PrimitiveValue {
    fn from(value: u32) -> Self {
        PrimitiveValue::U32(std::iter::once(value).collect())
    }
}

impl From<u64> for PrimitiveValue {
    fn from(value: u64) -> Self {
        PrimitiveValue::U64(std::iter::once(value).collect())
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(value: Vec<u8>) -> Self {
        PrimitiveValue::U8(value.into())
    }
}
