//! TIFF tag values.
//!
//! A [`TagValue`] is the decoded content of one IFD entry: a tagged union
//! over every TIFF field type, always held as an array (a scalar is a
//! one-element array). Values are decoded from, and encoded to, raw entry
//! bytes in either byte order.
//!
//! Values are stored either inline in the IFD entry (when they fit in the
//! 4- or 8-byte slot) or at an offset in the file. [`ValueReader`] resolves
//! both cases, fetching out-of-line arrays in a single read.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::Serialize;

use crate::error::TiffError;
use crate::io::ByteSource;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::{tag_name, FieldType};

// =============================================================================
// Rationals
// =============================================================================

/// Unsigned rational. Kept exactly as stored; never reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Floating-point value; `NaN` when the denominator is zero.
    pub fn to_f64(self) -> f64 {
        if self.denominator == 0 {
            f64::NAN
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

/// Signed rational. Kept exactly as stored; never reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SRational {
    pub numerator: i32,
    pub denominator: i32,
}

impl SRational {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn to_f64(self) -> f64 {
        if self.denominator == 0 {
            f64::NAN
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

// =============================================================================
// TagValue
// =============================================================================

/// Decoded value of one TIFF field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values")]
pub enum TagValue {
    Byte(Vec<u8>),
    /// ASCII strings, split on embedded NUL terminators
    Ascii(Vec<String>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<Rational>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<SRational>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ifd(Vec<u32>),
    Long8(Vec<u64>),
    SLong8(Vec<i64>),
    Ifd8(Vec<u64>),
}

impl TagValue {
    /// A single ASCII string.
    pub fn ascii(text: impl Into<String>) -> Self {
        TagValue::Ascii(vec![text.into()])
    }

    pub fn short(value: u16) -> Self {
        TagValue::Short(vec![value])
    }

    pub fn long(value: u32) -> Self {
        TagValue::Long(vec![value])
    }

    pub fn rational(numerator: u32, denominator: u32) -> Self {
        TagValue::Rational(vec![Rational::new(numerator, denominator)])
    }

    /// Parse `text` into a value of the same field type as `self`.
    ///
    /// ASCII takes the text as is. Numeric types take a comma-separated
    /// list; rationals are written `n/d` (a bare `n` means `n/1`).
    pub fn parse_like(&self, text: &str) -> Result<TagValue, TiffError> {
        fn items<T: FromStr>(text: &str) -> Result<Vec<T>, TiffError> {
            text.split(',')
                .map(|item| {
                    let item = item.trim();
                    item.parse::<T>().map_err(|_| {
                        TiffError::invalid_tag("value", format!("cannot parse {:?}", item))
                    })
                })
                .collect()
        }
        fn ratios<T: FromStr + Copy>(text: &str, one: T) -> Result<Vec<(T, T)>, TiffError> {
            text.split(',')
                .map(|item| match item.split_once('/') {
                    Some((n, d)) => Ok((items::<T>(n)?[0], items::<T>(d)?[0])),
                    None => Ok((items::<T>(item)?[0], one)),
                })
                .collect()
        }

        Ok(match self {
            TagValue::Ascii(_) => TagValue::ascii(text),
            TagValue::Byte(_) => TagValue::Byte(items(text)?),
            TagValue::Undefined(_) => TagValue::Undefined(items(text)?),
            TagValue::Short(_) => TagValue::Short(items(text)?),
            TagValue::Long(_) => TagValue::Long(items(text)?),
            TagValue::Ifd(_) => TagValue::Ifd(items(text)?),
            TagValue::SByte(_) => TagValue::SByte(items(text)?),
            TagValue::SShort(_) => TagValue::SShort(items(text)?),
            TagValue::SLong(_) => TagValue::SLong(items(text)?),
            TagValue::Float(_) => TagValue::Float(items(text)?),
            TagValue::Double(_) => TagValue::Double(items(text)?),
            TagValue::Long8(_) => TagValue::Long8(items(text)?),
            TagValue::SLong8(_) => TagValue::SLong8(items(text)?),
            TagValue::Ifd8(_) => TagValue::Ifd8(items(text)?),
            TagValue::Rational(_) => TagValue::Rational(
                ratios::<u32>(text, 1)?
                    .into_iter()
                    .map(|(n, d)| Rational::new(n, d))
                    .collect(),
            ),
            TagValue::SRational(_) => TagValue::SRational(
                ratios::<i32>(text, 1)?
                    .into_iter()
                    .map(|(n, d)| SRational::new(n, d))
                    .collect(),
            ),
        })
    }

    /// TIFF field type this value is written as.
    pub fn field_type(&self) -> FieldType {
        match self {
            TagValue::Byte(_) => FieldType::Byte,
            TagValue::Ascii(_) => FieldType::Ascii,
            TagValue::Short(_) => FieldType::Short,
            TagValue::Long(_) => FieldType::Long,
            TagValue::Rational(_) => FieldType::Rational,
            TagValue::SByte(_) => FieldType::SByte,
            TagValue::Undefined(_) => FieldType::Undefined,
            TagValue::SShort(_) => FieldType::SShort,
            TagValue::SLong(_) => FieldType::SLong,
            TagValue::SRational(_) => FieldType::SRational,
            TagValue::Float(_) => FieldType::Float,
            TagValue::Double(_) => FieldType::Double,
            TagValue::Ifd(_) => FieldType::Ifd,
            TagValue::Long8(_) => FieldType::Long8,
            TagValue::SLong8(_) => FieldType::SLong8,
            TagValue::Ifd8(_) => FieldType::Ifd8,
        }
    }

    /// Element count as written in the IFD entry.
    ///
    /// For ASCII this counts bytes including every NUL terminator.
    pub fn count(&self) -> u64 {
        match self {
            TagValue::Ascii(strings) => strings.iter().map(|s| s.len() as u64 + 1).sum(),
            TagValue::Byte(v) | TagValue::Undefined(v) => v.len() as u64,
            TagValue::Short(v) => v.len() as u64,
            TagValue::Long(v) | TagValue::Ifd(v) => v.len() as u64,
            TagValue::Rational(v) => v.len() as u64,
            TagValue::SByte(v) => v.len() as u64,
            TagValue::SShort(v) => v.len() as u64,
            TagValue::SLong(v) => v.len() as u64,
            TagValue::SRational(v) => v.len() as u64,
            TagValue::Float(v) => v.len() as u64,
            TagValue::Double(v) => v.len() as u64,
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.len() as u64,
            TagValue::SLong8(v) => v.len() as u64,
        }
    }

    /// Encoded byte length, or `None` if it overflows.
    pub fn byte_len(&self) -> Option<u64> {
        self.field_type().byte_len(self.count())
    }

    /// Unsigned integer values widened to u64.
    ///
    /// Returns `None` for signed, floating-point, rational and ASCII values.
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => {
                Some(v.iter().map(|&x| x as u64).collect())
            }
            TagValue::Short(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long(v) | TagValue::Ifd(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long8(v) | TagValue::Ifd8(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// First unsigned integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => v.first().map(|&x| x as u64),
            TagValue::Short(v) => v.first().map(|&x| x as u64),
            TagValue::Long(v) | TagValue::Ifd(v) => v.first().map(|&x| x as u64),
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.first().copied(),
            _ => None,
        }
    }

    /// First ASCII string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(strings) => strings.first().map(String::as_str),
            _ => None,
        }
    }

    /// Raw bytes of BYTE or UNDEFINED values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rationals(&self) -> Option<&[Rational]> {
        match self {
            TagValue::Rational(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric values as f64, for any numeric type including rationals.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Rational(v) => Some(v.iter().map(|r| r.to_f64()).collect()),
            TagValue::SRational(v) => Some(v.iter().map(|r| r.to_f64()).collect()),
            TagValue::Float(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::Double(v) => Some(v.clone()),
            TagValue::SByte(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::SShort(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::SLong(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::SLong8(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::Ascii(_) => None,
            other => other
                .as_u64_vec()
                .map(|v| v.into_iter().map(|x| x as f64).collect()),
        }
    }

    // -------------------------------------------------------------------------
    // Decoding
    // -------------------------------------------------------------------------

    /// Decode `count` elements of `field_type` from raw bytes.
    ///
    /// `bytes` must hold at least `count * size_in_bytes` bytes; `tag` is
    /// only used to name the field in errors.
    pub fn decode(
        tag: u16,
        field_type: FieldType,
        count: u64,
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> Result<Self, TiffError> {
        let needed = field_type
            .byte_len(count)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or_else(|| {
                TiffError::invalid_tag(tag_name(tag), format!("count {} overflows", count))
            })?;
        if bytes.len() < needed {
            return Err(TiffError::invalid_tag(
                tag_name(tag),
                format!(
                    "{:?} x {} needs {} bytes, got {}",
                    field_type,
                    count,
                    needed,
                    bytes.len()
                ),
            ));
        }
        let bytes = &bytes[..needed];
        let bo = byte_order;

        let value = match field_type {
            FieldType::Byte => TagValue::Byte(bytes.to_vec()),
            FieldType::Undefined => TagValue::Undefined(bytes.to_vec()),
            FieldType::SByte => TagValue::SByte(bytes.iter().map(|&b| b as i8).collect()),
            FieldType::Ascii => TagValue::Ascii(split_ascii(bytes)),
            FieldType::Short => TagValue::Short(bytes.chunks_exact(2).map(|c| bo.read_u16(c)).collect()),
            FieldType::SShort => {
                TagValue::SShort(bytes.chunks_exact(2).map(|c| bo.read_u16(c) as i16).collect())
            }
            FieldType::Long => TagValue::Long(bytes.chunks_exact(4).map(|c| bo.read_u32(c)).collect()),
            FieldType::Ifd => TagValue::Ifd(bytes.chunks_exact(4).map(|c| bo.read_u32(c)).collect()),
            FieldType::SLong => {
                TagValue::SLong(bytes.chunks_exact(4).map(|c| bo.read_u32(c) as i32).collect())
            }
            FieldType::Float => TagValue::Float(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(bo.read_u32(c)))
                    .collect(),
            ),
            FieldType::Rational => TagValue::Rational(
                bytes
                    .chunks_exact(8)
                    .map(|c| Rational::new(bo.read_u32(&c[0..4]), bo.read_u32(&c[4..8])))
                    .collect(),
            ),
            FieldType::SRational => TagValue::SRational(
                bytes
                    .chunks_exact(8)
                    .map(|c| {
                        SRational::new(bo.read_u32(&c[0..4]) as i32, bo.read_u32(&c[4..8]) as i32)
                    })
                    .collect(),
            ),
            FieldType::Double => TagValue::Double(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_bits(bo.read_u64(c)))
                    .collect(),
            ),
            FieldType::Long8 => TagValue::Long8(bytes.chunks_exact(8).map(|c| bo.read_u64(c)).collect()),
            FieldType::Ifd8 => TagValue::Ifd8(bytes.chunks_exact(8).map(|c| bo.read_u64(c)).collect()),
            FieldType::SLong8 => {
                TagValue::SLong8(bytes.chunks_exact(8).map(|c| bo.read_u64(c) as i64).collect())
            }
        };
        Ok(value)
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    /// Encode this value into raw entry bytes using `byte_order`.
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let bo = byte_order;
        let mut out = Vec::new();
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => out.extend_from_slice(v),
            TagValue::SByte(v) => out.extend(v.iter().map(|&x| x as u8)),
            TagValue::Ascii(strings) => {
                for s in strings {
                    out.extend_from_slice(s.as_bytes());
                    out.push(0);
                }
            }
            TagValue::Short(v) => v.iter().for_each(|&x| out.extend(bo.u16_bytes(x))),
            TagValue::SShort(v) => v.iter().for_each(|&x| out.extend(bo.u16_bytes(x as u16))),
            TagValue::Long(v) | TagValue::Ifd(v) => {
                v.iter().for_each(|&x| out.extend(bo.u32_bytes(x)))
            }
            TagValue::SLong(v) => v.iter().for_each(|&x| out.extend(bo.u32_bytes(x as u32))),
            TagValue::Float(v) => v.iter().for_each(|&x| out.extend(bo.u32_bytes(x.to_bits()))),
            TagValue::Rational(v) => v.iter().for_each(|r| {
                out.extend(bo.u32_bytes(r.numerator));
                out.extend(bo.u32_bytes(r.denominator));
            }),
            TagValue::SRational(v) => v.iter().for_each(|r| {
                out.extend(bo.u32_bytes(r.numerator as u32));
                out.extend(bo.u32_bytes(r.denominator as u32));
            }),
            TagValue::Double(v) => v.iter().for_each(|&x| out.extend(bo.u64_bytes(x.to_bits()))),
            TagValue::Long8(v) | TagValue::Ifd8(v) => {
                v.iter().for_each(|&x| out.extend(bo.u64_bytes(x)))
            }
            TagValue::SLong8(v) => v.iter().for_each(|&x| out.extend(bo.u64_bytes(x as u64))),
        }
        out
    }
}

/// Split ASCII field bytes into strings at each NUL.
///
/// The final terminator does not start a new (empty) string; a field with
/// no terminator at all still yields its text.
fn split_ascii(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut strings: Vec<String> = bytes
        .split(|&b| b == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    if bytes.last() == Some(&0) {
        strings.pop();
    }
    strings
}

impl fmt::Display for TagValue {
    /// Compact rendering; arrays longer than 8 elements are elided.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            const SHOWN: usize = 8;
            if items.len() == 1 {
                return write!(f, "{}", items[0]);
            }
            write!(f, "[")?;
            for (i, item) in items.iter().take(SHOWN).enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            if items.len() > SHOWN {
                write!(f, ", ... ({} total)", items.len())?;
            }
            write!(f, "]")
        }

        match self {
            TagValue::Ascii(strings) => {
                let joined: Vec<String> = strings.iter().map(|s| format!("{:?}", s)).collect();
                write!(f, "{}", joined.join(" | "))
            }
            TagValue::Byte(v) | TagValue::Undefined(v) => list(f, v),
            TagValue::Short(v) => list(f, v),
            TagValue::Long(v) | TagValue::Ifd(v) => list(f, v),
            TagValue::Rational(v) => {
                let items: Vec<String> = v
                    .iter()
                    .map(|r| format!("{}/{}", r.numerator, r.denominator))
                    .collect();
                list(f, &items)
            }
            TagValue::SRational(v) => {
                let items: Vec<String> = v
                    .iter()
                    .map(|r| format!("{}/{}", r.numerator, r.denominator))
                    .collect();
                list(f, &items)
            }
            TagValue::SByte(v) => list(f, v),
            TagValue::SShort(v) => list(f, v),
            TagValue::SLong(v) => list(f, v),
            TagValue::Float(v) => list(f, v),
            TagValue::Double(v) => list(f, v),
            TagValue::Long8(v) | TagValue::Ifd8(v) => list(f, v),
            TagValue::SLong8(v) => list(f, v),
        }
    }
}

// =============================================================================
// ValueReader
// =============================================================================

/// Resolves IFD entries to their values, fetching out-of-line data from a
/// byte source.
pub struct ValueReader<'a, S: ByteSource> {
    source: &'a mut S,
    header: &'a TiffHeader,
}

impl<'a, S: ByteSource> ValueReader<'a, S> {
    pub fn new(source: &'a mut S, header: &'a TiffHeader) -> Self {
        Self { source, header }
    }

    /// Raw bytes for an entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the file.
    pub fn read_bytes(&mut self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let field_type = entry
            .field_type
            .ok_or_else(|| TiffError::invalid_tag(tag_name(entry.tag_id), "unknown field type"))?;
        let size = field_type
            .byte_len(entry.count)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or_else(|| {
                TiffError::invalid_tag(
                    tag_name(entry.tag_id),
                    format!("count {} overflows", entry.count),
                )
            })?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(&entry.value_offset_bytes[..size]))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            if offset.saturating_add(size as u64) > self.source.size() {
                return Err(TiffError::invalid_tag(
                    tag_name(entry.tag_id),
                    format!(
                        "value of {} bytes at offset {} lies outside the file ({} bytes)",
                        size,
                        offset,
                        self.source.size()
                    ),
                ));
            }
            Ok(self.source.read_exact_at(offset, size)?)
        }
    }

    /// Decode an entry's full value.
    pub fn read_value(&mut self, entry: &IfdEntry) -> Result<TagValue, TiffError> {
        let field_type = entry
            .field_type
            .ok_or_else(|| TiffError::invalid_tag(tag_name(entry.tag_id), "unknown field type"))?;
        let bytes = self.read_bytes(entry)?;
        TagValue::decode(
            entry.tag_id,
            field_type,
            entry.count,
            &bytes,
            self.header.byte_order,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
