//! Wire layouts for ERD values.
//!
//! A [`FieldFormat`] is either a fixed-width integer or a composite of named
//! sub-fields packed into one byte span. Bits inside a composite are addressed
//! MSB-first: bit 0 is the high bit of the first byte.

use crate::error::{ConfigError, FormatError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Widest composite span, in bytes.
pub const MAX_COMPOSITE_WIDTH: usize = 16;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum Endian {
    #[default]
    Big,
    Little,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Signedness {
    Unsigned,
    Signed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Width {
    One,
    Two,
    Four,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
        }
    }
}

/// Inclusive value range of an integer `bits` wide.
fn int_range(signedness: Signedness, bits: u32) -> (i64, i64) {
    match signedness {
        Signedness::Unsigned => (0, (1i64 << bits) - 1),
        Signedness::Signed => (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1),
    }
}

fn check_range(value: i64, signedness: Signedness, bits: u32) -> Result<u64, FormatError> {
    let (min, max) = int_range(signedness, bits);
    if value < min || value > max {
        return Err(FormatError::OutOfRange { value, min, max });
    }
    // two's complement truncated to `bits`
    Ok((value as u64) & ((1u64 << bits) - 1))
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

fn from_raw(raw: u64, signedness: Signedness, bits: u32) -> i64 {
    match signedness {
        Signedness::Unsigned => raw as i64,
        Signedness::Signed => sign_extend(raw, bits),
    }
}

fn read_bits(data: &[u8], offset: u32, len: u32) -> u64 {
    let mut value = 0u64;
    for pos in offset..offset + len {
        let byte = data[(pos / 8) as usize];
        let bit = (byte >> (7 - pos % 8)) & 1;
        value = (value << 1) | u64::from(bit);
    }
    value
}

fn write_bits(out: &mut [u8], offset: u32, len: u32, raw: u64) {
    for i in 0..len {
        let bit = ((raw >> (len - 1 - i)) & 1) as u8;
        let pos = offset + i;
        out[(pos / 8) as usize] |= bit << (7 - pos % 8);
    }
}

/// Fixed-width integer layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ScalarFormat {
    pub signedness: Signedness,
    pub width: Width,
    pub endian: Endian,
}

impl ScalarFormat {
    pub const UINT8: Self = Self::new(Signedness::Unsigned, Width::One, Endian::Big);
    pub const UINT16: Self = Self::new(Signedness::Unsigned, Width::Two, Endian::Big);
    pub const UINT32: Self = Self::new(Signedness::Unsigned, Width::Four, Endian::Big);
    pub const INT8: Self = Self::new(Signedness::Signed, Width::One, Endian::Big);
    pub const INT16: Self = Self::new(Signedness::Signed, Width::Two, Endian::Big);
    pub const INT32: Self = Self::new(Signedness::Signed, Width::Four, Endian::Big);

    pub const fn new(signedness: Signedness, width: Width, endian: Endian) -> Self {
        Self {
            signedness,
            width,
            endian,
        }
    }

    pub const fn with_endian(self, endian: Endian) -> Self {
        Self { endian, ..self }
    }

    pub fn width_bytes(&self) -> usize {
        self.width.bytes()
    }

    fn bits(&self) -> u32 {
        (self.width.bytes() * 8) as u32
    }

    /// Inclusive `(min, max)` accepted by [`ScalarFormat::encode`].
    pub fn range(&self) -> (i64, i64) {
        int_range(self.signedness, self.bits())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<i64, FormatError> {
        let expected = self.width_bytes();
        if bytes.len() != expected {
            return Err(FormatError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(self.decode_unchecked(bytes))
    }

    pub fn encode(&self, value: i64) -> Result<Vec<u8>, FormatError> {
        let raw = check_range(value, self.signedness, self.bits())?;
        let n = self.width_bytes();
        let mut out: Vec<u8> = (0..n).map(|i| (raw >> (8 * (n - 1 - i))) as u8).collect();
        if self.endian == Endian::Little {
            out.reverse();
        }
        Ok(out)
    }

    fn decode_unchecked(&self, bytes: &[u8]) -> i64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        let raw = match self.endian {
            Endian::Big => bytes.iter().fold(0, fold),
            Endian::Little => bytes.iter().rev().fold(0, fold),
        };
        from_raw(raw, self.signedness, self.bits())
    }
}

impl FromStr for ScalarFormat {
    type Err = ConfigError;

    /// `UInt8`, `UInt16`, `UInt32`, `Int8`, `Int16` or `Int32`; big-endian.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "UInt8" => Ok(Self::UINT8),
            "UInt16" => Ok(Self::UINT16),
            "UInt32" => Ok(Self::UINT32),
            "Int8" => Ok(Self::INT8),
            "Int16" => Ok(Self::INT16),
            "Int32" => Ok(Self::INT32),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ScalarFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.signedness {
            Signedness::Unsigned => "UInt",
            Signedness::Signed => "Int",
        };
        write!(f, "{prefix}{}", self.bits())
    }
}

/// Where a sub-field sits inside its composite's byte span.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Placement {
    /// Byte-aligned integer starting at byte `offset`.
    Bytes { offset: usize, format: ScalarFormat },
    /// `len` bits starting at bit `offset` (MSB-first).
    Bits {
        offset: u32,
        len: u32,
        signedness: Signedness,
    },
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SubField {
    pub name: String,
    pub placement: Placement,
}

impl SubField {
    pub fn bytes(name: impl Into<String>, offset: usize, format: ScalarFormat) -> Self {
        Self {
            name: name.into(),
            placement: Placement::Bytes { offset, format },
        }
    }

    pub fn bits(name: impl Into<String>, offset: u32, len: u32, signedness: Signedness) -> Self {
        Self {
            name: name.into(),
            placement: Placement::Bits {
                offset,
                len,
                signedness,
            },
        }
    }

    /// `(first bit, bit count)` within the parent span, `None` if the offset
    /// does not fit in a bit index.
    fn bit_span(&self) -> Option<(usize, usize)> {
        match self.placement {
            Placement::Bytes { offset, format } => {
                Some((offset.checked_mul(8)?, format.width_bytes() * 8))
            }
            Placement::Bits { offset, len, .. } => Some((offset as usize, len as usize)),
        }
    }

    fn decode(&self, span: &[u8]) -> i64 {
        match self.placement {
            Placement::Bytes { offset, format } => {
                format.decode_unchecked(&span[offset..offset + format.width_bytes()])
            }
            Placement::Bits {
                offset,
                len,
                signedness,
            } => from_raw(read_bits(span, offset, len), signedness, len),
        }
    }

    fn encode_into(&self, value: i64, out: &mut [u8]) -> Result<(), FormatError> {
        match self.placement {
            Placement::Bytes { offset, format } => {
                let bytes = format.encode(value)?;
                out[offset..offset + bytes.len()].copy_from_slice(&bytes);
            }
            Placement::Bits {
                offset,
                len,
                signedness,
            } => {
                let raw = check_range(value, signedness, len)?;
                write_bits(out, offset, len, raw);
            }
        }
        Ok(())
    }
}

/// Named sub-fields packed into one byte span.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CompositeFormat {
    width: usize,
    fields: Vec<SubField>,
}

impl CompositeFormat {
    /// Validate and build. Sub-fields must lie inside `width` bytes, must not
    /// overlap, and must have unique non-empty names.
    pub fn new(width: usize, fields: Vec<SubField>) -> Result<Self, ConfigError> {
        if width == 0 || width > MAX_COMPOSITE_WIDTH {
            return Err(ConfigError::InvalidWidth(width));
        }
        if fields.is_empty() {
            return Err(ConfigError::EmptyComposite);
        }
        let mut names = HashSet::new();
        let mut used = 0u128;
        for f in &fields {
            if f.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !names.insert(f.name.as_str()) {
                return Err(ConfigError::DuplicateSubField(f.name.clone()));
            }
            if let Placement::Bits { len, .. } = f.placement {
                if len == 0 || len > 32 {
                    return Err(ConfigError::InvalidBitLength(len));
                }
            }
            let (start, len) = f
                .bit_span()
                .filter(|&(start, len)| {
                    start.checked_add(len).is_some_and(|end| end <= width * 8)
                })
                .ok_or_else(|| ConfigError::SubFieldOutOfSpan(f.name.clone()))?;
            let mask = ((1u128 << len) - 1) << start;
            if used & mask != 0 {
                return Err(ConfigError::SubFieldOverlap(f.name.clone()));
            }
            used |= mask;
        }
        Ok(Self { width, fields })
    }

    /// Lay sub-fields out back to back, see [`CompositeBuilder`].
    pub fn builder() -> CompositeBuilder {
        CompositeBuilder::default()
    }

    pub fn width_bytes(&self) -> usize {
        self.width
    }

    pub fn fields(&self) -> &[SubField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SubField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<BTreeMap<String, i64>, FormatError> {
        if bytes.len() != self.width {
            return Err(FormatError::LengthMismatch {
                expected: self.width,
                actual: bytes.len(),
            });
        }
        Ok(self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.decode(bytes)))
            .collect())
    }

    /// Missing sub-fields encode as zero.
    pub fn encode(&self, values: &BTreeMap<String, i64>) -> Result<Vec<u8>, FormatError> {
        if let Some(unknown) = values.keys().find(|k| self.field(k).is_none()) {
            return Err(FormatError::UnknownSubField(unknown.clone()));
        }
        let mut out = vec![0u8; self.width];
        for f in &self.fields {
            let value = values.get(&f.name).copied().unwrap_or(0);
            f.encode_into(value, &mut out)?;
        }
        Ok(out)
    }
}

/// Sequential layout of a composite. Byte-aligned members must start on a byte
/// boundary; the span is rounded up to whole bytes.
#[derive(Debug, Default)]
pub struct CompositeBuilder {
    cursor: u32,
    fields: Vec<SubField>,
    error: Option<ConfigError>,
}

impl CompositeBuilder {
    pub fn field(mut self, name: impl Into<String>, format: ScalarFormat) -> Self {
        let name = name.into();
        if self.cursor % 8 != 0 {
            self.error.get_or_insert(ConfigError::Unaligned(name));
            return self;
        }
        self.fields
            .push(SubField::bytes(name, (self.cursor / 8) as usize, format));
        self.advance((format.width_bytes() * 8) as u32)
    }

    pub fn bits(self, name: impl Into<String>, len: u32) -> Self {
        self.push_bits(name.into(), len, Signedness::Unsigned)
    }

    pub fn signed_bits(self, name: impl Into<String>, len: u32) -> Self {
        self.push_bits(name.into(), len, Signedness::Signed)
    }

    /// Skip `len` reserved bits.
    pub fn pad(self, len: u32) -> Self {
        self.advance(len)
    }

    fn push_bits(mut self, name: String, len: u32, signedness: Signedness) -> Self {
        self.fields
            .push(SubField::bits(name, self.cursor, len, signedness));
        self.advance(len)
    }

    fn advance(mut self, len: u32) -> Self {
        match self.cursor.checked_add(len) {
            Some(cursor) => self.cursor = cursor,
            None => {
                self.error.get_or_insert(ConfigError::InvalidBitLength(len));
            }
        }
        self
    }

    pub fn build(self) -> Result<CompositeFormat, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let width = self.cursor.div_ceil(8) as usize;
        CompositeFormat::new(width, self.fields)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum FieldFormat {
    Scalar(ScalarFormat),
    Composite(CompositeFormat),
}

impl FieldFormat {
    pub fn width_bytes(&self) -> usize {
        match self {
            FieldFormat::Scalar(s) => s.width_bytes(),
            FieldFormat::Composite(c) => c.width_bytes(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<FieldValue, FormatError> {
        match self {
            FieldFormat::Scalar(s) => s.decode(bytes).map(FieldValue::Int),
            FieldFormat::Composite(c) => c.decode(bytes).map(FieldValue::Composite),
        }
    }

    pub fn encode(&self, value: &FieldValue) -> Result<Vec<u8>, FormatError> {
        match (self, value) {
            (FieldFormat::Scalar(s), FieldValue::Int(v)) => s.encode(*v),
            (FieldFormat::Composite(c), FieldValue::Composite(m)) => c.encode(m),
            (FieldFormat::Scalar(_), _) => Err(FormatError::ExpectedScalar),
            (FieldFormat::Composite(_), _) => Err(FormatError::ExpectedComposite),
        }
    }
}

impl From<ScalarFormat> for FieldFormat {
    fn from(s: ScalarFormat) -> Self {
        FieldFormat::Scalar(s)
    }
}

impl From<CompositeFormat> for FieldFormat {
    fn from(c: CompositeFormat) -> Self {
        FieldFormat::Composite(c)
    }
}

/// A decoded ERD value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Composite(BTreeMap<String, i64>),
}

impl FieldValue {
    pub fn composite<K: Into<String>>(entries: impl IntoIterator<Item = (K, i64)>) -> Self {
        FieldValue::Composite(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Composite(_) => None,
        }
    }

    pub fn get(&self, sub: &str) -> Option<i64> {
        match self {
            FieldValue::Composite(m) => m.get(sub).copied(),
            FieldValue::Int(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Composite(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
