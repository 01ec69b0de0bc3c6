//! Textual descriptions of the fields in a bitstream.
//!
//! A schema entry has the form `KIND[:BITS]`, a field to pack
//! additionally carries a value as in `KIND[:BITS]=VALUE`.

use std::{fmt, str::FromStr};

use bitpack_buf::{BitBuffer, Error};
use serde::Serialize;

/// The type of value stored in a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Bool,
    U8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Str,
    Bytes,
}

impl Kind {
    const ALL: [Kind; 12] = [
        Self::Bool,
        Self::U8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
        Self::F32,
        Self::F64,
        Self::Str,
        Self::Bytes,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "str",
            Self::Bytes => "bytes",
        }
    }

    /// Gets the natural bit width of fixed-size kinds.
    pub fn width(self) -> Option<u32> {
        match self {
            Self::Bool => Some(1),
            Self::U8 => Some(u8::BITS),
            Self::U16 | Self::I16 => Some(u16::BITS),
            Self::U32 | Self::I32 | Self::F32 => Some(u32::BITS),
            Self::U64 | Self::I64 | Self::F64 => Some(u64::BITS),
            Self::Str | Self::Bytes => None,
        }
    }

    fn is_integer(self) -> bool {
        matches!(
            self,
            Self::U8 | Self::U16 | Self::I16 | Self::U32 | Self::I32 | Self::U64 | Self::I64
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| eyre::eyre!("unknown field kind '{s}'"))
    }
}

/// A decoded or to be encoded field value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(#[serde(serialize_with = "hex::serde::serialize")] Vec<u8>),
}

/// The kind of a field along with the number of bits it occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// The type of the field.
    pub kind: Kind,
    /// The bit width for fixed-size kinds.
    pub bits: Option<u32>,
}

impl FieldSpec {
    /// Reads a value of this field from the buffer.
    pub fn read(&self, buf: &mut BitBuffer) -> Result<Value, Error> {
        let bits = self.bits.unwrap_or(0);
        let value = match self.kind {
            Kind::Bool => Value::Bool(buf.try_read_bool()?),
            Kind::U8 => Value::Unsigned(buf.try_read_u8_part(bits)? as u64),
            Kind::U16 => Value::Unsigned(buf.try_read_u16_part(bits)? as u64),
            Kind::U32 => Value::Unsigned(buf.try_read_u32_part(bits)? as u64),
            Kind::U64 => Value::Unsigned(buf.try_read_u64_part(bits)?),
            Kind::I16 => Value::Signed(buf.try_read_i16_part(bits)? as i64),
            Kind::I32 => Value::Signed(buf.try_read_i32_part(bits)? as i64),
            Kind::I64 => Value::Signed(buf.try_read_i64_part(bits)?),
            Kind::F32 => Value::F32(buf.try_read_f32()?),
            Kind::F64 => Value::F64(buf.try_read_f64()?),
            Kind::Str => Value::Str(buf.try_read_string()?),
            Kind::Bytes => Value::Bytes(buf.try_read_bytes()?),
        };

        Ok(value)
    }

    fn parse_value(&self, raw: &str) -> eyre::Result<Value> {
        let kind = self.kind;
        let value = match kind {
            Kind::Bool => match raw {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => eyre::bail!("invalid bool value '{raw}'"),
            },
            Kind::U8 => Value::Unsigned(parse_num::<u8>(kind, raw)? as u64),
            Kind::U16 => Value::Unsigned(parse_num::<u16>(kind, raw)? as u64),
            Kind::U32 => Value::Unsigned(parse_num::<u32>(kind, raw)? as u64),
            Kind::U64 => Value::Unsigned(parse_num::<u64>(kind, raw)?),
            Kind::I16 => Value::Signed(parse_num::<i16>(kind, raw)? as i64),
            Kind::I32 => Value::Signed(parse_num::<i32>(kind, raw)? as i64),
            Kind::I64 => Value::Signed(parse_num::<i64>(kind, raw)?),
            Kind::F32 => Value::F32(parse_num::<f32>(kind, raw)?),
            Kind::F64 => Value::F64(parse_num::<f64>(kind, raw)?),
            Kind::Str => Value::Str(raw.to_owned()),
            Kind::Bytes => Value::Bytes(
                hex::decode(raw).map_err(|e| eyre::eyre!("invalid hex bytes '{raw}': {e}"))?,
            ),
        };

        Ok(value)
    }
}

fn parse_num<T>(kind: Kind, raw: &str) -> eyre::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse()
        .map_err(|e| eyre::eyre!("invalid {kind} value '{raw}': {e}"))
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bits {
            Some(bits) if self.kind.is_integer() && Some(bits) != self.kind.width() => {
                write!(f, "{}:{bits}", self.kind)
            }
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl FromStr for FieldSpec {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, bits) = match s.split_once(':') {
            Some((kind, bits)) => (kind.parse::<Kind>()?, Some(bits)),
            None => (s.parse::<Kind>()?, None),
        };

        let bits = match (bits, kind.width()) {
            (Some(bits), Some(width)) if kind.is_integer() => {
                let bits: u32 = bits
                    .parse()
                    .map_err(|e| eyre::eyre!("invalid bit width '{bits}': {e}"))?;
                if !(1..=width).contains(&bits) {
                    eyre::bail!("bit width for {kind} must be between 1 and {width}, got {bits}");
                }

                Some(bits)
            }
            (Some(_), _) => eyre::bail!("{kind} fields do not support a custom bit width"),
            (None, width) => width,
        };

        Ok(Self { kind, bits })
    }
}

/// A field along with the value to pack into it.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    spec: FieldSpec,
    value: Value,
}

impl Field {
    /// Gets the description of the field.
    pub fn spec(&self) -> FieldSpec {
        self.spec
    }

    /// Gets the value of the field.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Gets the number of bits the field occupies when written.
    pub fn bit_len(&self) -> usize {
        match &self.value {
            Value::Str(v) => 32 + (v.len() << 3),
            Value::Bytes(v) => 32 + (v.len() << 3),
            _ => self.spec.bits.unwrap_or(0) as usize,
        }
    }

    /// Checks if the value is representable in the field's bit
    /// width without truncation.
    pub fn fits(&self) -> bool {
        match (self.spec.bits, &self.value) {
            (Some(bits), &Value::Unsigned(v)) if bits < u64::BITS => v >> bits == 0,
            (Some(bits), &Value::Signed(v)) if bits < u64::BITS => {
                let shift = u64::BITS - bits;
                (v << shift) >> shift == v
            }
            _ => true,
        }
    }

    /// Writes the value of this field to the buffer.
    pub fn write(&self, buf: &mut BitBuffer) -> Result<(), Error> {
        let bits = self.spec.bits.unwrap_or(0);
        match self.value {
            Value::Bool(v) => buf.try_write_bool(v),
            Value::Unsigned(v) => match self.spec.kind {
                Kind::U8 => buf.try_write_u8_part(v as u8, bits),
                Kind::U16 => buf.try_write_u16_part(v as u16, bits),
                Kind::U32 => buf.try_write_u32_part(v as u32, bits),
                _ => buf.try_write_u64_part(v, bits),
            },
            Value::Signed(v) => match self.spec.kind {
                Kind::I16 => buf.try_write_i16_part(v as i16, bits),
                Kind::I32 => buf.try_write_i32_part(v as i32, bits),
                _ => buf.try_write_i64_part(v, bits),
            },
            Value::F32(v) => buf.try_write_f32(v),
            Value::F64(v) => buf.try_write_f64(v),
            Value::Str(ref v) => buf.try_write_str(v),
            Value::Bytes(ref v) => buf.try_write_bytes(v),
        }
    }
}

impl FromStr for Field {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (spec, raw) = s
            .split_once('=')
            .ok_or_else(|| eyre::eyre!("field '{s}' lacks a value; expected KIND[:BITS]=VALUE"))?;

        let spec: FieldSpec = spec.parse()?;
        let value = spec.parse_value(raw)?;

        Ok(Self { spec, value })
    }
}
