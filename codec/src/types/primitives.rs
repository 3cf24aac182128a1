//! Numeric leaf constructs.
//!
//! # Byte-oriented vs bit-oriented
//!
//! [Int], [Float] and [Flag] consume whole bytes and can appear anywhere. [BitsInteger] consumes
//! one stream unit per bit and therefore only makes sense under a
//! [Bitwise](crate::types::structs::Bitwise) node, where every unit of the stream is a single bit.
//!
//! Integers are carried as [Value::Int] (`i128`), which covers every width supported here. Build
//! rejects values that do not fit the declared width instead of truncating them.

use crate::{
    util::{at_least, sign_extend},
    Construct, Context, Error, Kind, Stream, Value,
};
use bytes::{Buf, BufMut, BytesMut};

/// Byte order of multi-byte numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Fixed-width integer of 1, 2, 4 or 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Int {
    width: usize,
    signed: bool,
    endian: Endian,
}

macro_rules! impl_int_constructors {
    ($($name:ident => ($width:expr, $signed:expr, $endian:ident)),* $(,)?) => {
        impl Int {
            $(
                pub const fn $name() -> Self {
                    Self {
                        width: $width,
                        signed: $signed,
                        endian: Endian::$endian,
                    }
                }
            )*
        }
    };
}

impl_int_constructors!(
    u8 => (1, false, Big),
    i8 => (1, true, Big),
    u16_be => (2, false, Big),
    u16_le => (2, false, Little),
    i16_be => (2, true, Big),
    i16_le => (2, true, Little),
    u32_be => (4, false, Big),
    u32_le => (4, false, Little),
    i32_be => (4, true, Big),
    i32_le => (4, true, Little),
    u64_be => (8, false, Big),
    u64_le => (8, false, Little),
    i64_be => (8, true, Big),
    i64_le => (8, true, Little),
);

impl Int {
    /// Alias for [Int::u8].
    pub const fn byte() -> Self {
        Self::u8()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn bounds(&self) -> (i128, i128) {
        let bits = self.width * 8;
        if self.signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

impl Construct for Int {
    fn parse(&self, stream: &mut Stream<'_>, _: &Context<'_>) -> Result<Value, Error> {
        at_least(stream, self.width)?;
        let v = match (self.signed, self.endian) {
            (false, Endian::Big) => i128::from(stream.get_uint(self.width)),
            (false, Endian::Little) => i128::from(stream.get_uint_le(self.width)),
            (true, Endian::Big) => i128::from(stream.get_int(self.width)),
            (true, Endian::Little) => i128::from(stream.get_int_le(self.width)),
        };
        Ok(Value::Int(v))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, _: &Context<'_>) -> Result<Value, Error> {
        let v = value.to_int()?;
        let (min, max) = self.bounds();
        if v < min || v > max {
            return Err(Error::ValueOutOfRange(v, "int"));
        }
        match (self.signed, self.endian) {
            (false, Endian::Big) => buf.put_uint(v as u64, self.width),
            (false, Endian::Little) => buf.put_uint_le(v as u64, self.width),
            (true, Endian::Big) => buf.put_int(v as i64, self.width),
            (true, Endian::Little) => buf.put_int_le(v as i64, self.width),
        }
        Ok(Value::Int(v))
    }

    fn kind(&self) -> Kind {
        Kind::Int
    }
}

/// IEEE 754 float of 4 or 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Float {
    width: usize,
    endian: Endian,
}

impl Float {
    pub const fn f32_be() -> Self {
        Self {
            width: 4,
            endian: Endian::Big,
        }
    }

    pub const fn f32_le() -> Self {
        Self {
            width: 4,
            endian: Endian::Little,
        }
    }

    pub const fn f64_be() -> Self {
        Self {
            width: 8,
            endian: Endian::Big,
        }
    }

    pub const fn f64_le() -> Self {
        Self {
            width: 8,
            endian: Endian::Little,
        }
    }
}

impl Construct for Float {
    fn parse(&self, stream: &mut Stream<'_>, _: &Context<'_>) -> Result<Value, Error> {
        at_least(stream, self.width)?;
        let v = match (self.width, self.endian) {
            (4, Endian::Big) => f64::from(stream.get_f32()),
            (4, Endian::Little) => f64::from(stream.get_f32_le()),
            (_, Endian::Big) => stream.get_f64(),
            (_, Endian::Little) => stream.get_f64_le(),
        };
        Ok(Value::Float(v))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, _: &Context<'_>) -> Result<Value, Error> {
        let v = match value {
            Value::Float(f) => *f,
            Value::Int(i) => *i as f64,
            other => {
                return Err(Error::InvalidValue {
                    expected: "float",
                    found: other.kind(),
                })
            }
        };
        match (self.width, self.endian) {
            (4, Endian::Big) => buf.put_f32(v as f32),
            (4, Endian::Little) => buf.put_f32_le(v as f32),
            (_, Endian::Big) => buf.put_f64(v),
            (_, Endian::Little) => buf.put_f64_le(v),
        }
        Ok(Value::Float(v))
    }

    fn kind(&self) -> Kind {
        Kind::Float
    }
}

/// One-byte boolean: zero is false, anything else is true. Builds as `0` or `1`, and only
/// accepts integers that are already `0` or `1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flag;

impl Construct for Flag {
    fn parse(&self, stream: &mut Stream<'_>, _: &Context<'_>) -> Result<Value, Error> {
        at_least(stream, 1)?;
        Ok(Value::Bool(stream.get_u8() != 0))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, _: &Context<'_>) -> Result<Value, Error> {
        let v = match value {
            Value::Bool(b) => *b,
            other => match other.to_int()? {
                0 => false,
                1 => true,
                _ => return Err(Error::InvalidBool),
            },
        };
        buf.put_u8(u8::from(v));
        Ok(Value::Bool(v))
    }

    fn kind(&self) -> Kind {
        Kind::Flag
    }
}

/// Integer spread over `bits` units of a bit stream, most significant bit first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitsInteger {
    bits: usize,
    signed: bool,
}

impl BitsInteger {
    /// Panics if `bits` is zero or larger than 64.
    pub const fn new(bits: usize, signed: bool) -> Self {
        assert!(bits > 0 && bits <= 64, "bit width must be within 1..=64");
        Self { bits, signed }
    }

    pub const fn bit() -> Self {
        Self::new(1, false)
    }

    pub const fn nibble() -> Self {
        Self::new(4, false)
    }

    pub const fn octet() -> Self {
        Self::new(8, false)
    }

    pub fn bits(&self) -> usize {
        self.bits
    }
}

impl Construct for BitsInteger {
    fn parse(&self, stream: &mut Stream<'_>, _: &Context<'_>) -> Result<Value, Error> {
        let units = stream.read_units(self.bits)?;
        let mut raw = 0u128;
        for &unit in units {
            if unit > 1 {
                return Err(Error::InvalidBits(unit));
            }
            raw = (raw << 1) | u128::from(unit);
        }
        let v = if self.signed {
            sign_extend(raw, self.bits)
        } else {
            raw as i128
        };
        Ok(Value::Int(v))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, _: &Context<'_>) -> Result<Value, Error> {
        let v = value.to_int()?;
        let (min, max) = if self.signed {
            (-(1i128 << (self.bits - 1)), (1i128 << (self.bits - 1)) - 1)
        } else {
            (0, (1i128 << self.bits) - 1)
        };
        if v < min || v > max {
            return Err(Error::ValueOutOfRange(v, "bits"));
        }
        let raw = v as u128;
        for shift in (0..self.bits).rev() {
            buf.put_u8(((raw >> shift) & 1) as u8);
        }
        Ok(Value::Int(v))
    }

    fn kind(&self) -> Kind {
        Kind::Bits
    }
}
