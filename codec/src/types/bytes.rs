//! Byte-string leaf constructs.

use crate::{Construct, Context, Error, Expr, Kind, Preset, Stream, Value};
use bytes::{BufMut, Bytes, BytesMut};

fn to_bytes(value: &Value) -> Result<Bytes, Error> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::Str(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
        Value::List(items) => {
            let mut out = BytesMut::with_capacity(items.len());
            for item in items {
                let v = item.to_int()?;
                let byte = u8::try_from(v).map_err(|_| Error::ValueOutOfRange(v, "byte"))?;
                out.put_u8(byte);
            }
            Ok(out.freeze())
        }
        other => Err(Error::InvalidValue {
            expected: "bytes",
            found: other.kind(),
        }),
    }
}

/// A byte string whose length is given by an expression.
#[derive(Clone, Debug)]
pub struct RawBytes {
    length: Expr,
}

impl RawBytes {
    pub fn new(length: impl Into<Expr>) -> Self {
        Self {
            length: length.into(),
        }
    }
}

impl Construct for RawBytes {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let len = self.length.eval_len(ctx)?;
        Ok(Value::Bytes(Bytes::copy_from_slice(stream.read_units(len)?)))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        let len = self.length.eval_len(ctx)?;
        let data = to_bytes(value)?;
        if data.len() != len {
            return Err(Error::LengthMismatch(data.len(), len));
        }
        buf.put_slice(&data);
        Ok(Value::Bytes(data))
    }

    fn kind(&self) -> Kind {
        Kind::Bytes
    }
}

/// All remaining input.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyBytes;

impl Construct for GreedyBytes {
    fn parse(&self, stream: &mut Stream<'_>, _: &Context<'_>) -> Result<Value, Error> {
        let rest = stream.rest();
        let out = Bytes::copy_from_slice(stream.read_units(rest.len())?);
        Ok(Value::Bytes(out))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, _: &Context<'_>) -> Result<Value, Error> {
        let data = to_bytes(value)?;
        buf.put_slice(&data);
        Ok(Value::Bytes(data))
    }

    fn kind(&self) -> Kind {
        Kind::GreedyBytes
    }
}

/// Skips `length` units on parse and writes zeros on build.
#[derive(Clone, Copy, Debug)]
pub struct Padding {
    length: usize,
}

impl Padding {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Construct for Padding {
    fn parse(&self, stream: &mut Stream<'_>, _: &Context<'_>) -> Result<Value, Error> {
        stream.read_units(self.length)?;
        Ok(Value::None)
    }

    fn build(&self, _: &Value, buf: &mut BytesMut, _: &Context<'_>) -> Result<Value, Error> {
        buf.put_bytes(0, self.length);
        Ok(Value::None)
    }

    fn flag_build_none(&self) -> bool {
        true
    }

    fn kind(&self) -> Kind {
        Kind::Padding
    }
}

/// A fixed value: parse verifies it, build writes it regardless of input.
#[derive(Clone, Debug)]
pub struct Const {
    value: Value,
    subcon: crate::Codec,
}

impl Const {
    pub fn new(value: impl Into<Value>, subcon: impl Construct + 'static) -> Self {
        Self {
            value: value.into(),
            subcon: crate::codec(subcon),
        }
    }

    /// A constant byte string (for example a file signature).
    pub fn bytes(signature: &[u8]) -> Self {
        Self::new(signature, RawBytes::new(signature.len()))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Construct for Const {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let parsed = self.subcon.parse(stream, ctx)?;
        if parsed != self.value {
            return Err(Error::ConstMismatch {
                expected: format!("{:?}", self.value),
                found: format!("{parsed:?}"),
            });
        }
        Ok(parsed)
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        if !value.is_none() && *value != self.value {
            return Err(Error::ConstMismatch {
                expected: format!("{:?}", self.value),
                found: format!("{value:?}"),
            });
        }
        self.subcon.build(&self.value, buf, ctx)
    }

    fn flag_build_none(&self) -> bool {
        true
    }

    fn preset(&self) -> Option<Preset> {
        Some(Preset::Const(self.value.clone()))
    }

    fn kind(&self) -> Kind {
        Kind::Const
    }

    fn subcons(&self) -> Vec<crate::Subcon<'_>> {
        vec![crate::Subcon::unnamed(&self.subcon)]
    }
}
