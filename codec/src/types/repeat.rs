//! Repetition and conditional constructs.

use crate::{codec, Codec, Construct, Context, Error, Expr, Kind, Stream, Subcon, Value};
use bytes::BytesMut;

fn items<'v>(value: &'v Value, what: &'static str) -> Result<&'v [Value], Error> {
    value.as_list().ok_or(Error::InvalidValue {
        expected: what,
        found: value.kind(),
    })
}

/// A fixed or context-computed number of elements.
#[derive(Clone, Debug)]
pub struct Array {
    count: Expr,
    subcon: Codec,
}

impl Array {
    pub fn new(count: impl Into<Expr>, subcon: impl Construct + 'static) -> Self {
        Self {
            count: count.into(),
            subcon: codec(subcon),
        }
    }
}

impl Construct for Array {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let count = self.count.eval_len(ctx)?;
        let mut out = Vec::with_capacity(count.min(stream.rest().len()));
        for _ in 0..count {
            out.push(self.subcon.parse(stream, ctx)?);
        }
        Ok(Value::List(out))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        let count = self.count.eval_len(ctx)?;
        let elements = items(value, "list")?;
        if elements.len() != count {
            return Err(Error::LengthMismatch(elements.len(), count));
        }
        let built = elements
            .iter()
            .map(|item| self.subcon.build(item, buf, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(built))
    }

    fn kind(&self) -> Kind {
        Kind::Array
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.subcon)]
    }
}

/// Elements preceded by their count.
#[derive(Clone, Debug)]
pub struct PrefixedArray {
    count: Codec,
    subcon: Codec,
}

impl PrefixedArray {
    pub fn new(count: impl Construct + 'static, subcon: impl Construct + 'static) -> Self {
        Self {
            count: codec(count),
            subcon: codec(subcon),
        }
    }
}

impl Construct for PrefixedArray {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let count = self.count.parse(stream, ctx)?.to_int()?;
        let count = usize::try_from(count).map_err(|_| Error::ValueOutOfRange(count, "length"))?;
        let mut out = Vec::with_capacity(count.min(stream.rest().len()));
        for _ in 0..count {
            out.push(self.subcon.parse(stream, ctx)?);
        }
        Ok(Value::List(out))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        let elements = items(value, "list")?;
        self.count.build(&Value::from(elements.len()), buf, ctx)?;
        let built = elements
            .iter()
            .map(|item| self.subcon.build(item, buf, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(built))
    }

    fn kind(&self) -> Kind {
        Kind::PrefixedArray
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.count), Subcon::unnamed(&self.subcon)]
    }
}

/// Present only when the condition evaluates to non-zero.
#[derive(Clone, Debug)]
pub struct If {
    cond: Expr,
    subcon: Codec,
}

impl If {
    pub fn new(cond: impl Into<Expr>, subcon: impl Construct + 'static) -> Self {
        Self {
            cond: cond.into(),
            subcon: codec(subcon),
        }
    }
}

impl Construct for If {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        if self.cond.eval(ctx)? == 0 {
            return Ok(Value::None);
        }
        self.subcon.parse(stream, ctx)
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        if self.cond.eval(ctx)? == 0 {
            return Ok(Value::None);
        }
        self.subcon.build(value, buf, ctx)
    }

    fn flag_build_none(&self) -> bool {
        self.subcon.flag_build_none()
    }

    fn kind(&self) -> Kind {
        Kind::If
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.subcon)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{this, ConstructExt, Int};

    #[test]
    fn test_array() {
        let codec = Array::new(3, Int::u16_be());
        let parsed = codec.parse_exact(&[0, 1, 0, 2, 0, 3]).unwrap();
        assert_eq!(
            parsed,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(
            &codec.build_bytes(&parsed).unwrap()[..],
            &[0, 1, 0, 2, 0, 3]
        );
        assert!(matches!(
            codec.build_bytes(&Value::List(vec![Value::Int(1)])),
            Err(Error::LengthMismatch(1, 3))
        ));
        assert!(matches!(
            codec.build_bytes(&Value::Int(1)),
            Err(Error::InvalidValue { expected: "list", .. })
        ));
    }

    #[test]
    fn test_array_count_from_context() {
        let mut ctx = Context::new();
        ctx.insert("n", Value::Int(2));
        let codec = Array::new(this("n"), Int::u8());
        let mut stream = Stream::new(&[5, 6, 7]);
        assert_eq!(
            codec.parse(&mut stream, &ctx).unwrap(),
            Value::List(vec![Value::Int(5), Value::Int(6)])
        );
    }

    #[test]
    fn test_prefixed_array() {
        let codec = PrefixedArray::new(Int::u8(), Int::u8());
        let value = Value::List(vec![Value::Int(9), Value::Int(8)]);
        let built = codec.build_bytes(&value).unwrap();
        assert_eq!(&built[..], &[2, 9, 8]);
        assert_eq!(codec.parse_exact(&built).unwrap(), value);
        assert!(matches!(codec.parse_bytes(&[3, 1]), Err(Error::EndOfBuffer)));
    }

    #[test]
    fn test_if() {
        let mut ctx = Context::new();
        ctx.insert("present", Value::Bool(false));
        let codec = If::new(this("present"), Int::u8());
        let mut stream = Stream::new(&[1]);
        assert_eq!(codec.parse(&mut stream, &ctx).unwrap(), Value::None);
        assert_eq!(stream.tell(), 0);

        ctx.insert("present", Value::Bool(true));
        assert_eq!(codec.parse(&mut stream, &ctx).unwrap(), Value::Int(1));

        let mut buf = BytesMut::new();
        codec.build(&Value::Int(4), &mut buf, &ctx).unwrap();
        assert_eq!(&buf[..], &[4]);
        assert!(!codec.flag_build_none());
    }
}
