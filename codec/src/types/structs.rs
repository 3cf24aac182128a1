//! Struct-like composites: named fields parsed in order, aligned, overlaid, or bit-addressed.

use crate::{
    codec,
    util::{bits_to_bytes, bytes_to_bits},
    Codec, Construct, Container, Context, Error, Kind, Stream, Subcon, Value,
};
use bytes::{BufMut, BytesMut};

type Fields = Vec<(String, Codec)>;

fn as_container(value: &Value) -> Result<Container, Error> {
    match value {
        Value::None => Ok(Container::new()),
        Value::Map(map) => Ok(map.clone()),
        other => Err(Error::InvalidValue {
            expected: "map",
            found: other.kind(),
        }),
    }
}

fn padding(size: usize, modulus: usize) -> usize {
    (modulus - size % modulus) % modulus
}

fn parse_fields(
    fields: &Fields,
    modulus: Option<usize>,
    stream: &mut Stream<'_>,
    ctx: &Context<'_>,
) -> Result<Value, Error> {
    let mut scope = Context::child(ctx);
    let mut out = Container::with_capacity(fields.len());
    for (name, subcon) in fields {
        let start = stream.tell();
        let value = subcon.parse(stream, &scope)?;
        if let Some(modulus) = modulus {
            stream.read_units(padding(stream.tell() - start, modulus))?;
        }
        scope.insert(name.as_str(), value.clone());
        out.insert(name.as_str(), value);
    }
    Ok(Value::Map(out))
}

fn build_fields(
    fields: &Fields,
    modulus: Option<usize>,
    value: &Value,
    buf: &mut BytesMut,
    ctx: &Context<'_>,
) -> Result<Value, Error> {
    let input = as_container(value)?;
    let mut scope = Context::child(ctx);
    scope.extend(&input);
    let mut out = Container::with_capacity(fields.len());
    for (name, subcon) in fields {
        let item = match input.get(name) {
            Some(item) => item.clone(),
            None if subcon.flag_build_none() => Value::None,
            None => return Err(Error::MissingValue(name.clone())),
        };
        let start = buf.len();
        let built = subcon.build(&item, buf, &scope)?;
        if let Some(modulus) = modulus {
            buf.put_bytes(0, padding(buf.len() - start, modulus));
        }
        scope.insert(name.as_str(), built.clone());
        out.insert(name.as_str(), built);
    }
    Ok(Value::Map(out))
}

fn named(fields: &Fields) -> Vec<Subcon<'_>> {
    fields
        .iter()
        .map(|(name, subcon)| Subcon::named(name, subcon))
        .collect()
}

/// Named fields parsed and built in order.
///
/// Each field sees the fields before it through the context. Building from [Value::None] is the
/// same as building from an empty map, so a struct whose fields all have defaults needs no input.
#[derive(Clone, Debug, Default)]
pub struct Struct {
    fields: Fields,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, subcon: impl Construct + 'static) -> Self {
        self.fields.push((name.into(), codec(subcon)));
        self
    }

    /// Appends an already shared codec.
    pub fn push(&mut self, name: impl Into<String>, subcon: Codec) {
        self.fields.push((name.into(), subcon));
    }
}

impl Construct for Struct {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        parse_fields(&self.fields, None, stream, ctx)
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        build_fields(&self.fields, None, value, buf, ctx)
    }

    fn kind(&self) -> Kind {
        Kind::Struct
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        named(&self.fields)
    }
}

/// Like [Struct], but every field is padded to a multiple of `modulus` units.
#[derive(Clone, Debug)]
pub struct AlignedStruct {
    modulus: usize,
    fields: Fields,
}

impl AlignedStruct {
    /// # Panics
    ///
    /// Panics if `modulus` is zero.
    pub fn new(modulus: usize) -> Self {
        assert!(modulus > 0, "alignment modulus must be positive");
        Self {
            modulus,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, subcon: impl Construct + 'static) -> Self {
        self.fields.push((name.into(), codec(subcon)));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, subcon: Codec) {
        self.fields.push((name.into(), subcon));
    }

    pub fn modulus(&self) -> usize {
        self.modulus
    }
}

impl Construct for AlignedStruct {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        parse_fields(&self.fields, Some(self.modulus), stream, ctx)
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        build_fields(&self.fields, Some(self.modulus), value, buf, ctx)
    }

    fn kind(&self) -> Kind {
        Kind::AlignedStruct
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        named(&self.fields)
    }
}

/// Overlaid alternatives, all parsed from the same origin.
///
/// After parsing, the stream is left at the end of the `parse_from` alternative when one is set
/// and at the origin otherwise. Building writes only the first alternative present in the input
/// (or the first one that can build from nothing).
#[derive(Clone, Debug, Default)]
pub struct Union {
    parse_from: Option<String>,
    fields: Fields,
}

impl Union {
    pub fn new(parse_from: Option<String>) -> Self {
        Self {
            parse_from,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, subcon: impl Construct + 'static) -> Self {
        self.fields.push((name.into(), codec(subcon)));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, subcon: Codec) {
        self.fields.push((name.into(), subcon));
    }

    pub fn parse_from(&self) -> Option<&str> {
        self.parse_from.as_deref()
    }
}

impl Construct for Union {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let origin = stream.tell();
        let mut end = origin;
        let mut scope = Context::child(ctx);
        let mut out = Container::with_capacity(self.fields.len());
        for (name, subcon) in &self.fields {
            stream.seek(origin)?;
            let value = subcon.parse(stream, &scope)?;
            if self.parse_from.as_deref() == Some(name.as_str()) {
                end = stream.tell();
            }
            scope.insert(name.as_str(), value.clone());
            out.insert(name.as_str(), value);
        }
        stream.seek(end)?;
        Ok(Value::Map(out))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        let input = as_container(value)?;
        let mut scope = Context::child(ctx);
        scope.extend(&input);
        for (name, subcon) in &self.fields {
            let item = match input.get(name) {
                Some(item) => item.clone(),
                None if subcon.flag_build_none() => Value::None,
                None => continue,
            };
            let built = subcon.build(&item, buf, &scope)?;
            let mut out = Container::new();
            out.insert(name.as_str(), built);
            return Ok(Value::Map(out));
        }
        Err(Error::NoUnionAlternative)
    }

    fn kind(&self) -> Kind {
        Kind::Union
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        named(&self.fields)
    }
}

/// Bytes expanded to bits for the first parse attempt of a [Bitwise] node.
const BITWISE_WINDOW: usize = 16;

/// Runs its subconstruct over a bit stream.
///
/// Parsing consumes `ceil(bits / 8)` bytes; building requires a whole number of bytes. Only a
/// window of the input is expanded to bits, doubled until the subconstruct no longer runs into
/// its end, so repeated bitwise elements cost time proportional to what they read.
#[derive(Clone, Debug)]
pub struct Bitwise {
    subcon: Codec,
}

impl Bitwise {
    pub fn new(subcon: impl Construct + 'static) -> Self {
        Self {
            subcon: codec(subcon),
        }
    }
}

impl Construct for Bitwise {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let rest = stream.rest();
        let mut window = rest.len().min(BITWISE_WINDOW);
        loop {
            let bits = bytes_to_bits(&rest[..window]);
            let mut inner = Stream::new(&bits);
            let result = self.subcon.parse(&mut inner, ctx);

            // A parse that failed short or touched the end of the window may have needed more.
            let starved =
                inner.reach() == bits.len() || matches!(result, Err(Error::EndOfBuffer));
            if starved && window < rest.len() {
                window = window.saturating_mul(2).min(rest.len());
                continue;
            }
            let value = result?;
            stream.read_units(inner.tell().div_ceil(8))?;
            return Ok(value);
        }
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        let mut bits = BytesMut::new();
        let built = self.subcon.build(value, &mut bits, ctx)?;
        if bits.len() % 8 != 0 {
            return Err(Error::InvalidData(
                "bitwise".to_string(),
                format!("{} bits is not a whole number of bytes", bits.len()),
            ));
        }
        buf.put_slice(&bits_to_bytes(&bits));
        Ok(built)
    }

    fn flag_build_none(&self) -> bool {
        self.subcon.flag_build_none()
    }

    fn kind(&self) -> Kind {
        Kind::Bitwise
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.subcon)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{shape, this, BitsInteger, ConstructExt, Const, Defaulted, Int, RawBytes};

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(entries.iter().cloned().collect())
    }

    #[test]
    fn test_struct() {
        let codec = Struct::new()
            .field("len", Int::u8())
            .field("data", RawBytes::new(this("len")));
        let parsed = codec.parse_exact(&[2, b'h', b'i']).unwrap();
        assert_eq!(
            parsed,
            map(&[("len", Value::Int(2)), ("data", Value::from("hi".as_bytes()))])
        );
        assert_eq!(&codec.build_bytes(&parsed).unwrap()[..], &[2, b'h', b'i']);
        assert!(matches!(
            codec.build_bytes(&map(&[("len", Value::Int(2))])),
            Err(Error::MissingValue(name)) if name == "data"
        ));
    }

    #[test]
    fn test_struct_build_none() {
        let codec = Struct::new()
            .field("magic", Const::bytes(b"MZ"))
            .field("version", Defaulted::new(Int::u8(), 1u8));
        assert_eq!(&codec.build_bytes(&Value::None).unwrap()[..], b"MZ\x01");
        assert!(matches!(
            codec.build_bytes(&Value::Int(3)),
            Err(Error::InvalidValue { expected: "map", .. })
        ));
    }

    #[test]
    fn test_struct_nested_context() {
        let inner = Struct::new().field("data", RawBytes::new(this("_.len")));
        let codec = Struct::new().field("len", Int::u8()).field("inner", inner);
        let parsed = codec.parse_exact(&[1, 7]).unwrap();
        let inner = parsed.as_map().unwrap().get("inner").unwrap();
        assert_eq!(
            inner.as_map().unwrap().get("data"),
            Some(&Value::from(&[7u8][..]))
        );
    }

    #[test]
    fn test_aligned_struct() {
        let codec = AlignedStruct::new(4)
            .field("a", Int::u8())
            .field("b", Int::u16_be());
        let value = map(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let built = codec.build_bytes(&value).unwrap();
        assert_eq!(&built[..], &[1, 0, 0, 0, 0, 2, 0, 0]);
        assert_eq!(codec.parse_exact(&built).unwrap(), value);
    }

    #[test]
    fn test_union() {
        let codec = Union::new(None)
            .field("word", Int::u16_be())
            .field("bytes", RawBytes::new(2));
        let mut stream = Stream::new(&[1, 2]);
        let parsed = codec.parse(&mut stream, &Context::new()).unwrap();
        assert_eq!(stream.tell(), 0);
        assert_eq!(
            parsed,
            map(&[
                ("word", Value::Int(0x0102)),
                ("bytes", Value::from(&[1u8, 2][..]))
            ])
        );

        let built = codec
            .build_bytes(&map(&[("bytes", Value::from(&[3u8, 4][..]))]))
            .unwrap();
        assert_eq!(&built[..], &[3, 4]);
        assert!(matches!(
            codec.build_bytes(&Value::None),
            Err(Error::NoUnionAlternative)
        ));
    }

    #[test]
    fn test_union_parse_from() {
        let codec = Union::new(Some("short".to_string()))
            .field("long", Int::u32_be())
            .field("short", Int::u8());
        let mut stream = Stream::new(&[0, 0, 0, 1]);
        codec.parse(&mut stream, &Context::new()).unwrap();
        assert_eq!(stream.tell(), 1);
    }

    #[test]
    fn test_bitwise() {
        let codec = Bitwise::new(
            Struct::new()
                .field("high", BitsInteger::nibble())
                .field("low", BitsInteger::nibble()),
        );
        let parsed = codec.parse_exact(&[0xA5]).unwrap();
        assert_eq!(
            parsed,
            map(&[("high", Value::Int(0xA)), ("low", Value::Int(0x5))])
        );
        assert_eq!(&codec.build_bytes(&parsed).unwrap()[..], &[0xA5]);

        let partial = Bitwise::new(Struct::new().field("flag", BitsInteger::bit()));
        let mut stream = Stream::new(&[0x80, 0xFF]);
        assert_eq!(
            partial.parse(&mut stream, &Context::new()).unwrap(),
            map(&[("flag", Value::Int(1))])
        );
        assert_eq!(stream.tell(), 1);
        assert!(matches!(
            partial.build_bytes(&map(&[("flag", Value::Int(1))])),
            Err(Error::InvalidData(_, _))
        ));
    }

    #[test]
    fn test_bitwise_repeated_elements() {
        let nibbles = Bitwise::new(
            Struct::new()
                .field("high", BitsInteger::nibble())
                .field("low", BitsInteger::nibble()),
        );
        let codec = crate::PrefixedArray::new(Int::u32_be(), nibbles);
        let count = 50_000usize;
        let mut data = (count as u32).to_be_bytes().to_vec();
        data.extend((0..count).map(|i| i as u8));

        let mut stream = Stream::new(&data);
        let parsed = codec.parse(&mut stream, &Context::new()).unwrap();
        assert_eq!(stream.tell(), data.len());
        let items = parsed.as_list().unwrap();
        assert_eq!(items.len(), count);
        assert_eq!(
            items[0x1234],
            map(&[("high", Value::Int(0x3)), ("low", Value::Int(0x4))])
        );
        assert_eq!(
            items[count - 1],
            map(&[("high", Value::Int(0x4)), ("low", Value::Int(0xF))])
        );
    }

    #[test]
    fn test_bitwise_reads_past_first_window() {
        let greedy = Bitwise::new(
            Struct::new()
                .field("head", BitsInteger::bit())
                .field("tail", crate::GreedyBytes),
        );
        let data = [0xFFu8; 40];
        let mut stream = Stream::new(&data);
        let parsed = greedy.parse(&mut stream, &Context::new()).unwrap();
        let tail = parsed.as_map().unwrap().get("tail").unwrap().clone();
        assert!(matches!(tail, Value::Bytes(b) if b.len() == 40 * 8 - 1));
        assert_eq!(stream.tell(), 40);

        let overlaid = Bitwise::new(
            Union::new(Some("short".to_string()))
                .field("long", RawBytes::new(200))
                .field("short", BitsInteger::octet()),
        );
        let data = [0x80u8; 30];
        let mut stream = Stream::new(&data);
        let parsed = overlaid.parse(&mut stream, &Context::new()).unwrap();
        assert_eq!(parsed.as_map().unwrap().get("short"), Some(&Value::Int(0x80)));
        assert_eq!(stream.tell(), 1);
        assert!(matches!(
            overlaid.parse_bytes(&[0x80u8; 20]),
            Err(Error::EndOfBuffer)
        ));
    }

    #[test]
    fn test_shape() {
        let codec = Struct::new()
            .field("a", Int::u8())
            .field("b", Struct::new().field("c", Int::u8()));
        let shape = shape(&codec);
        assert_eq!(shape.names(), vec!["a", "b"]);
        assert_eq!(shape.nesting(Kind::Struct), 2);
        assert_eq!(shape.child("b").unwrap().names(), vec!["c"]);
    }
}
