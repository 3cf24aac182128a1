//! Typed parse and build for one record type.

use crate::{compile_record, materialize, Error, Record, RecordOptions, RecordType, Source};
use bytes::{Bytes, BytesMut};
use std::{fmt, marker::PhantomData};
use structbind_codec::{Codec, Construct, Context, Kind, Stream, Subcon, Value};

/// Input accepted by [Binding::encode].
pub enum Encodable<'a, T> {
    /// A generic mapping, passed to the tree unchanged.
    Generic(Value),
    /// A typed instance, flattened with [Record::to_container].
    Typed(&'a T),
}

/// A record type bound to its compiled codec tree.
///
/// ```
/// use structbind::{codec::Int, Binding, Record, RecordOptions};
///
/// #[derive(Record, Debug, PartialEq)]
/// struct Flags {
///     #[field(codec = structbind::codec::BitsInteger::nibble())]
///     high: u8,
///     #[field(codec = structbind::codec::BitsInteger::nibble())]
///     low: u8,
/// }
///
/// let binding = Binding::<Flags>::new(RecordOptions::new().bitwise()).unwrap();
/// assert_eq!(binding.parse(&[0x3c]).unwrap(), Flags { high: 3, low: 12 });
/// ```
pub struct Binding<T: Record> {
    record: RecordType,
    options: RecordOptions,
    tree: Codec,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Binding<T> {
    pub fn new(options: RecordOptions) -> Result<Self, Error> {
        let record = RecordType::of::<T>();
        let tree = compile_record(&record, &options)?;
        Ok(Self {
            record,
            options,
            tree,
            _marker: PhantomData,
        })
    }

    /// The compiled tree, for reuse inside other codecs.
    pub fn structure(&self) -> &Codec {
        &self.tree
    }

    /// Wraps the compiled tree as a construct for embedding in other codecs.
    pub fn embed(&self) -> Embedded {
        Embedded {
            record: T::NAME,
            tree: self.tree.clone(),
        }
    }

    pub fn options(&self) -> &RecordOptions {
        &self.options
    }

    pub fn decode(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<T, Error> {
        let value = self.tree.parse(stream, ctx)?;
        materialize::<T>(Source::Generic(value))?.ok_or_else(|| Error::TypeMismatch {
            expected: T::NAME.to_string(),
            found: "none".to_string(),
        })
    }

    /// Decodes from the start of `data`. Trailing bytes are ignored.
    pub fn parse(&self, data: &[u8]) -> Result<T, Error> {
        let mut stream = Stream::new(data);
        self.decode(&mut stream, &Context::new())
    }

    pub fn encode(&self, input: Encodable<'_, T>) -> Result<Value, Error> {
        match input {
            Encodable::Generic(value @ Value::Map(_)) => Ok(value),
            Encodable::Generic(other) => Err(Error::TypeMismatch {
                expected: T::NAME.to_string(),
                found: other.kind().to_string(),
            }),
            Encodable::Typed(instance) => Ok(Value::Map(instance.to_container())),
        }
    }

    pub fn build(&self, instance: &T) -> Result<Bytes, Error> {
        let value = self.encode(Encodable::Typed(instance))?;
        self.build_value(&value)
    }

    pub fn build_generic(&self, value: Value) -> Result<Bytes, Error> {
        let value = self.encode(Encodable::Generic(value))?;
        self.build_value(&value)
    }

    fn build_value(&self, value: &Value) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        self.tree.build(value, &mut buf, &Context::new())?;
        Ok(buf.freeze())
    }
}

impl<T: Record> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("record", &self.record)
            .field("options", &self.options)
            .finish()
    }
}

/// A record's compiled tree, embeddable in other codecs (see [Binding::embed]).
///
/// Parsing yields the generic mapping; a field that declares the record type materializes it.
#[derive(Clone, Debug)]
pub struct Embedded {
    record: &'static str,
    tree: Codec,
}

impl Embedded {
    /// Name of the embedded record.
    pub fn record(&self) -> &'static str {
        self.record
    }
}

impl Construct for Embedded {
    fn parse(
        &self,
        stream: &mut Stream<'_>,
        ctx: &Context<'_>,
    ) -> Result<Value, structbind_codec::Error> {
        self.tree.parse(stream, ctx)
    }

    fn build(
        &self,
        value: &Value,
        buf: &mut BytesMut,
        ctx: &Context<'_>,
    ) -> Result<Value, structbind_codec::Error> {
        self.tree.build(value, buf, ctx)
    }

    fn kind(&self) -> Kind {
        Kind::Binding
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.tree)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldSpec, Fields, Materialized};
    use structbind_codec::{shape, Array, ConstructExt, Container, Int};

    #[derive(Debug, PartialEq)]
    struct Pair {
        a: u8,
        b: u8,
    }

    impl Record for Pair {
        const NAME: &'static str = "Pair";

        fn fields() -> Result<Vec<FieldSpec>, Error> {
            Ok(vec![
                FieldSpec::new("a", Int::u8()),
                FieldSpec::new("b", Int::u8()),
            ])
        }

        fn construct(fields: &mut Fields) -> Result<Self, Error> {
            Ok(Self {
                a: fields.take("a")?,
                b: fields.take("b")?,
            })
        }

        fn assign(&mut self, field: &str, _: Materialized) -> Result<(), Error> {
            Err(Error::MissingField {
                record: Self::NAME,
                field: field.to_string(),
            })
        }

        fn to_container(&self) -> Container {
            let mut container = Container::new();
            container.insert("a", Value::Int(self.a.into()));
            container.insert("b", Value::Int(self.b.into()));
            container
        }
    }

    #[test]
    fn test_typed_parse_with_construct_in_scope() {
        let binding = std::sync::Arc::new(Binding::<Pair>::new(RecordOptions::new()).unwrap());
        assert_eq!(binding.parse(&[1, 2]).unwrap(), Pair { a: 1, b: 2 });
        assert_eq!(&binding.build(&Pair { a: 3, b: 4 }).unwrap()[..], &[3, 4]);
    }

    #[test]
    fn test_embed() {
        let binding = Binding::<Pair>::new(RecordOptions::new()).unwrap();
        let embedded = binding.embed();
        assert_eq!(embedded.record(), "Pair");
        assert_eq!(embedded.kind(), Kind::Binding);

        let codec = Array::new(2, embedded);
        let parsed = codec.parse_exact(&[1, 2, 3, 4]).unwrap();
        assert_eq!(parsed.as_list().map(<[Value]>::len), Some(2));
        assert_eq!(&codec.build_bytes(&parsed).unwrap()[..], &[1, 2, 3, 4]);
        assert_eq!(shape(&codec).nesting(Kind::Binding), 1);
    }
}
