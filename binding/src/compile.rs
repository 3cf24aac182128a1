//! Compile records into codec trees.

use crate::{Error, Record, RecordOptions, RecordType, UnionMode};
use bytes::BytesMut;
use std::{any::TypeId, fmt, sync::OnceLock};
use structbind_codec::{
    codec, AlignedStruct, Bitwise, Codec, Construct, Context, Kind, Stream, Struct, Union, Value,
};
use tracing::debug;

/// Compiles `record` into one composite codec.
///
/// Fields are laid out in declaration order (or reversed) and composed into a struct, an aligned
/// struct, or a union, optionally wrapped in a bit stream. Fields declared as record references
/// are expanded in place while the depth budget allows; with no budget, expansion stops at the
/// first record that is already being compiled, so self-referential records terminate. A
/// reference that is not expanded compiles lazily with the options it would have inherited, so
/// the depth budget never changes the byte layout.
pub fn compile_record(record: &RecordType, options: &RecordOptions) -> Result<Codec, Error> {
    validate(options)?;
    let mut stack = Vec::new();
    compile(record, options, 0, &mut stack)
}

/// Compiles `T` with explicit options.
pub fn to_struct<T: Record>(options: &RecordOptions) -> Result<Codec, Error> {
    compile_record(&RecordType::of::<T>(), options)
}

/// A lazily compiled reference to `T`, usable inside other codecs.
///
/// ```
/// use structbind::{codec::{this, Array, Int}, struct_of, Record, Serializable};
///
/// #[derive(Record, Debug, PartialEq)]
/// struct Pixel {
///     #[field(codec = Int::u8())]
///     data: u8,
/// }
///
/// #[derive(Record, Debug, PartialEq)]
/// struct Row {
///     #[field(codec = Int::u8())]
///     width: u8,
///     #[field(nested = Pixel, codec = Array::new(this("width"), struct_of::<Pixel>()))]
///     pixels: Vec<Pixel>,
/// }
///
/// let row = Row::parse(&[2, 7, 9]).unwrap();
/// assert_eq!(row.pixels, vec![Pixel { data: 7 }, Pixel { data: 9 }]);
/// ```
pub fn struct_of<T: Record>() -> RecordCodec {
    RecordCodec::new(RecordType::of::<T>(), RecordOptions::default())
}

fn validate(options: &RecordOptions) -> Result<(), Error> {
    if options.aligned.is_some() && options.union.is_some() {
        return Err(Error::ConfigurationConflict(
            "a record cannot be both aligned and a union".to_string(),
        ));
    }
    if options.aligned == Some(0) {
        return Err(Error::ConfigurationConflict(
            "alignment modulus must be positive".to_string(),
        ));
    }
    Ok(())
}

fn expands(max_depth: Option<usize>, depth: usize, stack: &[TypeId], nested: &RecordType) -> bool {
    match max_depth {
        Some(max) => depth < max,
        None => !stack.contains(&nested.id()),
    }
}

fn compile(
    record: &RecordType,
    options: &RecordOptions,
    depth: usize,
    stack: &mut Vec<TypeId>,
) -> Result<Codec, Error> {
    let schema = record.schema()?;
    if let Some(UnionMode::ParseFrom(name)) = &options.union {
        if schema.field(name).is_none() {
            return Err(Error::ConfigurationConflict(format!(
                "union discriminant `{name}` is not a field of `{}`",
                record.name()
            )));
        }
    }

    stack.push(record.id());
    let mut fields = Vec::with_capacity(schema.len());
    let mut ordered: Vec<_> = schema.fields().iter().collect();
    if options.reverse {
        ordered.reverse();
    }
    for descriptor in ordered {
        let codec = match descriptor.references() {
            Some(nested) if expands(options.max_depth, depth, stack, &nested) => {
                let inner = compile(&nested, &options.nested(), depth + 1, stack)?;
                descriptor.annotate(inner)
            }
            // Cut off: compile on first use, with the same inherited options.
            Some(nested) => {
                let reference = RecordCodec::new(nested, options.nested());
                descriptor.annotate(codec(reference))
            }
            None => descriptor.codec().clone(),
        };
        fields.push((descriptor.name().to_string(), codec));
    }
    stack.pop();

    let count = fields.len();
    let tree = match (&options.aligned, &options.union) {
        (Some(modulus), _) => {
            let mut aligned = AlignedStruct::new(*modulus);
            for (name, codec) in fields {
                aligned.push(name, codec);
            }
            codec(aligned)
        }
        (None, Some(mode)) => {
            let parse_from = match mode {
                UnionMode::FirstMatch => None,
                UnionMode::ParseFrom(name) => Some(name.clone()),
            };
            let mut union = Union::new(parse_from);
            for (name, codec) in fields {
                union.push(name, codec);
            }
            codec(union)
        }
        (None, None) => {
            let mut composite = Struct::new();
            for (name, codec) in fields {
                composite.push(name, codec);
            }
            codec(composite)
        }
    };
    debug!(record = record.name(), fields = count, depth, "compiled record");
    if options.bitwise {
        return Ok(codec(Bitwise::new(tree)));
    }
    Ok(tree)
}

/// A record reference compiled on first use.
pub struct RecordCodec {
    record: RecordType,
    options: RecordOptions,
    compiled: OnceLock<Result<Codec, Error>>,
}

impl RecordCodec {
    pub fn new(record: RecordType, options: RecordOptions) -> Self {
        Self {
            record,
            options,
            compiled: OnceLock::new(),
        }
    }

    pub fn record(&self) -> RecordType {
        self.record
    }

    fn tree(&self) -> Result<&Codec, structbind_codec::Error> {
        self.compiled
            .get_or_init(|| compile_record(&self.record, &self.options))
            .as_ref()
            .map_err(|err| {
                structbind_codec::Error::InvalidData(self.record.name().to_string(), err.to_string())
            })
    }
}

impl fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCodec")
            .field("record", &self.record)
            .field("options", &self.options)
            .finish()
    }
}

impl Construct for RecordCodec {
    fn parse(
        &self,
        stream: &mut Stream<'_>,
        ctx: &Context<'_>,
    ) -> Result<Value, structbind_codec::Error> {
        self.tree()?.parse(stream, ctx)
    }

    fn build(
        &self,
        value: &Value,
        buf: &mut BytesMut,
        ctx: &Context<'_>,
    ) -> Result<Value, structbind_codec::Error> {
        self.tree()?.build(value, buf, ctx)
    }

    fn kind(&self) -> Kind {
        Kind::Reference
    }
}
