//! Core construct trait and tree introspection

use crate::{Context, Error, Stream, Value};
use bytes::{Bytes, BytesMut};
use std::{fmt, sync::Arc};

/// A shared, immutable construct (a node in a codec tree).
pub type Codec = Arc<dyn Construct>;

/// Trait for all parse/build units, from single integers up to whole record trees.
pub trait Construct: fmt::Debug + Send + Sync {
    /// Parses a value from the stream, consuming the necessary units.
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error>;

    /// Builds `value` into `buf` and returns the value actually written (for example, the
    /// resolved default when `value` was [Value::None]).
    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error>;

    /// Whether [Construct::build] accepts [Value::None] (constants, defaults, padding).
    fn flag_build_none(&self) -> bool {
        false
    }

    /// The value this construct produces on its own, if any.
    fn preset(&self) -> Option<Preset> {
        None
    }

    fn kind(&self) -> Kind;

    /// Direct children of this node.
    fn subcons(&self) -> Vec<Subcon<'_>> {
        Vec::new()
    }
}

/// A value a construct can supply without input.
#[derive(Clone, Debug, PartialEq)]
pub enum Preset {
    /// Fixed value of a constant.
    Const(Value),
    /// Static default.
    Static(Value),
    /// Default computed from the context at build time.
    Computed,
}

/// Node kinds, as reported by [Construct::kind].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Float,
    Flag,
    Bits,
    Bytes,
    GreedyBytes,
    Padding,
    Const,
    Default,
    Enum,
    Array,
    PrefixedArray,
    If,
    Renamed,
    Struct,
    AlignedStruct,
    Union,
    Bitwise,
    /// A reference to a record compiled on first use.
    Reference,
    /// A record binding wrapping a compiled tree.
    Binding,
}

/// A child of a composite node.
pub struct Subcon<'a> {
    pub name: Option<&'a str>,
    pub construct: &'a Codec,
}

impl<'a> Subcon<'a> {
    pub fn named(name: &'a str, construct: &'a Codec) -> Self {
        Self {
            name: Some(name),
            construct,
        }
    }

    pub fn unnamed(construct: &'a Codec) -> Self {
        Self {
            name: None,
            construct,
        }
    }
}

/// A structural description of a codec tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    pub kind: Kind,
    pub name: Option<String>,
    pub children: Vec<Shape>,
}

/// Describes the tree rooted at `construct`.
pub fn shape(construct: &dyn Construct) -> Shape {
    shape_named(construct, None)
}

fn shape_named(construct: &dyn Construct, name: Option<&str>) -> Shape {
    Shape {
        kind: construct.kind(),
        name: name.map(str::to_string),
        children: construct
            .subcons()
            .into_iter()
            .map(|sub| shape_named(sub.construct.as_ref(), sub.name))
            .collect(),
    }
}

impl Shape {
    /// Largest number of `kind` nodes found on any root-to-leaf path.
    pub fn nesting(&self, kind: Kind) -> usize {
        let own = usize::from(self.kind == kind);
        own + self
            .children
            .iter()
            .map(|c| c.nesting(kind))
            .max()
            .unwrap_or(0)
    }

    /// Finds a direct child by name.
    pub fn child(&self, name: &str) -> Option<&Shape> {
        self.children
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
    }

    /// Names of the direct children, in order.
    pub fn names(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter_map(|c| c.name.as_deref())
            .collect()
    }
}

impl<T: Construct + ?Sized> Construct for Arc<T> {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        (**self).parse(stream, ctx)
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        (**self).build(value, buf, ctx)
    }

    fn flag_build_none(&self) -> bool {
        (**self).flag_build_none()
    }

    fn preset(&self) -> Option<Preset> {
        (**self).preset()
    }

    fn kind(&self) -> Kind {
        (**self).kind()
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        (**self).subcons()
    }
}

/// Wraps a construct into a shared [Codec].
pub fn codec(construct: impl Construct + 'static) -> Codec {
    Arc::new(construct)
}

/// Extension trait providing whole-buffer parse and build with a fresh context.
pub trait ConstructExt: Construct {
    /// Parses from the start of `data`. Trailing input is left unread.
    fn parse_bytes(&self, data: &[u8]) -> Result<Value, Error> {
        let mut stream = Stream::new(data);
        self.parse(&mut stream, &Context::new())
    }

    /// Parses from the start of `data`, failing if any input remains.
    fn parse_exact(&self, data: &[u8]) -> Result<Value, Error> {
        let mut stream = Stream::new(data);
        let value = self.parse(&mut stream, &Context::new())?;
        let remaining = stream.rest().len();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }
        Ok(value)
    }

    /// Builds `value` into a new buffer.
    fn build_bytes(&self, value: &Value) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        self.build(value, &mut buf, &Context::new())?;
        Ok(buf.freeze())
    }
}

impl<T: Construct + ?Sized> ConstructExt for T {}
