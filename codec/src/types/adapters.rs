//! Constructs that wrap a single subconstruct and reinterpret or annotate its value.

use crate::{codec, Codec, Construct, Context, EnumInt, Error, Kind, Preset, Stream, Subcon, Value};
use bytes::BytesMut;
use std::{fmt, sync::Arc};

type DefaultFn = Arc<dyn Fn(&Context<'_>) -> Result<Value, Error> + Send + Sync>;

/// Source of the value a [Defaulted] construct builds when given [Value::None].
#[derive(Clone)]
pub enum DefaultSource {
    Static(Value),
    Computed(DefaultFn),
}

impl fmt::Debug for DefaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSource::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultSource::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// Builds a default when no value is supplied; parses like its subconstruct.
#[derive(Clone, Debug)]
pub struct Defaulted {
    subcon: Codec,
    default: DefaultSource,
}

impl Defaulted {
    pub fn new(subcon: impl Construct + 'static, value: impl Into<Value>) -> Self {
        Self {
            subcon: codec(subcon),
            default: DefaultSource::Static(value.into()),
        }
    }

    /// A default derived from the build context (for example a length or checksum).
    pub fn computed<F>(subcon: impl Construct + 'static, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            subcon: codec(subcon),
            default: DefaultSource::Computed(Arc::new(f)),
        }
    }
}

impl Construct for Defaulted {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        self.subcon.parse(stream, ctx)
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        if !value.is_none() {
            return self.subcon.build(value, buf, ctx);
        }
        let value = match &self.default {
            DefaultSource::Static(v) => v.clone(),
            DefaultSource::Computed(f) => f(ctx)?,
        };
        self.subcon.build(&value, buf, ctx)
    }

    fn flag_build_none(&self) -> bool {
        true
    }

    fn preset(&self) -> Option<Preset> {
        match &self.default {
            DefaultSource::Static(v) => Some(Preset::Static(v.clone())),
            DefaultSource::Computed(_) => Some(Preset::Computed),
        }
    }

    fn kind(&self) -> Kind {
        Kind::Default
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.subcon)]
    }
}

/// Maps an integer subconstruct onto named members.
///
/// Parsing yields [Value::Enum] with the member label when the integer is known and no label
/// otherwise; unknown integers are never an error. Build accepts an enumeration value, a plain
/// integer, or a member label.
#[derive(Clone, Debug)]
pub struct Enum {
    subcon: Codec,
    members: Vec<(String, i128)>,
}

impl Enum {
    pub fn new<N: Into<String>>(
        subcon: impl Construct + 'static,
        members: impl IntoIterator<Item = (N, i128)>,
    ) -> Self {
        Self {
            subcon: codec(subcon),
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    pub fn members(&self) -> &[(String, i128)] {
        &self.members
    }

    fn label(&self, value: i128) -> Option<String> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.clone())
    }
}

impl Construct for Enum {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let value = self.subcon.parse(stream, ctx)?.to_int()?;
        Ok(Value::Enum(EnumInt::new(value, self.label(value))))
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        let raw = match value {
            Value::Str(label) => self
                .members
                .iter()
                .find(|(n, _)| n == label)
                .map(|(_, v)| *v)
                .ok_or_else(|| Error::UnknownLabel(label.clone()))?,
            other => other.to_int()?,
        };
        self.subcon.build(&Value::Int(raw), buf, ctx)?;
        Ok(Value::Enum(EnumInt::new(raw, self.label(raw))))
    }

    fn kind(&self) -> Kind {
        Kind::Enum
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.subcon)]
    }
}

pub type ParsedHook = Arc<dyn Fn(Value, &Context<'_>) -> Result<Value, Error> + Send + Sync>;

/// Attaches documentation and a post-parse hook without changing the wire format.
#[derive(Clone)]
pub struct Renamed {
    subcon: Codec,
    doc: Option<String>,
    parsed: Option<ParsedHook>,
}

impl Renamed {
    pub fn new(subcon: impl Construct + 'static) -> Self {
        Self {
            subcon: codec(subcon),
            doc: None,
            parsed: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_parsed(mut self, hook: ParsedHook) -> Self {
        self.parsed = Some(hook);
        self
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

impl fmt::Debug for Renamed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renamed")
            .field("subcon", &self.subcon)
            .field("doc", &self.doc)
            .field("parsed", &self.parsed.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Construct for Renamed {
    fn parse(&self, stream: &mut Stream<'_>, ctx: &Context<'_>) -> Result<Value, Error> {
        let value = self.subcon.parse(stream, ctx)?;
        match &self.parsed {
            Some(hook) => hook(value, ctx),
            None => Ok(value),
        }
    }

    fn build(&self, value: &Value, buf: &mut BytesMut, ctx: &Context<'_>) -> Result<Value, Error> {
        self.subcon.build(value, buf, ctx)
    }

    fn flag_build_none(&self) -> bool {
        self.subcon.flag_build_none()
    }

    fn preset(&self) -> Option<Preset> {
        self.subcon.preset()
    }

    fn kind(&self) -> Kind {
        Kind::Renamed
    }

    fn subcons(&self) -> Vec<Subcon<'_>> {
        vec![Subcon::unnamed(&self.subcon)]
    }
}
