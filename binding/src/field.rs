//! Field specs and the descriptors built from them.
//!
//! A [FieldSpec] is what a record declares for one field (normally generated by
//! `#[derive(Record)]`). Each spec becomes exactly one [FieldDescriptor] when the record's
//! [Schema] is first requested; the schema is then cached per type and shared.

use crate::{
    compile::RecordCodec, Declared, DeclaredType, EnumType, Enumeration, Error, Record,
    RecordOptions, RecordType,
};
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};
use structbind_codec::{
    Codec, Construct, Container, Context, Enum, ParsedHook, Preset, Renamed, Value,
};
use tracing::debug;

/// How a field that can build without input obtains its value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldDefault {
    /// The field must be supplied.
    None,
    /// A constant's value or a static default.
    Value(Value),
    /// Computed from the build context.
    Computed,
}

/// The declaration of one record field.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    codec: Codec,
    declared: DeclaredType,
    reference: Option<RecordType>,
    doc: Option<String>,
    parsed: Option<ParsedHook>,
    metadata: Container,
}

impl FieldSpec {
    /// A field parsed and built by `codec`.
    pub fn new(name: impl Into<String>, codec: impl Construct + 'static) -> Self {
        Self::typed(DeclaredType::Scalar, name, codec)
    }

    /// A field holding another record, compiled with the default composition.
    pub fn record<T: Record>(name: impl Into<String>) -> Self {
        let record = RecordType::of::<T>();
        let mut spec = Self::typed(
            DeclaredType::Record(record),
            name,
            RecordCodec::new(record, RecordOptions::default()),
        );
        spec.reference = Some(record);
        spec
    }

    /// A codec that wraps another record (for example an array of records).
    pub fn nested(
        declared: DeclaredType,
        name: impl Into<String>,
        codec: impl Construct + 'static,
    ) -> Result<Self, Error> {
        if declared.record().is_none() {
            return Err(Error::mismatch("record", declared.describe()));
        }
        Ok(Self::typed(declared, name, codec))
    }

    /// An integer field interpreted as members of `E`.
    pub fn enumeration<E: Enumeration>(
        name: impl Into<String>,
        codec: impl Construct + 'static,
    ) -> Self {
        let members = E::MEMBERS.iter().map(|&(label, value)| (label, value));
        Self::typed(
            DeclaredType::Enumeration(EnumType::of::<E>()),
            name,
            Enum::new(codec, members),
        )
    }

    /// An arbitrary codec with an explicit declared type.
    pub fn typed(
        declared: DeclaredType,
        name: impl Into<String>,
        codec: impl Construct + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            codec: structbind_codec::codec(codec),
            declared,
            reference: None,
            doc: None,
            parsed: None,
            metadata: Container::new(),
        }
    }

    /// Like [FieldSpec::typed], taking the declared type from `T`.
    pub fn declared<T: Declared>(name: impl Into<String>, codec: impl Construct + 'static) -> Self {
        Self::typed(T::declared_type(), name, codec)
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Runs `hook` on every parsed value of this field.
    pub fn parsed<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value, &Context<'_>) -> Result<Value, structbind_codec::Error>
            + Send
            + Sync
            + 'static,
    {
        self.parsed = Some(Arc::new(hook));
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key, value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One named slot of a compiled record.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    codec: Codec,
    declared: DeclaredType,
    reference: Option<RecordType>,
    doc: Option<String>,
    parsed: Option<ParsedHook>,
    requires_value: bool,
    default: FieldDefault,
    metadata: Container,
}

impl FieldDescriptor {
    pub fn from_spec(spec: FieldSpec) -> Result<Self, Error> {
        let codec = annotate(spec.codec, spec.doc.as_deref(), spec.parsed.as_ref());
        let requires_value = !codec.flag_build_none();
        let default = match codec.preset() {
            Some(Preset::Const(value)) | Some(Preset::Static(value)) => FieldDefault::Value(value),
            Some(Preset::Computed) => FieldDefault::Computed,
            None => FieldDefault::None,
        };
        Ok(Self {
            name: spec.name,
            codec,
            declared: spec.declared,
            reference: spec.reference,
            doc: spec.doc,
            parsed: spec.parsed,
            requires_value,
            default,
            metadata: spec.metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field codec, including its doc/hook adapter.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn declared_type(&self) -> &DeclaredType {
        &self.declared
    }

    /// The record this field refers to directly, if it was declared as a record reference.
    pub fn references(&self) -> Option<RecordType> {
        self.reference
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn requires_value(&self) -> bool {
        self.requires_value
    }

    pub fn default_value(&self) -> &FieldDefault {
        &self.default
    }

    pub fn metadata(&self) -> &Container {
        &self.metadata
    }

    /// Applies this field's doc/hook adapter to another codec.
    pub(crate) fn annotate(&self, codec: Codec) -> Codec {
        annotate(codec, self.doc.as_deref(), self.parsed.as_ref())
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("requires_value", &self.requires_value)
            .field("default", &self.default)
            .field("metadata", &self.metadata)
            .finish()
    }
}

fn annotate(codec: Codec, doc: Option<&str>, parsed: Option<&ParsedHook>) -> Codec {
    if doc.is_none() && parsed.is_none() {
        return codec;
    }
    let mut renamed = Renamed::new(codec);
    if let Some(doc) = doc {
        renamed = renamed.with_doc(doc);
    }
    if let Some(hook) = parsed {
        renamed = renamed.with_parsed(hook.clone());
    }
    structbind_codec::codec(renamed)
}

/// The ordered descriptors of one record type.
#[derive(Debug)]
pub struct Schema {
    record: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn record(&self) -> &'static str {
        self.record
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<Schema>>>;

fn cache() -> &'static SchemaCache {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

/// Returns the cached schema of `T`, building it on first use.
pub(crate) fn schema_of<T: Record>() -> Result<Arc<Schema>, Error> {
    let id = TypeId::of::<T>();
    if let Some(schema) = cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Ok(schema.clone());
    }

    // Built outside the lock: field specs may refer to other records.
    let fields = T::fields()?
        .into_iter()
        .map(FieldDescriptor::from_spec)
        .collect::<Result<Vec<_>, _>>()?;
    let mut seen = Vec::with_capacity(fields.len());
    for field in &fields {
        if seen.contains(&field.name()) {
            return Err(Error::ConfigurationConflict(format!(
                "duplicate field `{}` in `{}`",
                field.name(),
                T::NAME
            )));
        }
        seen.push(field.name());
    }
    debug!(record = T::NAME, fields = fields.len(), "built schema");
    let schema = Arc::new(Schema {
        record: T::NAME,
        fields,
    });

    let mut cache = cache().write().unwrap_or_else(PoisonError::into_inner);
    Ok(cache.entry(id).or_insert(schema).clone())
}
