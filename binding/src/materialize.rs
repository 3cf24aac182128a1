//! Turn generic decoded values into typed records, and typed fields back into values.

use crate::{
    DeclaredType, EnumMember, EnumValue, Enumeration, Error, FieldDefault, FieldDescriptor,
    Record, RecordType,
};
use bytes::Bytes;
use std::any::Any;
use structbind_codec::{EnumInt, Value};
use tracing::trace;

/// A field value after materialization, before conversion into its Rust type.
pub enum Materialized {
    /// No value (a missing optional record).
    Absent,
    /// A scalar passed through unchanged.
    Value(Value),
    /// An instance of a nested record.
    Record(Box<dyn Any + Send>),
    /// A known enumeration member.
    Enum(EnumMember),
    /// Element-wise materialized sequence.
    List(Vec<Materialized>),
}

impl Materialized {
    /// Short description used in errors.
    pub fn describe(&self) -> String {
        match self {
            Materialized::Absent => "none".to_string(),
            Materialized::Value(value) => value.kind().to_string(),
            Materialized::Record(_) => "record".to_string(),
            Materialized::Enum(member) => format!("{}::{}", member.enumeration.name(), member.name),
            Materialized::List(_) => "list".to_string(),
        }
    }
}

impl std::fmt::Debug for Materialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Materialized::Absent => f.write_str("Absent"),
            Materialized::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Materialized::Record(_) => f.write_str("Record(..)"),
            Materialized::Enum(member) => f.debug_tuple("Enum").field(member).finish(),
            Materialized::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

/// Materialized field values handed to [Record::construct].
#[derive(Debug)]
pub struct Fields {
    record: &'static str,
    slots: Vec<(String, Option<Materialized>)>,
}

impl Fields {
    pub fn new(record: &'static str) -> Self {
        Self {
            record,
            slots: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Materialized) {
        self.slots.push((name.into(), Some(value)));
    }

    /// Removes the named value and converts it into `T`.
    pub fn take<T: FromMaterialized>(&mut self, name: &str) -> Result<T, Error> {
        let value = self
            .slots
            .iter_mut()
            .find(|(slot, _)| slot == name)
            .and_then(|(_, value)| value.take())
            .ok_or_else(|| Error::MissingField {
                record: self.record,
                field: name.to_string(),
            })?;
        T::from_materialized(value)
    }
}

/// Conversion of a materialized value into a Rust field type.
pub trait FromMaterialized: Sized {
    fn from_materialized(value: Materialized) -> Result<Self, Error>;
}

macro_rules! impl_from_materialized_int {
    ($($type:ty),*) => {
        $(
            impl FromMaterialized for $type {
                fn from_materialized(value: Materialized) -> Result<Self, Error> {
                    let raw = match &value {
                        Materialized::Value(v) => v.as_int(),
                        Materialized::Enum(member) => Some(member.value),
                        _ => None,
                    }
                    .ok_or_else(|| Error::mismatch(stringify!($type), value.describe()))?;
                    <$type>::try_from(raw)
                        .map_err(|_| Error::mismatch(stringify!($type), raw.to_string()))
                }
            }
        )*
    };
}

impl_from_materialized_int!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl FromMaterialized for bool {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Value(Value::Bool(b)) => Ok(b),
            Materialized::Value(Value::Int(0)) => Ok(false),
            Materialized::Value(Value::Int(1)) => Ok(true),
            other => Err(Error::mismatch("bool", other.describe())),
        }
    }
}

macro_rules! impl_from_materialized_float {
    ($($type:ty),*) => {
        $(
            impl FromMaterialized for $type {
                fn from_materialized(value: Materialized) -> Result<Self, Error> {
                    match value {
                        Materialized::Value(Value::Float(f)) => Ok(f as $type),
                        Materialized::Value(Value::Int(i)) => Ok(i as $type),
                        other => Err(Error::mismatch(stringify!($type), other.describe())),
                    }
                }
            }
        )*
    };
}

impl_from_materialized_float!(f32, f64);

impl FromMaterialized for () {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Absent | Materialized::Value(Value::None) => Ok(()),
            other => Err(Error::mismatch("none", other.describe())),
        }
    }
}

impl FromMaterialized for Bytes {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Value(Value::Bytes(b)) => Ok(b),
            Materialized::Value(Value::Str(s)) => Ok(Bytes::from(s)),
            other => Err(Error::mismatch("bytes", other.describe())),
        }
    }
}

impl FromMaterialized for String {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Value(Value::Str(s)) => Ok(s),
            Materialized::Value(Value::Bytes(b)) => {
                String::from_utf8(b.to_vec()).map_err(|_| Error::mismatch("utf-8", "bytes"))
            }
            other => Err(Error::mismatch("str", other.describe())),
        }
    }
}

impl<const N: usize> FromMaterialized for [u8; N] {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        let bytes = Bytes::from_materialized(value)?;
        <[u8; N]>::try_from(bytes.as_ref())
            .map_err(|_| Error::mismatch(format!("{N} bytes"), format!("{} bytes", bytes.len())))
    }
}

impl FromMaterialized for Value {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Absent => Ok(Value::None),
            Materialized::Value(value) => Ok(value),
            Materialized::Enum(member) => Ok(Value::Enum(EnumInt::new(
                member.value,
                Some(member.name.to_string()),
            ))),
            Materialized::List(items) => items
                .into_iter()
                .map(Value::from_materialized)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Materialized::Record(_) => Err(Error::mismatch("value", "record")),
        }
    }
}

impl<T: FromMaterialized> FromMaterialized for Option<T> {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Absent | Materialized::Value(Value::None) => Ok(None),
            other => T::from_materialized(other).map(Some),
        }
    }
}

impl<T: FromMaterialized> FromMaterialized for Box<T> {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        T::from_materialized(value).map(Box::new)
    }
}

impl<T: FromMaterialized> FromMaterialized for Vec<T> {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        let items = match value {
            Materialized::List(items) => items,
            Materialized::Value(Value::List(items)) => {
                items.into_iter().map(Materialized::Value).collect()
            }
            Materialized::Value(Value::Bytes(bytes)) => bytes
                .iter()
                .map(|b| Materialized::Value(Value::Int(i128::from(*b))))
                .collect(),
            other => return Err(Error::mismatch("list", other.describe())),
        };
        items.into_iter().map(T::from_materialized).collect()
    }
}

impl<E: Enumeration> FromMaterialized for EnumValue<E> {
    fn from_materialized(value: Materialized) -> Result<Self, Error> {
        match value {
            Materialized::Enum(member) => Ok(EnumValue::from_value(member.value)),
            Materialized::Value(v) => v
                .as_int()
                .map(EnumValue::from_value)
                .ok_or_else(|| Error::mismatch(E::NAME, v.kind())),
            other => Err(Error::mismatch(E::NAME, other.describe())),
        }
    }
}

/// Converts a materialized value into a record (used by derived [FromMaterialized] impls).
pub fn record_from_materialized<T: Record>(value: Materialized) -> Result<T, Error> {
    match value {
        Materialized::Record(instance) => instance
            .downcast::<T>()
            .map(|instance| *instance)
            .map_err(|_| Error::mismatch(T::NAME, "another record")),
        Materialized::Value(value @ Value::Map(_)) => materialize::<T>(Source::Generic(value))?
            .ok_or_else(|| Error::mismatch(T::NAME, "none")),
        other => Err(Error::mismatch(T::NAME, other.describe())),
    }
}

/// Converts a materialized value into an enumeration member (used by derived impls).
///
/// Unlike [EnumValue], a bare enumeration cannot hold unknown integers.
pub fn enum_from_materialized<E: Enumeration>(value: Materialized) -> Result<E, Error> {
    match EnumValue::<E>::from_materialized(value)? {
        EnumValue::Member(member) => Ok(member),
        EnumValue::Unknown(raw) => Err(Error::mismatch(E::NAME, raw.to_string())),
    }
}

/// Conversion of a Rust field value into a generic value for building.
pub trait Flatten {
    fn flatten(&self) -> Value;
}

macro_rules! impl_flatten {
    ($($type:ty),*) => {
        $(
            impl Flatten for $type {
                fn flatten(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

impl_flatten!(u8, u16, u32, u64, i8, i16, i32, i64, i128, usize, bool, f32, f64);

/// Values above `i128::MAX` flatten to [Value::Float], which integer codecs reject at build
/// time instead of treating the field as absent.
impl Flatten for u128 {
    fn flatten(&self) -> Value {
        i128::try_from(*self).map_or(Value::Float(*self as f64), Value::Int)
    }
}

impl Flatten for isize {
    fn flatten(&self) -> Value {
        Value::Int(*self as i128)
    }
}

impl Flatten for () {
    fn flatten(&self) -> Value {
        Value::None
    }
}

impl Flatten for Bytes {
    fn flatten(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl Flatten for String {
    fn flatten(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl<const N: usize> Flatten for [u8; N] {
    fn flatten(&self) -> Value {
        Value::from(self)
    }
}

impl Flatten for Value {
    fn flatten(&self) -> Value {
        self.clone()
    }
}

impl<T: Flatten> Flatten for Option<T> {
    fn flatten(&self) -> Value {
        self.as_ref().map_or(Value::None, Flatten::flatten)
    }
}

impl<T: Flatten> Flatten for Box<T> {
    fn flatten(&self) -> Value {
        self.as_ref().flatten()
    }
}

impl<T: Flatten> Flatten for Vec<T> {
    fn flatten(&self) -> Value {
        Value::List(self.iter().map(Flatten::flatten).collect())
    }
}

impl<E: Enumeration> Flatten for EnumValue<E> {
    fn flatten(&self) -> Value {
        match self {
            EnumValue::Member(member) => enum_to_value(*member),
            EnumValue::Unknown(raw) => Value::Int(*raw),
        }
    }
}

/// Flattens an enumeration member (used by derived [Flatten] impls).
pub fn enum_to_value<E: Enumeration>(member: E) -> Value {
    Value::Enum(EnumInt::new(member.value(), Some(member.name().to_string())))
}

/// Input to [materialize].
pub enum Source<T> {
    Absent,
    Typed(T),
    Generic(Value),
}

/// Builds a typed record from a generic decoded value.
///
/// An absent source (or [Value::None]) yields `None`; an already typed value is returned as is.
pub fn materialize<T: Record>(source: Source<T>) -> Result<Option<T>, Error> {
    let value = match source {
        Source::Absent | Source::Generic(Value::None) => return Ok(None),
        Source::Typed(instance) => return Ok(Some(instance)),
        Source::Generic(value) => value,
    };
    let instance = build_record(&RecordType::of::<T>(), &value)?;
    instance
        .downcast::<T>()
        .map(|instance| Some(*instance))
        .map_err(|_| Error::mismatch(T::NAME, "another record"))
}

/// Type-erased [materialize] for a declared record type (or sequence of records).
pub fn materialize_dyn(value: Value, declared: &DeclaredType) -> Result<Materialized, Error> {
    if declared.record().is_none() {
        return Err(Error::mismatch("record", declared.describe()));
    }
    resolve(value, declared, "")
}

fn build_record(record: &RecordType, value: &Value) -> Result<Box<dyn Any + Send>, Error> {
    if !matches!(value, Value::Map(_) | Value::List(_)) {
        return Err(Error::mismatch(record.name(), value.kind()));
    }
    let schema = record.schema()?;
    trace!(record = record.name(), "materializing record");

    // Fields that need a value are resolved before construction; the others are assigned
    // afterwards, starting from their static default when they have one.
    let mut fields = Fields::new(record.name());
    let mut deferred = Vec::new();
    for descriptor in schema.fields() {
        let resolved = resolve_field(value, descriptor)?;
        match descriptor.default_value() {
            FieldDefault::Value(default) if !descriptor.requires_value() => {
                fields.insert(descriptor.name(), Materialized::Value(default.clone()));
                deferred.push((descriptor.name(), resolved));
            }
            _ => fields.insert(descriptor.name(), resolved),
        }
    }
    let mut instance = record.construct(&mut fields)?;
    for (name, resolved) in deferred {
        record.assign(instance.as_mut(), name, resolved)?;
    }
    Ok(instance)
}

fn extract(value: &Value, name: &str) -> Value {
    match value {
        Value::Map(map) => map.get(name).cloned().unwrap_or_default(),
        Value::List(items) => Value::List(items.iter().map(|item| extract(item, name)).collect()),
        _ => Value::None,
    }
}

fn resolve_field(value: &Value, descriptor: &FieldDescriptor) -> Result<Materialized, Error> {
    resolve(
        extract(value, descriptor.name()),
        descriptor.declared_type(),
        descriptor.name(),
    )
}

fn resolve(value: Value, declared: &DeclaredType, field: &str) -> Result<Materialized, Error> {
    if let Value::List(items) = value {
        return items
            .into_iter()
            .map(|item| resolve(item, declared, field))
            .collect::<Result<Vec<_>, _>>()
            .map(Materialized::List);
    }
    if let Some(record) = declared.record() {
        if value.is_none() {
            return Ok(Materialized::Absent);
        }
        return build_record(&record, &value).map(Materialized::Record);
    }
    match (value, declared.enumeration()) {
        (Value::Enum(raw), Some(enumeration)) => match enumeration.member(raw.value) {
            Some(member) => Ok(Materialized::Enum(member)),
            None => {
                trace!(
                    enumeration = enumeration.name(),
                    field,
                    value = %raw.value,
                    "unknown enumeration value"
                );
                Ok(Materialized::Value(Value::Int(raw.value)))
            }
        },
        (value, _) => Ok(Materialized::Value(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_take() {
        let mut fields = Fields::new("Test");
        fields.insert("a", Materialized::Value(Value::Int(7)));
        assert_eq!(fields.take::<u8>("a").unwrap(), 7);
        assert!(matches!(
            fields.take::<u8>("a"),
            Err(Error::MissingField { record: "Test", .. })
        ));
        assert!(matches!(
            fields.take::<u8>("b"),
            Err(Error::MissingField { .. })
        ));
    }

    #[test]
    fn test_int_conversion() {
        assert_eq!(
            u16::from_materialized(Materialized::Value(Value::Int(300))).unwrap(),
            300
        );
        assert!(matches!(
            u8::from_materialized(Materialized::Value(Value::Int(300))),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            u8::from_materialized(Materialized::Value(Value::from(&b"x"[..]))),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_container_conversions() {
        let list = Materialized::List(vec![
            Materialized::Value(Value::Int(1)),
            Materialized::Value(Value::Int(2)),
        ]);
        assert_eq!(Vec::<u8>::from_materialized(list).unwrap(), vec![1, 2]);

        let bytes = Materialized::Value(Value::from(&b"ab"[..]));
        assert_eq!(Vec::<u8>::from_materialized(bytes).unwrap(), b"ab".to_vec());

        let fixed = Materialized::Value(Value::from(&b"BMP"[..]));
        assert_eq!(<[u8; 3]>::from_materialized(fixed).unwrap(), *b"BMP");

        assert_eq!(
            Option::<u8>::from_materialized(Materialized::Absent).unwrap(),
            None
        );
        assert_eq!(
            Option::<u8>::from_materialized(Materialized::Value(Value::Int(4))).unwrap(),
            Some(4)
        );
    }

    #[test]
    fn test_flatten() {
        assert_eq!(5u8.flatten(), Value::Int(5));
        assert_eq!(Some(true).flatten(), Value::Bool(true));
        assert_eq!(None::<u8>.flatten(), Value::None);
        assert_eq!(
            vec![1u16, 2].flatten(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!((*b"ok").flatten(), Value::from(b"ok"));
    }

    #[test]
    fn test_extract_columns() {
        let rows = Value::List(vec![
            Value::Map([("x", Value::Int(1))].into_iter().collect()),
            Value::Map([("x", Value::Int(2))].into_iter().collect()),
        ]);
        assert_eq!(
            extract(&rows, "x"),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(extract(&Value::Int(3), "x"), Value::None);
    }

    #[test]
    fn test_materialize_dyn_requires_record() {
        assert!(matches!(
            materialize_dyn(Value::Int(1), &DeclaredType::Scalar),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_flatten_u128_out_of_range() {
        use structbind_codec::{ConstructExt, Defaulted, Int};

        assert_eq!(7u128.flatten(), Value::Int(7));
        let huge = u128::MAX.flatten();
        assert!(!huge.is_none());

        let codec = Defaulted::new(Int::u64_be(), 0u8);
        assert!(matches!(
            codec.build_bytes(&huge),
            Err(structbind_codec::Error::InvalidValue { expected: "int", found: "float" })
        ));
        assert_eq!(&codec.build_bytes(&Value::None).unwrap()[..], &[0; 8]);
    }
}
