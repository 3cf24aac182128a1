//! Declared field types, resolved once per record type.
//!
//! A declared type tells the materializer how to interpret a field's generic value: as a plain
//! scalar, as a nested record, as an enumeration member, or as a sequence of one of those. It
//! never influences the byte layout.

use crate::{Enumeration, Error, EnumValue, Fields, Materialized, Record, Schema};
use bytes::Bytes;
use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};
use structbind_codec::Value;

type SchemaFn = fn() -> Result<Arc<Schema>, Error>;
type ConstructFn = fn(&mut Fields) -> Result<Box<dyn Any + Send>, Error>;
type AssignFn = fn(&mut (dyn Any + Send), &str, Materialized) -> Result<(), Error>;

/// A type-erased handle to a [Record] type.
#[derive(Clone, Copy)]
pub struct RecordType {
    name: &'static str,
    id: TypeId,
    schema: SchemaFn,
    construct: ConstructFn,
    assign: AssignFn,
}

fn construct_erased<T: Record>(fields: &mut Fields) -> Result<Box<dyn Any + Send>, Error> {
    Ok(Box::new(T::construct(fields)?))
}

fn assign_erased<T: Record>(
    instance: &mut (dyn Any + Send),
    field: &str,
    value: Materialized,
) -> Result<(), Error> {
    let instance = instance
        .downcast_mut::<T>()
        .ok_or_else(|| Error::mismatch(T::NAME, "another record"))?;
    instance.assign(field, value)
}

impl RecordType {
    pub fn of<T: Record>() -> Self {
        Self {
            name: T::NAME,
            id: TypeId::of::<T>(),
            schema: T::schema,
            construct: construct_erased::<T>,
            assign: assign_erased::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn schema(&self) -> Result<Arc<Schema>, Error> {
        (self.schema)()
    }

    pub(crate) fn construct(&self, fields: &mut Fields) -> Result<Box<dyn Any + Send>, Error> {
        (self.construct)(fields)
    }

    pub(crate) fn assign(
        &self,
        instance: &mut (dyn Any + Send),
        field: &str,
        value: Materialized,
    ) -> Result<(), Error> {
        (self.assign)(instance, field, value)
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordType({})", self.name)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A type-erased handle to an [Enumeration] type.
#[derive(Clone, Copy)]
pub struct EnumType {
    name: &'static str,
    id: TypeId,
    members: &'static [(&'static str, i128)],
}

impl EnumType {
    pub fn of<E: Enumeration>() -> Self {
        Self {
            name: E::NAME,
            id: TypeId::of::<E>(),
            members: E::MEMBERS,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn members(&self) -> &'static [(&'static str, i128)] {
        self.members
    }

    /// The member with the given integer value, if any.
    pub fn member(&self, value: i128) -> Option<EnumMember> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|&(name, value)| EnumMember {
                enumeration: *self,
                name,
                value,
            })
    }
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumType({})", self.name)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EnumType {}

/// A resolved enumeration member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumMember {
    pub enumeration: EnumType,
    pub name: &'static str,
    pub value: i128,
}

/// The declared type of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredType {
    Scalar,
    Record(RecordType),
    Enumeration(EnumType),
    SequenceOf(Box<DeclaredType>),
}

impl DeclaredType {
    /// The record type, looking through one level of sequence.
    pub fn record(&self) -> Option<RecordType> {
        match self {
            DeclaredType::Record(record) => Some(*record),
            DeclaredType::SequenceOf(inner) => match inner.as_ref() {
                DeclaredType::Record(record) => Some(*record),
                _ => None,
            },
            _ => None,
        }
    }

    /// The enumeration type, looking through one level of sequence.
    pub fn enumeration(&self) -> Option<EnumType> {
        match self {
            DeclaredType::Enumeration(enumeration) => Some(*enumeration),
            DeclaredType::SequenceOf(inner) => match inner.as_ref() {
                DeclaredType::Enumeration(enumeration) => Some(*enumeration),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            DeclaredType::Scalar => "scalar".to_string(),
            DeclaredType::Record(record) => record.name().to_string(),
            DeclaredType::Enumeration(enumeration) => enumeration.name().to_string(),
            DeclaredType::SequenceOf(inner) => format!("sequence of {}", inner.describe()),
        }
    }
}

/// Rust types that know their [DeclaredType].
///
/// Derived for records and enumerations; scalars use the default.
pub trait Declared {
    fn declared_type() -> DeclaredType {
        DeclaredType::Scalar
    }
}

macro_rules! impl_scalar {
    ($($type:ty),*) => {
        $(impl Declared for $type {})*
    };
}

impl_scalar!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, f32, f64, (), String,
    Bytes, Value
);

impl<const N: usize> Declared for [u8; N] {}

impl<T: Declared> Declared for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::SequenceOf(Box::new(T::declared_type()))
    }
}

impl<T: Declared> Declared for Option<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }
}

impl<T: Declared> Declared for Box<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }
}

impl<E: Enumeration> Declared for EnumValue<E> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Enumeration(EnumType::of::<E>())
    }
}
