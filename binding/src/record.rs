//! Traits implemented by bindable records and enumerations.

use crate::{field::schema_of, Error, FieldSpec, Fields, Materialized, RecordOptions, Schema};
use std::sync::Arc;
use structbind_codec::{Container, Value};

/// A typed record bound to a binary layout.
///
/// Normally derived with `#[derive(Record)]`:
///
/// ```
/// use structbind::{codec::Int, Record, Serializable};
///
/// #[derive(Record, Debug, PartialEq)]
/// struct Point {
///     #[field(codec = Int::u8())]
///     x: u8,
///     #[field(codec = Int::u8())]
///     y: u8,
/// }
///
/// let point = Point::parse(&[0, 1]).unwrap();
/// assert_eq!(point, Point { x: 0, y: 1 });
/// assert_eq!(&point.build().unwrap()[..], &[0, 1]);
/// ```
pub trait Record: Sized + Send + 'static {
    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Field specs in declaration order.
    fn fields() -> Result<Vec<FieldSpec>, Error>;

    /// Options used when the record is registered without explicit ones.
    fn options() -> RecordOptions {
        RecordOptions::default()
    }

    /// Creates an instance from materialized field values.
    fn construct(fields: &mut Fields) -> Result<Self, Error>;

    /// Overwrites one field after construction.
    fn assign(&mut self, field: &str, value: Materialized) -> Result<(), Error>;

    /// Flattens the instance into a generic mapping for building.
    fn to_container(&self) -> Container;

    /// The cached descriptors of this record.
    fn schema() -> Result<Arc<Schema>, Error> {
        schema_of::<Self>()
    }
}

/// An integer enumeration usable as a field type.
///
/// Derived with `#[derive(Enumeration)]` on fieldless enums.
pub trait Enumeration: Copy + Send + Sync + 'static {
    const NAME: &'static str;

    /// Member names and their integer values, in declaration order.
    const MEMBERS: &'static [(&'static str, i128)];

    fn from_value(value: i128) -> Option<Self>;

    fn value(self) -> i128;

    fn name(self) -> &'static str;
}

/// An enumeration field that tolerates integers outside the declared members.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnumValue<E> {
    Member(E),
    Unknown(i128),
}

impl<E: Enumeration> EnumValue<E> {
    pub fn from_value(value: i128) -> Self {
        match E::from_value(value) {
            Some(member) => EnumValue::Member(member),
            None => EnumValue::Unknown(value),
        }
    }

    pub fn value(&self) -> i128 {
        match self {
            EnumValue::Member(member) => member.value(),
            EnumValue::Unknown(value) => *value,
        }
    }

    pub fn member(&self) -> Option<E> {
        match self {
            EnumValue::Member(member) => Some(*member),
            EnumValue::Unknown(_) => None,
        }
    }
}

impl<E> From<E> for EnumValue<E> {
    fn from(member: E) -> Self {
        EnumValue::Member(member)
    }
}

/// Map-style access to fields by name.
///
/// Derived records opt in with `#[record(container)]`.
pub trait Lookup {
    fn lookup(&self, key: &str) -> Option<Value>;
}

impl Lookup for Container {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}
