//! Bind typed records to binary layouts.
//!
//! # Overview
//!
//! Describe a binary layout once, as a struct whose fields carry their codecs, and get back:
//! - a composite codec tree that parses bytes and builds them again ([compile_record]), and
//! - a conversion from the tree's generic output into the typed struct ([materialize]).
//!
//! [Binding] ties both together for one record type, and [Serializable] exposes a registered
//! binding directly on the type.
//!
//! # Field forms
//!
//! `#[derive(Record)]` reads one `#[field(...)]` attribute per field:
//! - `codec = EXPR`: any construct.
//! - `record` (or `record = Type`): another record, compiled in place.
//! - `nested = Type, codec = EXPR`: a construct wrapping another record, such as an array.
//! - `enumeration = Type, codec = EXPR`: an integer construct interpreted as enumeration members.
//! - `typed = Type, codec = EXPR`: a construct with an explicit declared type.
//! - `doc = "..."`, `parsed = EXPR` and `meta(key = value, ...)` annotate any of the above.
//!
//! # Example
//!
//! ```
//! use structbind::{
//!     codec::{Const, Int},
//!     EnumValue, Enumeration, Record, Serializable,
//! };
//!
//! #[derive(Enumeration, Clone, Copy, Debug, PartialEq)]
//! enum Orientation {
//!     None = 0,
//!     Horizontal = 1,
//!     Vertical = 2,
//! }
//!
//! #[derive(Record, Debug, PartialEq)]
//! struct Header {
//!     #[field(codec = Const::bytes(b"BMP"))]
//!     signature: [u8; 3],
//!     #[field(enumeration = Orientation, codec = Int::u8())]
//!     orientation: EnumValue<Orientation>,
//! }
//!
//! #[derive(Record, Debug, PartialEq)]
//! struct Image {
//!     #[field(record)]
//!     header: Header,
//!     #[field(codec = Int::u8())]
//!     width: u8,
//!     #[field(codec = Int::u8())]
//!     height: u8,
//! }
//!
//! let image = Image::parse(b"BMP\x02\x03\x02").unwrap();
//! assert_eq!(image.header.orientation, EnumValue::Member(Orientation::Vertical));
//! assert_eq!((image.width, image.height), (3, 2));
//! assert_eq!(&image.build().unwrap()[..], b"BMP\x02\x03\x02");
//! ```

// Lets derived code refer to `::structbind` from inside this crate.
extern crate self as structbind;

mod binding;
mod compile;
mod config;
mod declared;
mod error;
mod field;
mod materialize;
mod record;
mod registry;

pub use binding::{Binding, Embedded, Encodable};
pub use compile::{compile_record, struct_of, to_struct, RecordCodec};
pub use config::{RecordOptions, UnionMode};
pub use declared::{Declared, DeclaredType, EnumMember, EnumType, RecordType};
pub use error::Error;
pub use field::{FieldDefault, FieldDescriptor, FieldSpec, Schema};
pub use materialize::{
    enum_from_materialized, enum_to_value, materialize, materialize_dyn, record_from_materialized,
    Fields, Flatten, FromMaterialized, Materialized, Source,
};
pub use record::{EnumValue, Enumeration, Lookup, Record};
pub use registry::{Registry, Serializable, RESERVED};
pub use structbind_codec as codec;
pub use structbind_codec::{Container, Value};
pub use structbind_macros::{Enumeration, Record};
