//! Parse and build binary formats from composable constructs.
//!
//! # Overview
//!
//! A construct is a node that knows how to parse a [Value] out of a [Stream] and how to build a
//! [Value] back into bytes. Leaves handle integers, floats, flags, bit fields, and byte strings.
//! Composites (structs, aligned structs, unions, bitwise wrappers, arrays, conditionals) combine
//! them into trees. Struct-like nodes expose already processed fields to later ones through a
//! [Context], so lengths and counts can be expressed with [this].
//!
//! # Example
//!
//! ```
//! use structbind_codec::{this, ConstructExt, Int, RawBytes, Struct, Value};
//!
//! let message = Struct::new()
//!     .field("len", Int::u8())
//!     .field("payload", RawBytes::new(this("len")));
//!
//! let parsed = message.parse_exact(&[3, b'a', b'b', b'c']).unwrap();
//! let map = parsed.as_map().unwrap();
//! assert_eq!(map.get("len"), Some(&Value::Int(3)));
//!
//! let built = message.build_bytes(&parsed).unwrap();
//! assert_eq!(&built[..], &[3, b'a', b'b', b'c']);
//! ```

pub mod construct;
pub mod error;
pub mod expr;
pub mod stream;
pub mod types;
pub mod util;
pub mod value;

pub use construct::{codec, shape, Codec, Construct, ConstructExt, Kind, Preset, Shape, Subcon};
pub use error::Error;
pub use expr::{this, Expr};
pub use stream::{Context, Stream};
pub use types::{
    adapters::{DefaultSource, Defaulted, Enum, ParsedHook, Renamed},
    bytes::{Const, GreedyBytes, Padding, RawBytes},
    primitives::{BitsInteger, Endian, Flag, Float, Int},
    repeat::{Array, If, PrefixedArray},
    structs::{AlignedStruct, Bitwise, Struct, Union},
};
pub use value::{Container, EnumInt, Value};
