//! Built-in constructs.

pub mod adapters;
pub mod bytes;
pub mod primitives;
pub mod repeat;
pub mod structs;
