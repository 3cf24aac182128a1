//! Derive record bindings and trace tests with procedural macros.

pub use structbind_macros_impl::{test_traced, Enumeration, Record};

// Hidden from docs because these are needed for the proc macros to use 3rd
// party crates.
#[doc(hidden)]
pub use ::tracing;
#[doc(hidden)]
pub use ::tracing_subscriber;
