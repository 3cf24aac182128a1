//! Options controlling how a record compiles into a codec tree.

/// How the fields of a union record are overlaid.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnionMode {
    /// Parse every alternative and leave the stream at the union origin.
    FirstMatch,
    /// Parse every alternative and leave the stream after the named one.
    ParseFrom(String),
}

/// Composition options for a record.
///
/// Usually declared with `#[record(...)]` and returned by [crate::Record::options], but any
/// record can be compiled with explicit options through [crate::compile_record] or
/// [crate::Binding::new].
///
/// # Examples
///
/// ```
/// use structbind::{RecordOptions, UnionMode};
///
/// let options = RecordOptions::new().bitwise().depth(2);
/// assert!(options.bitwise);
/// assert_eq!(options.max_depth, Some(2));
///
/// let options = RecordOptions::new().union(UnionMode::ParseFrom("raw".into()));
/// assert!(options.union.is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecordOptions {
    /// Wrap the composed tree in a bit stream.
    pub bitwise: bool,

    /// Number of nested record boundaries to expand eagerly. `None` expands until a record
    /// refers back to one already being compiled.
    ///
    /// Deeper references are compiled on first use with the same inherited options, so this
    /// bounds compile work only and never changes the wire layout.
    pub max_depth: Option<usize>,

    /// Process fields in reverse declaration order.
    pub reverse: bool,

    /// Pad every field to a multiple of this many units.
    pub aligned: Option<usize>,

    /// Overlay the fields instead of laying them out in sequence.
    pub union: Option<UnionMode>,

    /// The record answers map-style lookups (see [crate::Lookup]).
    pub container: bool,
}

impl RecordOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bitwise(mut self) -> Self {
        self.bitwise = true;
        self
    }

    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn aligned(mut self, modulus: usize) -> Self {
        self.aligned = Some(modulus);
        self
    }

    pub fn union(mut self, mode: UnionMode) -> Self {
        self.union = Some(mode);
        self
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    /// Options a nested record inherits when expanded inside this one.
    pub(crate) fn nested(&self) -> Self {
        Self {
            max_depth: self.max_depth,
            reverse: self.reverse,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = RecordOptions::new()
            .bitwise()
            .depth(1)
            .reverse()
            .aligned(4)
            .container();
        assert!(options.bitwise);
        assert!(options.reverse);
        assert!(options.container);
        assert_eq!(options.max_depth, Some(1));
        assert_eq!(options.aligned, Some(4));
        assert_eq!(options.union, None);
    }

    #[test]
    fn test_nested_inherits_depth_and_order() {
        let options = RecordOptions::new()
            .bitwise()
            .depth(3)
            .reverse()
            .union(UnionMode::FirstMatch);
        let nested = options.nested();
        assert_eq!(nested.max_depth, Some(3));
        assert!(nested.reverse);
        assert!(!nested.bitwise);
        assert_eq!(nested.union, None);
    }
}
