//! Seekable input streams and parse/build contexts.

use crate::{util::at_least, Container, Error, Value};
use bytes::Buf;

/// A cursor over borrowed input.
///
/// Unlike a plain [Buf], a [Stream] can report and restore its position, which union nodes need
/// to parse every alternative from the same origin. Inside a bitwise node, every unit of the
/// stream is a single bit (stored as a `0` or `1` byte).
#[derive(Clone, Debug)]
pub struct Stream<'a> {
    data: &'a [u8],
    pos: usize,
    reach: usize,
}

impl<'a> Stream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            reach: 0,
        }
    }

    /// Current position, in stream units.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Moves to an absolute position.
    pub fn seek(&mut self, pos: usize) -> Result<(), Error> {
        if pos > self.data.len() {
            return Err(Error::EndOfBuffer);
        }
        self.pos = pos;
        Ok(())
    }

    /// Consumes exactly `len` units.
    pub fn read_units(&mut self, len: usize) -> Result<&'a [u8], Error> {
        at_least(self, len)?;
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        self.reach = self.reach.max(self.pos);
        Ok(out)
    }

    /// Furthest position consumed so far, including input later rewound with [Stream::seek].
    pub fn reach(&self) -> usize {
        self.reach
    }

    /// The unconsumed input, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

impl Buf for Stream<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn chunk(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.remaining(), "advance past end of stream");
        self.pos += cnt;
        self.reach = self.reach.max(self.pos);
    }
}

/// Name scope visible to expressions while parsing or building.
///
/// Each struct-like node opens a child scope; already processed sibling fields are visible by
/// name, the enclosing scope is reachable as `_` and the outermost one as `_root`.
#[derive(Debug, Default)]
pub struct Context<'a> {
    values: Container,
    parent: Option<&'a Context<'a>>,
}

impl Context<'static> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a> Context<'a> {
    pub fn child(parent: &'a Context<'a>) -> Self {
        Self {
            values: Container::new(),
            parent: Some(parent),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key, value);
    }

    /// Copies every entry of `container` into this scope.
    pub fn extend(&mut self, container: &Container) {
        for (k, v) in container.iter() {
            self.values.insert(k, v.clone());
        }
    }

    /// Looks up a name in this scope only.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn parent(&self) -> Option<&'a Context<'a>> {
        self.parent
    }

    pub fn root(&self) -> &Context<'a> {
        let mut current: &Context<'a> = self;
        while let Some(parent) = current.parent {
            current = parent;
        }
        current
    }

    /// Resolves a dotted path such as `width`, `header.length` or `_._root.count`.
    pub fn resolve(&self, path: &str) -> Result<Value, Error> {
        let unknown = || Error::UnknownPath(path.to_string());
        let mut scope: &Context<'a> = self;
        let mut current: Option<&Value> = None;
        for segment in path.split('.') {
            current = match current {
                None => match segment {
                    "_" => {
                        scope = scope.parent.ok_or_else(unknown)?;
                        None
                    }
                    "_root" => {
                        scope = scope.root();
                        None
                    }
                    key => Some(scope.get(key).ok_or_else(unknown)?),
                },
                Some(value) => {
                    let map = value.as_map().ok_or_else(unknown)?;
                    Some(map.get(segment).ok_or_else(unknown)?)
                }
            };
        }
        current.cloned().ok_or_else(unknown)
    }
}
