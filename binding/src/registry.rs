//! Registration of records as binary-serializable types.

use crate::{Binding, Error, Record, RecordOptions};
use bytes::Bytes;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};
use structbind_codec::Codec;
use tracing::debug;

/// Field names taken by the facade (`parser`) and the raw tree (`struct`).
pub const RESERVED: [&str; 2] = ["parser", "struct"];

/// Registered bindings, keyed by record type.
#[derive(Default)]
pub struct Registry {
    bindings: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [Serializable].
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Registers `T` with the options it declares.
    pub fn register<T: Record>(&self) -> Result<Arc<Binding<T>>, Error> {
        self.register_with::<T>(T::options())
    }

    /// Registers `T` with explicit options.
    ///
    /// Fails before compiling anything if a field uses a reserved name, and fails if `T` is
    /// already registered here.
    pub fn register_with<T: Record>(&self, options: RecordOptions) -> Result<Arc<Binding<T>>, Error> {
        let schema = T::schema()?;
        if let Some(name) = RESERVED.iter().find(|name| schema.field(name).is_some()) {
            return Err(Error::NameCollision {
                name: name.to_string(),
                record: T::NAME,
            });
        }
        if self.contains::<T>() {
            return Err(Error::AlreadyRegistered(T::NAME));
        }

        let binding = Arc::new(Binding::<T>::new(options)?);
        let mut bindings = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if bindings.contains_key(&TypeId::of::<T>()) {
            return Err(Error::AlreadyRegistered(T::NAME));
        }
        bindings.insert(TypeId::of::<T>(), binding.clone());
        debug!(record = T::NAME, "registered record");
        Ok(binding)
    }

    pub fn contains<T: Record>(&self) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    pub fn binding<T: Record>(&self) -> Option<Arc<Binding<T>>> {
        let entry = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned()?;
        entry.downcast::<Binding<T>>().ok()
    }
}

/// Type-level access to a record's binding, registered on first use in [Registry::global].
pub trait Serializable: Record {
    /// The facade (the `parser` of the record).
    fn parser() -> Result<Arc<Binding<Self>>, Error> {
        let registry = Registry::global();
        if let Some(binding) = registry.binding::<Self>() {
            return Ok(binding);
        }
        match registry.register::<Self>() {
            Err(Error::AlreadyRegistered(_)) => registry
                .binding::<Self>()
                .ok_or(Error::AlreadyRegistered(Self::NAME)),
            result => result,
        }
    }

    /// The compiled tree (the `struct` of the record).
    fn structure() -> Result<Codec, Error> {
        Ok(Self::parser()?.structure().clone())
    }

    fn parse(data: &[u8]) -> Result<Self, Error> {
        Self::parser()?.parse(data)
    }

    fn build(&self) -> Result<Bytes, Error> {
        Self::parser()?.build(self)
    }
}

impl<T: Record> Serializable for T {}
