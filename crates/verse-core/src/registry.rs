//! Plugin Registry
//!
//! Name-to-constructor mapping used to build environments, agents and
//! policies from the string keys found in task configuration.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RegistryError, VerseError};

/// Builds a `T` from its configuration `C`.
pub type Constructor<T, C> = fn(C) -> Result<T, VerseError>;

/// A named set of constructors keyed by string.
///
/// Populated once at startup through each module's `register` function and
/// read-only afterwards.
pub struct Registry<T, C> {
    name: String,
    entries: BTreeMap<String, Constructor<T, C>>,
}

impl<T, C> Registry<T, C> {
    /// Creates an empty registry labelled `name` (the label appears in errors).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `constructor` under `key`. Existing keys are never overwritten.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        constructor: Constructor<T, C>,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey {
                registry: self.name.clone(),
                key,
            });
        }
        self.entries.insert(key, constructor);
        Ok(())
    }

    /// Looks up the constructor registered under `key`.
    pub fn get(&self, key: &str) -> Result<Constructor<T, C>, RegistryError> {
        self.entries
            .get(key)
            .copied()
            .ok_or_else(|| RegistryError::UnknownKey {
                registry: self.name.clone(),
                key: key.to_string(),
            })
    }

    /// Looks up `key` and constructs an instance from `config`.
    pub fn create(&self, key: &str, config: C) -> Result<T, VerseError> {
        let constructor = self.get(key)?;
        constructor(config)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T, C> fmt::Debug for Registry<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
