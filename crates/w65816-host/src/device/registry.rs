//! Device-kind registry: reconstructs devices from save-state `params`.
//!
//! Generalizes `rustynes_mappers::create_mapper`'s match-on-mapper-number
//! factory function to a string-keyed, open-ended table — devices are a
//! host-crate concept here, not a fixed, enumerable set like NES mapper
//! chips.

use std::collections::HashMap;

use super::{ram, rom, uart, Device};
use crate::save_state::SaveStateError;

/// Constructs a boxed [`Device`] from its save-state `params` value.
pub type DeviceFactory = fn(&serde_json::Value) -> Result<Box<dyn Device>, SaveStateError>;

/// A string-keyed table of device constructors, used when loading a save
/// state to turn each `{type, params}` record back into a live device.
pub struct Registry {
    factories: HashMap<&'static str, DeviceFactory>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Registry { factories: HashMap::new() }
    }

    /// The built-in registry: `"ram"`, `"rom"`, `"uart"`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        registry.insert("ram", ram::from_params as DeviceFactory);
        registry.insert("rom", rom::from_params as DeviceFactory);
        registry.insert("uart", uart::from_params as DeviceFactory);
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn insert(&mut self, kind: &'static str, factory: DeviceFactory) {
        self.factories.insert(kind, factory);
    }

    /// Construct a device of `kind` from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError::UnknownDeviceKind`] if `kind` is not
    /// registered, or whatever the constructor itself returns for malformed
    /// `params`.
    pub fn construct(&self, kind: &str, params: &serde_json::Value) -> Result<Box<dyn Device>, SaveStateError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| SaveStateError::UnknownDeviceKind(kind.to_string()))?;
        factory(params)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_builtins()
    }
}
