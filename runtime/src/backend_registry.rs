//! Backend factory registry.
//!
//! Backends are requested by a device string of the form `DEVICE` or
//! `DEVICE:CONFIG`. The device type selects the factory; everything after the
//! first `:` is handed to the factory as the configuration.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::Backend;
use crate::devices::cpu::CpuBackend;
use crate::error::{Result, UnknownBackendSnafu};

/// Factory creating a backend from the configuration suffix of a device string.
pub type BackendFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn Backend>> + Send + Sync>;

/// Registry of backend factories keyed by device type.
///
/// Every `create` call builds a fresh backend, so each caller owns its own
/// compile cache and allocator slot.
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, BackendFactory>>,
}

impl BackendRegistry {
    /// Create a registry with the built-in backends registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_factory(
            CpuBackend::NAME,
            Arc::new(|configuration| Ok(Arc::new(CpuBackend::new(configuration)) as Arc<dyn Backend>)),
        );
        registry
    }

    /// Create a registry with no factories.
    pub fn empty() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// Register a factory for a device type.
    ///
    /// The device type is case-insensitive. Registering the same type again
    /// replaces the previous factory.
    pub fn register_factory(&self, device_type: &str, factory: BackendFactory) {
        self.factories.write().insert(device_type.to_uppercase(), factory);
    }

    /// Create a backend for `device`, e.g. `"CPU"` or `"CPU:threads=4"`.
    pub fn create(&self, device: &str) -> Result<Arc<dyn Backend>> {
        let (device_type, configuration) = device.split_once(':').unwrap_or((device, ""));
        let factory = self
            .factories
            .read()
            .get(&device_type.to_uppercase())
            .cloned()
            .ok_or_else(|| UnknownBackendSnafu { device: device_type }.build())?;

        debug!(device = device_type, configuration, "creating backend");
        factory(configuration)
    }

    /// Registered device types, sorted.
    pub fn registered_devices(&self) -> Vec<String> {
        let mut devices: Vec<_> = self.factories.read().keys().cloned().collect();
        devices.sort();
        devices
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global backend registry, with built-in backends registered on first access.
pub static BACKENDS: Lazy<BackendRegistry> = Lazy::new(BackendRegistry::new);
