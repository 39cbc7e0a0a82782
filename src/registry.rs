//! The adapter catalogue: descriptors, per-category enablement, and lookup.
//!
//! Grounded on spec.md §4.1/§8's registry semantics (one enabled provider
//! per category, auto-enable when a category has exactly one provider) and
//! on the teacher crate's `config::registry` module for the shape of a
//! process-wide catalogue — generalized here from a write-once-at-import
//! `Mutex<Vec<_>>` into an explicit, owned `Registry` value per the Design
//! Notes' "no hidden module-level mutation" strategy.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::AcbError;

/// Maturity of an adapter implementation. Metadata only — the registry
/// does not enforce any transition between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    Experimental,
    Alpha,
    Beta,
    Stable,
    Deprecated,
}

/// Immutable record identifying one concrete adapter implementation.
///
/// Created once by the adapter module (conventionally via a `descriptor()`
/// constructor function) and handed to [`Registry::register`] during
/// bootstrap discovery. Never mutated after registration.
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    pub uuid: Uuid,
    pub name: String,
    pub category: String,
    pub provider: String,
    pub version: semver::Version,
    pub minimum_core_version: semver::Version,
    pub status: AdapterStatus,
    pub capabilities: Vec<String>,
    pub required_packages: Vec<String>,
    pub settings_class: String,
    pub example_config: serde_yaml::Value,
}

impl AdapterDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: Uuid,
        name: impl Into<String>,
        category: impl Into<String>,
        provider: impl Into<String>,
        version: semver::Version,
        minimum_core_version: semver::Version,
        status: AdapterStatus,
    ) -> Self {
        Self {
            uuid,
            name: name.into(),
            category: category.into(),
            provider: provider.into(),
            version,
            minimum_core_version,
            status,
            capabilities: Vec::new(),
            required_packages: Vec::new(),
            settings_class: String::new(),
            example_config: serde_yaml::Value::Null,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_packages(mut self, packages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_settings_class(mut self, settings_class: impl Into<String>) -> Self {
        self.settings_class = settings_class.into();
        self
    }

    pub fn with_example_config(mut self, example_config: serde_yaml::Value) -> Self {
        self.example_config = example_config;
        self
    }
}

struct RegistryEntry {
    descriptor: AdapterDescriptor,
    enabled: bool,
}

#[derive(Default)]
struct RegistryState {
    /// Insertion order, keyed by uuid, so `iter()` can enumerate in
    /// registration order even after hot-reload overwrites.
    order: Vec<Uuid>,
    entries: HashMap<Uuid, RegistryEntry>,
}

/// The adapter catalogue. Read by every other component; mutated only
/// during startup discovery and explicit `enable` calls.
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Idempotent by UUID: a later registration
    /// with the same UUID overwrites the existing entry (supports
    /// hot-reload in development) without touching its `enabled` flag
    /// unless the entry is brand new, in which case it starts disabled.
    pub fn register(&self, descriptor: AdapterDescriptor) {
        let mut state = self.state.write().unwrap();
        let uuid = descriptor.uuid;
        if let Some(existing) = state.entries.get_mut(&uuid) {
            tracing::debug!(
                category = %descriptor.category,
                provider = %descriptor.provider,
                %uuid,
                "re-registering adapter descriptor"
            );
            existing.descriptor = descriptor;
        } else {
            tracing::debug!(
                category = %descriptor.category,
                provider = %descriptor.provider,
                %uuid,
                "registering adapter descriptor"
            );
            state.order.push(uuid);
            state.entries.insert(
                uuid,
                RegistryEntry {
                    descriptor,
                    enabled: false,
                },
            );
        }
    }

    /// Mark exactly one (category, provider) entry enabled, disabling any
    /// previously enabled entry in the same category.
    pub fn enable(&self, category: &str, provider: Option<&str>) -> Result<(), AcbError> {
        let mut state = self.state.write().unwrap();

        let target_uuid = match provider {
            Some(provider) => state
                .order
                .iter()
                .find(|uuid| {
                    let e = &state.entries[*uuid];
                    e.descriptor.category == category && e.descriptor.provider == provider
                })
                .copied()
                .ok_or_else(|| AcbError::NoSuchAdapter {
                    category: category.to_string(),
                    provider: provider.to_string(),
                })?,
            None => {
                let providers: Vec<Uuid> = state
                    .order
                    .iter()
                    .filter(|uuid| state.entries[*uuid].descriptor.category == category)
                    .copied()
                    .collect();
                match providers.len() {
                    0 => {
                        return Err(AcbError::NoSuchAdapter {
                            category: category.to_string(),
                            provider: String::new(),
                        })
                    }
                    1 => providers[0],
                    _ => {
                        let names = providers
                            .iter()
                            .map(|uuid| state.entries[uuid].descriptor.provider.clone())
                            .collect();
                        return Err(AcbError::CategoryAmbiguity {
                            category: category.to_string(),
                            providers: names,
                        });
                    }
                }
            }
        };

        for uuid in &state.order {
            if let Some(entry) = state.entries.get_mut(uuid) {
                if entry.descriptor.category == category {
                    entry.enabled = *uuid == target_uuid;
                }
            }
        }

        let enabled_provider = state.entries[&target_uuid].descriptor.provider.clone();
        tracing::debug!(category, provider = %enabled_provider, "adapter enabled for category");

        Ok(())
    }

    /// Return the enabled descriptor for `category`, auto-enabling the
    /// sole provider for the category when nothing has been explicitly
    /// enabled yet.
    pub fn resolve(&self, category: &str) -> Result<AdapterDescriptor, AcbError> {
        {
            let state = self.state.read().unwrap();
            if let Some(uuid) = state
                .order
                .iter()
                .find(|uuid| {
                    let e = &state.entries[*uuid];
                    e.descriptor.category == category && e.enabled
                })
            {
                return Ok(state.entries[uuid].descriptor.clone());
            }
        }

        // No explicit enablement. Distinguish "nothing registered for this
        // category" (NoAdapterEnabled, per spec §4.1/§8) from "more than
        // one provider and none preferred" (CategoryAmbiguity, raised by
        // `enable` below) before delegating the sole-provider auto-enable
        // case to `enable`.
        {
            let state = self.state.read().unwrap();
            let has_any = state
                .order
                .iter()
                .any(|uuid| state.entries[uuid].descriptor.category == category);
            if !has_any {
                return Err(AcbError::NoAdapterEnabled {
                    category: category.to_string(),
                });
            }
        }
        self.enable(category, None)?;

        let state = self.state.read().unwrap();
        state
            .order
            .iter()
            .find(|uuid| {
                let e = &state.entries[*uuid];
                e.descriptor.category == category && e.enabled
            })
            .map(|uuid| state.entries[uuid].descriptor.clone())
            .ok_or_else(|| AcbError::NoAdapterEnabled {
                category: category.to_string(),
            })
    }

    /// Enumerate registered descriptors in insertion order, optionally
    /// filtered by category.
    pub fn iter(&self, category: Option<&str>) -> Vec<AdapterDescriptor> {
        let state = self.state.read().unwrap();
        state
            .order
            .iter()
            .filter_map(|uuid| state.entries.get(uuid))
            .filter(|e| category.map_or(true, |c| e.descriptor.category == c))
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Apply an `{category: provider}` enablement map, such as the one
    /// loaded from `settings/adapters.yaml`.
    pub fn discover(
        &self,
        descriptors: impl IntoIterator<Item = AdapterDescriptor>,
        enablement: &HashMap<String, String>,
    ) -> Result<(), AcbError> {
        for descriptor in descriptors {
            self.register(descriptor);
        }
        for (category, provider) in enablement {
            self.enable(category, Some(provider))?;
        }
        Ok(())
    }
}
