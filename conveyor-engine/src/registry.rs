//! Service registry
//!
//! Maps logical service names used by pipeline steps to base addresses.
//! Built once at startup and shared read-only with the engine.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid registry entry '{0}', expected name=url")]
    InvalidEntry(String),

    #[error("service '{name}' has invalid address '{address}', expected http:// or https://")]
    InvalidAddress { name: String, address: String },
}

#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous address
    pub fn register(
        &mut self,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let address = address.into();

        if !address.starts_with("http://") && !address.starts_with("https://") {
            return Err(RegistryError::InvalidAddress { name, address });
        }

        self.services
            .insert(name, address.trim_end_matches('/').to_string());
        Ok(())
    }

    pub fn with_service(
        mut self,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        self.register(name, address)?;
        Ok(self)
    }

    /// Parses `name=url,name=url`
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, address) = entry
                .split_once('=')
                .ok_or_else(|| RegistryError::InvalidEntry(entry.to_string()))?;

            let name = name.trim();
            if name.is_empty() {
                return Err(RegistryError::InvalidEntry(entry.to_string()));
            }

            registry.register(name, address.trim())?;
        }

        Ok(registry)
    }

    pub fn resolve(&self, service: &str) -> Option<&str> {
        self.services.get(service).map(String::as_str)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
