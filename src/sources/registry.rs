// Registered upstream providers and the default fallback order

use super::http::{build_client, HttpProvider};
use super::provider::Provider;
use crate::config::SourcesConfig;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_order: Vec<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .field("default_order", &self.default_order)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(default_order: Vec<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_order,
        }
    }

    /// HTTP providers for every configured source.
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        let client = build_client(Duration::from_millis(config.timeout_ms))?;
        let mut registry = Self::new(config.default_order.clone());

        for provider in &config.providers {
            registry.register(Arc::new(HttpProvider::new(provider, client.clone())));
        }

        for name in &registry.default_order {
            if !registry.providers.contains_key(name) {
                warn!(source = %name, "Default source order names an unregistered source");
            }
        }

        info!(
            providers = registry.providers.len(),
            default_order = ?registry.default_order,
            "Source providers registered"
        );
        Ok(registry)
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    pub fn default_order(&self) -> &[String] {
        &self.default_order
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
