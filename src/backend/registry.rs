//! Named backend registry

use std::collections::HashMap;
use std::sync::Arc;

use super::{CloningBackend, RenderBackend};

/// Render and cloning backends keyed by name
///
/// Render backends keep their registration order, which is the fallback
/// selection order when no priority list is configured.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    renderers: Vec<Arc<dyn RenderBackend>>,
    cloners: HashMap<String, Arc<dyn CloningBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a render backend, replacing any backend with the same name
    pub fn register_renderer(&mut self, backend: Arc<dyn RenderBackend>) {
        let name = backend.name().to_string();
        if let Some(existing) = self.renderers.iter_mut().find(|b| b.name() == name) {
            tracing::debug!(backend = %name, "replacing render backend");
            *existing = backend;
        } else {
            tracing::debug!(backend = %name, "registered render backend");
            self.renderers.push(backend);
        }
    }

    /// Register a cloning backend, replacing any backend with the same name
    pub fn register_cloner(&mut self, backend: Arc<dyn CloningBackend>) {
        let name = backend.name().to_string();
        tracing::debug!(backend = %name, "registered cloning backend");
        self.cloners.insert(name, backend);
    }

    /// Builder-style `register_renderer`
    #[must_use]
    pub fn with_renderer(mut self, backend: Arc<dyn RenderBackend>) -> Self {
        self.register_renderer(backend);
        self
    }

    /// Builder-style `register_cloner`
    #[must_use]
    pub fn with_cloner(mut self, backend: Arc<dyn CloningBackend>) -> Self {
        self.register_cloner(backend);
        self
    }

    /// Look up a render backend by name
    #[must_use]
    pub fn renderer(&self, name: &str) -> Option<Arc<dyn RenderBackend>> {
        self.renderers.iter().find(|b| b.name() == name).cloned()
    }

    /// Look up a cloning backend by name
    #[must_use]
    pub fn cloner(&self, name: &str) -> Option<Arc<dyn CloningBackend>> {
        self.cloners.get(name).cloned()
    }

    /// Render backends in registration order
    pub fn renderers(&self) -> impl Iterator<Item = &Arc<dyn RenderBackend>> {
        self.renderers.iter()
    }

    /// Names of render backends in registration order
    #[must_use]
    pub fn renderer_names(&self) -> Vec<String> {
        self.renderers.iter().map(|b| b.name().to_string()).collect()
    }

    /// Render backends ordered by `priority`, then the rest in registration order
    ///
    /// Unknown names in `priority` are ignored.
    #[must_use]
    pub fn ordered(&self, priority: &[String]) -> Vec<Arc<dyn RenderBackend>> {
        let mut ordered: Vec<Arc<dyn RenderBackend>> =
            priority.iter().filter_map(|name| self.renderer(name)).collect();
        for backend in &self.renderers {
            if !ordered.iter().any(|b| b.name() == backend.name()) {
                ordered.push(Arc::clone(backend));
            }
        }
        ordered
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut cloners: Vec<&String> = self.cloners.keys().collect();
        cloners.sort();
        f.debug_struct("BackendRegistry")
            .field("renderers", &self.renderer_names())
            .field("cloners", &cloners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::BoxError;
    use crate::backend::SystemVoiceCatalog;

    struct Named(&'static str);

    impl SystemVoiceCatalog for Named {}

    #[async_trait]
    impl RenderBackend for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn render(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, BoxError> {
            Ok(Vec::new())
        }
    }

    fn names(backends: &[Arc<dyn RenderBackend>]) -> Vec<&str> {
        backends.iter().map(|b| b.name()).collect()
    }

    #[test]
    fn test_priority_order_then_registration_order() {
        let registry = BackendRegistry::new()
            .with_renderer(Arc::new(Named("say")))
            .with_renderer(Arc::new(Named("openai")))
            .with_renderer(Arc::new(Named("elevenlabs")));

        let ordered = registry.ordered(&["elevenlabs".to_string(), "missing".to_string()]);
        assert_eq!(names(&ordered), ["elevenlabs", "say", "openai"]);
        assert_eq!(names(&registry.ordered(&[])), ["say", "openai", "elevenlabs"]);
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let mut registry = BackendRegistry::new()
            .with_renderer(Arc::new(Named("say")))
            .with_renderer(Arc::new(Named("openai")));
        registry.register_renderer(Arc::new(Named("say")));

        assert_eq!(registry.renderer_names(), ["say", "openai"]);
        assert!(registry.renderer("openai").is_some());
        assert!(registry.cloner("openai").is_none());
    }
}
