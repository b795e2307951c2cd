//! Handler registry keyed by source type tag

use std::collections::HashMap;
use std::sync::Arc;

use super::SourceHandler;
use crate::{Error, Result};

/// Maps source `type` tags to handlers.
///
/// Built once at start-up and passed by reference to the engine.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn SourceHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous handler for `tag`.
    pub fn register(&mut self, tag: impl Into<String>, handler: Arc<dyn SourceHandler>) {
        let tag = tag.into();
        if self.handlers.insert(tag.clone(), handler).is_some() {
            tracing::debug!(tag = %tag, "Replaced source handler");
        }
    }

    /// Look up the handler for `tag`.
    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn SourceHandler>> {
        self.handlers
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::UnknownHandler {
                tag: tag.to_string(),
            })
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// All registered tags (sorted).
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
