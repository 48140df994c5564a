use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResolverError;
use crate::Resolver;

/// Maps the string tag carried per-chain in configuration to a resolver
/// instance.
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: impl Into<String>, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(tag.into(), resolver);
    }

    pub fn get(&self, tag: &str) -> Result<Arc<dyn Resolver>, ResolverError> {
        self.resolvers
            .get(tag)
            .cloned()
            .ok_or_else(|| ResolverError::UnknownTag { tag: tag.to_string() })
    }
}

/// A registry pre-populated with the built-in [`DefaultResolver`],
/// [`ArbitrumResolver`], and [`OpStackResolver`] under their canonical tags.
impl ResolverRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::DEFAULT_RESOLVER_TAG, Arc::new(crate::DefaultResolver));
        registry.register(crate::ARBITRUM_RESOLVER_TAG, Arc::new(crate::ArbitrumResolver));
        registry.register(crate::OP_STACK_RESOLVER_TAG, Arc::new(crate::OpStackResolver));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_resolves_all_canonical_tags() {
        let registry = ResolverRegistry::with_builtins();
        assert!(registry.get(crate::DEFAULT_RESOLVER_TAG).is_ok());
        assert!(registry.get(crate::ARBITRUM_RESOLVER_TAG).is_ok());
        assert!(registry.get(crate::OP_STACK_RESOLVER_TAG).is_ok());
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let registry = ResolverRegistry::with_builtins();
        assert!(registry.get("unknown").is_err());
    }
}
