//! Domain Contract port (C7, §4.7, §9).
//!
//! Replaces the source's dynamic `domain(ctx)` dispatch with a single-method
//! interface plus a `(domain, botName)`-keyed registry, as §9 asks for.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::contract::{DomainContext, DomainResult};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain processing failed: {0}")]
    Internal(String),
}

/// Any business FSM the engine drives (§4.7). Implementations live in
/// domain packages, which are out of scope for this crate (§1).
#[async_trait]
pub trait DomainPort: Send + Sync {
    async fn process(&self, ctx: DomainContext) -> Result<DomainResult, DomainError>;
}

/// Registry keyed by `(domain, bot_name)` (§9), used by the composition
/// root to resolve which `DomainPort` instance serves a given call.
#[derive(Default)]
pub struct DomainRegistry {
    domains: std::collections::HashMap<(String, String), std::sync::Arc<dyn DomainPort>>,
}

impl DomainRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, domain: impl Into<String>, bot_name: impl Into<String>, handler: std::sync::Arc<dyn DomainPort>) {
        self.domains.insert((domain.into(), bot_name.into()), handler);
    }

    #[must_use]
    pub fn resolve(&self, domain: &str, bot_name: &str) -> Option<std::sync::Arc<dyn DomainPort>> {
        self.domains.get(&(domain.to_string(), bot_name.to_string())).cloned()
    }
}
