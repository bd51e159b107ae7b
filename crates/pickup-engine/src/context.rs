//! Read-only resolution context shared by every request.

use std::path::Path;
use std::sync::{Arc, RwLock};

use pickup_core::{ConfigError, Gazetteer, RulesConfig};
use pickup_nlp::{AddressDecomposer, AliasResolver, CrossRoadDetector, Normalizer};
use tracing::info;

/// Rules, gazetteer, and the text stages compiled from them.
///
/// Built once at startup. Requests hold an `Arc` snapshot and never write.
pub struct ResolverContext {
    pub rules: RulesConfig,
    pub gazetteer: Arc<Gazetteer>,
    pub normalizer: Normalizer,
    pub aliases: AliasResolver,
    pub crossroads: CrossRoadDetector,
    pub decomposer: AddressDecomposer,
}

impl ResolverContext {
    pub fn new(rules: RulesConfig, gazetteer: Gazetteer) -> Self {
        let gazetteer = Arc::new(gazetteer);
        Self {
            normalizer: Normalizer::new(&rules.normalize, gazetteer.clone()),
            aliases: AliasResolver::new(rules.alias_groups.clone()),
            crossroads: CrossRoadDetector::new(&rules.cross_road),
            decomposer: AddressDecomposer::new(&rules.decompose, gazetteer.clone()),
            gazetteer,
            rules,
        }
    }

    /// Bundled rules and gazetteer.
    pub fn bundled() -> Result<Self, ConfigError> {
        Ok(Self::new(RulesConfig::bundled()?, Gazetteer::bundled()?))
    }

    /// Bundled defaults, each overridable by a file.
    pub fn load(rules: Option<&Path>, gazetteer: Option<&Path>) -> Result<Self, ConfigError> {
        let rules = match rules {
            Some(path) => RulesConfig::load(path)?,
            None => RulesConfig::bundled()?,
        };
        let gazetteer = match gazetteer {
            Some(path) => Gazetteer::load(path)?,
            None => Gazetteer::bundled()?,
        };
        Ok(Self::new(rules, gazetteer))
    }
}

/// Holder for the current context; swapped out-of-band on reload.
pub struct SharedContext {
    current: RwLock<Arc<ResolverContext>>,
}

impl SharedContext {
    pub fn new(context: ResolverContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
        }
    }

    pub fn snapshot(&self) -> Arc<ResolverContext> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new context. In-flight requests keep their snapshot.
    pub fn replace(&self, context: ResolverContext) {
        let summary = context.rules.summary();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(context);
        info!(
            groups = summary.alias_groups,
            rules = summary.alias_rules,
            "resolver context replaced"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_replace() {
        let shared = SharedContext::new(ResolverContext::bundled().unwrap());
        let before = shared.snapshot();

        let mut rules = RulesConfig::bundled().unwrap();
        rules.search.limit = 3;
        shared.replace(ResolverContext::new(rules, Gazetteer::bundled().unwrap()));

        assert_eq!(before.rules.search.limit, 10);
        assert_eq!(shared.snapshot().rules.search.limit, 3);
    }
}
