use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::handlers::HashHandler;
use crate::policy::EffectiveOptions;

/// A handler bound to the policy options of one `(scheme, category)`
#[derive(Debug)]
pub struct ResolvedScheme {
    pub handler: Arc<dyn HashHandler>,
    pub options: EffectiveOptions,
    pub deprecated: bool,
}

type CacheKey = (String, Option<String>);

/// Memoized scheme resolutions for one policy
///
/// Resolution is a pure function of the policy and registry, so concurrent
/// misses may both compute and the last insert wins.
#[derive(Debug, Default)]
pub struct SchemeCache {
    entries: RwLock<HashMap<CacheKey, Arc<ResolvedScheme>>>,
}

impl SchemeCache {
    pub fn get(&self, scheme: &str, category: Option<&str>) -> Option<Arc<ResolvedScheme>> {
        self.entries
            .read()
            .get(&(scheme.to_string(), category.map(str::to_string)))
            .cloned()
    }

    pub fn insert(
        &self,
        scheme: &str,
        category: Option<&str>,
        resolved: ResolvedScheme,
    ) -> Arc<ResolvedScheme> {
        let resolved = Arc::new(resolved);
        self.entries.write().insert(
            (scheme.to_string(), category.map(str::to_string)),
            Arc::clone(&resolved),
        );
        resolved
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
