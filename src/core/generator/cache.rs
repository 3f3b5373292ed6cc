//! Per-invocation memory shared by every machine of one run.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::core::types::GeneratorName;

/// Shared generators already executed in this invocation.
///
/// Created by the caller for one `generate` call and cleared explicitly;
/// nothing here outlives the run on its own.
#[derive(Debug, Default)]
pub struct RunCache {
    shared_generated: Mutex<BTreeSet<GeneratorName>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a shared generator already ran during this invocation.
    pub fn shared_generated(&self, generator: &str) -> bool {
        self.shared_generated.lock().contains(generator)
    }

    pub fn mark_shared_generated(&self, generator: &str) {
        self.shared_generated.lock().insert(generator.to_string());
    }

    pub fn clear(&self) {
        self.shared_generated.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_clear() {
        let cache = RunCache::new();
        assert!(!cache.shared_generated("ca"));
        cache.mark_shared_generated("ca");
        assert!(cache.shared_generated("ca"));
        cache.clear();
        assert!(!cache.shared_generated("ca"));
    }
}
