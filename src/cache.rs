//! Per-page-view memoization of converted coverage.
//!
//! Entries live as long as the page view that owns the cache. There is no
//! eviction and no invalidation: a page view rarely sees more than one
//! reference, and a reload starts from an empty cache.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CoverageReference, Overlay};

#[derive(Debug, Default)]
pub struct CoverageCache {
    entries: HashMap<CoverageReference, Arc<Overlay>>,
}

impl CoverageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored overlay, shared rather than copied.
    pub fn get(&self, reference: &CoverageReference) -> Option<Arc<Overlay>> {
        self.entries.get(reference).cloned()
    }

    /// Store an overlay, replacing any previous entry, and return the shared
    /// handle that later `get`s will hand out.
    pub fn put(&mut self, reference: CoverageReference, overlay: Overlay) -> Arc<Overlay> {
        let overlay = Arc::new(overlay);
        self.entries.insert(reference, Arc::clone(&overlay));
        overlay
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
