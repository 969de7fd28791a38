//! Fingerprint-keyed artifact cache shared across edit sessions.
//!
//! Entries are trusted for a fixed freshness window; after that a lookup
//! treats them as absent without deleting them. Physical removal happens only
//! through capacity eviction (oldest first) or [`ResultCache::invalidate_all`]
//! on section-order changes.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::compiler::{OutputFormat, RenderedDocument};
use crate::fingerprint::Fingerprint;

#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<DashMap<Fingerprint, CacheEntry>>,
    freshness_window: Duration,
    capacity: usize,
}

#[derive(Clone)]
struct CacheEntry {
    document: RenderedDocument,
    produced_at: Instant,
}

impl ResultCache {
    pub fn new(freshness_window: Duration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            freshness_window,
            capacity,
        }
    }

    /// Returns a fresh artifact of the requested format, if one exists.
    /// Stale entries read as absent but stay resident.
    pub fn lookup(
        &self,
        fingerprint: &Fingerprint,
        format: OutputFormat,
    ) -> Option<RenderedDocument> {
        let entry = self.entries.get(fingerprint)?;
        if entry.document.format != format {
            return None;
        }
        if entry.produced_at.elapsed() > self.freshness_window {
            trace!(%fingerprint, "cache entry past freshness window");
            return None;
        }
        Some(entry.document.clone())
    }

    pub fn put(&self, fingerprint: Fingerprint, document: RenderedDocument) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                document,
                produced_at: Instant::now(),
            },
        );
        self.evict_over_capacity();
    }

    /// Drops every entry. Section reordering changes what any fingerprint
    /// means visually, so the whole cache goes at once.
    pub fn invalidate_all(&self) {
        let evicted = self.entries.len();
        self.entries.clear();
        debug!(evicted, "result cache invalidated");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_over_capacity(&self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().produced_at)
                .map(|entry| *entry.key());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    trace!(fingerprint = %key, "evicted oldest cache entry");
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::models::ResumeSnapshot;
    use bytes::Bytes;

    const WINDOW: Duration = Duration::from_secs(5 * 60);

    fn fp(tag: &str) -> Fingerprint {
        let mut snapshot = ResumeSnapshot::default();
        snapshot.name = tag.to_string();
        fingerprint(&snapshot)
    }

    fn make_document(format: OutputFormat) -> RenderedDocument {
        RenderedDocument::new(format, Bytes::from_static(b"%PDF-1.4 stub"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_round_trips() {
        let cache = ResultCache::new(WINDOW, 32);
        let key = fp("a");
        cache.put(key, make_document(OutputFormat::Pdf));

        let hit = cache.lookup(&key, OutputFormat::Pdf);
        assert!(hit.is_some(), "entry inside the window should be served");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_reads_absent_but_stays_resident() {
        let cache = ResultCache::new(WINDOW, 32);
        let key = fp("a");
        cache.put(key, make_document(OutputFormat::Pdf));

        tokio::time::advance(WINDOW + Duration::from_secs(1)).await;

        assert!(cache.lookup(&key, OutputFormat::Pdf).is_none());
        assert_eq!(cache.len(), 1, "staleness must not delete the entry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_is_format_checked() {
        let cache = ResultCache::new(WINDOW, 32);
        let key = fp("a");
        cache.put(key, make_document(OutputFormat::Pdf));

        assert!(cache.lookup(&key, OutputFormat::Source).is_none());
        assert!(cache.lookup(&key, OutputFormat::Pdf).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_and_refreshes() {
        let cache = ResultCache::new(WINDOW, 32);
        let key = fp("a");
        cache.put(key, make_document(OutputFormat::Pdf));

        tokio::time::advance(WINDOW - Duration::from_secs(1)).await;
        cache.put(key, make_document(OutputFormat::Pdf));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(
            cache.lookup(&key, OutputFormat::Pdf).is_some(),
            "overwrite should restart the freshness clock"
        );
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all_clears_everything() {
        let cache = ResultCache::new(WINDOW, 32);
        cache.put(fp("a"), make_document(OutputFormat::Pdf));
        cache.put(fp("b"), make_document(OutputFormat::Pdf));

        cache.invalidate_all();

        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_the_oldest_entry() {
        let cache = ResultCache::new(WINDOW, 2);
        let first = fp("a");
        cache.put(first, make_document(OutputFormat::Pdf));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(fp("b"), make_document(OutputFormat::Pdf));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(fp("c"), make_document(OutputFormat::Pdf));

        assert_eq!(cache.len(), 2);
        assert!(
            cache.lookup(&first, OutputFormat::Pdf).is_none(),
            "oldest entry should be the one evicted"
        );
        assert!(cache.lookup(&fp("b"), OutputFormat::Pdf).is_some());
        assert!(cache.lookup(&fp("c"), OutputFormat::Pdf).is_some());
    }
}
