use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderStats {
    /// Human readable name used to identify these stats when they are reported.
    pub tag: String,
    /// Number of `load` and `load_many` calls received by the worker.
    pub load_requests: u64,
    /// The total number of keys that were requested for loading (not necessarily unique).
    pub keys_requested: u64,
    /// The number of keys that were immediately answered from the request cache.
    pub cache_hits: u64,
    /// Number of dispatches that actually invoked the data source.
    pub dispatches: u64,
    /// The largest number of unique keys sent to the data source in a single dispatch.
    pub max_batch_size: u64,
    /// The total number of unique keys sent to the data source.
    pub keys_dispatched: u64,
    /// Keys whose load ended in an error of any kind.
    pub keys_failed: u64,
}

impl LoaderStats {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), ..Default::default() }
    }

    pub fn record_load_request(&mut self, keys_requested: usize) {
        self.load_requests += 1;
        self.keys_requested += keys_requested as u64;
    }

    pub fn record_cache_hits(&mut self, hits: usize) {
        self.cache_hits += hits as u64;
    }

    pub fn record_dispatch(&mut self, batch_size: usize) {
        self.dispatches += 1;
        self.keys_dispatched += batch_size as u64;
        self.max_batch_size = self.max_batch_size.max(batch_size as u64);
    }

    pub fn record_failures(&mut self, failed: usize) {
        self.keys_failed += failed as u64;
    }

    /// Mean number of unique keys per dispatch.
    pub fn average_batch_size(&self) -> f64 {
        if self.dispatches == 0 {
            return 0.0;
        }
        self.keys_dispatched as f64 / self.dispatches as f64
    }
}
