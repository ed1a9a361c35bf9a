use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Summary of a single [`KvStore::sweep`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub values_evicted: usize,
    pub counters_evicted: usize,
}

/// TTL-keyed values and counters, the engine's only notion of shared state
/// besides the rule list and audit log.
///
/// Two independent namespaces share nothing but the locking discipline: one
/// `Mutex<HashMap<..>>` per namespace. Expiry is lazy: every accessor
/// re-checks liveness itself, so [`KvStore::sweep`] is a convenience for
/// bounding memory in long-lived processes, never required for correctness.
pub struct KvStore {
    values: Mutex<HashMap<String, (String, Instant)>>,
    counters: Mutex<HashMap<String, (u64, Instant)>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Sets `key` to `value` iff no live entry already exists. Returns
    /// `false` when a live entry was found (the caller should treat this as
    /// a duplicate signal).
    pub fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut guard = self.values.lock().expect("kv values lock poisoned");
        if let Some((_, expire_at)) = guard.get(key) {
            if *expire_at > now {
                return false;
            }
        }
        guard.insert(key.to_string(), (value.to_string(), now + ttl));
        true
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let guard = self.values.lock().expect("kv values lock poisoned");
        guard
            .get(key)
            .filter(|(_, expire_at)| *expire_at > now)
            .map(|(value, _)| value.clone())
    }

    /// Increments `key`'s counter, returning the new count. TTL is stamped
    /// only on the first increment of a window and does not slide on
    /// subsequent hits: this is what makes "N events per hour" mean a fixed
    /// rolling-from-first-event window rather than an indefinitely-renewed
    /// one.
    pub fn incr(&self, key: &str, ttl: Duration) -> u64 {
        let now = Instant::now();
        let mut guard = self.counters.lock().expect("kv counters lock poisoned");
        match guard.get(key) {
            Some((count, expire_at)) if *expire_at > now => {
                let new_count = count + 1;
                let expire_at = *expire_at;
                guard.insert(key.to_string(), (new_count, expire_at));
                new_count
            }
            _ => {
                guard.insert(key.to_string(), (1, now + ttl));
                1
            }
        }
    }

    pub fn get_count(&self, key: &str) -> u64 {
        let now = Instant::now();
        let guard = self.counters.lock().expect("kv counters lock poisoned");
        guard
            .get(key)
            .filter(|(_, expire_at)| *expire_at > now)
            .map(|(count, _)| *count)
            .unwrap_or(0)
    }

    /// Drops every dead entry from both namespaces. Never required for
    /// correctness; bounds memory for processes that run long enough to
    /// accumulate many expired keys no one has touched since.
    pub fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let mut report = SweepReport::default();

        let mut values = self.values.lock().expect("kv values lock poisoned");
        let before = values.len();
        values.retain(|_, (_, expire_at)| *expire_at > now);
        report.values_evicted = before - values.len();
        drop(values);

        let mut counters = self.counters.lock().expect("kv counters lock poisoned");
        let before = counters.len();
        counters.retain(|_, (_, expire_at)| *expire_at > now);
        report.counters_evicted = before - counters.len();

        report
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}
