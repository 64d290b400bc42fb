//! Round-robin proxy rotation with per-proxy health tracking.
//!
//! Health records live in an index-addressed arena with a side table from
//! `(host, port)` to arena slot. Protocol and credentials are not part of the
//! key; a second descriptor with an already known `(host, port)` is ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use yfsession_types::{ProxyDescriptor, ProxyPoolConfig, ProxyStats};

#[derive(Debug, Clone)]
struct HealthRecord {
    descriptor: ProxyDescriptor,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    success_count: u64,
}

/// Ordered set of proxies with a rotation cursor.
#[derive(Debug)]
pub struct ProxyPool {
    records: Vec<HealthRecord>,
    slots: HashMap<(String, u16), usize>,
    cursor: usize,
    max_failures: u32,
    cooldown: Duration,
}

impl ProxyPool {
    /// Empty pool.
    #[must_use]
    pub fn new(max_failures: u32, cooldown: Duration) -> Self {
        Self {
            records: Vec::new(),
            slots: HashMap::new(),
            cursor: 0,
            max_failures,
            cooldown,
        }
    }

    /// Pool seeded from configuration, in configured order.
    #[must_use]
    pub fn from_config(cfg: &ProxyPoolConfig) -> Self {
        let mut pool = Self::new(cfg.max_failures, cfg.cooldown);
        for p in &cfg.proxies {
            pool.add(p.clone());
        }
        pool
    }

    /// Append a proxy. Returns `false` if its `(host, port)` is already present.
    pub fn add(&mut self, descriptor: ProxyDescriptor) -> bool {
        let key = descriptor.endpoint_key();
        if self.slots.contains_key(&key) {
            return false;
        }
        self.slots.insert(key, self.records.len());
        self.records.push(HealthRecord {
            descriptor,
            consecutive_failures: 0,
            last_failure: None,
            success_count: 0,
        });
        true
    }

    /// Parse a newline-separated list; blank and `#` lines and unparsable
    /// entries are skipped. Returns how many proxies were added.
    pub fn add_from_list(&mut self, text: &str) -> usize {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(ProxyDescriptor::parse)
            .filter(|d| self.add(d.clone()))
            .count()
    }

    fn is_healthy(&self, rec: &HealthRecord, now: Instant) -> bool {
        rec.consecutive_failures < self.max_failures
            || rec
                .last_failure
                .is_none_or(|t| now.saturating_duration_since(t) > self.cooldown)
    }

    /// Next healthy proxy in rotation order.
    ///
    /// A proxy whose cooldown has elapsed has its failure counter cleared when
    /// selected. If none is healthy, every counter is reset and the first
    /// proxy is returned.
    pub fn next(&mut self) -> Option<ProxyDescriptor> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        let now = Instant::now();
        for step in 0..len {
            let idx = (self.cursor + step) % len;
            if self.is_healthy(&self.records[idx], now) {
                let rec = &mut self.records[idx];
                if rec.consecutive_failures >= self.max_failures {
                    rec.consecutive_failures = 0;
                }
                self.cursor = (idx + 1) % len;
                return Some(rec.descriptor.clone());
            }
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(pool_size = len, "all proxies unhealthy; resetting pool health");

        for rec in &mut self.records {
            rec.consecutive_failures = 0;
        }
        self.cursor = 1 % len;
        Some(self.records[0].descriptor.clone())
    }

    fn slot_of(&self, descriptor: &ProxyDescriptor) -> Option<usize> {
        self.slots.get(&descriptor.endpoint_key()).copied()
    }

    /// Clear the failure counter and count a success.
    pub fn report_success(&mut self, descriptor: &ProxyDescriptor) {
        if let Some(i) = self.slot_of(descriptor) {
            let rec = &mut self.records[i];
            rec.consecutive_failures = 0;
            rec.success_count += 1;
        }
    }

    /// Count a failure and stamp its time.
    pub fn report_failure(&mut self, descriptor: &ProxyDescriptor) {
        if let Some(i) = self.slot_of(descriptor) {
            let rec = &mut self.records[i];
            rec.consecutive_failures = rec.consecutive_failures.saturating_add(1);
            rec.last_failure = Some(Instant::now());

            #[cfg(feature = "tracing")]
            if rec.consecutive_failures == self.max_failures {
                tracing::warn!(
                    proxy = %rec.descriptor.display_endpoint(),
                    failures = rec.consecutive_failures,
                    "proxy marked unhealthy"
                );
            }
        }
    }

    /// Proxies `next()` would currently consider.
    #[must_use]
    pub fn healthy_count(&self) -> usize {
        let now = Instant::now();
        self.records.iter().filter(|r| self.is_healthy(r, now)).count()
    }

    /// Snapshot of every health record in rotation order.
    #[must_use]
    pub fn stats(&self) -> Vec<ProxyStats> {
        let now = Instant::now();
        self.records
            .iter()
            .map(|r| ProxyStats {
                descriptor: r.descriptor.clone(),
                consecutive_failures: r.consecutive_failures,
                success_count: r.success_count,
                is_healthy: self.is_healthy(r, now),
            })
            .collect()
    }

    /// Drop a proxy. Returns `false` if it was not in the pool.
    pub fn remove(&mut self, descriptor: &ProxyDescriptor) -> bool {
        let Some(idx) = self.slot_of(descriptor) else {
            return false;
        };
        self.records.remove(idx);
        self.slots = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.descriptor.endpoint_key(), i))
            .collect();
        if self.cursor > idx {
            self.cursor -= 1;
        }
        if self.cursor >= self.records.len() {
            self.cursor = 0;
        }
        true
    }

    /// Remove every proxy.
    pub fn clear(&mut self) {
        self.records.clear();
        self.slots.clear();
        self.cursor = 0;
    }

    /// Number of proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the pool holds no proxies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
