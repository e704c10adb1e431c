use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::ProxyError;
use crate::ids::{generate_proxy_id, id_key};

/// `pending` capacity (SEC-04, §4.9): once full, the next non-notification
/// request is refused rather than forwarded.
pub const MAX_PENDING: usize = 1024;

/// `recentUsed` capacity and TTL (§4.9): bounds memory and lets a consumed
/// ID eventually be forgotten.
pub const MAX_RECENT_USED: usize = 4096;
const RECENT_USED_TTL: Duration = Duration::from_secs(60);

/// Prune cadence for `recentUsed` — a hard contract (§9): never replace
/// this with a timer.
const PRUNE_EVERY: u64 = 256;

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub host_id: Value,
    pub method: String,
}

/// What happened when a child response's `id` was looked up.
#[derive(Debug)]
pub enum ResolveOutcome {
    Found(PendingEntry),
    Duplicate,
    Spoof,
}

struct RecentUsed {
    members: HashSet<String>,
    order: VecDeque<(String, Instant)>,
    insert_count: u64,
}

impl RecentUsed {
    fn new() -> Self {
        Self {
            members: HashSet::new(),
            order: VecDeque::new(),
            insert_count: 0,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    fn insert(&mut self, key: String) {
        if self.members.insert(key.clone()) {
            self.order.push_back((key, Instant::now()));
        }
        self.insert_count += 1;
        if self.insert_count % PRUNE_EVERY == 0 {
            self.prune_expired();
        }
        while self.order.len() > MAX_RECENT_USED {
            if let Some((oldest, _)) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    fn prune_expired(&mut self) {
        let now = Instant::now();
        while let Some((_, inserted_at)) = self.order.front() {
            if now.duration_since(*inserted_at) > RECENT_USED_TTL {
                let (key, _) = self.order.pop_front().expect("front just checked");
                self.members.remove(&key);
            } else {
                break;
            }
        }
    }
}

struct State {
    pending: HashMap<String, PendingEntry>,
    recent_used: RecentUsed,
}

/// Owns `pending` and `recentUsed` behind one mutex (§9 — a language with
/// ownership should wrap the pair in a single synchronized container). The
/// lock is held only across map lookup/insert/delete and RNG generation
/// attempts, never across I/O.
pub struct ResponseFilter {
    state: Mutex<State>,
}

impl Default for ResponseFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseFilter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: HashMap::new(),
                recent_used: RecentUsed::new(),
            }),
        }
    }

    /// Registers a new host request, generating a fresh `proxyID` (up to 3
    /// RNG retries to dodge a collision, §9). Fails closed with
    /// [`ProxyError::PendingFull`] once `pending` is at capacity — the
    /// caller must not forward the request in that case.
    pub fn register(&self, host_id: Value, method: String) -> Result<String, ProxyError> {
        let mut guard = self.state.lock().expect("response filter mutex poisoned");
        if guard.pending.len() >= MAX_PENDING {
            return Err(ProxyError::PendingFull);
        }

        let mut proxy_id = generate_proxy_id();
        let mut key = id_key(&Value::String(proxy_id.clone()));
        for _ in 0..2 {
            if !guard.pending.contains_key(&key) {
                break;
            }
            proxy_id = generate_proxy_id();
            key = id_key(&Value::String(proxy_id.clone()));
        }

        guard.pending.insert(key, PendingEntry { host_id, method });
        Ok(proxy_id)
    }

    /// Resolves a response `id` from the child against `pending`, falling
    /// back to `recentUsed` to detect a duplicate, or neither to detect a
    /// spoof (§4.9 steps 3-5).
    pub fn resolve(&self, child_id: &Value) -> ResolveOutcome {
        let key = id_key(child_id);
        let mut guard = self.state.lock().expect("response filter mutex poisoned");
        if let Some(entry) = guard.pending.remove(&key) {
            guard.recent_used.insert(key);
            return ResolveOutcome::Found(entry);
        }
        if guard.recent_used.contains(&key) {
            return ResolveOutcome::Duplicate;
        }
        ResolveOutcome::Spoof
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.state.lock().expect("response filter mutex poisoned").pending.len()
    }
}
