//! Per-server statistics registry with a retirement grace period.

use crate::server::ServerStats;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// How long a removed server's stats survive awaiting a re-add.
pub const DEFAULT_RETIREMENT_GRACE: Duration = Duration::from_secs(30);

struct Retired {
    stats: Arc<ServerStats>,
    retired_at: Instant,
}

/// Maps server ids to their shared [`ServerStats`].
///
/// When a list refresh drops a server, its stats move to a retirement
/// cache; a re-add within the grace window gets the history back, anything
/// older is discarded. This keeps a flapping registry entry from resetting
/// circuit state on every refresh.
pub struct StatsRegistry {
    window_secs: usize,
    sample_capacity: usize,
    grace: Duration,
    live: RwLock<HashMap<String, Arc<ServerStats>>>,
    retired: Mutex<HashMap<String, Retired>>,
}

impl std::fmt::Debug for StatsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRegistry")
            .field("window_secs", &self.window_secs)
            .field("sample_capacity", &self.sample_capacity)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl StatsRegistry {
    /// Create a registry; new stats get the given window width and
    /// reservoir size.
    #[must_use]
    pub fn new(window_secs: usize, sample_capacity: usize, grace: Duration) -> Self {
        Self {
            window_secs,
            sample_capacity,
            grace,
            live: RwLock::new(HashMap::new()),
            retired: Mutex::new(HashMap::new()),
        }
    }

    /// Stats for `id`, creating fresh ones on first sight.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Arc<ServerStats> {
        {
            let live = self.live.read().expect("stats lock poisoned");
            if let Some(stats) = live.get(id) {
                return Arc::clone(stats);
            }
        }

        let mut live = self.live.write().expect("stats lock poisoned");
        if let Some(stats) = live.get(id) {
            return Arc::clone(stats);
        }
        let stats = Arc::new(ServerStats::new(self.window_secs, self.sample_capacity));
        live.insert(id.to_string(), Arc::clone(&stats));
        stats
    }

    /// Align the registry with a refreshed id set: retire stats whose
    /// server vanished, revive retired stats whose server came back within
    /// the grace window (new servers start fresh), and purge anything
    /// retired longer than that.
    pub fn rekey(&self, now: Instant, current: &HashSet<String>) {
        let mut live = self.live.write().expect("stats lock poisoned");
        let mut retired = self.retired.lock().expect("retired lock poisoned");

        let gone: Vec<String> = live
            .keys()
            .filter(|id| !current.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            if let Some(stats) = live.remove(&id) {
                retired.insert(
                    id,
                    Retired {
                        stats,
                        retired_at: now,
                    },
                );
            }
        }

        for id in current {
            if live.contains_key(id) {
                continue;
            }
            let revived = retired.remove(id).and_then(|entry| {
                (now.saturating_duration_since(entry.retired_at) <= self.grace)
                    .then_some(entry.stats)
            });
            let stats = revived.unwrap_or_else(|| {
                Arc::new(ServerStats::new(self.window_secs, self.sample_capacity))
            });
            live.insert(id.clone(), stats);
        }

        retired.retain(|_, entry| now.saturating_duration_since(entry.retired_at) <= self.grace);
    }

    /// Snapshot of every live entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Arc<ServerStats>> {
        self.live.read().expect("stats lock poisoned").clone()
    }
}
