use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

/// Running requests keyed by request id, each with the token that cancels
/// it.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_generation: AtomicU64,
    active: Mutex<HashMap<String, (u64, CancellationToken)>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `request_id` until the returned guard is dropped.
    pub fn register(&self, request_id: &str) -> Registration {
        let token = CancellationToken::new();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .insert(request_id.to_string(), (generation, token.clone()));
        Registration {
            registry: self.clone(),
            request_id: request_id.to_string(),
            generation,
            token,
        }
    }

    /// Cancels a running request. Unknown or finished ids return false.
    pub fn cancel(&self, request_id: &str) -> bool {
        match self.lock().get(request_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.lock().contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (u64, CancellationToken)>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Keeps a request in the registry; dropping it removes the entry.
#[derive(Debug)]
pub struct Registration {
    registry: ProcessRegistry,
    request_id: String,
    generation: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut active = self.registry.lock();
        // A later request reusing the id owns the entry now.
        if active
            .get(&self.request_id)
            .is_some_and(|(generation, _)| *generation == self.generation)
        {
            active.remove(&self.request_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_registered_token() {
        let registry = ProcessRegistry::new();
        let registration = registry.register("r1");
        assert!(registry.cancel("r1"));
        assert!(registration.token().is_cancelled());
    }

    #[test]
    fn dropping_registration_removes_entry() {
        let registry = ProcessRegistry::new();
        let registration = registry.register("r1");
        assert!(registry.contains("r1"));
        drop(registration);
        assert!(registry.is_empty());
        assert!(!registry.cancel("r1"));
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let registry = ProcessRegistry::new();
        let registration = registry.register("r1");
        assert!(!registry.cancel("r2"));
        assert!(!registration.token().is_cancelled());
    }

    #[test]
    fn stale_registration_does_not_evict_newer_one() {
        let registry = ProcessRegistry::new();
        let first = registry.register("r1");
        let second = registry.register("r1");
        drop(first);
        assert!(registry.contains("r1"));
        assert!(registry.cancel("r1"));
        assert!(second.token().is_cancelled());
    }
}
