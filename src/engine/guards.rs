/// In-process keyed coordination guards
///
/// Replaces ad-hoc boolean maps with a registry of tagged per-key states.
/// Acquisition is atomic under one lock: the second of two concurrent
/// acquirers for the same key observes `InFlight` and backs off, which is
/// the whole duplicate-suppression mechanism. Guards only protect against
/// races within this process - two horizontally scaled replicas can still
/// double-process the same event (documented limitation).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Nothing in flight for this key
    Idle,
    /// An operation for this key is currently running
    InFlight,
    /// The last operation for this key completed
    Done,
}

#[derive(Default)]
pub struct GuardRegistry {
    states: Mutex<HashMap<String, GuardState>>,
}

impl GuardRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Begin a guarded operation. Returns `None` when the key is already
    /// in flight - the caller treats that as "someone else is handling
    /// this" and returns normally.
    pub fn try_begin(self: &Arc<Self>, key: &str) -> Option<GuardToken> {
        let mut states = self.states.lock();
        match states.get(key) {
            Some(GuardState::InFlight) => None,
            _ => {
                states.insert(key.to_string(), GuardState::InFlight);
                Some(GuardToken {
                    registry: Arc::clone(self),
                    key: key.to_string(),
                    completed: false,
                })
            }
        }
    }

    pub fn state(&self, key: &str) -> GuardState {
        self.states
            .lock()
            .get(key)
            .copied()
            .unwrap_or(GuardState::Idle)
    }

    fn release(&self, key: &str, state: GuardState) {
        self.states.lock().insert(key.to_string(), state);
    }
}

/// RAII token for a guarded operation. Dropping it releases the key on every
/// exit path; `complete()` marks the operation as finished successfully.
pub struct GuardToken {
    registry: Arc<GuardRegistry>,
    key: String,
    completed: bool,
}

impl GuardToken {
    /// Mark the guarded operation finished; the key transitions to `Done`.
    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        let state = if self.completed {
            GuardState::Done
        } else {
            GuardState::Idle
        };
        self.registry.release(&self.key, state);
    }
}

/// Composite key helpers so every call site builds keys the same way
pub fn entry_key(mint: &str, buyer: &str) -> String {
    format!("{}:{}", mint, buyer)
}

pub fn purchase_key(wallet: &str, mint: &str) -> String {
    format!("{}:{}", wallet, mint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_idle_inflight_done() {
        let registry = GuardRegistry::new();
        assert_eq!(registry.state("k"), GuardState::Idle);

        let token = registry.try_begin("k").expect("acquired");
        assert_eq!(registry.state("k"), GuardState::InFlight);

        token.complete();
        assert_eq!(registry.state("k"), GuardState::Done);
    }

    #[test]
    fn drop_without_complete_returns_to_idle() {
        let registry = GuardRegistry::new();
        {
            let _token = registry.try_begin("k").expect("acquired");
            assert_eq!(registry.state("k"), GuardState::InFlight);
        }
        assert_eq!(registry.state("k"), GuardState::Idle);
    }

    #[test]
    fn second_acquirer_is_refused_while_in_flight() {
        let registry = GuardRegistry::new();
        let _first = registry.try_begin("k").expect("acquired");
        assert!(registry.try_begin("k").is_none());
    }

    #[test]
    fn done_key_can_be_reacquired() {
        let registry = GuardRegistry::new();
        registry.try_begin("k").expect("acquired").complete();
        assert!(registry.try_begin("k").is_some());
    }

    #[test]
    fn keys_are_independent() {
        let registry = GuardRegistry::new();
        let _a = registry.try_begin(&entry_key("mint", "alice")).unwrap();
        assert!(registry.try_begin(&entry_key("mint", "bob")).is_some());
    }
}
