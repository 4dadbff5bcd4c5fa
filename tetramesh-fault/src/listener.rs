//! Copy-on-write subscription registries
//!
//! Listener lists are immutable vectors behind an atomic pointer
//! ([`ArcSwap`]): readers snapshot the pointer without locking, writers
//! publish a new list. A registration returns an owned [`Subscription`]
//! handle; releasing (or dropping) the handle unregisters the listener.
//! Listener panics are caught and logged so no callback can destabilize
//! the component delivering the event.

use arc_swap::ArcSwap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

use crate::types::{PartitionChangeEvent, PartitionId, RecoveryPhase};

/// Classifier listener, invoked on every non-identity status transition
pub trait FaultListener: Send + Sync {
    fn on_change(&self, event: &PartitionChangeEvent);
}

impl<F> FaultListener for F
where
    F: Fn(&PartitionChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &PartitionChangeEvent) {
        self(event)
    }
}

/// Coordinator listener, invoked on every committed phase transition
pub trait PhaseListener: Send + Sync {
    fn on_phase(&self, partition: PartitionId, phase: RecoveryPhase);
}

impl<F> PhaseListener for F
where
    F: Fn(PartitionId, RecoveryPhase) + Send + Sync,
{
    fn on_phase(&self, partition: PartitionId, phase: RecoveryPhase) {
        self(partition, phase)
    }
}

/// Owned handle to a registered listener
///
/// Dropping the handle unregisters the listener. `release` does the same
/// explicitly and is idempotent.
pub struct Subscription {
    released: AtomicBool,
    unregister: Box<dyn Fn() + Send + Sync>,
}

impl Subscription {
    fn new(unregister: Box<dyn Fn() + Send + Sync>) -> Self {
        Self {
            released: AtomicBool::new(false),
            unregister,
        }
    }

    /// Unregister the listener; repeated calls are no-ops
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            (self.unregister)();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish()
    }
}

/// Copy-on-write listener registry keyed by registration id
pub(crate) struct Registry<L: ?Sized> {
    entries: ArcSwap<Vec<(u64, Arc<L>)>>,
    next_id: AtomicU64,
}

impl<L: ?Sized + Send + Sync + 'static> Registry<L> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn register(self: &Arc<Self>, listener: Arc<L>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push((id, Arc::clone(&listener)));
            next
        });

        // The handle holds only a weak reference, so an outliving
        // subscription cannot keep a dropped registry alive.
        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription::new(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        }))
    }

    fn remove(&self, id: u64) {
        self.entries.rcu(|current| {
            current
                .iter()
                .filter(|(entry_id, _)| *entry_id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Deliver to every registered listener, isolating panics
    pub(crate) fn each(&self, mut deliver: impl FnMut(&L)) {
        let snapshot = self.entries.load_full();
        for (id, listener) in snapshot.iter() {
            if catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref()))).is_err() {
                crate::metrics::record_listener_panic();
                warn!(listener_id = id, "listener panicked; continuing delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    trait Probe: Send + Sync {
        fn fire(&self);
    }

    struct Counter(AtomicUsize);

    impl Probe for Counter {
        fn fire(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Bomb;

    impl Probe for Bomb {
        fn fire(&self) {
            panic!("listener bomb");
        }
    }

    #[test]
    fn test_register_deliver_release() {
        let registry: Arc<Registry<dyn Probe>> = Registry::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        let subscription = registry.register(counter.clone());
        assert_eq!(registry.len(), 1);

        registry.each(|l| l.fire());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        subscription.release();
        assert_eq!(registry.len(), 0);

        registry.each(|l| l.fire());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry: Arc<Registry<dyn Probe>> = Registry::new();
        let a = registry.register(Arc::new(Counter(AtomicUsize::new(0))));
        let _b = registry.register(Arc::new(Counter(AtomicUsize::new(0))));

        a.release();
        a.release();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_drop_unregisters() {
        let registry: Arc<Registry<dyn Probe>> = Registry::new();
        {
            let _subscription = registry.register(Arc::new(Counter(AtomicUsize::new(0))));
            assert_eq!(registry.len(), 1);
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let registry: Arc<Registry<dyn Probe>> = Registry::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        let _bomb = registry.register(Arc::new(Bomb));
        let _ok = registry.register(counter.clone());

        registry.each(|l| l.fire());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutation_during_delivery_sees_snapshot() {
        let registry: Arc<Registry<dyn Probe>> = Registry::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let _sub = registry.register(counter.clone());

        // Registering mid-delivery must not affect the current snapshot.
        let registry_clone = Arc::clone(&registry);
        registry.each(|l| {
            let _late = registry_clone.register(Arc::new(Counter(AtomicUsize::new(0))));
            l.fire();
            // _late drops here and unregisters itself
        });
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }
}
