//! Single-threaded observer lists with scoped subscriptions.
//!
//! An [`Observable`] delivers each notification to its observers in
//! registration order. Registering returns a [`Subscription`]; dropping it
//! removes the observer, so nothing outlives the owner that subscribed.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Slot<T> {
    id: u64,
    handler: Handler<T>,
}

struct Registry<T> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

impl<T> Registry<T> {
    fn contains(&self, id: u64) -> bool {
        self.slots.iter().any(|s| s.id == id)
    }
}

/// A list of observers for values of type `T`.
///
/// Cloning an `Observable` yields another handle to the same observer list.
pub struct Observable<T> {
    inner: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().slots.len()
    }
}

impl<T: 'static> Observable<T> {
    /// Register an observer. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn add(&self, handler: impl FnMut(&T) + 'static) -> Subscription {
        let handler: Handler<T> = Rc::new(RefCell::new(handler));
        let id = {
            let mut registry = self.inner.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.slots.push(Slot { id, handler });
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().slots.retain(|s| s.id != id);
            }
        })
    }

    /// Deliver `value` to every observer in registration order.
    ///
    /// Observers added during delivery are not called for this value; observers
    /// released during delivery are skipped. An observer that re-enters its own
    /// observable is not called recursively. Returns the number of observers
    /// that ran.
    pub fn notify(&self, value: &T) -> usize {
        let pending: Vec<(u64, Handler<T>)> = self
            .inner
            .borrow()
            .slots
            .iter()
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in pending {
            if !self.inner.borrow().contains(id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut f) => {
                    f(value);
                    delivered += 1;
                }
                Err(_) => tracing::warn!(observer = id, "skipping re-entrant notification"),
            }
        }
        delivered
    }
}

/// Keeps an observer registered. Dropping it unregisters the observer.
#[must_use = "dropping a Subscription unregisters the observer immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister now. Equivalent to dropping.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A group of subscriptions released together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Move every subscription of `other` into this set.
    pub fn append(&mut self, mut other: SubscriptionSet) {
        self.subscriptions.append(&mut other.subscriptions);
    }

    /// Release every subscription in the set.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn delivers_in_registration_order() {
        let bus: Observable<u32> = Observable::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&seen);
        let _s1 = bus.add(move |v| a.borrow_mut().push(("first", *v)));
        let b = Rc::clone(&seen);
        let _s2 = bus.add(move |v| b.borrow_mut().push(("second", *v)));

        assert_eq!(bus.notify(&7), 2);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let bus: Observable<()> = Observable::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = bus.add(move |_| c.set(c.get() + 1));

        bus.notify(&());
        drop(sub);
        bus.notify(&());

        assert_eq!(count.get(), 1);
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn subscription_outliving_observable_is_harmless() {
        let bus: Observable<()> = Observable::new();
        let sub = bus.add(|_| {});
        drop(bus);
        sub.unsubscribe();
    }

    #[test]
    fn observer_released_mid_delivery_is_skipped() {
        let bus: Observable<()> = Observable::new();
        let victim_calls = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&victim);
        let _killer = bus.add(move |_| {
            slot.borrow_mut().take();
        });
        let calls = Rc::clone(&victim_calls);
        *victim.borrow_mut() = Some(bus.add(move |_| calls.set(calls.get() + 1)));

        assert_eq!(bus.notify(&()), 1);
        assert_eq!(victim_calls.get(), 0);
    }

    #[test]
    fn reentrant_notify_does_not_recurse() {
        let bus: Observable<u8> = Observable::new();
        let calls = Rc::new(Cell::new(0));
        let inner_bus = bus.clone();
        let c = Rc::clone(&calls);
        let _sub = bus.add(move |v| {
            c.set(c.get() + 1);
            if *v == 0 {
                inner_bus.notify(&1);
            }
        });

        bus.notify(&0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn subscription_set_releases_all() {
        let bus: Observable<()> = Observable::new();
        let mut set = SubscriptionSet::new();
        set.push(bus.add(|_| {}));
        set.push(bus.add(|_| {}));
        assert_eq!(bus.observer_count(), 2);
        set.clear();
        assert_eq!(bus.observer_count(), 0);
        assert!(set.is_empty());
    }
}
