#![forbid(unsafe_code)]

//! Observable properties: value holders that notify subscribers on write.
//!
//! An owner declares each field that memoized members may depend on as an
//! [`Observable<T>`]. Memoization subscribes one write hook per dependency
//! (see [`crate::intercept`]); no other part of the owner changes shape.
//!
//! # Invariants
//!
//! 1. A write applies the property's own write semantics first (plain store,
//!    or the custom setter from [`Observable::with_setter`]), bumps the
//!    version, and only then notifies.
//! 2. Every write notifies, including writes of an equal value.
//! 3. Subscribers are notified in registration order.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = dyn Fn(&T);
type Setter<T> = dyn Fn(&mut T, T);

struct ObservableInner<T> {
    value: T,
    version: u64,
    /// Custom write semantics. `None` means plain assignment.
    setter: Option<Box<Setter<T>>>,
}

/// Subscribers live in their own cell so that subscribing while the value is
/// borrowed (inside [`Observable::with`] or a notification) is legal.
struct ObservableShared<T> {
    state: RefCell<ObservableInner<T>>,
    /// Held weakly; the [`Subscription`] owns the strong reference.
    subscribers: RefCell<Vec<Weak<Callback<T>>>>,
}

/// A shared, version-tracked value with write notification.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    inner: Rc<ObservableShared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Observable")
            .field("value", &state.value)
            .field("version", &state.version)
            .field("custom_setter", &state.setter.is_some())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

impl<T: Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: 'static> Observable<T> {
    /// A plain stored value.
    pub fn new(value: T) -> Self {
        Self::build(value, None)
    }

    /// A value whose writes go through `setter`.
    ///
    /// The setter receives the current slot and the incoming value; it may
    /// normalize, clamp, or ignore the write. Subscribers are notified after
    /// it returns, whatever it did.
    pub fn with_setter(value: T, setter: impl Fn(&mut T, T) + 'static) -> Self {
        Self::build(value, Some(Box::new(setter)))
    }

    fn build(value: T, setter: Option<Box<Setter<T>>>) -> Self {
        Self {
            inner: Rc::new(ObservableShared {
                state: RefCell::new(ObservableInner {
                    value,
                    version: 0,
                    setter,
                }),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.state.borrow().value.clone()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow().value)
    }

    /// Write a new value and notify subscribers.
    ///
    /// # Panics
    ///
    /// Panics if called while the value is borrowed, including from a
    /// subscriber of this same observable.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.state.borrow_mut();
            let ObservableInner {
                value: slot,
                setter,
                version,
                ..
            } = &mut *inner;
            match setter.as_deref() {
                Some(setter) => setter(slot, value),
                None => *slot = value,
            }
            *version += 1;
        }
        self.notify();
    }

    /// Mutate the value in place and notify subscribers.
    ///
    /// The custom setter, if any, is not involved.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut inner = self.inner.state.borrow_mut();
            f(&mut inner.value);
            inner.version += 1;
        }
        self.notify();
    }

    /// Number of writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.state.borrow().version
    }

    /// Register `callback` to run after every write.
    ///
    /// The callback stays registered for as long as the returned
    /// [`Subscription`] is alive. Subscribing never touches the value, so it
    /// may happen inside [`Observable::with`] or a notification; a callback
    /// added during a notification first runs on the next write.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .subscribers
            .borrow_mut()
            .push(Rc::downgrade(&callback));
        Subscription {
            _callback: Box::new(callback),
        }
    }

    /// Live subscriber count. Dead entries are pruned first.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        subscribers.retain(|w| w.strong_count() > 0);
        subscribers.len()
    }

    fn notify(&self) {
        let callbacks: Vec<Rc<Callback<T>>> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(|w| w.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        if callbacks.is_empty() {
            return;
        }
        let state = self.inner.state.borrow();
        for callback in callbacks {
            callback(&state.value);
        }
    }
}

/// RAII guard for an [`Observable::subscribe`] callback.
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
