#![forbid(unsafe_code)]

//! Standalone memoized values with explicit invalidation.
//!
//! # Design
//!
//! [`Memoized<T>`] owns a compute function, its last result and the instant
//! that result was computed at. It is invalidated either explicitly through
//! [`invalidate()`](Memoized::invalidate), by a write to an [`Observable`]
//! it was wired to with [`depends_on`](Memoized::depends_on), or by its TTL
//! running out. The next [`get()`](Memoized::get) recomputes.
//!
//! This is the owner-free counterpart of [`Getter`](crate::Getter): no member
//! keys, no registry, the dependency wiring is visible at the construction
//! site.
//!
//! # Invariants
//!
//! 1. The compute function runs at most once per invalidation (or TTL
//!    period).
//! 2. `version` increments by exactly 1 per recomputation.
//! 3. If the compute function panics, the previous value (if any) is kept
//!    and the dirty flag stays set, so the next `get()` retries.
//! 4. A dependency write made while the compute function runs leaves the
//!    freshly stored value stale.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use web_time::{Duration, Instant};

use crate::clock::Clock;
use crate::observable::{Observable, Subscription};
use crate::store::SlotState;

struct MemoizedInner<T> {
    compute: Box<dyn Fn() -> T>,
    /// Last result and when it was computed.
    cached: Option<(T, Instant)>,
    ttl: Option<Duration>,
    clock: Clock,
    version: u64,
    /// Keeps dependency callbacks alive. Never read.
    _subscriptions: Vec<Subscription>,
}

impl<T> MemoizedInner<T> {
    fn is_expired(&self, now: Instant) -> bool {
        match (&self.cached, self.ttl) {
            (Some((_, at)), Some(ttl)) => now.saturating_duration_since(*at) >= ttl,
            _ => false,
        }
    }

    fn refresh(&mut self, dirty: &Cell<bool>) {
        let now = self.clock.now();
        if dirty.get() || self.cached.is_none() || self.is_expired(now) {
            // Cleared before computing: a dependency write made while the
            // compute function runs leaves the new value stale.
            dirty.set(false);
            let guard = DirtyOnUnwind(dirty);
            let value = (self.compute)();
            std::mem::forget(guard);
            self.cached = Some((value, now));
            self.version += 1;
        }
    }
}

/// Re-flags the value as dirty if the compute function unwinds.
struct DirtyOnUnwind<'a>(&'a Cell<bool>);

impl Drop for DirtyOnUnwind<'_> {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

/// A lazily computed, cached value.
///
/// Cloning a `Memoized` creates a new handle to the **same** cache.
pub struct Memoized<T> {
    inner: Rc<RefCell<MemoizedInner<T>>>,
    /// Outside the `RefCell` so dependency callbacks can flag it even while
    /// a computation holds the inner borrow.
    dirty: Rc<Cell<bool>>,
}

impl<T> Clone for Memoized<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            dirty: Rc::clone(&self.dirty),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Memoized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Memoized")
            .field("cached", &inner.cached.as_ref().map(|(v, _)| v))
            .field("dirty", &self.dirty.get())
            .field("ttl", &inner.ttl)
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> Memoized<T> {
    /// Memoize `compute`. Nothing runs until the first `get()`.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoizedInner {
                compute: Box::new(compute),
                cached: None,
                ttl: None,
                clock: Clock::Real,
                version: 0,
                _subscriptions: Vec::new(),
            })),
            dirty: Rc::new(Cell::new(true)),
        }
    }

    /// Memoize a value derived from one observable, invalidated by its
    /// writes.
    pub fn from_observable<S: 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let source_clone = source.clone();
        Self::new(move || source_clone.with(|v| map(v))).depends_on(source)
    }

    /// Expire the cached value `ttl` after it was computed.
    #[must_use]
    pub fn with_ttl(self, ttl: Duration) -> Self {
        self.inner.borrow_mut().ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_clock(self, clock: Clock) -> Self {
        self.inner.borrow_mut().clock = clock;
        self
    }

    /// Invalidate on every write to `source`.
    #[must_use]
    pub fn depends_on<S: 'static>(self, source: &Observable<S>) -> Self {
        let dirty = Rc::downgrade(&self.dirty);
        let sub = source.subscribe(move |_| {
            if let Some(dirty) = dirty.upgrade() {
                dirty.set(true);
            }
        });
        self.inner.borrow_mut()._subscriptions.push(sub);
        self
    }

    /// Current value, recomputing if invalidated or expired.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure or the compute function re-enters this same
    /// `Memoized`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut inner = self.inner.borrow_mut();
        inner.refresh(&self.dirty);
        let (value, _) = inner
            .cached
            .as_ref()
            .expect("cached is always Some after refresh");
        f(value)
    }

    /// Force the next `get()` to recompute.
    pub fn invalidate(&self) {
        self.dirty.set(true);
    }

    /// Whether the next `get()` will recompute.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state() != SlotState::Fresh
    }

    #[must_use]
    pub fn state(&self) -> SlotState {
        let inner = self.inner.borrow();
        if inner.cached.is_none() {
            SlotState::Empty
        } else if self.dirty.get() || inner.is_expired(inner.clock.now()) {
            SlotState::Stale
        } else {
            SlotState::Fresh
        }
    }

    /// When the cached value was computed.
    #[must_use]
    pub fn computed_at(&self) -> Option<Instant> {
        self.inner.borrow().cached.as_ref().map(|(_, at)| *at)
    }

    /// Number of computations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}
