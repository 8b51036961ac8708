#![forbid(unsafe_code)]

//! Per-owner memoization state.
//!
//! An owner embeds one [`MemoState`] as an ordinary field and implements
//! [`MemoOwner`] to hand it out. Nothing is allocated until the first
//! memoized access; from then on the state holds the owner's cache store,
//! dependency registry and interception hooks, and dies with the owner.
//!
//! # Design
//!
//! The shared interior lives behind `Rc<RefCell<..>>` so that write hooks on
//! the owner's observable properties can reach it. Hooks hold only a `Weak`
//! reference, so they never keep the state (or the owner) alive.
//!
//! No borrow of the interior is held while user code runs (compute bodies,
//! [`MemoOwner::tracked`]), so memoized members may read other memoized
//! members and compute bodies may write dependency properties.

use std::any::TypeId;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, trace};
use web_time::{Duration, Instant};

use crate::args_key::ArgsKey;
use crate::clock::Clock;
use crate::error::ConfigError;
use crate::intercept::{Intercept, Interceptor, WriteHook};
use crate::member::MemberKind;
use crate::options::MemoOptions;
use crate::registry::DependencyRegistry;
use crate::store::{CacheStore, SlotState};

/// A type whose members are memoized.
///
/// ```
/// use memora_core::{Getter, Intercept, MemoOptions, MemoOwner, MemoState, Observable};
///
/// struct Profile {
///     user_id: Observable<String>,
///     memo: MemoState,
/// }
///
/// impl MemoOwner for Profile {
///     fn memo(&self) -> &MemoState {
///         &self.memo
///     }
///
///     fn tracked(&self, property: &str) -> Option<&dyn Intercept> {
///         match property {
///             "user_id" => Some(&self.user_id),
///             _ => None,
///         }
///     }
/// }
///
/// const DISPLAY_NAME: Getter =
///     Getter::with_options("display_name", MemoOptions::new().with_clear_on(&["user_id"]));
///
/// impl Profile {
///     fn display_name(&self) -> memora_core::Result<String> {
///         DISPLAY_NAME.get(self, |p| format!("Display name for {}", p.user_id.get()))
///     }
/// }
///
/// let profile = Profile { user_id: Observable::new("u1".into()), memo: MemoState::new() };
/// assert_eq!(profile.display_name().unwrap(), "Display name for u1");
/// profile.user_id.set("u2".into());
/// assert_eq!(profile.display_name().unwrap(), "Display name for u2");
/// ```
pub trait MemoOwner {
    fn memo(&self) -> &MemoState;

    /// Resolve a dependency property by name.
    ///
    /// Members may only list properties this returns `Some` for.
    fn tracked(&self, property: &str) -> Option<&dyn Intercept> {
        let _ = property;
        None
    }
}

/// Per-owner counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    /// Accesses answered from the cache.
    pub hits: u64,
    /// Accesses that ran the compute body.
    pub misses: u64,
    /// Successful computations stored.
    pub stores: u64,
    /// Entries invalidated by dependency writes or manual invalidation.
    pub invalidations: u64,
}

#[derive(Debug, Clone, Copy)]
struct MemberRecord {
    kind: MemberKind,
    value_type: TypeId,
    options: MemoOptions,
}

#[derive(Debug, Default)]
pub(crate) struct MemoInner {
    store: CacheStore,
    registry: DependencyRegistry,
    interceptor: Interceptor,
    members: AHashMap<&'static str, MemberRecord>,
    stats: MemoStats,
}

impl MemoInner {
    fn on_write(&mut self, property: &str) -> usize {
        let invalidated = self.registry.on_write(property, &mut self.store);
        self.stats.invalidations += invalidated as u64;
        debug!(property, invalidated, "dependency written");
        invalidated
    }

    pub(crate) fn lookup<T: Clone + 'static>(
        &mut self,
        member: &'static str,
        args: Option<&ArgsKey>,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Option<T> {
        let hit = self
            .store
            .get(member, args, ttl, now)
            .and_then(|entry| entry.value::<T>())
            .cloned();
        if hit.is_some() {
            self.stats.hits += 1;
            trace!(member, "memo hit");
        } else {
            self.stats.misses += 1;
            trace!(member, "memo miss");
        }
        hit
    }

    pub(crate) fn store<T: 'static>(
        &mut self,
        member: &'static str,
        args: Option<ArgsKey>,
        value: T,
        computed_at: Instant,
    ) {
        self.store.put(member, args, Rc::new(value), computed_at);
        self.stats.stores += 1;
        trace!(member, "memo stored");
    }
}

/// Memoization state for one owner instance.
///
/// Cloning yields a fresh, empty state on the same clock: a cloned owner
/// never shares cache entries or registrations with the owner it came from.
pub struct MemoState {
    clock: Clock,
    shared: OnceCell<Rc<RefCell<MemoInner>>>,
}

impl MemoState {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::Real)
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            shared: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Whether any memoized member has been accessed yet.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.shared.get().is_some()
    }

    pub(crate) fn shared(&self) -> &Rc<RefCell<MemoInner>> {
        self.shared.get_or_init(Rc::default)
    }

    #[must_use]
    pub fn stats(&self) -> MemoStats {
        self.shared
            .get()
            .map(|s| s.borrow().stats)
            .unwrap_or_default()
    }

    /// State of the cache slot for `(member, args)` right now.
    #[must_use]
    pub fn slot_state(&self, member: &str, args: Option<&ArgsKey>) -> SlotState {
        let Some(shared) = self.shared.get() else {
            return SlotState::Empty;
        };
        let inner = shared.borrow();
        let ttl = inner.members.get(member).and_then(|r| r.options.ttl());
        inner.store.slot_state(member, args, ttl, self.now())
    }

    /// Clear every cached entry of `member`. Returns the number of entries
    /// that were usable.
    pub fn invalidate(&self, member: &str) -> usize {
        let Some(shared) = self.shared.get() else {
            return 0;
        };
        let mut inner = shared.borrow_mut();
        let cleared = inner.store.invalidate(member);
        inner.stats.invalidations += cleared as u64;
        cleared
    }

    pub fn invalidate_all(&self) -> usize {
        let Some(shared) = self.shared.get() else {
            return 0;
        };
        let mut inner = shared.borrow_mut();
        let cleared = inner.store.invalidate_all();
        inner.stats.invalidations += cleared as u64;
        cleared
    }

    /// Signal a write to `property` by hand, for dependencies that are not
    /// modelled as [`Intercept`] properties.
    pub fn notify_write(&self, property: &str) -> usize {
        match self.shared.get() {
            Some(shared) => shared.borrow_mut().on_write(property),
            None => 0,
        }
    }

    /// Whether a write hook is installed for `property`.
    #[must_use]
    pub fn is_intercepted(&self, property: &str) -> bool {
        self.shared
            .get()
            .is_some_and(|s| s.borrow().interceptor.is_installed(property))
    }

    /// Members registered as depending on `property`.
    #[must_use]
    pub fn dependents(&self, property: &str) -> Vec<&'static str> {
        self.shared
            .get()
            .map(|s| s.borrow().registry.dependents(property).to_vec())
            .unwrap_or_default()
    }

    /// Stored cache entries, usable or not.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.shared
            .get()
            .map_or(0, |s| s.borrow().store.len())
    }
}

impl Default for MemoState {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoState {
    fn clone(&self) -> Self {
        Self::with_clock(self.clock.clone())
    }
}

impl fmt::Debug for MemoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("MemoState");
        dbg.field("clock", &self.clock);
        match self.shared.get() {
            Some(shared) => {
                let inner = shared.borrow();
                dbg.field("members", &inner.members.len())
                    .field("entries", &inner.store.len())
                    .field("stats", &inner.stats);
            }
            None => {
                dbg.field("initialized", &false);
            }
        }
        dbg.finish()
    }
}

/// First-access setup of `member` on `owner`.
///
/// Validates everything before touching the owner's state, so a rejected
/// declaration leaves nothing behind. Later accesses only re-check that the
/// member's kind, value type and options match the first declaration.
pub(crate) fn prepare<O: MemoOwner + ?Sized>(
    owner: &O,
    member: &'static str,
    kind: MemberKind,
    options: &MemoOptions,
    value_type: TypeId,
) -> Result<(), ConfigError> {
    let shared = owner.memo().shared();

    if let Some(record) = shared.borrow().members.get(member) {
        if record.kind != kind {
            return Err(ConfigError::KindConflict {
                member,
                existing: record.kind,
                requested: kind,
            });
        }
        if record.value_type != value_type {
            return Err(ConfigError::TypeConflict { member });
        }
        if record.options != *options {
            return Err(ConfigError::OptionsConflict { member });
        }
        return Ok(());
    }

    options.validate(member)?;
    let targets = options
        .clear_on()
        .iter()
        .map(|&property| {
            owner
                .tracked(property)
                .map(|target| (property, target))
                .ok_or(ConfigError::UnknownDependency { member, property })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut inner = shared.borrow_mut();
    inner.members.insert(
        member,
        MemberRecord {
            kind,
            value_type,
            options: *options,
        },
    );
    for (property, target) in targets {
        inner.registry.register(property, member);
        let installed = inner
            .interceptor
            .ensure_intercepted(property, target, || write_hook(shared, property));
        if installed {
            debug!(member, property, "dependency intercepted");
        }
    }
    debug!(member, %kind, deps = options.clear_on().len(), "memoized member installed");
    Ok(())
}

fn write_hook(shared: &Rc<RefCell<MemoInner>>, property: &'static str) -> WriteHook {
    let weak = Rc::downgrade(shared);
    Rc::new(move || {
        if let Some(strong) = weak.upgrade() {
            strong.borrow_mut().on_write(property);
        }
    })
}
