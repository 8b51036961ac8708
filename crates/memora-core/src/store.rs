//! Per-owner cache store.
//!
//! Maps a member key (plus, for methods, an [`ArgsKey`]) to the last
//! successfully computed value and the instant it was computed at.
//!
//! Eviction is pull-based: invalidation and TTL expiry only mark an entry
//! unusable. The old value stays in place until the next successful
//! computation overwrites it.

use std::any::Any;
use std::rc::Rc;

use ahash::AHashMap;
use web_time::{Duration, Instant};

use crate::args_key::ArgsKey;

/// Observable state of one cache slot.
///
/// `Empty` and `Stale` behave the same on access (both recompute); `Stale`
/// still holds the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Fresh,
    Stale,
}

/// One stored result.
#[derive(Clone)]
pub struct CacheEntry {
    value: Rc<dyn Any>,
    computed_at: Instant,
    invalidated: bool,
}

impl CacheEntry {
    #[must_use]
    pub fn computed_at(&self) -> Instant {
        self.computed_at
    }

    /// Whether a dependency write or manual invalidation cleared this entry.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Usable for a read at `now` under `ttl`.
    #[must_use]
    pub fn is_valid(&self, ttl: Option<Duration>, now: Instant) -> bool {
        if self.invalidated {
            return false;
        }
        match ttl {
            None => true,
            Some(ttl) => now.saturating_duration_since(self.computed_at) < ttl,
        }
    }

    /// The stored value, if it has type `T`.
    #[must_use]
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("computed_at", &self.computed_at)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct MemberSlots {
    /// Getter entry.
    single: Option<CacheEntry>,
    /// Method entries, one per call signature.
    by_args: AHashMap<ArgsKey, CacheEntry>,
}

impl MemberSlots {
    fn entry(&self, args: Option<&ArgsKey>) -> Option<&CacheEntry> {
        match args {
            None => self.single.as_ref(),
            Some(key) => self.by_args.get(key),
        }
    }

    fn entries_mut(&mut self) -> impl Iterator<Item = &mut CacheEntry> {
        self.single.iter_mut().chain(self.by_args.values_mut())
    }
}

#[derive(Debug, Default)]
pub struct CacheStore {
    members: AHashMap<&'static str, MemberSlots>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `(member, args)` if it is valid at `now`.
    #[must_use]
    pub fn get(
        &self,
        member: &str,
        args: Option<&ArgsKey>,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Option<&CacheEntry> {
        self.members
            .get(member)?
            .entry(args)
            .filter(|entry| entry.is_valid(ttl, now))
    }

    /// Store `value` computed at `computed_at`, replacing any previous entry.
    pub fn put(
        &mut self,
        member: &'static str,
        args: Option<ArgsKey>,
        value: Rc<dyn Any>,
        computed_at: Instant,
    ) {
        let entry = CacheEntry {
            value,
            computed_at,
            invalidated: false,
        };
        let slots = self.members.entry(member).or_default();
        match args {
            None => slots.single = Some(entry),
            Some(key) => {
                slots.by_args.insert(key, entry);
            }
        }
    }

    /// Clear every entry of `member`: the getter entry, or all call
    /// signatures of a method. Returns how many entries went from usable to
    /// invalidated.
    pub fn invalidate(&mut self, member: &str) -> usize {
        let Some(slots) = self.members.get_mut(member) else {
            return 0;
        };
        let mut cleared = 0;
        for entry in slots.entries_mut() {
            if !entry.invalidated {
                entry.invalidated = true;
                cleared += 1;
            }
        }
        cleared
    }

    pub fn invalidate_all(&mut self) -> usize {
        self.members
            .values_mut()
            .flat_map(MemberSlots::entries_mut)
            .filter(|entry| !entry.invalidated)
            .map(|entry| entry.invalidated = true)
            .count()
    }

    #[must_use]
    pub fn slot_state(
        &self,
        member: &str,
        args: Option<&ArgsKey>,
        ttl: Option<Duration>,
        now: Instant,
    ) -> SlotState {
        match self.members.get(member).and_then(|s| s.entry(args)) {
            None => SlotState::Empty,
            Some(entry) if entry.is_valid(ttl, now) => SlotState::Fresh,
            Some(_) => SlotState::Stale,
        }
    }

    /// Stored entries, usable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members
            .values()
            .map(|s| usize::from(s.single.is_some()) + s.by_args.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(args: &(i32, i32)) -> ArgsKey {
        ArgsKey::encode(args).unwrap()
    }

    #[test]
    fn empty_store_misses() {
        let store = CacheStore::new();
        let now = Instant::now();
        assert!(store.get("m", None, None, now).is_none());
        assert_eq!(store.slot_state("m", None, None, now), SlotState::Empty);
        assert!(store.is_empty());
    }

    #[test]
    fn put_then_get() {
        let mut store = CacheStore::new();
        let now = Instant::now();
        store.put("m", None, Rc::new(5u32), now);

        let entry = store.get("m", None, None, now).unwrap();
        assert_eq!(entry.value::<u32>(), Some(&5));
        assert_eq!(entry.value::<i64>(), None);
        assert_eq!(entry.computed_at(), now);
    }

    #[test]
    fn ttl_boundary_is_exclusive() {
        let mut store = CacheStore::new();
        let t0 = Instant::now();
        let ttl = Some(Duration::from_millis(100));
        store.put("m", None, Rc::new(1u8), t0);

        let just_before = t0 + Duration::from_millis(99);
        let exactly = t0 + Duration::from_millis(100);
        assert!(store.get("m", None, ttl, just_before).is_some());
        assert!(store.get("m", None, ttl, exactly).is_none());
        assert_eq!(store.slot_state("m", None, ttl, exactly), SlotState::Stale);
    }

    #[test]
    fn expired_entries_are_kept_until_overwritten() {
        let mut store = CacheStore::new();
        let t0 = Instant::now();
        let ttl = Some(Duration::from_millis(10));
        store.put("m", None, Rc::new(1u8), t0);

        let later = t0 + Duration::from_millis(50);
        assert!(store.get("m", None, ttl, later).is_none());
        assert_eq!(store.len(), 1);

        store.put("m", None, Rc::new(2u8), later);
        let entry = store.get("m", None, ttl, later).unwrap();
        assert_eq!(entry.value::<u8>(), Some(&2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn method_signatures_are_independent() {
        let mut store = CacheStore::new();
        let now = Instant::now();
        store.put("add", Some(key(&(1, 2))), Rc::new(3), now);

        assert!(store.get("add", Some(&key(&(1, 2))), None, now).is_some());
        assert!(store.get("add", Some(&key(&(2, 1))), None, now).is_none());
        assert!(store.get("add", None, None, now).is_none());
    }

    #[test]
    fn invalidate_clears_all_signatures_of_a_member() {
        let mut store = CacheStore::new();
        let now = Instant::now();
        store.put("add", Some(key(&(1, 2))), Rc::new(3), now);
        store.put("add", Some(key(&(2, 2))), Rc::new(4), now);
        store.put("other", None, Rc::new(0), now);

        assert_eq!(store.invalidate("add"), 2);
        assert_eq!(store.invalidate("add"), 0);
        assert!(store.get("add", Some(&key(&(1, 2))), None, now).is_none());
        assert!(store.get("add", Some(&key(&(2, 2))), None, now).is_none());
        assert!(store.get("other", None, None, now).is_some());
        assert_eq!(store.len(), 3);
        assert_eq!(store.invalidate("missing"), 0);
    }

    #[test]
    fn invalidated_entry_keeps_value_until_recompute() {
        let mut store = CacheStore::new();
        let now = Instant::now();
        store.put("m", None, Rc::new("old"), now);
        store.invalidate("m");

        assert_eq!(store.slot_state("m", None, None, now), SlotState::Stale);
        store.put("m", None, Rc::new("new"), now);
        assert_eq!(store.slot_state("m", None, None, now), SlotState::Fresh);
    }

    #[test]
    fn invalidate_all_counts_usable_entries() {
        let mut store = CacheStore::new();
        let now = Instant::now();
        store.put("a", None, Rc::new(1), now);
        store.put("b", Some(key(&(0, 0))), Rc::new(2), now);
        store.invalidate("a");

        assert_eq!(store.invalidate_all(), 1);
        assert_eq!(store.invalidate_all(), 0);
    }
}
