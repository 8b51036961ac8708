//! Per-owner dependency registry: property name -> dependent member keys.

use ahash::AHashMap;

use crate::store::CacheStore;

/// Many-to-many map from dependency property names to the memoized members
/// that must be invalidated when the property is written.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    /// Members kept in registration order, without duplicates.
    dependents: AHashMap<&'static str, Vec<&'static str>>,
}

impl DependencyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `member` depends on `property`. Returns `false` if the
    /// pair was already registered.
    pub fn register(&mut self, property: &'static str, member: &'static str) -> bool {
        let members = self.dependents.entry(property).or_default();
        if members.contains(&member) {
            return false;
        }
        members.push(member);
        true
    }

    /// Members registered under `property`, in registration order.
    #[must_use]
    pub fn dependents(&self, property: &str) -> &[&'static str] {
        self.dependents
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn depends_on(&self, member: &str, property: &str) -> bool {
        self.dependents(property).contains(&member)
    }

    /// `property` was written: invalidate every dependent member in `store`.
    /// Returns the number of entries that were usable before the write.
    pub fn on_write(&self, property: &str, store: &mut CacheStore) -> usize {
        self.dependents(property)
            .iter()
            .map(|member| store.invalidate(member))
            .sum()
    }

    /// Number of distinct properties with at least one dependent.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use web_time::Instant;

    #[test]
    fn register_is_idempotent() {
        let mut reg = DependencyRegistry::new();
        assert!(reg.register("x", "y"));
        assert!(!reg.register("x", "y"));
        assert_eq!(reg.dependents("x"), &["y"]);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn many_to_many() {
        let mut reg = DependencyRegistry::new();
        reg.register("items", "subtotal");
        reg.register("items", "total");
        reg.register("tax_rate", "total");

        assert_eq!(reg.dependents("items"), &["subtotal", "total"]);
        assert_eq!(reg.dependents("tax_rate"), &["total"]);
        assert!(reg.depends_on("total", "tax_rate"));
        assert!(!reg.depends_on("subtotal", "tax_rate"));
        assert!(reg.dependents("unknown").is_empty());
    }

    #[test]
    fn on_write_invalidates_only_dependents() {
        let mut reg = DependencyRegistry::new();
        reg.register("x", "y");

        let mut store = CacheStore::new();
        let now = Instant::now();
        store.put("y", None, Rc::new(1), now);
        store.put("z", None, Rc::new(2), now);

        assert_eq!(reg.on_write("x", &mut store), 1);
        assert!(store.get("y", None, None, now).is_none());
        assert!(store.get("z", None, None, now).is_some());

        assert_eq!(reg.on_write("unrelated", &mut store), 0);
        assert!(store.get("z", None, None, now).is_some());
    }
}
