//! Write interception for dependency properties.
//!
//! Memoization never rewrites an owner's fields. Instead each dependency
//! property is something that implements [`Intercept`] (normally an
//! [`Observable`]), and the engine attaches one write hook per
//! (owner, property). The property's own write semantics run first; the hook
//! runs after and only forwards the write to the owner's dependency registry.

use std::rc::Rc;

use ahash::AHashSet;

use crate::observable::{Observable, Subscription};

/// Hook invoked after a dependency property accepted a write.
pub type WriteHook = Rc<dyn Fn()>;

/// A property that can report its writes.
pub trait Intercept {
    /// Run `hook` after every write, for as long as the returned
    /// [`Subscription`] lives.
    fn on_write(&self, hook: WriteHook) -> Subscription;
}

impl<T: 'static> Intercept for Observable<T> {
    fn on_write(&self, hook: WriteHook) -> Subscription {
        self.subscribe(move |_| hook())
    }
}

/// Per-owner interception bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct Interceptor {
    /// Installed-properties marker.
    installed: AHashSet<&'static str>,
    /// Keeps the installed hooks alive for the owner's lifetime.
    subscriptions: Vec<Subscription>,
}

impl Interceptor {
    pub(crate) fn is_installed(&self, property: &str) -> bool {
        self.installed.contains(property)
    }

    /// Attach `hook` to `target` unless `property` is already intercepted.
    /// Returns `true` if a hook was installed.
    pub(crate) fn ensure_intercepted(
        &mut self,
        property: &'static str,
        target: &dyn Intercept,
        hook: impl FnOnce() -> WriteHook,
    ) -> bool {
        if !self.installed.insert(property) {
            return false;
        }
        self.subscriptions.push(target.on_write(hook()));
        true
    }

    #[cfg(test)]
    pub(crate) fn installed_count(&self) -> usize {
        self.installed.len()
    }
}
