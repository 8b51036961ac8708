//! Per-member memoization options.

use web_time::Duration;

use crate::error::ConfigError;

/// Options a memoized member opts in with: an optional time-to-live and the
/// owner properties whose writes clear the member's cache.
///
/// Built with `const fn`s so declarations can live in `const` items:
///
/// ```
/// use memora_core::MemoOptions;
///
/// const TOTAL: MemoOptions = MemoOptions::new()
///     .with_ttl_ms(5_000)
///     .with_clear_on(&["items", "tax_rate"]);
///
/// assert_eq!(TOTAL.clear_on(), &["items", "tax_rate"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoOptions {
    ttl: Option<Duration>,
    clear_on: &'static [&'static str],
}

impl MemoOptions {
    /// No TTL, no dependencies.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: None,
            clear_on: &[],
        }
    }

    #[must_use]
    pub const fn with_ttl(self, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..self
        }
    }

    #[must_use]
    pub const fn with_ttl_ms(self, ms: u64) -> Self {
        self.with_ttl(Duration::from_millis(ms))
    }

    #[must_use]
    pub const fn with_clear_on(self, properties: &'static [&'static str]) -> Self {
        Self {
            clear_on: properties,
            ..self
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    #[must_use]
    pub const fn clear_on(&self) -> &'static [&'static str] {
        self.clear_on
    }

    /// Reject declarations the engine cannot install for `member`.
    pub(crate) fn validate(&self, member: &'static str) -> Result<(), ConfigError> {
        if member.is_empty() {
            return Err(ConfigError::EmptyMemberKey);
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(ConfigError::ZeroTtl { member });
        }
        for (i, &property) in self.clear_on.iter().enumerate() {
            if property.is_empty() {
                return Err(ConfigError::EmptyDependency { member });
            }
            if self.clear_on[..i].contains(&property) {
                return Err(ConfigError::DuplicateDependency { member, property });
            }
        }
        Ok(())
    }
}
