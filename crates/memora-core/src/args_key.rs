//! Cache keys for memoized method calls.
//!
//! A method's argument tuple is encoded structurally with `serde_json`, so
//! two calls share an entry exactly when their arguments serialize to the
//! same JSON text. Map-typed arguments should use ordered maps (`BTreeMap`);
//! a `HashMap` argument serializes in iteration order and may produce
//! different keys for equal maps.
//!
//! Arguments that cannot be serialized (opaque handles, cyclic graphs) need an
//! explicit key: see [`ArgsKey::explicit`] and
//! [`Method::call_keyed`](crate::Method::call_keyed).

use std::fmt;

use serde::Serialize;

/// Identifies one call signature of a memoized method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgsKey {
    /// Structural JSON encoding of the argument tuple.
    Encoded(String),
    /// Caller-chosen key. Never equal to an encoded key.
    Explicit(String),
}

impl ArgsKey {
    /// Encode `args` structurally.
    pub fn encode<A: Serialize + ?Sized>(args: &A) -> serde_json::Result<Self> {
        serde_json::to_string(args).map(Self::Encoded)
    }

    #[must_use]
    pub fn explicit(key: impl Into<String>) -> Self {
        Self::Explicit(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Encoded(s) | Self::Explicit(s) => s,
        }
    }
}

impl fmt::Display for ArgsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoded(s) => f.write_str(s),
            Self::Explicit(s) => write!(f, "#{s}"),
        }
    }
}
