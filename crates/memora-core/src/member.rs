//! Memoized member declarations and the per-access algorithm.
//!
//! A [`Getter`] or [`Method`] is declared once, usually as a `const` next to
//! the owner's `impl`, and then invoked from the owner's accessor:
//!
//! ```
//! use memora_core::{Method, MemoOwner, MemoState};
//!
//! struct Calc {
//!     memo: MemoState,
//! }
//!
//! impl MemoOwner for Calc {
//!     fn memo(&self) -> &MemoState {
//!         &self.memo
//!     }
//! }
//!
//! const ADD: Method = Method::new("add");
//!
//! impl Calc {
//!     fn add(&self, a: i64, b: i64) -> memora_core::Result<i64> {
//!         ADD.call(self, (a, b), |_, (a, b)| a + b)
//!     }
//! }
//!
//! let calc = Calc { memo: MemoState::new() };
//! assert_eq!(calc.add(1, 2).unwrap(), 3);
//! assert_eq!(calc.add(1, 2).unwrap(), 3);
//! assert_eq!(calc.memo.stats().misses, 1);
//! ```
//!
//! # Access algorithm
//!
//! 1. On the first access for an owner, install the member: validate its
//!    options, register its dependencies and intercept each dependency
//!    property.
//! 2. Derive the args key (none for getters).
//! 3. Look the key up in the owner's cache store.
//! 4. A valid entry is returned as is.
//! 5. Otherwise run the compute body with the owner as receiver. A success is
//!    stored with the access time; a failure is returned and nothing is
//!    stored, so the next access retries.

use std::any::TypeId;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::args_key::ArgsKey;
use crate::error::{MemoError, Result};
use crate::options::MemoOptions;
use crate::state::{MemoOwner, prepare};

/// Whether a member is memoized as a getter or as a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// One cache entry per owner.
    Getter,
    /// One cache entry per owner and call signature.
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Getter => f.write_str("getter"),
            Self::Method => f.write_str("method"),
        }
    }
}

/// A memoized zero-argument computed member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Getter {
    key: &'static str,
    options: MemoOptions,
}

impl Getter {
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self::with_options(key, MemoOptions::new())
    }

    #[must_use]
    pub const fn with_options(key: &'static str, options: MemoOptions) -> Self {
        Self { key, options }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub const fn options(&self) -> &MemoOptions {
        &self.options
    }

    /// Cached value of this member on `owner`, computing it on a miss.
    pub fn get<O, T>(&self, owner: &O, compute: impl FnOnce(&O) -> T) -> Result<T>
    where
        O: MemoOwner + ?Sized,
        T: Clone + 'static,
    {
        self.try_get(owner, |o| Ok::<T, MemoError>(compute(o)))
    }

    /// Like [`get`](Self::get) for a fallible body. An `Err` from `compute`
    /// is returned unchanged and leaves the slot empty.
    pub fn try_get<O, T, E>(
        &self,
        owner: &O,
        compute: impl FnOnce(&O) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        O: MemoOwner + ?Sized,
        T: Clone + 'static,
        E: From<MemoError>,
    {
        access(owner, self.key, MemberKind::Getter, &self.options, || Ok(None), compute)
    }
}

/// A memoized method, cached per call signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    key: &'static str,
    options: MemoOptions,
}

impl Method {
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self::with_options(key, MemoOptions::new())
    }

    #[must_use]
    pub const fn with_options(key: &'static str, options: MemoOptions) -> Self {
        Self { key, options }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub const fn options(&self) -> &MemoOptions {
        &self.options
    }

    /// Cached result of calling this method with `args`.
    ///
    /// `args` is usually a tuple of the method's parameters; its structural
    /// encoding is the cache key (see [`ArgsKey::encode`]).
    pub fn call<O, A, T>(&self, owner: &O, args: A, compute: impl FnOnce(&O, A) -> T) -> Result<T>
    where
        O: MemoOwner + ?Sized,
        A: Serialize,
        T: Clone + 'static,
    {
        self.try_call(owner, args, |o, a| Ok::<T, MemoError>(compute(o, a)))
    }

    /// Like [`call`](Self::call) for a fallible body.
    pub fn try_call<O, A, T, E>(
        &self,
        owner: &O,
        args: A,
        compute: impl FnOnce(&O, A) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        O: MemoOwner + ?Sized,
        A: Serialize,
        T: Clone + 'static,
        E: From<MemoError>,
    {
        let member = self.key;
        // Encoded up front: `compute` takes `args` by value.
        let key = ArgsKey::encode(&args)
            .map(Some)
            .map_err(|source| MemoError::ArgsKey { member, source });
        access(
            owner,
            member,
            MemberKind::Method,
            &self.options,
            move || key,
            move |o| compute(o, args),
        )
    }

    /// Cached result for an explicit call-signature key, for arguments that
    /// have no structural encoding.
    pub fn call_keyed<O, T>(
        &self,
        owner: &O,
        key: ArgsKey,
        compute: impl FnOnce(&O) -> T,
    ) -> Result<T>
    where
        O: MemoOwner + ?Sized,
        T: Clone + 'static,
    {
        access(
            owner,
            self.key,
            MemberKind::Method,
            &self.options,
            move || Ok(Some(key)),
            |o| Ok::<T, MemoError>(compute(o)),
        )
    }
}

fn access<O, T, E>(
    owner: &O,
    member: &'static str,
    kind: MemberKind,
    options: &MemoOptions,
    args_key: impl FnOnce() -> Result<Option<ArgsKey>>,
    compute: impl FnOnce(&O) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    O: MemoOwner + ?Sized,
    T: Clone + 'static,
    E: From<MemoError>,
{
    if let Err(err) = prepare(owner, member, kind, options, TypeId::of::<T>()) {
        warn!(member, %kind, error = %err, "memoized member rejected");
        return Err(MemoError::from(err).into());
    }
    let args = args_key()?;

    let state = owner.memo();
    let now = state.now();
    let shared = state.shared();
    if let Some(value) = shared
        .borrow_mut()
        .lookup::<T>(member, args.as_ref(), options.ttl(), now)
    {
        return Ok(value);
    }

    let value = compute(owner)?;
    shared
        .borrow_mut()
        .store(member, args, value.clone(), now);
    Ok(value)
}
