#![forbid(unsafe_code)]

//! Per-instance memoization of computed members.
//!
//! An owner type embeds a [`MemoState`] and declares its memoized members as
//! [`Getter`] and [`Method`] constants. Each member caches its result per
//! owner instance, is invalidated when one of its declared dependency
//! properties (an [`Observable`] field) is written, and optionally expires
//! after a time-to-live.
//!
//! - [`store`]: cache entries keyed by member and call signature.
//! - [`registry`]: dependency property -> dependent members.
//! - [`intercept`]: write hooks on dependency properties.
//! - [`member`]: declarations and the access algorithm.
//! - [`memoized`]: [`Memoized<T>`], a standalone value with explicit
//!   invalidation.
//!
//! Everything is single-threaded (`Rc`/`RefCell`). State is created on first
//! access and dropped with the owner; nothing outside the owner keeps it
//! alive.

pub mod args_key;
pub mod clock;
pub mod error;
pub mod intercept;
pub mod member;
pub mod memoized;
pub mod observable;
pub mod options;
pub mod registry;
pub mod state;
pub mod store;

pub use args_key::ArgsKey;
pub use clock::{Clock, LabClock};
pub use error::{ConfigError, MemoError, Result};
pub use intercept::Intercept;
pub use member::{Getter, MemberKind, Method};
pub use memoized::Memoized;
pub use observable::{Observable, Subscription};
pub use options::MemoOptions;
pub use state::{MemoOwner, MemoState, MemoStats};
pub use store::SlotState;
