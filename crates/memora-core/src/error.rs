use thiserror::Error;

use crate::member::MemberKind;

pub type Result<T> = std::result::Result<T, MemoError>;

/// A memoized member was declared in a way the engine cannot install.
///
/// Raised during member setup, before anything is registered or intercepted
/// on the owner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("memoized member key must not be empty")]
    EmptyMemberKey,

    #[error("memoized member `{member}` has a zero ttl")]
    ZeroTtl { member: &'static str },

    #[error("memoized member `{member}` lists an empty dependency name")]
    EmptyDependency { member: &'static str },

    #[error("memoized member `{member}` lists dependency `{property}` more than once")]
    DuplicateDependency {
        member: &'static str,
        property: &'static str,
    },

    #[error("memoized member `{member}` depends on `{property}`, which the owner does not track")]
    UnknownDependency {
        member: &'static str,
        property: &'static str,
    },

    #[error("member `{member}` is already memoized as a {existing}, not a {requested}")]
    KindConflict {
        member: &'static str,
        existing: MemberKind,
        requested: MemberKind,
    },

    #[error("member `{member}` is already memoized with a different value type")]
    TypeConflict { member: &'static str },

    #[error("member `{member}` is already memoized with different options")]
    OptionsConflict { member: &'static str },
}

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("invalid memoization setup: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot derive args key for `{member}`: {source}")]
    ArgsKey {
        member: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl MemoError {
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(err) => Some(err),
            Self::ArgsKey { .. } => None,
        }
    }
}
