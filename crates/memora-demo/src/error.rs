use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("memoization error: {0}")]
    Memo(#[from] memora_core::MemoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot install log subscriber: {message}")]
    Logging { message: String },

    #[error("weather station offline after {attempts} attempt(s)")]
    StationOffline { attempts: u32 },
}

impl DemoError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Memo(err) if err.is_config() => 2,
            _ => 1,
        }
    }
}
