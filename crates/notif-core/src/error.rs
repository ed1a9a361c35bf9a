use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

/// Reasons an operation against the engine's core can fail.
///
/// Only the store-backed paths ([`crate::store::KvStore`] being unreachable
/// in a real deployment, config loading) return these. Everything the
/// decision pipeline itself can absorb becomes a [`crate::decision::Decision`]
/// instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum EngineReason {
    #[error("kv store unavailable")]
    StoreUnavailable,
    #[error("rule definition invalid")]
    InvalidRule,
    #[error("config error")]
    Config,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for EngineReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::StoreUnavailable => 1001,
            Self::InvalidRule => 1002,
            Self::Config => 1003,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type EngineError = StructError<EngineReason>;
pub type EngineResult<T> = Result<T, EngineError>;
