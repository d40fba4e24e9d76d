//! Shared error type and the `ecto_code` taxonomy.
//!
//! Every rejectable outcome in the mutation pipeline, the permission engine,
//! and the realtime protocol resolves to one of these variants. Handlers in
//! `ecto-gateway` translate a variant to an HTTP status + JSON envelope
//! `{ "ecto_code": <u32>, "ecto_error": "<message>" }`; the WS layer maps
//! the same errors onto close codes or inline frame rejections.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EctoError {
    #[error("{message}")]
    Validation { code: u32, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("insufficient permissions")]
    Forbidden,

    #[error("hierarchy violation: {0}")]
    Hierarchy(String),

    #[error("not found: {message}")]
    NotFound { code: u32, message: String },

    #[error("conflict: {message}")]
    Conflict { code: u32, message: String },

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("voice backend error: {code}: {message}")]
    Voice { code: u32, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl EctoError {
    /// The numeric `ecto_code` surfaced to clients.
    pub fn ecto_code(&self) -> u32 {
        match self {
            EctoError::Validation { code, .. } => *code,
            EctoError::Auth(_) => 1000,
            EctoError::Forbidden => codes::FORBIDDEN,
            EctoError::Hierarchy(_) => codes::HIERARCHY,
            EctoError::NotFound { code, .. } => *code,
            EctoError::Conflict { code, .. } => *code,
            EctoError::RateLimited { .. } => codes::SLOWMODE,
            EctoError::Quota(_) => 1002,
            EctoError::Database(_) => 9000,
            EctoError::Storage(_) => 9001,
            EctoError::Voice { code, .. } => *code,
            EctoError::Internal(_) => 9999,
        }
    }

    pub fn not_found(code: u32, message: impl Into<String>) -> Self {
        EctoError::NotFound { code, message: message.into() }
    }

    pub fn validation(code: u32, message: impl Into<String>) -> Self {
        EctoError::Validation { code, message: message.into() }
    }

    pub fn conflict(code: u32, message: impl Into<String>) -> Self {
        EctoError::Conflict { code, message: message.into() }
    }

    pub fn database(e: impl std::fmt::Display) -> Self {
        EctoError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EctoError>;

/// Well-known `ecto_code` constants referenced throughout the mutation
/// pipeline.
pub mod codes {
    pub const VALIDATION: u32 = 1001;
    pub const USERNAME_TAKEN: u32 = 1003;
    pub const USER_NOT_FOUND: u32 = 1004;
    pub const SERVER_NOT_FOUND: u32 = 2000;
    pub const NOT_A_MEMBER: u32 = 2002;
    pub const BANNED: u32 = 2003;
    pub const INVITE_INVALID: u32 = 2004;
    pub const CHANNEL_NOT_FOUND: u32 = 3000;
    pub const CONTENT_INVALID: u32 = 3001;
    pub const WRONG_CHANNEL_TYPE: u32 = 3002;
    pub const PAGE_VERSION_CONFLICT: u32 = 3003;
    pub const SLOWMODE: u32 = 3004;
    pub const MESSAGE_NOT_FOUND: u32 = 4000;
    pub const ROLE_NOT_FOUND: u32 = 5000;
    pub const FORBIDDEN: u32 = 5001;
    pub const HIERARCHY: u32 = 5004;
    pub const DM_NOT_FOUND: u32 = 6001;
    pub const DM_NOT_A_RECIPIENT: u32 = 6002;
    pub const DM_DMS_DISABLED: u32 = 6003;
    pub const DM_SELF: u32 = 6004;
    pub const DM_CONTENT_INVALID: u32 = 6005;
    pub const VOICE_CHANNEL_FULL: u32 = 8000;
    pub const VOICE_NOT_VOICE_CHANNEL: u32 = 8001;
    pub const VOICE_ROUTER_UNAVAILABLE: u32 = 8002;
    pub const VOICE_WORKER_DIED: u32 = 8003;
}
