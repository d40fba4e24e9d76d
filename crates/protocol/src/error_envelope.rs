use ecto_domain::EctoError;
use serde::Serialize;

/// The JSON body every failed RPC call returns.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ecto_code: u32,
    pub ecto_error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&EctoError> for ErrorEnvelope {
    fn from(e: &EctoError) -> Self {
        let retry_after = match e {
            EctoError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        Self { ecto_code: e.ecto_code(), ecto_error: e.to_string(), retry_after }
    }
}
