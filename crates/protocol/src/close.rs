/// WebSocket close codes in the 4000-4999 (application) range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    UnknownError,
    InvalidPayload,
    ProtocolVersionMismatch,
    NotAuthenticated,
    AuthenticationFailed,
    SessionTimeout,
    AlreadyAuthenticated,
}

impl CloseCode {
    pub const fn code(self) -> u16 {
        match self {
            CloseCode::UnknownError => 4000,
            CloseCode::InvalidPayload => 4001,
            CloseCode::ProtocolVersionMismatch => 4002,
            CloseCode::NotAuthenticated => 4003,
            CloseCode::AuthenticationFailed => 4004,
            CloseCode::SessionTimeout => 4005,
            CloseCode::AlreadyAuthenticated => 4006,
        }
    }

    /// `4003` is reused for forced disconnects with a human reason
    /// ("Kicked", "Banned") rather than a distinct code.
    pub const FORCED_DISCONNECT: u16 = 4003;
}
