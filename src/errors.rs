/// Errors surfaced by the bridge.
///
/// The first four variants form the failure taxonomy the frame driver reacts to:
/// resource exhaustion stays local to one effect, a missing backend degrades
/// presentation for the session, misuse by an effect is ignored, and only
/// `Fatal` stops the driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("out of resources: {0}")]
    OutOfResources(String),

    #[error("render backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("protocol misuse: {0}")]
    ProtocolMisuse(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("invalid driver state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// True for errors an effect (or the driver) can continue after.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BridgeError::Fatal(_))
    }
}
