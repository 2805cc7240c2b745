use qdp_preloader::PreloaderError;
use qdp_primitives::PusherError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    #[error("batch has no receivers")]
    NoReceivers,
    #[error("prev_hash does not match the sender's chain head")]
    InvalidPrevHash,
    #[error("sender account would go negative")]
    NoBalance,
    #[error("settings_id does not match the sender's current settings")]
    InvalidSettingsId,
    #[error("signature missing, malformed, or fails verification")]
    InvalidSign,
    #[error("prev_hash does not match the settings chain head")]
    InvalidSettingsPrevHash,
    #[error("durable fetch in flight: {0}")]
    Preloading(#[from] PreloaderError),
    #[error("downstream push failed: {0}")]
    Push(#[from] PusherError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessorError {
    /// Short, stable label for structured logging and dashboards.
    pub fn to_metric(&self) -> &'static str {
        match self {
            ProcessorError::NoReceivers => "no_receivers",
            ProcessorError::InvalidPrevHash => "invalid_prev_hash",
            ProcessorError::NoBalance => "no_balance",
            ProcessorError::InvalidSettingsId => "invalid_settings_id",
            ProcessorError::InvalidSign => "invalid_sign",
            ProcessorError::InvalidSettingsPrevHash => "invalid_settings_prev_hash",
            ProcessorError::Preloading(_) => "preloading",
            ProcessorError::Push(_) => "push",
            ProcessorError::Internal(_) => "internal",
        }
    }
}
