use qdp_bigchain::BigChainError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PreloaderError {
    #[error("durable fetch failed: {0}")]
    BigChain(#[from] BigChainError),
    #[error("durable fetch deadline exceeded")]
    Timeout,
    #[error("preload task failed: {0}")]
    Internal(String),
}
