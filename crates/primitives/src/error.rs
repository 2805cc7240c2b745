#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    #[error("invalid hash string")]
    InvalidHash,
    #[error("invalid sign string")]
    InvalidSign,
    #[error("invalid public key")]
    InvalidPublicKey,
}
