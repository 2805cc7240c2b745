use qdp_primitives::{AccId, Hash, Id, PublicKey, Settings, Sign, Transfer, TransferItem};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("empty batch, no receivers")]
    EmptyBatch,
    #[error("{field} is too long ({got}>{want})")]
    TooLong { field: &'static str, got: usize, want: usize },
    #[error("{field} is too short ({got}<{want})")]
    TooShort { field: &'static str, got: usize, want: usize },
    #[error("invalid {field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: qdp_primitives::PrimitivesError,
    },
}

/// A hex string must be empty (zero value) or exactly `want_bytes * 2`
/// characters; anything else is rejected rather than silently padded or
/// truncated.
fn validate_hex_len(s: &str, want_bytes: usize, field: &'static str) -> Result<(), ValidationError> {
    let want = want_bytes * 2;
    if s.len() > want {
        return Err(ValidationError::TooLong { field, got: s.len(), want });
    }
    if !s.is_empty() && s.len() < want {
        return Err(ValidationError::TooShort { field, got: s.len(), want });
    }
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
pub struct TransferRequest {
    pub sender: u64,
    pub batch: Vec<TransferItemRequest>,
    pub settings_id: u64,
    #[serde(default)]
    pub prev_hash: String,
    #[serde(default)]
    pub sign: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct TransferItemRequest {
    pub receiver: u64,
    pub amount: i64,
}

pub fn transfer_from_request(req: TransferRequest) -> Result<Transfer, ValidationError> {
    if req.batch.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    validate_hex_len(&req.prev_hash, 32, "prev_hash")?;
    validate_hex_len(&req.sign, 72, "sign")?;

    let prev_hash: Hash = req
        .prev_hash
        .parse()
        .map_err(|source| ValidationError::Field { field: "prev_hash", source })?;
    let sign: Sign = req
        .sign
        .parse()
        .map_err(|source| ValidationError::Field { field: "sign", source })?;

    let batch = req
        .batch
        .into_iter()
        .map(|item| TransferItem { receiver: AccId(item.receiver), amount: item.amount })
        .collect();

    Ok(Transfer {
        sender: AccId(req.sender),
        batch,
        sign,
        prev_hash,
        settings_id: Id(req.settings_id),
    })
}

#[derive(Debug, serde::Deserialize)]
pub struct SettingsRequest {
    pub account: u64,
    pub verify_transfer_sign: bool,
    #[serde(default)]
    pub prev_hash: String,
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub public_key: String,
}

pub fn settings_from_request(req: SettingsRequest) -> Result<Settings, ValidationError> {
    validate_hex_len(&req.prev_hash, 32, "prev_hash")?;
    validate_hex_len(&req.sign, 72, "sign")?;

    let prev_hash: Hash = req
        .prev_hash
        .parse()
        .map_err(|source| ValidationError::Field { field: "prev_hash", source })?;
    let sign: Sign = req
        .sign
        .parse()
        .map_err(|source| ValidationError::Field { field: "sign", source })?;
    let public_key: PublicKey = req
        .public_key
        .parse()
        .map_err(|source| ValidationError::Field { field: "public_key", source })?;

    Ok(Settings {
        id: Id(0),
        account: AccId(req.account),
        public_key,
        prev_hash,
        hash: Hash::ZERO,
        verify_transfer_sign: req.verify_transfer_sign,
        data_hash: Hash::ZERO,
        sign,
    })
}
