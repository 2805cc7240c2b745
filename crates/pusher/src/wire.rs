//! Wire representation used by the remote pusher client/service pair.
//! Plain JSON over HTTP instead of the source's protobuf/tcprpc framing —
//! same field set, same zero-value-omission rule for `hash`/`sign`.

use serde::{Deserialize, Serialize};

use qdp_primitives::{AccId, Hash, Id, PublicKey, Settings, Sign, Txn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTxn {
    pub id: u64,
    pub sender: u64,
    pub receiver: u64,
    pub amount: i64,
    pub balance: i64,
    pub spent_by: u64,
    pub settings_id: u64,
    pub prev_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
}

impl From<&Txn> for WireTxn {
    fn from(t: &Txn) -> Self {
        WireTxn {
            id: t.id.0,
            sender: t.sender.0,
            receiver: t.receiver.0,
            amount: t.amount,
            balance: t.balance,
            spent_by: t.spent_by.0,
            settings_id: t.settings_id.0,
            prev_hash: t.prev_hash.to_string(),
            hash: (!t.hash.is_zero()).then(|| t.hash.to_string()),
            sign: (!t.sign.is_zero()).then(|| t.sign.to_string()),
        }
    }
}

/// Errors converting a [`WireTxn`] back into a [`Txn`]: any hex field with
/// the wrong byte length after decoding is rejected rather than silently
/// zero-padded or truncated.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid {field} for txn id={id} sender={sender}: {source}")]
    Field {
        field: &'static str,
        id: u64,
        sender: u64,
        #[source]
        source: qdp_primitives::PrimitivesError,
    },
}

impl TryFrom<WireTxn> for Txn {
    type Error = WireError;

    fn try_from(w: WireTxn) -> Result<Self, Self::Error> {
        let field_err = |field, source| WireError::Field { field, id: w.id, sender: w.sender, source };

        let prev_hash: Hash = w
            .prev_hash
            .parse()
            .map_err(|e| field_err("prev_hash", e))?;
        let hash = match w.hash {
            Some(ref h) => h.parse().map_err(|e| field_err("hash", e))?,
            None => Hash::ZERO,
        };
        let sign = match w.sign {
            Some(ref s) => s.parse().map_err(|e| field_err("sign", e))?,
            None => Sign::ZERO,
        };

        Ok(Txn {
            id: Id(w.id),
            sender: AccId(w.sender),
            receiver: AccId(w.receiver),
            amount: w.amount,
            balance: w.balance,
            settings_id: Id(w.settings_id),
            spent_by: Id(w.spent_by),
            prev_hash,
            hash,
            sign,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSettings {
    pub id: u64,
    pub account: u64,
    pub hash: String,
    pub prev_hash: String,
    pub public_key: String,
    pub sign: String,
    pub data_hash: String,
    pub verify_transfer_sign: bool,
}

impl From<&Settings> for WireSettings {
    fn from(s: &Settings) -> Self {
        WireSettings {
            id: s.id.0,
            account: s.account.0,
            hash: s.hash.to_string(),
            prev_hash: s.prev_hash.to_string(),
            public_key: s.public_key.to_string(),
            sign: s.sign.to_string(),
            data_hash: s.data_hash.to_string(),
            verify_transfer_sign: s.verify_transfer_sign,
        }
    }
}

impl TryFrom<WireSettings> for Settings {
    type Error = String;

    fn try_from(w: WireSettings) -> Result<Self, Self::Error> {
        Ok(Settings {
            id: Id(w.id),
            account: AccId(w.account),
            public_key: w.public_key.parse::<PublicKey>().map_err(|e| e.to_string())?,
            prev_hash: w.prev_hash.parse::<Hash>().map_err(|e| e.to_string())?,
            hash: w.hash.parse::<Hash>().map_err(|e| e.to_string())?,
            verify_transfer_sign: w.verify_transfer_sign,
            data_hash: w.data_hash.parse::<Hash>().map_err(|e| e.to_string())?,
            sign: w.sign.parse::<Sign>().map_err(|e| e.to_string())?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub txns: Vec<WireTxn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub code: PushCode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushCode {
    Ok,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettingsRequest {
    pub settings: WireSettings,
}
