use std::fmt;
use std::str::FromStr;

use crate::error::PrimitivesError;

/// Unique account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AccId(pub u64);

/// The mint account, exempt from the non-negative balance rule.
pub const MINT_ACCOUNT: AccId = AccId(0);

impl From<u64> for AccId {
    fn from(v: u64) -> Self {
        AccId(v)
    }
}

impl fmt::Display for AccId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AccId(s.parse()?))
    }
}

/// A transaction or settings id. Starts at 1 and increases per account, separately
/// for transactions and settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Id(pub u64);

impl From<u64> for Id {
    fn from(v: u64) -> Self {
        Id(v)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Id {
    pub fn next(self) -> Id {
        Id(self.0 + 1)
    }
}

/// Unique id for a transaction across all accounts: `(sender account, per-account id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId {
    pub acc: AccId,
    pub id: Id,
}

impl TxnId {
    pub fn new(acc: AccId, id: Id) -> Self {
        TxnId { acc, id }
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.acc, self.id)
    }
}

impl FromStr for TxnId {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (acc, id) = s.split_once('_').ok_or(PrimitivesError::InvalidHash)?;
        let acc: u64 = acc.parse().map_err(|_| PrimitivesError::InvalidHash)?;
        let id: u64 = id.parse().map_err(|_| PrimitivesError::InvalidHash)?;
        Ok(TxnId::new(AccId(acc), Id(id)))
    }
}

/// Unique id for a settings record across all accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SettingsId {
    pub acc: AccId,
    pub id: Id,
}

impl SettingsId {
    pub fn new(acc: AccId, id: Id) -> Self {
        SettingsId { acc, id }
    }
}

impl fmt::Display for SettingsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.acc, self.id)
    }
}
