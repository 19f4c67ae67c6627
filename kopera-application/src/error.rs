use std::fmt;

use kopera_domain::DomainViolation;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Member,
    Wallet,
    Transaction,
    Loan,
    Installment,
    ShuYear,
    ShuAllocation,
    RateOption,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Member => "member",
            Self::Wallet => "wallet",
            Self::Transaction => "wallet transaction",
            Self::Loan => "loan",
            Self::Installment => "installment",
            Self::ShuYear => "annual SHU record",
            Self::ShuAllocation => "member SHU allocation",
            Self::RateOption => "interest rate option",
        })
    }
}

/// Failure taxonomy returned by every core operation. The boundary layer
/// maps these to transport shapes; the core never retries.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(EntityKind),
    #[error("operation not permitted for this actor")]
    Forbidden,
    #[error("amount out of range")]
    InvalidAmount,
    #[error("record was already processed")]
    AlreadyProcessed,
    #[error("{0} already exists")]
    Conflict(EntityKind),
    #[error("wallet balance would become negative")]
    InsufficientBalance,
    #[error("store failure: {0}")]
    Store(String),
}

impl CoreError {
    /// Maps a mechanical store fault onto the taxonomy, naming the entity
    /// the failed call was about.
    pub(crate) fn from_store(err: StoreError, kind: EntityKind) -> Self {
        match err {
            StoreError::Missing => Self::NotFound(kind),
            StoreError::Duplicate => Self::Conflict(kind),
            StoreError::Rejected(DomainViolation::BalanceOverdrawn) => Self::InsufficientBalance,
            StoreError::Rejected(_) => Self::AlreadyProcessed,
            StoreError::Backend(detail) => Self::Store(detail),
        }
    }
}

/// Faults a store adapter can raise. `Rejected` carries a domain rule that
/// aborted an atomic commit; the adapter must have written nothing.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    Missing,
    #[error("uniqueness constraint violated")]
    Duplicate,
    #[error("write rejected: {0}")]
    Rejected(DomainViolation),
    #[error("backend failure: {0}")]
    Backend(String),
}
