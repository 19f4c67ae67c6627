//! Store and collaborator interfaces the services depend on.
//!
//! Implementations live outside the core (kopera-infrastructure ships the
//! in-memory ones). The two-entity commits (`finalize`, `insert_applied`,
//! `commit_verification`) are the spec's atomic units: record write plus
//! balance/counter effect in one linearizable-per-entity commit, with the
//! domain state machines as the gate.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use kopera_domain::{
    AllocationId, Installment, InstallmentId, InstallmentStatus, InterestRateOption, Loan, LoanId,
    LoanStatus, MemberId, MemberShuAllocation, Money, RateOptionId, ShuRecordId, ShuStatus,
    ShuYearRecord,
    SurplusComponents, TransactionId, TransactionKind, TransactionStatus, VerificationOutcome,
    Wallet, WalletCategory, WalletId, WalletTransaction,
};
use rust_decimal::Decimal;

use crate::error::StoreError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Membership directory: an external collaborator, read-only here.
pub trait MemberDirectory: Send + Sync {
    fn exists(&self, member: MemberId) -> bool;
    /// The admin who registered this member, if any.
    fn registrar_of(&self, member: MemberId) -> Option<MemberId>;
    /// Display label used on reports only.
    fn email_of(&self, member: MemberId) -> Option<String>;
}

#[derive(Clone, Debug)]
pub struct NewWallet {
    pub member: MemberId,
    pub category: WalletCategory,
    pub description: String,
}

pub trait WalletStore: Send + Sync {
    /// Fails `Duplicate` when the member already holds a wallet in the
    /// category.
    fn insert(&self, wallet: NewWallet) -> Result<Wallet, StoreError>;
    fn get(&self, id: WalletId) -> Result<Wallet, StoreError>;
    fn find(&self, member: MemberId, category: WalletCategory) -> Result<Wallet, StoreError>;
    fn of_member(&self, member: MemberId) -> Vec<Wallet>;
    fn all(&self) -> Vec<Wallet>;
}

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub wallet: WalletId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub description: String,
    pub status: TransactionStatus,
    pub verified_by: Option<MemberId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
pub struct Finalization {
    pub verified_by: MemberId,
    pub verified_at: DateTime<Utc>,
    pub approve: bool,
}

pub trait TransactionStore: Send + Sync {
    fn insert(&self, tx: NewTransaction) -> Result<WalletTransaction, StoreError>;
    fn get(&self, id: TransactionId) -> Result<WalletTransaction, StoreError>;
    fn of_wallet(&self, wallet: WalletId) -> Vec<WalletTransaction>;
    fn pending(&self) -> Vec<WalletTransaction>;

    /// Atomic commit: drive the transaction through
    /// `WalletTransaction::finalize` and apply the returned delta to the
    /// owning wallet. Concurrent calls touching the same wallet must be
    /// serialized; a transaction no longer pending fails
    /// `Rejected(TransactionFinalized)` with nothing written.
    fn finalize(
        &self,
        id: TransactionId,
        update: Finalization,
    ) -> Result<(WalletTransaction, Wallet), StoreError>;

    /// Atomic commit: insert an already-verified adjustment and apply its
    /// delta through `Wallet::apply_delta`. An overdrawing delta fails
    /// `Rejected(BalanceOverdrawn)` with nothing written.
    fn insert_applied(
        &self,
        tx: NewTransaction,
    ) -> Result<(WalletTransaction, Wallet), StoreError>;
}

#[derive(Clone, Debug)]
pub struct NewLoan {
    pub code: String,
    pub member: MemberId,
    pub principal: Money,
    pub interest_percent: Decimal,
    pub rate_option: Option<RateOptionId>,
    pub term_months: u32,
    pub installment_amount: Money,
    pub remaining_installments: u32,
    pub status: LoanStatus,
    pub borrowed_at: DateTime<Utc>,
    pub disbursement_account: Option<String>,
    pub disbursement_bank: Option<String>,
}

pub trait LoanStore: Send + Sync {
    /// Fails `Duplicate` on a taken loan code.
    fn insert(&self, loan: NewLoan) -> Result<Loan, StoreError>;
    fn get(&self, id: LoanId) -> Result<Loan, StoreError>;
    fn of_member(&self, member: MemberId) -> Vec<Loan>;
    fn all(&self) -> Vec<Loan>;
    fn update(&self, loan: &Loan) -> Result<(), StoreError>;
    fn remove(&self, id: LoanId) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
pub struct NewInstallment {
    pub loan: LoanId,
    pub member: MemberId,
    pub sequence: u32,
    pub paid_at: DateTime<Utc>,
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
    pub total: Money,
    pub status: InstallmentStatus,
}

pub trait InstallmentStore: Send + Sync {
    /// Fails `Duplicate` when the loan already has the sequence number.
    fn insert(&self, installment: NewInstallment) -> Result<Installment, StoreError>;
    fn get(&self, id: InstallmentId) -> Result<Installment, StoreError>;
    fn of_loan(&self, loan: LoanId) -> Vec<Installment>;
    fn all(&self) -> Vec<Installment>;
    fn count_for_loan(&self, loan: LoanId) -> u32;
    fn with_status(&self, status: InstallmentStatus) -> Vec<Installment>;
    fn update(&self, installment: &Installment) -> Result<(), StoreError>;
    fn remove(&self, id: InstallmentId) -> Result<(), StoreError>;

    /// Atomic commit: drive the installment through `Installment::verify`
    /// and, for a `Verified` outcome, advance the owning loan via
    /// `Loan::register_verified_installment` in the same unit. Serialized
    /// per loan; an installment no longer submitted fails
    /// `Rejected(InstallmentFinalized)` with nothing written.
    fn commit_verification(
        &self,
        id: InstallmentId,
        outcome: VerificationOutcome,
    ) -> Result<(Installment, Loan), StoreError>;
}

#[derive(Clone, Debug)]
pub struct NewShuYear {
    pub year: i32,
    pub total: Money,
    pub computed_at: DateTime<Utc>,
    pub status: ShuStatus,
    pub breakdown: Option<SurplusComponents>,
}

#[derive(Clone, Debug)]
pub struct NewAllocation {
    pub record: ShuRecordId,
    pub member: MemberId,
    pub capital_share: Money,
    pub activity_share: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

pub trait ShuStore: Send + Sync {
    /// Fails `Duplicate` when the year already has a record.
    fn insert_year(&self, record: NewShuYear) -> Result<ShuYearRecord, StoreError>;
    fn year(&self, id: ShuRecordId) -> Result<ShuYearRecord, StoreError>;
    fn year_of(&self, year: i32) -> Result<ShuYearRecord, StoreError>;
    /// Newest year first.
    fn years(&self) -> Vec<ShuYearRecord>;
    fn update_year(&self, record: &ShuYearRecord) -> Result<(), StoreError>;
    fn remove_year(&self, id: ShuRecordId) -> Result<(), StoreError>;

    /// Fails `Duplicate` when the (record, member) pair already has an
    /// allocation — allocations are write-once.
    fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<MemberShuAllocation, StoreError>;
    fn allocation(
        &self,
        record: ShuRecordId,
        member: MemberId,
    ) -> Result<MemberShuAllocation, StoreError>;
    fn allocation_by_id(&self, id: AllocationId) -> Result<MemberShuAllocation, StoreError>;
    fn allocations_of_record(&self, record: ShuRecordId) -> Vec<MemberShuAllocation>;
    fn allocations_of_member(&self, member: MemberId) -> Vec<MemberShuAllocation>;
    fn remove_allocation(&self, id: AllocationId) -> Result<(), StoreError>;
}

/// Year-scoped aggregates over stored ledger and loan history. Maps are
/// ordered ascending by member id so downstream reports are deterministic.
pub trait ActivityLedger: Send + Sync {
    fn total_savings(&self, year: i32) -> Money;
    fn savings_by_member(&self, year: i32) -> IndexMap<MemberId, Money>;
    fn total_loan_principal(&self, year: i32) -> Money;
    fn loan_principal_by_member(&self, year: i32) -> IndexMap<MemberId, Money>;
    /// Interest collected on verified installments within the year — the
    /// operating-income input of the automated surplus path.
    fn verified_interest_income(&self, year: i32) -> Money;
}

#[derive(Clone, Debug)]
pub struct NewRateOption {
    pub name: String,
    pub percent: Decimal,
    pub description: String,
    pub active: bool,
    pub created_by: MemberId,
}

pub trait RateCatalog: Send + Sync {
    fn insert(&self, option: NewRateOption) -> Result<InterestRateOption, StoreError>;
    fn get(&self, id: RateOptionId) -> Result<InterestRateOption, StoreError>;
    fn active(&self) -> Vec<InterestRateOption>;
    fn all(&self) -> Vec<InterestRateOption>;
    fn update(&self, option: &InterestRateOption) -> Result<(), StoreError>;
    fn remove(&self, id: RateOptionId) -> Result<(), StoreError>;
}
