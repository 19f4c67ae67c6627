#![warn(clippy::uninlined_format_args)]

pub mod model;
pub mod services;

pub use model::{
    AllocationId, DomainViolation, Installment, InstallmentId, InstallmentStatus,
    InterestRateOption, Loan, LoanId, LoanStatus, MemberId, MemberShuAllocation, Money,
    RateOptionId, ShuRecordId, ShuStatus, ShuYearRecord, SurplusComponents, TransactionId,
    TransactionKind, TransactionStatus, UnknownCategory, VerificationOutcome, Wallet,
    WalletCategory, WalletId, WalletTransaction,
};
pub use services::{
    AccessPolicy, Actor, AdminVisibility, AllocationRates, ListScope, MemberActivity,
    MemberAllocation, PolicyConfig, Role, ShuCalculator, ShuDistribution,
};
