#![warn(clippy::uninlined_format_args)]

pub mod error;
pub mod installments;
pub mod loans;
pub mod ports;
pub mod rates;
pub mod shu;
pub mod wallet_ledger;

pub use error::{CoreError, EntityKind, StoreError};
pub use installments::{InstallmentPatch, InstallmentProcessor, InstallmentRequest};
pub use loans::{LoanBook, LoanPatch, LoanRequest};
pub use ports::{
    ActivityLedger, Clock, Finalization, InstallmentStore, LoanStore, MemberDirectory,
    NewAllocation, NewInstallment, NewLoan, NewRateOption, NewShuYear, NewTransaction, NewWallet,
    RateCatalog, ShuStore, TransactionStore, WalletStore,
};
pub use rates::{RateBook, RateOptionPatch};
pub use shu::{ShuReport, ShuReportEntry, ShuReporter, ShuYearPatch, YearCosts};
pub use wallet_ledger::WalletLedger;
