//! In-memory store adapters.
//!
//! Entity maps are concurrent; the two-entity commits take the owning
//! wallet/loan entry first and hold it across the whole unit, so operations
//! on the same wallet or loan are serialized and a lost race surfaces as a
//! domain rejection instead of a double-applied effect.

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::Datelike;
use dashmap::{mapref::entry::Entry, DashMap};
use indexmap::IndexMap;
use kopera_application::{
    error::StoreError,
    ports::{
        ActivityLedger, Finalization, InstallmentStore, LoanStore, MemberDirectory, NewAllocation,
        NewInstallment, NewLoan, NewRateOption, NewShuYear, NewTransaction, NewWallet,
        RateCatalog, ShuStore, TransactionStore, WalletStore,
    },
};
use kopera_domain::{
    AllocationId, Installment, InstallmentId, InstallmentStatus, InterestRateOption, Loan, LoanId,
    MemberId, MemberShuAllocation, Money, RateOptionId, ShuRecordId, ShuYearRecord, TransactionId,
    TransactionStatus, VerificationOutcome, Wallet, WalletCategory, WalletId, WalletTransaction,
};

fn next(seq: &AtomicU64) -> u64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

/// Wallets and their transactions.
#[derive(Default)]
pub struct InMemoryLedger {
    wallets: DashMap<WalletId, Wallet>,
    wallet_index: DashMap<(MemberId, WalletCategory), WalletId>,
    transactions: DashMap<TransactionId, WalletTransaction>,
    wallet_seq: AtomicU64,
    transaction_seq: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletStore for InMemoryLedger {
    fn insert(&self, wallet: NewWallet) -> Result<Wallet, StoreError> {
        match self.wallet_index.entry((wallet.member, wallet.category)) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                let id = WalletId(next(&self.wallet_seq));
                let record = Wallet {
                    id,
                    member: wallet.member,
                    category: wallet.category,
                    balance: Money::ZERO,
                    description: wallet.description,
                };
                self.wallets.insert(id, record.clone());
                slot.insert(id);
                Ok(record)
            }
        }
    }

    fn get(&self, id: WalletId) -> Result<Wallet, StoreError> {
        self.wallets
            .get(&id)
            .map(|w| w.clone())
            .ok_or(StoreError::Missing)
    }

    fn find(&self, member: MemberId, category: WalletCategory) -> Result<Wallet, StoreError> {
        let id = *self
            .wallet_index
            .get(&(member, category))
            .ok_or(StoreError::Missing)?;
        WalletStore::get(self, id)
    }

    fn of_member(&self, member: MemberId) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self
            .wallets
            .iter()
            .filter(|entry| entry.member == member)
            .map(|entry| entry.clone())
            .collect();
        wallets.sort_by_key(|w| w.id);
        wallets
    }

    fn all(&self) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self.wallets.iter().map(|entry| entry.clone()).collect();
        wallets.sort_by_key(|w| w.id);
        wallets
    }
}

impl TransactionStore for InMemoryLedger {
    fn insert(&self, tx: NewTransaction) -> Result<WalletTransaction, StoreError> {
        if !self.wallets.contains_key(&tx.wallet) {
            return Err(StoreError::Missing);
        }
        let id = TransactionId(next(&self.transaction_seq));
        let record = WalletTransaction {
            id,
            wallet: tx.wallet,
            kind: tx.kind,
            amount: tx.amount,
            description: tx.description,
            status: tx.status,
            verified_by: tx.verified_by,
            verified_at: tx.verified_at,
            created_at: tx.created_at,
        };
        self.transactions.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: TransactionId) -> Result<WalletTransaction, StoreError> {
        self.transactions
            .get(&id)
            .map(|t| t.clone())
            .ok_or(StoreError::Missing)
    }

    fn of_wallet(&self, wallet: WalletId) -> Vec<WalletTransaction> {
        let mut transactions: Vec<WalletTransaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.wallet == wallet)
            .map(|entry| entry.clone())
            .collect();
        transactions.sort_by_key(|t| t.id);
        transactions
    }

    fn pending(&self) -> Vec<WalletTransaction> {
        let mut transactions: Vec<WalletTransaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.status == TransactionStatus::Pending)
            .map(|entry| entry.clone())
            .collect();
        transactions.sort_by_key(|t| t.id);
        transactions
    }

    fn finalize(
        &self,
        id: TransactionId,
        update: Finalization,
    ) -> Result<(WalletTransaction, Wallet), StoreError> {
        let wallet_id = self
            .transactions
            .get(&id)
            .ok_or(StoreError::Missing)?
            .wallet;
        // Wallet entry first: the per-wallet serialization point. Lock order
        // is wallet before transaction everywhere in this adapter.
        let mut wallet = self.wallets.get_mut(&wallet_id).ok_or(StoreError::Missing)?;
        let mut stored = self.transactions.get_mut(&id).ok_or(StoreError::Missing)?;

        let mut transaction = stored.clone();
        let delta = transaction
            .finalize(update.verified_by, update.verified_at, update.approve)
            .map_err(StoreError::Rejected)?;
        wallet.apply_delta(delta).map_err(StoreError::Rejected)?;
        *stored = transaction.clone();

        Ok((transaction, wallet.clone()))
    }

    fn insert_applied(
        &self,
        tx: NewTransaction,
    ) -> Result<(WalletTransaction, Wallet), StoreError> {
        let mut wallet = self
            .wallets
            .get_mut(&tx.wallet)
            .ok_or(StoreError::Missing)?;
        wallet.apply_delta(tx.amount).map_err(StoreError::Rejected)?;

        let id = TransactionId(next(&self.transaction_seq));
        let record = WalletTransaction {
            id,
            wallet: tx.wallet,
            kind: tx.kind,
            amount: tx.amount,
            description: tx.description,
            status: tx.status,
            verified_by: tx.verified_by,
            verified_at: tx.verified_at,
            created_at: tx.created_at,
        };
        self.transactions.insert(id, record.clone());
        Ok((record, wallet.clone()))
    }
}

/// Loans and their installments.
#[derive(Default)]
pub struct InMemoryLoanBook {
    loans: DashMap<LoanId, Loan>,
    code_index: DashMap<String, LoanId>,
    installments: DashMap<InstallmentId, Installment>,
    sequence_index: DashMap<(LoanId, u32), InstallmentId>,
    loan_seq: AtomicU64,
    installment_seq: AtomicU64,
}

impl InMemoryLoanBook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoanStore for InMemoryLoanBook {
    fn insert(&self, loan: NewLoan) -> Result<Loan, StoreError> {
        match self.code_index.entry(loan.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                let id = LoanId(next(&self.loan_seq));
                let record = Loan {
                    id,
                    code: loan.code,
                    member: loan.member,
                    principal: loan.principal,
                    interest_percent: loan.interest_percent,
                    rate_option: loan.rate_option,
                    term_months: loan.term_months,
                    installment_amount: loan.installment_amount,
                    remaining_installments: loan.remaining_installments,
                    status: loan.status,
                    borrowed_at: loan.borrowed_at,
                    disbursement_account: loan.disbursement_account,
                    disbursement_bank: loan.disbursement_bank,
                };
                self.loans.insert(id, record.clone());
                slot.insert(id);
                Ok(record)
            }
        }
    }

    fn get(&self, id: LoanId) -> Result<Loan, StoreError> {
        self.loans
            .get(&id)
            .map(|l| l.clone())
            .ok_or(StoreError::Missing)
    }

    fn of_member(&self, member: MemberId) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|entry| entry.member == member)
            .map(|entry| entry.clone())
            .collect();
        loans.sort_by_key(|l| l.id);
        loans
    }

    fn all(&self) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self.loans.iter().map(|entry| entry.clone()).collect();
        loans.sort_by_key(|l| l.id);
        loans
    }

    fn update(&self, loan: &Loan) -> Result<(), StoreError> {
        let mut stored = self.loans.get_mut(&loan.id).ok_or(StoreError::Missing)?;
        *stored = loan.clone();
        Ok(())
    }

    fn remove(&self, id: LoanId) -> Result<(), StoreError> {
        let (_, loan) = self.loans.remove(&id).ok_or(StoreError::Missing)?;
        self.code_index.remove(&loan.code);
        Ok(())
    }
}

impl InstallmentStore for InMemoryLoanBook {
    fn insert(&self, installment: NewInstallment) -> Result<Installment, StoreError> {
        if !self.loans.contains_key(&installment.loan) {
            return Err(StoreError::Missing);
        }
        match self
            .sequence_index
            .entry((installment.loan, installment.sequence))
        {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                let id = InstallmentId(next(&self.installment_seq));
                let record = Installment {
                    id,
                    loan: installment.loan,
                    member: installment.member,
                    sequence: installment.sequence,
                    paid_at: installment.paid_at,
                    principal: installment.principal,
                    interest: installment.interest,
                    penalty: installment.penalty,
                    total: installment.total,
                    status: installment.status,
                };
                self.installments.insert(id, record.clone());
                slot.insert(id);
                Ok(record)
            }
        }
    }

    fn get(&self, id: InstallmentId) -> Result<Installment, StoreError> {
        self.installments
            .get(&id)
            .map(|i| i.clone())
            .ok_or(StoreError::Missing)
    }

    fn of_loan(&self, loan: LoanId) -> Vec<Installment> {
        let mut installments: Vec<Installment> = self
            .installments
            .iter()
            .filter(|entry| entry.loan == loan)
            .map(|entry| entry.clone())
            .collect();
        installments.sort_by_key(|i| i.sequence);
        installments
    }

    fn all(&self) -> Vec<Installment> {
        let mut installments: Vec<Installment> =
            self.installments.iter().map(|entry| entry.clone()).collect();
        installments.sort_by_key(|i| i.id);
        installments
    }

    fn count_for_loan(&self, loan: LoanId) -> u32 {
        self.installments
            .iter()
            .filter(|entry| entry.loan == loan)
            .count() as u32
    }

    fn with_status(&self, status: InstallmentStatus) -> Vec<Installment> {
        let mut installments: Vec<Installment> = self
            .installments
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.clone())
            .collect();
        installments.sort_by_key(|i| i.id);
        installments
    }

    fn update(&self, installment: &Installment) -> Result<(), StoreError> {
        let mut stored = self
            .installments
            .get_mut(&installment.id)
            .ok_or(StoreError::Missing)?;
        *stored = installment.clone();
        Ok(())
    }

    fn remove(&self, id: InstallmentId) -> Result<(), StoreError> {
        let (_, installment) = self.installments.remove(&id).ok_or(StoreError::Missing)?;
        self.sequence_index
            .remove(&(installment.loan, installment.sequence));
        Ok(())
    }

    fn commit_verification(
        &self,
        id: InstallmentId,
        outcome: VerificationOutcome,
    ) -> Result<(Installment, Loan), StoreError> {
        let loan_id = self.installments.get(&id).ok_or(StoreError::Missing)?.loan;
        // Loan entry first: the per-loan serialization point.
        let mut loan = self.loans.get_mut(&loan_id).ok_or(StoreError::Missing)?;
        let mut installment = self.installments.get_mut(&id).ok_or(StoreError::Missing)?;

        installment.verify(outcome).map_err(StoreError::Rejected)?;
        if outcome == VerificationOutcome::Verified {
            loan.register_verified_installment();
        }
        Ok((installment.clone(), loan.clone()))
    }
}

/// Annual SHU records and member allocations.
#[derive(Default)]
pub struct InMemoryShuStore {
    years: DashMap<ShuRecordId, ShuYearRecord>,
    year_index: DashMap<i32, ShuRecordId>,
    allocations: DashMap<AllocationId, MemberShuAllocation>,
    pair_index: DashMap<(ShuRecordId, MemberId), AllocationId>,
    year_seq: AtomicU64,
    allocation_seq: AtomicU64,
}

impl InMemoryShuStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShuStore for InMemoryShuStore {
    fn insert_year(&self, record: NewShuYear) -> Result<ShuYearRecord, StoreError> {
        match self.year_index.entry(record.year) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                let id = ShuRecordId(next(&self.year_seq));
                let stored = ShuYearRecord {
                    id,
                    year: record.year,
                    total: record.total,
                    computed_at: record.computed_at,
                    status: record.status,
                    breakdown: record.breakdown,
                };
                self.years.insert(id, stored.clone());
                slot.insert(id);
                Ok(stored)
            }
        }
    }

    fn year(&self, id: ShuRecordId) -> Result<ShuYearRecord, StoreError> {
        self.years
            .get(&id)
            .map(|r| r.clone())
            .ok_or(StoreError::Missing)
    }

    fn year_of(&self, year: i32) -> Result<ShuYearRecord, StoreError> {
        let id = *self.year_index.get(&year).ok_or(StoreError::Missing)?;
        self.year(id)
    }

    fn years(&self) -> Vec<ShuYearRecord> {
        let mut records: Vec<ShuYearRecord> =
            self.years.iter().map(|entry| entry.clone()).collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.year));
        records
    }

    fn update_year(&self, record: &ShuYearRecord) -> Result<(), StoreError> {
        let mut stored = self.years.get_mut(&record.id).ok_or(StoreError::Missing)?;
        *stored = record.clone();
        Ok(())
    }

    fn remove_year(&self, id: ShuRecordId) -> Result<(), StoreError> {
        let (_, record) = self.years.remove(&id).ok_or(StoreError::Missing)?;
        self.year_index.remove(&record.year);
        Ok(())
    }

    fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<MemberShuAllocation, StoreError> {
        if !self.years.contains_key(&allocation.record) {
            return Err(StoreError::Missing);
        }
        match self.pair_index.entry((allocation.record, allocation.member)) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                let id = AllocationId(next(&self.allocation_seq));
                let stored = MemberShuAllocation {
                    id,
                    record: allocation.record,
                    member: allocation.member,
                    capital_share: allocation.capital_share,
                    activity_share: allocation.activity_share,
                    total: allocation.total,
                    created_at: allocation.created_at,
                };
                self.allocations.insert(id, stored.clone());
                slot.insert(id);
                Ok(stored)
            }
        }
    }

    fn allocation(
        &self,
        record: ShuRecordId,
        member: MemberId,
    ) -> Result<MemberShuAllocation, StoreError> {
        let id = *self
            .pair_index
            .get(&(record, member))
            .ok_or(StoreError::Missing)?;
        self.allocation_by_id(id)
    }

    fn allocation_by_id(&self, id: AllocationId) -> Result<MemberShuAllocation, StoreError> {
        self.allocations
            .get(&id)
            .map(|a| a.clone())
            .ok_or(StoreError::Missing)
    }

    fn allocations_of_record(&self, record: ShuRecordId) -> Vec<MemberShuAllocation> {
        let mut allocations: Vec<MemberShuAllocation> = self
            .allocations
            .iter()
            .filter(|entry| entry.record == record)
            .map(|entry| entry.clone())
            .collect();
        allocations.sort_by_key(|a| a.member);
        allocations
    }

    fn allocations_of_member(&self, member: MemberId) -> Vec<MemberShuAllocation> {
        let mut allocations: Vec<MemberShuAllocation> = self
            .allocations
            .iter()
            .filter(|entry| entry.member == member)
            .map(|entry| entry.clone())
            .collect();
        allocations.sort_by_key(|a| a.id);
        allocations
    }

    fn remove_allocation(&self, id: AllocationId) -> Result<(), StoreError> {
        let (_, allocation) = self.allocations.remove(&id).ok_or(StoreError::Missing)?;
        self.pair_index
            .remove(&(allocation.record, allocation.member));
        Ok(())
    }
}

/// Interest-rate option catalog.
#[derive(Default)]
pub struct InMemoryRateCatalog {
    options: DashMap<RateOptionId, InterestRateOption>,
    seq: AtomicU64,
}

impl InMemoryRateCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateCatalog for InMemoryRateCatalog {
    fn insert(&self, option: NewRateOption) -> Result<InterestRateOption, StoreError> {
        let id = RateOptionId(next(&self.seq));
        let record = InterestRateOption {
            id,
            name: option.name,
            percent: option.percent,
            description: option.description,
            active: option.active,
            created_by: option.created_by,
        };
        self.options.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: RateOptionId) -> Result<InterestRateOption, StoreError> {
        self.options
            .get(&id)
            .map(|o| o.clone())
            .ok_or(StoreError::Missing)
    }

    fn active(&self) -> Vec<InterestRateOption> {
        let mut options: Vec<InterestRateOption> = self
            .options
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.clone())
            .collect();
        options.sort_by_key(|o| o.id);
        options
    }

    fn all(&self) -> Vec<InterestRateOption> {
        let mut options: Vec<InterestRateOption> =
            self.options.iter().map(|entry| entry.clone()).collect();
        options.sort_by_key(|o| o.id);
        options
    }

    fn update(&self, option: &InterestRateOption) -> Result<(), StoreError> {
        let mut stored = self.options.get_mut(&option.id).ok_or(StoreError::Missing)?;
        *stored = option.clone();
        Ok(())
    }

    fn remove(&self, id: RateOptionId) -> Result<(), StoreError> {
        self.options.remove(&id).ok_or(StoreError::Missing)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemberRecord {
    pub email: Option<String>,
    pub registrar: Option<MemberId>,
}

/// Stand-in for the membership directory collaborator.
#[derive(Default)]
pub struct InMemoryMemberDirectory {
    members: DashMap<MemberId, MemberRecord>,
}

impl InMemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, id: MemberId, email: Option<&str>, registrar: Option<MemberId>) {
        self.members.insert(
            id,
            MemberRecord {
                email: email.map(str::to_owned),
                registrar,
            },
        );
    }
}

impl MemberDirectory for InMemoryMemberDirectory {
    fn exists(&self, member: MemberId) -> bool {
        self.members.contains_key(&member)
    }

    fn registrar_of(&self, member: MemberId) -> Option<MemberId> {
        self.members.get(&member).and_then(|m| m.registrar)
    }

    fn email_of(&self, member: MemberId) -> Option<String> {
        self.members.get(&member).and_then(|m| m.email.clone())
    }
}

/// Year-scoped aggregates over the in-memory ledger and loan book.
pub struct InMemoryActivityLedger {
    ledger: Arc<InMemoryLedger>,
    loans: Arc<InMemoryLoanBook>,
}

impl InMemoryActivityLedger {
    pub fn new(ledger: Arc<InMemoryLedger>, loans: Arc<InMemoryLoanBook>) -> Self {
        Self { ledger, loans }
    }
}

impl ActivityLedger for InMemoryActivityLedger {
    fn total_savings(&self, year: i32) -> Money {
        self.savings_by_member(year).values().sum()
    }

    fn savings_by_member(&self, year: i32) -> IndexMap<MemberId, Money> {
        // Snapshot first; resolving wallets while iterating transactions
        // would take the two maps in the opposite order to the commit path.
        let verified: Vec<(WalletId, Money)> = self
            .ledger
            .transactions
            .iter()
            .filter(|tx| {
                tx.status == TransactionStatus::Verified
                    && tx.verified_at.is_some_and(|at| at.year() == year)
            })
            .map(|tx| (tx.wallet, tx.amount))
            .collect();

        let mut totals: BTreeMap<MemberId, Money> = BTreeMap::new();
        for (wallet_id, amount) in verified {
            let Some(wallet) = self.ledger.wallets.get(&wallet_id) else {
                continue;
            };
            *totals.entry(wallet.member).or_insert(Money::ZERO) += amount;
        }
        totals.into_iter().collect()
    }

    fn total_loan_principal(&self, year: i32) -> Money {
        self.loan_principal_by_member(year).values().sum()
    }

    fn loan_principal_by_member(&self, year: i32) -> IndexMap<MemberId, Money> {
        let mut totals: BTreeMap<MemberId, Money> = BTreeMap::new();
        for loan in self.loans.loans.iter() {
            if loan.borrowed_at.year() != year {
                continue;
            }
            *totals.entry(loan.member).or_insert(Money::ZERO) += loan.principal;
        }
        totals.into_iter().collect()
    }

    fn verified_interest_income(&self, year: i32) -> Money {
        self.loans
            .installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Verified && i.paid_at.year() == year)
            .map(|i| i.interest)
            .sum()
    }
}
