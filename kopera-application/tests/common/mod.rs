#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use kopera_application::{
    InstallmentProcessor, LoanBook, RateBook, ShuReporter, WalletLedger,
};
use kopera_domain::{AccessPolicy, Actor, AllocationRates, MemberId, Money, WalletCategory};
use kopera_infrastructure::{
    InMemoryActivityLedger, InMemoryLedger, InMemoryLoanBook, InMemoryMemberDirectory,
    InMemoryRateCatalog, InMemoryShuStore, ManualClock,
};

/// Fully wired in-memory deployment for integration tests.
pub struct World {
    pub ledger: Arc<InMemoryLedger>,
    pub loans: Arc<InMemoryLoanBook>,
    pub shu: InMemoryShuStore,
    pub rates: InMemoryRateCatalog,
    pub members: InMemoryMemberDirectory,
    pub activity: InMemoryActivityLedger,
    pub policy: AccessPolicy,
    pub clock: ManualClock,
}

impl World {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let loans = Arc::new(InMemoryLoanBook::new());
        let activity = InMemoryActivityLedger::new(Arc::clone(&ledger), Arc::clone(&loans));
        Self {
            ledger,
            loans,
            shu: InMemoryShuStore::new(),
            rates: InMemoryRateCatalog::new(),
            members: InMemoryMemberDirectory::new(),
            activity,
            policy: AccessPolicy::default(),
            clock: ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()),
        }
    }

    pub fn wallet_ledger(&self) -> WalletLedger<'_> {
        WalletLedger::new(
            &*self.ledger,
            &*self.ledger,
            &self.members,
            &self.policy,
            &self.clock,
        )
    }

    pub fn loan_book(&self) -> LoanBook<'_> {
        LoanBook::new(
            &*self.loans,
            &self.rates,
            &self.members,
            &self.policy,
            &self.clock,
        )
    }

    pub fn installments(&self) -> InstallmentProcessor<'_> {
        InstallmentProcessor::new(
            &*self.loans,
            &*self.loans,
            &self.members,
            &self.policy,
            &self.clock,
        )
    }

    pub fn shu_reporter(&self) -> ShuReporter<'_> {
        ShuReporter::new(
            &self.shu,
            &self.activity,
            &self.members,
            &self.policy,
            &self.clock,
            AllocationRates::default(),
        )
    }

    pub fn rate_book(&self) -> RateBook<'_> {
        RateBook::new(&self.rates, &self.policy)
    }

    /// Registers a member in the directory, optionally under an admin.
    pub fn add_member(&self, id: u64, registrar: Option<u64>) -> MemberId {
        let member = MemberId(id);
        self.members.add_member(
            member,
            Some(&format!("member{id}@koperasi.test")),
            registrar.map(MemberId),
        );
        member
    }

    /// Member with wallets, plus a verified top-up into the voluntary
    /// wallet — the usual starting state for ledger and SHU scenarios.
    pub fn member_with_savings(&self, id: u64, registrar: Option<u64>, amount: i64) -> MemberId {
        let member = self.add_member(id, registrar);
        let ledger = self.wallet_ledger();
        ledger.initialize_wallets(member).unwrap();
        let tx = ledger
            .request_topup(member, WalletCategory::Voluntary, money(amount), "saldo awal")
            .unwrap();
        ledger
            .verify_transaction(&Actor::super_admin(MemberId(999)), tx.id, true)
            .unwrap();
        member
    }
}

pub fn money(value: i64) -> Money {
    Money::from_i64(value)
}
