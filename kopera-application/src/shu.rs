//! Annual SHU reporting and persistence.
//!
//! Report generation is read-only: it snapshots the year's ledger and loan
//! aggregates and runs the domain calculator, so the same stored data always
//! reproduces the same report. Saving is separate and guarded — one year
//! record per year, one allocation per member per year.

use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use kopera_domain::{
    AccessPolicy, Actor, AllocationId, AllocationRates, MemberActivity, MemberAllocation,
    MemberId, MemberShuAllocation, Money, ShuCalculator, ShuDistribution, ShuRecordId, ShuStatus,
    ShuYearRecord, SurplusComponents,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, EntityKind},
    ports::{ActivityLedger, Clock, MemberDirectory, NewAllocation, NewShuYear, ShuStore},
};

/// One member's line in the generated report, labeled for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShuReportEntry {
    pub allocation: MemberAllocation,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShuReport {
    pub year: i32,
    pub rates: AllocationRates,
    pub computed_at: DateTime<Utc>,
    pub distribution: ShuDistribution,
    pub entries: Vec<ShuReportEntry>,
    /// Present when the surplus came from the automated income/expense path.
    pub breakdown: Option<SurplusComponents>,
}

/// Expense-side inputs of the automated surplus path; the operating income
/// is derived from the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct YearCosts {
    pub non_operating_income: Money,
    pub operating_expense: Money,
    pub non_operating_expense: Money,
    pub tax_expense: Money,
}

/// Partial update of a saved year record.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShuYearPatch {
    pub total: Option<Money>,
    pub status: Option<ShuStatus>,
}

#[derive(Clone, Copy)]
pub struct ShuReporter<'a> {
    store: &'a dyn ShuStore,
    activity: &'a dyn ActivityLedger,
    members: &'a dyn MemberDirectory,
    policy: &'a AccessPolicy,
    clock: &'a dyn Clock,
    calculator: ShuCalculator,
}

impl<'a> ShuReporter<'a> {
    pub fn new(
        store: &'a dyn ShuStore,
        activity: &'a dyn ActivityLedger,
        members: &'a dyn MemberDirectory,
        policy: &'a AccessPolicy,
        clock: &'a dyn Clock,
        rates: AllocationRates,
    ) -> Self {
        Self {
            store,
            activity,
            members,
            policy,
            clock,
            calculator: ShuCalculator::new(rates),
        }
    }

    /// Generates the distribution report for a year from an explicitly
    /// supplied surplus. No state is written.
    pub fn generate_report(
        &self,
        actor: &Actor,
        year: i32,
        surplus: Money,
    ) -> Result<ShuReport, CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        if surplus.is_negative() {
            return Err(CoreError::InvalidAmount);
        }
        Ok(self.build_report(year, surplus, None))
    }

    /// Automated path: the surplus is computed from income/expense
    /// components and the breakdown is retained on the report.
    pub fn generate_report_from_components(
        &self,
        actor: &Actor,
        year: i32,
        components: SurplusComponents,
    ) -> Result<ShuReport, CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        Ok(self.build_report(year, components.net_surplus(), Some(components)))
    }

    /// Assembles surplus components for a year: operating income comes from
    /// the ledger (verified installment interest), the rest from the caller.
    pub fn derive_components(&self, year: i32, costs: YearCosts) -> SurplusComponents {
        SurplusComponents {
            operating_income: self.activity.verified_interest_income(year),
            non_operating_income: costs.non_operating_income,
            operating_expense: costs.operating_expense,
            non_operating_expense: costs.non_operating_expense,
            tax_expense: costs.tax_expense,
        }
    }

    /// Persists the year's distributable total. At most one record per year.
    pub fn save_year(
        &self,
        actor: &Actor,
        year: i32,
        total: Money,
        status: Option<ShuStatus>,
        breakdown: Option<SurplusComponents>,
    ) -> Result<ShuYearRecord, CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        if total.is_negative() {
            return Err(CoreError::InvalidAmount);
        }
        let record = self
            .store
            .insert_year(NewShuYear {
                year,
                total,
                computed_at: self.clock.now(),
                status: status.unwrap_or(ShuStatus::Draft),
                breakdown,
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;

        tracing::info!(
            year = record.year,
            total = %record.total,
            status = ?record.status,
            admin = actor.id.0,
            "annual SHU record saved"
        );
        Ok(record)
    }

    pub fn years(&self, actor: &Actor) -> Result<Vec<ShuYearRecord>, CoreError> {
        self.ensure_admin(actor)?;
        Ok(self.store.years())
    }

    pub fn year_record(&self, actor: &Actor, id: ShuRecordId) -> Result<ShuYearRecord, CoreError> {
        self.ensure_admin(actor)?;
        self.store
            .year(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))
    }

    pub fn year_by(&self, actor: &Actor, year: i32) -> Result<ShuYearRecord, CoreError> {
        self.ensure_admin(actor)?;
        self.store
            .year_of(year)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))
    }

    /// Explicit admin update of amount/status — the record is never
    /// re-derived implicitly.
    pub fn update_year(
        &self,
        actor: &Actor,
        id: ShuRecordId,
        patch: ShuYearPatch,
    ) -> Result<ShuYearRecord, CoreError> {
        self.ensure_admin(actor)?;
        let mut record = self
            .store
            .year(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;

        if let Some(total) = patch.total {
            if !total.is_positive() {
                return Err(CoreError::InvalidAmount);
            }
            record.total = total;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }

        self.store
            .update_year(&record)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;
        Ok(record)
    }

    pub fn delete_year(&self, actor: &Actor, id: ShuRecordId) -> Result<(), CoreError> {
        self.ensure_admin(actor)?;
        self.store
            .year(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;
        self.store
            .remove_year(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))
    }

    /// Freezes one member's allocation for a saved year. Write-once per
    /// (year, member); the amounts are recomputed from the stored snapshot
    /// at save time, so they match what a fresh report would show.
    pub fn save_member_allocation(
        &self,
        actor: &Actor,
        member: MemberId,
        year: i32,
    ) -> Result<MemberShuAllocation, CoreError> {
        self.ensure_can_act_on(actor, member)?;
        let record = self
            .store
            .year_of(year)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;

        let distribution = self
            .calculator
            .distribute(record.total, &self.snapshot(year));
        let (capital_share, activity_share) = distribution
            .entries
            .iter()
            .find(|entry| entry.member == member)
            .map(|entry| (entry.capital_share, entry.activity_share))
            .unwrap_or((Money::ZERO, Money::ZERO));

        let allocation = self
            .store
            .insert_allocation(NewAllocation {
                record: record.id,
                member,
                capital_share,
                activity_share,
                total: capital_share + activity_share,
                created_at: self.clock.now(),
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuAllocation))?;

        tracing::info!(
            year = record.year,
            member = member.0,
            total = %allocation.total,
            "member SHU allocation saved"
        );
        Ok(allocation)
    }

    pub fn member_allocation(
        &self,
        actor: &Actor,
        member: MemberId,
        year: i32,
    ) -> Result<MemberShuAllocation, CoreError> {
        self.ensure_can_act_on(actor, member)?;
        let record = self
            .store
            .year_of(year)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;
        self.store
            .allocation(record.id, member)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuAllocation))
    }

    pub fn member_history(
        &self,
        actor: &Actor,
        member: MemberId,
    ) -> Result<Vec<MemberShuAllocation>, CoreError> {
        self.ensure_can_act_on(actor, member)?;
        Ok(self.store.allocations_of_member(member))
    }

    pub fn allocations_of_year(
        &self,
        actor: &Actor,
        year: i32,
    ) -> Result<Vec<MemberShuAllocation>, CoreError> {
        self.ensure_admin(actor)?;
        let record = self
            .store
            .year_of(year)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuYear))?;
        Ok(self.store.allocations_of_record(record.id))
    }

    pub fn delete_allocation(&self, actor: &Actor, id: AllocationId) -> Result<(), CoreError> {
        self.ensure_admin(actor)?;
        self.store
            .allocation_by_id(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuAllocation))?;
        self.store
            .remove_allocation(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::ShuAllocation))
    }

    fn build_report(
        &self,
        year: i32,
        surplus: Money,
        breakdown: Option<SurplusComponents>,
    ) -> ShuReport {
        let distribution = self.calculator.distribute(surplus, &self.snapshot(year));
        let entries = distribution
            .entries
            .iter()
            .map(|allocation| ShuReportEntry {
                allocation: *allocation,
                email: self.members.email_of(allocation.member),
            })
            .collect();

        tracing::debug!(
            year,
            surplus = %surplus,
            members = distribution.entries.len(),
            total_savings = %distribution.total_savings,
            total_loan_principal = %distribution.total_loan_principal,
            "SHU report generated"
        );
        ShuReport {
            year,
            rates: self.calculator.rates(),
            computed_at: self.clock.now(),
            distribution,
            entries,
            breakdown,
        }
    }

    /// Per-member activity for the year: union of the savings and loan
    /// aggregates.
    fn snapshot(&self, year: i32) -> Vec<MemberActivity> {
        let mut activities: FxHashMap<MemberId, MemberActivity> = FxHashMap::default();
        for (member, savings) in self.activity.savings_by_member(year) {
            activities
                .entry(member)
                .or_insert(MemberActivity {
                    member,
                    savings: Money::ZERO,
                    loan_principal: Money::ZERO,
                })
                .savings = savings;
        }
        for (member, principal) in self.activity.loan_principal_by_member(year) {
            activities
                .entry(member)
                .or_insert(MemberActivity {
                    member,
                    savings: Money::ZERO,
                    loan_principal: Money::ZERO,
                })
                .loan_principal = principal;
        }
        activities.into_values().collect()
    }

    fn ensure_admin(&self, actor: &Actor) -> Result<(), CoreError> {
        if self.policy.is_admin(actor) {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }

    fn ensure_can_act_on(&self, actor: &Actor, owner: MemberId) -> Result<(), CoreError> {
        let registrar = self.members.registrar_of(owner);
        if self.policy.can_act_on(actor, owner, registrar) {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }
}
