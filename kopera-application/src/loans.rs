//! Loan book: creation, access-gated reads, and the administrative fields.
//!
//! The remaining-installment counter is never written here — only verified
//! installments (see `installments`) move it.

use chrono::{DateTime, Utc};
use kopera_domain::{
    AccessPolicy, Actor, ListScope, Loan, LoanId, LoanStatus, MemberId, Money, RateOptionId,
};
use rust_decimal::Decimal;

use crate::{
    error::{CoreError, EntityKind},
    ports::{Clock, LoanStore, MemberDirectory, NewLoan, RateCatalog},
};

#[derive(Clone, Debug)]
pub struct LoanRequest {
    pub member: MemberId,
    pub principal: Money,
    /// Catalog option to copy the interest percent from. Takes precedence
    /// over `interest_percent`.
    pub rate_option: Option<RateOptionId>,
    pub interest_percent: Option<Decimal>,
    pub term_months: u32,
    pub installment_amount: Money,
    pub code: Option<String>,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub disbursement_account: Option<String>,
    pub disbursement_bank: Option<String>,
}

/// Partial update. `None` means "leave unchanged" — a zero is always an
/// explicit zero, never an absence marker.
#[derive(Clone, Debug, Default)]
pub struct LoanPatch {
    pub principal: Option<Money>,
    pub interest_percent: Option<Decimal>,
    pub term_months: Option<u32>,
    pub installment_amount: Option<Money>,
    pub status: Option<LoanStatus>,
    pub disbursement_account: Option<String>,
    pub disbursement_bank: Option<String>,
}

#[derive(Clone, Copy)]
pub struct LoanBook<'a> {
    loans: &'a dyn LoanStore,
    rates: &'a dyn RateCatalog,
    members: &'a dyn MemberDirectory,
    policy: &'a AccessPolicy,
    clock: &'a dyn Clock,
}

impl<'a> LoanBook<'a> {
    pub fn new(
        loans: &'a dyn LoanStore,
        rates: &'a dyn RateCatalog,
        members: &'a dyn MemberDirectory,
        policy: &'a AccessPolicy,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            loans,
            rates,
            members,
            policy,
            clock,
        }
    }

    pub fn create(&self, actor: &Actor, request: LoanRequest) -> Result<Loan, CoreError> {
        if !self.policy.is_admin(actor) && request.member != actor.id {
            return Err(CoreError::Forbidden);
        }
        if !self.members.exists(request.member) {
            return Err(CoreError::NotFound(EntityKind::Member));
        }
        if !request.principal.is_positive()
            || request.term_months == 0
            || !request.installment_amount.is_positive()
        {
            return Err(CoreError::InvalidAmount);
        }

        let interest_percent = match request.rate_option {
            Some(option) => {
                self.rates
                    .get(option)
                    .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))?
                    .percent
            }
            None => request.interest_percent.unwrap_or(Decimal::ZERO),
        };
        if interest_percent.is_sign_negative() {
            return Err(CoreError::InvalidAmount);
        }

        let now = self.clock.now();
        let code = request
            .code
            .unwrap_or_else(|| format!("PJM{}", now.timestamp()));

        let loan = self
            .loans
            .insert(NewLoan {
                code,
                member: request.member,
                principal: request.principal,
                interest_percent,
                rate_option: request.rate_option,
                term_months: request.term_months,
                installment_amount: request.installment_amount,
                remaining_installments: request.term_months,
                status: LoanStatus::InProgress,
                borrowed_at: request.borrowed_at.unwrap_or(now),
                disbursement_account: request.disbursement_account,
                disbursement_bank: request.disbursement_bank,
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))?;

        tracing::info!(
            loan = loan.id.0,
            code = %loan.code,
            member = loan.member.0,
            principal = %loan.principal,
            term_months = loan.term_months,
            "loan created"
        );
        Ok(loan)
    }

    pub fn get(&self, actor: &Actor, id: LoanId) -> Result<Loan, CoreError> {
        let loan = self
            .loans
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))?;
        self.ensure_can_act_on(actor, loan.member)?;
        Ok(loan)
    }

    pub fn list(&self, actor: &Actor) -> Vec<Loan> {
        match self.policy.list_scope(actor) {
            ListScope::All => self.loans.all(),
            ListScope::Own(member) => self.loans.of_member(member),
            scope @ ListScope::RegisteredBy(_) => self
                .loans
                .all()
                .into_iter()
                .filter(|loan| scope.admits(loan.member, self.members.registrar_of(loan.member)))
                .collect(),
        }
    }

    pub fn update(&self, actor: &Actor, id: LoanId, patch: LoanPatch) -> Result<Loan, CoreError> {
        let mut loan = self
            .loans
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))?;
        self.ensure_can_act_on(actor, loan.member)?;

        if patch.status.is_some() && !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        // Paid-off is driven by the installment counter alone, never set by
        // hand.
        if patch.status == Some(LoanStatus::PaidOff) && loan.status != LoanStatus::PaidOff {
            return Err(CoreError::Forbidden);
        }

        if let Some(principal) = patch.principal {
            if !principal.is_positive() {
                return Err(CoreError::InvalidAmount);
            }
            loan.principal = principal;
        }
        if let Some(percent) = patch.interest_percent {
            if percent.is_sign_negative() {
                return Err(CoreError::InvalidAmount);
            }
            loan.interest_percent = percent;
        }
        if let Some(term) = patch.term_months {
            if term == 0 {
                return Err(CoreError::InvalidAmount);
            }
            loan.rebaseline_term(term);
        }
        if let Some(amount) = patch.installment_amount {
            if !amount.is_positive() {
                return Err(CoreError::InvalidAmount);
            }
            loan.installment_amount = amount;
        }
        if let Some(status) = patch.status {
            loan.status = status;
        }
        if let Some(account) = patch.disbursement_account {
            loan.disbursement_account = Some(account);
        }
        if let Some(bank) = patch.disbursement_bank {
            loan.disbursement_bank = Some(bank);
        }

        self.loans
            .update(&loan)
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))?;
        Ok(loan)
    }

    pub fn delete(&self, actor: &Actor, id: LoanId) -> Result<(), CoreError> {
        let loan = self
            .loans
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))?;
        self.ensure_can_act_on(actor, loan.member)?;
        self.loans
            .remove(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))
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
