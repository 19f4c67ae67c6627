//! Installment submission and verification.
//!
//! Verification is the irreversible step: it moves the installment out of
//! `Submitted` exactly once, and a `Verified` outcome is the only event
//! that decrements the owning loan's remaining counter.

use chrono::{DateTime, Utc};
use kopera_domain::{
    AccessPolicy, Actor, Installment, InstallmentId, InstallmentStatus, ListScope, Loan, LoanId,
    MemberId, Money, VerificationOutcome,
};

use crate::{
    error::{CoreError, EntityKind},
    ports::{Clock, InstallmentStore, LoanStore, MemberDirectory, NewInstallment},
};

#[derive(Clone, Debug)]
pub struct InstallmentRequest {
    pub loan: LoanId,
    /// 1-based position in the schedule. When absent the next unused
    /// sequence (1 + existing count) is assigned.
    pub sequence: Option<u32>,
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
    /// Explicit override; defaults to principal + interest + penalty.
    pub total: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Partial update of a still-submitted installment. `None` leaves the field
/// unchanged.
#[derive(Clone, Debug, Default)]
pub struct InstallmentPatch {
    pub principal: Option<Money>,
    pub interest: Option<Money>,
    pub penalty: Option<Money>,
    pub total: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy)]
pub struct InstallmentProcessor<'a> {
    installments: &'a dyn InstallmentStore,
    loans: &'a dyn LoanStore,
    members: &'a dyn MemberDirectory,
    policy: &'a AccessPolicy,
    clock: &'a dyn Clock,
}

impl<'a> InstallmentProcessor<'a> {
    pub fn new(
        installments: &'a dyn InstallmentStore,
        loans: &'a dyn LoanStore,
        members: &'a dyn MemberDirectory,
        policy: &'a AccessPolicy,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            installments,
            loans,
            members,
            policy,
            clock,
        }
    }

    pub fn submit(
        &self,
        actor: &Actor,
        request: InstallmentRequest,
    ) -> Result<Installment, CoreError> {
        let loan = self
            .loans
            .get(request.loan)
            .map_err(|err| CoreError::from_store(err, EntityKind::Loan))?;
        self.ensure_can_act_on(actor, loan.member)?;

        if !request.principal.is_positive()
            || request.interest.is_negative()
            || request.penalty.is_negative()
        {
            return Err(CoreError::InvalidAmount);
        }

        let sequence = match request.sequence {
            Some(sequence) if sequence > 0 => sequence,
            Some(_) => return Err(CoreError::InvalidAmount),
            None => self.installments.count_for_loan(loan.id) + 1,
        };
        let total = request.total.unwrap_or(Installment::component_total(
            request.principal,
            request.interest,
            request.penalty,
        ));

        let installment = self
            .installments
            .insert(NewInstallment {
                loan: loan.id,
                member: loan.member,
                sequence,
                paid_at: request.paid_at.unwrap_or_else(|| self.clock.now()),
                principal: request.principal,
                interest: request.interest,
                penalty: request.penalty,
                total,
                status: InstallmentStatus::Submitted,
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;

        tracing::debug!(
            installment = installment.id.0,
            loan = loan.id.0,
            sequence = installment.sequence,
            total = %installment.total,
            "installment submitted"
        );
        Ok(installment)
    }

    /// Records the admin verdict. Only a `Verified` outcome advances the
    /// loan; the decrement happens exactly once per installment even under
    /// retried calls, because the commit is gated on the `Submitted` state.
    pub fn verify(
        &self,
        actor: &Actor,
        id: InstallmentId,
        outcome: VerificationOutcome,
    ) -> Result<(Installment, Loan), CoreError> {
        let installment = self
            .installments
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;
        let registrar = self.members.registrar_of(installment.member);
        if !self
            .policy
            .can_administer(actor, installment.member, registrar)
        {
            return Err(CoreError::Forbidden);
        }

        let (installment, loan) = self
            .installments
            .commit_verification(id, outcome)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;

        tracing::info!(
            installment = installment.id.0,
            loan = loan.id.0,
            outcome = ?outcome,
            admin = actor.id.0,
            remaining = loan.remaining_installments,
            loan_status = ?loan.status,
            "installment verified"
        );
        Ok((installment, loan))
    }

    pub fn get(&self, actor: &Actor, id: InstallmentId) -> Result<Installment, CoreError> {
        let installment = self
            .installments
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;
        self.ensure_can_act_on(actor, installment.member)?;
        Ok(installment)
    }

    /// Installments visible to the actor, optionally narrowed to one loan.
    pub fn list(&self, actor: &Actor, loan: Option<LoanId>) -> Vec<Installment> {
        let scope = self.policy.list_scope(actor);
        let source = match loan {
            Some(loan) => self.installments.of_loan(loan),
            None => self.installments.all(),
        };
        source
            .into_iter()
            .filter(|i| scope.admits(i.member, self.members.registrar_of(i.member)))
            .collect()
    }

    /// Admin queue of submitted payments awaiting a verdict, scoped like
    /// every other admin read.
    pub fn pending(&self, actor: &Actor) -> Result<Vec<Installment>, CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        let scope = self.policy.list_scope(actor);
        Ok(self
            .installments
            .with_status(InstallmentStatus::Submitted)
            .into_iter()
            .filter(|i| scope.admits(i.member, self.members.registrar_of(i.member)))
            .collect())
    }

    /// Corrects a still-submitted installment. Finalized installments are
    /// immutable — the ledger behind a verified payment must stay
    /// re-derivable.
    pub fn update(
        &self,
        actor: &Actor,
        id: InstallmentId,
        patch: InstallmentPatch,
    ) -> Result<Installment, CoreError> {
        let mut installment = self
            .installments
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;
        self.ensure_can_act_on(actor, installment.member)?;
        if installment.status != InstallmentStatus::Submitted {
            return Err(CoreError::AlreadyProcessed);
        }

        let components_changed =
            patch.principal.is_some() || patch.interest.is_some() || patch.penalty.is_some();

        if let Some(principal) = patch.principal {
            if !principal.is_positive() {
                return Err(CoreError::InvalidAmount);
            }
            installment.principal = principal;
        }
        if let Some(interest) = patch.interest {
            if interest.is_negative() {
                return Err(CoreError::InvalidAmount);
            }
            installment.interest = interest;
        }
        if let Some(penalty) = patch.penalty {
            if penalty.is_negative() {
                return Err(CoreError::InvalidAmount);
            }
            installment.penalty = penalty;
        }
        if let Some(paid_at) = patch.paid_at {
            installment.paid_at = paid_at;
        }
        installment.total = match patch.total {
            Some(total) => total,
            None if components_changed => Installment::component_total(
                installment.principal,
                installment.interest,
                installment.penalty,
            ),
            None => installment.total,
        };

        self.installments
            .update(&installment)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;
        Ok(installment)
    }

    /// Removes a still-submitted installment; finalized ones are immutable.
    pub fn delete(&self, actor: &Actor, id: InstallmentId) -> Result<(), CoreError> {
        let installment = self
            .installments
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))?;
        self.ensure_can_act_on(actor, installment.member)?;
        if installment.status != InstallmentStatus::Submitted {
            return Err(CoreError::AlreadyProcessed);
        }
        self.installments
            .remove(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::Installment))
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
