//! Savings wallet ledger.
//!
//! Balances move only through the pending→verified transaction workflow:
//! a member's top-up inserts a pending transaction, an administrator's
//! verification is the single event that applies it. Admin adjustments are
//! the fast path — created already verified, applied in the same commit.

use kopera_domain::{
    AccessPolicy, Actor, MemberId, Money, TransactionId, TransactionKind, TransactionStatus,
    Wallet, WalletCategory, WalletId, WalletTransaction,
};

use crate::{
    error::{CoreError, EntityKind},
    ports::{Clock, Finalization, MemberDirectory, NewTransaction, NewWallet, TransactionStore,
        WalletStore},
};

#[derive(Clone, Copy)]
pub struct WalletLedger<'a> {
    wallets: &'a dyn WalletStore,
    transactions: &'a dyn TransactionStore,
    members: &'a dyn MemberDirectory,
    policy: &'a AccessPolicy,
    clock: &'a dyn Clock,
}

impl<'a> WalletLedger<'a> {
    pub fn new(
        wallets: &'a dyn WalletStore,
        transactions: &'a dyn TransactionStore,
        members: &'a dyn MemberDirectory,
        policy: &'a AccessPolicy,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            wallets,
            transactions,
            members,
            policy,
            clock,
        }
    }

    /// Creates the three category wallets for a freshly registered member,
    /// all at balance zero. A second call fails `Conflict` on the first
    /// category — the (member, category) uniqueness constraint is the guard
    /// against double initialization.
    pub fn initialize_wallets(&self, member: MemberId) -> Result<Vec<Wallet>, CoreError> {
        if !self.members.exists(member) {
            return Err(CoreError::NotFound(EntityKind::Member));
        }
        WalletCategory::ALL
            .into_iter()
            .map(|category| {
                self.wallets
                    .insert(NewWallet {
                        member,
                        category,
                        description: String::new(),
                    })
                    .map_err(|err| CoreError::from_store(err, EntityKind::Wallet))
            })
            .collect()
    }

    /// Inserts a pending top-up. The balance does not move here.
    pub fn request_topup(
        &self,
        member: MemberId,
        category: WalletCategory,
        amount: Money,
        description: &str,
    ) -> Result<WalletTransaction, CoreError> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount);
        }
        let wallet = self
            .wallets
            .find(member, category)
            .map_err(|err| CoreError::from_store(err, EntityKind::Wallet))?;

        let transaction = self
            .transactions
            .insert(NewTransaction {
                wallet: wallet.id,
                kind: TransactionKind::Topup,
                amount,
                description: description.to_owned(),
                status: TransactionStatus::Pending,
                verified_by: None,
                verified_at: None,
                created_at: self.clock.now(),
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::Transaction))?;

        tracing::debug!(
            member = member.0,
            category = %category,
            amount = %amount,
            transaction = transaction.id.0,
            "top-up requested"
        );
        Ok(transaction)
    }

    /// Approves or rejects a pending transaction. This is the only path
    /// that applies a top-up to a balance, and it applies it exactly once:
    /// a retried or raced call finds the transaction finalized and gets
    /// `AlreadyProcessed`.
    pub fn verify_transaction(
        &self,
        actor: &Actor,
        id: TransactionId,
        approve: bool,
    ) -> Result<(WalletTransaction, Wallet), CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        let (transaction, wallet) = self
            .transactions
            .finalize(
                id,
                Finalization {
                    verified_by: actor.id,
                    verified_at: self.clock.now(),
                    approve,
                },
            )
            .map_err(|err| CoreError::from_store(err, EntityKind::Transaction))?;

        tracing::info!(
            transaction = transaction.id.0,
            wallet = wallet.id.0,
            approve,
            admin = actor.id.0,
            balance = %wallet.balance,
            "transaction finalized"
        );
        Ok((transaction, wallet))
    }

    /// Administrator fast path: records an already-verified adjustment and
    /// applies the signed delta in the same commit. Nothing is written when
    /// the delta would overdraw the wallet.
    pub fn adjust_balance(
        &self,
        actor: &Actor,
        wallet: WalletId,
        amount: Money,
        description: &str,
    ) -> Result<(WalletTransaction, Wallet), CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        let target = self
            .wallets
            .get(wallet)
            .map_err(|err| CoreError::from_store(err, EntityKind::Wallet))?;
        let now = self.clock.now();

        let (transaction, updated) = self
            .transactions
            .insert_applied(NewTransaction {
                wallet: target.id,
                kind: TransactionKind::Adjustment,
                amount,
                description: description.to_owned(),
                status: TransactionStatus::Verified,
                verified_by: Some(actor.id),
                verified_at: Some(now),
                created_at: now,
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::Wallet))?;

        tracing::info!(
            wallet = updated.id.0,
            amount = %amount,
            admin = actor.id.0,
            balance = %updated.balance,
            "balance adjusted"
        );
        Ok((transaction, updated))
    }

    pub fn list_transactions(
        &self,
        actor: &Actor,
        wallet: WalletId,
    ) -> Result<Vec<WalletTransaction>, CoreError> {
        let target = self
            .wallets
            .get(wallet)
            .map_err(|err| CoreError::from_store(err, EntityKind::Wallet))?;
        self.ensure_can_act_on(actor, target.member)?;
        Ok(self.transactions.of_wallet(wallet))
    }

    pub fn wallets_of(&self, actor: &Actor, member: MemberId) -> Result<Vec<Wallet>, CoreError> {
        self.ensure_can_act_on(actor, member)?;
        Ok(self.wallets.of_member(member))
    }

    pub fn wallet_detail(&self, actor: &Actor, wallet: WalletId) -> Result<Wallet, CoreError> {
        let target = self
            .wallets
            .get(wallet)
            .map_err(|err| CoreError::from_store(err, EntityKind::Wallet))?;
        self.ensure_can_act_on(actor, target.member)?;
        Ok(target)
    }

    pub fn all_wallets(&self, actor: &Actor) -> Result<Vec<Wallet>, CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        Ok(self.wallets.all())
    }

    /// Admin verification queue.
    pub fn pending_transactions(&self, actor: &Actor) -> Result<Vec<WalletTransaction>, CoreError> {
        if !self.policy.is_admin(actor) {
            return Err(CoreError::Forbidden);
        }
        Ok(self.transactions.pending())
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
