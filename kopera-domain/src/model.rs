use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoanId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstallmentId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShuRecordId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllocationId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RateOptionId(pub u64);

/// Fixed-point monetary amount. Wraps a decimal so repeated proportional
/// allocations cannot accumulate binary-float drift.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(units: i64, scale: u32) -> Self {
        Self(Decimal::new(units, scale))
    }

    pub fn from_i64(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Quantizes to two decimal places with banker's rounding.
    pub fn to_cents(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// The three fixed savings categories every member holds a wallet in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WalletCategory {
    #[serde(rename = "pokok")]
    Principal,
    #[serde(rename = "wajib")]
    Mandatory,
    #[serde(rename = "sukarela")]
    Voluntary,
}

impl WalletCategory {
    pub const ALL: [Self; 3] = [Self::Principal, Self::Mandatory, Self::Voluntary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Principal => "pokok",
            Self::Mandatory => "wajib",
            Self::Voluntary => "sukarela",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownCategory;

impl FromStr for WalletCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pokok" => Ok(Self::Principal),
            "wajib" => Ok(Self::Mandatory),
            "sukarela" => Ok(Self::Voluntary),
            _ => Err(UnknownCategory),
        }
    }
}

impl fmt::Display for WalletCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-machine rule rejected a mutation. Carried through the store
/// boundary so an aborted commit keeps its cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainViolation {
    /// The transaction already left `Pending`.
    TransactionFinalized,
    /// The installment already left `Submitted`.
    InstallmentFinalized,
    /// The write would push a wallet balance below zero.
    BalanceOverdrawn,
}

impl fmt::Display for DomainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransactionFinalized => f.write_str("transaction already finalized"),
            Self::InstallmentFinalized => f.write_str("installment already finalized"),
            Self::BalanceOverdrawn => f.write_str("wallet balance would become negative"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub member: MemberId,
    pub category: WalletCategory,
    pub balance: Money,
    pub description: String,
}

impl Wallet {
    /// Applies a signed balance delta. The balance never goes negative once
    /// verified; an overdrawing delta leaves the wallet untouched.
    pub fn apply_delta(&mut self, delta: Money) -> Result<(), DomainViolation> {
        let next = self.balance + delta;
        if next.is_negative() {
            return Err(DomainViolation::BalanceOverdrawn);
        }
        self.balance = next;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Topup,
    Adjustment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub wallet: WalletId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub description: String,
    pub status: TransactionStatus,
    pub verified_by: Option<MemberId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// One-way transition out of `Pending`. Returns the balance delta the
    /// owning wallet must absorb in the same commit: the full amount on
    /// approval, nothing on rejection.
    pub fn finalize(
        &mut self,
        by: MemberId,
        at: DateTime<Utc>,
        approve: bool,
    ) -> Result<Money, DomainViolation> {
        if self.status != TransactionStatus::Pending {
            return Err(DomainViolation::TransactionFinalized);
        }
        self.status = if approve {
            TransactionStatus::Verified
        } else {
            TransactionStatus::Rejected
        };
        self.verified_by = Some(by);
        self.verified_at = Some(at);
        Ok(if approve { self.amount } else { Money::ZERO })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    #[serde(rename = "proses")]
    InProgress,
    #[serde(rename = "disetujui")]
    Approved,
    #[serde(rename = "lunas")]
    PaidOff,
    #[serde(rename = "macet")]
    Defaulted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub code: String,
    pub member: MemberId,
    pub principal: Money,
    /// Captured at creation; immutable even if the rate catalog changes.
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

impl Loan {
    /// Books one verified installment: decrements the remaining counter
    /// (floored at zero) and flips the loan to `PaidOff` when it reaches
    /// zero. The flip is monotonic.
    pub fn register_verified_installment(&mut self) {
        self.remaining_installments = self.remaining_installments.saturating_sub(1);
        if self.remaining_installments == 0 {
            self.status = LoanStatus::PaidOff;
        }
    }

    /// Changes the term. While the loan is still in progress the remaining
    /// counter re-baselines to the new term.
    pub fn rebaseline_term(&mut self, term_months: u32) {
        self.term_months = term_months;
        if self.status == LoanStatus::InProgress {
            self.remaining_installments = term_months;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    #[serde(rename = "proses")]
    Submitted,
    #[serde(rename = "verified")]
    Verified,
    #[serde(rename = "kurang")]
    Short,
    #[serde(rename = "lebih")]
    Over,
}

/// Admin verdict on a submitted installment payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Verified,
    Short,
    Over,
}

impl VerificationOutcome {
    pub fn as_status(self) -> InstallmentStatus {
        match self {
            Self::Verified => InstallmentStatus::Verified,
            Self::Short => InstallmentStatus::Short,
            Self::Over => InstallmentStatus::Over,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan: LoanId,
    pub member: MemberId,
    /// 1-based, unique per loan.
    pub sequence: u32,
    pub paid_at: DateTime<Utc>,
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
    pub total: Money,
    pub status: InstallmentStatus,
}

impl Installment {
    pub fn component_total(principal: Money, interest: Money, penalty: Money) -> Money {
        principal + interest + penalty
    }

    /// One-way transition out of `Submitted`. Only this gate makes the
    /// loan-counter decrement single-shot under retried verification.
    pub fn verify(&mut self, outcome: VerificationOutcome) -> Result<(), DomainViolation> {
        if self.status != InstallmentStatus::Submitted {
            return Err(DomainViolation::InstallmentFinalized);
        }
        self.status = outcome.as_status();
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuStatus {
    Draft,
    Final,
}

/// Income/expense components of the automated surplus computation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SurplusComponents {
    pub operating_income: Money,
    pub non_operating_income: Money,
    pub operating_expense: Money,
    pub non_operating_expense: Money,
    pub tax_expense: Money,
}

impl SurplusComponents {
    /// Net distributable surplus, floored at zero.
    pub fn net_surplus(&self) -> Money {
        let net = (self.operating_income + self.non_operating_income)
            - (self.operating_expense + self.non_operating_expense + self.tax_expense);
        if net.is_negative() {
            Money::ZERO
        } else {
            net
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShuYearRecord {
    pub id: ShuRecordId,
    pub year: i32,
    pub total: Money,
    pub computed_at: DateTime<Utc>,
    pub status: ShuStatus,
    /// Present only when the record came from the automated surplus path.
    pub breakdown: Option<SurplusComponents>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberShuAllocation {
    pub id: AllocationId,
    pub record: ShuRecordId,
    pub member: MemberId,
    pub capital_share: Money,
    pub activity_share: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterestRateOption {
    pub id: RateOptionId,
    pub name: String,
    pub percent: Decimal,
    pub description: String,
    pub active: bool,
    pub created_by: MemberId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn pending_topup(amount: i64) -> WalletTransaction {
        WalletTransaction {
            id: TransactionId(1),
            wallet: WalletId(1),
            kind: TransactionKind::Topup,
            amount: Money::from_i64(amount),
            description: String::new(),
            status: TransactionStatus::Pending,
            verified_by: None,
            verified_at: None,
            created_at: at(),
        }
    }

    fn loan(term: u32) -> Loan {
        Loan {
            id: LoanId(1),
            code: "PJM1".into(),
            member: MemberId(1),
            principal: Money::from_i64(3_000),
            interest_percent: Decimal::new(2, 0),
            rate_option: None,
            term_months: term,
            installment_amount: Money::from_i64(100),
            remaining_installments: term,
            status: LoanStatus::InProgress,
            borrowed_at: at(),
            disbursement_account: None,
            disbursement_bank: None,
        }
    }

    #[test]
    fn approving_returns_amount_and_records_admin() {
        let mut tx = pending_topup(100);
        let delta = tx.finalize(MemberId(9), at(), true).unwrap();

        assert_eq!(delta, Money::from_i64(100));
        assert_eq!(tx.status, TransactionStatus::Verified);
        assert_eq!(tx.verified_by, Some(MemberId(9)));
        assert_eq!(tx.verified_at, Some(at()));
    }

    #[test]
    fn rejecting_returns_zero_delta() {
        let mut tx = pending_topup(50);
        let delta = tx.finalize(MemberId(9), at(), false).unwrap();

        assert_eq!(delta, Money::ZERO);
        assert_eq!(tx.status, TransactionStatus::Rejected);
    }

    #[test]
    fn finalize_is_single_shot() {
        let mut tx = pending_topup(100);
        tx.finalize(MemberId(9), at(), true).unwrap();

        assert_eq!(
            tx.finalize(MemberId(9), at(), true),
            Err(DomainViolation::TransactionFinalized)
        );
        assert_eq!(
            tx.finalize(MemberId(9), at(), false),
            Err(DomainViolation::TransactionFinalized)
        );
    }

    #[test]
    fn wallet_rejects_overdraw_without_mutating() {
        let mut wallet = Wallet {
            id: WalletId(1),
            member: MemberId(1),
            category: WalletCategory::Voluntary,
            balance: Money::from_i64(30),
            description: String::new(),
        };

        assert_eq!(
            wallet.apply_delta(Money::from_i64(-31)),
            Err(DomainViolation::BalanceOverdrawn)
        );
        assert_eq!(wallet.balance, Money::from_i64(30));

        wallet.apply_delta(Money::from_i64(-30)).unwrap();
        assert_eq!(wallet.balance, Money::ZERO);
    }

    #[test]
    fn loan_pays_off_when_counter_reaches_zero() {
        let mut l = loan(3);
        l.register_verified_installment();
        assert_eq!(l.remaining_installments, 2);
        assert_eq!(l.status, LoanStatus::InProgress);

        l.register_verified_installment();
        l.register_verified_installment();
        assert_eq!(l.remaining_installments, 0);
        assert_eq!(l.status, LoanStatus::PaidOff);

        // Over-verification floors at zero and never reverts the status.
        l.register_verified_installment();
        assert_eq!(l.remaining_installments, 0);
        assert_eq!(l.status, LoanStatus::PaidOff);
    }

    #[test]
    fn rebaseline_resets_counter_only_in_progress() {
        let mut l = loan(6);
        l.register_verified_installment();
        l.rebaseline_term(12);
        assert_eq!(l.remaining_installments, 12);

        let mut approved = loan(6);
        approved.status = LoanStatus::Approved;
        approved.rebaseline_term(12);
        assert_eq!(approved.term_months, 12);
        assert_eq!(approved.remaining_installments, 6);
    }

    #[test]
    fn installment_verify_is_single_shot() {
        let mut inst = Installment {
            id: InstallmentId(1),
            loan: LoanId(1),
            member: MemberId(1),
            sequence: 1,
            paid_at: at(),
            principal: Money::from_i64(90),
            interest: Money::from_i64(10),
            penalty: Money::ZERO,
            total: Money::from_i64(100),
            status: InstallmentStatus::Submitted,
        };

        inst.verify(VerificationOutcome::Verified).unwrap();
        assert_eq!(inst.status, InstallmentStatus::Verified);
        assert_eq!(
            inst.verify(VerificationOutcome::Short),
            Err(DomainViolation::InstallmentFinalized)
        );
    }

    #[test]
    fn net_surplus_floors_at_zero() {
        let components = SurplusComponents {
            operating_income: Money::from_i64(100),
            non_operating_income: Money::from_i64(20),
            operating_expense: Money::from_i64(90),
            non_operating_expense: Money::from_i64(10),
            tax_expense: Money::from_i64(5),
        };
        assert_eq!(components.net_surplus(), Money::from_i64(15));

        let losing = SurplusComponents {
            operating_expense: Money::from_i64(500),
            ..components
        };
        assert_eq!(losing.net_surplus(), Money::ZERO);
    }

    #[test]
    fn category_parses_its_serialized_names() {
        for category in WalletCategory::ALL {
            assert_eq!(category.as_str().parse(), Ok(category));
        }
        assert_eq!(
            "deposito".parse::<WalletCategory>(),
            Err(UnknownCategory)
        );
    }

    #[test]
    fn cents_quantization_uses_bankers_rounding() {
        assert_eq!(Money::new(12345, 3).to_cents(), Money::new(1234, 2));
        assert_eq!(Money::new(12355, 3).to_cents(), Money::new(1236, 2));
    }
}
