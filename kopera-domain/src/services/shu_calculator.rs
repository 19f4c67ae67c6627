//! Annual surplus (SHU) distribution.
//!
//! A pure calculator: given the distributable surplus and every member's
//! yearly activity snapshot, it produces each member's capital-contribution
//! (jasa modal) and business-activity (jasa usaha) share. The same inputs
//! always produce the same output — the report must be re-derivable from
//! stored history for audit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{MemberId, Money};

/// Split percentages applied to the surplus.
///
/// Defaults implement the direct-split policy: 25% of the surplus forms the
/// capital pool and 30% the activity pool, with the whole surplus counted as
/// the member pool. A deployment retaining half the surplus instead sets
/// `member_pool_percent` to 50 and rebalances the two pool percentages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRates {
    pub member_pool_percent: Decimal,
    pub capital_percent: Decimal,
    pub activity_percent: Decimal,
}

impl Default for AllocationRates {
    fn default() -> Self {
        Self {
            member_pool_percent: Decimal::ONE_HUNDRED,
            capital_percent: Decimal::new(25, 0),
            activity_percent: Decimal::new(30, 0),
        }
    }
}

/// One member's activity within the target year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberActivity {
    pub member: MemberId,
    pub savings: Money,
    pub loan_principal: Money,
}

impl MemberActivity {
    pub fn is_inactive(&self) -> bool {
        self.savings.is_zero() && self.loan_principal.is_zero()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAllocation {
    pub member: MemberId,
    pub savings: Money,
    pub loan_principal: Money,
    pub capital_share: Money,
    pub activity_share: Money,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShuDistribution {
    pub surplus: Money,
    pub member_pool: Money,
    pub capital_pool: Money,
    pub activity_pool: Money,
    pub total_savings: Money,
    pub total_loan_principal: Money,
    /// Ascending by member id; members with no activity are absent.
    pub entries: Vec<MemberAllocation>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ShuCalculator {
    rates: AllocationRates,
}

impl ShuCalculator {
    pub fn new(rates: AllocationRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> AllocationRates {
        self.rates
    }

    /// Allocates `surplus` across `activities`.
    ///
    /// Each share is `(member part / total part) × pool`, quantized to cents
    /// with banker's rounding. A zero total on either side yields zero
    /// shares on that side rather than a division failure; quantization
    /// remainders stay undistributed.
    pub fn distribute(&self, surplus: Money, activities: &[MemberActivity]) -> ShuDistribution {
        let member_pool = (surplus * percent(self.rates.member_pool_percent)).to_cents();
        let capital_pool = (member_pool * percent(self.rates.capital_percent)).to_cents();
        let activity_pool = (member_pool * percent(self.rates.activity_percent)).to_cents();

        let total_savings: Money = activities.iter().map(|a| a.savings).sum();
        let total_loan_principal: Money = activities.iter().map(|a| a.loan_principal).sum();

        let mut active: Vec<&MemberActivity> =
            activities.iter().filter(|a| !a.is_inactive()).collect();
        active.sort_by_key(|a| a.member);

        let entries = active
            .into_iter()
            .map(|activity| {
                let capital_share = proportional(activity.savings, total_savings, capital_pool);
                let activity_share =
                    proportional(activity.loan_principal, total_loan_principal, activity_pool);
                MemberAllocation {
                    member: activity.member,
                    savings: activity.savings,
                    loan_principal: activity.loan_principal,
                    capital_share,
                    activity_share,
                    total: capital_share + activity_share,
                }
            })
            .collect();

        ShuDistribution {
            surplus,
            member_pool,
            capital_pool,
            activity_pool,
            total_savings,
            total_loan_principal,
            entries,
        }
    }
}

fn percent(value: Decimal) -> Decimal {
    value / Decimal::ONE_HUNDRED
}

fn proportional(part: Money, whole: Money, pool: Money) -> Money {
    if whole.is_zero() {
        return Money::ZERO;
    }
    Money::from_decimal(part.as_decimal() / whole.as_decimal() * pool.as_decimal()).to_cents()
}
