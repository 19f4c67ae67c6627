mod access_policy;
mod shu_calculator;

pub use access_policy::{AccessPolicy, Actor, AdminVisibility, ListScope, PolicyConfig, Role};
pub use shu_calculator::{
    AllocationRates, MemberActivity, MemberAllocation, ShuCalculator, ShuDistribution,
};
