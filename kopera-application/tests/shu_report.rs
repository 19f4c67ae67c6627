mod common;

use chrono::TimeZone;
use common::{money, World};
use kopera_application::{CoreError, EntityKind, InstallmentRequest, LoanRequest, ShuYearPatch, YearCosts};
use kopera_domain::{
    Actor, MemberId, Money, ShuStatus, SurplusComponents, VerificationOutcome,
};
use rust_decimal::Decimal;

const ADMIN: Actor = Actor {
    id: MemberId(99),
    role: kopera_domain::Role::SuperAdmin,
};

fn borrow(world: &World, member: MemberId, principal: i64) {
    world
        .loan_book()
        .create(
            &Actor::member(member),
            LoanRequest {
                member,
                principal: money(principal),
                rate_option: None,
                interest_percent: Some(Decimal::new(2, 0)),
                term_months: 3,
                installment_amount: money(100),
                code: Some(format!("PJM-{}-{principal}", member.0)),
                borrowed_at: None,
                disbursement_account: None,
                disbursement_bank: None,
            },
        )
        .unwrap();
    world.clock.advance(chrono::Duration::seconds(1));
}

#[test]
fn capital_shares_follow_savings_proportions() {
    let world = World::new();
    world.member_with_savings(1, None, 300);
    world.member_with_savings(2, None, 700);

    let report = world
        .shu_reporter()
        .generate_report(&ADMIN, 2024, money(1_000))
        .unwrap();

    let distribution = &report.distribution;
    assert_eq!(distribution.member_pool, money(1_000));
    assert_eq!(distribution.capital_pool, money(250));
    assert_eq!(distribution.total_savings, money(1_000));
    assert_eq!(distribution.total_loan_principal, Money::ZERO);

    assert_eq!(distribution.entries.len(), 2);
    let shares: Vec<(u64, Money, Money)> = distribution
        .entries
        .iter()
        .map(|e| (e.member.0, e.capital_share, e.activity_share))
        .collect();
    // 0.3 and 0.7 of the 250 capital pool; no loan activity anywhere, so
    // the activity side is zero without any division failure.
    assert_eq!(
        shares,
        vec![
            (1, money(75), Money::ZERO),
            (2, money(175), Money::ZERO),
        ]
    );
}

#[test]
fn sole_saver_takes_the_whole_capital_pool() {
    let world = World::new();
    world.member_with_savings(1, None, 400);

    let report = world
        .shu_reporter()
        .generate_report(&ADMIN, 2024, money(1_000))
        .unwrap();

    assert_eq!(report.distribution.entries.len(), 1);
    assert_eq!(
        report.distribution.entries[0].capital_share,
        report.distribution.capital_pool
    );
}

#[test]
fn loan_only_year_has_zero_capital_shares() {
    let world = World::new();
    let borrower = world.add_member(1, None);
    borrow(&world, borrower, 900);

    let report = world
        .shu_reporter()
        .generate_report(&ADMIN, 2024, money(1_000))
        .unwrap();

    assert_eq!(report.distribution.total_savings, Money::ZERO);
    assert_eq!(report.distribution.entries.len(), 1);
    assert_eq!(report.distribution.entries[0].capital_share, Money::ZERO);
    assert_eq!(report.distribution.entries[0].activity_share, money(300));
}

#[test]
fn members_without_activity_are_absent_from_the_report() {
    let world = World::new();
    world.member_with_savings(1, None, 100);
    // Registered, wallets initialized, but never active this year.
    let idle = world.add_member(2, None);
    world.wallet_ledger().initialize_wallets(idle).unwrap();

    let report = world
        .shu_reporter()
        .generate_report(&ADMIN, 2024, money(500))
        .unwrap();

    assert_eq!(report.distribution.entries.len(), 1);
    assert_eq!(report.distribution.entries[0].member, MemberId(1));
    assert!(report.entries[0].email.is_some());
}

#[test]
fn report_generation_is_deterministic_and_read_only() {
    let world = World::new();
    world.member_with_savings(1, None, 317);
    world.member_with_savings(2, None, 683);
    let borrower = world.add_member(3, None);
    borrow(&world, borrower, 960);

    let reporter = world.shu_reporter();
    let first = reporter.generate_report(&ADMIN, 2024, money(1_000)).unwrap();
    let second = reporter.generate_report(&ADMIN, 2024, money(1_000)).unwrap();
    assert_eq!(first, second);

    // Nothing was persisted by generating reports.
    assert_eq!(
        reporter.year_by(&ADMIN, 2024),
        Err(CoreError::NotFound(EntityKind::ShuYear))
    );
}

#[test]
fn year_records_are_unique_per_year() {
    let world = World::new();
    let reporter = world.shu_reporter();

    let record = reporter
        .save_year(&ADMIN, 2024, money(1_000), None, None)
        .unwrap();
    assert_eq!(record.status, ShuStatus::Draft);

    assert_eq!(
        reporter.save_year(&ADMIN, 2024, money(2_000), Some(ShuStatus::Final), None),
        Err(CoreError::Conflict(EntityKind::ShuYear))
    );

    let updated = reporter
        .update_year(
            &ADMIN,
            record.id,
            ShuYearPatch {
                total: Some(money(1_500)),
                status: Some(ShuStatus::Final),
            },
        )
        .unwrap();
    assert_eq!(updated.total, money(1_500));
    assert_eq!(updated.status, ShuStatus::Final);
    assert_eq!(reporter.year_by(&ADMIN, 2024).unwrap(), updated);
}

#[test]
fn member_allocations_are_write_once_per_year() {
    let world = World::new();
    let member = world.member_with_savings(1, None, 300);
    world.member_with_savings(2, None, 700);
    let reporter = world.shu_reporter();

    // No year record yet.
    assert_eq!(
        reporter.save_member_allocation(&ADMIN, member, 2024),
        Err(CoreError::NotFound(EntityKind::ShuYear))
    );

    reporter
        .save_year(&ADMIN, 2024, money(1_000), None, None)
        .unwrap();
    let allocation = reporter
        .save_member_allocation(&ADMIN, member, 2024)
        .unwrap();
    assert_eq!(allocation.capital_share, money(75));
    assert_eq!(allocation.activity_share, Money::ZERO);
    assert_eq!(allocation.total, money(75));

    assert_eq!(
        reporter.save_member_allocation(&ADMIN, member, 2024),
        Err(CoreError::Conflict(EntityKind::ShuAllocation))
    );

    // The frozen allocation matches a freshly generated report.
    let report = reporter.generate_report(&ADMIN, 2024, money(1_000)).unwrap();
    assert_eq!(
        report.distribution.entries[0].capital_share,
        allocation.capital_share
    );
}

#[test]
fn members_reach_only_their_own_allocations() {
    let world = World::new();
    let member = world.member_with_savings(1, Some(2), 300);
    let other = world.member_with_savings(3, None, 700);
    world.members.add_member(MemberId(2), None, None);
    let reporter = world.shu_reporter();
    reporter
        .save_year(&ADMIN, 2024, money(1_000), None, None)
        .unwrap();

    // A member freezes and reads their own allocation.
    let own = reporter
        .save_member_allocation(&Actor::member(member), member, 2024)
        .unwrap();
    assert_eq!(
        reporter
            .member_allocation(&Actor::member(member), member, 2024)
            .unwrap(),
        own
    );

    assert_eq!(
        reporter.save_member_allocation(&Actor::member(member), other, 2024),
        Err(CoreError::Forbidden)
    );
    assert_eq!(
        reporter.member_allocation(&Actor::member(other), member, 2024),
        Err(CoreError::Forbidden)
    );
    // The registering admin may act for their member.
    assert!(reporter
        .member_history(&Actor::admin(MemberId(2)), member)
        .is_ok());

    assert_eq!(
        reporter.allocations_of_year(&Actor::member(member), 2024),
        Err(CoreError::Forbidden)
    );
    let all = reporter.allocations_of_year(&ADMIN, 2024).unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn automated_path_floors_surplus_at_zero() {
    let world = World::new();
    let reporter = world.shu_reporter();

    let components = SurplusComponents {
        operating_income: money(100),
        non_operating_income: Money::ZERO,
        operating_expense: money(150),
        non_operating_expense: money(20),
        tax_expense: money(10),
    };
    let report = reporter
        .generate_report_from_components(&ADMIN, 2024, components)
        .unwrap();
    assert_eq!(report.distribution.surplus, Money::ZERO);
    assert_eq!(report.breakdown, Some(components));
}

#[test]
fn operating_income_derives_from_verified_interest() {
    let world = World::new();
    let member = world.add_member(1, None);
    borrow(&world, member, 900);
    let loan = world.loan_book().list(&ADMIN)[0].clone();
    let processor = world.installments();

    // One verified payment with 10 interest; one merely submitted with 99.
    let verified = processor
        .submit(
            &Actor::member(member),
            InstallmentRequest {
                loan: loan.id,
                sequence: None,
                principal: money(90),
                interest: money(10),
                penalty: Money::ZERO,
                total: None,
                paid_at: None,
            },
        )
        .unwrap();
    processor
        .verify(&ADMIN, verified.id, VerificationOutcome::Verified)
        .unwrap();
    processor
        .submit(
            &Actor::member(member),
            InstallmentRequest {
                loan: loan.id,
                sequence: None,
                principal: money(1),
                interest: money(99),
                penalty: Money::ZERO,
                total: None,
                paid_at: None,
            },
        )
        .unwrap();

    let components = world
        .shu_reporter()
        .derive_components(2024, YearCosts::default());
    assert_eq!(components.operating_income, money(10));
    assert_eq!(components.net_surplus(), money(10));
}

#[test]
fn report_generation_is_admin_gated() {
    let world = World::new();
    let member = world.member_with_savings(1, None, 100);
    let reporter = world.shu_reporter();

    assert_eq!(
        reporter.generate_report(&Actor::member(member), 2024, money(1_000)),
        Err(CoreError::Forbidden)
    );
    assert_eq!(
        reporter.save_year(&Actor::member(member), 2024, money(1_000), None, None),
        Err(CoreError::Forbidden)
    );
    assert_eq!(
        reporter.years(&Actor::member(member)),
        Err(CoreError::Forbidden)
    );
}

#[test]
fn savings_outside_the_target_year_are_ignored() {
    let world = World::new();
    world.member_with_savings(1, None, 300);
    // Move into the next year and add more savings.
    world
        .clock
        .set(chrono::Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap());
    world.member_with_savings(2, None, 700);

    let report_2024 = world
        .shu_reporter()
        .generate_report(&ADMIN, 2024, money(1_000))
        .unwrap();
    assert_eq!(report_2024.distribution.total_savings, money(300));
    assert_eq!(report_2024.distribution.entries.len(), 1);

    let report_2025 = world
        .shu_reporter()
        .generate_report(&ADMIN, 2025, money(1_000))
        .unwrap();
    assert_eq!(report_2025.distribution.total_savings, money(700));
}
