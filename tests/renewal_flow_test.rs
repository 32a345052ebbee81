use chrono::NaiveDate;
use pawnledger::db::init_db;
use pawnledger::domain::{
    CollateralState, Direction, LoanState, Money, OperatorId, Percent, RenewalMode, TillId,
};
use pawnledger::engine::{LedgerPolicy, RenewalRequest};
use pawnledger::orchestration::{DisbursementRequest, Ledger};
use pawnledger::{CoreError, Loan, Repository};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_ledger(policy: LedgerPolicy) -> (Ledger, String, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let ledger = Ledger::new(Arc::new(Repository::new(pool)), policy);
    (ledger, db_path, temp_dir)
}

fn m(s: &str) -> Money {
    Money::parse(s).unwrap()
}

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
}

async fn disburse_500(ledger: &Ledger, till_id: Option<TillId>) -> Loan {
    let (loan, _) = ledger
        .disburse(DisbursementRequest {
            collateral_id: None,
            description: "gold chain 18k".into(),
            appraised_value: m("900.00"),
            principal: m("500.00"),
            monthly_rate_percent: Percent::parse("10").unwrap(),
            period_days: 30,
            disbursed_at: day(0),
            till_id,
        })
        .await
        .expect("disburse failed");
    loan
}

fn renewal(loan: &Loan, mode: RenewalMode, amount: &str, as_of: NaiveDate) -> RenewalRequest {
    RenewalRequest {
        loan_id: loan.id,
        mode,
        amount_paid: m(amount),
        till_id: None,
        as_of,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn test_interest_only_renewal_example() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    let outcome = ledger
        .renew(renewal(&loan, RenewalMode::InterestOnly, "50.00", day(30)))
        .await
        .expect("renewal failed");

    assert_eq!(outcome.interest_charged, m("50.00"));
    assert_eq!(outcome.loan.outstanding_principal, m("500.00"));
    assert_eq!(outcome.loan.due_at, day(60));
    assert_eq!(outcome.loan.state, LoanState::Active);

    let stored = ledger.repo().get_loan(loan.id).await.unwrap();
    assert_eq!(stored.due_at, day(60));
    assert_eq!(stored.accrual_start, day(30));
    assert_eq!(stored.version, 1);

    let payments = ledger.repo().list_payments(loan.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].kind, RenewalMode::InterestOnly);
    assert_eq!(payments[0].amount, m("50.00"));

    // The clock restarted at day 30, so nothing has accrued yet.
    let quote = ledger.payoff_quote(loan.id, day(30)).await.unwrap();
    assert!(quote.interest.is_zero());
}

#[tokio::test]
async fn test_interest_only_short_payment_changes_nothing() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    let err = ledger
        .renew(renewal(&loan, RenewalMode::InterestOnly, "49.99", day(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientAmount { .. }));

    assert_eq!(ledger.repo().get_loan(loan.id).await.unwrap(), loan);
    assert!(ledger.repo().list_payments(loan.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_full_payoff_with_mora_releases_collateral_and_records_cash() {
    let policy = LedgerPolicy {
        daily_penalty_rate_percent: Percent::parse("1").unwrap(),
        at_risk_window_days: 3,
    };
    let (ledger, _path, _temp) = setup_ledger(policy).await;
    let till = ledger
        .open_till(OperatorId::new("cashier-1"), m("100.00"))
        .await
        .unwrap();
    let loan = disburse_500(&ledger, None).await;

    // Day 35: interest 500 * 10% * 35/30 = 58.33, mora 500 * 1% * 5 = 25.00.
    let quote = ledger.payoff_quote(loan.id, day(35)).await.unwrap();
    assert_eq!(quote.interest, m("58.33"));
    assert_eq!(quote.penalty, m("25.00"));
    assert_eq!(quote.total, m("583.33"));

    let mut request = renewal(&loan, RenewalMode::FullPayoff, "583.33", day(35));
    request.till_id = Some(till.id);
    let outcome = ledger.renew(request).await.expect("payoff failed");

    assert_eq!(outcome.loan.state, LoanState::Cancelled);
    assert!(outcome.loan.outstanding_principal.is_zero());
    assert!(outcome.excess.is_zero());

    let collateral = ledger.repo().get_collateral(loan.id).await.unwrap();
    assert_eq!(collateral.state, CollateralState::Released);

    let (till_after, movements) = ledger.till_history(till.id).await.unwrap();
    assert_eq!(till_after.current_balance, m("683.33"));
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].direction, Direction::In);
    assert_eq!(movements[0].amount, m("583.33"));

    let payments = ledger.repo().list_payments(loan.id).await.unwrap();
    assert_eq!(payments[0].till_id, Some(till.id));

    let again = ledger
        .renew(renewal(&loan, RenewalMode::InterestOnly, "10.00", day(36)))
        .await;
    assert!(matches!(again, Err(CoreError::LoanNotActive(_))));
}

#[tokio::test]
async fn test_partial_principal_then_settle_to_zero() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    let first = ledger
        .renew(renewal(&loan, RenewalMode::PartialPrincipal, "250.00", day(30)))
        .await
        .unwrap();
    assert_eq!(first.principal_reduction, m("200.00"));
    assert_eq!(first.loan.outstanding_principal, m("300.00"));
    assert_eq!(first.loan.due_at, day(60));
    assert_eq!(first.loan.state, LoanState::Active);

    // Interest is on the original principal: 500 * 10% * 15/30 = 25.00.
    let second = ledger
        .renew(renewal(&loan, RenewalMode::PartialPrincipal, "400.00", day(45)))
        .await
        .unwrap();
    assert_eq!(second.interest_charged, m("25.00"));
    assert_eq!(second.principal_reduction, m("300.00"));
    assert_eq!(second.excess, m("75.00"));
    assert_eq!(second.loan.state, LoanState::Cancelled);

    let collateral = ledger.repo().get_collateral(loan.id).await.unwrap();
    assert_eq!(collateral.state, CollateralState::Released);

    let kinds: Vec<RenewalMode> = ledger
        .repo()
        .list_payments(loan.id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![RenewalMode::PartialPrincipal, RenewalMode::PartialPrincipal]
    );
}

#[tokio::test]
async fn test_closed_till_rejects_renewal_without_side_effects() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let till = ledger
        .open_till(OperatorId::new("cashier-1"), m("0.00"))
        .await
        .unwrap();
    ledger.close_till(till.id, m("0.00"), None).await.unwrap();
    let loan = disburse_500(&ledger, None).await;

    let mut request = renewal(&loan, RenewalMode::InterestOnly, "50.00", day(30));
    request.till_id = Some(till.id);
    let err = ledger.renew(request).await.unwrap_err();
    assert!(matches!(err, CoreError::TillNotOpen(_)));

    let mut missing = renewal(&loan, RenewalMode::InterestOnly, "50.00", day(30));
    missing.till_id = Some(TillId::new());
    assert!(matches!(
        ledger.renew(missing).await,
        Err(CoreError::TillNotOpen(_))
    ));

    assert_eq!(ledger.repo().get_loan(loan.id).await.unwrap(), loan);
    assert!(ledger.repo().list_payments(loan.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_failure_mid_renewal_rolls_back_everything() {
    let (ledger, db_path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let till = ledger
        .open_till(OperatorId::new("cashier-1"), m("100.00"))
        .await
        .unwrap();
    let loan = disburse_500(&ledger, None).await;

    // Break the movement log so the till step fails after the loan was written.
    let saboteur = init_db(&db_path).await.unwrap();
    sqlx::query("DROP TABLE till_movements")
        .execute(&saboteur)
        .await
        .unwrap();

    let mut request = renewal(&loan, RenewalMode::FullPayoff, "550.00", day(30));
    request.till_id = Some(till.id);
    let err = ledger.renew(request).await.unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));

    let stored = ledger.repo().get_loan(loan.id).await.unwrap();
    assert_eq!(stored.state, LoanState::Active);
    assert_eq!(stored.version, 0);
    assert_eq!(
        ledger.repo().get_collateral(loan.id).await.unwrap().state,
        CollateralState::InCustody
    );
    assert!(ledger.repo().list_payments(loan.id).await.unwrap().is_empty());
    assert_eq!(
        ledger.repo().get_till(till.id).await.unwrap().current_balance,
        m("100.00")
    );
}

#[tokio::test]
async fn test_concurrent_payoffs_only_one_wins() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    let (a, b) = tokio::join!(
        ledger.renew(renewal(&loan, RenewalMode::FullPayoff, "550.00", day(30))),
        ledger.renew(renewal(&loan, RenewalMode::FullPayoff, "550.00", day(30))),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    let failure = if a.is_err() { a } else { b };
    assert!(matches!(failure, Err(CoreError::LoanNotActive(_))));
    assert_eq!(ledger.repo().list_payments(loan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_idempotency_key_rejects_resubmission() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    let mut request = renewal(&loan, RenewalMode::InterestOnly, "50.00", day(30));
    request.idempotency_key = Some("receipt-0042".into());

    ledger.renew(request.clone()).await.unwrap();
    let err = ledger.renew(request).await.unwrap_err();
    assert!(matches!(err, CoreError::DuplicatePayment(k) if k == "receipt-0042"));

    let stored = ledger.repo().get_loan(loan.id).await.unwrap();
    assert_eq!(stored.due_at, day(60));
    assert_eq!(ledger.repo().list_payments(loan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_disbursement_pays_out_of_till() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let till = ledger
        .open_till(OperatorId::new("cashier-1"), m("800.00"))
        .await
        .unwrap();

    let loan = disburse_500(&ledger, Some(till.id)).await;
    assert_eq!(loan.due_at, day(30));

    let (till_after, movements) = ledger.till_history(till.id).await.unwrap();
    assert_eq!(till_after.current_balance, m("300.00"));
    assert_eq!(movements[0].direction, Direction::Out);

    // Not enough cash left for a second loan; nothing is created.
    let movements_before = ledger.repo().list_movements(till.id).await.unwrap().len();
    let err = ledger
        .disburse(DisbursementRequest {
            collateral_id: None,
            description: "watch".into(),
            appraised_value: m("700.00"),
            principal: m("500.00"),
            monthly_rate_percent: Percent::parse("10").unwrap(),
            period_days: 30,
            disbursed_at: day(1),
            till_id: Some(till.id),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientFunds { .. }));
    assert_eq!(
        ledger.repo().list_movements(till.id).await.unwrap().len(),
        movements_before
    );
}

#[tokio::test]
async fn test_collateral_cannot_back_two_active_loans() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    let repledge = DisbursementRequest {
        collateral_id: Some(loan.collateral_id),
        description: "gold chain 18k".into(),
        appraised_value: m("900.00"),
        principal: m("400.00"),
        monthly_rate_percent: Percent::parse("10").unwrap(),
        period_days: 30,
        disbursed_at: day(5),
        till_id: None,
    };
    assert!(matches!(
        ledger.disburse(repledge.clone()).await,
        Err(CoreError::CollateralInUse(_))
    ));

    ledger
        .renew(renewal(&loan, RenewalMode::FullPayoff, "550.00", day(30)))
        .await
        .unwrap();

    let (second, _) = ledger.disburse(repledge).await.unwrap();
    assert_eq!(second.collateral_id, loan.collateral_id);
    let collateral = ledger.repo().get_collateral(second.id).await.unwrap();
    assert_eq!(collateral.state, CollateralState::InCustody);
    assert_eq!(collateral.loan_id, Some(second.id));
}

#[tokio::test]
async fn test_backdated_payoff_cannot_skip_accrued_interest() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let loan = disburse_500(&ledger, None).await;

    ledger
        .renew(renewal(&loan, RenewalMode::InterestOnly, "50.00", day(30)))
        .await
        .unwrap();
    let renewed = ledger.repo().get_loan(loan.id).await.unwrap();

    // Dated back into the first period, the payoff would owe no interest at all.
    let err = ledger
        .renew(renewal(&loan, RenewalMode::FullPayoff, "500.00", day(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfiguration(_)));

    let far_future = NaiveDate::from_ymd_opt(2999, 1, 1).unwrap();
    let err = ledger
        .renew(renewal(&loan, RenewalMode::InterestOnly, "50.00", far_future))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfiguration(_)));

    assert_eq!(ledger.repo().get_loan(loan.id).await.unwrap(), renewed);
    assert_eq!(ledger.repo().list_payments(loan.id).await.unwrap().len(), 1);
    assert_eq!(
        ledger.repo().get_collateral(loan.id).await.unwrap().state,
        CollateralState::InCustody
    );
}

#[tokio::test]
async fn test_sub_cent_payment_leaves_till_untouched() {
    let (ledger, _path, _temp) = setup_ledger(LedgerPolicy::default()).await;
    let till = ledger
        .open_till(OperatorId::new("cashier-1"), m("100.00"))
        .await
        .unwrap();
    let loan = disburse_500(&ledger, None).await;

    let mut request = renewal(&loan, RenewalMode::InterestOnly, "50.004", day(30));
    request.till_id = Some(till.id);
    let err = ledger.renew(request).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidAmount(_)));

    let (till_after, movements) = ledger.till_history(till.id).await.unwrap();
    assert_eq!(till_after.current_balance, m("100.00"));
    assert!(movements.is_empty());
    assert!(ledger.repo().list_payments(loan.id).await.unwrap().is_empty());
}
