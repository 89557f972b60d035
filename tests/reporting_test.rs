mod common;

use anyhow::Result;
use common::{Backdated, days_ago, parse_date, test_service};
use fiscus::application::AppError;
use fiscus::domain::{NO_ADDRESS, TransactionType, format_report_date};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn test_customer_balance_report() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let since = days_ago(20);
    let customer = Backdated::customer(&service, "Ana Souza", "1", since).await?;
    service
        .add_address(customer.id, "Rua A, 1", "Recife", "PE", "50000-000")
        .await?;
    service
        .add_address(customer.id, "Rua B, 2", "Olinda", "PE", "53000-000")
        .await?;
    let account = Backdated::account(&service, &customer, "0000000001", dec!(1000.00)).await?;

    Backdated::transaction(&service, account.id, TransactionType::Credit, dec!(300.00), days_ago(10)).await?;
    Backdated::transaction(&service, account.id, TransactionType::Debit, dec!(100.00), days_ago(5)).await?;

    let report = service.customer_balance_report(customer.id).await?;

    assert_eq!(report.customer_name, "Ana Souza");
    assert_eq!(report.customer_since, format_report_date(since));
    assert_eq!(report.address, "Rua A, 1, Recife, PE, 50000-000");
    assert_eq!(report.credit_movements, 1);
    assert_eq!(report.debit_movements, 1);
    assert_eq!(report.total_movements, 2);
    assert_eq!(report.initial_balance, dec!(1000.00));
    assert_eq!(report.current_balance, dec!(1200.00));
    assert_eq!(report.fee_paid, dec!(2.00));

    Ok(())
}

#[tokio::test]
async fn test_customer_report_sums_all_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = Backdated::customer(&service, "Ana", "1", days_ago(5)).await?;
    let first = Backdated::account(&service, &customer, "A1", dec!(10)).await?;
    let second = Backdated::account(&service, &customer, "A2", dec!(20)).await?;

    Backdated::transaction(&service, first.id, TransactionType::Credit, dec!(5), days_ago(2)).await?;
    Backdated::transaction(&service, second.id, TransactionType::Debit, dec!(7), days_ago(1)).await?;
    service.delete_account(second.id).await?;

    let report = service.customer_balance_report(customer.id).await?;
    assert_eq!(report.address, NO_ADDRESS);
    assert_eq!(report.initial_balance, dec!(30));
    assert_eq!(report.current_balance, dec!(28));
    assert_eq!(report.total_movements, 2);

    Ok(())
}

#[tokio::test]
async fn test_customer_reports_require_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = Backdated::customer(&service, "Ana", "1", days_ago(5)).await?;

    let err = service
        .customer_balance_report(customer.id)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::NoAccountsFound(_)));

    let err = service
        .customer_balance_period_report(customer.id, days_ago(5), days_ago(0))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::NoAccountsFound(_)));

    let err = service
        .customer_balance_report(Uuid::new_v4())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::CustomerNotFound(_)));

    Ok(())
}

/// Reproduced quirk: the period report narrows movement counts to the
/// period but still charges the fee over the customer's entire history.
#[tokio::test]
async fn test_period_report_fee_covers_full_history_quirk() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = Backdated::customer(&service, "Ana", "1", days_ago(25)).await?;
    let account = Backdated::account(&service, &customer, "A1", dec!(0)).await?;

    // Twelve credits, one per day, all inside the first 30-day window
    for days in 13..=24 {
        Backdated::transaction(&service, account.id, TransactionType::Credit, dec!(1), days_ago(days)).await?;
    }

    let (start, end) = (days_ago(20), days_ago(18));
    let report = service
        .customer_balance_period_report(customer.id, start, end)
        .await?;

    assert_eq!(report.credit_movements, 3);
    assert_eq!(report.debit_movements, 0);
    assert_eq!(report.total_movements, 3);
    assert_eq!(report.fee_paid, dec!(9.00));
    assert_eq!(report.current_balance, dec!(12));
    assert_eq!(
        report.period,
        format!("{} to {}", format_report_date(start), format_report_date(end))
    );

    Ok(())
}

#[tokio::test]
async fn test_period_report_rejects_inverted_range() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = Backdated::customer(&service, "Ana", "1", days_ago(5)).await?;
    Backdated::account(&service, &customer, "A1", dec!(0)).await?;

    let err = service
        .customer_balance_period_report(customer.id, days_ago(1), days_ago(3))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn test_fee_tiers_across_windows() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = Backdated::customer(&service, "Ana", "1", days_ago(45)).await?;
    let account = Backdated::account(&service, &customer, "A1", dec!(1000)).await?;

    // 21 transactions in the first window, 1 in the second
    for _ in 0..21 {
        Backdated::transaction(&service, account.id, TransactionType::Credit, dec!(1), days_ago(40)).await?;
    }
    Backdated::transaction(&service, account.id, TransactionType::Debit, dec!(1), days_ago(2)).await?;

    let windows = service.fee_breakdown(customer.id).await?;
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].start, days_ago(45));
    assert_eq!(windows[0].transaction_count, 21);
    assert_eq!(windows[0].fee_per_transaction, dec!(0.50));
    assert_eq!(windows[1].start, days_ago(15));
    assert_eq!(windows[1].transaction_count, 1);
    assert_eq!(windows[1].fee_per_transaction, dec!(1.00));

    assert_eq!(service.total_fee(customer.id).await?, dec!(11.50));
    Ok(())
}

#[tokio::test]
async fn test_balance_summary_report() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = Backdated::customer(&service, "Ana", "1", days_ago(30)).await?;
    let bia = Backdated::customer(&service, "Bia", "2", days_ago(20)).await?;
    let caio = Backdated::customer(&service, "Caio", "3", days_ago(10)).await?;

    let ana_account = Backdated::account(&service, &ana, "A1", dec!(100)).await?;
    let bia_account = Backdated::account(&service, &bia, "B1", dec!(50)).await?;

    Backdated::transaction(&service, ana_account.id, TransactionType::Credit, dec!(25), days_ago(8)).await?;
    Backdated::transaction(&service, ana_account.id, TransactionType::Debit, dec!(60), days_ago(3)).await?;
    Backdated::transaction(&service, bia_account.id, TransactionType::Credit, dec!(10), days_ago(3)).await?;

    let report = service.balance_summary_report(Some(days_ago(5))).await?;
    assert_eq!(report.report_date, format_report_date(days_ago(5)));
    assert_eq!(report.customers.len(), 3);

    let names: Vec<&str> = report.customers.iter().map(|c| c.customer_name.as_str()).collect();
    assert_eq!(names, vec!["Ana", "Bia", "Caio"]);
    assert_eq!(report.customers[0].balance, dec!(125));
    assert_eq!(report.customers[1].balance, dec!(50));
    assert_eq!(report.customers[2].balance, Decimal::ZERO);
    assert_eq!(report.customers[2].customer_since, format_report_date(caio.created_at));

    // The whole day is included
    let report = service.balance_summary_report(Some(days_ago(3))).await?;
    assert_eq!(report.customers[0].balance, dec!(65));
    assert_eq!(report.customers[1].balance, dec!(60));

    // Defaults to today, matching live balances
    let report = service.balance_summary_report(None).await?;
    assert_eq!(report.customers[0].balance, dec!(65));
    assert_eq!(
        report.customers[0].balance,
        service.customer_balance(ana.id).await?
    );

    Ok(())
}

#[tokio::test]
async fn test_company_revenue_report() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = Backdated::customer(&service, "Ana", "1", parse_date("2024-01-01")).await?;
    let bia = Backdated::customer(&service, "Bia", "2", parse_date("2024-01-01")).await?;
    let caio = Backdated::customer(&service, "Caio", "3", parse_date("2024-01-01")).await?;

    let ana_account = Backdated::account(&service, &ana, "A1", dec!(1000)).await?;
    let bia_account = Backdated::account(&service, &bia, "B1", dec!(1000)).await?;
    let caio_account = Backdated::account(&service, &caio, "C1", dec!(1000)).await?;

    Backdated::transaction(&service, ana_account.id, TransactionType::Credit, dec!(100), parse_date("2024-03-01")).await?;
    Backdated::transaction(&service, ana_account.id, TransactionType::Debit, dec!(40), parse_date("2024-03-15")).await?;
    Backdated::transaction(&service, bia_account.id, TransactionType::Debit, dec!(12.50), parse_date("2024-03-31")).await?;
    // Outside the range
    Backdated::transaction(&service, caio_account.id, TransactionType::Credit, dec!(999), parse_date("2024-04-01")).await?;
    Backdated::transaction(&service, ana_account.id, TransactionType::Credit, dec!(999), parse_date("2024-02-29")).await?;

    let report = service
        .company_revenue_report(parse_date("2024-03-01"), parse_date("2024-03-31"))
        .await?;

    assert_eq!(report.start_date, "01/03/2024");
    assert_eq!(report.end_date, "31/03/2024");
    assert_eq!(report.customers.len(), 2);

    let ana_row = report
        .customers
        .iter()
        .find(|c| c.customer_name == "Ana")
        .unwrap();
    assert_eq!(ana_row.transaction_count, 2);
    assert_eq!(ana_row.total_amount, dec!(140));

    let bia_row = report
        .customers
        .iter()
        .find(|c| c.customer_name == "Bia")
        .unwrap();
    assert_eq!(bia_row.transaction_count, 1);
    assert_eq!(bia_row.total_amount, dec!(12.50));

    assert!(report.customers.iter().all(|c| c.transaction_count > 0));
    let sum: Decimal = report.customers.iter().map(|c| c.total_amount).sum();
    assert_eq!(report.total_revenue, sum);
    assert_eq!(report.total_revenue, dec!(152.50));

    Ok(())
}

#[tokio::test]
async fn test_revenue_report_empty_range() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .create_customer("Ana", common::individual("1"), "555")
        .await?;

    let report = service
        .company_revenue_report(parse_date("2000-01-01"), parse_date("2000-12-31"))
        .await?;
    assert!(report.customers.is_empty());
    assert_eq!(report.total_revenue, Decimal::ZERO);
    Ok(())
}
